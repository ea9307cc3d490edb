//! Domain types for stratlab.

pub mod bar;
pub mod fill;
pub mod ids;

pub use bar::{Bar, Column, UnknownColumn};
pub use fill::{Fill, Marker, Side, Sizing};
pub use ids::{DatasetHash, ProgramHash, RunId};
