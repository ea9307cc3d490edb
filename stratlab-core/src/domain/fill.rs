//! Fill records and chart markers produced by the ledger.

use serde::{Deserialize, Serialize};

/// Direction of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// How the traded amount was specified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sizing {
    /// Percentage of cash (buys) or of the open position (sells).
    Percent(f64),
    /// Explicit quantity, used by grid ladder fills.
    Quantity,
}

/// A single executed trade against the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub bar_index: usize,
    pub time: String,
    pub side: Side,
    pub sizing: Sizing,
    pub price: f64,
    pub quantity: f64,
    /// Signed change in cash: negative for buys, positive for sells.
    pub cash_delta: f64,
}

impl Fill {
    /// Absolute traded notional.
    pub fn notional(&self) -> f64 {
        self.cash_delta.abs()
    }
}

/// Buy/sell marker for chart overlays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub bar_index: usize,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notional_is_unsigned() {
        let fill = Fill {
            bar_index: 3,
            time: "t3".into(),
            side: Side::Buy,
            sizing: Sizing::Percent(50.0),
            price: 100.0,
            quantity: 2.0,
            cash_delta: -200.0,
        };
        assert_eq!(fill.notional(), 200.0);
    }
}
