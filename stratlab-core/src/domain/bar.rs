//! Bar — the fundamental market data unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of the bar table.
///
/// Field names follow the exchange kline export the table is usually sourced
/// from. `time` is an opaque display label; bar order is array order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume", default)]
    pub volume: f64,
    #[serde(rename = "Close_time", default)]
    pub close_time: f64,
    #[serde(rename = "Quote_asset_volume", default)]
    pub quote_asset_volume: f64,
    #[serde(rename = "Number_of_trades", default)]
    pub number_of_trades: f64,
    #[serde(rename = "Taker_buy_base_asset_volume", default)]
    pub taker_buy_base_asset_volume: f64,
    #[serde(rename = "Taker_buy_quote_asset_volume", default)]
    pub taker_buy_quote_asset_volume: f64,
}

impl Bar {
    /// Bar with only OHLC populated; the volume columns are zero.
    pub fn ohlc(time: impl Into<String>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time: time.into(),
            open,
            high,
            low,
            close,
            volume: 0.0,
            close_time: 0.0,
            quote_asset_volume: 0.0,
            number_of_trades: 0.0,
            taker_buy_base_asset_volume: 0.0,
            taker_buy_quote_asset_volume: 0.0,
        }
    }

    /// Read a numeric column.
    pub fn get(&self, column: Column) -> f64 {
        match column {
            Column::Open => self.open,
            Column::High => self.high,
            Column::Low => self.low,
            Column::Close => self.close,
            Column::Volume => self.volume,
            Column::CloseTime => self.close_time,
            Column::QuoteAssetVolume => self.quote_asset_volume,
            Column::NumberOfTrades => self.number_of_trades,
            Column::TakerBuyBaseAssetVolume => self.taker_buy_base_asset_volume,
            Column::TakerBuyQuoteAssetVolume => self.taker_buy_quote_asset_volume,
        }
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Numeric bar column addressable from strategy programs and indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
    #[serde(rename = "Close_time")]
    CloseTime,
    #[serde(rename = "Quote_asset_volume")]
    QuoteAssetVolume,
    #[serde(rename = "Number_of_trades")]
    NumberOfTrades,
    #[serde(rename = "Taker_buy_base_asset_volume")]
    TakerBuyBaseAssetVolume,
    #[serde(rename = "Taker_buy_quote_asset_volume")]
    TakerBuyQuoteAssetVolume,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
        Column::CloseTime,
        Column::QuoteAssetVolume,
        Column::NumberOfTrades,
        Column::TakerBuyBaseAssetVolume,
        Column::TakerBuyQuoteAssetVolume,
    ];

    /// Header name as it appears in the bar table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Open => "Open",
            Column::High => "High",
            Column::Low => "Low",
            Column::Close => "Close",
            Column::Volume => "Volume",
            Column::CloseTime => "Close_time",
            Column::QuoteAssetVolume => "Quote_asset_volume",
            Column::NumberOfTrades => "Number_of_trades",
            Column::TakerBuyBaseAssetVolume => "Taker_buy_base_asset_volume",
            Column::TakerBuyQuoteAssetVolume => "Taker_buy_quote_asset_volume",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bar column '{0}'")]
pub struct UnknownColumn(pub String);

impl FromStr for Column {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownColumn(s.to_string()))
    }
}
