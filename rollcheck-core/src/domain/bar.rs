//! DailyBar: one instrument, one trading day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single instrument.
///
/// Prices are split-adjusted by the provider. Any price column may be absent
/// when the provider returned a null for that day; `volume` defaults to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub instrument: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: u64,
}

impl DailyBar {
    /// Bar with every price present.
    pub fn new(
        instrument: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume,
        }
    }

    /// True if at least one of open/high/low/close is present.
    pub fn has_any_price(&self) -> bool {
        self.open.is_some() || self.high.is_some() || self.low.is_some() || self.close.is_some()
    }

    /// Present prices are positive and finite, and high >= low when both exist.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        let positive = prices
            .iter()
            .flatten()
            .all(|p| p.is_finite() && *p > 0.0);
        let ordered = match (self.high, self.low) {
            (Some(h), Some(l)) => h >= l,
            _ => true,
        };
        positive && ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> DailyBar {
        DailyBar::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            100.0,
            105.0,
            98.0,
            103.0,
            50_000,
        )
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_without_prices_is_detected() {
        let mut bar = sample_bar();
        bar.open = None;
        bar.high = None;
        bar.low = None;
        assert!(bar.has_any_price());
        bar.close = None;
        assert!(!bar.has_any_price());
    }

    #[test]
    fn bar_detects_inverted_high_low() {
        let mut bar = sample_bar();
        bar.high = Some(97.0);
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_rejects_non_positive_price() {
        let mut bar = sample_bar();
        bar.close = Some(0.0);
        assert!(!bar.is_sane());
    }

    #[test]
    fn missing_prices_serialize_as_null() {
        let mut bar = sample_bar();
        bar.close = None;
        let json = serde_json::to_string(&bar).unwrap();
        assert!(json.contains("\"close\":null"));
        let back: DailyBar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bar);
    }
}
