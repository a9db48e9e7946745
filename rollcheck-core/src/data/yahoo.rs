//! Yahoo Finance daily bar provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Requests are paced by
//! the shared `RequestGovernor` and retried with exponential backoff.
//!
//! With `auto_adjust` enabled (the default) every price is scaled by
//! `adjclose / close`, giving split- and dividend-adjusted bars.

use super::governor::RequestGovernor;
use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::DailyBar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    governor: Arc<RequestGovernor>,
    max_retries: u32,
    base_delay: Duration,
    auto_adjust: bool,
}

impl YahooProvider {
    pub fn new(governor: Arc<RequestGovernor>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            governor,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            auto_adjust: true,
        })
    }

    /// Keep raw (split-adjusted only) prices instead of dividend-adjusting them.
    pub fn without_auto_adjust(mut self) -> Self {
        self.auto_adjust = false;
        self
    }

    fn chart_url(instrument: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp()
            - 1;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{instrument}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true&events=split"
        )
    }

    fn parse_response(
        instrument: &str,
        resp: ChartResponse,
        auto_adjust: bool,
    ) -> Result<Vec<DailyBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::InstrumentNotFound {
                instrument: instrument.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // A listed instrument with no trading in range comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();
        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let mut open = at(&quote.open, i);
            let mut high = at(&quote.high, i);
            let mut low = at(&quote.low, i);
            let mut close = at(&quote.close, i);
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays and halted sessions come back fully null.
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            if auto_adjust {
                let factor = match (adj_closes.as_ref().and_then(|v| at(v, i)), close) {
                    (Some(adj), Some(c)) if c != 0.0 => Some(adj / c),
                    _ => None,
                };
                if let Some(f) = factor {
                    open = open.map(|v| v * f);
                    high = high.map(|v| v * f);
                    low = low.map(|v| v * f);
                    close = close.map(|v| v * f);
                }
            }

            bars.push(DailyBar {
                instrument: instrument.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume: volume.unwrap_or(0),
            });
        }

        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DataError> {
        let url = Self::chart_url(instrument, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(instrument, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.governor.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            self.governor.wait_turn();

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.governor.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::InstrumentNotFound {
                            instrument: instrument.to_string(),
                        });
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.governor.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.governor.record_failure();
                        last_error =
                            Some(DataError::Other(format!("HTTP {status} for {instrument}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {instrument}: {e}"
                        ))
                    })?;

                    let bars = Self::parse_response(instrument, chart, self.auto_adjust)?;
                    self.governor.record_success();
                    return Ok(bars);
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(instrument, start, end)?;
        Ok(FetchResult {
            instrument: instrument.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.governor.is_allowed()
    }
}
