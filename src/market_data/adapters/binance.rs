use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::BinanceConfig;
use crate::error::SourceError;
use crate::market_data::traits::SpotPriceSource;
use crate::market_data::types::{PriceQuote, SpotPrices};
use crate::metrics::prometheus::record_fetch;

use super::{check_status, http_client, parse_number};

const SERVICE: &str = "binance";

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    price: serde_json::Value,
}

/// Spot tickers from the public Binance REST API.
pub struct BinanceSpot {
    client: Client,
    api_url: String,
    usdt_usd_url: String,
    cryptos: Vec<String>,
}

impl BinanceSpot {
    pub fn new(config: &BinanceConfig, cryptos: Vec<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            usdt_usd_url: config.usdt_usd_url.trim_end_matches('/').to_string(),
            cryptos,
        })
    }

    async fn tickers(&self, base: &str, symbols: &[String]) -> Result<Vec<Ticker>, SourceError> {
        let symbols = serde_json::to_string(symbols).map_err(|e| SourceError::Decode {
            service: SERVICE,
            reason: e.to_string(),
        })?;
        let resp = self
            .client
            .get(format!("{base}/api/v3/ticker/price"))
            .query(&[("symbols", symbols)])
            .send()
            .await?;
        Ok(check_status(SERVICE, resp)?.json().await?)
    }
}

#[async_trait]
impl SpotPriceSource for BinanceSpot {
    async fn spot_prices(&self) -> Result<SpotPrices, SourceError> {
        let symbols: Vec<String> = self.cryptos.iter().map(|c| format!("{c}USDT")).collect();
        let result = self.tickers(&self.api_url, &symbols).await;
        record_fetch(SERVICE, result.is_ok());

        let mut prices = SpotPrices::new();
        for ticker in result? {
            let Some(base) = ticker.symbol.strip_suffix("USDT") else {
                continue;
            };
            let price = parse_number(SERVICE, &ticker.price)?;
            debug!(symbol = %ticker.symbol, price, "spot price");
            prices.insert(
                base.to_string(),
                PriceQuote {
                    symbol: ticker.symbol.clone(),
                    price,
                },
            );
        }

        if let Some(missing) = self.cryptos.iter().find(|c| !prices.contains_key(*c)) {
            return Err(SourceError::Decode {
                service: SERVICE,
                reason: format!("no ticker returned for {missing}"),
            });
        }
        Ok(prices)
    }

    async fn usdt_usd(&self) -> Result<f64, SourceError> {
        let result = self.tickers(&self.usdt_usd_url, &["USDTUSD".to_string()]).await;
        record_fetch("binance_usdt_usd", result.is_ok());

        let ticker = result?.into_iter().next().ok_or(SourceError::Decode {
            service: SERVICE,
            reason: "empty USDTUSD ticker response".to_string(),
        })?;
        parse_number(SERVICE, &ticker.price)
    }
}
