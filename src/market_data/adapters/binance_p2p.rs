use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::BinanceConfig;
use crate::error::SourceError;
use crate::market_data::traits::PeerQuoteSource;
use crate::market_data::types::{PeerAd, PeerQuoteResult};
use crate::metrics::prometheus::record_fetch;

use super::{check_status, http_client, parse_number};

const SERVICE: &str = "binance_p2p";
const SEARCH_PATH: &str = "/bapi/c2c/v2/friendly/c2c/adv/search";
const TOP_N: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<Vec<SearchItem>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    adv: Adv,
    advertiser: Advertiser,
}

#[derive(Debug, Deserialize)]
struct Adv {
    price: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Advertiser {
    #[serde(default)]
    nick_name: String,
    #[serde(default)]
    month_order_count: u64,
}

/// USDT advertisements from the Binance P2P marketplace.
pub struct BinanceP2p {
    client: Client,
    base_url: String,
    trade_type: String,
}

impl BinanceP2p {
    pub fn new(config: &BinanceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client()?,
            base_url: config.p2p_url.trim_end_matches('/').to_string(),
            trade_type: config.p2p_trade_type.clone(),
        })
    }

    async fn search(&self, currency: &str) -> Result<Vec<PeerAd>, SourceError> {
        let body = json!({
            "asset": "USDT",
            "fiat": currency,
            "tradeType": self.trade_type,
            "page": 1,
            "rows": TOP_N,
            "payTypes": [],
            "publisherType": null,
        });
        let resp = self
            .client
            .post(format!("{}{SEARCH_PATH}", self.base_url))
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = check_status(SERVICE, resp)?.json().await?;

        let Some(items) = parsed.data else {
            return Err(SourceError::Rejected {
                service: SERVICE,
                reason: parsed.message.unwrap_or_else(|| "no data".to_string()),
            });
        };

        items
            .into_iter()
            .take(TOP_N)
            .map(|item| {
                Ok(PeerAd {
                    nickname: item.advertiser.nick_name,
                    order_count: item.advertiser.month_order_count,
                    price: parse_number(SERVICE, &item.adv.price)?,
                })
            })
            .collect()
    }
}

/// Reference rate is the mean price of the ranked ads; ad order is kept.
pub fn summarize_ads(ads: Vec<PeerAd>) -> PeerQuoteResult {
    let reference_rate = if ads.is_empty() {
        0.0
    } else {
        ads.iter().map(|ad| ad.price).sum::<f64>() / ads.len() as f64
    };
    PeerQuoteResult {
        reference_rate,
        top_ads: ads,
    }
}

#[async_trait]
impl PeerQuoteSource for BinanceP2p {
    async fn fetch_top_five(&self, currency: &str) -> Result<PeerQuoteResult, SourceError> {
        let result = self.search(currency).await;
        record_fetch(SERVICE, result.is_ok());

        let ads = result?;
        if ads.is_empty() {
            warn!(currency, "no P2P ads returned");
        }
        let quote = summarize_ads(ads);
        debug!(currency, rate = quote.reference_rate, ads = quote.top_ads.len(), "P2P quote");
        Ok(quote)
    }
}
