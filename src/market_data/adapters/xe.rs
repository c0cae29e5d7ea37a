use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::XeConfig;
use crate::error::SourceError;
use crate::market_data::traits::FxRateSource;
use crate::market_data::types::FxRateTable;
use crate::metrics::prometheus::record_fetch;

use super::{check_status, http_client};

const SERVICE: &str = "xe";

#[derive(Debug, Deserialize)]
struct ConvertFrom {
    to: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    quotecurrency: String,
    mid: f64,
}

/// USD-based mid rates from the XE currency data API.
pub struct XeRates {
    client: Client,
    api_url: String,
    account_id: Option<String>,
    api_key: Option<String>,
    currencies: Vec<String>,
}

impl XeRates {
    pub fn new(config: &XeConfig, currencies: Vec<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            api_key: config.api_key.clone(),
            currencies,
        })
    }
}

fn into_table(resp: ConvertFrom) -> FxRateTable {
    FxRateTable {
        rates: resp
            .to
            .into_iter()
            .filter(|q| q.mid.is_finite() && q.mid > 0.0)
            .map(|q| (q.quotecurrency.to_uppercase(), q.mid))
            .collect(),
    }
}

#[async_trait]
impl FxRateSource for XeRates {
    async fn fx_rates(&self) -> Result<FxRateTable, SourceError> {
        let (Some(account), Some(key)) = (&self.account_id, &self.api_key) else {
            return Err(SourceError::NotConfigured("XE_ACCOUNT_ID/XE_API_KEY"));
        };

        let result = async {
            let resp = self
                .client
                .get(format!("{}/v1/convert_from.json/", self.api_url))
                .basic_auth(account, Some(key))
                .query(&[
                    ("from", "USD".to_string()),
                    ("to", self.currencies.join(",")),
                    ("amount", "1".to_string()),
                ])
                .send()
                .await?;
            let body: ConvertFrom = check_status(SERVICE, resp)?.json().await?;
            Ok::<_, SourceError>(into_table(body))
        }
        .await;
        record_fetch(SERVICE, result.is_ok());
        result
    }
}
