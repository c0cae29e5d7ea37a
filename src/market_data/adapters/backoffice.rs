use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::BackofficeConfig;
use crate::error::SourceError;
use crate::market_data::traits::BackofficeSource;
use crate::market_data::types::{BackofficeMarketPrice, BackofficeSnapshot};
use crate::metrics::prometheus::record_fetch;

use super::{check_status, parse_number};

const SERVICE: &str = "backoffice";
const LOGIN_PATH: &str = "/login";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct PriceList {
    #[serde(default)]
    data: Vec<PriceItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceItem {
    cryptocurrency_type: String,
    currency_type: String,
    market_price: serde_json::Value,
}

/// Session-authenticated client for the internal admin panel.
pub struct BackofficePanel {
    client: Client,
    config: BackofficeConfig,
    logged_in: Mutex<bool>,
}

impl BackofficePanel {
    pub fn new(config: BackofficeConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            config,
            logged_in: Mutex::new(false),
        })
    }

    fn base_url(&self) -> Result<&str, SourceError> {
        self.config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or(SourceError::NotConfigured("BO_BASE_URL"))
    }

    async fn ensure_session(&self) -> Result<(), SourceError> {
        let mut logged_in = self.logged_in.lock().await;
        if *logged_in {
            return Ok(());
        }

        let (Some(username), Some(password)) = (&self.config.username, &self.config.password) else {
            return Err(SourceError::NotConfigured("BO_USERNAME/BO_PASSWORD"));
        };
        let resp = self
            .client
            .post(format!("{}{LOGIN_PATH}", self.base_url()?))
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await?;
        check_status(SERVICE, resp)?;

        info!(brand = %self.config.brand, "back-office session established");
        *logged_in = true;
        Ok(())
    }

    async fn fetch_prices(&self) -> Result<BackofficeSnapshot, SourceError> {
        self.ensure_session().await?;

        let result = self.request_prices().await;
        if let Err(err) = &result {
            // an expired session usually comes back as a 200 login page
            warn!(error = %err, "price listing failed, dropping back-office session");
            *self.logged_in.lock().await = false;
        }
        result
    }

    async fn request_prices(&self) -> Result<BackofficeSnapshot, SourceError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url()?, self.config.prices_path))
            .send()
            .await?;
        let list: PriceList = check_status(SERVICE, resp)?.json().await?;
        into_snapshot(&self.config.brand, list)
    }
}

fn into_snapshot(brand: &str, list: PriceList) -> Result<BackofficeSnapshot, SourceError> {
    let mut snapshot = BackofficeSnapshot::new(brand);
    for item in list.data {
        snapshot.push(BackofficeMarketPrice {
            crypto: item.cryptocurrency_type,
            currency: item.currency_type,
            market_price: parse_number(SERVICE, &item.market_price)?,
        });
    }
    Ok(snapshot)
}

#[async_trait]
impl BackofficeSource for BackofficePanel {
    async fn is_accessible(&self) -> bool {
        let Ok(base) = self.base_url() else {
            return false;
        };
        match self.client.get(base).timeout(PROBE_TIMEOUT).send().await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "back-office not reachable");
                false
            }
        }
    }

    async fn market_prices(&self) -> Result<BackofficeSnapshot, SourceError> {
        let result = self.fetch_prices().await;
        record_fetch(SERVICE, result.is_ok());
        result
    }
}
