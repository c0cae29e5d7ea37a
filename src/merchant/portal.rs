use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};

use crate::config::MerchantConfig;
use crate::error::SourceError;
use crate::market_data::adapters::check_status;

const SERVICE: &str = "merchant_portal";
const UPDATE_PATH: &str = "/DepositPaymentSetting/UpdateDepositPaymentSetting";

/// Deposit payment setting that carries the merchant conversion rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositSetting {
    pub setting_id: String,
    pub currency: String,
    pub conversion_rate: f64,
    pub payment_method: String,
    pub service_provider: String,
    pub credit_rate_id: u32,
}

impl DepositSetting {
    pub fn usdt(setting_id: &str, currency: &str, conversion_rate: f64) -> Self {
        Self {
            setting_id: setting_id.to_string(),
            currency: currency.to_string(),
            conversion_rate,
            payment_method: "USDT".to_string(),
            service_provider: "IPAY".to_string(),
            credit_rate_id: 36,
        }
    }

    pub fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SettingID", self.setting_id.clone()),
            ("PaymentMethod", self.payment_method.clone()),
            ("Currency", self.currency.clone()),
            ("ServiceProvider", self.service_provider.clone()),
            ("AccountName", self.payment_method.clone()),
            ("AccountNumber", self.payment_method.clone()),
            ("TimeStart", "00:00".to_string()),
            ("TimeEnd", "23:59".to_string()),
            ("DepositMinAmt", "100".to_string()),
            ("AmountSetting", String::new()),
            ("Status", "1".to_string()),
            ("ConversionRate", format!("{:.2}", self.conversion_rate)),
            ("CreditRateList[0].ID", self.credit_rate_id.to_string()),
            ("CreditRateList[0].Action", "None".to_string()),
            ("CreditRateList[0].FromAmount", "0.0001".to_string()),
            ("CreditRateList[0].ToAmount", "999999".to_string()),
            ("CreditRateList[0].Rate", "2".to_string()),
            ("CreditRateList[0].WithdrawalRate", "2".to_string()),
        ]
    }
}

/// The merchant's own admin portal.
#[async_trait]
pub trait MerchantPortal: Send + Sync {
    async fn authenticate(&self) -> Result<(), SourceError>;

    async fn update_conversion_rate(&self, setting: &DepositSetting) -> Result<(), SourceError>;
}

/// Portal responses are JSON objects that report failure in `ErrorMsg`.
fn check_error_msg(body: &Value) -> Result<(), SourceError> {
    match body.get("ErrorMsg").and_then(Value::as_str) {
        Some(msg) if !msg.is_empty() => Err(SourceError::Rejected {
            service: SERVICE,
            reason: msg.to_string(),
        }),
        _ => Ok(()),
    }
}

pub struct HttpMerchantPortal {
    client: Client,
    config: MerchantConfig,
}

impl HttpMerchantPortal {
    pub fn new(config: MerchantConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
            .build()?;
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn post_form(&self, url: String, referer: String, form: &[(&str, String)]) -> Result<(), SourceError> {
        let resp = self
            .client
            .post(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Origin", self.base())
            .header("Referer", referer)
            .form(form)
            .send()
            .await?;
        let body: Value = check_status(SERVICE, resp)?
            .json()
            .await
            .map_err(|e| SourceError::Decode {
                service: SERVICE,
                reason: e.to_string(),
            })?;
        check_error_msg(&body)
    }
}

#[async_trait]
impl MerchantPortal for HttpMerchantPortal {
    async fn authenticate(&self) -> Result<(), SourceError> {
        let login = format!("{}/Login", self.base());
        let referer = format!("{login}?merchant={}", self.config.merchant_code);
        let form = [
            ("username", self.config.username.clone()),
            ("pass", self.config.password.clone()),
            ("merchant", self.config.merchant_code.clone()),
        ];
        match self.post_form(login, referer, &form).await {
            Ok(()) => {
                info!("merchant portal authentication successful");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "merchant portal authentication failed");
                Err(err)
            }
        }
    }

    async fn update_conversion_rate(&self, setting: &DepositSetting) -> Result<(), SourceError> {
        info!(currency = %setting.currency, rate = setting.conversion_rate, "updating merchant conversion rate");
        let url = format!("{}{UPDATE_PATH}", self.base());
        let referer = format!("{}/DepositPaymentSetting", self.base());
        self.post_form(url, referer, &setting.form()).await?;
        info!(currency = %setting.currency, rate = setting.conversion_rate, "merchant conversion rate updated");
        Ok(())
    }
}
