use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::market_data::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub override_currency: String,
    pub tracked_currencies: Vec<String>,
    pub tracked_cryptos: Vec<String>,
    pub binance: BinanceConfig,
    pub xe: XeConfig,
    pub backoffice: BackofficeConfig,
    pub sheets: Option<SheetsConfig>,
    pub telegram_logs: Option<TelegramConfig>,
    pub telegram_alerts: Option<TelegramConfig>,
    pub merchant: Option<MerchantConfig>,
    pub metrics_port: Option<u16>,
    pub retry: RetryPolicy,
    pub tick: Duration,
}

#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_url: String,
    pub usdt_usd_url: String,
    pub p2p_url: String,
    pub p2p_trade_type: String,
}

#[derive(Debug, Clone)]
pub struct XeConfig {
    pub api_url: String,
    pub account_id: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackofficeConfig {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub brand: String,
    pub prices_path: String,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub sheet_id: String,
    pub access_token: String,
    pub override_sheet_id: Option<String>,
    pub override_source_tab: String,
    pub override_target_tab: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct MerchantConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub merchant_code: String,
    pub setting_id: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let sheets = match (var("SHEET_ID"), var("GOOGLE_ACCESS_TOKEN")) {
            (Some(sheet_id), Some(access_token)) => Some(SheetsConfig {
                sheet_id,
                access_token,
                override_sheet_id: var("OVERRIDE_SHEET_ID"),
                override_source_tab: var_or("OVERRIDE_SOURCE_TAB", "BONASA"),
                override_target_tab: var_or("OVERRIDE_TARGET_TAB", "BONASA"),
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingField { field: "GOOGLE_ACCESS_TOKEN" }.into());
            }
            _ => None,
        };

        let merchant = match var("MERCHANT_BASE_URL") {
            Some(base_url) => Some(MerchantConfig {
                base_url,
                username: required("MERCHANT_USERNAME")?,
                password: required("MERCHANT_PASSWORD")?,
                merchant_code: required("MERCHANT_CODE")?,
                setting_id: var_or("MERCHANT_SETTING_ID", "S008"),
            }),
            None => None,
        };

        let min_wait = parse_or("RETRY_MIN_WAIT_SECS", 2u64)?;
        let max_wait = parse_or("RETRY_MAX_WAIT_SECS", 5u64)?;
        if min_wait > max_wait {
            return Err(ConfigError::InvalidValue {
                field: "RETRY_MIN_WAIT_SECS",
                reason: "must not exceed RETRY_MAX_WAIT_SECS".to_string(),
            }
            .into());
        }
        let retry = RetryPolicy::new(
            parse_or("RETRY_ATTEMPTS", 5u32)?,
            Duration::from_secs(min_wait),
            Duration::from_secs(max_wait),
        );

        Ok(Self {
            log_level,
            override_currency: var_or("OVERRIDE_CURRENCY", "BDT").trim().to_uppercase(),
            tracked_currencies: list_or("TRACKED_CURRENCIES", "BDT,INR,PKR,NPR"),
            tracked_cryptos: list_or("TRACKED_CRYPTOS", "BTC,ETH"),
            binance: BinanceConfig {
                api_url: var_or("BINANCE_API_URL", "https://api.binance.com"),
                usdt_usd_url: var_or("BINANCE_USDT_USD_URL", "https://api.binance.us"),
                p2p_url: var_or("BINANCE_P2P_URL", "https://p2p.binance.com"),
                p2p_trade_type: var_or("P2P_TRADE_TYPE", "SELL"),
            },
            xe: XeConfig {
                api_url: var_or("XE_API_URL", "https://xecdapi.xe.com"),
                account_id: var("XE_ACCOUNT_ID"),
                api_key: var("XE_API_KEY"),
            },
            backoffice: BackofficeConfig {
                base_url: var("BO_BASE_URL"),
                username: var("BO_USERNAME"),
                password: var("BO_PASSWORD"),
                brand: var_or("BO_BRAND", "default"),
                prices_path: var_or("BO_PRICES_PATH", "/manager/payment/cryptocurrencySettingList"),
            },
            sheets,
            telegram_logs: telegram("TG_LOGS_TOKEN", "TG_LOGS_ID"),
            telegram_alerts: telegram("TG_ALERT_TOKEN", "TG_ALERT_ID"),
            merchant,
            metrics_port: parse_opt("METRICS_PORT")?,
            retry,
            tick: Duration::from_secs(parse_or("TICK_SECS", 60u64)?),
        })
    }
}

/// Non-empty environment variable.
fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    var(name).ok_or(ConfigError::MissingField { field: name })
}

fn parse_opt<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                field: name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(name)?.unwrap_or(default))
}

fn list_or(name: &str, default: &str) -> Vec<String> {
    parse_list(&var_or(name, default))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn telegram(token: &str, chat: &str) -> Option<TelegramConfig> {
    Some(TelegramConfig {
        bot_token: var(token)?,
        chat_id: var(chat)?,
    })
}
