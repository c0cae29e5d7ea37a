pub mod backoffice;
pub mod binance;
pub mod binance_p2p;
pub mod xe;

use std::time::Duration;

use reqwest::Client;

use crate::error::SourceError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> Result<Client, SourceError> {
    Ok(Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
        .build()?)
}

pub(crate) fn check_status(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(SourceError::Status {
            service,
            status: status.as_u16(),
        })
    }
}

/// Exchanges send prices as strings or numbers depending on the endpoint.
pub(crate) fn parse_number(service: &'static str, value: &serde_json::Value) -> Result<f64, SourceError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).ok_or_else(|| SourceError::Decode {
        service,
        reason: format!("not a number: {value}"),
    })
}
