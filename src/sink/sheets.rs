use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::comparison::rows::Cell;
use crate::config::SheetsConfig;
use crate::error::SourceError;
use crate::market_data::adapters::{check_status, http_client};
use crate::merchant::override_rate::{
    OverrideSourceRow, OverrideStore, TARGET_HEADERS, existing_row_number, find_effective_rate,
    find_source_row,
};

use super::traits::RowSink;

const SERVICE: &str = "google_sheets";
const API_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Cells come back as JSON strings or numbers depending on the render option.
fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Quotes a tab name for use in an A1 range.
fn a1(tab: &str, range: &str) -> String {
    format!("'{}'!{range}", tab.replace('\'', "''"))
}

/// Google Sheets v4 values API with a bearer token.
pub struct SheetsClient {
    client: Client,
    config: SheetsConfig,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    fn url(&self, sheet_id: &str, tail: &[&str]) -> Result<Url, SourceError> {
        let mut url = Url::parse(API_URL).map_err(|e| SourceError::Decode {
            service: SERVICE,
            reason: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Decode {
                service: SERVICE,
                reason: "base URL cannot hold a path".to_string(),
            })?
            .extend(["v4", "spreadsheets", sheet_id])
            .extend(tail);
        Ok(url)
    }

    /// `None` when the tab does not exist.
    async fn read(&self, sheet_id: &str, range: &str) -> Result<Option<Vec<Vec<String>>>, SourceError> {
        let resp = self
            .client
            .get(self.url(sheet_id, &["values", range])?)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        if resp.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        let body: ValueRange = check_status(SERVICE, resp)?.json().await?;
        Ok(Some(
            body.values
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
        ))
    }

    async fn append_values(&self, sheet_id: &str, tab: &str, values: Vec<Vec<Value>>) -> Result<(), SourceError> {
        let resp = self
            .client
            .post(self.url(sheet_id, &["values", &format!("{}:append", a1(tab, "A1"))])?)
            .query(&[("valueInputOption", "USER_ENTERED"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "values": values }))
            .send()
            .await?;
        check_status(SERVICE, resp)?;
        Ok(())
    }

    async fn update_values(&self, sheet_id: &str, range: &str, values: Vec<Vec<Value>>) -> Result<(), SourceError> {
        let resp = self
            .client
            .put(self.url(sheet_id, &["values", range])?)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "range": range, "values": values }))
            .send()
            .await?;
        check_status(SERVICE, resp)?;
        Ok(())
    }

    async fn add_tab(&self, sheet_id: &str, tab: &str) -> Result<(), SourceError> {
        let mut url = self.url(sheet_id, &[])?;
        // batchUpdate is addressed as `{id}:batchUpdate`
        url.set_path(&format!("{}:batchUpdate", url.path()));
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "requests": [{ "addSheet": { "properties": { "title": tab } } }] }))
            .send()
            .await?;
        check_status(SERVICE, resp)?;
        info!(tab, "created worksheet");
        Ok(())
    }

    /// Creates the tab if missing and writes the header row into an empty tab.
    async fn ensure_tab(&self, sheet_id: &str, tab: &str, headers: &[String]) -> Result<(), SourceError> {
        let first_row = match self.read(sheet_id, &a1(tab, "1:1")).await? {
            Some(values) => values,
            None => {
                self.add_tab(sheet_id, tab).await?;
                Vec::new()
            }
        };
        if first_row.first().is_none_or(|r| r.is_empty()) {
            let header = headers.iter().map(|h| Value::String(h.clone())).collect();
            self.append_values(sheet_id, tab, vec![header]).await?;
        }
        Ok(())
    }

    fn override_sheet(&self) -> Result<&str, SourceError> {
        self.config
            .override_sheet_id
            .as_deref()
            .ok_or(SourceError::NotConfigured("OVERRIDE_SHEET_ID"))
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn append(&self, tab: &str, headers: &[String], rows: Vec<Vec<Cell>>) -> Result<(), SourceError> {
        let sheet_id = &self.config.sheet_id;
        self.ensure_tab(sheet_id, tab, headers).await?;
        let count = rows.len();
        let values = rows
            .iter()
            .map(|row| row.iter().map(Cell::to_json).collect())
            .collect();
        self.append_values(sheet_id, tab, values).await?;
        info!(tab, rows = count, "rows appended to sheet");
        Ok(())
    }
}

#[async_trait]
impl OverrideStore for SheetsClient {
    async fn source_row(&self, today: NaiveDate) -> Result<Option<OverrideSourceRow>, SourceError> {
        let tab = &self.config.override_source_tab;
        let values = self
            .read(self.override_sheet()?, &a1(tab, "A:C"))
            .await?
            .unwrap_or_default();
        Ok(find_source_row(&values, today))
    }

    async fn save_effective(&self, row: &OverrideSourceRow, effective: Option<f64>) -> Result<(), SourceError> {
        let sheet_id = &self.config.sheet_id;
        let tab = &self.config.override_target_tab;
        let headers: Vec<String> = TARGET_HEADERS.iter().map(|h| h.to_string()).collect();
        self.ensure_tab(sheet_id, tab, &headers).await?;

        let line = vec![
            Value::String(row.date.clone()),
            Value::String(row.purchase_rate.clone().unwrap_or_default()),
            Cell::number(effective).to_json(),
        ];
        let existing = self.read(sheet_id, &a1(tab, "A:C")).await?.unwrap_or_default();
        match existing_row_number(&existing, &row.date) {
            Some(n) => {
                self.update_values(sheet_id, &a1(tab, &format!("A{n}:C{n}")), vec![line]).await?;
                info!(date = %row.date, "updated override row");
            }
            None => {
                self.append_values(sheet_id, tab, vec![line]).await?;
                info!(date = %row.date, "added override row");
            }
        }
        Ok(())
    }

    async fn effective_rate(&self, today: NaiveDate) -> Result<Option<f64>, SourceError> {
        let tab = &self.config.override_target_tab;
        let values = self
            .read(&self.config.sheet_id, &a1(tab, "A:C"))
            .await?
            .unwrap_or_default();
        Ok(find_effective_rate(&values, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SheetsClient {
        SheetsClient::new(SheetsConfig {
            sheet_id: "sheet-1".into(),
            access_token: "t".into(),
            override_sheet_id: None,
            override_source_tab: "BONASA".into(),
            override_target_tab: "BONASA".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_a1_quotes_tab() {
        assert_eq!(a1("USDT_CONVERSION", "1:1"), "'USDT_CONVERSION'!1:1");
        assert_eq!(a1("it's", "A:C"), "'it''s'!A:C");
    }

    #[test]
    fn test_values_url_is_encoded() {
        let url = client()
            .url("sheet-1", &["values", &a1("EFFECTIVE CONVERSION RATE", "A:C")])
            .unwrap();
        assert!(url.as_str().starts_with("https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/"));
        assert!(url.as_str().contains("EFFECTIVE%20CONVERSION%20RATE"));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("4/3/2025")), "4/3/2025");
        assert_eq!(cell_text(&json!(121.5)), "121.5");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_missing_override_sheet() {
        assert!(matches!(client().override_sheet(), Err(SourceError::NotConfigured(_))));
    }
}
