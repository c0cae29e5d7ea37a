use async_trait::async_trait;
use tracing::info;

use crate::comparison::rows::Cell;
use crate::error::SourceError;

use super::traits::{Notifier, RowSink};

/// Row sink used when no spreadsheet is configured: rows go to the log.
pub struct LogSink;

#[async_trait]
impl RowSink for LogSink {
    async fn append(&self, tab: &str, headers: &[String], rows: Vec<Vec<Cell>>) -> Result<(), SourceError> {
        for row in &rows {
            let rendered: Vec<String> = headers
                .iter()
                .zip(row)
                .map(|(h, c)| format!("{h}={}", c.to_json()))
                .collect();
            info!(tab, row = %rendered.join(" "), "PAPER ROW");
        }
        Ok(())
    }
}

/// Notifier used when a Telegram channel is not configured.
pub struct LogNotifier {
    pub channel: &'static str,
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<(), SourceError> {
        info!(channel = self.channel, message, "PAPER NOTIFICATION");
        Ok(())
    }
}
