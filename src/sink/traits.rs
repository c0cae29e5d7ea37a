use async_trait::async_trait;

use crate::comparison::rows::{Cell, SheetRow};
use crate::error::SourceError;
use crate::metrics::prometheus::record_rows_emitted;

/// Appends rows to a named tab, creating it with `headers` when missing.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn append(&self, tab: &str, headers: &[String], rows: Vec<Vec<Cell>>) -> Result<(), SourceError>;
}

/// Delivers an HTML-formatted message to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), SourceError>;
}

/// Writes typed rows to their tab. Empty batches are not sent.
pub async fn append_rows<R: SheetRow + Sync>(sink: &dyn RowSink, rows: &[R]) -> Result<usize, SourceError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let cells = rows.iter().map(R::cells).collect();
    sink.append(R::TAB, &R::headers(), cells).await?;
    record_rows_emitted(R::TAB, rows.len());
    Ok(rows.len())
}
