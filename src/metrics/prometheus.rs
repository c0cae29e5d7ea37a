use anyhow::Context;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on the given port.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
pub fn init_metrics_server(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("failed to start Prometheus metrics server")
}

// ── Feed metrics ─────────────────────────────────────────────────

pub fn record_fetch(source: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("feed_fetches_total", "source" => source.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("peer_quote_cache_lookups_total", "result" => result).increment(1);
}

// ── Comparison metrics ───────────────────────────────────────────

pub fn record_differential(crypto: &str, currency: &str, percent: f64) {
    histogram!("rate_differential_percent", "crypto" => crypto.to_string(), "currency" => currency.to_string())
        .record(percent);
}

pub fn record_row_skipped(reason: &'static str) {
    counter!("rows_skipped_total", "reason" => reason).increment(1);
}

pub fn record_rows_emitted(tab: &'static str, rows: usize) {
    counter!("rows_emitted_total", "tab" => tab).increment(rows as u64);
}

// ── Cycle metrics ────────────────────────────────────────────────

pub fn record_cycle(kind: &'static str, outcome: &'static str) {
    counter!("cycles_total", "kind" => kind, "outcome" => outcome).increment(1);
}
