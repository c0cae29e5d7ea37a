use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::comparison::payload::build_update_payload;
use crate::comparison::resolver::ConversionResolver;
use crate::comparison::rows::SheetRow;
use crate::comparison::{CycleInputs, RowAssembler};
use crate::error::SourceError;
use crate::market_data::converter::convert_prices;
use crate::market_data::retry::RetryPolicy;
use crate::market_data::traits::{BackofficeSource, FxRateSource, PeerQuoteSource, SpotPriceSource};
use crate::market_data::types::ConversionOverride;
use crate::merchant::override_rate::OverrideStore;
use crate::merchant::portal::{DepositSetting, MerchantPortal};
use crate::metrics::prometheus::record_cycle;
use crate::sink::messages::{
    BACKOFFICE_UNREACHABLE, COMPARISON_COMPLETED, COMPARISON_FAILED, FX_FETCH_FAILED,
    OVERRIDE_COMPLETED, OVERRIDE_FAILED, SPOT_FETCH_FAILED, automation_failed, automation_success,
    override_missing,
};
use crate::sink::traits::{Notifier, RowSink, append_rows};
use crate::state::rate_cache::RateCache;

use super::SchedulerState;
use super::window::is_alert_minute;

/// Merchant portal plus the deposit setting the override rate is written to.
pub struct MerchantTarget {
    pub portal: Box<dyn MerchantPortal>,
    pub setting_id: String,
}

/// Every external system a cycle talks to.
pub struct Collaborators {
    pub spot: Box<dyn SpotPriceSource>,
    pub fx: Box<dyn FxRateSource>,
    pub peers: Box<dyn PeerQuoteSource>,
    pub backoffice: Box<dyn BackofficeSource>,
    pub sink: Box<dyn RowSink>,
    pub override_store: Option<Box<dyn OverrideStore>>,
    pub merchant: Option<MerchantTarget>,
    pub logs: Box<dyn Notifier>,
    pub alerts: Box<dyn Notifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed { fiat_rows: usize, peer_rows: usize },
    Failed(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideOutcome {
    NotConfigured,
    NoSourceRow,
    RateMissing,
    Updated(f64),
    /// Stored in the sheet but the merchant portal refused it.
    PortalRejected(f64),
}

pub struct App {
    io: Collaborators,
    cache: RateCache,
    resolver: ConversionResolver,
    retry: RetryPolicy,
}

impl App {
    pub fn new(io: Collaborators, override_currency: &str, retry: RetryPolicy) -> Self {
        Self {
            io,
            cache: RateCache::new(),
            resolver: ConversionResolver::new(override_currency),
            retry,
        }
    }

    /// One full comparison pass. Every exit is reported on the logs channel.
    pub async fn run_comparison_cycle(&self, now: NaiveDateTime) -> CycleOutcome {
        info!(at = %now, "running comparison cycle");
        match self.compare(now).await {
            Ok((fiat_rows, peer_rows)) => {
                info!(fiat_rows, peer_rows, "comparison cycle completed");
                record_cycle("comparison", "ok");
                self.notify_success(now, COMPARISON_COMPLETED).await;
                CycleOutcome::Completed { fiat_rows, peer_rows }
            }
            Err(reason) => {
                error!(reason, "comparison cycle failed");
                record_cycle("comparison", "failed");
                self.notify_failure(now, reason).await;
                CycleOutcome::Failed(reason)
            }
        }
    }

    async fn compare(&self, now: NaiveDateTime) -> Result<(usize, usize), &'static str> {
        let usdt_usd = match self.retry.run("usdt_usd", || self.io.spot.usdt_usd()).await {
            Ok(rate) => rate,
            Err(err) => {
                warn!(error = %err, "USDT/USD unavailable, using 1.0");
                1.0
            }
        };

        let spot = self
            .retry
            .run("spot_prices", || self.io.spot.spot_prices())
            .await
            .map_err(|err| {
                error!(error = %err, "spot price fetch failed");
                SPOT_FETCH_FAILED
            })?;
        info!(quotes = spot.len(), "spot prices fetched");

        let fx = self
            .retry
            .run("fx_rates", || self.io.fx.fx_rates())
            .await
            .map_err(|err| {
                error!(error = %err, "fx rate fetch failed");
                FX_FETCH_FAILED
            })?;
        info!(currencies = fx.rates.len(), "fx rates fetched");

        let converted = convert_prices(&spot, &fx);

        if !self.io.backoffice.is_accessible().await {
            warn!("back-office not accessible, VPN required");
            return Err(BACKOFFICE_UNREACHABLE);
        }

        let snapshot = self
            .retry
            .run("backoffice_prices", || self.io.backoffice.market_prices())
            .await
            .map_err(|err| {
                error!(error = %err, "back-office price fetch failed");
                COMPARISON_FAILED
            })?;
        if snapshot.is_empty() {
            warn!(brand = %snapshot.brand, "back-office returned no prices");
            return Err(COMPARISON_FAILED);
        }

        let conversion_override = self.conversion_override(now.date()).await;
        let date = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let inputs = CycleInputs {
            date: &date,
            usdt_usd,
            fx: &fx,
            spot: &spot,
            converted: &converted,
            snapshot: &snapshot,
            conversion_override: conversion_override.as_ref(),
        };

        let assembler = RowAssembler::new(&self.cache, &*self.io.peers, &self.resolver, self.retry);
        let assembly = assembler.assemble(&inputs).await.map_err(|err| {
            error!(error = %err, "row assembly failed");
            COMPARISON_FAILED
        })?;
        if !assembly.skipped.is_empty() {
            warn!(skipped = assembly.skipped.len(), "pairs skipped for missing data");
        }

        let sink = &*self.io.sink;
        let fiat_rows = append_rows(sink, &assembly.fiat_rows).await.map_err(|err| {
            error!(error = %err, "writing fiat rows failed");
            COMPARISON_FAILED
        })?;
        let peer_rows = append_rows(sink, &assembly.peer_rows).await.map_err(|err| {
            error!(error = %err, "writing peer rows failed");
            COMPARISON_FAILED
        })?;

        log_payloads(&assembly.fiat_rows);
        log_payloads(&assembly.peer_rows);

        Ok((fiat_rows, peer_rows))
    }

    async fn conversion_override(&self, today: NaiveDate) -> Option<ConversionOverride> {
        let store = self.io.override_store.as_deref()?;
        match store.effective_rate(today).await {
            Ok(Some(rate)) => Some(ConversionOverride {
                currency: self.resolver.override_currency().to_string(),
                effective_rate: rate,
            }),
            Ok(None) => {
                warn!(currency = self.resolver.override_currency(), "no effective rate stored for today");
                None
            }
            Err(err) => {
                warn!(error = %err, "reading effective rate failed");
                None
            }
        }
    }

    /// Stores today's effective rate and pushes it to the merchant portal.
    ///
    /// A missing purchase rate raises one alert per alert block; the flag
    /// re-arms on the first tick outside an alert minute.
    pub async fn run_override_cycle(
        &self,
        now: NaiveDateTime,
        state: &mut SchedulerState,
    ) -> Result<OverrideOutcome, SourceError> {
        let Some(store) = self.io.override_store.as_deref() else {
            debug!("override store not configured");
            return Ok(OverrideOutcome::NotConfigured);
        };

        let Some(row) = store.source_row(now.date()).await? else {
            warn!("no override row for today");
            return Ok(OverrideOutcome::NoSourceRow);
        };

        let Some(effective) = row.effective_rate() else {
            if !is_alert_minute(now) {
                state.override_alert_sent = false;
            } else if !state.override_alert_sent {
                warn!(date = %row.date, "purchase rate not yet updated, alerting");
                notify(&*self.io.alerts, &override_missing(&row.date, now)).await;
                state.override_alert_sent = true;
            }
            return Ok(OverrideOutcome::RateMissing);
        };

        store.save_effective(&row, Some(effective)).await?;
        state.override_updated_today = true;
        state.override_alert_sent = false;
        info!(date = %row.date, rate = effective, "effective conversion rate stored");

        if let Some(target) = &self.io.merchant {
            if let Err(err) = self.push_rate(target, effective).await {
                error!(error = %err, "merchant portal update failed");
                record_cycle("override", "failed");
                self.notify_failure(now, OVERRIDE_FAILED).await;
                return Ok(OverrideOutcome::PortalRejected(effective));
            }
        }

        record_cycle("override", "ok");
        self.notify_success(now, OVERRIDE_COMPLETED).await;
        Ok(OverrideOutcome::Updated(effective))
    }

    async fn push_rate(&self, target: &MerchantTarget, rate: f64) -> Result<(), SourceError> {
        target.portal.authenticate().await?;
        let setting = DepositSetting::usdt(&target.setting_id, self.resolver.override_currency(), rate);
        target.portal.update_conversion_rate(&setting).await
    }

    pub async fn notify_success(&self, now: NaiveDateTime, detail: &str) {
        notify(&*self.io.logs, &automation_success(now, detail)).await;
    }

    pub async fn notify_failure(&self, now: NaiveDateTime, reason: &str) {
        notify(&*self.io.logs, &automation_failed(now, reason)).await;
    }
}

async fn notify(notifier: &dyn Notifier, message: &str) {
    if let Err(err) = notifier.notify(message).await {
        warn!(error = %err, "notification not delivered");
    }
}

/// Update payloads are built for every emitted row but only logged.
fn log_payloads<R: SheetRow>(rows: &[R]) {
    for row in rows {
        if let Some(payload) = build_update_payload(row) {
            debug!(
                crypto = row.crypto(),
                currency = row.currency(),
                ?payload,
                "back-office update payload (not sent)"
            );
        }
    }
}
