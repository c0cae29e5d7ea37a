pub mod cycle;
pub mod window;

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::error::SourceError;
use crate::metrics::prometheus::record_cycle;
use crate::sink::messages::SCHEDULER_ERROR;
use crate::state::rate_cache::HourBucket;
use cycle::App;
use window::{is_comparison_time, is_override_window};

/// Flags carried from one tick to the next.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub override_updated_today: bool,
    pub override_alert_sent: bool,
    /// Hour of the last comparison run, so short ticks cannot run it twice.
    pub last_comparison: Option<HourBucket>,
}

/// Runs whatever is due at `now`: the override window first, then the
/// hourly comparison.
pub async fn run_tick(app: &App, now: NaiveDateTime, state: &mut SchedulerState) -> Result<(), SourceError> {
    if is_override_window(now, state.override_updated_today) {
        let outcome = app.run_override_cycle(now, state).await?;
        info!(?outcome, "override window checked");
    } else {
        debug!("override skipped (outside window)");
    }

    let bucket = HourBucket::of(now);
    if !is_comparison_time(now) || state.last_comparison == Some(bucket) {
        debug!("comparison skipped");
        return Ok(());
    }
    state.last_comparison = Some(bucket);
    state.override_updated_today = false;

    let outcome = app.run_comparison_cycle(now).await;
    debug!(?outcome, "comparison finished");
    Ok(())
}

/// Ticks forever; an error escaping a tick is reported and the loop goes on.
pub async fn run_scheduler(app: App, tick: Duration) {
    let tick = tick.max(Duration::from_secs(1));
    info!(tick_secs = tick.as_secs(), "scheduler started");

    let mut state = SchedulerState::default();
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = Local::now().naive_local();
        debug!(at = %now, "tick");
        run_reported_tick(&app, now, &mut state).await;
    }
}

/// [`run_tick`], with any escaping error sent to the logs channel.
pub async fn run_reported_tick(app: &App, now: NaiveDateTime, state: &mut SchedulerState) {
    if let Err(err) = run_tick(app, now, state).await {
        error!(error = %err, "scheduler tick failed");
        record_cycle("tick", "failed");
        app.notify_failure(now, SCHEDULER_ERROR).await;
    }
}
