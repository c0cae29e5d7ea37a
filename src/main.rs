mod comparison;
mod config;
mod error;
mod market_data;
mod merchant;
mod metrics;
mod scheduler;
mod sink;
mod state;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

use config::Config;
use market_data::adapters::backoffice::BackofficePanel;
use market_data::adapters::binance::BinanceSpot;
use market_data::adapters::binance_p2p::BinanceP2p;
use market_data::adapters::xe::XeRates;
use merchant::override_rate::OverrideStore;
use merchant::portal::HttpMerchantPortal;
use scheduler::cycle::{App, Collaborators, MerchantTarget};
use sink::paper::{LogNotifier, LogSink};
use sink::sheets::SheetsClient;
use sink::telegram::TelegramNotifier;
use sink::traits::{Notifier, RowSink};

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn notifier(telegram: Option<config::TelegramConfig>, channel: &'static str) -> Result<Box<dyn Notifier>> {
    let notifier: Box<dyn Notifier> = match telegram {
        Some(tg) => Box::new(TelegramNotifier::new(tg)?),
        None => {
            warn!(channel, "telegram not configured, notifications go to the log");
            Box::new(LogNotifier { channel })
        }
    };
    Ok(notifier)
}

fn collaborators(config: &Config) -> Result<Collaborators> {
    let sink: Box<dyn RowSink> = match &config.sheets {
        Some(sheets) => Box::new(SheetsClient::new(sheets.clone())?),
        None => {
            warn!("no spreadsheet configured, rows go to the log");
            Box::new(LogSink)
        }
    };

    let override_store: Option<Box<dyn OverrideStore>> = match &config.sheets {
        Some(sheets) if sheets.override_sheet_id.is_some() => Some(Box::new(SheetsClient::new(sheets.clone())?)),
        _ => {
            warn!("no override sheet configured, override window disabled");
            None
        }
    };

    let merchant = match &config.merchant {
        Some(m) => Some(MerchantTarget {
            setting_id: m.setting_id.clone(),
            portal: Box::new(HttpMerchantPortal::new(m.clone())?),
        }),
        None => None,
    };

    Ok(Collaborators {
        spot: Box::new(BinanceSpot::new(&config.binance, config.tracked_cryptos.clone())?),
        fx: Box::new(XeRates::new(&config.xe, config.tracked_currencies.clone())?),
        peers: Box::new(BinanceP2p::new(&config.binance)?),
        backoffice: Box::new(BackofficePanel::new(config.backoffice.clone())?),
        sink,
        override_store,
        merchant,
        logs: notifier(config.telegram_logs.clone(), "logs")?,
        alerts: notifier(config.telegram_alerts.clone(), "alerts")?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    init_tracing(&config.log_level);

    if let Some(port) = config.metrics_port {
        metrics::prometheus::init_metrics_server(port)?;
        info!(port, "metrics exporter listening");
    }

    info!(
        override_currency = %config.override_currency,
        currencies = ?config.tracked_currencies,
        cryptos = ?config.tracked_cryptos,
        "rate-watch starting"
    );

    let app = App::new(collaborators(&config).context("building collaborators")?, &config.override_currency, config.retry);

    tokio::select! {
        _ = scheduler::run_scheduler(app, config.tick) => {
            warn!("scheduler exited");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    Ok(())
}
