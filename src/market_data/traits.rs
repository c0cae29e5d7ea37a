use async_trait::async_trait;

use crate::error::SourceError;
use super::types::{BackofficeSnapshot, FxRateTable, PeerQuoteResult, SpotPrices};

/// Crypto spot prices (USDT quoted) and the USDT/USD peg.
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    async fn spot_prices(&self) -> Result<SpotPrices, SourceError>;

    async fn usdt_usd(&self) -> Result<f64, SourceError>;
}

#[async_trait]
pub trait FxRateSource: Send + Sync {
    async fn fx_rates(&self) -> Result<FxRateTable, SourceError>;
}

/// Ranked peer-to-peer offers for a fiat currency.
#[async_trait]
pub trait PeerQuoteSource: Send + Sync {
    async fn fetch_top_five(&self, currency: &str) -> Result<PeerQuoteResult, SourceError>;
}

/// The internal admin panel the comparison is made against.
#[async_trait]
pub trait BackofficeSource: Send + Sync {
    /// Whether the panel can be reached at all (it sits behind a VPN).
    async fn is_accessible(&self) -> bool;

    async fn market_prices(&self) -> Result<BackofficeSnapshot, SourceError>;
}
