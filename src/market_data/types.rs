use std::collections::{BTreeMap, HashMap};

/// Spot price of a crypto asset, quoted in USDT.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
}

/// Latest spot quotes keyed by base symbol (`BTC`, `ETH`).
pub type SpotPrices = HashMap<String, PriceQuote>;

/// Units of each currency per one USD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FxRateTable {
    pub rates: BTreeMap<String, f64>,
}

impl FxRateTable {
    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }
}

/// One ranked peer-to-peer advertisement.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerAd {
    pub nickname: String,
    pub order_count: u64,
    pub price: f64,
}

/// Peer-market rate for a currency with the ads it was derived from,
/// in the order the market ranked them.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerQuoteResult {
    pub reference_rate: f64,
    pub top_ads: Vec<PeerAd>,
}

/// Market price shown in the back-office panel for one crypto/currency pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BackofficeMarketPrice {
    pub crypto: String,
    pub currency: String,
    pub market_price: f64,
}

/// All back-office prices scraped for one brand, grouped by crypto.
#[derive(Debug, Clone, Default)]
pub struct BackofficeSnapshot {
    pub brand: String,
    pub prices: BTreeMap<String, Vec<BackofficeMarketPrice>>,
}

impl BackofficeSnapshot {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            prices: BTreeMap::new(),
        }
    }

    /// Adds an entry under its crypto, normalizing codes to upper case.
    pub fn push(&mut self, mut price: BackofficeMarketPrice) {
        price.crypto = price.crypto.trim().to_uppercase();
        price.currency = price.currency.trim().to_uppercase();
        self.prices.entry(price.crypto.clone()).or_default().push(price);
    }

    pub fn is_empty(&self) -> bool {
        self.prices.values().all(Vec::is_empty)
    }
}

/// Merchant override rate for a currency; zero means "no override".
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOverride {
    pub currency: String,
    pub effective_rate: f64,
}

impl ConversionOverride {
    pub fn rate_for(overr: Option<&Self>, currency: &str) -> f64 {
        overr
            .filter(|o| o.currency == currency)
            .map(|o| o.effective_rate)
            .unwrap_or(0.0)
    }
}
