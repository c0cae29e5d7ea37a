pub mod differential;
pub mod payload;
pub mod resolver;
pub mod rows;

use std::array;

use tracing::{info, warn};

use crate::error::RateError;
use crate::market_data::converter::ConvertedPrices;
use crate::market_data::retry::RetryPolicy;
use crate::market_data::traits::PeerQuoteSource;
use crate::market_data::types::{
    BackofficeMarketPrice, BackofficeSnapshot, ConversionOverride, FxRateTable, PeerQuoteResult,
    SpotPrices,
};
use crate::metrics::prometheus::{record_differential, record_row_skipped};
use crate::state::rate_cache::RateCache;
use differential::{round2, simple_differential, symmetric_differential};
use resolver::ConversionResolver;
use rows::{FiatDifferentialRow, PeerDifferentialRow, TopAdCells};

/// Crypto whose rows are priced from the peer market instead of spot.
pub const PEER_CRYPTO: &str = "USDT";

/// FX rate reported on peer rows whose currency the FX feed did not return.
pub const MISSING_FX_RATE: f64 = 1.0;

/// Everything one cycle fetched, already resolved.
pub struct CycleInputs<'a> {
    pub date: &'a str,
    pub usdt_usd: f64,
    pub fx: &'a FxRateTable,
    pub spot: &'a SpotPrices,
    pub converted: &'a ConvertedPrices,
    pub snapshot: &'a BackofficeSnapshot,
    pub conversion_override: Option<&'a ConversionOverride>,
}

#[derive(Debug, Default)]
pub struct Assembly {
    pub fiat_rows: Vec<FiatDifferentialRow>,
    pub peer_rows: Vec<PeerDifferentialRow>,
    pub skipped: Vec<RateError>,
}

/// Turns one back-office snapshot into comparison rows.
pub struct RowAssembler<'a> {
    cache: &'a RateCache,
    peers: &'a dyn PeerQuoteSource,
    resolver: &'a ConversionResolver,
    retry: RetryPolicy,
}

impl<'a> RowAssembler<'a> {
    pub fn new(
        cache: &'a RateCache,
        peers: &'a dyn PeerQuoteSource,
        resolver: &'a ConversionResolver,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            peers,
            resolver,
            retry,
        }
    }

    /// Fails only when a peer quote cannot be fetched; missing converted
    /// prices are skipped and reported in [`Assembly::skipped`].
    pub async fn assemble(&self, inputs: &CycleInputs<'_>) -> Result<Assembly, RateError> {
        let mut out = Assembly::default();

        for (crypto, entries) in &inputs.snapshot.prices {
            if crypto == PEER_CRYPTO && !inputs.converted.contains_key(crypto) {
                info!(crypto = %crypto, entries = entries.len(), "processing peer rows");
                for entry in entries {
                    let quote = self.peer_quote(&entry.currency).await?;
                    let row = self.peer_row(inputs, entry, &quote);
                    record_differential(&row.crypto, &row.currency, row.differential_percent);
                    info!(?row, "peer row");
                    out.peer_rows.push(row);
                }
                continue;
            }

            let usd_price = inputs.spot.get(crypto).map(|q| q.price);
            for entry in entries {
                match fiat_row(inputs, entry, usd_price) {
                    Ok(row) => {
                        if let Some(diff) = row.differential_percent {
                            record_differential(&row.crypto, &row.currency, diff);
                        }
                        info!(?row, "fiat row");
                        out.fiat_rows.push(row);
                    }
                    Err(err) => {
                        warn!(error = %err, "skipping row");
                        record_row_skipped("missing_data");
                        out.skipped.push(err);
                    }
                }
            }
        }

        Ok(out)
    }

    async fn peer_quote(&self, currency: &str) -> Result<PeerQuoteResult, RateError> {
        let peers = self.peers;
        let retry = self.retry;
        self.cache
            .get_or_fetch(currency, |c| async move {
                retry
                    .run("p2p_top_five", || peers.fetch_top_five(&c))
                    .await
                    .map_err(|source| RateError::CacheFetch {
                        currency: c.clone(),
                        source,
                    })
            })
            .await
    }

    fn peer_row(
        &self,
        inputs: &CycleInputs<'_>,
        entry: &BackofficeMarketPrice,
        quote: &PeerQuoteResult,
    ) -> PeerDifferentialRow {
        let override_rate = ConversionOverride::rate_for(inputs.conversion_override, &entry.currency);
        let reference = self
            .resolver
            .resolve_reference_rate(&entry.currency, override_rate, quote.reference_rate);
        build_peer_row(inputs, entry, reference, quote)
    }
}

/// Skips (as `MissingData`) pairs without a converted spot price.
pub fn fiat_row(
    inputs: &CycleInputs<'_>,
    entry: &BackofficeMarketPrice,
    usd_price: Option<f64>,
) -> Result<FiatDifferentialRow, RateError> {
    let converted = inputs
        .converted
        .get(&entry.crypto)
        .and_then(|per_currency| per_currency.get(&entry.currency))
        .copied()
        .ok_or_else(|| RateError::MissingData {
            crypto: entry.crypto.clone(),
            currency: entry.currency.clone(),
        })?;

    let diff = symmetric_differential(converted, entry.market_price);
    Ok(FiatDifferentialRow {
        date: inputs.date.to_string(),
        brand: inputs.snapshot.brand.clone(),
        crypto: entry.crypto.clone(),
        currency: entry.currency.clone(),
        usd_price: usd_price.map(round2),
        backoffice_market_price: round2(entry.market_price),
        reference_rate: round2(converted),
        differential_percent: diff.percent.map(round2),
        sign: diff.sign,
    })
}

pub fn build_peer_row(
    inputs: &CycleInputs<'_>,
    entry: &BackofficeMarketPrice,
    reference: f64,
    quote: &PeerQuoteResult,
) -> PeerDifferentialRow {
    let diff = simple_differential(reference, entry.market_price);
    let top = array::from_fn(|i| {
        quote
            .top_ads
            .get(i)
            .map(|ad| TopAdCells {
                nick: ad.nickname.clone(),
                orders: Some(ad.order_count),
                price: Some(ad.price),
            })
            .unwrap_or_default()
    });

    PeerDifferentialRow {
        date: inputs.date.to_string(),
        brand: inputs.snapshot.brand.clone(),
        crypto: entry.crypto.clone(),
        currency: entry.currency.clone(),
        usdt_usd_price: inputs.usdt_usd,
        fx_rate_used: inputs.fx.rate(&entry.currency).map(round2).unwrap_or(MISSING_FX_RATE),
        backoffice_market_price: round2(entry.market_price),
        reference_rate: round2(reference),
        differential_percent: round2(diff.percent.unwrap_or(0.0)),
        sign: diff.sign,
        top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::differential::RateSign;
    use crate::comparison::rows::{Cell, SheetRow};
    use crate::error::SourceError;
    use crate::market_data::converter::convert_prices;
    use crate::market_data::types::{PeerAd, PriceQuote};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FakePeers {
        ads: Vec<PeerAd>,
        calls: AtomicU32,
        fail: bool,
    }

    impl FakePeers {
        fn with_ads(n: usize) -> Self {
            let ads = (0..n)
                .map(|i| PeerAd {
                    nickname: format!("nick{i}"),
                    order_count: 100 + i as u64,
                    price: 120.0 + i as f64,
                })
                .collect();
            Self {
                ads,
                calls: AtomicU32::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PeerQuoteSource for FakePeers {
        async fn fetch_top_five(&self, _currency: &str) -> Result<PeerQuoteResult, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Rejected {
                    service: "fake",
                    reason: "down".into(),
                });
            }
            Ok(PeerQuoteResult {
                reference_rate: 121.0,
                top_ads: self.ads.clone(),
            })
        }
    }

    struct Fixture {
        fx: FxRateTable,
        spot: SpotPrices,
        converted: ConvertedPrices,
        snapshot: BackofficeSnapshot,
    }

    fn fixture() -> Fixture {
        let fx = FxRateTable {
            rates: [("BDT".to_string(), 120.0), ("INR".to_string(), 85.0)].into(),
        };
        let spot: SpotPrices = [(
            "BTC".to_string(),
            PriceQuote {
                symbol: "BTCUSDT".into(),
                price: 100.0,
            },
        )]
        .into();
        let converted = convert_prices(&spot, &fx);

        let mut snapshot = BackofficeSnapshot::new("brand-a");
        for (crypto, currency, price) in [
            ("BTC", "BDT", 11_000.0),
            ("BTC", "NPR", 1.0),
            ("USDT", "BDT", 122.0),
            ("USDT", "INR", 86.0),
        ] {
            snapshot.push(BackofficeMarketPrice {
                crypto: crypto.into(),
                currency: currency.into(),
                market_price: price,
            });
        }
        Fixture {
            fx,
            spot,
            converted,
            snapshot,
        }
    }

    fn inputs<'a>(f: &'a Fixture, overr: Option<&'a ConversionOverride>) -> CycleInputs<'a> {
        CycleInputs {
            date: "2025-03-14 11:30:00",
            usdt_usd: 1.0,
            fx: &f.fx,
            spot: &f.spot,
            converted: &f.converted,
            snapshot: &f.snapshot,
            conversion_override: overr,
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy::new(2, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_assemble_fiat_and_peer_rows() {
        let f = fixture();
        let cache = RateCache::new();
        let peers = FakePeers::with_ads(2);
        let resolver = ConversionResolver::new("BDT");
        let assembler = RowAssembler::new(&cache, &peers, &resolver, no_wait());

        let overr = ConversionOverride {
            currency: "BDT".into(),
            effective_rate: 124.0,
        };
        let out = assembler.assemble(&inputs(&f, Some(&overr))).await.unwrap();

        // BTC-NPR has no FX rate so no converted value
        assert_eq!(out.fiat_rows.len(), 1);
        assert_eq!(out.skipped.len(), 1);
        assert!(matches!(&out.skipped[0], RateError::MissingData { currency, .. } if currency == "NPR"));

        let btc = &out.fiat_rows[0];
        assert_eq!(btc.reference_rate, 12_000.0);
        assert_eq!(btc.usd_price, Some(100.0));
        assert_eq!(btc.differential_percent, Some(3.0));
        assert_eq!(btc.sign, RateSign::Positive);
        assert_eq!(btc.brand, "brand-a");

        assert_eq!(out.peer_rows.len(), 2);
        let bdt = out.peer_rows.iter().find(|r| r.currency == "BDT").unwrap();
        assert_eq!(bdt.reference_rate, 124.0);
        assert_eq!(bdt.fx_rate_used, 120.0);
        let inr = out.peer_rows.iter().find(|r| r.currency == "INR").unwrap();
        assert_eq!(inr.reference_rate, 121.0);

        // one fetch per currency
        assert_eq!(peers.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_peer_rows_pad_missing_ads() {
        let f = fixture();
        let cache = RateCache::new();
        let peers = FakePeers::with_ads(2);
        let resolver = ConversionResolver::new("BDT");
        let assembler = RowAssembler::new(&cache, &peers, &resolver, no_wait());

        let out = assembler.assemble(&inputs(&f, None)).await.unwrap();
        let row = &out.peer_rows[0];

        assert_eq!(row.top[0].nick, "nick0");
        assert_eq!(row.top[1].nick, "nick1");
        assert_eq!(row.top[1].orders, Some(101));
        assert_eq!(row.top[2].nick, "");
        assert_eq!(row.top[3].nick, "");
        assert_eq!(row.top[4].nick, "");
        assert_eq!(row.top[4].price, None);
    }

    #[tokio::test]
    async fn test_override_currency_without_override_is_zero_row() {
        let f = fixture();
        let cache = RateCache::new();
        let peers = FakePeers::with_ads(5);
        let resolver = ConversionResolver::new("BDT");
        let assembler = RowAssembler::new(&cache, &peers, &resolver, no_wait());

        let out = assembler.assemble(&inputs(&f, None)).await.unwrap();
        let bdt = out.peer_rows.iter().find(|r| r.currency == "BDT").unwrap();

        assert_eq!(bdt.reference_rate, 0.0);
        assert_eq!(bdt.differential_percent, 0.0);
        assert_eq!(bdt.sign, RateSign::Positive);
        assert_eq!(bdt.top[4].nick, "nick4");
    }

    #[tokio::test]
    async fn test_peer_fetch_failure_propagates_after_retries() {
        let f = fixture();
        let cache = RateCache::new();
        let mut peers = FakePeers::with_ads(1);
        peers.fail = true;
        let resolver = ConversionResolver::new("BDT");
        let assembler = RowAssembler::new(&cache, &peers, &resolver, no_wait());

        let err = assembler.assemble(&inputs(&f, None)).await.unwrap_err();
        assert!(matches!(err, RateError::CacheFetch { ref currency, .. } if currency == "BDT"));
        assert_eq!(peers.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn test_peer_row_without_fx_rate_reports_one() {
        let f = fixture();
        let entry = BackofficeMarketPrice {
            crypto: "USDT".into(),
            currency: "PKR".into(),
            market_price: 280.0,
        };
        let quote = PeerQuoteResult {
            reference_rate: 282.0,
            top_ads: vec![],
        };

        let row = build_peer_row(&inputs(&f, None), &entry, 282.0, &quote);
        assert_eq!(row.fx_rate_used, MISSING_FX_RATE);
        assert_eq!(row.cells()[5], Cell::Number(1.0));
    }

    #[test]
    fn test_fiat_row_zero_pair_is_emitted_as_na() {
        let mut f = fixture();
        f.converted.get_mut("BTC").unwrap().insert("BDT".into(), 0.0);
        let entry = BackofficeMarketPrice {
            crypto: "BTC".into(),
            currency: "BDT".into(),
            market_price: 0.0,
        };

        let row = fiat_row(&inputs(&f, None), &entry, None).unwrap();
        assert_eq!(row.differential_percent, None);
        assert_eq!(row.sign, RateSign::NotAvailable);
        assert_eq!(row.usd_price, None);
    }
}
