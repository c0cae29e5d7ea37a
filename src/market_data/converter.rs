use std::collections::{BTreeMap, HashMap};

use super::types::{FxRateTable, SpotPrices};

/// Spot prices re-expressed in each fiat currency: crypto -> currency -> price.
pub type ConvertedPrices = HashMap<String, BTreeMap<String, f64>>;

/// Multiplies every USDT-quoted spot price by every FX rate.
///
/// Non-finite inputs are dropped so that a bad feed value shows up as
/// missing data downstream instead of a NaN row.
pub fn convert_prices(spot: &SpotPrices, fx: &FxRateTable) -> ConvertedPrices {
    spot.iter()
        .filter(|(_, quote)| quote.price.is_finite())
        .map(|(crypto, quote)| {
            let per_currency = fx
                .rates
                .iter()
                .filter(|(_, rate)| rate.is_finite())
                .map(|(currency, rate)| (currency.clone(), quote.price * rate))
                .collect();
            (crypto.clone(), per_currency)
        })
        .collect()
}
