use serde::Serialize;

use crate::error::RateError;
use super::rows::{Cell, SheetRow};

const CRYPTO_TYPE_IDS: &[(&str, u32)] = &[("BTC", 1), ("USDT", 2), ("ETH", 3)];
const CURRENCY_TYPE_IDS: &[(&str, u32)] = &[("INR", 7), ("BDT", 8), ("PKR", 17), ("NPR", 24)];

/// Form body of the back-office cryptocurrency setting update.
///
/// Built from every emitted row but not posted anywhere yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub update_cryptocurrency_type_id: u32,
    pub update_currency_type_id: u32,
    pub change_rate_type_status: u8,
    pub change_rate_horizontal_type_status: u8,
    pub change_rate: f64,
    pub status: u8,
}

fn lookup(table: &[(&str, u32)], code: &str) -> Option<u32> {
    table.iter().find(|(c, _)| *c == code).map(|(_, id)| *id)
}

/// 1 for a positive sign, 0 for anything else.
pub fn horizontal_status(sign: &str) -> u8 {
    u8::from(sign.trim().eq_ignore_ascii_case("positive"))
}

fn parse_rate(rate: &Cell) -> Result<f64, RateError> {
    let value = match rate {
        Cell::Number(n) => *n,
        Cell::Integer(i) => *i as f64,
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RateError::InvalidRateInput(s.clone()))?,
        Cell::Empty => return Err(RateError::InvalidRateInput(String::new())),
    };
    if value.is_finite() {
        Ok(value.abs())
    } else {
        Err(RateError::InvalidRateInput(value.to_string()))
    }
}

/// Absolute rate, or 0.0 for absent and non-numeric input.
pub fn normalize_rate(rate: Option<&Cell>) -> f64 {
    rate.map(parse_rate).and_then(Result::ok).unwrap_or(0.0)
}

/// `None` when the pair has no back-office ids or the rate normalizes to 0.
pub fn build_update_payload<R: SheetRow>(row: &R) -> Option<UpdatePayload> {
    let crypto_id = lookup(CRYPTO_TYPE_IDS, row.crypto())?;
    let currency_id = lookup(CURRENCY_TYPE_IDS, row.currency())?;

    let change_rate = normalize_rate(Some(&row.exchange_rate()));
    if change_rate == 0.0 {
        return None;
    }

    Some(UpdatePayload {
        update_cryptocurrency_type_id: crypto_id,
        update_currency_type_id: currency_id,
        change_rate_type_status: 0,
        change_rate_horizontal_type_status: horizontal_status(row.sign().as_str()),
        change_rate,
        status: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::differential::RateSign;
    use crate::comparison::rows::FiatDifferentialRow;

    fn row(crypto: &str, currency: &str, diff: Option<f64>, sign: RateSign) -> FiatDifferentialRow {
        FiatDifferentialRow {
            date: "d".into(),
            brand: "b".into(),
            crypto: crypto.into(),
            currency: currency.into(),
            usd_price: Some(1.0),
            backoffice_market_price: 1.0,
            reference_rate: 1.0,
            differential_percent: diff,
            sign,
        }
    }

    #[test]
    fn test_horizontal_status() {
        assert_eq!(horizontal_status("Positive"), 1);
        assert_eq!(horizontal_status("positive"), 1);
        assert_eq!(horizontal_status("Negative"), 0);
        assert_eq!(horizontal_status("N/A"), 0);
    }

    #[test]
    fn test_normalize_rate() {
        assert_eq!(normalize_rate(Some(&Cell::text("abc"))), 0.0);
        assert_eq!(normalize_rate(None), 0.0);
        assert_eq!(normalize_rate(Some(&Cell::Empty)), 0.0);
        assert_eq!(normalize_rate(Some(&Cell::Number(-5.0))), 5.0);
        assert_eq!(normalize_rate(Some(&Cell::text(" -2.5 "))), 2.5);
        assert_eq!(normalize_rate(Some(&Cell::Integer(4))), 4.0);
    }

    #[test]
    fn test_invalid_text_is_reported() {
        assert!(matches!(parse_rate(&Cell::text("abc")), Err(RateError::InvalidRateInput(_))));
    }

    #[test]
    fn test_payload_for_known_pair() {
        let payload = build_update_payload(&row("ETH", "BDT", Some(-1.25), RateSign::Negative)).unwrap();
        assert_eq!(payload.update_cryptocurrency_type_id, 3);
        assert_eq!(payload.update_currency_type_id, 8);
        assert_eq!(payload.change_rate_horizontal_type_status, 0);
        assert_eq!(payload.change_rate, 1.25);
        assert_eq!(payload.status, 1);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["updateCryptocurrencyTypeId"], 3);
        assert_eq!(json["changeRateHorizontalTypeStatus"], 0);
    }

    #[test]
    fn test_payload_skips_unknown_or_zero() {
        assert!(build_update_payload(&row("DOGE", "BDT", Some(1.0), RateSign::Positive)).is_none());
        assert!(build_update_payload(&row("BTC", "USD", Some(1.0), RateSign::Positive)).is_none());
        assert!(build_update_payload(&row("BTC", "BDT", Some(0.0), RateSign::Positive)).is_none());
        assert!(build_update_payload(&row("BTC", "BDT", None, RateSign::NotAvailable)).is_none());
    }
}
