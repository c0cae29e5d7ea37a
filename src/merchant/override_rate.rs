use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::comparison::differential::round2;
use crate::error::SourceError;

/// Markup applied on top of the purchase rate to get the settlement rate.
pub const EFFECTIVE_RATE_MARKUP: f64 = 1.01;

pub const TARGET_HEADERS: [&str; 3] = ["DATE", "PURCHASE RATE", "EFFECTIVE CONVERSION RATE"];

/// Today's line of the operational override sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideSourceRow {
    /// Date as written in the sheet (`d/m/YYYY`, no leading zeros).
    pub date: String,
    /// Raw purchase-rate text; `None` while it has not been filled in.
    pub purchase_rate: Option<String>,
}

impl OverrideSourceRow {
    /// `None` when the purchase rate is blank or not a number.
    pub fn effective_rate(&self) -> Option<f64> {
        let purchase = self.purchase_rate.as_deref()?.trim().parse::<f64>().ok()?;
        purchase
            .is_finite()
            .then(|| effective_conversion_rate(purchase))
    }
}

pub fn effective_conversion_rate(purchase_rate: f64) -> f64 {
    round2(purchase_rate * EFFECTIVE_RATE_MARKUP)
}

/// `d/m/YYYY` without zero padding, the way the source sheet writes dates.
pub fn sheet_date(day: NaiveDate) -> String {
    format!("{}/{}/{}", day.day(), day.month(), day.year())
}

fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y").ok()
}

/// Finds today's row in the source tab; the first row is the header.
pub fn find_source_row(values: &[Vec<String>], today: NaiveDate) -> Option<OverrideSourceRow> {
    let wanted = sheet_date(today);
    values.iter().skip(1).filter(|row| row.len() >= 2).find_map(|row| {
        (row[0].trim() == wanted).then(|| OverrideSourceRow {
            date: wanted.clone(),
            purchase_rate: Some(row[1].trim().to_string()).filter(|s| !s.is_empty()),
        })
    })
}

/// Effective rate stored for `today` in the target tab. Dates with or
/// without zero padding both match.
pub fn find_effective_rate(values: &[Vec<String>], today: NaiveDate) -> Option<f64> {
    values.iter().find_map(|row| {
        let date = parse_sheet_date(row.first()?)?;
        if date != today {
            return None;
        }
        row.get(2)?.trim().parse::<f64>().ok().filter(|r| r.is_finite())
    })
}

/// 1-based sheet row number of `date` in the target tab, if present.
pub fn existing_row_number(values: &[Vec<String>], date: &str) -> Option<usize> {
    values
        .iter()
        .skip(1)
        .position(|row| row.first().map(|d| d.trim()) == Some(date))
        .map(|idx| idx + 2)
}

/// Storage of the daily override rate.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn source_row(&self, today: NaiveDate) -> Result<Option<OverrideSourceRow>, SourceError>;

    /// Inserts or replaces today's row in the target tab.
    async fn save_effective(&self, row: &OverrideSourceRow, effective: Option<f64>) -> Result<(), SourceError>;

    async fn effective_rate(&self, today: NaiveDate) -> Result<Option<f64>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_sheet_date_has_no_padding() {
        assert_eq!(sheet_date(day(2025, 3, 4)), "4/3/2025");
        assert_eq!(sheet_date(day(2025, 12, 25)), "25/12/2025");
    }

    #[test]
    fn test_effective_rate() {
        assert_eq!(effective_conversion_rate(120.0), 121.2);
        let row = OverrideSourceRow {
            date: "4/3/2025".into(),
            purchase_rate: Some(" 122.00".into()),
        };
        assert_eq!(row.effective_rate(), Some(123.22));

        let blank = OverrideSourceRow {
            date: "4/3/2025".into(),
            purchase_rate: Some("pending".into()),
        };
        assert_eq!(blank.effective_rate(), None);
    }

    #[test]
    fn test_find_source_row() {
        let values = sheet(&[
            &["Date", "Purchase Rate"],
            &["3/3/2025", "121"],
            &["4/3/2025", " "],
            &["5/3/2025"],
        ]);
        let row = find_source_row(&values, day(2025, 3, 4)).unwrap();
        assert_eq!(row.date, "4/3/2025");
        assert_eq!(row.purchase_rate, None);

        let row = find_source_row(&values, day(2025, 3, 3)).unwrap();
        assert_eq!(row.purchase_rate.as_deref(), Some("121"));

        assert!(find_source_row(&values, day(2025, 3, 5)).is_none());
    }

    #[test]
    fn test_find_effective_rate_tolerates_padding() {
        let values = sheet(&[
            &["DATE", "PURCHASE RATE", "EFFECTIVE CONVERSION RATE"],
            &["04/03/2025", "121", "122.21"],
            &["5/3/2025", "121", ""],
        ]);
        assert_eq!(find_effective_rate(&values, day(2025, 3, 4)), Some(122.21));
        assert_eq!(find_effective_rate(&values, day(2025, 3, 5)), None);
        assert_eq!(find_effective_rate(&values, day(2025, 3, 6)), None);
    }

    #[test]
    fn test_existing_row_number() {
        let values = sheet(&[&["DATE"], &["3/3/2025"], &["4/3/2025"]]);
        assert_eq!(existing_row_number(&values, "4/3/2025"), Some(3));
        assert_eq!(existing_row_number(&values, "5/3/2025"), None);
    }
}
