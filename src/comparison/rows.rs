use serde_json::Value;

use super::differential::RateSign;

pub const TOP_ADS: usize = 5;

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Integer(u64),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn number(v: Option<f64>) -> Self {
        v.map(Self::Number).unwrap_or(Self::Empty)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(String::new())),
            Self::Integer(i) => Value::from(*i),
            Self::Empty => Value::String(String::new()),
        }
    }
}

/// A record with a fixed column layout in a named tab.
pub trait SheetRow {
    const TAB: &'static str;

    fn headers() -> Vec<String>;

    /// Cells in header order.
    fn cells(&self) -> Vec<Cell>;

    fn crypto(&self) -> &str;

    fn currency(&self) -> &str;

    fn exchange_rate(&self) -> Cell;

    fn sign(&self) -> RateSign;
}

/// Crypto spot price converted to fiat, compared with the back-office price.
#[derive(Debug, Clone, PartialEq)]
pub struct FiatDifferentialRow {
    pub date: String,
    pub brand: String,
    pub crypto: String,
    pub currency: String,
    pub usd_price: Option<f64>,
    pub backoffice_market_price: f64,
    pub reference_rate: f64,
    pub differential_percent: Option<f64>,
    pub sign: RateSign,
}

impl SheetRow for FiatDifferentialRow {
    const TAB: &'static str = "BTC_AND_ETH_CONVERSION";

    fn headers() -> Vec<String> {
        [
            "Date",
            "Brand",
            "Crypto",
            "Currency",
            "USD Price",
            "BO Market Price",
            "Binance Rate",
            "Exchange Rate",
            "Exchange Rate Sign",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.date),
            Cell::text(&self.brand),
            Cell::text(&self.crypto),
            Cell::text(&self.currency),
            Cell::number(self.usd_price),
            Cell::Number(self.backoffice_market_price),
            Cell::Number(self.reference_rate),
            self.exchange_rate(),
            Cell::text(self.sign.as_str()),
        ]
    }

    fn crypto(&self) -> &str {
        &self.crypto
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn exchange_rate(&self) -> Cell {
        Cell::number(self.differential_percent)
    }

    fn sign(&self) -> RateSign {
        self.sign
    }
}

/// One ranked ad in a peer row; default is the empty placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopAdCells {
    pub nick: String,
    pub orders: Option<u64>,
    pub price: Option<f64>,
}

/// USDT peer-market rate compared with the back-office price.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerDifferentialRow {
    pub date: String,
    pub brand: String,
    pub crypto: String,
    pub currency: String,
    pub usdt_usd_price: f64,
    /// 1.0 when the FX table has no rate for the currency.
    pub fx_rate_used: f64,
    pub backoffice_market_price: f64,
    pub reference_rate: f64,
    pub differential_percent: f64,
    pub sign: RateSign,
    pub top: [TopAdCells; TOP_ADS],
}

impl SheetRow for PeerDifferentialRow {
    const TAB: &'static str = "USDT_CONVERSION";

    fn headers() -> Vec<String> {
        let mut headers: Vec<String> = [
            "Date",
            "Brand",
            "Crypto",
            "Currency",
            "USD",
            "XE RATE",
            "BO Market Price",
            "Binance Rate",
            "Exchange Rate",
            "Exchange Rate Sign",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        for i in 1..=TOP_ADS {
            headers.push(format!("Top{i}_Nick"));
            headers.push(format!("Top{i}_Orders"));
            headers.push(format!("Top{i}_Price"));
        }
        headers
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells = vec![
            Cell::text(&self.date),
            Cell::text(&self.brand),
            Cell::text(&self.crypto),
            Cell::text(&self.currency),
            Cell::Number(self.usdt_usd_price),
            Cell::Number(self.fx_rate_used),
            Cell::Number(self.backoffice_market_price),
            Cell::Number(self.reference_rate),
            self.exchange_rate(),
            Cell::text(self.sign.as_str()),
        ];
        for ad in &self.top {
            cells.push(Cell::text(&ad.nick));
            cells.push(ad.orders.map(Cell::Integer).unwrap_or(Cell::Empty));
            cells.push(Cell::number(ad.price));
        }
        cells
    }

    fn crypto(&self) -> &str {
        &self.crypto
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn exchange_rate(&self) -> Cell {
        Cell::Number(self.differential_percent)
    }

    fn sign(&self) -> RateSign {
        self.sign
    }
}
