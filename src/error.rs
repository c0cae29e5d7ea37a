use thiserror::Error;

/// Errors raised while turning price feeds into comparison rows.
///
/// None of these are fatal to the process: a missing reference skips one
/// row, an undefined differential still emits a row, and a failed peer
/// fetch is handed back to the cycle to decide what to do.
#[derive(Error, Debug)]
pub enum RateError {
    #[error("no converted reference for {crypto}-{currency}")]
    MissingData { crypto: String, currency: String },

    #[error("differential undefined: reference and market price sum to zero")]
    UndefinedDifferential,

    #[error("peer quote fetch failed for {currency}: {source}")]
    CacheFetch {
        currency: String,
        #[source]
        source: SourceError,
    },

    #[error("invalid rate input: {0}")]
    InvalidRateInput(String),
}

/// Errors from the external collaborators (HTTP feeds, sheets, portals).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("could not decode {service} response: {reason}")]
    Decode { service: &'static str, reason: String },

    #[error("{service} rejected the request: {reason}")]
    Rejected { service: &'static str, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
