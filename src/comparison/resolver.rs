use tracing::{info, warn};

/// Picks the reference rate a peer/USDT row is compared against.
///
/// The override currency settles at a merchant rate supplied out of band.
/// When that rate is missing the result is an explicit zero, never the
/// peer-market rate, so the gap shows up in the output.
#[derive(Debug, Clone)]
pub struct ConversionResolver {
    override_currency: String,
}

impl ConversionResolver {
    pub fn new(override_currency: impl Into<String>) -> Self {
        Self {
            override_currency: override_currency.into().trim().to_uppercase(),
        }
    }

    pub fn override_currency(&self) -> &str {
        &self.override_currency
    }

    pub fn resolve_reference_rate(&self, currency: &str, override_rate: f64, peer_rate: f64) -> f64 {
        if currency != self.override_currency {
            return peer_rate;
        }

        if override_rate > 0.0 {
            info!(currency, rate = override_rate, "using merchant override rate");
            override_rate
        } else {
            warn!(currency, "no merchant override rate, reference forced to 0");
            0.0
        }
    }
}
