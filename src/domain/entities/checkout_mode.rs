use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Checkout mode - a one-time payment or a recurring subscription.
/// Values match the payment processor's checkout session `mode` parameter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_exact_values_only() {
        assert_eq!(
            CheckoutMode::from_str("payment").unwrap(),
            CheckoutMode::Payment
        );
        assert_eq!(
            CheckoutMode::from_str("subscription").unwrap(),
            CheckoutMode::Subscription
        );
        assert!(CheckoutMode::from_str("Payment").is_err());
        assert!(CheckoutMode::from_str("setup").is_err());
    }
}
