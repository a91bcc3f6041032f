//! Subscription status helpers.
//!
//! Subscription status is stored exactly as the payment processor last
//! reported it (`active`, `canceled`, `past_due`, ...). The only value this
//! service writes on its own is the `not_started` placeholder, so the status
//! column is deliberately a free-form string rather than an enumerated type.

/// Placeholder status written before the first checkout completes, and when
/// the processor reports no subscription at all for a customer.
pub const STATUS_NOT_STARTED: &str = "not_started";

/// Returns true if a processor-reported status should unlock premium
/// features.
pub fn grants_access(status: &str) -> bool {
    matches!(status, "active" | "trialing")
}
