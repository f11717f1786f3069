use rust_decimal::Decimal;

use crate::model::SubscriptionType;

/// Monthly plan price used when the catalog has no monthly entry.
pub const DEFAULT_MONTHLY_PRICE: i64 = 650;

/// Yearly plan price used when the catalog has no yearly entry.
pub const DEFAULT_YEARLY_PRICE: i64 = 7000;

/// Recipient used for event payments whose event has no participants.
pub const PLACEHOLDER_EMAIL: &str = "contact@cowork.local";

/// Rows per page on the receptionist dashboard.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Buffer for navigation and notice broadcasts. Slow listeners lag, senders never block.
pub const BROADCAST_CAPACITY: usize = 64;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

pub fn fallback_price(kind: SubscriptionType) -> Decimal {
    match kind {
        SubscriptionType::Monthly => Decimal::from(DEFAULT_MONTHLY_PRICE),
        SubscriptionType::Yearly => Decimal::from(DEFAULT_YEARLY_PRICE),
    }
}
