use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ClientResult;
use crate::model::*;

/// Resource operations the booking workflow needs from the backend.
///
/// `HttpBackend` is the production implementation; `InMemoryStore` serves
/// tests and offline runs.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn spaces(&self) -> ClientResult<Vec<Space>>;
    async fn open_spaces(&self) -> ClientResult<Vec<Space>>;

    /// All declared windows, every space. Callers filter by space.
    async fn unavailabilities(&self) -> ClientResult<Vec<UnavailabilityWindow>>;

    async fn reservations(&self) -> ClientResult<Vec<Reservation>>;
    async fn reservations_for_space(&self, space_id: Id) -> ClientResult<Vec<Reservation>>;
    async fn create_reservation(&self, reservation: &Reservation) -> ClientResult<Reservation>;
    async fn update_reservation(&self, id: Id, reservation: &Reservation) -> ClientResult<Reservation>;

    async fn subscriptions(&self) -> ClientResult<Vec<Subscription>>;
    async fn subscriptions_for_user(&self, user_id: Id) -> ClientResult<Vec<Subscription>>;
    async fn subscription_plans(&self) -> ClientResult<Vec<Plan>>;
    async fn create_subscription(&self, subscription: &Subscription) -> ClientResult<Subscription>;
    async fn delete_subscription(&self, id: Id) -> ClientResult<()>;

    async fn payments(&self) -> ClientResult<Vec<Payment>>;
    async fn update_payment(&self, id: Id, payment: &Payment) -> ClientResult<Payment>;

    async fn events(&self) -> ClientResult<Vec<Event>>;

    async fn invoices(&self) -> ClientResult<Vec<Invoice>>;
    async fn create_invoice(&self, invoice: &NewInvoice) -> ClientResult<Invoice>;
    async fn invoice_pdf(&self, invoice_id: Id) -> ClientResult<Bytes>;
}
