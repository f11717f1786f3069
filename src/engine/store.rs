use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::model::*;

/// Collections that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Spaces,
    Unavailabilities,
    Reservations,
    Subscriptions,
    /// Per-user subscription listing only.
    UserSubscriptions,
    Plans,
    Payments,
    Events,
    Invoices,
}

/// In-process backend: same contract as the REST API, kept in memory.
pub struct InMemoryStore {
    next_id: AtomicI64,
    spaces: DashMap<Id, Space>,
    windows: DashMap<Id, UnavailabilityWindow>,
    reservations: DashMap<Id, Reservation>,
    subscriptions: DashMap<Id, Subscription>,
    plans: DashMap<SubscriptionType, Plan>,
    payments: DashMap<Id, Payment>,
    events: DashMap<Id, Event>,
    invoices: DashMap<Id, Invoice>,
    failing: DashSet<Endpoint>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            spaces: DashMap::new(),
            windows: DashMap::new(),
            reservations: DashMap::new(),
            subscriptions: DashMap::new(),
            plans: DashMap::new(),
            payments: DashMap::new(),
            events: DashMap::new(),
            invoices: DashMap::new(),
            failing: DashSet::new(),
        }
    }

    fn allocate(&self, id: Option<Id>) -> Id {
        match id {
            Some(id) => {
                self.next_id.fetch_max(id + 1, Ordering::Relaxed);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    // ── Failure injection ────────────────────────────────────

    pub fn fail(&self, endpoint: Endpoint) {
        self.failing.insert(endpoint);
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.failing.remove(&endpoint);
    }

    fn check(&self, endpoint: Endpoint) -> ClientResult<()> {
        if self.failing.contains(&endpoint) {
            return Err(ClientError::Backend {
                status: 503,
                message: format!("{endpoint:?} unavailable"),
            });
        }
        Ok(())
    }

    // ── Seeding ──────────────────────────────────────────────

    pub fn insert_space(&self, mut space: Space) -> Space {
        let id = self.allocate(space.id);
        space.id = Some(id);
        self.spaces.insert(id, space.clone());
        space
    }

    pub fn insert_window(&self, mut window: UnavailabilityWindow) -> UnavailabilityWindow {
        let id = self.allocate(window.id);
        window.id = Some(id);
        self.windows.insert(id, window.clone());
        window
    }

    pub fn insert_reservation(&self, mut reservation: Reservation) -> Reservation {
        let id = self.allocate(reservation.id);
        reservation.id = Some(id);
        self.reservations.insert(id, reservation.clone());
        reservation
    }

    pub fn insert_subscription(&self, mut subscription: Subscription) -> Subscription {
        let id = self.allocate(subscription.id);
        subscription.id = Some(id);
        self.subscriptions.insert(id, subscription.clone());
        subscription
    }

    pub fn insert_payment(&self, mut payment: Payment) -> Payment {
        let id = self.allocate(payment.id);
        payment.id = Some(id);
        self.payments.insert(id, payment.clone());
        payment
    }

    pub fn insert_event(&self, mut event: Event) -> Event {
        let id = self.allocate(event.id);
        event.id = Some(id);
        self.events.insert(id, event.clone());
        event
    }

    pub fn set_plan(&self, plan: Plan) {
        self.plans.insert(plan.kind, plan);
    }

    pub fn reservation(&self, id: Id) -> Option<Reservation> {
        self.reservations.get(&id).map(|e| e.value().clone())
    }

    pub fn payment(&self, id: Id) -> Option<Payment> {
        self.payments.get(&id).map(|e| e.value().clone())
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.len()
    }
}

/// Snapshot a map's values in id order, so "first" is stable.
fn sorted<V: Clone>(map: &DashMap<Id, V>) -> Vec<V> {
    let mut entries: Vec<(Id, V)> = map.iter().map(|e| (*e.key(), e.value().clone())).collect();
    entries.sort_by_key(|(id, _)| *id);
    entries.into_iter().map(|(_, v)| v).collect()
}

#[async_trait]
impl Backend for InMemoryStore {
    async fn spaces(&self) -> ClientResult<Vec<Space>> {
        self.check(Endpoint::Spaces)?;
        Ok(sorted(&self.spaces))
    }

    async fn open_spaces(&self) -> ClientResult<Vec<Space>> {
        self.check(Endpoint::Spaces)?;
        Ok(sorted(&self.spaces)
            .into_iter()
            .filter(|s| s.kind == SpaceKind::Open)
            .collect())
    }

    async fn unavailabilities(&self) -> ClientResult<Vec<UnavailabilityWindow>> {
        self.check(Endpoint::Unavailabilities)?;
        Ok(sorted(&self.windows))
    }

    async fn reservations(&self) -> ClientResult<Vec<Reservation>> {
        self.check(Endpoint::Reservations)?;
        Ok(sorted(&self.reservations))
    }

    async fn reservations_for_space(&self, space_id: Id) -> ClientResult<Vec<Reservation>> {
        self.check(Endpoint::Reservations)?;
        Ok(sorted(&self.reservations)
            .into_iter()
            .filter(|r| r.space_id == space_id)
            .collect())
    }

    async fn create_reservation(&self, reservation: &Reservation) -> ClientResult<Reservation> {
        self.check(Endpoint::Reservations)?;
        Ok(self.insert_reservation(Reservation {
            id: None,
            ..reservation.clone()
        }))
    }

    async fn update_reservation(&self, id: Id, reservation: &Reservation) -> ClientResult<Reservation> {
        self.check(Endpoint::Reservations)?;
        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("reservation {id}")))?;
        *entry = Reservation {
            id: Some(id),
            ..reservation.clone()
        };
        Ok(entry.clone())
    }

    async fn subscriptions(&self) -> ClientResult<Vec<Subscription>> {
        self.check(Endpoint::Subscriptions)?;
        Ok(sorted(&self.subscriptions))
    }

    async fn subscriptions_for_user(&self, user_id: Id) -> ClientResult<Vec<Subscription>> {
        self.check(Endpoint::UserSubscriptions)?;
        Ok(sorted(&self.subscriptions)
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect())
    }

    async fn subscription_plans(&self) -> ClientResult<Vec<Plan>> {
        self.check(Endpoint::Plans)?;
        Ok(self.plans.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_subscription(&self, subscription: &Subscription) -> ClientResult<Subscription> {
        self.check(Endpoint::Subscriptions)?;
        Ok(self.insert_subscription(Subscription {
            id: None,
            ..subscription.clone()
        }))
    }

    async fn delete_subscription(&self, id: Id) -> ClientResult<()> {
        self.check(Endpoint::Subscriptions)?;
        self.subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(format!("subscription {id}")))
    }

    async fn payments(&self) -> ClientResult<Vec<Payment>> {
        self.check(Endpoint::Payments)?;
        Ok(sorted(&self.payments))
    }

    async fn update_payment(&self, id: Id, payment: &Payment) -> ClientResult<Payment> {
        self.check(Endpoint::Payments)?;
        let mut entry = self
            .payments
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("payment {id}")))?;
        *entry = Payment {
            id: Some(id),
            ..payment.clone()
        };
        Ok(entry.clone())
    }

    async fn events(&self) -> ClientResult<Vec<Event>> {
        self.check(Endpoint::Events)?;
        Ok(sorted(&self.events))
    }

    async fn invoices(&self) -> ClientResult<Vec<Invoice>> {
        self.check(Endpoint::Invoices)?;
        Ok(sorted(&self.invoices))
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> ClientResult<Invoice> {
        self.check(Endpoint::Invoices)?;
        let id = self.allocate(None);
        let created = Invoice {
            id: Some(id),
            payment_id: invoice.payment_id,
            pdf_url: Some(format!("/api/factures/{id}/pdf")),
            recipient_email: invoice.recipient_email.clone(),
            sent_at: Some(chrono::Local::now().naive_local()),
        };
        self.invoices.insert(id, created.clone());
        Ok(created)
    }

    async fn invoice_pdf(&self, invoice_id: Id) -> ClientResult<Bytes> {
        self.check(Endpoint::Invoices)?;
        let invoice = self
            .invoices
            .get(&invoice_id)
            .ok_or_else(|| ClientError::NotFound(format!("invoice {invoice_id}")))?;
        Ok(Bytes::from(format!(
            "%PDF-1.4\n% invoice {invoice_id} for payment {} to {}\n%%EOF\n",
            invoice.payment_id, invoice.recipient_email
        )))
    }
}
