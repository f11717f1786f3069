use tracing::warn;

use crate::defaults::PLACEHOLDER_EMAIL;
use crate::error::MissingReference;
use crate::model::*;
use crate::pagination::DashboardCursors;

/// Who an invoice for a payment goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterpart {
    pub email: String,
    pub label: String,
}

/// Lifecycle of the payment/invoice view. Only `Ready` carries data:
/// a failed load shows none of the lists.
#[derive(Debug)]
pub enum ViewState {
    Ready(Dashboard),
    Failed(String),
    Cancelled,
}

impl ViewState {
    pub fn dashboard(&self) -> Option<&Dashboard> {
        match self {
            ViewState::Ready(d) => Some(d),
            _ => None,
        }
    }

    pub fn dashboard_mut(&mut self) -> Option<&mut Dashboard> {
        match self {
            ViewState::Ready(d) => Some(d),
            _ => None,
        }
    }
}

/// Everything the receptionist dashboard works from, fully materialized.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub payments: Vec<Payment>,
    pub reservations: Vec<Reservation>,
    pub events: Vec<Event>,
    pub subscriptions: Vec<Subscription>,
    pub invoices: Vec<Invoice>,
    pub cursors: DashboardCursors,
}

impl Dashboard {
    pub fn new(
        payments: Vec<Payment>,
        reservations: Vec<Reservation>,
        events: Vec<Event>,
        subscriptions: Vec<Subscription>,
    ) -> Self {
        Self {
            payments,
            reservations,
            events,
            subscriptions,
            invoices: Vec::new(),
            cursors: DashboardCursors::default(),
        }
    }

    pub fn payment(&self, id: Id) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == Some(id))
    }

    pub fn pending_payments(&self) -> Vec<&Payment> {
        self.payments_with(PaymentStatus::Pending)
    }

    pub fn validated_payments(&self) -> Vec<&Payment> {
        self.payments_with(PaymentStatus::Validated)
    }

    fn payments_with(&self, status: PaymentStatus) -> Vec<&Payment> {
        self.payments.iter().filter(|p| p.status == status).collect()
    }

    /// Reservations still waiting for their payment, cancelled ones excluded.
    pub fn unpaid_reservations(&self) -> Vec<&Reservation> {
        self.reservations
            .iter()
            .filter(|r| !r.paiement_valide && r.status != ReservationStatus::Cancelled)
            .collect()
    }

    pub fn pending_payments_page(&self) -> Vec<&Payment> {
        self.cursors.pending_payments.slice(&self.pending_payments()).to_vec()
    }

    pub fn validated_payments_page(&self) -> Vec<&Payment> {
        self.cursors.validated_payments.slice(&self.validated_payments()).to_vec()
    }

    pub fn unpaid_reservations_page(&self) -> Vec<&Reservation> {
        self.cursors.unpaid_reservations.slice(&self.unpaid_reservations()).to_vec()
    }

    pub fn invoices_page(&self) -> &[Invoice] {
        self.cursors.invoices.slice(&self.invoices)
    }

    pub fn invoice_for(&self, payment_id: Id) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.payment_id == payment_id)
    }

    pub fn record_invoice(&mut self, invoice: Invoice) {
        self.invoices.push(invoice);
    }

    /// Replace a payment after a status change and keep cursors in range.
    pub fn replace_payment(&mut self, payment: Payment) {
        if let Some(slot) = self.payments.iter_mut().find(|p| p.id == payment.id) {
            *slot = payment;
        }
        let pending = self.pending_payments().len();
        let validated = self.validated_payments().len();
        self.cursors.pending_payments.clamp(pending);
        self.cursors.validated_payments.clamp(validated);
    }

    pub fn replace_reservation(&mut self, reservation: Reservation) {
        if let Some(slot) = self.reservations.iter_mut().find(|r| r.id == reservation.id) {
            *slot = reservation;
        }
        let unpaid = self.unpaid_reservations().len();
        self.cursors.unpaid_reservations.clamp(unpaid);
    }

    /// Find the recipient for `payment` from the loaded collections.
    pub fn resolve_counterpart(&self, payment: &Payment) -> Result<Counterpart, MissingReference> {
        let unlinked = |kind| MissingReference::Unlinked {
            payment: payment.id,
            kind,
        };
        match payment.target {
            PaymentTarget::Reservation(id) => {
                let id = id.ok_or_else(|| unlinked("reservation"))?;
                let reservation = self
                    .reservations
                    .iter()
                    .find(|r| r.id == Some(id))
                    .ok_or(MissingReference::Reservation(id))?;
                let email = reservation
                    .user_email
                    .clone()
                    .ok_or(MissingReference::NoEmail { kind: "reservation", id })?;
                let space = reservation.space_name.as_deref().unwrap_or("space");
                Ok(Counterpart {
                    email,
                    label: format!("Reservation #{id} ({space})"),
                })
            }
            PaymentTarget::Subscription(id) => {
                let id = id.ok_or_else(|| unlinked("subscription"))?;
                let subscription = self
                    .subscriptions
                    .iter()
                    .find(|s| s.id == Some(id))
                    .ok_or(MissingReference::Subscription(id))?;
                let email = subscription
                    .user_email
                    .clone()
                    .ok_or(MissingReference::NoEmail { kind: "subscription", id })?;
                Ok(Counterpart {
                    email,
                    label: format!("Subscription {} #{id}", subscription.kind),
                })
            }
            PaymentTarget::Event(id) => {
                let id = id.ok_or_else(|| unlinked("event"))?;
                let event = self
                    .events
                    .iter()
                    .find(|e| e.id == Some(id))
                    .ok_or(MissingReference::Event(id))?;
                Ok(Counterpart {
                    email: event_recipient(event, payment.user_id),
                    label: format!("Event: {}", event.title),
                })
            }
        }
    }
}

/// The paying participant, else the first one, else the placeholder address.
fn event_recipient(event: &Event, user_id: Option<Id>) -> String {
    if let Some(p) = event
        .participants
        .iter()
        .find(|p| Some(p.user_id) == user_id)
    {
        return p.email.clone();
    }
    match event.participants.first() {
        Some(first) => {
            warn!(
                event_id = ?event.id,
                payer = ?user_id,
                "payer not among participants, invoicing first participant {}",
                first.email
            );
            first.email.clone()
        }
        None => {
            warn!(event_id = ?event.id, "event has no participants, using placeholder recipient");
            PLACEHOLDER_EMAIL.to_string()
        }
    }
}

