use bytes::Bytes;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult, MissingReference};
use crate::model::*;
use crate::observability::{
    INVOICES_GENERATED_TOTAL, RESERVATION_CONFLICTS_TOTAL, RESERVATIONS_CREATED_TOTAL,
    SUBSCRIPTION_CHANGES_TOTAL,
};

use super::conflict::{pending_reservation, validate, validate_request};
use super::reconcile::Dashboard;
use super::subscription::{compute_end_date, plan_price};
use super::{Engine, now};

impl Engine {
    // ── Subscriptions ────────────────────────────────────────

    /// Subscribe `user` to an open space starting now. The price comes from
    /// the plan catalog, or the built-in default when the catalog is empty
    /// or unreachable. Reloads the user's subscriptions on success.
    pub async fn subscribe(
        &self,
        kind: SubscriptionType,
        user: &UserProfile,
        space: &Space,
    ) -> ClientResult<Subscription> {
        let space_id = self.report("Subscribing", open_space_id(space))?;

        let catalog = match self.backend.subscription_plans().await {
            Ok(plans) => plans,
            Err(e) => {
                warn!("plan catalog unavailable, using default prices: {e}");
                Vec::new()
            }
        };

        let start = now();
        let end_date = compute_end_date(kind, start)
            .ok_or_else(|| ClientError::Validation(format!("no end date for {kind} from {start}")));
        let end_date = self.report("Subscribing", end_date)?;

        let subscription = Subscription {
            id: None,
            kind,
            price: plan_price(kind, &catalog),
            start_date: start,
            end_date,
            user_id: user.id,
            user_email: Some(user.email.clone()),
            space_id,
        };

        let created = self.backend.create_subscription(&subscription).await;
        let status = if created.is_ok() { "ok" } else { "error" };
        metrics::counter!(SUBSCRIPTION_CHANGES_TOTAL, "action" => "subscribe", "status" => status).increment(1);
        let created = self.report("Subscribing", created)?;

        info!(user_id = user.id, space_id, "subscribed to {kind} plan until {end_date}");
        self.hub.success(format!("Subscribed to the {kind} plan"));
        self.refresh_after_write(user.id).await;
        Ok(created)
    }

    /// Delete a subscription unconditionally, then reload the user's list.
    pub async fn unsubscribe(&self, user_id: Id, subscription_id: Id) -> ClientResult<()> {
        let deleted = self.backend.delete_subscription(subscription_id).await;
        let status = if deleted.is_ok() { "ok" } else { "error" };
        metrics::counter!(SUBSCRIPTION_CHANGES_TOTAL, "action" => "unsubscribe", "status" => status).increment(1);
        self.report("Cancelling subscription", deleted)?;

        info!(user_id, subscription_id, "subscription cancelled");
        self.hub.success("Subscription cancelled");
        self.refresh_after_write(user_id).await;
        Ok(())
    }

    /// Reload after a confirmed write. The write stands either way, so a
    /// failed reload is only logged and the cache stays stale until the next one.
    async fn refresh_after_write(&self, user_id: Id) {
        match self.backend.subscriptions_for_user(user_id).await {
            Ok(list) => {
                self.subscriptions.insert(user_id, list);
            }
            Err(e) => warn!(user_id, "subscription reload failed after write: {e}"),
        }
    }

    // ── Reservations ─────────────────────────────────────────

    /// Validate and submit a booking. Refused requests never reach the
    /// backend; accepted ones are created `Pending` and unpaid.
    pub async fn create_reservation(&self, request: &ReservationRequest) -> ClientResult<Reservation> {
        self.report("Reservation", validate_request(request))?;
        let space_id = self.report(
            "Reservation",
            request
                .space
                .id
                .ok_or_else(|| ClientError::Validation("space has no id".into())),
        )?;

        if request.space.kind == SpaceKind::Open && !self.has_active_subscription(request.user.id).await? {
            return self.report(
                "Reservation",
                Err(ClientError::Validation(
                    "an active subscription is required to book an open space".into(),
                )),
            );
        }

        let fetched = futures::try_join!(
            self.backend.unavailabilities(),
            self.backend.reservations_for_space(space_id),
        );
        let (windows, reservations) = self.report("Checking availability", fetched)?;

        if let Err(conflict) = validate(space_id, &request.span(), &windows, &reservations) {
            info!(space_id, user_id = request.user.id, "reservation refused: {conflict}");
            metrics::counter!(RESERVATION_CONFLICTS_TOTAL, "kind" => conflict.label()).increment(1);
            self.hub.error(conflict.message());
            return Err(ClientError::Conflict(conflict));
        }

        let reservation = pending_reservation(space_id, request);
        let created = self.report(
            "Reservation",
            self.backend.create_reservation(&reservation).await,
        )?;
        metrics::counter!(RESERVATIONS_CREATED_TOTAL).increment(1);
        info!(space_id, reservation_id = ?created.id, "reservation submitted");
        self.hub.success("Reservation submitted");
        Ok(created)
    }

    /// Receptionist/admin status change. Last write wins.
    pub async fn set_reservation_status(
        &self,
        reservation: &Reservation,
        status: ReservationStatus,
    ) -> ClientResult<Reservation> {
        let id = self.report(
            "Updating reservation",
            reservation
                .id
                .ok_or_else(|| ClientError::Validation("reservation has no id".into())),
        )?;
        let updated = Reservation {
            status,
            ..reservation.clone()
        };
        let saved = self.report(
            "Updating reservation",
            self.backend.update_reservation(id, &updated).await,
        )?;
        info!(reservation_id = id, "reservation status set to {status:?}");
        Ok(saved)
    }

    // ── Payments & invoices ──────────────────────────────────

    /// Mark a payment validated. A reservation payment also flags its
    /// reservation as paid.
    pub async fn validate_payment(&self, dashboard: &mut Dashboard, payment_id: Id) -> ClientResult<Payment> {
        let payment = self.report(
            "Validating payment",
            dashboard
                .payment(payment_id)
                .cloned()
                .ok_or(MissingReference::Payment(payment_id).into()),
        )?;

        let validated = Payment {
            status: PaymentStatus::Validated,
            ..payment
        };
        let saved = self.report(
            "Validating payment",
            self.backend.update_payment(payment_id, &validated).await,
        )?;
        dashboard.replace_payment(saved.clone());

        if let PaymentTarget::Reservation(Some(rid)) = saved.target
            && let Some(reservation) = dashboard.reservations.iter().find(|r| r.id == Some(rid)).cloned()
        {
            let paid = Reservation {
                paiement_valide: true,
                ..reservation
            };
            let saved_reservation = self.report(
                "Marking reservation paid",
                self.backend.update_reservation(rid, &paid).await,
            )?;
            dashboard.replace_reservation(saved_reservation);
        }

        self.hub.success("Payment validated");
        Ok(saved)
    }

    /// Create the invoice for a payment and download its PDF.
    ///
    /// A payment whose target cannot be resolved aborts only this action;
    /// the dashboard stays usable.
    pub async fn generate_invoice(&self, dashboard: &mut Dashboard, payment_id: Id) -> ClientResult<(Invoice, Bytes)> {
        let counterpart = {
            let payment = self.report(
                "Invoice",
                dashboard
                    .payment(payment_id)
                    .ok_or(MissingReference::Payment(payment_id).into()),
            )?;
            self.report(
                "Invoice",
                dashboard.resolve_counterpart(payment).map_err(ClientError::from),
            )?
        };

        let request = NewInvoice {
            payment_id,
            recipient_email: counterpart.email.clone(),
        };
        let invoice = self.report("Invoice", self.backend.create_invoice(&request).await)?;
        dashboard.record_invoice(invoice.clone());

        let invoice_id = self.report(
            "Invoice",
            invoice
                .id
                .ok_or_else(|| ClientError::InvalidResponse("invoice created without id".into())),
        )?;
        let pdf = self.report("Invoice download", self.backend.invoice_pdf(invoice_id).await)?;

        metrics::counter!(INVOICES_GENERATED_TOTAL).increment(1);
        info!(payment_id, invoice_id, "invoice for {} sent to {}", counterpart.label, counterpart.email);
        self.hub.success(format!("Invoice sent to {}", counterpart.email));
        Ok((invoice, pdf))
    }
}

fn open_space_id(space: &Space) -> ClientResult<Id> {
    if space.kind != SpaceKind::Open {
        return Err(ClientError::Validation(format!(
            "{} is not an open space",
            space.name
        )));
    }
    space
        .id
        .ok_or_else(|| ClientError::Validation("space has no id".into()))
}
