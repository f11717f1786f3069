use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ClientResult;
use crate::model::*;
use crate::observability::{AVAILABILITY_FAIL_OPEN_TOTAL, DASHBOARD_LOADS_TOTAL};

use super::availability::BlockedDates;
use super::reconcile::{Dashboard, ViewState};
use super::{Engine, today};

impl Engine {
    /// Dates that cannot be booked on `space_id`, as of today.
    pub async fn blocked_dates(&self, space_id: Id) -> BlockedDates {
        self.blocked_dates_at(space_id, today()).await
    }

    /// Fetches windows and reservations concurrently. A failed fetch is
    /// logged and counts as "nothing blocked" for that source.
    pub async fn blocked_dates_at(&self, space_id: Id, today: NaiveDate) -> BlockedDates {
        let (windows, reservations) = futures::join!(
            self.backend.unavailabilities(),
            self.backend.reservations_for_space(space_id),
        );

        let windows: Vec<UnavailabilityWindow> = match windows {
            Ok(all) => all.into_iter().filter(|w| w.space_id == space_id).collect(),
            Err(e) => {
                warn!(space_id, "unavailability fetch failed, treating as none: {e}");
                metrics::counter!(AVAILABILITY_FAIL_OPEN_TOTAL, "source" => "unavailabilities").increment(1);
                Vec::new()
            }
        };
        let reservations = match reservations {
            Ok(list) => list,
            Err(e) => {
                warn!(space_id, "reservation fetch failed, treating as none: {e}");
                metrics::counter!(AVAILABILITY_FAIL_OPEN_TOTAL, "source" => "reservations").increment(1);
                Vec::new()
            }
        };

        BlockedDates::new(today, &windows, &reservations)
    }

    /// Cached subscriptions of `user_id`, empty until the first reload.
    pub fn subscriptions_of(&self, user_id: Id) -> Vec<Subscription> {
        self.subscriptions
            .get(&user_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Refetch `user_id`'s subscriptions. On failure the cache keeps its old value.
    pub async fn reload_subscriptions(&self, user_id: Id) -> ClientResult<Vec<Subscription>> {
        let list = self.report(
            "Loading subscriptions",
            self.backend.subscriptions_for_user(user_id).await,
        )?;
        self.subscriptions.insert(user_id, list.clone());
        Ok(list)
    }

    /// True when the user has any subscription at all. End dates are not
    /// compared against now.
    pub async fn has_active_subscription(&self, user_id: Id) -> ClientResult<bool> {
        Ok(!self.reload_subscriptions(user_id).await?.is_empty())
    }

    /// The first subscription the backend lists for the user.
    pub async fn active_subscription(&self, user_id: Id) -> ClientResult<Option<Subscription>> {
        Ok(self.reload_subscriptions(user_id).await?.into_iter().next())
    }

    /// Open spaces need a subscription; private spaces are booked per reservation.
    pub async fn reservation_eligible(&self, user_id: Id, space: &Space) -> ClientResult<bool> {
        match space.kind {
            SpaceKind::Private => Ok(true),
            SpaceKind::Open => self.has_active_subscription(user_id).await,
        }
    }

    /// Load the four dashboard collections together. Any failure fails the
    /// whole view; cancelling `cancel` abandons the load.
    pub async fn load_dashboard(&self, cancel: &CancellationToken) -> ViewState {
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                info!("dashboard load cancelled");
                metrics::counter!(DASHBOARD_LOADS_TOTAL, "outcome" => "cancelled").increment(1);
                return ViewState::Cancelled;
            }
            r = async {
                futures::try_join!(
                    self.backend.payments(),
                    self.backend.reservations(),
                    self.backend.events(),
                    self.backend.subscriptions(),
                )
            } => r,
        };

        let (payments, reservations, events, subscriptions) = match joined {
            Ok(all) => all,
            Err(e) => {
                error!("dashboard load failed: {e}");
                metrics::counter!(DASHBOARD_LOADS_TOTAL, "outcome" => "failed").increment(1);
                self.hub.error(format!("Loading dashboard failed: {e}"));
                return ViewState::Failed(e.to_string());
            }
        };

        let mut dashboard = Dashboard::new(payments, reservations, events, subscriptions);
        match self.backend.invoices().await {
            Ok(invoices) => dashboard.invoices = invoices,
            Err(e) => warn!("invoice list unavailable: {e}"),
        }
        metrics::counter!(DASHBOARD_LOADS_TOTAL, "outcome" => "ready").increment(1);
        ViewState::Ready(dashboard)
    }
}
