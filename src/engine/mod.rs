mod availability;
mod conflict;
mod mutations;
mod queries;
mod reconcile;
mod store;
mod subscription;

pub use availability::{BlockedDates, expand_all, expand_days};
pub use conflict::{pending_reservation, validate, validate_request};
pub use reconcile::{Counterpart, Dashboard, ViewState};
pub use store::{Endpoint, InMemoryStore};
pub use subscription::{compute_end_date, plan_price};

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tracing::error;

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::session::Session;

/// Booking workflow over a backend: availability, subscriptions,
/// reservations and the payment/invoice dashboard.
///
/// Local state (the per-user subscription cache) only changes after the
/// backend confirms a write.
pub struct Engine {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
    hub: Arc<NotifyHub>,
    /// user id → subscriptions as last fetched
    subscriptions: DashMap<Id, Vec<Subscription>>,
}

impl Engine {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<Session>) -> Self {
        let hub = session.hub().clone();
        Self {
            backend,
            session,
            hub,
            subscriptions: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn hub(&self) -> &Arc<NotifyHub> {
        &self.hub
    }

    /// Log a failed call and surface it to the user. A 401 already sent the
    /// user to sign-in, so it gets no extra notice.
    fn report<T>(&self, what: &str, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(e) = &result {
            error!("{what} failed: {e}");
            if !matches!(e, ClientError::Unauthorized) {
                self.hub.error(format!("{what} failed: {e}"));
            }
        }
        result
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}
