use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::model::*;
use crate::notify::Navigation;
use crate::observability::{BACKEND_REQUEST_DURATION_SECONDS, BACKEND_REQUESTS_TOTAL, status_label};
use crate::session::Session;

/// Error body shapes the backend is known to send.
#[derive(serde::Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A binary part sent next to the JSON `data` part of a multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// REST client for the coworking backend.
///
/// Every request carries the session's bearer token. A 401 clears the
/// session and redirects to sign-in; a 403 redirects home. Auth endpoints
/// bypass that handling so a bad password does not count as a logout.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    session: Arc<Session>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<Session>) -> ClientResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: RequestBuilder, method: &'static str) -> ClientResult<Response> {
        let response = self.dispatch(req, method).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = error_message(response).await;
        Err(match status {
            StatusCode::UNAUTHORIZED => {
                warn!("backend rejected token, clearing session");
                self.session.clear();
                ClientError::Unauthorized
            }
            StatusCode::FORBIDDEN => {
                warn!("access denied: {message}");
                self.session.hub().navigate(Navigation::Home);
                ClientError::Forbidden(message)
            }
            other => status_error(other, message),
        })
    }

    /// Like `send` but without the global 401/403 handling.
    async fn send_public(&self, req: RequestBuilder, method: &'static str) -> ClientResult<Response> {
        let response = self.dispatch(req, method).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = error_message(response).await;
        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            other => status_error(other, message),
        })
    }

    async fn dispatch(&self, req: RequestBuilder, method: &'static str) -> ClientResult<Response> {
        let req = match self.session.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let start = Instant::now();
        let result = req.send().await;
        metrics::histogram!(BACKEND_REQUEST_DURATION_SECONDS, "method" => method)
            .record(start.elapsed().as_secs_f64());
        let response = match result {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!(BACKEND_REQUESTS_TOTAL, "method" => method, "status" => "transport")
                    .increment(1);
                return Err(e.into());
            }
        };
        let status = response.status();
        metrics::counter!(BACKEND_REQUESTS_TOTAL, "method" => method, "status" => status_label(status.as_u16()))
            .increment(1);
        debug!("{method} {} -> {status}", response.url().path());
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(self.client.get(self.url(path)), "GET").await?;
        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> ClientResult<T> {
        let response = self
            .send(self.client.post(self.url(path)).json(body), "POST")
            .await?;
        Ok(response.json().await?)
    }

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> ClientResult<T> {
        let response = self
            .send(self.client.put(self.url(path)).json(body), "PUT")
            .await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.client.delete(self.url(path)), "DELETE").await?;
        Ok(())
    }

    // ── Auth ─────────────────────────────────────────────────

    /// Sign in and store the returned user as the current session.
    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<CurrentUser> {
        let body = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send_public(self.client.post(self.url("/api/auth/signin")).json(&body), "POST")
            .await?;
        let user: CurrentUser = response.json().await?;
        self.session.set(user.clone())?;
        Ok(user)
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<()> {
        self.send_public(self.client.post(self.url("/api/auth/signup")).json(request), "POST")
            .await?;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> ClientResult<()> {
        let body = serde_json::json!({ "email": email });
        self.send_public(
            self.client.post(self.url("/api/auth/forgot-password")).json(&body),
            "POST",
        )
        .await?;
        Ok(())
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> ClientResult<()> {
        self.send_public(
            self.client.post(self.url("/api/auth/reset-password")).json(request),
            "POST",
        )
        .await?;
        Ok(())
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    // ── Multipart uploads ────────────────────────────────────

    pub async fn create_space(&self, space: &Space, photo: Option<Upload>) -> ClientResult<Space> {
        let form = multipart_form(space, "photo", photo)?;
        let response = self
            .send(self.client.post(self.url("/api/espaces")).multipart(form), "POST")
            .await?;
        Ok(response.json().await?)
    }

    /// Update the user's profile and broadcast it to profile listeners.
    pub async fn update_profile(&self, profile: &UserProfile, image: Option<Upload>) -> ClientResult<UserProfile> {
        let form = multipart_form(profile, "image", image)?;
        let path = format!("/api/users/{}", profile.id);
        let response = self
            .send(self.client.put(self.url(&path)).multipart(form), "PUT")
            .await?;
        let updated: UserProfile = response.json().await?;
        self.session.hub().publish_profile(updated.clone());
        Ok(updated)
    }
}

fn multipart_form<T: Serialize>(data: &T, file_field: &'static str, file: Option<Upload>) -> ClientResult<Form> {
    let data = Part::text(serde_json::to_string(data)?).mime_str("application/json")?;
    let mut form = Form::new().part("data", data);
    if let Some(upload) = file {
        let part = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        form = form.part(file_field, part);
    }
    Ok(form)
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    parse_error_body(&text).unwrap_or_else(|| {
        if text.is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
        } else {
            text
        }
    })
}

fn parse_error_body(text: &str) -> Option<String> {
    let body: ApiErrorResponse = serde_json::from_str(text).ok()?;
    body.message.or(body.error)
}

fn status_error(status: StatusCode, message: String) -> ClientError {
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST => ClientError::Validation(message),
        other => ClientError::Backend {
            status: other.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn spaces(&self) -> ClientResult<Vec<Space>> {
        self.get("/api/espaces").await
    }

    async fn open_spaces(&self) -> ClientResult<Vec<Space>> {
        self.get("/api/espaces/ouverts").await
    }

    async fn unavailabilities(&self) -> ClientResult<Vec<UnavailabilityWindow>> {
        self.get("/api/indisponibilites").await
    }

    async fn reservations(&self) -> ClientResult<Vec<Reservation>> {
        self.get("/api/reservations").await
    }

    async fn reservations_for_space(&self, space_id: Id) -> ClientResult<Vec<Reservation>> {
        self.get(&format!("/api/reservations/space/{space_id}")).await
    }

    async fn create_reservation(&self, reservation: &Reservation) -> ClientResult<Reservation> {
        self.post("/api/reservations", reservation).await
    }

    async fn update_reservation(&self, id: Id, reservation: &Reservation) -> ClientResult<Reservation> {
        self.put(&format!("/api/reservations/{id}"), reservation).await
    }

    async fn subscriptions(&self) -> ClientResult<Vec<Subscription>> {
        self.get("/api/abonnements").await
    }

    async fn subscriptions_for_user(&self, user_id: Id) -> ClientResult<Vec<Subscription>> {
        self.get(&format!("/api/abonnements/user/{user_id}")).await
    }

    async fn subscription_plans(&self) -> ClientResult<Vec<Plan>> {
        self.get("/api/abonnements/plans").await
    }

    async fn create_subscription(&self, subscription: &Subscription) -> ClientResult<Subscription> {
        self.post("/api/abonnements", subscription).await
    }

    async fn delete_subscription(&self, id: Id) -> ClientResult<()> {
        self.delete(&format!("/api/abonnements/{id}")).await
    }

    async fn payments(&self) -> ClientResult<Vec<Payment>> {
        self.get("/api/paiements").await
    }

    async fn update_payment(&self, id: Id, payment: &Payment) -> ClientResult<Payment> {
        self.put(&format!("/api/paiements/{id}"), payment).await
    }

    async fn events(&self) -> ClientResult<Vec<Event>> {
        self.get("/api/admin/events").await
    }

    async fn invoices(&self) -> ClientResult<Vec<Invoice>> {
        self.get("/api/factures").await
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> ClientResult<Invoice> {
        self.post("/api/factures", invoice).await
    }

    async fn invoice_pdf(&self, invoice_id: Id) -> ClientResult<Bytes> {
        let path = format!("/api/factures/{invoice_id}/pdf");
        let response = self.send(self.client.get(self.url(&path)), "GET").await?;
        Ok(response.bytes().await?)
    }
}
