use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use cowork::engine::ViewState;
use cowork::error::Conflict;
use cowork::http::Upload;
use cowork::model::*;
use cowork::notify::{Navigation, NotifyHub};
use cowork::{Backend, ClientError, Engine, HttpBackend, Session};

// ── Test infrastructure ──────────────────────────────────────

#[derive(Default)]
struct Mock {
    auth_headers: Mutex<Vec<String>>,
    reject_with: Mutex<Option<StatusCode>>,
    /// (data part, photo file name, photo size)
    multipart: Mutex<Option<(String, Option<String>, usize)>>,
    created_reservations: Mutex<Vec<Value>>,
    created_invoices: Mutex<Vec<Value>>,
}

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Record the bearer header and apply any forced rejection.
fn gate(mock: &Mock, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    if let Some(v) = headers.get(AUTHORIZATION) {
        mock.auth_headers
            .lock()
            .unwrap()
            .push(v.to_str().unwrap().to_string());
    }
    match *mock.reject_with.lock().unwrap() {
        Some(code) => Err((code, Json(json!({ "message": "rejected by test" })))),
        None => Ok(()),
    }
}

fn booked_reservation() -> Value {
    json!({
        "id": 1,
        "userId": 9,
        "userName": "Ana",
        "userEmail": "ana@cowork.io",
        "spaceId": 7,
        "spaceName": "Room 7",
        "spaceType": "PRIVE",
        "startDate": "2030-06-11T09:00:00",
        "endDate": "2030-06-11T12:00:00",
        "status": "CONFIRMED",
        "amount": 50.0,
        "paiementValide": false
    })
}

async fn sign_in(Json(body): Json<Value>) -> Reply {
    if body["password"] != "secret" {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Bad credentials" })),
        ));
    }
    Ok(Json(json!({
        "id": 9,
        "email": body["email"],
        "name": "Ana",
        "role": "ROLE_RECEPTIONNISTE",
        "token": "tok-123"
    })))
}

async fn list_spaces(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Reply {
    gate(&mock, &headers)?;
    Ok(Json(json!([
        { "id": 5, "name": "Open floor", "type": "OUVERT", "capacity": 30, "price": 0.0 },
        { "id": 7, "name": "Room 7", "type": "PRIVE", "capacity": 6, "price": 25.0 }
    ])))
}

async fn create_space(State(mock): State<Arc<Mock>>, headers: HeaderMap, mut multipart: Multipart) -> Reply {
    gate(&mock, &headers)?;
    let mut data = String::new();
    let mut photo = (None, 0);
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "data" => data = field.text().await.unwrap(),
            _ => {
                let name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.unwrap();
                photo = (name, bytes.len());
            }
        }
    }
    let mut space: Value = serde_json::from_str(&data).unwrap();
    space["id"] = json!(42);
    *mock.multipart.lock().unwrap() = Some((data, photo.0, photo.1));
    Ok(Json(space))
}

async fn update_profile(
    State(mock): State<Arc<Mock>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Reply {
    gate(&mock, &headers)?;
    let mut profile = json!({});
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("data") {
            profile = serde_json::from_str(&field.text().await.unwrap()).unwrap();
        } else if let Some(name) = field.file_name() {
            profile["imageUrl"] = json!(format!("/uploads/{id}/{name}"));
        }
    }
    Ok(Json(profile))
}

async fn unavailabilities(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Reply {
    gate(&mock, &headers)?;
    Ok(Json(json!([
        { "id": 2, "spaceId": 7, "startDate": "2030-07-01", "endDate": "2030-07-03", "reason": "painting" }
    ])))
}

async fn list_reservations(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Reply {
    gate(&mock, &headers)?;
    let mut all = vec![booked_reservation()];
    all.extend(mock.created_reservations.lock().unwrap().iter().cloned());
    Ok(Json(Value::Array(all)))
}

async fn reservations_for_space(
    State(mock): State<Arc<Mock>>,
    Path(space_id): Path<i64>,
    headers: HeaderMap,
) -> Reply {
    gate(&mock, &headers)?;
    let all = if space_id == 7 { vec![booked_reservation()] } else { vec![] };
    Ok(Json(Value::Array(all)))
}

async fn create_reservation(State(mock): State<Arc<Mock>>, headers: HeaderMap, Json(mut body): Json<Value>) -> Reply {
    gate(&mock, &headers)?;
    let mut created = mock.created_reservations.lock().unwrap();
    body["id"] = json!(100 + created.len());
    created.push(body.clone());
    Ok(Json(body))
}

async fn payments(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Reply {
    gate(&mock, &headers)?;
    Ok(Json(json!([
        { "id": 3, "type": "RESERVATION", "amount": 50.0, "status": "VALIDATED", "userId": 9, "reservationId": 1 },
        { "id": 4, "type": "SUBSCRIPTION", "amount": 650.0, "status": "PENDING", "userId": 9, "abonnementId": 99 }
    ])))
}

async fn empty_list(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Reply {
    gate(&mock, &headers)?;
    Ok(Json(json!([])))
}

async fn create_invoice(State(mock): State<Arc<Mock>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    gate(&mock, &headers)?;
    let mut invoices = mock.created_invoices.lock().unwrap();
    let invoice = json!({
        "id": 500 + invoices.len(),
        "paiementId": body["paiementId"],
        "recipientEmail": body["recipientEmail"],
    });
    invoices.push(invoice.clone());
    Ok(Json(invoice))
}

async fn invoice_pdf(
    State(mock): State<Arc<Mock>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Bytes, (StatusCode, Json<Value>)> {
    gate(&mock, &headers)?;
    Ok(Bytes::from(format!("%PDF-1.4\n% invoice {id}\n%%EOF\n")))
}

async fn start_mock_backend() -> (String, Arc<Mock>) {
    let mock = Arc::new(Mock::default());
    let app = Router::new()
        .route("/api/auth/signin", post(sign_in))
        .route("/api/espaces", get(list_spaces).post(create_space))
        .route("/api/users/{id}", axum::routing::put(update_profile))
        .route("/api/indisponibilites", get(unavailabilities))
        .route("/api/reservations", get(list_reservations).post(create_reservation))
        .route("/api/reservations/space/{id}", get(reservations_for_space))
        .route("/api/paiements", get(payments))
        .route("/api/admin/events", get(empty_list))
        .route("/api/abonnements", get(empty_list))
        .route("/api/factures", get(empty_list).post(create_invoice))
        .route("/api/factures/{id}/pdf", get(invoice_pdf))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), mock)
}

fn client(base_url: &str, session: Arc<Session>) -> HttpBackend {
    HttpBackend::new(base_url, Duration::from_secs(5), session).unwrap()
}

async fn signed_in_client(base_url: &str) -> (HttpBackend, Arc<Session>) {
    let session = Arc::new(Session::in_memory(Arc::new(NotifyHub::new())));
    let http = client(base_url, session.clone());
    http.sign_in("ana@cowork.io", "secret").await.unwrap();
    (http, session)
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_persists_session_and_sends_bearer() {
    let (url, mock) = start_mock_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_user.json");

    let hub = Arc::new(NotifyHub::new());
    let session = Arc::new(Session::init(Some(path.clone()), hub.clone()));
    let http = client(&url, session.clone());

    let user = http.sign_in("ana@cowork.io", "secret").await.unwrap();
    assert_eq!(user.role, Role::Receptionist);
    assert!(session.has_role(Role::Receptionist));
    assert!(path.exists());
    assert_eq!(hub.latest_profile().unwrap().email, "ana@cowork.io");

    http.spaces().await.unwrap();
    assert_eq!(
        mock.auth_headers.lock().unwrap().last().map(String::as_str),
        Some("Bearer tok-123")
    );

    // A fresh process picks the session back up
    let restored = Session::init(Some(path), Arc::new(NotifyHub::new()));
    assert_eq!(restored.token().as_deref(), Some("tok-123"));
}

#[tokio::test]
async fn bad_password_is_not_a_logout() {
    let (url, _mock) = start_mock_backend().await;
    let session = Arc::new(Session::in_memory(Arc::new(NotifyHub::new())));
    let mut nav = session.hub().subscribe_navigation();
    let http = client(&url, session.clone());

    let result = http.sign_in("ana@cowork.io", "wrong").await;
    assert!(matches!(result, Err(ClientError::Unauthorized)));
    assert!(!session.is_authenticated());
    assert!(matches!(nav.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn unauthorized_clears_session_and_redirects() {
    let (url, mock) = start_mock_backend().await;
    let (http, session) = signed_in_client(&url).await;
    let mut nav = session.hub().subscribe_navigation();

    *mock.reject_with.lock().unwrap() = Some(StatusCode::UNAUTHORIZED);
    let result = http.spaces().await;

    assert!(matches!(result, Err(ClientError::Unauthorized)));
    assert!(!session.is_authenticated());
    assert_eq!(nav.recv().await.unwrap(), Navigation::SignIn);
}

#[tokio::test]
async fn forbidden_redirects_home_and_keeps_session() {
    let (url, mock) = start_mock_backend().await;
    let (http, session) = signed_in_client(&url).await;
    let mut nav = session.hub().subscribe_navigation();

    *mock.reject_with.lock().unwrap() = Some(StatusCode::FORBIDDEN);
    let result = http.payments().await;

    assert!(matches!(result, Err(ClientError::Forbidden(_))));
    assert!(session.is_authenticated());
    assert_eq!(nav.recv().await.unwrap(), Navigation::Home);
}

#[tokio::test]
async fn create_space_sends_json_data_part() {
    let (url, mock) = start_mock_backend().await;
    let (http, _session) = signed_in_client(&url).await;

    let space = Space {
        id: None,
        name: "Loft".into(),
        kind: SpaceKind::Private,
        capacity: 8,
        price: Decimal::from(40),
        active: true,
        description: Some("Top floor".into()),
        photo_url: None,
    };
    let photo = Upload {
        file_name: "loft.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: Bytes::from_static(&[0xff, 0xd8, 0xff, 0xe0]),
    };

    let created = http.create_space(&space, Some(photo)).await.unwrap();
    assert_eq!(created.id, Some(42));
    assert_eq!(created.name, "Loft");

    let (data, file_name, size) = mock.multipart.lock().unwrap().clone().unwrap();
    let data: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(data["type"], "PRIVE");
    assert_eq!(data["capacity"], 8);
    assert_eq!(file_name.as_deref(), Some("loft.jpg"));
    assert_eq!(size, 4);
}

#[tokio::test]
async fn profile_update_reaches_listeners() {
    let (url, _mock) = start_mock_backend().await;
    let (http, session) = signed_in_client(&url).await;
    let mut profiles = session.hub().subscribe_profile();
    profiles.borrow_and_update();

    let mut profile = session.current_user().unwrap().profile();
    profile.phone = Some("+33 6 00 00 00 00".into());
    let image = Upload {
        file_name: "me.png".into(),
        content_type: "image/png".into(),
        bytes: Bytes::from_static(b"\x89PNG"),
    };

    let updated = http.update_profile(&profile, Some(image)).await.unwrap();
    assert_eq!(updated.image_url.as_deref(), Some("/uploads/9/me.png"));

    profiles.changed().await.unwrap();
    let seen = profiles.borrow().clone().unwrap();
    assert_eq!(seen.phone.as_deref(), Some("+33 6 00 00 00 00"));
}

#[tokio::test]
async fn engine_books_through_http() {
    let (url, mock) = start_mock_backend().await;
    let (http, session) = signed_in_client(&url).await;
    let http = Arc::new(http);
    let engine = Engine::new(http.clone(), session.clone());

    let room = http
        .spaces()
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.id == Some(7))
        .unwrap();
    let user = session.current_user().unwrap().profile();
    let at = |s: &str| s.parse::<chrono::NaiveDateTime>().unwrap();

    let refused = engine
        .create_reservation(&ReservationRequest {
            user: user.clone(),
            space: room.clone(),
            start: at("2030-06-11T10:00:00"),
            end: at("2030-06-11T11:00:00"),
            amount: Decimal::from(25),
        })
        .await;
    assert!(matches!(
        refused,
        Err(ClientError::Conflict(Conflict::Reserved { reservation_id: Some(1) }))
    ));

    // Bare-date window: 2030-07-03 midnight is still inside
    let refused = engine
        .create_reservation(&ReservationRequest {
            user: user.clone(),
            space: room.clone(),
            start: at("2030-07-03T00:00:00"),
            end: at("2030-07-03T08:00:00"),
            amount: Decimal::from(25),
        })
        .await;
    assert!(matches!(
        refused,
        Err(ClientError::Conflict(Conflict::Unavailable { window_id: Some(2) }))
    ));
    assert!(mock.created_reservations.lock().unwrap().is_empty());

    let created = engine
        .create_reservation(&ReservationRequest {
            user,
            space: room,
            start: at("2030-06-11T12:00:00"),
            end: at("2030-06-11T14:00:00"),
            amount: Decimal::from(50),
        })
        .await
        .unwrap();
    assert_eq!(created.status, ReservationStatus::Pending);
    assert!(!created.paiement_valide);

    let sent = mock.created_reservations.lock().unwrap()[0].clone();
    assert_eq!(sent["status"], "PENDING");
    assert_eq!(sent["spaceId"], 7);
    assert_eq!(sent["paiementValide"], false);
}

#[tokio::test]
async fn engine_invoices_through_http() {
    let (url, mock) = start_mock_backend().await;
    let (http, session) = signed_in_client(&url).await;
    let engine = Engine::new(Arc::new(http), session);

    let mut state = engine.load_dashboard(&CancellationToken::new()).await;
    let dashboard = state.dashboard_mut().expect("dashboard loaded");
    assert_eq!(dashboard.validated_payments().len(), 1);
    assert_eq!(dashboard.pending_payments().len(), 1);

    let (invoice, pdf) = engine.generate_invoice(dashboard, 3).await.unwrap();
    assert_eq!(invoice.recipient_email, "ana@cowork.io");
    assert!(pdf.starts_with(b"%PDF"));
    assert!(dashboard.invoice_for(3).is_some());

    // Subscription 99 is not in the loaded list
    let missing = engine.generate_invoice(dashboard, 4).await;
    assert!(matches!(missing, Err(ClientError::MissingReference(_))));
    assert_eq!(mock.created_invoices.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dashboard_fails_when_one_collection_fails() {
    let (url, mock) = start_mock_backend().await;
    let (http, session) = signed_in_client(&url).await;
    let engine = Engine::new(Arc::new(http), session);

    *mock.reject_with.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
    let state = engine.load_dashboard(&CancellationToken::new()).await;
    assert!(matches!(state, ViewState::Failed(_)));
}
