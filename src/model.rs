use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Backend identifiers are plain numeric keys.
pub type Id = i64;

/// A `[start, end]` pair of local timestamps.
///
/// The two overlap predicates differ only at the boundary; callers pick the
/// one matching the rule they enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Exclusive at both boundaries: spans that only share an endpoint do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Inclusive at both boundaries: a shared endpoint counts.
    pub fn touches(&self, other: &Span) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

// ── Spaces ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceKind {
    /// Shared desks, accessed through a subscription.
    #[serde(rename = "OUVERT", alias = "OPEN")]
    Open,
    /// Offices and meeting rooms, booked per reservation.
    #[serde(rename = "PRIVE", alias = "PRIVATE")]
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SpaceKind,
    pub capacity: u32,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityWindow {
    #[serde(default)]
    pub id: Option<Id>,
    pub space_id: Id,
    #[serde(with = "local_time")]
    pub start_date: NaiveDateTime,
    #[serde(with = "local_time")]
    pub end_date: NaiveDateTime,
    #[serde(default)]
    pub reason: Option<String>,
}

impl UnavailabilityWindow {
    pub fn span(&self) -> Span {
        Span::new(self.start_date, self.end_date)
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(default)]
    pub id: Option<Id>,
    pub user_id: Id,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_phone: Option<String>,
    pub space_id: Id,
    #[serde(default)]
    pub space_name: Option<String>,
    #[serde(default)]
    pub space_type: Option<SpaceKind>,
    #[serde(with = "local_time")]
    pub start_date: NaiveDateTime,
    #[serde(with = "local_time")]
    pub end_date: NaiveDateTime,
    pub status: ReservationStatus,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(rename = "paiementValide", default)]
    pub paiement_valide: bool,
}

impl Reservation {
    pub fn span(&self) -> Span {
        Span::new(self.start_date, self.end_date)
    }
}

/// What a user submits from the booking form.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRequest {
    pub user: UserProfile,
    pub space: Space,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub amount: Decimal,
}

impl ReservationRequest {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

// ── Subscriptions ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionType {
    #[serde(rename = "MENSUEL", alias = "MONTHLY")]
    Monthly,
    #[serde(rename = "ANNUEL", alias = "YEARLY")]
    Yearly,
}

impl std::fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionType::Monthly => write!(f, "MENSUEL"),
            SubscriptionType::Yearly => write!(f, "ANNUEL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
    pub price: Decimal,
    #[serde(with = "local_time")]
    pub start_date: NaiveDateTime,
    #[serde(with = "local_time")]
    pub end_date: NaiveDateTime,
    pub user_id: Id,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(rename = "espaceId")]
    pub space_id: Id,
}

/// Catalog entry for a subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
    pub price: Decimal,
}

// ── Payments ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Validated,
    Cancelled,
}

/// What a payment pays for. The id is optional because the backend may
/// send a payment whose foreign key was nulled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentTarget {
    Reservation(Option<Id>),
    Subscription(Option<Id>),
    Event(Option<Id>),
}

impl PaymentTarget {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentTarget::Reservation(_) => "reservation",
            PaymentTarget::Subscription(_) => "subscription",
            PaymentTarget::Event(_) => "event",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PaymentRecord", into = "PaymentRecord")]
pub struct Payment {
    pub id: Option<Id>,
    pub target: PaymentTarget,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub user_id: Option<Id>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum PaymentTag {
    #[serde(rename = "RESERVATION")]
    Reservation,
    #[serde(rename = "SUBSCRIPTION", alias = "ABONNEMENT")]
    Subscription,
    #[serde(rename = "EVENT", alias = "EVENEMENT")]
    Event,
}

/// Flat wire shape of a payment: a type tag plus three nullable foreign keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRecord {
    #[serde(default)]
    id: Option<Id>,
    #[serde(rename = "type")]
    tag: PaymentTag,
    amount: Decimal,
    status: PaymentStatus,
    #[serde(default)]
    user_id: Option<Id>,
    #[serde(default)]
    reservation_id: Option<Id>,
    #[serde(default)]
    abonnement_id: Option<Id>,
    #[serde(default)]
    evenement_id: Option<Id>,
    #[serde(default, with = "local_time_opt")]
    created_at: Option<NaiveDateTime>,
}

impl From<PaymentRecord> for Payment {
    fn from(r: PaymentRecord) -> Self {
        let target = match r.tag {
            PaymentTag::Reservation => PaymentTarget::Reservation(r.reservation_id),
            PaymentTag::Subscription => PaymentTarget::Subscription(r.abonnement_id),
            PaymentTag::Event => PaymentTarget::Event(r.evenement_id),
        };
        Payment {
            id: r.id,
            target,
            amount: r.amount,
            status: r.status,
            user_id: r.user_id,
            created_at: r.created_at,
        }
    }
}

impl From<Payment> for PaymentRecord {
    fn from(p: Payment) -> Self {
        let (tag, reservation_id, abonnement_id, evenement_id) = match p.target {
            PaymentTarget::Reservation(id) => (PaymentTag::Reservation, id, None, None),
            PaymentTarget::Subscription(id) => (PaymentTag::Subscription, None, id, None),
            PaymentTarget::Event(id) => (PaymentTag::Event, None, None, id),
        };
        PaymentRecord {
            id: p.id,
            tag,
            amount: p.amount,
            status: p.status,
            user_id: p.user_id,
            reservation_id,
            abonnement_id,
            evenement_id,
            created_at: p.created_at,
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: Id,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: Option<Id>,
    pub title: String,
    #[serde(default, with = "local_time_opt")]
    pub date: Option<NaiveDateTime>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

// ── Invoices ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(rename = "paiementId")]
    pub payment_id: Id,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub recipient_email: String,
    #[serde(default, with = "local_time_opt")]
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    #[serde(rename = "paiementId")]
    pub payment_id: Id,
    pub recipient_email: String,
}

// ── Users ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_ADMIN", alias = "ADMIN")]
    Admin,
    #[serde(rename = "ROLE_RECEPTIONNISTE", alias = "RECEPTIONIST")]
    Receptionist,
    #[serde(rename = "ROLE_COWORKER", alias = "COWORKER")]
    Coworker,
}

/// Public part of a user, as carried on reservations and profile updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Id,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The signed-in user plus the bearer token, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Id,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    pub token: String,
}

impl CurrentUser {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            image_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

// ── Serde helpers ────────────────────────────────────────────────

/// Local timestamps. Accepts full date-times, bare dates (local midnight)
/// and offset-carrying strings (offset dropped, wall-clock kept).
pub mod local_time {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        value.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, String> {
        if let Ok(dt) = raw.parse::<NaiveDateTime>() {
            return Ok(dt);
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.naive_local());
        }
        raw.parse::<NaiveDate>()
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .map_err(|_| format!("invalid date or date-time: {raw}"))
    }
}

pub(crate) mod local_time_opt {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        value.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => super::local_time::parse(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn overlap_predicates_differ_at_boundary() {
        let a = Span::new(at("2024-05-01T09:00:00"), at("2024-05-01T12:00:00"));
        let b = Span::new(at("2024-05-01T12:00:00"), at("2024-05-01T14:00:00"));
        assert!(!a.overlaps(&b));
        assert!(a.touches(&b));
    }

    #[test]
    fn payment_wire_type_becomes_target() {
        let p: Payment = serde_json::from_value(json!({
            "id": 7,
            "type": "ABONNEMENT",
            "amount": 650,
            "status": "PENDING",
            "userId": 3,
            "abonnementId": 12,
            "reservationId": 99
        }))
        .unwrap();
        // Foreign keys that do not match the tag are ignored.
        assert_eq!(p.target, PaymentTarget::Subscription(Some(12)));
        assert_eq!(p.amount, Decimal::from(650));

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["type"], "SUBSCRIPTION");
        assert_eq!(back["abonnementId"], 12);
        assert!(back["reservationId"].is_null());
    }

    #[test]
    fn payment_types_serialize_with_english_names() {
        let payment = |target| Payment {
            id: Some(1),
            target,
            amount: Decimal::from(10),
            status: PaymentStatus::Validated,
            user_id: None,
            created_at: None,
        };
        let cases = [
            (PaymentTarget::Reservation(Some(2)), "RESERVATION"),
            (PaymentTarget::Subscription(Some(2)), "SUBSCRIPTION"),
            (PaymentTarget::Event(Some(2)), "EVENT"),
        ];
        for (target, name) in cases {
            let v = serde_json::to_value(payment(target)).unwrap();
            assert_eq!(v["type"], name);
            let back: Payment = serde_json::from_value(v).unwrap();
            assert_eq!(back.target, target);
        }

        let legacy: Payment = serde_json::from_value(json!({
            "type": "EVENEMENT",
            "amount": 10,
            "status": "PENDING",
            "evenementId": 4
        }))
        .unwrap();
        assert_eq!(legacy.target, PaymentTarget::Event(Some(4)));
    }

    #[test]
    fn unknown_payment_type_is_rejected() {
        let result: Result<Payment, _> = serde_json::from_value(json!({
            "type": "GIFT_CARD",
            "amount": 10,
            "status": "PENDING"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn unavailability_accepts_bare_dates() {
        let w: UnavailabilityWindow = serde_json::from_value(json!({
            "id": 1,
            "spaceId": 4,
            "startDate": "2024-06-10",
            "endDate": "2024-06-12T18:30:00",
            "reason": "maintenance"
        }))
        .unwrap();
        assert_eq!(w.start_date, at("2024-06-10T00:00:00"));
        assert_eq!(w.end_date, at("2024-06-12T18:30:00"));
    }

    #[test]
    fn space_kind_accepts_both_spellings() {
        let open: SpaceKind = serde_json::from_value(json!("OPEN")).unwrap();
        let prive: SpaceKind = serde_json::from_value(json!("PRIVE")).unwrap();
        assert_eq!(open, SpaceKind::Open);
        assert_eq!(prive, SpaceKind::Private);
        assert_eq!(serde_json::to_value(SpaceKind::Open).unwrap(), json!("OUVERT"));
    }
}
