use rust_decimal::Decimal;

use crate::error::{ClientError, Conflict};
use crate::model::*;

/// Form-level checks, run before any network call.
pub fn validate_request(request: &ReservationRequest) -> Result<(), ClientError> {
    if request.end <= request.start {
        return Err(ClientError::Validation(
            "end date must be after start date".into(),
        ));
    }
    if request.amount < Decimal::ZERO {
        return Err(ClientError::Validation("amount must not be negative".into()));
    }
    if !request.space.active {
        return Err(ClientError::Validation(format!(
            "space {} is not open for booking",
            request.space.name
        )));
    }
    Ok(())
}

/// Check a requested span against the space's windows and reservations.
///
/// Unavailability is checked first and wins when both would match.
/// The two checks deliberately use different boundaries:
/// windows are inclusive (`window.start <= req.end && window.end >= req.start`),
/// reservations are exclusive (`req.start < other.end && req.end > other.start`),
/// so a booking may start exactly when another ends but not on the last
/// instant of a window.
pub fn validate(
    space_id: Id,
    request: &Span,
    unavailabilities: &[UnavailabilityWindow],
    reservations: &[Reservation],
) -> Result<(), Conflict> {
    if let Some(window) = unavailabilities
        .iter()
        .filter(|w| w.space_id == space_id)
        .find(|w| w.span().touches(request))
    {
        return Err(Conflict::Unavailable { window_id: window.id });
    }

    if let Some(other) = reservations
        .iter()
        .filter(|r| r.space_id == space_id)
        .find(|r| request.overlaps(&r.span()))
    {
        return Err(Conflict::Reserved { reservation_id: other.id });
    }

    Ok(())
}

/// The reservation that gets submitted once validation passes.
pub fn pending_reservation(space_id: Id, request: &ReservationRequest) -> Reservation {
    Reservation {
        id: None,
        user_id: request.user.id,
        user_name: request.user.name.clone(),
        user_email: Some(request.user.email.clone()),
        user_phone: request.user.phone.clone(),
        space_id,
        space_name: Some(request.space.name.clone()),
        space_type: Some(request.space.kind),
        start_date: request.start,
        end_date: request.end,
        status: ReservationStatus::Pending,
        amount: request.amount,
        paiement_valide: false,
    }
}
