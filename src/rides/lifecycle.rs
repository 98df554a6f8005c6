//!
//! Ride lifecycle: create, start, complete, cancel.
//!
//! `available → started → completed`, with `cancelled` reachable from
//! `available` or `started`. Every guard runs before the first mutation.
//!

use super::*;
use super::error::{RideError, RideResult};
use ODM::models::*;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a rider submits to publish a ride
#[derive(Debug, Clone)]
pub struct RideDraft {
    pub origin: String,
    pub destination: String,
    pub date: Option<DateTime<Utc>>,
    pub starting_time: Option<DateTime<Utc>>,
    pub expected_time: Option<DateTime<Utc>>,
    pub available_seats: i64,
    pub price_per_seat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    pub new_start_time: DateTime<Utc>,
    pub new_expected_end_time: DateTime<Utc>,
    pub delay_in_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub planned_minutes: i64,
    pub elapsed_minutes: i64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// The rider called the whole ride off; these passengers were affected
    RideCancelled { passengers: Vec<String> },
    /// A single passenger gave their seats back
    PassengerLeft { passenger: String, seats_released: u32 },
}

fn require_rider(caller: &Caller, action: &str) -> RideResult<()> {
    if caller.role != Role::Rider {
        return Err(RideError::Forbidden(format!("Only riders are allowed to {} rides", action)));
    }
    Ok(())
}

fn require_owner(ride: &Ride, caller: &Caller, action: &str) -> RideResult<()> {
    if !ride.is_rider(&caller.id) {
        return Err(RideError::Forbidden(format!("Only the ride creator can {} this ride", action)));
    }
    Ok(())
}

/// Validates a draft and builds a new `available` ride owned by the caller.
/// The id is left empty; the store assigns it on insert.
pub fn create(caller: &Caller, draft: RideDraft, now: DateTime<Utc>) -> RideResult<Ride> {
    require_rider(caller, "create")?;

    let origin = draft.origin.trim().to_string();
    let destination = draft.destination.trim().to_string();
    if origin.is_empty() || destination.is_empty() {
        return Err(RideError::Validation("Origin and destination are required".into()));
    }

    let date = draft.date.ok_or_else(|| RideError::Validation("Ride date is required".into()))?;
    let starting_time = draft.starting_time
        .ok_or_else(|| RideError::Validation("Starting time is required".into()))?;
    let expected_time = draft.expected_time
        .ok_or_else(|| RideError::Validation("Expected arrival time is required".into()))?;

    if draft.available_seats < 1 {
        return Err(RideError::Validation("Available seats must be at least 1".into()));
    }
    let seats = u32::try_from(draft.available_seats)
        .ok()
        .filter(|s| *s <= i32::MAX as u32)
        .ok_or_else(|| RideError::Validation("Available seats is out of range".into()))?;

    if !draft.price_per_seat.is_finite() || draft.price_per_seat < 0.0 {
        return Err(RideError::Validation("Price per seat cannot be negative".into()));
    }

    if starting_time <= now {
        return Err(RideError::Validation("Start time must be in the future".into()));
    }
    if expected_time <= starting_time {
        return Err(RideError::Validation("Expected time must be after the starting time".into()));
    }

    Ok(Ride {
        id: String::new(),
        version: 0,
        origin,
        destination,
        date,
        starting_time,
        expected_time,
        scheduled_starting_time: starting_time,
        scheduled_expected_time: expected_time,
        actual_start_time: None,
        actual_end_time: None,
        delay_in_minutes: 0,
        initial_seats: seats,
        available_seats: seats,
        price_per_seat: draft.price_per_seat,
        rider: caller.id.clone(),
        passengers: vec![],
        passenger_bookings: vec![],
        status: RideStatus::Available,
        payment_status: PaymentStatus::Pending,
        passenger_payments: vec![],
        ratings: vec![],
        average_rating: 0.0,
        created_at: now,
        updated_at: now,
    })
}

/// Moves an `available` ride with passengers to `started`.
///
/// A late start pushes the expected arrival back by the same delay.
pub fn start(ride: &mut Ride, caller: &Caller, now: DateTime<Utc>) -> RideResult<StartReport> {
    require_rider(caller, "start")?;
    require_owner(ride, caller, "start")?;

    match ride.status {
        RideStatus::Completed => return Err(RideError::InvalidState("Ride is already completed".into())),
        RideStatus::Cancelled => return Err(RideError::InvalidState("Cancelled rides cannot be started".into())),
        RideStatus::Started => return Err(RideError::InvalidState("Ride has already started".into())),
        RideStatus::Available | RideStatus::Booked => {},
    }

    if ride.passengers.is_empty() {
        return Err(RideError::Validation("Cannot start a ride without any passengers".into()));
    }

    if now < ride.starting_time {
        let wait = ceil_minutes(ride.starting_time - now);
        return Err(RideError::timing(
            format!("Ride cannot be started before the scheduled starting time. Please wait {} minutes.", wait),
            Some(wait),
        ));
    }

    let delay = now - ride.scheduled_starting_time;
    if delay > Duration::zero() {
        ride.expected_time = ride.scheduled_expected_time + delay;
        ride.delay_in_minutes = ceil_minutes(delay);
    }

    ride.status = RideStatus::Started;
    ride.actual_start_time = Some(now);
    ride.starting_time = now;
    ride.updated_at = now;

    Ok(StartReport {
        new_start_time: now,
        new_expected_end_time: ride.expected_time,
        delay_in_minutes: ride.delay_in_minutes,
    })
}

/// Moves a `started` ride to `completed` once enough of the planned journey has elapsed.
///
/// Progress is measured against the originally planned duration, starting
/// from the actual departure.
pub fn complete(ride: &mut Ride, caller: &Caller, now: DateTime<Utc>, rules: &Rules) -> RideResult<CompletionReport> {
    require_rider(caller, "complete")?;
    require_owner(ride, caller, "complete")?;

    match ride.status {
        RideStatus::Completed => return Err(RideError::InvalidState("Ride is already completed".into())),
        RideStatus::Cancelled => return Err(RideError::InvalidState("Cancelled rides cannot be completed".into())),
        RideStatus::Started => {},
        RideStatus::Available | RideStatus::Booked => {
            return Err(RideError::InvalidState("Only started rides can be completed".into()))
        },
    }

    let planned = (ride.scheduled_expected_time - ride.scheduled_starting_time).num_milliseconds().max(0);
    let started_at = ride.actual_start_time.unwrap_or(ride.starting_time);
    let elapsed = (now - started_at).num_milliseconds();
    let threshold = rules.completion_threshold_percent;

    let progress_percent = if planned == 0 { 100.0 } else { elapsed as f64 / planned as f64 * 100.0 };

    if (elapsed as i128) * 100 < (threshold as i128) * (planned as i128) {
        let required = Duration::milliseconds((planned as i128 * threshold as i128 / 100) as i64);
        let remaining = ceil_minutes(started_at + required - now);
        return Err(RideError::timing(
            format!(
                "Ride cannot be completed yet. At least {}% of the journey time must be completed ({} minutes left).",
                threshold, remaining
            ),
            Some(remaining),
        ));
    }

    ride.status = RideStatus::Completed;
    ride.actual_end_time = Some(now);
    ride.updated_at = now;

    Ok(CompletionReport {
        planned_minutes: ceil_minutes(Duration::milliseconds(planned)),
        elapsed_minutes: elapsed.max(0) / 60_000,
        progress_percent,
    })
}

/// Cancels the whole ride (rider) or one passenger's booking (passenger).
pub fn cancel(ride: &mut Ride, caller: &Caller, now: DateTime<Utc>, rules: &Rules) -> RideResult<CancelOutcome> {
    let is_rider = ride.is_rider(&caller.id);
    let is_passenger = ride.is_passenger(&caller.id);

    if !is_rider && !is_passenger {
        return Err(RideError::Forbidden("You are not authorized to cancel this ride".into()));
    }

    match ride.status {
        RideStatus::Completed => return Err(RideError::InvalidState("Cannot cancel a completed ride".into())),
        RideStatus::Cancelled => return Err(RideError::InvalidState("Ride is already cancelled".into())),
        _ => {},
    }

    if is_rider {
        ride.status = RideStatus::Cancelled;
        ride.updated_at = now;
        return Ok(CancelOutcome::RideCancelled { passengers: ride.passengers.clone() });
    }

    let window = booking::cancellation_window(ride, &caller.id, now, rules);
    if !window.map(|w| w.can_cancel).unwrap_or(false) {
        return Err(RideError::timing(
            format!(
                "Cancellation window expired: bookings can only be cancelled within {} minutes of booking",
                rules.cancellation_window.num_minutes()
            ),
            None,
        ));
    }

    let seats_released = ride.seats_booked_by(&caller.id);
    ride.passengers.retain(|p| p != &caller.id);
    ride.passenger_bookings.retain(|b| b.passenger != caller.id);
    // money already paid stays on record and is credited if they book again
    ride.passenger_payments.retain(|p| p.passenger != caller.id || p.paid_amount > 0.0);
    ride.available_seats += seats_released;
    payments::refresh_payment_status(ride);
    ride.updated_at = now;

    Ok(CancelOutcome::PassengerLeft { passenger: caller.id.clone(), seats_released })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rides::testing::*;

    #[test]
    fn create_rejects_bad_drafts() {
        let now = at(8, 0);
        let rider = rider();

        let mut d = draft(now);
        d.available_seats = 0;
        assert!(matches!(create(&rider, d, now), Err(RideError::Validation(_))));

        let mut d = draft(now);
        d.price_per_seat = -1.0;
        assert!(matches!(create(&rider, d, now), Err(RideError::Validation(_))));

        let mut d = draft(now);
        d.starting_time = Some(at(7, 0));
        assert!(matches!(create(&rider, d, now), Err(RideError::Validation(_))));

        let mut d = draft(now);
        d.expected_time = d.starting_time;
        assert!(matches!(create(&rider, d, now), Err(RideError::Validation(_))));

        let mut d = draft(now);
        d.origin = "   ".into();
        assert!(matches!(create(&rider, d, now), Err(RideError::Validation(_))));
    }

    #[test]
    fn only_riders_create() {
        let now = at(8, 0);
        let result = create(&passenger("a"), draft(now), now);
        assert!(matches!(result, Err(RideError::Forbidden(_))));
    }

    #[test]
    fn create_produces_an_empty_available_ride() {
        let now = at(8, 0);
        let ride = create(&rider(), draft(now), now).unwrap();
        assert_eq!(ride.status, RideStatus::Available);
        assert_eq!(ride.available_seats, 4);
        assert_eq!(ride.initial_seats, 4);
        assert_eq!(ride.scheduled_starting_time, ride.starting_time);
        assert!(ride.passengers.is_empty());
        assert!(ride.ratings.is_empty());
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn start_before_schedule_is_a_timing_violation() {
        let mut ride = ride_with_booking("a", 1);
        let err = start(&mut ride, &rider(), at(8, 59)).unwrap_err();
        match err {
            RideError::Timing { remaining_minutes, .. } => assert_eq!(remaining_minutes, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ride.status, RideStatus::Available);
    }

    #[test]
    fn start_without_passengers_fails() {
        let mut ride = sample_ride();
        let err = start(&mut ride, &rider(), at(9, 0)).unwrap_err();
        assert!(matches!(err, RideError::Validation(_)));
    }

    #[test]
    fn start_by_someone_else_is_forbidden() {
        let mut ride = ride_with_booking("a", 1);
        let other = Caller::new("other-rider", Role::Rider);
        assert!(matches!(start(&mut ride, &other, at(9, 0)), Err(RideError::Forbidden(_))));
    }

    #[test]
    fn late_start_shifts_expected_time_and_keeps_schedule() {
        let mut ride = ride_with_booking("a", 1);
        let report = start(&mut ride, &rider(), at(9, 15)).unwrap();

        assert_eq!(ride.status, RideStatus::Started);
        assert_eq!(report.delay_in_minutes, 15);
        assert_eq!(ride.starting_time, at(9, 15));
        assert_eq!(ride.expected_time, at(10, 15));
        assert_eq!(ride.actual_start_time, Some(at(9, 15)));
        assert_eq!(ride.scheduled_starting_time, at(9, 0));
        assert_eq!(ride.scheduled_expected_time, at(10, 0));
    }

    #[test]
    fn on_time_start_has_no_delay() {
        let mut ride = ride_with_booking("a", 1);
        let report = start(&mut ride, &rider(), at(9, 0)).unwrap();
        assert_eq!(report.delay_in_minutes, 0);
        assert_eq!(ride.expected_time, at(10, 0));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut ride = ride_with_booking("a", 1);
        start(&mut ride, &rider(), at(9, 0)).unwrap();
        assert!(matches!(start(&mut ride, &rider(), at(9, 1)), Err(RideError::InvalidState(_))));
    }

    #[test]
    fn completion_boundary_is_inclusive() {
        // 60 minute journey: 70% is exactly 42 minutes
        let mut ride = ride_with_booking("a", 1);
        start(&mut ride, &rider(), at(9, 0)).unwrap();

        let early = complete(&mut ride, &rider(), at(9, 41), &Rules::default()).unwrap_err();
        match early {
            RideError::Timing { remaining_minutes, .. } => assert_eq!(remaining_minutes, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ride.status, RideStatus::Started);

        complete(&mut ride, &rider(), at(9, 42), &Rules::default()).unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert_eq!(ride.actual_end_time, Some(at(9, 42)));
    }

    #[test]
    fn completion_measures_from_the_actual_start() {
        let mut ride = ride_with_booking("a", 1);
        start(&mut ride, &rider(), at(9, 30)).unwrap();

        assert!(complete(&mut ride, &rider(), at(10, 0), &Rules::default()).is_err());
        assert!(complete(&mut ride, &rider(), at(10, 12), &Rules::default()).is_ok());
    }

    #[test]
    fn complete_requires_started() {
        let mut ride = ride_with_booking("a", 1);
        let err = complete(&mut ride, &rider(), at(11, 0), &Rules::default()).unwrap_err();
        assert!(matches!(err, RideError::InvalidState(_)));

        ride.status = RideStatus::Cancelled;
        let err = complete(&mut ride, &rider(), at(11, 0), &Rules::default()).unwrap_err();
        assert!(matches!(err, RideError::InvalidState(_)));
    }

    #[test]
    fn rider_cancels_the_whole_ride() {
        let mut ride = ride_with_booking("a", 2);
        let outcome = cancel(&mut ride, &rider(), at(8, 30), &Rules::default()).unwrap();
        assert_eq!(outcome, CancelOutcome::RideCancelled { passengers: vec!["a".to_string()] });
        assert_eq!(ride.status, RideStatus::Cancelled);

        let again = cancel(&mut ride, &rider(), at(8, 31), &Rules::default()).unwrap_err();
        assert!(matches!(again, RideError::InvalidState(_)));
    }

    #[test]
    fn passenger_cancel_refunds_every_seat_they_held() {
        let mut ride = ride_with_booking("a", 3);
        let outcome = cancel(&mut ride, &passenger("a"), booked_at() + Duration::minutes(2), &Rules::default()).unwrap();

        assert_eq!(outcome, CancelOutcome::PassengerLeft { passenger: "a".into(), seats_released: 3 });
        assert_eq!(ride.available_seats, 4);
        assert!(ride.passengers.is_empty());
        assert!(ride.passenger_bookings.is_empty());
        assert_eq!(ride.status, RideStatus::Available);
        assert_seats_conserved(&ride);
    }

    #[test]
    fn passenger_cancel_window_boundaries() {
        let rules = Rules::default();

        let mut ride = ride_with_booking("a", 1);
        assert!(cancel(&mut ride, &passenger("a"), booked_at() + Duration::minutes(3), &rules).is_ok());

        let mut ride = ride_with_booking("a", 1);
        let late = booked_at() + Duration::minutes(3) + Duration::milliseconds(1);
        let err = cancel(&mut ride, &passenger("a"), late, &rules).unwrap_err();
        assert!(matches!(err, RideError::Timing { .. }));
        assert!(ride.is_passenger("a"));
    }

    #[test]
    fn strangers_cannot_cancel() {
        let mut ride = ride_with_booking("a", 1);
        let err = cancel(&mut ride, &passenger("b"), at(8, 1), &Rules::default()).unwrap_err();
        assert!(matches!(err, RideError::Forbidden(_)));
    }

    #[test]
    fn completed_rides_cannot_be_cancelled() {
        let mut ride = ride_with_booking("a", 1);
        start(&mut ride, &rider(), at(9, 0)).unwrap();
        complete(&mut ride, &rider(), at(10, 0), &Rules::default()).unwrap();
        let err = cancel(&mut ride, &rider(), at(10, 1), &Rules::default()).unwrap_err();
        assert!(matches!(err, RideError::InvalidState(_)));
    }
}
