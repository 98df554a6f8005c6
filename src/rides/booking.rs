//!
//! Seat inventory and the passenger cancellation window.
//!

use super::*;
use super::error::{RideError, RideResult};
use ODM::models::*;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    /// Seats the caller now holds on this ride, across every booking
    pub seats_booked: u32,
    pub available_seats: u32,
    pub first_booking: bool,
}

/// Countdown shown to a passenger so the cancel action can be disabled on time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationWindow {
    pub can_cancel: bool,
    pub seconds_remaining: i64,
    pub expires_at: DateTime<Utc>,
}

/// Checks a requested seat count before any ride is looked at
pub fn requested_seats(seats: i64) -> RideResult<u32> {
    if seats < 1 {
        return Err(RideError::Validation("You must book at least one seat".into()));
    }
    u32::try_from(seats).map_err(|_| RideError::Validation("Too many seats requested".into()))
}

/// Books `seats` on an `available` ride for the caller.
///
/// Repeat bookings by the same passenger accumulate on their existing record.
pub fn book(ride: &mut Ride, caller: &Caller, seats: i64, now: DateTime<Utc>) -> RideResult<BookingReceipt> {
    if caller.role != Role::User {
        return Err(RideError::Forbidden("Only passengers can book rides".into()));
    }

    let seats = requested_seats(seats)?;

    if ride.status != RideStatus::Available {
        return Err(RideError::InvalidState("This ride is not available for booking".into()));
    }

    if ride.is_rider(&caller.id) {
        return Err(RideError::Forbidden("You cannot book your own ride".into()));
    }

    if ride.available_seats < seats {
        return Err(RideError::Conflict(format!(
            "Not enough available seats ({} left)", ride.available_seats
        )));
    }

    ride.available_seats -= seats;

    let first_booking = match ride.passenger_bookings.iter_mut().find(|b| b.passenger == caller.id) {
        Some(existing) => {
            existing.seats_booked += seats;
            false
        },
        None => {
            ride.passenger_bookings.push(PassengerBooking {
                passenger: caller.id.clone(),
                booking_time: now,
                seats_booked: seats,
            });
            if !ride.is_passenger(&caller.id) {
                ride.passengers.push(caller.id.clone());
            }
            true
        },
    };

    // new seats are owed for, so a fully paid ride reopens
    payments::refresh_payment_status(ride);
    ride.updated_at = now;

    Ok(BookingReceipt {
        seats_booked: ride.seats_booked_by(&caller.id),
        available_seats: ride.available_seats,
        first_booking,
    })
}

/// The caller's cancellation countdown, or `None` if they hold no booking.
///
/// Purely time based: `now - bookingTime <= window`, whatever the ride status.
pub fn cancellation_window(ride: &Ride, user_id: &str, now: DateTime<Utc>, rules: &Rules) -> Option<CancellationWindow> {
    let booking = ride.booking_for(user_id)?;
    let expires_at = booking.booking_time + rules.cancellation_window;
    let remaining = expires_at - now;

    Some(CancellationWindow {
        can_cancel: remaining >= Duration::zero(),
        seconds_remaining: remaining.num_seconds().max(0),
        expires_at,
    })
}

/// One row of a passenger's "my bookings" list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub ride: Ride,
    pub seats_booked: u32,
    pub booking_time: DateTime<Utc>,
    pub cancellation_window: CancellationWindow,
    pub amount_due: f64,
    /// Left to pay, a top-up after a repeat booking
    pub amount_outstanding: f64,
    pub my_payment_status: PaymentStatus,
    pub has_rated: bool,
}

/// Builds the passenger's view of a ride they hold seats on.
///
/// An `available` ride is shown as `booked`; the stored status is untouched.
pub fn booking_view(ride: &Ride, user_id: &str, now: DateTime<Utc>, rules: &Rules) -> Option<BookingView> {
    let booking = ride.booking_for(user_id)?;
    let cancellation_window = cancellation_window(ride, user_id, now, rules)?;

    let mut shown = ride.clone();
    if shown.status == RideStatus::Available {
        shown.status = RideStatus::Booked;
    }

    Some(BookingView {
        seats_booked: booking.seats_booked,
        booking_time: booking.booking_time,
        cancellation_window,
        amount_due: payments::amount_due(ride, user_id),
        amount_outstanding: payments::outstanding(ride, user_id),
        my_payment_status: ride.payment_for(user_id)
            .map(|p| p.payment_status)
            .unwrap_or(PaymentStatus::Pending),
        has_rated: ride.ratings.iter().any(|r| r.passenger == user_id),
        ride: shown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rides::testing::*;

    #[test]
    fn bookings_view_shows_booked_while_available() {
        let rules = Rules::default();
        let mut ride = ride_with_booking("a", 2);

        let view = booking_view(&ride, "a", booked_at(), &rules).unwrap();
        assert_eq!(view.ride.status, RideStatus::Booked);
        assert_eq!(ride.status, RideStatus::Available);
        assert_eq!(view.seats_booked, 2);
        assert_eq!(view.amount_due, 200.0);
        assert_eq!(view.amount_outstanding, 200.0);
        assert_eq!(view.my_payment_status, PaymentStatus::Pending);
        assert!(view.cancellation_window.can_cancel);

        lifecycle::start(&mut ride, &rider(), at(9, 0)).unwrap();
        let view = booking_view(&ride, "a", at(9, 0), &rules).unwrap();
        assert_eq!(view.ride.status, RideStatus::Started);
        assert!(!view.cancellation_window.can_cancel);

        assert!(booking_view(&ride, "stranger", at(9, 0), &rules).is_none());
    }

    #[test]
    fn booking_takes_seats_and_keeps_status() {
        let mut ride = sample_ride();
        let receipt = book(&mut ride, &passenger("a"), 2, at(8, 0)).unwrap();

        assert_eq!(receipt.seats_booked, 2);
        assert_eq!(receipt.available_seats, 2);
        assert!(receipt.first_booking);
        assert_eq!(ride.status, RideStatus::Available);
        assert_eq!(ride.passengers, vec!["a".to_string()]);
        assert_seats_conserved(&ride);
    }

    #[test]
    fn repeat_booking_accumulates() {
        let mut ride = sample_ride();
        book(&mut ride, &passenger("a"), 1, at(8, 0)).unwrap();
        let receipt = book(&mut ride, &passenger("a"), 2, at(8, 5)).unwrap();

        assert_eq!(receipt.seats_booked, 3);
        assert!(!receipt.first_booking);
        assert_eq!(ride.passengers.len(), 1);
        assert_eq!(ride.passenger_bookings.len(), 1);
        // the window keeps counting from the first booking
        assert_eq!(ride.passenger_bookings[0].booking_time, at(8, 0));
        assert_seats_conserved(&ride);
    }

    #[test]
    fn filling_the_ride_keeps_it_available() {
        let mut ride = sample_ride();
        book(&mut ride, &passenger("a"), 2, at(8, 0)).unwrap();
        book(&mut ride, &passenger("b"), 2, at(8, 1)).unwrap();
        assert_eq!(ride.available_seats, 0);
        assert_eq!(ride.status, RideStatus::Available);
        assert_seats_conserved(&ride);
    }

    #[test]
    fn overbooking_is_a_conflict() {
        let mut ride = sample_ride();
        book(&mut ride, &passenger("a"), 3, at(8, 0)).unwrap();
        let err = book(&mut ride, &passenger("b"), 2, at(8, 1)).unwrap_err();
        assert!(matches!(err, RideError::Conflict(_)));
        assert_eq!(ride.available_seats, 1);
        assert!(!ride.is_passenger("b"));
    }

    #[test]
    fn zero_seats_is_invalid() {
        let mut ride = sample_ride();
        assert!(matches!(book(&mut ride, &passenger("a"), 0, at(8, 0)), Err(RideError::Validation(_))));
        assert!(matches!(book(&mut ride, &passenger("a"), -2, at(8, 0)), Err(RideError::Validation(_))));
        assert!(matches!(book(&mut ride, &passenger("a"), i64::MAX, at(8, 0)), Err(RideError::Validation(_))));
        assert_eq!(ride.available_seats, 4);
    }

    #[test]
    fn seat_count_is_checked_on_its_own() {
        assert_eq!(requested_seats(2).unwrap(), 2);
        assert!(matches!(requested_seats(0), Err(RideError::Validation(_))));
        assert!(matches!(requested_seats(u32::MAX as i64 + 1), Err(RideError::Validation(_))));
    }

    #[test]
    fn riders_cannot_book() {
        let mut ride = sample_ride();
        let err = book(&mut ride, &rider(), 1, at(8, 0)).unwrap_err();
        assert!(matches!(err, RideError::Forbidden(_)));
    }

    #[test]
    fn started_rides_are_closed_for_booking() {
        let mut ride = ride_with_booking("a", 1);
        lifecycle::start(&mut ride, &rider(), at(9, 0)).unwrap();
        let err = book(&mut ride, &passenger("b"), 1, at(9, 1)).unwrap_err();
        assert!(matches!(err, RideError::InvalidState(_)));
    }

    #[test]
    fn seats_are_conserved_through_book_and_cancel() {
        let rules = Rules::default();
        let mut ride = sample_ride();
        book(&mut ride, &passenger("a"), 1, at(8, 0)).unwrap();
        book(&mut ride, &passenger("b"), 2, at(8, 0)).unwrap();
        book(&mut ride, &passenger("a"), 1, at(8, 1)).unwrap();
        assert_seats_conserved(&ride);

        lifecycle::cancel(&mut ride, &passenger("b"), at(8, 2), &rules).unwrap();
        assert_seats_conserved(&ride);
        assert_eq!(ride.available_seats, 2);

        book(&mut ride, &passenger("c"), 2, at(8, 2)).unwrap();
        assert_seats_conserved(&ride);
        assert_eq!(ride.available_seats, 0);
    }

    #[test]
    fn window_counts_down_and_closes() {
        let rules = Rules::default();
        let ride = ride_with_booking("a", 1);

        let open = cancellation_window(&ride, "a", booked_at() + Duration::seconds(60), &rules).unwrap();
        assert!(open.can_cancel);
        assert_eq!(open.seconds_remaining, 120);
        assert_eq!(open.expires_at, booked_at() + Duration::minutes(3));

        let closed = cancellation_window(&ride, "a", booked_at() + Duration::minutes(10), &rules).unwrap();
        assert!(!closed.can_cancel);
        assert_eq!(closed.seconds_remaining, 0);

        assert!(cancellation_window(&ride, "nobody", booked_at(), &rules).is_none());
    }
}
