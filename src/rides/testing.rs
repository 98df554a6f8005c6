//! Shared fixtures for the engine tests.

use super::*;
use super::lifecycle::{self, RideDraft};
use ODM::models::*;

use chrono::{DateTime, TimeZone, Utc};

pub const RIDER_ID: &str = "rider-1";

/// A fixed day so tests never depend on the wall clock
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, hour, minute, 0).unwrap()
}

pub fn booked_at() -> DateTime<Utc> {
    at(8, 0)
}

pub fn rider() -> Caller {
    Caller::new(RIDER_ID, Role::Rider)
}

pub fn passenger(id: &str) -> Caller {
    Caller::new(id, Role::User)
}

/// Campus → Downtown, 09:00–10:00, 4 seats at 100
pub fn draft(_now: DateTime<Utc>) -> RideDraft {
    RideDraft {
        origin: "Campus Main Gate".into(),
        destination: "Downtown Station".into(),
        date: Some(at(0, 0)),
        starting_time: Some(at(9, 0)),
        expected_time: Some(at(10, 0)),
        available_seats: 4,
        price_per_seat: 100.0,
    }
}

pub fn sample_ride() -> Ride {
    let mut ride = lifecycle::create(&rider(), draft(at(7, 0)), at(7, 0)).unwrap();
    ride.id = "ride-1".into();
    ride
}

pub fn ride_with_booking(passenger_id: &str, seats: u32) -> Ride {
    let mut ride = sample_ride();
    booking::book(&mut ride, &passenger(passenger_id), seats as i64, booked_at()).unwrap();
    ride
}

/// Seats on offer plus seats held always add up to the published capacity
pub fn assert_seats_conserved(ride: &Ride) {
    assert_eq!(ride.available_seats + ride.total_seats_booked(), ride.initial_seats);
    assert_eq!(ride.passengers.len(), ride.passenger_bookings.len());
    for booking in &ride.passenger_bookings {
        assert!(ride.is_passenger(&booking.passenger));
    }
}
