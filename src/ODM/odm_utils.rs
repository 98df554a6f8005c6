//!
//! Documentation of the Database Utilities module.
//! Contains all the utilities needed for a carpool connection.
//!

use super::*;
use models::*;
use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rides::search::SearchQuery;

/// Converts a UserDocument to User
pub fn doc_to_user(document: &UserDocument) -> User {
    User {
        id:           document._id.unwrap_or_default().to_hex(),
        email:        document.email.to_string(),
        username:     document.username.to_string(),
        role:         document.role,
        phone_number: document.phone_number.clone(),
    }
}

/// Converts a RideDocument to Ride
pub fn doc_to_ride(document: &RideDocument) -> Ride {
    let bookings = document.passenger_bookings.iter().map(|booking| PassengerBooking {
        passenger:    booking.passenger.clone(),
        booking_time: booking.booking_time.to_chrono(),
        seats_booked: booking.seats_booked.max(0) as u32,
    });

    let payments = document.passenger_payments.iter().map(|payment| PassengerPayment {
        passenger:      payment.passenger.clone(),
        payment_status: payment.payment_status,
        payment_id:     payment.payment_id.clone(),
        paid_amount:    payment.paid_amount,
        paid_at:        payment.paid_at.map(|at| at.to_chrono()),
    });

    let ratings = document.ratings.iter().map(|rating| Rating {
        passenger:  rating.passenger.clone(),
        rating:     rating.rating.clamp(1, 5) as u8,
        feedback:   rating.feedback.clone(),
        created_at: rating.created_at.to_chrono(),
    });

    Ride {
        id:                      document._id.unwrap_or_default().to_hex(),
        version:                 document.version,
        origin:                  document.origin.clone(),
        destination:             document.destination.clone(),
        date:                    document.date.to_chrono(),
        starting_time:           document.starting_time.to_chrono(),
        expected_time:           document.expected_time.to_chrono(),
        scheduled_starting_time: document.scheduled_starting_time.to_chrono(),
        scheduled_expected_time: document.scheduled_expected_time.to_chrono(),
        actual_start_time:       document.actual_start_time.map(|at| at.to_chrono()),
        actual_end_time:         document.actual_end_time.map(|at| at.to_chrono()),
        delay_in_minutes:        document.delay_in_minutes,
        initial_seats:           document.initial_seats.max(0) as u32,
        available_seats:         document.available_seats.max(0) as u32,
        price_per_seat:          document.price_per_seat,
        rider:                   document.rider.clone(),
        passengers:              document.passengers.clone(),
        passenger_bookings:      bookings.collect(),
        status:                  document.status,
        payment_status:          document.payment_status,
        passenger_payments:      payments.collect(),
        ratings:                 ratings.collect(),
        average_rating:          document.average_rating,
        created_at:              document.created_at.to_chrono(),
        updated_at:              document.updated_at.to_chrono(),
    }
}

/// Converts a Ride back to its stored form. An empty or malformed id yields a
/// document without `_id` so MongoDB assigns one on insert.
pub fn ride_to_doc(ride: &Ride) -> RideDocument {
    let bookings = ride.passenger_bookings.iter().map(|booking| PassengerBookingDocument {
        passenger:    booking.passenger.clone(),
        booking_time: DateTime::from_chrono(booking.booking_time),
        seats_booked: booking.seats_booked as i32,
    });

    let payments = ride.passenger_payments.iter().map(|payment| PassengerPaymentDocument {
        passenger:      payment.passenger.clone(),
        payment_status: payment.payment_status,
        payment_id:     payment.payment_id.clone(),
        paid_amount:    payment.paid_amount,
        paid_at:        payment.paid_at.map(DateTime::from_chrono),
    });

    let ratings = ride.ratings.iter().map(|rating| RatingDocument {
        passenger:  rating.passenger.clone(),
        rating:     rating.rating as i32,
        feedback:   rating.feedback.clone(),
        created_at: DateTime::from_chrono(rating.created_at),
    });

    RideDocument {
        _id:                     ObjectId::parse_str(&ride.id).ok(),
        version:                 ride.version,
        origin:                  ride.origin.clone(),
        destination:             ride.destination.clone(),
        date:                    DateTime::from_chrono(ride.date),
        starting_time:           DateTime::from_chrono(ride.starting_time),
        expected_time:           DateTime::from_chrono(ride.expected_time),
        scheduled_starting_time: DateTime::from_chrono(ride.scheduled_starting_time),
        scheduled_expected_time: DateTime::from_chrono(ride.scheduled_expected_time),
        actual_start_time:       ride.actual_start_time.map(DateTime::from_chrono),
        actual_end_time:         ride.actual_end_time.map(DateTime::from_chrono),
        delay_in_minutes:        ride.delay_in_minutes,
        initial_seats:           ride.initial_seats as i32,
        available_seats:         ride.available_seats as i32,
        price_per_seat:          ride.price_per_seat,
        rider:                   ride.rider.clone(),
        passengers:              ride.passengers.clone(),
        passenger_bookings:      bookings.collect(),
        status:                  ride.status,
        payment_status:          ride.payment_status,
        passenger_payments:      payments.collect(),
        ratings:                 ratings.collect(),
        average_rating:          ride.average_rating,
        created_at:              DateTime::from_chrono(ride.created_at),
        updated_at:              DateTime::from_chrono(ride.updated_at),
    }
}

/// The UTC range `[00:00:00.000, 23:59:59.999]` of a calendar day
pub fn day_range(day: NaiveDate) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
    let end = start + chrono::Duration::days(1) - chrono::Duration::milliseconds(1);
    (start, end)
}

/// Seat floor for the store query, at least 1 and never past what an i32 holds
fn min_seats_bound(min_seats: Option<u32>) -> i32 {
    min_seats.unwrap_or(1).clamp(1, i32::MAX as u32) as i32
}

/// Builds the storage-level filter for a ride search.
///
/// Ranking and user enrichment happen afterwards in `rides::search`.
pub fn search_filter(query: &SearchQuery) -> Document {
    let mut filter = doc! {
        "status": { "$in": [RideStatus::Available.as_str(), RideStatus::Started.as_str()] },
        "availableSeats": { "$gte": min_seats_bound(query.min_seats) },
    };

    if let Some(origin) = query.origin.as_deref().filter(|o| !o.trim().is_empty()) {
        filter.insert("origin", doc! { "$regex": regex::escape(origin.trim()), "$options": "i" });
    }
    if let Some(destination) = query.destination.as_deref().filter(|d| !d.trim().is_empty()) {
        filter.insert("destination", doc! { "$regex": regex::escape(destination.trim()), "$options": "i" });
    }
    if let Some(day) = query.date {
        let (start, end) = day_range(day);
        filter.insert("date", doc! {
            "$gte": DateTime::from_chrono(start),
            "$lte": DateTime::from_chrono(end),
        });
    }

    filter
}
