//!
//! Per-passenger payment ledger and the ride-level payment status.
//!

use super::*;
use super::error::{RideError, RideResult};
use ODM::models::*;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub passenger: String,
    /// Charged by this payment alone
    pub paid_amount: f64,
    pub payment_status: PaymentStatus,
    /// True once every current passenger has paid
    pub fully_paid: bool,
    pub paid_passengers: usize,
    pub total_passengers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerPaymentRow {
    pub passenger: String,
    pub seats_booked: u32,
    pub amount_due: f64,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub paid_amount: f64,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub ride_id: String,
    pub payment_status: PaymentStatus,
    pub total_earnings: f64,
    pub received_payments: f64,
    pub pending_amount: f64,
    pub passengers: Vec<PassengerPaymentRow>,
}

/// What a passenger owes: the seat price times the seats they hold
pub fn amount_due(ride: &Ride, user_id: &str) -> f64 {
    ride.price_per_seat * ride.seats_booked_by(user_id) as f64
}

/// Money is compared in cents so float noise never leaves a passenger owing 0.00
fn cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// What is already on the passenger's record, paid in one go or in top-ups
fn paid_so_far(ride: &Ride, user_id: &str) -> f64 {
    ride.payment_for(user_id).map(|p| p.paid_amount).unwrap_or(0.0)
}

/// The part of `amount_due` not yet covered by verified payments
pub fn outstanding(ride: &Ride, user_id: &str) -> f64 {
    let owed = cents(amount_due(ride, user_id)) - cents(paid_so_far(ride, user_id));
    owed.max(0) as f64 / 100.0
}

/// Settled when a completed record covers the seats, or when the seats are free
fn has_paid(ride: &Ride, user_id: &str) -> bool {
    let due = cents(amount_due(ride, user_id));
    due == 0 || ride.payment_for(user_id)
        .map(|p| p.payment_status == PaymentStatus::Completed && cents(p.paid_amount) >= due)
        .unwrap_or(false)
}

/// Recomputes both flags: a passenger record is completed only while its
/// paid amount covers their seats, and the ride is completed only when there
/// is at least one passenger and every one of them has paid.
///
/// Records of passengers who left are history and take no part.
pub fn refresh_payment_status(ride: &mut Ride) {
    let dues: Vec<(String, i64)> = ride.passengers.iter()
        .map(|p| (p.clone(), cents(amount_due(ride, p))))
        .collect();

    for record in ride.passenger_payments.iter_mut() {
        if let Some((_, due)) = dues.iter().find(|(p, _)| p == &record.passenger) {
            let paid = cents(record.paid_amount);
            record.payment_status = if paid > 0 && paid >= *due { PaymentStatus::Completed } else { PaymentStatus::Pending };
        }
    }

    let all_paid = !ride.passengers.is_empty() && ride.passengers.iter().all(|p| has_paid(ride, p));
    ride.payment_status = if all_paid { PaymentStatus::Completed } else { PaymentStatus::Pending };
}

fn payable_by(ride: &Ride, caller: &Caller) -> RideResult<f64> {
    if !ride.is_passenger(&caller.id) {
        return Err(RideError::Forbidden("You are not authorized to make payment for this ride".into()));
    }
    if ride.status == RideStatus::Cancelled {
        return Err(RideError::InvalidState("Cancelled rides cannot be paid for".into()));
    }
    let owed = outstanding(ride, &caller.id);
    if cents(owed) == 0 {
        return Err(RideError::Conflict("Payment has already been completed for this ride".into()));
    }
    Ok(owed)
}

/// Checks a passenger may open a payment and returns the amount to charge.
///
/// After a repeat booking this is only the top-up for the new seats.
pub fn prepare_order(ride: &Ride, caller: &Caller) -> RideResult<f64> {
    payable_by(ride, caller)
}

/// Records a gateway-verified payment covering what the caller still owes.
///
/// Only call this after the gateway confirmed `payment_id`.
pub fn record_payment(ride: &mut Ride, caller: &Caller, payment_id: &str, now: DateTime<Utc>) -> RideResult<PaymentReceipt> {
    if payment_id.trim().is_empty() {
        return Err(RideError::Validation("Payment id is required".into()));
    }
    let paid_amount = payable_by(ride, caller)?;

    let record = PassengerPayment {
        passenger: caller.id.clone(),
        payment_status: PaymentStatus::Completed,
        payment_id: Some(payment_id.trim().to_string()),
        paid_amount: (cents(paid_so_far(ride, &caller.id)) + cents(paid_amount)) as f64 / 100.0,
        paid_at: Some(now),
    };

    match ride.passenger_payments.iter_mut().find(|p| p.passenger == caller.id) {
        Some(existing) => *existing = record,
        None => ride.passenger_payments.push(record),
    }

    refresh_payment_status(ride);
    ride.updated_at = now;

    let paid_passengers = ride.passengers.iter().filter(|p| has_paid(ride, p)).count();
    Ok(PaymentReceipt {
        passenger: caller.id.clone(),
        paid_amount,
        payment_status: ride.payment_status,
        fully_paid: ride.payment_status == PaymentStatus::Completed,
        paid_passengers,
        total_passengers: ride.passengers.len(),
    })
}

/// Rider-side view of what the ride should earn and what has arrived
pub fn earnings(ride: &Ride) -> EarningsSummary {
    let rows: Vec<PassengerPaymentRow> = ride.passenger_bookings.iter().map(|booking| {
        let payment = ride.payment_for(&booking.passenger);
        PassengerPaymentRow {
            passenger: booking.passenger.clone(),
            seats_booked: booking.seats_booked,
            amount_due: ride.price_per_seat * booking.seats_booked as f64,
            payment_status: payment.map(|p| p.payment_status).unwrap_or(PaymentStatus::Pending),
            payment_id: payment.and_then(|p| p.payment_id.clone()),
            paid_amount: payment.map(|p| p.paid_amount).unwrap_or(0.0),
            paid_at: payment.and_then(|p| p.paid_at),
        }
    }).collect();

    let total_earnings = ride.price_per_seat * ride.total_seats_booked() as f64;
    let received_cents: i64 = ride.passenger_payments.iter()
        .filter(|p| ride.is_passenger(&p.passenger))
        .map(|p| cents(p.paid_amount))
        .sum();
    let received_payments = received_cents as f64 / 100.0;

    EarningsSummary {
        ride_id: ride.id.clone(),
        payment_status: ride.payment_status,
        total_earnings,
        received_payments,
        pending_amount: (total_earnings - received_payments).max(0.0),
        passengers: rows,
    }
}

/// Earnings, visible to the ride's own rider only
pub fn earnings_for(ride: &Ride, caller: &Caller) -> RideResult<EarningsSummary> {
    if !ride.is_rider(&caller.id) {
        return Err(RideError::Forbidden("Only the ride creator can see its payments".into()));
    }
    Ok(earnings(ride))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rides::testing::*;

    #[test]
    fn earnings_are_private_to_the_rider() {
        let ride = ride_with_booking("a", 1);
        assert!(matches!(earnings_for(&ride, &passenger("a")), Err(RideError::Forbidden(_))));
        assert_eq!(earnings_for(&ride, &rider()).unwrap().total_earnings, 100.0);
    }

    #[test]
    fn full_trip_scenario() {
        let rules = Rules::default();
        let mut ride = sample_ride();

        booking::book(&mut ride, &passenger("A"), 2, at(8, 0)).unwrap();
        assert_eq!(ride.available_seats, 2);
        booking::book(&mut ride, &passenger("B"), 2, at(8, 1)).unwrap();
        assert_eq!(ride.available_seats, 0);

        lifecycle::start(&mut ride, &rider(), at(9, 0)).unwrap();
        assert_eq!(ride.status, RideStatus::Started);
        lifecycle::complete(&mut ride, &rider(), at(9, 45), &rules).unwrap();
        assert_eq!(ride.status, RideStatus::Completed);

        let first = record_payment(&mut ride, &passenger("A"), "pay_A", at(10, 0)).unwrap();
        assert_eq!(ride.passenger_payments.len(), 1);
        assert_eq!(ride.passenger_payments[0].payment_status, PaymentStatus::Completed);
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        assert!(!first.fully_paid);

        let second = record_payment(&mut ride, &passenger("B"), "pay_B", at(10, 5)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Completed);
        assert!(second.fully_paid);
        assert_eq!(second.paid_passengers, 2);
    }

    #[test]
    fn paying_twice_is_a_conflict() {
        let mut ride = ride_with_booking("a", 1);
        record_payment(&mut ride, &passenger("a"), "pay_1", at(8, 30)).unwrap();
        let err = record_payment(&mut ride, &passenger("a"), "pay_2", at(8, 31)).unwrap_err();
        assert!(matches!(err, RideError::Conflict(_)));
        assert_eq!(ride.passenger_payments.len(), 1);
        assert_eq!(ride.passenger_payments[0].payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn only_passengers_pay() {
        let mut ride = ride_with_booking("a", 1);
        let err = record_payment(&mut ride, &passenger("b"), "pay", at(8, 30)).unwrap_err();
        assert!(matches!(err, RideError::Forbidden(_)));
        assert!(matches!(prepare_order(&ride, &rider()), Err(RideError::Forbidden(_))));
    }

    #[test]
    fn order_amount_covers_every_seat() {
        let ride = ride_with_booking("a", 3);
        assert_eq!(prepare_order(&ride, &passenger("a")).unwrap(), 300.0);
    }

    #[test]
    fn earnings_compare_expected_and_received() {
        let mut ride = sample_ride();
        booking::book(&mut ride, &passenger("a"), 1, at(8, 0)).unwrap();
        booking::book(&mut ride, &passenger("b"), 2, at(8, 0)).unwrap();
        record_payment(&mut ride, &passenger("b"), "pay_b", at(8, 30)).unwrap();

        let summary = earnings(&ride);
        assert_eq!(summary.total_earnings, 300.0);
        assert_eq!(summary.received_payments, 200.0);
        assert_eq!(summary.pending_amount, 100.0);
        assert_eq!(summary.passengers.len(), 2);
        assert_eq!(summary.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn new_booking_reopens_a_fully_paid_ride() {
        let mut ride = ride_with_booking("a", 1);
        record_payment(&mut ride, &passenger("a"), "pay_a", at(8, 30)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Completed);

        booking::book(&mut ride, &passenger("b"), 1, at(8, 31)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn empty_ride_is_never_fully_paid() {
        let mut ride = sample_ride();
        refresh_payment_status(&mut ride);
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn repeat_booking_after_paying_owes_a_top_up() {
        let mut ride = ride_with_booking("a", 1);
        record_payment(&mut ride, &passenger("a"), "pay_1", at(8, 30)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Completed);

        booking::book(&mut ride, &passenger("a"), 1, at(8, 31)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        assert_eq!(ride.payment_for("a").unwrap().payment_status, PaymentStatus::Pending);
        assert_eq!(prepare_order(&ride, &passenger("a")).unwrap(), 100.0);

        let receipt = record_payment(&mut ride, &passenger("a"), "pay_2", at(8, 40)).unwrap();
        assert_eq!(receipt.paid_amount, 100.0);
        assert!(receipt.fully_paid);
        assert_eq!(ride.passenger_payments.len(), 1);
        assert_eq!(ride.passenger_payments[0].paid_amount, 200.0);
        assert_eq!(ride.passenger_payments[0].payment_id.as_deref(), Some("pay_2"));

        let summary = earnings(&ride);
        assert_eq!(summary.received_payments, 200.0);
        assert_eq!(summary.pending_amount, 0.0);
        assert!(matches!(prepare_order(&ride, &passenger("a")), Err(RideError::Conflict(_))));
    }

    #[test]
    fn rebooking_after_cancel_credits_only_what_was_paid() {
        let rules = Rules::default();
        let mut ride = ride_with_booking("a", 1);
        record_payment(&mut ride, &passenger("a"), "pay_1", at(8, 1)).unwrap();
        lifecycle::cancel(&mut ride, &passenger("a"), at(8, 2), &rules).unwrap();

        // a departed passenger's money is history, not income
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        assert_eq!(ride.passenger_payments.len(), 1);
        assert_eq!(earnings(&ride).received_payments, 0.0);

        booking::book(&mut ride, &passenger("a"), 3, at(8, 10)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        assert_eq!(prepare_order(&ride, &passenger("a")).unwrap(), 200.0);

        let summary = earnings(&ride);
        assert_eq!(summary.total_earnings, 300.0);
        assert_eq!(summary.received_payments, 100.0);
        assert_eq!(summary.pending_amount, 200.0);
        assert_eq!(summary.passengers[0].payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn rebooking_fewer_seats_than_paid_stays_settled() {
        let rules = Rules::default();
        let mut ride = ride_with_booking("a", 2);
        record_payment(&mut ride, &passenger("a"), "pay_1", at(8, 1)).unwrap();
        lifecycle::cancel(&mut ride, &passenger("a"), at(8, 2), &rules).unwrap();

        booking::book(&mut ride, &passenger("a"), 1, at(8, 10)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Completed);
        assert_eq!(outstanding(&ride, "a"), 0.0);
        assert!(matches!(prepare_order(&ride, &passenger("a")), Err(RideError::Conflict(_))));
    }

    #[test]
    fn outstanding_ignores_float_noise() {
        let mut ride = sample_ride();
        ride.price_per_seat = 0.1;
        booking::book(&mut ride, &passenger("a"), 3, at(8, 0)).unwrap();
        ride.passenger_payments.push(PassengerPayment {
            passenger: "a".into(),
            payment_status: PaymentStatus::Completed,
            payment_id: Some("pay".into()),
            paid_amount: 0.3,
            paid_at: Some(at(8, 1)),
        });
        refresh_payment_status(&mut ride);
        assert_eq!(outstanding(&ride, "a"), 0.0);
        assert_eq!(ride.payment_status, PaymentStatus::Completed);
    }

    #[test]
    fn free_seats_need_no_payment() {
        let mut ride = sample_ride();
        ride.price_per_seat = 0.0;
        booking::book(&mut ride, &passenger("a"), 2, at(8, 0)).unwrap();
        assert_eq!(ride.payment_status, PaymentStatus::Completed);
        assert!(matches!(prepare_order(&ride, &passenger("a")), Err(RideError::Conflict(_))));
    }
}
