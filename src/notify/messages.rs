//!
//! Mail bodies for every ride event a user hears about.
//!

use super::*;
use ODM::models::*;

use chrono::{DateTime, Utc};
use tera::{Context, Tera};

use log::error;

// Every mail shares one page; tera escapes whatever users typed in
const MAIL_PAGE: &str = "<html><body>\n \
                            <h2>{{ title }}</h2>\n \
                            {% for line in lines %}<p>{{ line }}</p>\n{% endfor %} \
                            <p>Campus Carpool</p>\n \
                        </body></html>";

fn clock(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn route_line(ride: &Ride) -> String {
    format!("{} \u{2192} {}", ride.origin, ride.destination)
}

fn page(title: &str, lines: &[String]) -> String {
    let mut ctx = Context::new();
    ctx.insert("title", title);
    ctx.insert("lines", lines);

    match Tera::one_off(MAIL_PAGE, &ctx, true) {
        Ok(body) => body,
        Err(value) => {
            error!("{}", format!("Mail page '{}' failed to render: {}", title, value));
            lines.join("\n")
        },
    }
}

/// Sent to a passenger after each booking, with the seats held so far
pub fn booking_confirmation(passenger_email: &str, ride: &Ride, seats_held: u32, window_minutes: i64) -> Notice {
    Notice {
        recipients: vec![passenger_email.to_string()],
        subject: "Your ride is booked".into(),
        body: page("Booking confirmed", &[
            route_line(ride),
            format!("Departure: {}", clock(&ride.starting_time)),
            format!("Seats held: {} at {:.2} each", seats_held, ride.price_per_seat),
            format!("You can cancel within {} minutes of your first booking.", window_minutes),
        ]),
    }
}

/// Sent to the rider when a passenger gives their seats back
pub fn passenger_cancelled(rider_email: &str, ride: &Ride, passenger_name: &str, seats_released: u32) -> Notice {
    Notice {
        recipients: vec![rider_email.to_string()],
        subject: "A passenger cancelled".into(),
        body: page("Booking cancelled", &[
            route_line(ride),
            format!("{} cancelled {} seat(s).", passenger_name, seats_released),
            format!("Seats now available: {}", ride.available_seats),
        ]),
    }
}

/// Sent to every passenger when the rider calls the ride off
pub fn ride_cancelled(passenger_emails: Vec<String>, ride: &Ride) -> Notice {
    Notice {
        recipients: passenger_emails,
        subject: "Your ride was cancelled".into(),
        body: page("Ride cancelled", &[
            route_line(ride),
            format!("The ride planned for {} was cancelled by the rider.", clock(&ride.scheduled_starting_time)),
        ]),
    }
}

/// Sent to every passenger on start, with the shifted schedule and the driver's contact
pub fn ride_started(passenger_emails: Vec<String>, ride: &Ride, rider: Option<&User>) -> Notice {
    let mut lines = vec![
        route_line(ride),
        format!("Started at: {}", clock(&ride.starting_time)),
        format!("Expected arrival: {}", clock(&ride.expected_time)),
    ];
    if ride.delay_in_minutes > 0 {
        lines.push(format!("The ride left {} minute(s) late.", ride.delay_in_minutes));
    }
    if let Some(rider) = rider {
        let phone = rider.phone_number.as_deref().unwrap_or("not shared");
        lines.push(format!("Driver: {} ({}, phone {})", rider.username, rider.email, phone));
    }

    Notice {
        recipients: passenger_emails,
        subject: "Your ride has started".into(),
        body: page("Ride started", &lines),
    }
}

/// Sent to every passenger once the ride completes
pub fn rating_request(passenger_emails: Vec<String>, ride: &Ride) -> Notice {
    Notice {
        recipients: passenger_emails,
        subject: "How was your ride?".into(),
        body: page("Rate your ride", &[
            route_line(ride),
            "Your ride is complete. Please rate your rider from 1 to 5.".into(),
        ]),
    }
}

/// Sent to the rider on each payment, flagging when everyone has paid
pub fn payment_received(
    rider_email: &str,
    ride: &Ride,
    payer_name: &str,
    amount: f64,
    paid_passengers: usize,
    total_passengers: usize,
) -> Notice {
    let mut lines = vec![
        route_line(ride),
        format!("{} paid {:.2}.", payer_name, amount),
        format!("{} of {} passenger(s) have paid.", paid_passengers, total_passengers),
    ];
    if total_passengers > 0 && paid_passengers == total_passengers {
        lines.push("All passengers have paid for this ride.".into());
    }

    Notice {
        recipients: vec![rider_email.to_string()],
        subject: "Payment received".into(),
        body: page("Payment received", &lines),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rides::testing::*;

    #[test]
    fn user_text_is_escaped() {
        let mut ride = sample_ride();
        ride.origin = "<script>".into();
        let notice = ride_cancelled(vec!["a@campus.edu".into()], &ride);
        assert!(notice.body.contains("&lt;script&gt;"));
        assert!(!notice.body.contains("<script>"));
        assert!(notice.body.starts_with("<html><body>"));
    }

    #[test]
    fn every_line_becomes_a_paragraph() {
        let ride = ride_with_booking("a", 2);
        let notice = booking_confirmation("a@campus.edu", &ride, 2, 3);
        assert_eq!(notice.body.matches("<p>").count(), 5);
        assert!(notice.body.contains("<h2>Booking confirmed</h2>"));
        assert!(notice.body.contains("Seats held: 2 at 100.00 each"));
    }

    #[test]
    fn started_mail_carries_the_delay_and_contact() {
        let mut ride = ride_with_booking("a", 1);
        crate::rides::lifecycle::start(&mut ride, &rider(), at(9, 10)).unwrap();

        let driver = User {
            id: RIDER_ID.into(),
            email: "driver@campus.edu".into(),
            username: "Dana".into(),
            role: Role::Rider,
            phone_number: Some("555-0100".into()),
        };
        let notice = ride_started(vec!["a@campus.edu".into()], &ride, Some(&driver));

        assert!(notice.body.contains("10 minute(s) late"));
        assert!(notice.body.contains("2024-03-14 10:10 UTC"));
        assert!(notice.body.contains("555-0100"));
    }

    #[test]
    fn full_reconciliation_is_flagged() {
        let ride = ride_with_booking("a", 2);
        let partial = payment_received("r@campus.edu", &ride, "A", 200.0, 1, 2);
        assert!(!partial.body.contains("All passengers have paid"));

        let full = payment_received("r@campus.edu", &ride, "A", 200.0, 2, 2);
        assert!(full.body.contains("All passengers have paid"));
        assert_eq!(full.recipients, vec!["r@campus.edu".to_string()]);
    }
}
