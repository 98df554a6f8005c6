//!
//! Documentation of the Models module.
//! Contains all the models needed for a carpool connection.
//!
//! `*Document` structs are what MongoDB stores (`ObjectId`, `bson::DateTime`),
//! the plain structs are what the engine mutates and the API returns.
//!



use rocket::serde::{Serialize, Deserialize};
use bson::{oid::ObjectId, DateTime};
use chrono::Utc;

type Timestamp = chrono::DateTime<Utc>;

/// The role handed out by the identity provider
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Rider,
    Admin,
}

impl Role {
    /// Parses the role a user asks for on first sign-in; admin can't be self-assigned
    pub fn from_signup(value: &str) -> Role {
        match value.trim().to_ascii_lowercase().as_str() {
            "rider" => Role::Rider,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Rider => "rider",
            Role::Admin => "admin",
        }
    }
}

/// Ride lifecycle state
///
/// `Booked` is never stored. It is only shown to passengers in their bookings
/// view while the ride is still `Available`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Available,
    Booked,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Available => "available",
            RideStatus::Booked => "booked",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

/*
Models for the MongoDB operations
*/
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    /// The ID of the model.
    pub _id: Option<ObjectId>,
    /// The user's email address.
    pub email: String,
    /// The name of the user
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Hex form of the document id
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PassengerBookingDocument {
    pub passenger: String,
    pub booking_time: DateTime,
    pub seats_booked: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PassengerPaymentDocument {
    pub passenger: String,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub paid_amount: f64,
    pub paid_at: Option<DateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RatingDocument {
    pub passenger: String,
    pub rating: i32,
    pub feedback: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RideDocument {
    /// The ID of the model.
    pub _id: Option<ObjectId>,
    /// Bumped on every write, used as the compare-and-swap token
    pub version: i64,
    pub origin: String,
    pub destination: String,
    pub date: DateTime,
    pub starting_time: DateTime,
    pub expected_time: DateTime,
    pub scheduled_starting_time: DateTime,
    pub scheduled_expected_time: DateTime,
    pub actual_start_time: Option<DateTime>,
    pub actual_end_time: Option<DateTime>,
    pub delay_in_minutes: i64,
    pub initial_seats: i32,
    pub available_seats: i32,
    pub price_per_seat: f64,
    /// The internal ID of the owner
    pub rider: String,
    pub passengers: Vec<String>,
    pub passenger_bookings: Vec<PassengerBookingDocument>,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub passenger_payments: Vec<PassengerPaymentDocument>,
    pub ratings: Vec<RatingDocument>,
    pub average_rating: f64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerBooking {
    pub passenger: String,
    pub booking_time: Timestamp,
    pub seats_booked: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerPayment {
    pub passenger: String,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub paid_amount: f64,
    pub paid_at: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub passenger: String,
    pub rating: u8,
    pub feedback: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    /// Hex form of the document id
    pub id: String,
    pub version: i64,
    pub origin: String,
    pub destination: String,
    pub date: Timestamp,
    /// Current departure, overwritten with the real one on start
    pub starting_time: Timestamp,
    /// Current arrival estimate, shifted by any start delay
    pub expected_time: Timestamp,
    /// The schedule as published, never mutated
    pub scheduled_starting_time: Timestamp,
    pub scheduled_expected_time: Timestamp,
    pub actual_start_time: Option<Timestamp>,
    pub actual_end_time: Option<Timestamp>,
    pub delay_in_minutes: i64,
    pub initial_seats: u32,
    pub available_seats: u32,
    pub price_per_seat: f64,
    pub rider: String,
    pub passengers: Vec<String>,
    pub passenger_bookings: Vec<PassengerBooking>,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub passenger_payments: Vec<PassengerPayment>,
    pub ratings: Vec<Rating>,
    pub average_rating: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Ride {
    pub fn is_rider(&self, user_id: &str) -> bool {
        self.rider == user_id
    }

    pub fn is_passenger(&self, user_id: &str) -> bool {
        self.passengers.iter().any(|p| p == user_id)
    }

    pub fn booking_for(&self, user_id: &str) -> Option<&PassengerBooking> {
        self.passenger_bookings.iter().find(|b| b.passenger == user_id)
    }

    pub fn payment_for(&self, user_id: &str) -> Option<&PassengerPayment> {
        self.passenger_payments.iter().find(|p| p.passenger == user_id)
    }

    pub fn seats_booked_by(&self, user_id: &str) -> u32 {
        self.booking_for(user_id).map(|b| b.seats_booked).unwrap_or(0)
    }

    pub fn total_seats_booked(&self) -> u32 {
        self.passenger_bookings.iter().map(|b| b.seats_booked).sum()
    }
}
