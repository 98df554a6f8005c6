use super::*;
use config::config::ConfyConfig;
use notify::Notifier;
use payment::PaymentGateway;
use rides::error::{RideError, RideResult};
use rides::Caller;
use ODM::models::*;

use chrono::{DateTime, NaiveDate, Utc};
use rocket::request::{Request, FromRequest, Outcome};
use std::sync::Arc;

use log::{error, info};

// Utils struct for rocket::manage
pub struct MongoState {
    pub db: mongodb::Database,
}

pub struct Config {
    pub config: ConfyConfig,
}

pub struct NotifierState {
    pub notifier: Arc<dyn Notifier>,
}

pub struct GatewayState {
    pub gateway: Arc<dyn PaymentGateway>,
}

pub struct Google;

#[derive(Deserialize, Debug)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub name: String,
    pub email: String,
}

/// The signed-in user behind a request, loaded from the store
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id.clone(), self.role)
    }
}

// Checking that a user is connected
#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<AuthUser, ()> {
        let cookies = request.cookies();

        let route = match request.route() {
            None => format!("Unknown Route"),
            Some(value) => format!("{}", value),
        };
        let method = request.method();

        let email = match cookies.get_private("email") {
            Some(value) => value.value().to_string(),
            None => return Outcome::Error((Status::Unauthorized, ())),
        };
        info!("{}", format!("Client>>Server:\t{} is trying to access route: {} as {}", &email, route, method));

        let db = match request.rocket().state::<MongoState>() {
            Some(value) => &value.db,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };

        match ODM::odm::get_user_by_email(db, &email).await {
            Ok(Some(user)) => Outcome::Success(AuthUser {
                user_id: user.id,
                email: user.email,
                username: user.username,
                role: user.role,
            }),
            // the cookie outlived its account
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(value) => {
                error!("{}", format!("Database failed while authenticating {} for {}: {}", &email, route, value));
                Outcome::Error((Status::InternalServerError, ()))
            },
        }
    }
}

// Models for Input Check
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub date: Option<String>,
    pub starting_time: Option<String>,
    pub expected_time: Option<String>,
    #[serde(default)]
    pub available_seats: i64,
    #[serde(default)]
    pub price_per_seat: f64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BookRideRequest {
    pub ride_id: String,
    #[serde(default = "one_seat")]
    pub seats_to_book: i64,
}

fn one_seat() -> i64 {
    1
}

#[derive(Deserialize, Debug)]
pub struct RateRideRequest {
    pub rating: i64,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub ride_id: String,
}

#[derive(Deserialize, Debug)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    #[serde(rename = "rideId")]
    pub ride_id: String,
}

///
/// Reads an instant sent by a client
///
/// # Arguments
///
/// * `raw` - an RFC 3339 timestamp, or a bare `YYYY-MM-DD` day (taken as midnight UTC)
///
/// # Output
///
/// * Ok(None) - nothing was sent
/// * Err(Validation) - the value is not a date
///
pub fn parse_instant(raw: Option<&str>, field: &str) -> RideResult<Option<DateTime<Utc>>> {
    let raw = match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => return Ok(None),
        Some(value) => value,
    };

    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(value.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| Some(midnight.and_utc()))
        .ok_or_else(|| RideError::Validation(format!("{} is not a valid date", field)))
}

/// Loads a ride or reports it missing
pub async fn load_ride(db: &mongodb::Database, id: &str) -> RideResult<Ride> {
    ODM::odm::get_ride(db, id)
        .await?
        .ok_or_else(|| RideError::NotFound("Ride not found".into()))
}

/// Email of a single user, if the account still exists
pub async fn email_of(db: &mongodb::Database, id: &str) -> Option<String> {
    match ODM::odm::get_user_by_id(db, id).await {
        Ok(value) => value.map(|u| u.email),
        Err(value) => {
            error!("{}", format!("Database failed while looking up the email of {}: {}", id, value));
            None
        },
    }
}

/// Emails of many users; a store failure only costs the notification
pub async fn emails_of(db: &mongodb::Database, ids: &[String]) -> Vec<String> {
    match ODM::odm::get_emails_by_ids(db, ids).await {
        Ok(value) => value,
        Err(value) => {
            error!("{}", format!("Database failed while looking up {} email(s): {}", ids.len(), value));
            vec![]
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instants_accept_timestamps_and_days() {
        assert_eq!(
            parse_instant(Some("2024-03-14T09:00:00.000Z"), "startingTime").unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap())
        );
        assert_eq!(
            parse_instant(Some("2024-03-14T14:30:00+05:30"), "startingTime").unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap())
        );
        assert_eq!(
            parse_instant(Some("2024-03-14"), "date").unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_instant(None, "date").unwrap(), None);
        assert_eq!(parse_instant(Some("  "), "date").unwrap(), None);
        assert!(matches!(parse_instant(Some("tomorrow"), "date"), Err(RideError::Validation(_))));
    }
}
