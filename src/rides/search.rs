//!
//! Ride search, per-user enrichment and reputation ranking.
//!

use super::*;
use super::error::{RideError, RideResult};
use super::rating::RiderReputation;
use ODM::models::*;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Raw search form as posted by clients
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    /// `YYYY-MM-DD`, or a full RFC 3339 timestamp whose date part is used
    pub date: Option<String>,
    pub min_seats: Option<i64>,
}

/// A validated search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_seats: Option<u32>,
}

impl SearchQuery {
    pub fn parse(request: SearchRequest) -> RideResult<SearchQuery> {
        let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let date = match clean(request.date) {
            None => None,
            Some(raw) => Some(parse_day(&raw).ok_or_else(|| {
                RideError::Validation(format!("'{}' is not a valid date (expected YYYY-MM-DD)", raw))
            })?),
        };

        let min_seats = match request.min_seats {
            None | Some(0) => None,
            Some(n) if n < 0 => return Err(RideError::Validation("Minimum seats cannot be negative".into())),
            Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
        };

        Ok(SearchQuery {
            origin: clean(request.origin),
            destination: clean(request.destination),
            date,
            min_seats,
        })
    }
}

/// Reads a calendar day from either `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderContact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub ride: Ride,
    pub user_has_booked: bool,
    pub seats_booked_by_user: u32,
    pub is_rider: bool,
    pub rider_details: Option<RiderContact>,
    pub rider_rating: RiderReputation,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether a ride is bookable and matches every given criterion
pub fn matches(ride: &Ride, query: &SearchQuery) -> bool {
    if !matches!(ride.status, RideStatus::Available | RideStatus::Started) {
        return false;
    }
    if ride.available_seats == 0 || ride.available_seats < query.min_seats.unwrap_or(0) {
        return false;
    }
    if let Some(origin) = &query.origin {
        if !contains_ignore_case(&ride.origin, origin) {
            return false;
        }
    }
    if let Some(destination) = &query.destination {
        if !contains_ignore_case(&ride.destination, destination) {
            return false;
        }
    }
    if let Some(day) = query.date {
        if ride.date.date_naive() != day {
            return false;
        }
    }
    true
}

/// Filters `rides`, attaches the viewer's booking state and rider
/// reputation, and orders by descending rider rating.
///
/// The sort is stable, so equally rated riders keep the store's order.
pub fn rank(
    rides: Vec<Ride>,
    query: &SearchQuery,
    viewer_id: &str,
    reputations: &HashMap<String, RiderReputation>,
    riders: &HashMap<String, User>,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = rides.into_iter()
        .filter(|ride| matches(ride, query))
        .map(|ride| {
            let seats_booked_by_user = ride.seats_booked_by(viewer_id);
            let rider_details = riders.get(&ride.rider).map(|user| RiderContact {
                id: user.id.clone(),
                name: user.username.clone(),
                email: user.email.clone(),
                phone_number: user.phone_number.clone(),
            });
            SearchResult {
                user_has_booked: ride.is_passenger(viewer_id),
                seats_booked_by_user,
                is_rider: ride.is_rider(viewer_id),
                rider_details,
                rider_rating: reputations.get(&ride.rider).cloned().unwrap_or_default(),
                ride,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.rider_rating.average_rating
            .partial_cmp(&a.rider_rating.average_rating)
            .unwrap_or(Ordering::Equal)
    });
    results
}
