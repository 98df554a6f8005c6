//!
//! One-shot post-ride ratings and pooled rider reputation.
//!

use super::*;
use super::error::{RideError, RideResult};
use ODM::models::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: usize,
}

/// A rider's standing across all of their completed rides
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderReputation {
    pub average_rating: f64,
    pub total_ratings: usize,
    /// No rated completed ride yet
    pub is_new: bool,
}

impl Default for RiderReputation {
    fn default() -> Self {
        RiderReputation { average_rating: 0.0, total_ratings: 0, is_new: true }
    }
}

fn mean(values: impl Iterator<Item = u8>) -> (f64, usize) {
    let (sum, count) = values.fold((0u64, 0usize), |(sum, count), v| (sum + v as u64, count + 1));
    if count == 0 {
        return (0.0, 0);
    }
    (sum as f64 / count as f64, count)
}

/// Adds the caller's rating to a completed ride and refreshes its average.
pub fn submit(
    ride: &mut Ride,
    caller: &Caller,
    rating: i64,
    feedback: Option<String>,
    now: DateTime<Utc>,
) -> RideResult<RatingSummary> {
    if caller.role != Role::User {
        return Err(RideError::Forbidden("Only passengers can rate rides".into()));
    }

    if !(1..=5).contains(&rating) {
        return Err(RideError::Validation("Rating must be a whole number between 1 and 5".into()));
    }

    if ride.status != RideStatus::Completed {
        return Err(RideError::InvalidState("Only completed rides can be rated".into()));
    }

    if !ride.is_passenger(&caller.id) {
        return Err(RideError::Forbidden("Only passengers of this ride can rate it".into()));
    }

    if ride.ratings.iter().any(|r| r.passenger == caller.id) {
        return Err(RideError::Conflict("You have already rated this ride".into()));
    }

    let feedback = feedback
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    ride.ratings.push(Rating {
        passenger: caller.id.clone(),
        rating: rating as u8,
        feedback,
        created_at: now,
    });

    let (average_rating, total_ratings) = mean(ride.ratings.iter().map(|r| r.rating));
    ride.average_rating = average_rating;
    ride.updated_at = now;

    Ok(RatingSummary { average_rating, total_ratings })
}

/// Pools every individual rating across each rider's completed rides.
///
/// This is a flat mean over all rating values, not a mean of per-ride
/// averages. Riders in `rider_ids` with nothing to pool come back as new.
pub fn rider_reputation(rider_ids: &[String], rides: &[Ride]) -> HashMap<String, RiderReputation> {
    let mut pooled: HashMap<&str, Vec<u8>> = HashMap::new();
    for ride in rides.iter().filter(|r| r.status == RideStatus::Completed) {
        pooled.entry(ride.rider.as_str())
            .or_default()
            .extend(ride.ratings.iter().map(|r| r.rating));
    }

    rider_ids.iter().map(|id| {
        let reputation = match pooled.get(id.as_str()) {
            Some(values) if !values.is_empty() => {
                let (average_rating, total_ratings) = mean(values.iter().copied());
                RiderReputation { average_rating, total_ratings, is_new: false }
            },
            _ => RiderReputation::default(),
        };
        (id.clone(), reputation)
    }).collect()
}
