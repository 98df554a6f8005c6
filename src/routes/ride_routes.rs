use super::{*};
use routes_utils::*;

use chrono::Utc;
use rocket::response::status;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

use notify::{dispatch, messages};
use rides::error::{RideError, RideResult};
use rides::lifecycle::{self, CancelOutcome, RideDraft};
use rides::search::{self, SearchQuery, SearchRequest};
use rides::{booking, payments, rating, Rules};
use ODM::models::*;
use ODM::odm_utils::search_filter;

use log::info;

///
/// Publish a ride
///
/// # Arguments
///
/// * `user` - must be a rider
/// * `body` - origin, destination, date, starting / expected time, seats and price
///
#[post("/rides/ride", format = "json", data = "<body>")]
async fn create_ride(user: AuthUser, body: Json<CreateRideRequest>, db: &State<MongoState>, route: &Route) -> RideResult<status::Custom<Json<Value>>> {
    let now = Utc::now();
    let body = body.into_inner();

    let draft = RideDraft {
        date: parse_instant(body.date.as_deref(), "date")?,
        starting_time: parse_instant(body.starting_time.as_deref(), "startingTime")?,
        expected_time: parse_instant(body.expected_time.as_deref(), "expectedTime")?,
        origin: body.origin,
        destination: body.destination,
        available_seats: body.available_seats,
        price_per_seat: body.price_per_seat,
    };

    let ride = lifecycle::create(&user.caller(), draft, now)?;
    let ride = ODM::odm::insert_ride(&db.db, &ride).await?;

    let minutes = (ride.expected_time - ride.starting_time).num_minutes();
    info!("{}", format!("Server>>Client:\tApproving action {} for {}, ride {}", route, &user.user_id, &ride.id));

    Ok(status::Custom(Status::Created, Json(json!({
        "success": true,
        "message": "Ride created successfully",
        "ride": ride,
        "duration": format!("{} minutes", minutes),
    }))))
}

///
/// Search bookable rides, best rated riders first
///
#[post("/rides/fetch-rides", format = "json", data = "<body>")]
async fn fetch_rides(user: AuthUser, body: Json<SearchRequest>, db: &State<MongoState>, route: &Route) -> RideResult<Json<Value>> {
    let query = SearchQuery::parse(body.into_inner())?;

    let rides = ODM::odm::find_rides(&db.db, search_filter(&query)).await?;

    let rider_ids: Vec<String> = rides.iter()
        .map(|r| r.rider.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let history = ODM::odm::get_completed_rides_for_riders(&db.db, &rider_ids).await?;
    let reputations = rating::rider_reputation(&rider_ids, &history);

    let riders: HashMap<String, User> = ODM::odm::get_users_by_ids(&db.db, &rider_ids).await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let results = search::rank(rides, &query, &user.user_id, &reputations, &riders);
    info!("{}", format!("Server>>Client:\tSending {} ride(s) on {} for {}", results.len(), route, &user.user_id));

    Ok(Json(json!({
        "success": true,
        "message": "Available rides fetched successfully.",
        "rides": results,
    })))
}

///
/// Book seats on a ride
///
/// # Arguments
///
/// * `body` - `rideId` and `seatsToBook` (defaults to one)
///
#[post("/rides/book-rides", format = "json", data = "<body>")]
async fn book_ride(
    user: AuthUser,
    body: Json<BookRideRequest>,
    db: &State<MongoState>,
    file: &State<Config>,
    mail: &State<NotifierState>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let caller = user.caller();
    let rules = Rules::from(&file.config);
    booking::requested_seats(body.seats_to_book)?;

    let (ride, receipt) = ODM::odm::update_ride(&db.db, &body.ride_id, file.config.max_write_retries, |ride| {
        booking::book(ride, &caller, body.seats_to_book, now)
    }).await?;

    info!("{}", format!("Server>>Client:\tApproving action {} for {}, {} seat(s) held on {}", route, &user.user_id, receipt.seats_booked, &ride.id));
    dispatch(
        mail.notifier.clone(),
        messages::booking_confirmation(&user.email, &ride, receipt.seats_booked, rules.cancellation_window.num_minutes()),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Ride booked successfully",
        "ride": ride,
        "seatsBooked": receipt.seats_booked,
        "availableSeats": receipt.available_seats,
        "firstBooking": receipt.first_booking,
    })))
}

#[post("/rides/<id>/start")]
async fn start_ride(
    id: &str,
    user: AuthUser,
    db: &State<MongoState>,
    file: &State<Config>,
    mail: &State<NotifierState>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let caller = user.caller();

    let (ride, report) = ODM::odm::update_ride(&db.db, id, file.config.max_write_retries, |ride| {
        lifecycle::start(ride, &caller, now)
    }).await?;

    info!("{}", format!("Server>>Client:\tApproving action {} for {}, ride {} started {} minute(s) late", route, &user.user_id, &ride.id, report.delay_in_minutes));

    let driver = ODM::odm::get_user_by_id(&db.db, &user.user_id).await.ok().flatten();
    let emails = emails_of(&db.db, &ride.passengers).await;
    dispatch(mail.notifier.clone(), messages::ride_started(emails, &ride, driver.as_ref()));

    Ok(Json(json!({
        "success": true,
        "message": "Ride started successfully",
        "ride": ride,
        "newStartTime": report.new_start_time,
        "newExpectedEndTime": report.new_expected_end_time,
        "delayInMinutes": report.delay_in_minutes,
    })))
}

#[post("/rides/<id>/complete")]
async fn complete_ride(
    id: &str,
    user: AuthUser,
    db: &State<MongoState>,
    file: &State<Config>,
    mail: &State<NotifierState>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let caller = user.caller();
    let rules = Rules::from(&file.config);

    let (ride, report) = ODM::odm::update_ride(&db.db, id, file.config.max_write_retries, |ride| {
        lifecycle::complete(ride, &caller, now, &rules)
    }).await?;

    info!("{}", format!("Server>>Client:\tApproving action {} for {}, ride {} completed", route, &user.user_id, &ride.id));

    let emails = emails_of(&db.db, &ride.passengers).await;
    dispatch(mail.notifier.clone(), messages::rating_request(emails, &ride));

    Ok(Json(json!({
        "success": true,
        "message": "Ride completed successfully",
        "ride": ride,
        "plannedMinutes": report.planned_minutes,
        "elapsedMinutes": report.elapsed_minutes,
        "progressPercent": report.progress_percent,
    })))
}

///
/// Cancel a ride
///
/// The rider cancels the whole ride; a passenger only their own booking,
/// and only inside the cancellation window.
///
#[post("/rides/<id>/cancel")]
async fn cancel_ride(
    id: &str,
    user: AuthUser,
    db: &State<MongoState>,
    file: &State<Config>,
    mail: &State<NotifierState>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let caller = user.caller();
    let rules = Rules::from(&file.config);

    let (ride, outcome) = ODM::odm::update_ride(&db.db, id, file.config.max_write_retries, |ride| {
        lifecycle::cancel(ride, &caller, now, &rules)
    }).await?;

    let message = match &outcome {
        CancelOutcome::RideCancelled { passengers } => {
            info!("{}", format!("Server>>Client:\tApproving action {} for {}, ride {} cancelled", route, &user.user_id, &ride.id));
            let emails = emails_of(&db.db, passengers).await;
            dispatch(mail.notifier.clone(), messages::ride_cancelled(emails, &ride));
            "Ride cancelled successfully"
        },
        CancelOutcome::PassengerLeft { seats_released, .. } => {
            info!("{}", format!("Server>>Client:\tApproving action {} for {}, {} seat(s) released on {}", route, &user.user_id, seats_released, &ride.id));
            if let Some(rider_email) = email_of(&db.db, &ride.rider).await {
                dispatch(mail.notifier.clone(), messages::passenger_cancelled(&rider_email, &ride, &user.username, *seats_released));
            }
            "Booking cancelled successfully"
        },
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "ride": ride,
    })))
}

#[post("/rides/<id>/rate", format = "json", data = "<body>")]
async fn rate_ride(
    id: &str,
    user: AuthUser,
    body: Json<RateRideRequest>,
    db: &State<MongoState>,
    file: &State<Config>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let caller = user.caller();
    let body = body.into_inner();

    let (_, summary) = ODM::odm::update_ride(&db.db, id, file.config.max_write_retries, |ride| {
        rating::submit(ride, &caller, body.rating, body.feedback.clone(), now)
    }).await?;

    info!("{}", format!("Server>>Client:\tApproving action {} for {}, rated {}", route, &user.user_id, body.rating));

    Ok(Json(json!({
        "success": true,
        "message": "Rating submitted successfully",
        "averageRating": summary.average_rating,
        "totalRatings": summary.total_ratings,
    })))
}

#[get("/rides/my-rides")]
async fn my_rides(user: AuthUser, db: &State<MongoState>, route: &Route) -> RideResult<Json<Value>> {
    if user.role != Role::Rider {
        return Err(RideError::Forbidden("Only riders have published rides".into()));
    }

    let rides = ODM::odm::get_rides_for_rider(&db.db, &user.user_id).await?;
    let rides: Vec<Value> = rides.iter()
        .map(|ride| json!({ "ride": ride, "earnings": payments::earnings(ride) }))
        .collect();

    info!("{}", format!("Server>>Client:\tSending {} ride(s) on {} for {}", rides.len(), route, &user.user_id));
    Ok(Json(json!({ "success": true, "rides": rides })))
}

#[get("/rides/my-bookings")]
async fn my_bookings(user: AuthUser, db: &State<MongoState>, file: &State<Config>, route: &Route) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let rules = Rules::from(&file.config);

    let rides = ODM::odm::get_rides_for_passenger(&db.db, &user.user_id).await?;
    let bookings: Vec<booking::BookingView> = rides.iter()
        .filter_map(|ride| booking::booking_view(ride, &user.user_id, now, &rules))
        .collect();

    info!("{}", format!("Server>>Client:\tSending {} booking(s) on {} for {}", bookings.len(), route, &user.user_id));
    Ok(Json(json!({ "success": true, "bookings": bookings })))
}

#[get("/rides/<id>/cancellation-window")]
async fn cancellation_window(id: &str, user: AuthUser, db: &State<MongoState>, file: &State<Config>) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let rules = Rules::from(&file.config);

    let ride = load_ride(&db.db, id).await?;
    let window = booking::cancellation_window(&ride, &user.user_id, now, &rules)
        .ok_or_else(|| RideError::NotFound("You have no booking on this ride".into()))?;

    Ok(Json(json!({
        "success": true,
        "canCancel": window.can_cancel,
        "secondsRemaining": window.seconds_remaining,
        "expiresAt": window.expires_at,
    })))
}

#[get("/rides/<id>/payments")]
async fn ride_payments(id: &str, user: AuthUser, db: &State<MongoState>) -> RideResult<Json<Value>> {
    let ride = load_ride(&db.db, id).await?;
    let summary = payments::earnings_for(&ride, &user.caller())?;
    Ok(Json(json!({ "success": true, "payments": summary })))
}

#[get("/rides/<id>", rank = 2)]
async fn ride_detail(id: &str, user: AuthUser, db: &State<MongoState>) -> RideResult<Json<Value>> {
    let ride = load_ride(&db.db, id).await?;
    Ok(Json(json!({
        "success": true,
        "ride": ride,
        "isRider": ride.is_rider(&user.user_id),
        "userHasBooked": ride.is_passenger(&user.user_id),
        "seatsBookedByUser": ride.seats_booked_by(&user.user_id),
    })))
}

pub fn ride_routes() -> Vec<Route> {
    routes![
        create_ride,
        fetch_rides,
        book_ride,
        start_ride,
        complete_ride,
        cancel_ride,
        rate_ride,
        my_rides,
        my_bookings,
        cancellation_window,
        ride_payments,
        ride_detail,
    ]
}
