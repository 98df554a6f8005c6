//!
//! Documentation of the odm module.
//! Used to connect to the carpool database.
//!




use super::*;
use models::*;
use odm_utils::*;
use config::config::ConfyConfig;
use rides::error::RideError;
use std::time::Duration;

use mongodb::bson::{doc, Document};
use mongodb::Database;

// The async ODM for the MongoDB database connection and queries

use bson::oid::ObjectId;
use futures::stream::TryStreamExt;
use mongodb::options::FindOptions;

use mongodb::options::ClientOptions;
use mongodb::Client;
use mongodb::options::ListDatabasesOptions;
use log::{error, info, warn};

const USERS: &str = "users";
const RIDES: &str = "rides";

///
/// Initiate DB connection
///
///
/// # Arguments
///
/// * `config` - A config object containing 'database' and 'database_ip'
///
///
/// # Log
///
/// * `info` - "Database Connected!", indicating success
/// * `error` - "Could not connect to MongoDB {error}", indicating error
///
pub async fn init(config: &ConfyConfig) -> mongodb::error::Result<Database> {
    connect(&config).await
}

/// basic connection, isn't available out of the "odm.rs" module
async fn connect(config: &ConfyConfig) -> mongodb::error::Result<Database> {

    let client = build_client(config).await?;

    match client.list_database_names(Document::new(), ListDatabasesOptions::builder().build()).await {
        Ok(_) => {
            info!("Database Connected!");
        },
        Err(value) => {
            error!("{}", format!("Could not connect to MongoDB {}", value));
            return Err(value);
        },
    }

    let database = client.database(&config.database[..]);

    Ok(database)
}

/// Builds the database handle without touching the server.
/// The driver only connects on the first operation.
pub async fn lazy_database(config: &ConfyConfig) -> mongodb::error::Result<Database> {
    let client = build_client(config).await?;
    Ok(client.database(&config.database[..]))
}

async fn build_client(config: &ConfyConfig) -> mongodb::error::Result<Client> {
    let mut client_options = ClientOptions::parse(&config.database_ip).await?;
    client_options.connect_timeout = Some(Duration::from_secs(config.timeout));
    client_options.heartbeat_freq = Some(Duration::from_secs(config.timeout));
    client_options.server_selection_timeout = Some(Duration::from_secs(config.timeout));
    Client::with_options(client_options)
}

//
// USER ACTIONS
//


///
/// Get user by id
///
/// # Arguments
///
/// * `database` - Refrence to a database object
/// * `id` - hex user ID
///
/// # Output
///
/// * Err(_) - indicates DB error
/// * Ok(None) - user has not been found (or the id is malformed)
/// * Ok(Some(value)) - user has been found
///
pub async fn get_user_by_id(db: &Database, id: &str) -> mongodb::error::Result<Option<User>> {
    let oid = match ObjectId::parse_str(id) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };

    let collection = db.collection::<UserDocument>(USERS);
    let user_doc = collection.find_one(doc! { "_id": oid }, None).await?;

    Ok(user_doc.as_ref().map(doc_to_user))
}

/// Get user by email
pub async fn get_user_by_email(db: &Database, email: &str) -> mongodb::error::Result<Option<User>> {
    let collection = db.collection::<UserDocument>(USERS);
    let user_doc = collection.find_one(doc! { "email": email }, None).await?;

    Ok(user_doc.as_ref().map(doc_to_user))
}

/// Get every user whose id is in `ids`; unknown ids are skipped
pub async fn get_users_by_ids(db: &Database, ids: &[String]) -> mongodb::error::Result<Vec<User>> {
    let oids: Vec<ObjectId> = ids.iter().filter_map(|id| ObjectId::parse_str(id).ok()).collect();
    if oids.is_empty() {
        return Ok(vec![]);
    }

    let collection = db.collection::<UserDocument>(USERS);
    let mut cursor = collection.find(doc! { "_id": { "$in": oids } }, None).await?;

    let mut users: Vec<User> = vec![];
    while let Some(result) = cursor.try_next().await? {
        users.push(doc_to_user(&result));
    }

    Ok(users)
}

/// Emails of the given users, in no particular order
pub async fn get_emails_by_ids(db: &Database, ids: &[String]) -> mongodb::error::Result<Vec<String>> {
    let users = get_users_by_ids(db, ids).await?;
    Ok(users.into_iter().map(|u| u.email).filter(|e| !e.is_empty()).collect())
}

/// Creates and inserts a new user
pub async fn insert_user(
    db: &Database,
    email: &str,
    name: &str,
    role: Role,
) -> mongodb::error::Result<User> {
    let collection = db.collection::<UserDocument>(USERS);

    let mut user_doc = UserDocument {
        _id:          None,
        email:        email.to_string(),
        username:     name.to_string(),
        role,
        phone_number: None,
        created_at:   bson::DateTime::now(),
    };

    let insert_one_result = collection.insert_one(&user_doc, None).await?;
    user_doc._id = insert_one_result.inserted_id.as_object_id();

    Ok(doc_to_user(&user_doc))
}

//
// RIDE actions
//

/// Inserts a freshly created ride and returns it with its assigned id
pub async fn insert_ride(db: &Database, ride: &Ride) -> mongodb::error::Result<Ride> {
    let collection = db.collection::<RideDocument>(RIDES);

    let mut ride_doc = ride_to_doc(ride);
    ride_doc._id = None;

    let insert_one_result = collection.insert_one(&ride_doc, None).await?;
    ride_doc._id = insert_one_result.inserted_id.as_object_id();

    Ok(doc_to_ride(&ride_doc))
}

/// Get ride by it's ID
pub async fn get_ride(db: &Database, id: &str) -> mongodb::error::Result<Option<Ride>> {
    let oid = match ObjectId::parse_str(id) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };

    let collection = db.collection::<RideDocument>(RIDES);
    let ride_doc = collection.find_one(doc! { "_id": oid }, None).await?;

    Ok(ride_doc.as_ref().map(doc_to_ride))
}

/// Runs a ride query and converts every document
async fn collect_rides(db: &Database, filter: Document, sort: Document) -> mongodb::error::Result<Vec<Ride>> {
    let collection = db.collection::<RideDocument>(RIDES);
    let find_options = FindOptions::builder().sort(sort).build();

    let mut cursor = collection.find(filter, find_options).await?;

    let mut rides: Vec<Ride> = vec![];
    while let Some(result) = cursor.try_next().await? {
        rides.push(doc_to_ride(&result));
    }
    Ok(rides)
}

/// Rides matching a search filter (see `odm_utils::search_filter`), soonest first
pub async fn find_rides(db: &Database, filter: Document) -> mongodb::error::Result<Vec<Ride>> {
    collect_rides(db, filter, doc! { "date": 1, "startingTime": 1 }).await
}

/// Every ride published by a rider, most recent first
pub async fn get_rides_for_rider(db: &Database, rider: &str) -> mongodb::error::Result<Vec<Ride>> {
    collect_rides(db, doc! { "rider": rider }, doc! { "date": -1 }).await
}

/// Every ride a user currently holds seats on, most recent first
pub async fn get_rides_for_passenger(db: &Database, user: &str) -> mongodb::error::Result<Vec<Ride>> {
    collect_rides(db, doc! { "passengers": user }, doc! { "date": -1 }).await
}

/// Completed rides of the given riders, the input for reputation pooling
pub async fn get_completed_rides_for_riders(db: &Database, riders: &[String]) -> mongodb::error::Result<Vec<Ride>> {
    if riders.is_empty() {
        return Ok(vec![]);
    }
    collect_rides(
        db,
        doc! { "rider": { "$in": riders }, "status": RideStatus::Completed.as_str() },
        doc! { "_id": 1 },
    ).await
}

///
/// Replaces a ride only if nobody wrote it since it was read
///
/// # Output
///
/// * Ok(true) - the stored version matched `expected_version` and the ride was written
/// * Ok(false) - the ride moved on (or vanished), nothing was written
///
pub async fn replace_ride(db: &Database, ride: &Ride, expected_version: i64) -> mongodb::error::Result<bool> {
    let oid = match ObjectId::parse_str(&ride.id) {
        Ok(value) => value,
        Err(_) => return Ok(false),
    };

    let collection = db.collection::<RideDocument>(RIDES);
    let result = collection
        .replace_one(
            doc! { "_id": oid, "version": expected_version },
            ride_to_doc(ride),
            None,
        )
        .await?;

    Ok(result.matched_count == 1)
}

///
/// Read-modify-write a ride under optimistic concurrency
///
/// `apply` runs the engine guards and mutation on a fresh copy each attempt.
/// A guard failure is returned as is and nothing is written.
///
/// # Example
/// ```ignore
/// let (ride, _) = update_ride(&db, &id, 3, |ride| booking::book(ride, &user, 2, now)).await?;
/// ```
///
pub async fn update_ride<T, F>(
    db: &Database,
    ride_id: &str,
    max_retries: u32,
    mut apply: F,
) -> Result<(Ride, T), RideError>
where
    F: FnMut(&mut Ride) -> Result<T, RideError>,
{
    for attempt in 0..=max_retries {
        let mut ride = get_ride(db, ride_id)
            .await?
            .ok_or_else(|| RideError::NotFound("Ride not found".into()))?;

        let expected_version = ride.version;
        let output = apply(&mut ride)?;
        ride.version = expected_version + 1;

        if replace_ride(db, &ride, expected_version).await? {
            return Ok((ride, output));
        }

        warn!("{}", format!("Write conflict on ride {} (attempt {}), retrying", ride_id, attempt + 1));
    }

    Err(RideError::Conflict("The ride was modified by another request, please retry".into()))
}
