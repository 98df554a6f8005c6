//!
//! Documentation of the routes module.
//! Sign-in routes at the root, the JSON API under `/api`.
//!

pub mod auth_routes;
pub mod ride_routes;
pub mod payment_routes;
pub mod routes_utils;

use super::ODM;
use super::config;
use super::notify;
use super::payment;
use super::rides;

use rocket::serde::{Deserialize, json::Json};
use rocket::http::{SameSite, CookieJar, Cookie};

use rocket::{Catcher, Request, Route};
pub use rocket_oauth2::{OAuth2, TokenResponse};
pub use routes_utils::*;
use rocket::http::Status;

use rocket::State;
use serde_json::{json, Value};

use auth_routes::auth_routes;
use payment_routes::payment_routes;
use ride_routes::ride_routes;

/// Mounted at "/"
pub fn routes() -> Vec<Route> {
    auth_routes()
}

/// Mounted at "/api"
pub fn api_routes() -> Vec<Route> {
    let mut routes = ride_routes();
    routes.append(&mut payment_routes());
    routes
}

fn failure(status: Status, message: &str) -> Json<Value> {
    Json(json!({
        "success": false,
        "error": status.reason().unwrap_or("Error"),
        "message": message,
    }))
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    failure(Status::BadRequest, "The request could not be read")
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    failure(Status::Unauthorized, "Please sign in first")
}

#[catch(404)]
fn not_found(request: &Request) -> Json<Value> {
    failure(Status::NotFound, &format!("No route for {}", request.uri()))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    failure(Status::UnprocessableEntity, "The request body is missing fields or has the wrong types")
}

#[catch(500)]
fn internal_error() -> Json<Value> {
    failure(Status::InternalServerError, "Something went wrong, please try again later")
}

pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, unauthorized, not_found, unprocessable, internal_error]
}
