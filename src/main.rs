//!
//! #  Carpool - campus ride sharing
//!
//! Riders publish trips between campus locations, passengers search and book
//! seats, and the ride is tracked from publication to payment:
//!
//! * Ride lifecycle with schedule-aware start and completion
//! * Seat booking with a short cancellation window
//! * Per-passenger payments through a payment gateway
//! * One-shot ratings and reputation-ranked search
//! * Email notifications for every ride event
//!

#![allow(non_snake_case)]
#[macro_use] extern crate rocket;

mod routes;
mod ODM;
mod config;
mod rides;
mod notify;
mod payment;

use routes::{OAuth2, Google, MongoState, Config, NotifierState, GatewayState};
use rocket::{Rocket, Build};
use log::{error, warn};


/// Assembles the server around an already opened database
pub fn build(base: Rocket<Build>, db: mongodb::Database, config: config::config::ConfyConfig) -> Rocket<Build> {
    let notifier = notify::mailer::from_config(&config);
    let gateway = payment::gateway::from_config(&config);

    base
    .mount("/", routes::routes())
    .mount("/api", routes::api_routes())
    .register("/", routes::catchers())
    .attach(OAuth2::<Google>::fairing("google"))
    .manage(MongoState { db })
    .manage(NotifierState { notifier })
    .manage(GatewayState { gateway })
    .manage(Config { config })
}

/// The main functions, runs w/ cargo run
#[rocket::main]
async fn main() -> Result<(), ()> {
    let config = config::config::init().await;
    let config = match config {
        Err(e) => {
            println!("{}", format!("CONFIG failed to launch {}", e));
            return Ok(());
        },
        Ok(value) => value,
    };
    let _ = config::config::setup_logger(&config).await;
    let db = match ODM::odm::init(&config).await {
        Err(_) => {
            return Ok(());
        },
        Ok(value) => value,
    };
    warn!("CARPOOL IS LAUNCHING");

    let lift = build(rocket::build(), db, config)
    .launch()
    .await;

    warn!("CARPOOL OVER");
    match lift {
        Ok(_) => return Ok(()),
        Err(value) => {
            error!("Rocket could not run, error {}", value);
            return Ok(());
        }
    }
}
