//!
//! Documentation of the config module.
//! Sets up the 'config' and 'logger'.
//!



extern crate confy;

use serde::{Serialize, Deserialize};
use std::default::Default;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfyConfig {
    pub print_log: bool,
    pub log_file: String,
    pub database: String,
    pub database_ip: String,
    pub timeout: u64,
    /// How many times a versioned ride write is retried after losing a race
    pub max_write_retries: u32,
    /// Minutes a passenger has to cancel after booking
    pub cancellation_window_minutes: i64,
    /// Share of the planned duration that must elapse before completion
    pub completion_threshold_percent: i64,
    pub smtp_enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub mail_from: String,
    /// "local" or "razorpay"
    pub payment_provider: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
    pub payment_currency: String,
}

///Config check
impl Default for ConfyConfig {
    fn default() -> Self {
        ConfyConfig {
            print_log: false,
            log_file: "output.log".to_string(),
            database: "carpool".to_string(),
            database_ip: "mongodb://localhost:27017/".to_string(),
            timeout: 2,
            max_write_retries: 3,
            cancellation_window_minutes: 3,
            completion_threshold_percent: 70,
            smtp_enabled: false,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            mail_from: "Campus Carpool <no-reply@carpool.local>".to_string(),
            payment_provider: "local".to_string(),
            payment_key_id: String::new(),
            payment_key_secret: "carpool-dev-secret".to_string(),
            payment_currency: "INR".to_string(),
        }
    }
}

/// Initialize config and load
pub async fn init() -> Result<ConfyConfig, confy::ConfyError> {
    let cfg: ConfyConfig = confy::load_path("carpool.toml").unwrap_or_default();
    Ok(cfg)
}

/// Sets up logger
pub async fn setup_logger(file: &ConfyConfig) -> Result<(), fern::InitError> {
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Info)
        .level_for("mongodb", log::LevelFilter::Info)
        .chain(fern::log_file(&file.log_file)?);

    if file.print_log {
        dispatch.chain(std::io::stdout()).apply()?;
    }

    else {
        dispatch.apply()?;
    }

    Ok(())
}
