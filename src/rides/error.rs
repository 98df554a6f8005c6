//!
//! Error taxonomy for every ride operation, and its HTTP rendering.
//!

use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use serde_json::json;
use std::io::Cursor;
use thiserror::Error;

use log::error;

#[derive(Debug, Error)]
pub enum RideError {
    /// Malformed, missing or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// Role or ownership mismatch
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Operation is not legal from the ride's current status
    #[error("{0}")]
    InvalidState(String),

    /// Too early, not enough progress, or a window has closed
    #[error("{message}")]
    Timing {
        message: String,
        remaining_minutes: Option<i64>,
    },

    #[error("{0}")]
    Conflict(String),

    /// Payment or notification provider failure
    #[error("{0}")]
    Gateway(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type RideResult<T> = Result<T, RideError>;

impl RideError {
    pub fn timing<S: Into<String>>(message: S, remaining_minutes: Option<i64>) -> Self {
        RideError::Timing { message: message.into(), remaining_minutes }
    }

    pub fn status(&self) -> Status {
        match self {
            RideError::Validation(_) | RideError::Timing { .. } => Status::BadRequest,
            RideError::Forbidden(_) => Status::Forbidden,
            RideError::NotFound(_) => Status::NotFound,
            RideError::InvalidState(_) | RideError::Conflict(_) => Status::Conflict,
            RideError::Gateway(_) => Status::BadGateway,
            RideError::Internal(_) => Status::InternalServerError,
        }
    }

    /// Short machine-readable tag, sent next to the message
    pub fn kind(&self) -> &'static str {
        match self {
            RideError::Validation(_) => "ValidationError",
            RideError::Forbidden(_) => "Forbidden",
            RideError::NotFound(_) => "NotFound",
            RideError::InvalidState(_) => "InvalidStateTransition",
            RideError::Timing { .. } => "TimingViolation",
            RideError::Conflict(_) => "Conflict",
            RideError::Gateway(_) => "GatewayError",
            RideError::Internal(_) => "InternalError",
        }
    }
}

impl From<mongodb::error::Error> for RideError {
    fn from(value: mongodb::error::Error) -> Self {
        RideError::Internal(anyhow::Error::new(value).context("database failure"))
    }
}

impl<'r> Responder<'r, 'static> for RideError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let route = match request.route() {
            None => format!("Unknown Route"),
            Some(value) => format!("{}", value),
        };

        let message = match &self {
            RideError::Internal(inner) => {
                error!("{}", format!("Server>>Client:\tInternal failure on {}: {:#}", route, inner));
                "Something went wrong, please try again later".to_string()
            },
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": message,
        });
        if let RideError::Timing { remaining_minutes: Some(minutes), .. } = &self {
            body["remainingMinutes"] = json!(minutes);
        }

        let body = body.to_string();
        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
