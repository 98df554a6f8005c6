use super::{*};
use routes_utils::*;

use chrono::Utc;
use serde_json::{json, Value};

use notify::{dispatch, messages};
use rides::error::{RideError, RideResult};
use rides::payments;

use log::{info, warn};

///
/// Open a gateway order for the caller's seats
///
/// The amount is always computed from the ride, never taken from the client.
///
#[post("/payments/create-order", format = "json", data = "<body>")]
async fn create_order(
    user: AuthUser,
    body: Json<CreateOrderRequest>,
    db: &State<MongoState>,
    pay: &State<GatewayState>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let ride = load_ride(&db.db, &body.ride_id).await?;
    let amount = payments::prepare_order(&ride, &user.caller())?;

    let order = pay.gateway.create_order(amount, &ride.id, &user.user_id).await?;
    info!("{}", format!("Server>>Client:\tApproving action {} for {}, order {} of {:.2}", route, &user.user_id, &order.order_id, amount));

    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}

///
/// Check the gateway signature, then record the payment
///
/// A bad signature leaves the ride untouched.
///
#[post("/payments/verify-payment", format = "json", data = "<body>")]
async fn verify_payment(
    user: AuthUser,
    body: Json<VerifyPaymentRequest>,
    db: &State<MongoState>,
    file: &State<Config>,
    pay: &State<GatewayState>,
    mail: &State<NotifierState>,
    route: &Route,
) -> RideResult<Json<Value>> {
    let now = Utc::now();
    let caller = user.caller();

    if !pay.gateway.verify(&body.razorpay_order_id, &body.razorpay_payment_id, &body.razorpay_signature) {
        warn!("{}", format!("Client>>Server:\tRejected payment signature on {} for {}", route, &user.user_id));
        return Err(RideError::Gateway("Payment verification failed".into()));
    }

    let (ride, receipt) = ODM::odm::update_ride(&db.db, &body.ride_id, file.config.max_write_retries, |ride| {
        payments::record_payment(ride, &caller, &body.razorpay_payment_id, now)
    }).await?;

    info!("{}", format!("Server>>Client:\tApproving action {} for {}, {} of {} passenger(s) paid on {}", route, &user.user_id, receipt.paid_passengers, receipt.total_passengers, &ride.id));

    if let Some(rider_email) = email_of(&db.db, &ride.rider).await {
        dispatch(mail.notifier.clone(), messages::payment_received(
            &rider_email,
            &ride,
            &user.username,
            receipt.paid_amount,
            receipt.paid_passengers,
            receipt.total_passengers,
        ));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Payment verified successfully",
        "payment": receipt,
    })))
}

pub fn payment_routes() -> Vec<Route> {
    routes![create_order, verify_payment]
}
