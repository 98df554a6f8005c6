use super::{*};
use routes_utils::*;
use anyhow::{Context, Error};
use hyper_sync_rustls;
use rocket::response::{Debug, Redirect};
use ODM::models::Role;

use hyper::{
    header::{Authorization, UserAgent},
    net::HttpsConnector,
    Client,
};
use log::{error, info};

/// Role requested on the sign-in page, only used when the account is new
const SIGNUP_ROLE: &str = "signup_role";

// This route calls `get_redirect`, which sets up a token request and
// returns a `Redirect` to the authorization endpoint.
#[get("/login/google?<role>")]
async fn google_login(role: Option<&str>, oauth2: OAuth2<Google>, cookies: &CookieJar<'_>) -> Result<Redirect, Debug<Error>> {
    let role = Role::from_signup(role.unwrap_or("user"));
    cookies.add_private(
        Cookie::build((SIGNUP_ROLE, role.as_str()))
            .same_site(SameSite::Lax)
    );

    let redirect = oauth2
        .get_redirect(cookies, &["https://www.googleapis.com/auth/userinfo.profile", "https://www.googleapis.com/auth/userinfo.email"])
        .context("failed to build the Google redirect")?;
    Ok(redirect)
}

/// Blocking userinfo call, run it off the async runtime
fn fetch_user_info(access_token: String) -> Result<GoogleUserInfo, Error> {
    let https = HttpsConnector::new(hyper_sync_rustls::TlsClient::new());
    let client = Client::with_connector(https);

    let response = client
        .get("https://www.googleapis.com/oauth2/v1/userinfo")
        .header(Authorization(format!("Bearer {}", access_token)))
        .header(UserAgent("Carpool".into()))
        .send()
        .context("failed to send request to API")?;

    if !response.status.is_success() {
        return Err(anyhow::anyhow!(
            "got non-success status {}",
            response.status
        ));
    }

    let user_info: GoogleUserInfo = serde_json::from_reader(response)
        .context("failed to deserialize response")?;
    Ok(user_info)
}

// This route, mounted at the application's Redirect URI, uses the
// `TokenResponse` request guard to complete the token exchange and obtain
// the token. First sign-in creates the account.
#[get("/auth/google")]
async fn google_callback(token: TokenResponse<Google>, cookies: &CookieJar<'_>, db: &State<MongoState>) -> Result<Redirect, Debug<Error>> {
    let access_token = token.access_token().to_string();
    let user_info = rocket::tokio::task::spawn_blocking(move || fetch_user_info(access_token))
        .await
        .context("userinfo task failed")??;

    let existing = ODM::odm::get_user_by_email(&db.db, &user_info.email)
        .await
        .context("failed to look up the user")?;

    if existing.is_none() {
        let role = cookies.get_private(SIGNUP_ROLE)
            .map(|c| Role::from_signup(c.value()))
            .unwrap_or(Role::User);

        let name = if user_info.name.is_empty() { user_info.email.clone() } else { user_info.name.clone() };
        match ODM::odm::insert_user(&db.db, &user_info.email, &name, role).await {
            Ok(user) => info!("{}", format!("Server>>Client:\tRegistered {} as {}", &user.email, role.as_str())),
            Err(value) => {
                error!("{}", format!("Database failed while registering {}", &user_info.email));
                return Err(Debug(Error::new(value).context("failed to register the user")));
            },
        }
    }
    cookies.remove_private(SIGNUP_ROLE);

    // Set a private cookie with the access token
    cookies.add_private(
        Cookie::build(("token", token.access_token().to_string()))
            .same_site(SameSite::Lax)
    );

    cookies.add_private(
        Cookie::build(("email", user_info.email))
            .same_site(SameSite::Lax)
    );

    cookies.add_private(
        Cookie::build(("username", user_info.name))
            .same_site(SameSite::Lax)
    );

    Ok(Redirect::to("/"))
}

///
/// Logout
///
/// Drops every session cookie
///
#[get("/logout")]
async fn logout(cookies: &CookieJar<'_>) -> Redirect {
    for name in ["token", "email", "username", SIGNUP_ROLE] {
        if cookies.get_private(name).is_some() {
            cookies.remove_private(name);
        }
    }

    Redirect::to("/")
}

pub fn auth_routes() -> Vec<Route> {
    routes![google_login, google_callback, logout]
}
