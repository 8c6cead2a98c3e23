/// Authentication Routes
///
/// Registration, login, logout, token refresh and password change. Tokens are
/// returned in the body and also set as HttpOnly, Secure cookies.

use actix_web::cookie::{time::Duration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::accounts::{AccountService, Registration};
use crate::auth::{SessionManager, TokenPair};
use crate::error::{AppError, AuthError};
use crate::middleware::{AuthenticatedAccount, ACCESS_TOKEN_COOKIE};

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Login accepts either a username or an email
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

impl LoginRequest {
    fn identifier(&self) -> &str {
        [self.username.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .unwrap_or("")
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

fn token_cookie(name: &'static str, value: String, lifetime_seconds: i64) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(Duration::seconds(lifetime_seconds))
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .secure(true)
        .finish();
    cookie.make_removal();
    cookie
}

fn token_cookies(sessions: &SessionManager, tokens: &TokenPair) -> [Cookie<'static>; 2] {
    [
        token_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            sessions.keys().access_token_lifetime(),
        ),
        token_cookie(
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.clone(),
            sessions.keys().refresh_token_lifetime(),
        ),
    ]
}

/// POST /api/v1/users/register
///
/// # Errors
/// - 400: missing or invalid field
/// - 409: username or email already registered
pub async fn register(
    form: web::Json<Registration>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let profile = accounts.register(form.into_inner()).await?;
    Ok(HttpResponse::Created().json(profile))
}

/// POST /api/v1/users/login
///
/// # Errors
/// - 400: identifier or password missing
/// - 404: no account for the identifier
/// - 401: wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let outcome = sessions.login(form.identifier(), &form.password).await?;

    let [access_cookie, refresh_cookie] = token_cookies(&sessions, &outcome.tokens);
    Ok(HttpResponse::Ok()
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .json(outcome))
}

/// POST /api/v1/users/logout (protected)
pub async fn logout(
    account: web::ReqData<AuthenticatedAccount>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    sessions.logout(account.0).await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE))
        .json(serde_json::json!({ "message": "User logged out successfully" })))
}

/// POST /api/v1/users/refresh-token
///
/// The refresh token comes from the JSON body or, failing that, the
/// `refreshToken` cookie. Every success rotates the refresh token.
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let presented = body
        .and_then(|b| b.into_inner().refresh_token)
        .filter(|token| !token.is_empty())
        .or_else(|| req.cookie(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let tokens = sessions.refresh_access_token(&presented).await?;

    let [access_cookie, refresh_cookie] = token_cookies(&sessions, &tokens);
    Ok(HttpResponse::Ok()
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .json(tokens))
}

/// POST /api/v1/users/change-password (protected)
pub async fn change_password(
    account: web::ReqData<AuthenticatedAccount>,
    form: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    sessions
        .change_password(account.0, &form.old_password, &form.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password changed successfully" })))
}
