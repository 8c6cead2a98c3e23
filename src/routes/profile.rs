/// Profile Routes
///
/// Read and edit the authenticated account's public profile.

use actix_web::{web, HttpResponse};

use crate::accounts::{AccountService, ProfileChanges};
use crate::error::AppError;
use crate::middleware::AuthenticatedAccount;

/// GET /api/v1/users/me (protected)
pub async fn get_current_user(
    account: web::ReqData<AuthenticatedAccount>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let profile = accounts.current_account(account.0).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /api/v1/users/me (protected)
///
/// Any of `full_name`, `email`, `avatar`, `cover_image`; media fields take URLs.
pub async fn update_current_user(
    account: web::ReqData<AuthenticatedAccount>,
    form: web::Json<ProfileChanges>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let profile = accounts
        .update_profile(account.0, form.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}
