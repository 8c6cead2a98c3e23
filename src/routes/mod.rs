mod auth;
mod health_check;
mod profile;

pub use auth::{change_password, login, logout, refresh, register, REFRESH_TOKEN_COOKIE};
pub use health_check::health_check;
pub use profile::{get_current_user, update_current_user};
