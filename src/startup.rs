use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::accounts::AccountService;
use crate::auth::{SessionManager, TokenKeys};
use crate::configuration::AuthSettings;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    change_password, get_current_user, health_check, login, logout, refresh, register,
    update_current_user,
};
use crate::store::{AccountRepository, SessionStore};

/// Wire both services to one store
pub fn build_services<S>(store: Arc<S>, auth: &AuthSettings) -> (SessionManager, AccountService)
where
    S: AccountRepository + SessionStore + 'static,
{
    let sessions = SessionManager::new(
        store.clone(),
        store.clone(),
        TokenKeys::from_settings(auth),
        auth.password_cost,
    );
    let accounts = AccountService::new(store, auth.password_cost);
    (sessions, accounts)
}

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    accounts: AccountService,
) -> Result<Server, std::io::Error> {
    let keys = sessions.keys().clone();
    let sessions = web::Data::new(sessions);
    let accounts = web::Data::new(accounts);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(sessions.clone())
            .app_data(accounts.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    // Public routes
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh))
                    // Protected routes
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(keys.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(JwtMiddleware::new(keys.clone()))
                            .route(web::post().to(change_password)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(keys.clone()))
                            .route(web::get().to(get_current_user))
                            .route(web::patch().to(update_current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
