pub mod auth;
pub mod health;
pub mod listings;
pub mod metrics;
pub mod orders;
pub mod schedules;
pub mod swagger;

use crate::{
    config::Config,
    middleware::AuthMiddleware,
    store::{JobStore, MarketStore},
    utils::AppError,
};
use actix_web::{error, web, HttpRequest};
use std::sync::Arc;

/// Estado compartilhado entre os workers do HttpServer
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<dyn MarketStore>,
    pub jobs: Arc<dyn JobStore>,
    pub config: Arc<Config>,
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn json_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("⚠️ Malformed JSON body on {}: {}", req.path(), err);
    AppError::InvalidRequest(format!("Invalid request body: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::InvalidRequest(format!("Invalid query string: {}", err)).into()
}

/// Route table. `main` and the HTTP tests both mount it.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/api/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .service(
                    web::resource("/me")
                        .wrap(AuthMiddleware)
                        .route(web::get().to(auth::get_me)),
                ),
        )
        .service(
            web::scope("/api/listings")
                .wrap(AuthMiddleware)
                .route("", web::post().to(listings::create_listing))
                .route("", web::get().to(listings::browse_listings))
                .route("/mine", web::get().to(listings::my_listings))
                .route("/{id}", web::get().to(listings::get_listing))
                .route("/{id}", web::put().to(listings::update_listing))
                .route("/{id}", web::delete().to(listings::delete_listing)),
        )
        .service(
            web::scope("/api/orders")
                .wrap(AuthMiddleware)
                .route("", web::post().to(orders::place_order))
                .route("/received", web::get().to(orders::received_orders))
                .route("/sent", web::get().to(orders::sent_orders))
                .route("/{order_id}", web::get().to(orders::get_order))
                .route("/{order_id}/status", web::put().to(orders::update_order_status))
                .route("/{order_id}/cancel", web::put().to(orders::cancel_order)),
        )
        .service(
            web::scope("/api/schedules")
                .wrap(AuthMiddleware)
                .route("", web::post().to(schedules::create_schedule))
                .route("", web::get().to(schedules::open_schedules))
                .route("/mine", web::get().to(schedules::my_schedules))
                .route("/{id}", web::get().to(schedules::get_schedule))
                .route("/{id}/status", web::put().to(schedules::set_schedule_status))
                .route("/{id}/applications", web::post().to(schedules::apply))
                .route("/{id}/applications", web::get().to(schedules::schedule_applications)),
        )
        .service(
            web::scope("/api/applications")
                .wrap(AuthMiddleware)
                .route("/mine", web::get().to(schedules::my_applications))
                .route("/{id}/status", web::put().to(schedules::decide_application)),
        )
        .service(
            web::scope("/api/invitations")
                .wrap(AuthMiddleware)
                .route("", web::post().to(schedules::invite))
                .route("/mine", web::get().to(schedules::my_invitations))
                .route("/{id}/respond", web::put().to(schedules::respond_invitation)),
        );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::test_config;
    use crate::models::{Role, User};
    use crate::services::auth_service;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    pub fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            market: store.clone(),
            jobs: store.clone(),
            config: Arc::new(test_config()),
        };
        (state, store)
    }

    /// Inserts a user straight into the store and returns (id, bearer header)
    pub async fn user_with_token(state: &AppState, role: Role) -> (mongodb::bson::oid::ObjectId, String) {
        let user = User {
            id: None,
            name: format!("{} user", role),
            email: format!("{}@example.com", mongodb::bson::oid::ObjectId::new().to_hex()),
            password_hash: String::new(),
            role,
            phone: None,
            location: None,
            attributes: HashMap::new(),
            created_at: 0,
            updated_at: 0,
        };
        let user = state.market.insert_user(user).await.unwrap();
        let token = auth_service::generate_jwt(&user, &state.config.jwt).unwrap();
        (user.id.unwrap(), format!("Bearer {}", token))
    }
}
