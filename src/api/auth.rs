use crate::{
    api::AppState,
    middleware::auth::Claims,
    services::auth_service::{self, AuthResponse, LoginRequest, RegisterRequest},
    utils::AppError,
};
use actix_web::{web, HttpResponse};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /auth/register - email: {}, role: {}", request.email, request.role);

    match auth_service::register(&*state.market, &state.config, &request).await {
        Ok(response) => {
            log::info!("✅ Registration successful: {}", response.user.email);
            Ok(HttpResponse::Created().json(response))
        }
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", request.email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(&*state.market, &state.config, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let info = auth_service::get_current_user(&*state.market, &user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": info
    })))
}
