use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cane Market API",
        version = "1.0.0",
        description = "Sugarcane supply-chain marketplace and labour coordination.\n\n**Authentication:** every `/api` endpoint except register/login requires a JWT Bearer token.\n\n**Roles:** Farmer, HHM, Worker, Factory.",
        contact(
            name = "Cane Market Team",
            email = "support@cane-market.local"
        )
    ),
    paths(
        // Auth
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::get_me,

        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Listings
        crate::api::listings::create_listing,
        crate::api::listings::browse_listings,
        crate::api::listings::my_listings,
        crate::api::listings::get_listing,
        crate::api::listings::update_listing,
        crate::api::listings::delete_listing,

        // Orders
        crate::api::orders::place_order,
        crate::api::orders::received_orders,
        crate::api::orders::sent_orders,
        crate::api::orders::get_order,
        crate::api::orders::update_order_status,
        crate::api::orders::cancel_order,

        // Schedules, applications, invitations
        crate::api::schedules::create_schedule,
        crate::api::schedules::open_schedules,
        crate::api::schedules::my_schedules,
        crate::api::schedules::get_schedule,
        crate::api::schedules::set_schedule_status,
        crate::api::schedules::apply,
        crate::api::schedules::schedule_applications,
        crate::api::schedules::my_applications,
        crate::api::schedules::decide_application,
        crate::api::schedules::invite,
        crate::api::schedules::my_invitations,
        crate::api::schedules::respond_invitation,
    ),
    components(
        schemas(
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::AuthResponse,
            crate::models::Role,
            crate::models::UserInfo,

            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,

            crate::models::ListingStatus,
            crate::models::CreateListingRequest,
            crate::models::UpdateListingRequest,
            crate::models::ListingResponse,

            crate::models::OrderStatus,
            crate::models::PlaceOrderRequest,
            crate::models::UpdateOrderStatusRequest,
            crate::models::OrderDetailsResponse,
            crate::models::OrderResponse,
            crate::models::PartialFulfillment,
            crate::models::OrderStatusData,

            crate::models::ScheduleStatus,
            crate::models::CreateScheduleRequest,
            crate::models::UpdateScheduleStatusRequest,
            crate::models::ScheduleResponse,
            crate::models::ApplicationStatus,
            crate::models::ApplyRequest,
            crate::models::DecideApplicationRequest,
            crate::models::ApplicationResponse,
            crate::models::InvitationStatus,
            crate::models::CreateInvitationRequest,
            crate::models::RespondInvitationRequest,
            crate::models::InvitationResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login and current user."),
        (name = "Health", description = "Health check and Prometheus counters."),
        (name = "Listings", description = "Crop listings published by farmers."),
        (name = "Orders", description = "Buyer orders against listings and seller-side acceptance with quantity reconciliation."),
        (name = "Schedules", description = "Job schedules posted by HHMs."),
        (name = "Applications", description = "Worker applications to schedules."),
        (name = "Invitations", description = "Direct invitations from HHMs to workers."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token"))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_order_status_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/orders/{order_id}/status"));
        assert!(doc
            .components
            .as_ref()
            .map_or(false, |c| c.security_schemes.contains_key("bearer_auth")));
    }
}
