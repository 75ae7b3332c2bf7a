use crate::{
    api::{now, AppState},
    middleware::auth::Claims,
    models::{CreateListingRequest, ListingQuery, ListingResponse, Role, UpdateListingRequest},
    services::{listing_service, order_service::parse_object_id},
    utils::AppError,
};
use actix_web::{web, HttpResponse};

fn listing_list(listings: Vec<crate::models::Listing>) -> HttpResponse {
    let data: Vec<ListingResponse> = listings.into_iter().map(ListingResponse::from).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data
    }))
}

#[utoipa::path(
    post,
    path = "/api/listings",
    tag = "Listings",
    request_body = CreateListingRequest,
    responses(
        (status = 201, description = "Listing created", body = ListingResponse),
        (status = 400, description = "Invalid quantity, price or fields"),
        (status = 403, description = "Only farmers can list crops")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_listing(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    request: web::Json<CreateListingRequest>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require_role(&[Role::Farmer])?;
    log::info!("🌾 POST /listings - farmer {}", farmer_id.to_hex());

    let listing =
        listing_service::create_listing(&*state.market, farmer_id, request.into_inner(), now()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Listing created",
        "data": ListingResponse::from(listing)
    })))
}

#[utoipa::path(
    get,
    path = "/api/listings",
    tag = "Listings",
    params(
        ("cropType" = Option<String>, Query, description = "Case-insensitive crop type"),
        ("location" = Option<String>, Query, description = "Case-insensitive location")
    ),
    responses((status = 200, description = "Active listings")),
    security(("bearer_auth" = []))
)]
pub async fn browse_listings(
    state: web::Data<AppState>,
    query: web::Query<ListingQuery>,
) -> Result<HttpResponse, AppError> {
    let listings = listing_service::browse_listings(&*state.market, query.into_inner()).await?;
    Ok(listing_list(listings))
}

#[utoipa::path(
    get,
    path = "/api/listings/mine",
    tag = "Listings",
    responses((status = 200, description = "Listings of the authenticated farmer")),
    security(("bearer_auth" = []))
)]
pub async fn my_listings(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require_role(&[Role::Farmer])?;
    let listings = listing_service::farmer_listings(&*state.market, farmer_id).await?;
    Ok(listing_list(listings))
}

#[utoipa::path(
    get,
    path = "/api/listings/{id}",
    tag = "Listings",
    params(("id" = String, Path, description = "Listing ObjectId")),
    responses(
        (status = 200, description = "Listing", body = ListingResponse),
        (status = 404, description = "Listing not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_listing(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let listing_id = parse_object_id(&path, "listing")?;
    let listing = listing_service::get_listing(&*state.market, &listing_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": ListingResponse::from(listing)
    })))
}

#[utoipa::path(
    put,
    path = "/api/listings/{id}",
    tag = "Listings",
    params(("id" = String, Path, description = "Listing ObjectId")),
    request_body = UpdateListingRequest,
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Listing changed concurrently")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_listing(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateListingRequest>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require_role(&[Role::Farmer])?;
    let listing_id = parse_object_id(&path, "listing")?;
    log::info!("✏️ PUT /listings/{} - farmer {}", listing_id.to_hex(), farmer_id.to_hex());

    let listing = listing_service::update_listing(
        &*state.market,
        farmer_id,
        &listing_id,
        request.into_inner(),
        now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Listing updated",
        "data": ListingResponse::from(listing)
    })))
}

#[utoipa::path(
    delete,
    path = "/api/listings/{id}",
    tag = "Listings",
    params(("id" = String, Path, description = "Listing ObjectId")),
    responses(
        (status = 200, description = "Listing deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Listing not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_listing(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require_role(&[Role::Farmer])?;
    let listing_id = parse_object_id(&path, "listing")?;
    listing_service::delete_listing(&*state.market, farmer_id, &listing_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Listing deleted"
    })))
}

#[cfg(test)]
mod tests {
    use crate::api::{configure, test_support};
    use crate::models::Role;
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_farmer_creates_and_buyer_browses() {
        let (state, _) = test_support::state();
        let (_, farmer) = test_support::user_with_token(&state, Role::Farmer).await;
        let (_, factory) = test_support::user_with_token(&state, Role::Factory).await;
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/listings")
            .insert_header(("Authorization", farmer))
            .set_json(json!({
                "cropType": "Sugarcane",
                "quantity_in_tons": 40.0,
                "expected_price_per_ton": 3100.0,
                "location": "Satara"
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/listings?cropType=sugarcane")
            .insert_header(("Authorization", factory.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["quantity_in_tons"], 40.0);

        // factories cannot list crops
        let req = test::TestRequest::post()
            .uri("/api/listings")
            .insert_header(("Authorization", factory))
            .set_json(json!({
                "cropType": "Sugarcane",
                "quantity_in_tons": 1.0,
                "expected_price_per_ton": 1.0,
                "location": "Pune"
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_bad_listing_id_is_400() {
        let (state, _) = test_support::state();
        let (_, farmer) = test_support::user_with_token(&state, Role::Farmer).await;
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/listings/not-an-id")
            .insert_header(("Authorization", farmer))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "Invalid listing ID");
    }
}
