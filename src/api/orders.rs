use crate::{
    api::{now, AppState},
    middleware::auth::Claims,
    models::{Order, OrderResponse, OrderStatusData, PlaceOrderRequest, Role, UpdateOrderStatusRequest},
    services::order_service::{self, parse_object_id, parse_seller_status},
    utils::AppError,
};
use actix_web::{web, HttpResponse};

// ==================== ORDERS ====================
// Um único documento por pedido: o vendedor enxerga por seller_id,
// o comprador por buyer_id

fn order_list(orders: Vec<Order>) -> HttpResponse {
    let data: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data
    }))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Invalid listing or quantity"),
        (status = 403, description = "Only factories and HHMs can buy"),
        (status = 404, description = "Listing not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn place_order(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    request: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let buyer_id = user.require_role(&[Role::Factory, Role::Hhm])?;
    log::info!(
        "🛒 POST /orders - buyer {} wants {} t from listing {}",
        buyer_id.to_hex(),
        request.quantity_wanted,
        request.listing_id
    );

    let order = order_service::place_order(&*state.market, buyer_id, request.into_inner(), now()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Order placed",
        "data": OrderResponse::from(order)
    })))
}

#[utoipa::path(
    get,
    path = "/api/orders/received",
    tag = "Orders",
    responses((status = 200, description = "Orders received by the authenticated seller")),
    security(("bearer_auth" = []))
)]
pub async fn received_orders(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let seller_id = user.require_role(&[Role::Farmer])?;
    let orders = order_service::received_orders(&*state.market, seller_id).await?;
    Ok(order_list(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/sent",
    tag = "Orders",
    responses((status = 200, description = "Orders placed by the authenticated buyer")),
    security(("bearer_auth" = []))
)]
pub async fn sent_orders(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let buyer_id = user.require_role(&[Role::Factory, Role::Hhm])?;
    let orders = order_service::sent_orders(&*state.market, buyer_id).await?;
    Ok(order_list(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    tag = "Orders",
    params(("order_id" = String, Path, description = "Order ObjectId")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_order(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = parse_object_id(&path, "order")?;
    let order = order_service::get_order(&*state.market, user.user_id()?, &order_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": OrderResponse::from(order)
    })))
}

/// Seller answers an order. Accepting reconciles the quantity against the listing.
#[utoipa::path(
    put,
    path = "/api/orders/{order_id}/status",
    tag = "Orders",
    params(("order_id" = String, Path, description = "Order ObjectId")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderStatusData),
        (status = 400, description = "Invalid id, status or transition, or listing out of stock"),
        (status = 404, description = "Order or associated listing not found"),
        (status = 409, description = "Order or listing changed concurrently")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_order_status(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let seller_id = user.require_role(&[Role::Farmer])?;
    let order_id = parse_object_id(&path, "order")?;
    let next = parse_seller_status(&request.status)?;
    log::info!("📦 PUT /orders/{}/status -> {}", order_id.to_hex(), next);

    let update = match order_service::update_order_status(&*state.market, seller_id, &order_id, next, now()).await {
        Ok(update) => update,
        Err(e) => {
            log::warn!("❌ Order {} status update failed: {}", order_id.to_hex(), e);
            return Err(e);
        }
    };

    let message = match &update.partial_fulfillment {
        Some(_) => format!("Order {} with partial fulfillment", next),
        None => format!("Order {} successfully", next),
    };
    let data: OrderStatusData = update.into_data();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": message,
        "data": data
    })))
}

#[utoipa::path(
    put,
    path = "/api/orders/{order_id}/cancel",
    tag = "Orders",
    params(("order_id" = String, Path, description = "Order ObjectId")),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 400, description = "Order is not pending"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_order(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let buyer_id = user.require_role(&[Role::Factory, Role::Hhm])?;
    let order_id = parse_object_id(&path, "order")?;
    let order = order_service::cancel_order(&*state.market, buyer_id, &order_id, now()).await?;
    log::info!("❌ Order {} cancelled by buyer", order_id.to_hex());
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Order cancelled",
        "data": OrderResponse::from(order)
    })))
}
