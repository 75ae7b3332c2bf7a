use crate::{
    api::metrics,
    models::{
        Acceptance, ListingChange, ListingStatus, Order, OrderDetails, OrderStatus, OrderStatusData,
        PartialFulfillment, PlaceOrderRequest,
    },
    services::fulfillment,
    store::MarketStore,
    utils::{AppError, AppResult},
};
use mongodb::bson::oid::ObjectId;

pub const SELLER_STATUSES: [OrderStatus; 4] = [
    OrderStatus::Accepted,
    OrderStatus::Rejected,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
];

/// Parses the `status` body field of a seller status update
pub fn parse_seller_status(raw: &str) -> AppResult<OrderStatus> {
    OrderStatus::parse(raw.trim())
        .filter(|s| SELLER_STATUSES.contains(s))
        .ok_or_else(|| {
            AppError::InvalidRequest(
                "Invalid status. Must be one of: accepted, rejected, completed, cancelled".into(),
            )
        })
}

pub fn parse_object_id(raw: &str, what: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidRequest(format!("Invalid {} ID", what)))
}

pub async fn place_order(
    store: &dyn MarketStore,
    buyer_id: ObjectId,
    request: PlaceOrderRequest,
    now: i64,
) -> AppResult<Order> {
    let listing_id = parse_object_id(&request.listing_id, "listing")?;
    if !request.quantity_wanted.is_finite() || request.quantity_wanted <= 0.0 {
        return Err(AppError::InvalidRequest(
            "quantityWanted must be greater than zero".into(),
        ));
    }

    let listing = store
        .find_listing(&listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".into()))?;
    if listing.farmer_id == buyer_id {
        return Err(AppError::InvalidRequest(
            "You cannot order from your own listing".into(),
        ));
    }
    if !listing.is_available() {
        return Err(AppError::InvalidRequest("Listing is not available".into()));
    }
    let total_amount = request.quantity_wanted * listing.expected_price_per_ton;
    if !total_amount.is_finite() {
        return Err(AppError::InvalidRequest("quantityWanted is too large".into()));
    }

    // Pedido acima do estoque é aceito aqui; a reconciliação acontece no aceite
    let order = Order {
        id: None,
        listing_id,
        seller_id: listing.farmer_id,
        buyer_id,
        crop_type: listing.crop_type.clone(),
        status: OrderStatus::Pending,
        order_details: OrderDetails {
            quantity_wanted: request.quantity_wanted,
            price_per_ton: listing.expected_price_per_ton,
            total_amount,
            delivery_location: request.delivery_location,
            notes: request.notes,
        },
        is_partial_fulfillment: false,
        original_quantity_requested: None,
        created_at: now,
        updated_at: now,
    };

    let order = store.insert_order(order).await?;
    log::info!(
        "🧾 Order {} placed on listing {} for {} t",
        order.id.map(|id| id.to_hex()).unwrap_or_default(),
        listing_id.to_hex(),
        order.order_details.quantity_wanted
    );
    Ok(order)
}

pub async fn received_orders(store: &dyn MarketStore, seller_id: ObjectId) -> AppResult<Vec<Order>> {
    store.orders_by_seller(&seller_id).await
}

pub async fn sent_orders(store: &dyn MarketStore, buyer_id: ObjectId) -> AppResult<Vec<Order>> {
    store.orders_by_buyer(&buyer_id).await
}

/// Either party of the order may read it
pub async fn get_order(store: &dyn MarketStore, user_id: ObjectId, order_id: &ObjectId) -> AppResult<Order> {
    store
        .find_order(order_id)
        .await?
        .filter(|o| o.seller_id == user_id || o.buyer_id == user_id)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}

#[derive(Debug)]
pub struct StatusUpdate {
    pub order: Order,
    pub partial_fulfillment: Option<PartialFulfillment>,
}

impl StatusUpdate {
    pub fn into_data(self) -> OrderStatusData {
        OrderStatusData {
            order_id: self.order.id.map(|id| id.to_hex()).unwrap_or_default(),
            status: self.order.status,
            updated_at: self.order.updated_at,
            partial_fulfillment: self.partial_fulfillment,
        }
    }
}

/// Seller-side status change. Accepting reconciles the order quantity with
/// the listing and commits both changes atomically.
pub async fn update_order_status(
    store: &dyn MarketStore,
    seller_id: ObjectId,
    order_id: &ObjectId,
    next: OrderStatus,
    now: i64,
) -> AppResult<StatusUpdate> {
    let order = store
        .find_order(order_id)
        .await?
        .filter(|o| o.seller_id == seller_id)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if !order.status.can_transition_to(next) {
        return Err(AppError::InvalidRequest(format!(
            "Cannot change order status from {} to {}",
            order.status, next
        )));
    }

    if next != OrderStatus::Accepted {
        let order = store
            .transition_order(order_id, order.status, next, now)
            .await?
            .ok_or_else(|| AppError::Conflict("Order status changed concurrently".into()))?;
        log::info!("📦 Order {} is now {}", order_id.to_hex(), next);
        return Ok(StatusUpdate { order, partial_fulfillment: None });
    }

    accept_order(store, order, now).await
}

async fn accept_order(store: &dyn MarketStore, order: Order, now: i64) -> AppResult<StatusUpdate> {
    let order_id = order
        .id
        .ok_or_else(|| AppError::Internal("order without id".into()))?;

    let listing = store
        .find_listing(&order.listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Associated listing not found".into()))?;

    let available = if listing.status == ListingStatus::Active {
        listing.quantity_in_tons
    } else {
        0.0
    };
    let plan = fulfillment::plan(
        order.order_details.quantity_wanted,
        available,
        order.order_details.price_per_ton,
    )?;

    let acceptance = Acceptance {
        order_id,
        listing_id: order.listing_id,
        expected_quantity: listing.quantity_in_tons,
        listing_change: plan.listing_change(),
        fulfilled_quantity: plan.fulfilled,
        total_amount: plan.total_amount,
        is_partial: plan.is_partial,
        original_quantity_requested: plan.original_quantity_requested(),
        updated_at: now,
    };

    let accepted = store.commit_acceptance(&acceptance).await?;

    let exhausted = acceptance.listing_change == ListingChange::Remove;
    metrics::record_order_accepted(plan.is_partial, exhausted);
    log::info!(
        "✅ Order {} accepted: {} of {} t (listing {} {})",
        order_id.to_hex(),
        plan.fulfilled,
        plan.requested,
        order.listing_id.to_hex(),
        if exhausted {
            "removed".to_string()
        } else {
            format!("left with {} t", plan.remaining)
        }
    );

    let partial_fulfillment = plan.is_partial.then(|| PartialFulfillment {
        original_quantity: plan.requested,
        fulfilled_quantity: plan.fulfilled,
        message: format!(
            "Only {} of the requested {} tons were available",
            plan.fulfilled, plan.requested
        ),
    });

    Ok(StatusUpdate {
        order: accepted,
        partial_fulfillment,
    })
}

/// Buyer withdraws an order that the seller has not answered yet
pub async fn cancel_order(
    store: &dyn MarketStore,
    buyer_id: ObjectId,
    order_id: &ObjectId,
    now: i64,
) -> AppResult<Order> {
    let order = store
        .find_order(order_id)
        .await?
        .filter(|o| o.buyer_id == buyer_id)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidRequest(format!(
            "Only pending orders can be cancelled (order is {})",
            order.status
        )));
    }

    store
        .transition_order(order_id, OrderStatus::Pending, OrderStatus::Cancelled, now)
        .await?
        .ok_or_else(|| AppError::Conflict("Order status changed concurrently".into()))
}
