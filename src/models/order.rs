use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "rejected" => Some(OrderStatus::Rejected),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// pending -> accepted | rejected | cancelled
    /// accepted -> completed | cancelled
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Rejected) | (Pending, Cancelled)
                | (Accepted, Completed) | (Accepted, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDetails {
    pub quantity_wanted: f64,
    pub price_per_ton: f64,
    pub total_amount: f64,
    pub delivery_location: Option<String>,
    pub notes: Option<String>,
}

/// Pedido de compra (coleção `orders`).
/// Seller and buyer both read this one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub listing_id: ObjectId,
    pub seller_id: ObjectId,
    pub buyer_id: ObjectId,
    pub crop_type: String,
    pub status: OrderStatus,
    pub order_details: OrderDetails,
    #[serde(default)]
    pub is_partial_fulfillment: bool,
    pub original_quantity_requested: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Everything an acceptance writes, applied in one atomic commit.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub order_id: ObjectId,
    pub listing_id: ObjectId,
    /// Listing quantity observed when the plan was made
    pub expected_quantity: f64,
    pub listing_change: ListingChange,
    pub fulfilled_quantity: f64,
    pub total_amount: f64,
    pub is_partial: bool,
    pub original_quantity_requested: Option<f64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListingChange {
    Remove,
    SetQuantity(f64),
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub listing_id: String,
    pub quantity_wanted: f64,
    pub delivery_location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsResponse {
    pub quantity_wanted: f64,
    pub price_per_ton: f64,
    pub total_amount: f64,
    pub delivery_location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub listing_id: String,
    pub seller_id: String,
    pub buyer_id: String,
    pub crop_type: String,
    pub status: OrderStatus,
    pub order_details: OrderDetailsResponse,
    pub is_partial_fulfillment: bool,
    pub original_quantity_requested: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        OrderResponse {
            order_id: o.id.map(|id| id.to_hex()).unwrap_or_default(),
            listing_id: o.listing_id.to_hex(),
            seller_id: o.seller_id.to_hex(),
            buyer_id: o.buyer_id.to_hex(),
            crop_type: o.crop_type,
            status: o.status,
            order_details: OrderDetailsResponse {
                quantity_wanted: o.order_details.quantity_wanted,
                price_per_ton: o.order_details.price_per_ton,
                total_amount: o.order_details.total_amount,
                delivery_location: o.order_details.delivery_location,
                notes: o.order_details.notes,
            },
            is_partial_fulfillment: o.is_partial_fulfillment,
            original_quantity_requested: o.original_quantity_requested,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartialFulfillment {
    pub original_quantity: f64,
    pub fulfilled_quantity: f64,
    pub message: String,
}

/// Corpo `data` de `PUT /api/orders/{orderId}/status`
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusData {
    pub order_id: String,
    pub status: OrderStatus,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_fulfillment: Option<PartialFulfillment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transitions() {
        let p = OrderStatus::Pending;
        assert!(p.can_transition_to(OrderStatus::Accepted));
        assert!(p.can_transition_to(OrderStatus::Rejected));
        assert!(p.can_transition_to(OrderStatus::Cancelled));
        assert!(!p.can_transition_to(OrderStatus::Completed));
        assert!(!p.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_states_are_closed() {
        for terminal in [OrderStatus::Rejected, OrderStatus::Completed, OrderStatus::Cancelled] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Accepted,
                OrderStatus::Rejected,
                OrderStatus::Completed,
                OrderStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next), "{} -> {}", terminal, next);
            }
        }
    }

    #[test]
    fn test_accepted_cannot_be_accepted_again() {
        assert!(!OrderStatus::Accepted.can_transition_to(OrderStatus::Accepted));
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_parse_round_trips_wire_names() {
        assert_eq!(OrderStatus::parse("accepted"), Some(OrderStatus::Accepted));
        assert_eq!(OrderStatus::parse("ACCEPTED"), None);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
