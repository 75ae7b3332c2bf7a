pub mod auth_service;
pub mod fulfillment;
pub mod listing_service;
pub mod order_service;
pub mod schedule_service;
