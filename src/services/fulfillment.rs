//! Quantity reconciliation for order acceptance.
//!
//! Pure arithmetic: given what the buyer asked for and what the listing still
//! holds, decide how much is fulfilled and what happens to the listing.

use crate::models::ListingChange;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentPlan {
    pub requested: f64,
    pub available: f64,
    pub fulfilled: f64,
    pub remaining: f64,
    pub total_amount: f64,
    pub is_partial: bool,
}

impl FulfillmentPlan {
    /// Listing is deleted once nothing is left
    pub fn listing_change(&self) -> ListingChange {
        if self.remaining <= 0.0 {
            ListingChange::Remove
        } else {
            ListingChange::SetQuantity(self.remaining)
        }
    }

    pub fn original_quantity_requested(&self) -> Option<f64> {
        self.is_partial.then_some(self.requested)
    }
}

pub fn plan(requested: f64, available: f64, price_per_ton: f64) -> AppResult<FulfillmentPlan> {
    if !requested.is_finite() || requested <= 0.0 {
        return Err(AppError::InvalidRequest(
            "Order quantity must be greater than zero".into(),
        ));
    }
    if available <= 0.0 {
        return Err(AppError::InvalidRequest("Listing is out of stock".into()));
    }

    let fulfilled = requested.min(available);
    Ok(FulfillmentPlan {
        requested,
        available,
        fulfilled,
        remaining: available - fulfilled,
        total_amount: fulfilled * price_per_ton,
        is_partial: requested > available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_fulfillment_keeps_remainder() {
        let p = plan(50.0, 75.0, 3100.0).unwrap();
        assert_eq!(p.fulfilled, 50.0);
        assert_eq!(p.remaining, 25.0);
        assert_eq!(p.total_amount, 155_000.0);
        assert!(!p.is_partial);
        assert_eq!(p.original_quantity_requested(), None);
        assert_eq!(p.listing_change(), ListingChange::SetQuantity(25.0));
    }

    #[test]
    fn test_exact_quantity_removes_listing() {
        let p = plan(25.0, 25.0, 3000.0).unwrap();
        assert_eq!(p.remaining, 0.0);
        assert!(!p.is_partial);
        assert_eq!(p.listing_change(), ListingChange::Remove);
    }

    #[test]
    fn test_partial_fulfillment_caps_at_available() {
        let p = plan(120.0, 100.0, 2900.0).unwrap();
        assert_eq!(p.fulfilled, 100.0);
        assert!(p.is_partial);
        assert_eq!(p.original_quantity_requested(), Some(120.0));
        assert_eq!(p.total_amount, 290_000.0);
        assert_eq!(p.listing_change(), ListingChange::Remove);
    }

    #[test]
    fn test_out_of_stock() {
        assert!(matches!(plan(10.0, 0.0, 1.0), Err(AppError::InvalidRequest(_))));
        assert!(matches!(plan(10.0, -3.0, 1.0), Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn test_non_positive_request() {
        assert!(plan(0.0, 10.0, 1.0).is_err());
        assert!(plan(f64::NAN, 10.0, 1.0).is_err());
    }
}
