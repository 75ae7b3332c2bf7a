// ==================== LISTING EXPIRY SWEEPER ====================
// Marca como `expired` os anúncios ativos cujo expires_at já passou

use crate::store::MarketStore;
use crate::utils::AppResult;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Runs one sweep and returns how many listings expired
pub async fn sweep_once(market: &dyn MarketStore, now: i64) -> AppResult<u64> {
    let expired = market.expire_listings(now).await?;
    if expired > 0 {
        log::info!("⌛ {} listing(s) expired", expired);
    } else {
        log::debug!("⌛ No listings to expire");
    }
    Ok(expired)
}

pub fn start_listing_expiry_sweeper(market: Arc<dyn MarketStore>, every_secs: u64) {
    log::info!("⌛ Starting listing expiry sweeper (every {}s)", every_secs);

    tokio::spawn(async move {
        // primeiro tick dispara na hora
        let mut interval = interval(Duration::from_secs(every_secs.max(1)));

        loop {
            interval.tick().await;
            if let Err(e) = sweep_once(&*market, Utc::now().timestamp()).await {
                log::error!("❌ Listing expiry sweep failed: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Listing, ListingStatus};
    use crate::store::MemoryStore;
    use mongodb::bson::oid::ObjectId;

    fn listing(expires_at: Option<i64>) -> Listing {
        Listing {
            id: None,
            farmer_id: ObjectId::new(),
            crop_type: "Sugarcane".into(),
            variety: None,
            quantity_in_tons: 10.0,
            expected_price_per_ton: 2800.0,
            location: "Karad".into(),
            description: None,
            harvest_date: None,
            expires_at,
            status: ListingStatus::Active,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_sweep_expires_only_past_listings() {
        let store = MemoryStore::new();
        let old = store.insert_listing(listing(Some(100))).await.unwrap();
        let fresh = store.insert_listing(listing(Some(10_000))).await.unwrap();
        let forever = store.insert_listing(listing(None)).await.unwrap();

        assert_eq!(sweep_once(&store, 500).await.unwrap(), 1);
        assert_eq!(sweep_once(&store, 500).await.unwrap(), 0);

        let status = |l: Option<Listing>| l.unwrap().status;
        assert_eq!(status(store.find_listing(&old.id.unwrap()).await.unwrap()), ListingStatus::Expired);
        assert_eq!(status(store.find_listing(&fresh.id.unwrap()).await.unwrap()), ListingStatus::Active);
        assert_eq!(status(store.find_listing(&forever.id.unwrap()).await.unwrap()), ListingStatus::Active);
    }
}
