use crate::{
    models::{
        CreateListingRequest, Listing, ListingFilter, ListingQuery, ListingStatus,
        UpdateListingRequest,
    },
    store::MarketStore,
    utils::{AppError, AppResult},
};
use mongodb::bson::oid::ObjectId;

fn require_positive(field: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::InvalidRequest(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}

pub async fn create_listing(
    store: &dyn MarketStore,
    farmer_id: ObjectId,
    request: CreateListingRequest,
    now: i64,
) -> AppResult<Listing> {
    require_text("cropType", &request.crop_type)?;
    require_text("location", &request.location)?;
    require_positive("quantity_in_tons", request.quantity_in_tons)?;
    require_positive("expected_price_per_ton", request.expected_price_per_ton)?;
    if request.expires_at.map_or(false, |at| at <= now) {
        return Err(AppError::InvalidRequest("expiresAt must be in the future".into()));
    }

    let listing = Listing {
        id: None,
        farmer_id,
        crop_type: request.crop_type.trim().to_string(),
        variety: request.variety,
        quantity_in_tons: request.quantity_in_tons,
        expected_price_per_ton: request.expected_price_per_ton,
        location: request.location.trim().to_string(),
        description: request.description,
        harvest_date: request.harvest_date,
        expires_at: request.expires_at,
        status: ListingStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let listing = store.insert_listing(listing).await?;
    log::info!(
        "🌾 Listing {} created: {} t of {}",
        listing.id.map(|id| id.to_hex()).unwrap_or_default(),
        listing.quantity_in_tons,
        listing.crop_type
    );
    Ok(listing)
}

/// Active listings visible to buyers
pub async fn browse_listings(store: &dyn MarketStore, query: ListingQuery) -> AppResult<Vec<Listing>> {
    let filter = ListingFilter {
        farmer_id: None,
        status: Some(ListingStatus::Active),
        crop_type: query.crop_type.filter(|c| !c.trim().is_empty()),
        location: query.location.filter(|l| !l.trim().is_empty()),
    };
    store.list_listings(&filter).await
}

pub async fn farmer_listings(store: &dyn MarketStore, farmer_id: ObjectId) -> AppResult<Vec<Listing>> {
    let filter = ListingFilter {
        farmer_id: Some(farmer_id),
        ..Default::default()
    };
    store.list_listings(&filter).await
}

pub async fn get_listing(store: &dyn MarketStore, listing_id: &ObjectId) -> AppResult<Listing> {
    store
        .find_listing(listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".into()))
}

pub async fn update_listing(
    store: &dyn MarketStore,
    farmer_id: ObjectId,
    listing_id: &ObjectId,
    request: UpdateListingRequest,
    now: i64,
) -> AppResult<Listing> {
    let current = get_listing(store, listing_id).await?;
    if current.farmer_id != farmer_id {
        return Err(AppError::Forbidden("You can only edit your own listings".into()));
    }

    let mut listing = current.clone();
    if let Some(crop_type) = request.crop_type {
        require_text("cropType", &crop_type)?;
        listing.crop_type = crop_type.trim().to_string();
    }
    if let Some(location) = request.location {
        require_text("location", &location)?;
        listing.location = location.trim().to_string();
    }
    if let Some(quantity) = request.quantity_in_tons {
        require_positive("quantity_in_tons", quantity)?;
        listing.quantity_in_tons = quantity;
    }
    if let Some(price) = request.expected_price_per_ton {
        require_positive("expected_price_per_ton", price)?;
        listing.expected_price_per_ton = price;
    }
    if request.variety.is_some() {
        listing.variety = request.variety;
    }
    if request.description.is_some() {
        listing.description = request.description;
    }
    if request.harvest_date.is_some() {
        listing.harvest_date = request.harvest_date;
    }
    if request.expires_at.is_some() {
        listing.expires_at = request.expires_at;
    }
    if let Some(status) = request.status {
        listing.status = status;
    }
    listing.updated_at = now;

    if !store.replace_listing(&listing, current.quantity_in_tons).await? {
        return Err(AppError::Conflict(
            "Listing changed while editing, please reload".into(),
        ));
    }
    Ok(listing)
}

pub async fn delete_listing(
    store: &dyn MarketStore,
    farmer_id: ObjectId,
    listing_id: &ObjectId,
) -> AppResult<()> {
    let listing = get_listing(store, listing_id).await?;
    if listing.farmer_id != farmer_id {
        return Err(AppError::Forbidden("You can only delete your own listings".into()));
    }
    if !store.delete_listing(listing_id, &farmer_id).await? {
        return Err(AppError::NotFound("Listing not found".into()));
    }
    log::info!("🗑️ Listing {} deleted", listing_id.to_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn request(quantity: f64, price: f64) -> CreateListingRequest {
        CreateListingRequest {
            crop_type: "Sugarcane".into(),
            variety: Some("Co 86032".into()),
            quantity_in_tons: quantity,
            expected_price_per_ton: price,
            location: "Kolhapur".into(),
            description: None,
            harvest_date: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_values() {
        let store = MemoryStore::new();
        let farmer = ObjectId::new();
        assert!(create_listing(&store, farmer, request(0.0, 3000.0), 10).await.is_err());
        assert!(create_listing(&store, farmer, request(10.0, -1.0), 10).await.is_err());
    }

    #[tokio::test]
    async fn test_browse_filters_by_crop_and_status() {
        let store = MemoryStore::new();
        let farmer = ObjectId::new();
        let first = create_listing(&store, farmer, request(10.0, 3000.0), 10).await.unwrap();
        let mut other = request(5.0, 2000.0);
        other.crop_type = "Jaggery".into();
        create_listing(&store, farmer, other, 11).await.unwrap();

        update_listing(
            &store,
            farmer,
            &first.id.unwrap(),
            UpdateListingRequest {
                status: Some(ListingStatus::Sold),
                ..Default::default()
            },
            12,
        )
        .await
        .unwrap();

        let sugarcane = browse_listings(
            &store,
            ListingQuery { crop_type: Some("sugarcane".into()), location: None },
        )
        .await
        .unwrap();
        assert!(sugarcane.is_empty());

        let all = browse_listings(&store, ListingQuery { crop_type: None, location: None })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].crop_type, "Jaggery");
        assert_eq!(farmer_listings(&store, farmer).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_only_owner_can_edit_or_delete() {
        let store = MemoryStore::new();
        let farmer = ObjectId::new();
        let intruder = ObjectId::new();
        let listing = create_listing(&store, farmer, request(10.0, 3000.0), 10).await.unwrap();
        let id = listing.id.unwrap();

        let edit = update_listing(&store, intruder, &id, UpdateListingRequest::default(), 11).await;
        assert!(matches!(edit, Err(AppError::Forbidden(_))));
        assert!(matches!(
            delete_listing(&store, intruder, &id).await,
            Err(AppError::Forbidden(_))
        ));

        delete_listing(&store, farmer, &id).await.unwrap();
        assert!(matches!(get_listing(&store, &id).await, Err(AppError::NotFound(_))));
    }
}
