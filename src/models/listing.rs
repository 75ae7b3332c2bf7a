use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Expired => "expired",
        }
    }
}

/// Oferta de venda de um agricultor (coleção `listings`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub farmer_id: ObjectId,
    pub crop_type: String,
    pub variety: Option<String>,
    pub quantity_in_tons: f64,
    pub expected_price_per_ton: f64,
    pub location: String,
    pub description: Option<String>,
    pub harvest_date: Option<String>,
    /// Unix seconds; the sweeper expires the listing after this
    pub expires_at: Option<i64>,
    pub status: ListingStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Listing {
    pub fn is_available(&self) -> bool {
        self.status == ListingStatus::Active && self.quantity_in_tons > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub farmer_id: Option<ObjectId>,
    pub status: Option<ListingStatus>,
    pub crop_type: Option<String>,
    pub location: Option<String>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        self.farmer_id.map_or(true, |id| listing.farmer_id == id)
            && self.status.map_or(true, |s| listing.status == s)
            && self
                .crop_type
                .as_ref()
                .map_or(true, |c| listing.crop_type.eq_ignore_ascii_case(c))
            && self
                .location
                .as_ref()
                .map_or(true, |l| listing.location.eq_ignore_ascii_case(l))
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub crop_type: String,
    pub variety: Option<String>,
    #[serde(rename = "quantity_in_tons")]
    pub quantity_in_tons: f64,
    #[serde(rename = "expected_price_per_ton")]
    pub expected_price_per_ton: f64,
    pub location: String,
    pub description: Option<String>,
    pub harvest_date: Option<String>,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub crop_type: Option<String>,
    pub variety: Option<String>,
    #[serde(rename = "quantity_in_tons")]
    pub quantity_in_tons: Option<f64>,
    #[serde(rename = "expected_price_per_ton")]
    pub expected_price_per_ton: Option<f64>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub harvest_date: Option<String>,
    pub expires_at: Option<i64>,
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub crop_type: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub id: String,
    pub farmer_id: String,
    pub crop_type: String,
    pub variety: Option<String>,
    #[serde(rename = "quantity_in_tons")]
    pub quantity_in_tons: f64,
    #[serde(rename = "expected_price_per_ton")]
    pub expected_price_per_ton: f64,
    pub location: String,
    pub description: Option<String>,
    pub harvest_date: Option<String>,
    pub expires_at: Option<i64>,
    pub status: ListingStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Listing> for ListingResponse {
    fn from(l: Listing) -> Self {
        ListingResponse {
            id: l.id.map(|id| id.to_hex()).unwrap_or_default(),
            farmer_id: l.farmer_id.to_hex(),
            crop_type: l.crop_type,
            variety: l.variety,
            quantity_in_tons: l.quantity_in_tons,
            expected_price_per_ton: l.expected_price_per_ton,
            location: l.location,
            description: l.description,
            harvest_date: l.harvest_date,
            expires_at: l.expires_at,
            status: l.status,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}
