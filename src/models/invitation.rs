use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }
}

/// Convite direto de um HHM para um trabalhador
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub hhm_id: ObjectId,
    pub worker_id: ObjectId,
    pub schedule_id: Option<ObjectId>,
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub worker_id: String,
    pub schedule_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RespondInvitationRequest {
    pub status: InvitationStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: String,
    pub hhm_id: String,
    pub worker_id: String,
    pub schedule_id: Option<String>,
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        InvitationResponse {
            id: i.id.map(|id| id.to_hex()).unwrap_or_default(),
            hhm_id: i.hhm_id.to_hex(),
            worker_id: i.worker_id.to_hex(),
            schedule_id: i.schedule_id.map(|id| id.to_hex()),
            message: i.message,
            status: i.status,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}
