use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub schedule_id: ObjectId,
    pub worker_id: ObjectId,
    pub hhm_id: ObjectId,
    pub cover_note: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub cover_note: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DecideApplicationRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: String,
    pub schedule_id: String,
    pub worker_id: String,
    pub hhm_id: String,
    pub cover_note: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Application> for ApplicationResponse {
    fn from(a: Application) -> Self {
        ApplicationResponse {
            id: a.id.map(|id| id.to_hex()).unwrap_or_default(),
            schedule_id: a.schedule_id.to_hex(),
            worker_id: a.worker_id.to_hex(),
            hhm_id: a.hhm_id.to_hex(),
            cover_note: a.cover_note,
            status: a.status,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}
