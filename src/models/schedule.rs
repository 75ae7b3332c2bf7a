use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Open,
    Closed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Open => "open",
            ScheduleStatus::Closed => "closed",
        }
    }
}

/// Vaga de trabalho publicada por um HHM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub hhm_id: ObjectId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub wage_per_day: f64,
    pub required_workers: u32,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub status: ScheduleStatus,
    #[serde(default)]
    pub accepted_workers_count: u32,
    #[serde(default)]
    pub applications_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Schedule {
    pub fn is_full(&self) -> bool {
        self.accepted_workers_count >= self.required_workers
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub wage_per_day: f64,
    pub required_workers: u32,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateScheduleStatusRequest {
    pub status: ScheduleStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub id: String,
    pub hhm_id: String,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub wage_per_day: f64,
    pub required_workers: u32,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub status: ScheduleStatus,
    pub accepted_workers_count: u32,
    pub applications_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Schedule> for ScheduleResponse {
    fn from(s: Schedule) -> Self {
        ScheduleResponse {
            id: s.id.map(|id| id.to_hex()).unwrap_or_default(),
            hhm_id: s.hhm_id.to_hex(),
            title: s.title,
            description: s.description,
            required_skills: s.required_skills,
            wage_per_day: s.wage_per_day,
            required_workers: s.required_workers,
            location: s.location,
            start_date: s.start_date,
            end_date: s.end_date,
            status: s.status,
            accepted_workers_count: s.accepted_workers_count,
            applications_count: s.applications_count,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}
