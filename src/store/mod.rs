//! Storage seams.
//!
//! `MarketStore` covers users, listings and orders; `JobStore` covers the
//! labour side (schedules, applications, invitations). Both are implemented
//! over MongoDB (`database::MongoDB`) and in memory (`MemoryStore`).
//!
//! Every method that changes a status or a counter is guarded: it only
//! applies while the record still holds the value the caller observed, and
//! reports `None`/`Conflict` otherwise.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::models::{
    Acceptance, Application, ApplicationStatus, Invitation, InvitationStatus, Listing,
    ListingFilter, Order, OrderStatus, Schedule, ScheduleStatus, User,
};
use crate::utils::AppResult;

pub use memory::MemoryStore;

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered
    async fn insert_user(&self, user: User) -> AppResult<User>;
    async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn insert_listing(&self, listing: Listing) -> AppResult<Listing>;
    async fn find_listing(&self, id: &ObjectId) -> AppResult<Option<Listing>>;
    async fn list_listings(&self, filter: &ListingFilter) -> AppResult<Vec<Listing>>;
    /// Replaces the listing while its quantity still equals `expected_quantity`
    async fn replace_listing(&self, listing: &Listing, expected_quantity: f64) -> AppResult<bool>;
    async fn delete_listing(&self, id: &ObjectId, farmer_id: &ObjectId) -> AppResult<bool>;
    /// Marks active listings with `expires_at <= now` as expired
    async fn expire_listings(&self, now: i64) -> AppResult<u64>;

    async fn insert_order(&self, order: Order) -> AppResult<Order>;
    async fn find_order(&self, id: &ObjectId) -> AppResult<Option<Order>>;
    async fn orders_by_seller(&self, seller_id: &ObjectId) -> AppResult<Vec<Order>>;
    async fn orders_by_buyer(&self, buyer_id: &ObjectId) -> AppResult<Vec<Order>>;
    async fn transition_order(
        &self,
        id: &ObjectId,
        from: OrderStatus,
        to: OrderStatus,
        now: i64,
    ) -> AppResult<Option<Order>>;
    /// Applies the listing change and the order update together or not at all.
    /// `Conflict` when the order is no longer pending or the listing moved.
    async fn commit_acceptance(&self, acceptance: &Acceptance) -> AppResult<Order>;
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    pub hhm_id: Option<ObjectId>,
    pub status: Option<ScheduleStatus>,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &Schedule) -> bool {
        self.hhm_id.map_or(true, |id| schedule.hhm_id == id)
            && self.status.map_or(true, |s| schedule.status == s)
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_schedule(&self, schedule: Schedule) -> AppResult<Schedule>;
    async fn find_schedule(&self, id: &ObjectId) -> AppResult<Option<Schedule>>;
    async fn list_schedules(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>>;
    async fn set_schedule_status(
        &self,
        id: &ObjectId,
        hhm_id: &ObjectId,
        status: ScheduleStatus,
        now: i64,
    ) -> AppResult<Option<Schedule>>;

    /// Inserts the application and bumps `applications_count`.
    /// `Conflict` when the worker already applied to the schedule.
    async fn insert_application(&self, application: Application) -> AppResult<Application>;
    async fn find_application(&self, id: &ObjectId) -> AppResult<Option<Application>>;
    async fn applications_for_schedule(&self, schedule_id: &ObjectId) -> AppResult<Vec<Application>>;
    async fn applications_for_worker(&self, worker_id: &ObjectId) -> AppResult<Vec<Application>>;
    async fn set_application_status(
        &self,
        id: &ObjectId,
        from: ApplicationStatus,
        to: ApplicationStatus,
        now: i64,
    ) -> AppResult<Option<Application>>;
    /// Takes a seat on the schedule and approves the pending application.
    /// `Conflict` when the schedule is closed/full or the application moved.
    async fn approve_application(&self, id: &ObjectId, now: i64) -> AppResult<(Application, Schedule)>;

    async fn insert_invitation(&self, invitation: Invitation) -> AppResult<Invitation>;
    async fn find_invitation(&self, id: &ObjectId) -> AppResult<Option<Invitation>>;
    async fn invitations_for_worker(&self, worker_id: &ObjectId) -> AppResult<Vec<Invitation>>;
    async fn invitations_for_hhm(&self, hhm_id: &ObjectId) -> AppResult<Vec<Invitation>>;
    async fn set_invitation_status(
        &self,
        id: &ObjectId,
        from: InvitationStatus,
        to: InvitationStatus,
        now: i64,
    ) -> AppResult<Option<Invitation>>;
    /// Same seat rules as `approve_application`, for a schedule-bound invitation
    async fn accept_invitation(&self, id: &ObjectId, now: i64) -> AppResult<(Invitation, Schedule)>;
}
