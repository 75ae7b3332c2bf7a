use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::results::InsertOneResult;
use mongodb::{ClientSession, Collection};
use serde::de::DeserializeOwned;

use super::{JobStore, MarketStore, ScheduleFilter};
use crate::database::{
    MongoDB, APPLICATIONS, INVITATIONS, LISTINGS, ORDERS, SCHEDULES, USERS,
};
use crate::models::{
    Acceptance, Application, ApplicationStatus, Invitation, InvitationStatus, Listing,
    ListingChange, ListingFilter, ListingStatus, Order, OrderStatus, Schedule, ScheduleStatus,
    User,
};
use crate::utils::{AppError, AppResult};

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

fn inserted_id(result: &InsertOneResult) -> AppResult<ObjectId> {
    result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| AppError::Internal("insert did not return an ObjectId".into()))
}

fn newest_first() -> Document {
    doc! { "created_at": -1, "_id": -1 }
}

async fn find_all<T>(collection: Collection<T>, filter: Document) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let cursor = collection.find(filter).sort(newest_first()).await?;
    Ok(cursor.try_collect().await?)
}

impl MongoDB {
    fn users(&self) -> Collection<User> {
        self.collection(USERS)
    }

    fn listings(&self) -> Collection<Listing> {
        self.collection(LISTINGS)
    }

    fn orders(&self) -> Collection<Order> {
        self.collection(ORDERS)
    }

    fn schedules(&self) -> Collection<Schedule> {
        self.collection(SCHEDULES)
    }

    fn applications(&self) -> Collection<Application> {
        self.collection(APPLICATIONS)
    }

    fn invitations(&self) -> Collection<Invitation> {
        self.collection(INVITATIONS)
    }

    /// Commits when `body` succeeded, aborts otherwise
    async fn finish_transaction<T>(
        &self,
        session: &mut ClientSession,
        body: AppResult<T>,
    ) -> AppResult<T> {
        match body {
            Ok(value) => {
                session.commit_transaction().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    log::warn!("⚠️  Failed to abort transaction: {}", abort_err);
                }
                Err(e)
            }
        }
    }

    async fn accept_in_session(
        &self,
        session: &mut ClientSession,
        acceptance: &Acceptance,
    ) -> AppResult<Order> {
        let listing_guard = doc! {
            "_id": acceptance.listing_id,
            "status": ListingStatus::Active.as_str(),
            "quantity_in_tons": acceptance.expected_quantity,
        };

        let listing_written = match acceptance.listing_change {
            ListingChange::Remove => {
                self.listings()
                    .delete_one(listing_guard)
                    .session(&mut *session)
                    .await?
                    .deleted_count
                    > 0
            }
            ListingChange::SetQuantity(quantity) => {
                self.listings()
                    .update_one(
                        listing_guard,
                        doc! { "$set": {
                            "quantity_in_tons": quantity,
                            "updated_at": acceptance.updated_at,
                        }},
                    )
                    .session(&mut *session)
                    .await?
                    .matched_count
                    > 0
            }
        };
        if !listing_written {
            return Err(AppError::Conflict(
                "Listing changed or is no longer active, please retry".into(),
            ));
        }

        self.orders()
            .find_one_and_update(
                doc! { "_id": acceptance.order_id, "status": OrderStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": OrderStatus::Accepted.as_str(),
                    "order_details.quantity_wanted": acceptance.fulfilled_quantity,
                    "order_details.total_amount": acceptance.total_amount,
                    "is_partial_fulfillment": acceptance.is_partial,
                    "original_quantity_requested": acceptance.original_quantity_requested,
                    "updated_at": acceptance.updated_at,
                }},
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::Conflict("Order is no longer pending".into()))
    }

    /// $inc guarded by capacity; closes the schedule once it is full
    async fn take_seat_in_session(
        &self,
        session: &mut ClientSession,
        schedule_id: ObjectId,
        now: i64,
    ) -> AppResult<Schedule> {
        let mut schedule = self
            .schedules()
            .find_one_and_update(
                doc! {
                    "_id": schedule_id,
                    "status": ScheduleStatus::Open.as_str(),
                    "$expr": { "$lt": ["$accepted_workers_count", "$required_workers"] },
                },
                doc! {
                    "$inc": { "accepted_workers_count": 1 },
                    "$set": { "updated_at": now },
                },
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::Conflict("Schedule is full or closed".into()))?;

        if schedule.is_full() {
            self.schedules()
                .update_one(
                    doc! { "_id": schedule_id },
                    doc! { "$set": { "status": ScheduleStatus::Closed.as_str() } },
                )
                .session(&mut *session)
                .await?;
            schedule.status = ScheduleStatus::Closed;
        }
        Ok(schedule)
    }

    async fn approve_in_session(
        &self,
        session: &mut ClientSession,
        id: &ObjectId,
        now: i64,
    ) -> AppResult<(Application, Schedule)> {
        let application = self
            .applications()
            .find_one_and_update(
                doc! { "_id": *id, "status": ApplicationStatus::Pending.as_str() },
                doc! { "$set": { "status": ApplicationStatus::Approved.as_str(), "updated_at": now } },
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::Conflict("Application is no longer pending".into()))?;

        let schedule = self
            .take_seat_in_session(session, application.schedule_id, now)
            .await?;
        Ok((application, schedule))
    }

    async fn accept_invitation_in_session(
        &self,
        session: &mut ClientSession,
        id: &ObjectId,
        now: i64,
    ) -> AppResult<(Invitation, Schedule)> {
        let invitation = self
            .invitations()
            .find_one_and_update(
                doc! { "_id": *id, "status": InvitationStatus::Pending.as_str() },
                doc! { "$set": { "status": InvitationStatus::Accepted.as_str(), "updated_at": now } },
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::Conflict("Invitation is no longer pending".into()))?;

        let schedule_id = invitation
            .schedule_id
            .ok_or_else(|| AppError::InvalidRequest("Invitation is not bound to a schedule".into()))?;
        let schedule = self.take_seat_in_session(session, schedule_id, now).await?;
        Ok((invitation, schedule))
    }

    async fn apply_in_session(
        &self,
        session: &mut ClientSession,
        application: &Application,
    ) -> AppResult<ObjectId> {
        let result = self
            .applications()
            .insert_one(application)
            .session(&mut *session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict("You have already applied to this schedule".into())
                } else {
                    AppError::from(e)
                }
            })?;

        let bumped = self
            .schedules()
            .update_one(
                doc! { "_id": application.schedule_id },
                doc! { "$inc": { "applications_count": 1 } },
            )
            .session(&mut *session)
            .await?;
        if bumped.matched_count == 0 {
            return Err(AppError::NotFound("Schedule not found".into()));
        }
        inserted_id(&result)
    }
}

#[async_trait]
impl MarketStore for MongoDB {
    async fn insert_user(&self, mut user: User) -> AppResult<User> {
        let result = self.users().insert_one(&user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("Email is already registered".into())
            } else {
                AppError::from(e)
            }
        })?;
        user.id = Some(inserted_id(&result)?);
        Ok(user)
    }

    async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": *id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }

    async fn insert_listing(&self, mut listing: Listing) -> AppResult<Listing> {
        let result = self.listings().insert_one(&listing).await?;
        listing.id = Some(inserted_id(&result)?);
        Ok(listing)
    }

    async fn find_listing(&self, id: &ObjectId) -> AppResult<Option<Listing>> {
        Ok(self.listings().find_one(doc! { "_id": *id }).await?)
    }

    async fn list_listings(&self, filter: &ListingFilter) -> AppResult<Vec<Listing>> {
        let mut query = Document::new();
        if let Some(farmer_id) = filter.farmer_id {
            query.insert("farmer_id", farmer_id);
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        // Case-insensitive exact match, same as ListingFilter::matches
        if let Some(crop_type) = &filter.crop_type {
            query.insert("crop_type", exact_ci(crop_type));
        }
        if let Some(location) = &filter.location {
            query.insert("location", exact_ci(location));
        }
        find_all(self.listings(), query).await
    }

    async fn replace_listing(&self, listing: &Listing, expected_quantity: f64) -> AppResult<bool> {
        let id = listing
            .id
            .ok_or_else(|| AppError::Internal("listing without id".into()))?;
        let result = self
            .listings()
            .replace_one(
                doc! {
                    "_id": id,
                    "farmer_id": listing.farmer_id,
                    "quantity_in_tons": expected_quantity,
                },
                listing,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_listing(&self, id: &ObjectId, farmer_id: &ObjectId) -> AppResult<bool> {
        let result = self
            .listings()
            .delete_one(doc! { "_id": *id, "farmer_id": *farmer_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn expire_listings(&self, now: i64) -> AppResult<u64> {
        let result = self
            .listings()
            .update_many(
                doc! {
                    "status": ListingStatus::Active.as_str(),
                    "expires_at": { "$ne": null, "$lte": now },
                },
                doc! { "$set": { "status": ListingStatus::Expired.as_str(), "updated_at": now } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn insert_order(&self, mut order: Order) -> AppResult<Order> {
        let result = self.orders().insert_one(&order).await?;
        order.id = Some(inserted_id(&result)?);
        Ok(order)
    }

    async fn find_order(&self, id: &ObjectId) -> AppResult<Option<Order>> {
        Ok(self.orders().find_one(doc! { "_id": *id }).await?)
    }

    async fn orders_by_seller(&self, seller_id: &ObjectId) -> AppResult<Vec<Order>> {
        find_all(self.orders(), doc! { "seller_id": *seller_id }).await
    }

    async fn orders_by_buyer(&self, buyer_id: &ObjectId) -> AppResult<Vec<Order>> {
        find_all(self.orders(), doc! { "buyer_id": *buyer_id }).await
    }

    async fn transition_order(
        &self,
        id: &ObjectId,
        from: OrderStatus,
        to: OrderStatus,
        now: i64,
    ) -> AppResult<Option<Order>> {
        Ok(self
            .orders()
            .find_one_and_update(
                doc! { "_id": *id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updated_at": now } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn commit_acceptance(&self, acceptance: &Acceptance) -> AppResult<Order> {
        let mut session = self.client().start_session().await?;
        session.start_transaction().await?;
        let body = self.accept_in_session(&mut session, acceptance).await;
        self.finish_transaction(&mut session, body).await
    }
}

fn exact_ci(value: &str) -> Document {
    let escaped: String = value
        .chars()
        .flat_map(|c| {
            let escape = "\\^$.|?*+()[]{}".contains(c);
            escape.then_some('\\').into_iter().chain(std::iter::once(c))
        })
        .collect();
    doc! { "$regex": format!("^{}$", escaped), "$options": "i" }
}

#[async_trait]
impl JobStore for MongoDB {
    async fn insert_schedule(&self, mut schedule: Schedule) -> AppResult<Schedule> {
        let result = self.schedules().insert_one(&schedule).await?;
        schedule.id = Some(inserted_id(&result)?);
        Ok(schedule)
    }

    async fn find_schedule(&self, id: &ObjectId) -> AppResult<Option<Schedule>> {
        Ok(self.schedules().find_one(doc! { "_id": *id }).await?)
    }

    async fn list_schedules(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>> {
        let mut query = Document::new();
        if let Some(hhm_id) = filter.hhm_id {
            query.insert("hhm_id", hhm_id);
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        find_all(self.schedules(), query).await
    }

    async fn set_schedule_status(
        &self,
        id: &ObjectId,
        hhm_id: &ObjectId,
        status: ScheduleStatus,
        now: i64,
    ) -> AppResult<Option<Schedule>> {
        Ok(self
            .schedules()
            .find_one_and_update(
                doc! { "_id": *id, "hhm_id": *hhm_id },
                doc! { "$set": { "status": status.as_str(), "updated_at": now } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn insert_application(&self, mut application: Application) -> AppResult<Application> {
        let mut session = self.client().start_session().await?;
        session.start_transaction().await?;
        let body = self.apply_in_session(&mut session, &application).await;
        let id = self.finish_transaction(&mut session, body).await?;
        application.id = Some(id);
        Ok(application)
    }

    async fn find_application(&self, id: &ObjectId) -> AppResult<Option<Application>> {
        Ok(self.applications().find_one(doc! { "_id": *id }).await?)
    }

    async fn applications_for_schedule(&self, schedule_id: &ObjectId) -> AppResult<Vec<Application>> {
        find_all(self.applications(), doc! { "schedule_id": *schedule_id }).await
    }

    async fn applications_for_worker(&self, worker_id: &ObjectId) -> AppResult<Vec<Application>> {
        find_all(self.applications(), doc! { "worker_id": *worker_id }).await
    }

    async fn set_application_status(
        &self,
        id: &ObjectId,
        from: ApplicationStatus,
        to: ApplicationStatus,
        now: i64,
    ) -> AppResult<Option<Application>> {
        Ok(self
            .applications()
            .find_one_and_update(
                doc! { "_id": *id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updated_at": now } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn approve_application(&self, id: &ObjectId, now: i64) -> AppResult<(Application, Schedule)> {
        let mut session = self.client().start_session().await?;
        session.start_transaction().await?;
        let body = self.approve_in_session(&mut session, id, now).await;
        self.finish_transaction(&mut session, body).await
    }

    async fn insert_invitation(&self, mut invitation: Invitation) -> AppResult<Invitation> {
        let result = self.invitations().insert_one(&invitation).await?;
        invitation.id = Some(inserted_id(&result)?);
        Ok(invitation)
    }

    async fn find_invitation(&self, id: &ObjectId) -> AppResult<Option<Invitation>> {
        Ok(self.invitations().find_one(doc! { "_id": *id }).await?)
    }

    async fn invitations_for_worker(&self, worker_id: &ObjectId) -> AppResult<Vec<Invitation>> {
        find_all(self.invitations(), doc! { "worker_id": *worker_id }).await
    }

    async fn invitations_for_hhm(&self, hhm_id: &ObjectId) -> AppResult<Vec<Invitation>> {
        find_all(self.invitations(), doc! { "hhm_id": *hhm_id }).await
    }

    async fn set_invitation_status(
        &self,
        id: &ObjectId,
        from: InvitationStatus,
        to: InvitationStatus,
        now: i64,
    ) -> AppResult<Option<Invitation>> {
        Ok(self
            .invitations()
            .find_one_and_update(
                doc! { "_id": *id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updated_at": now } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn accept_invitation(&self, id: &ObjectId, now: i64) -> AppResult<(Invitation, Schedule)> {
        let mut session = self.client().start_session().await?;
        session.start_transaction().await?;
        let body = self.accept_invitation_in_session(&mut session, id, now).await;
        self.finish_transaction(&mut session, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ci_escapes_regex_metacharacters() {
        let filter = exact_ci("Co-6.7 (early)");
        assert_eq!(filter.get_str("$regex").unwrap(), "^Co-6\\.7 \\(early\\)$");
        assert_eq!(filter.get_str("$options").unwrap(), "i");
    }
}
