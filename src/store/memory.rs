use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use super::{JobStore, MarketStore, ScheduleFilter};
use crate::models::{
    Acceptance, Application, ApplicationStatus, Invitation, InvitationStatus, Listing,
    ListingChange, ListingFilter, ListingStatus, Order, OrderStatus, Schedule, ScheduleStatus,
    User,
};
use crate::utils::{AppError, AppResult};

#[derive(Default)]
struct MemoryState {
    users: HashMap<ObjectId, User>,
    listings: HashMap<ObjectId, Listing>,
    orders: HashMap<ObjectId, Order>,
    schedules: HashMap<ObjectId, Schedule>,
    applications: HashMap<ObjectId, Application>,
    invitations: HashMap<ObjectId, Invitation>,
}

/// Store em memória (dev local e testes). One lock serialises every write,
/// so each guarded mutation is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    #[cfg(test)]
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| AppError::DatabaseError("memory store lock poisoned".into()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| AppError::DatabaseError("memory store lock poisoned".into()))
    }

    /// Makes the next `commit_acceptance` fail as a storage error
    #[cfg(test)]
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

/// Newest first, like the `{created_at: -1, _id: -1}` sort on MongoDB
fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (i64, Option<ObjectId>),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

fn take_seat(schedule: &mut Schedule, now: i64) -> AppResult<()> {
    if schedule.status != ScheduleStatus::Open || schedule.is_full() {
        return Err(AppError::Conflict("Schedule is full or closed".into()));
    }
    schedule.accepted_workers_count += 1;
    if schedule.is_full() {
        schedule.status = ScheduleStatus::Closed;
    }
    schedule.updated_at = now;
    Ok(())
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn insert_user(&self, mut user: User) -> AppResult<User> {
        let mut state = self.write()?;
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
        let id = user.id.unwrap_or_else(ObjectId::new);
        user.id = Some(id);
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_listing(&self, mut listing: Listing) -> AppResult<Listing> {
        let id = listing.id.unwrap_or_else(ObjectId::new);
        listing.id = Some(id);
        self.write()?.listings.insert(id, listing.clone());
        Ok(listing)
    }

    async fn find_listing(&self, id: &ObjectId) -> AppResult<Option<Listing>> {
        Ok(self.read()?.listings.get(id).cloned())
    }

    async fn list_listings(&self, filter: &ListingFilter) -> AppResult<Vec<Listing>> {
        let listings = self
            .read()?
            .listings
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        Ok(newest_first(listings, |l| (l.created_at, l.id)))
    }

    async fn replace_listing(&self, listing: &Listing, expected_quantity: f64) -> AppResult<bool> {
        let id = listing
            .id
            .ok_or_else(|| AppError::Internal("listing without id".into()))?;
        let mut state = self.write()?;
        match state.listings.get_mut(&id) {
            Some(current)
                if current.farmer_id == listing.farmer_id
                    && current.quantity_in_tons == expected_quantity =>
            {
                *current = listing.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_listing(&self, id: &ObjectId, farmer_id: &ObjectId) -> AppResult<bool> {
        let mut state = self.write()?;
        let owned = state
            .listings
            .get(id)
            .map_or(false, |l| &l.farmer_id == farmer_id);
        if owned {
            state.listings.remove(id);
        }
        Ok(owned)
    }

    async fn expire_listings(&self, now: i64) -> AppResult<u64> {
        let mut state = self.write()?;
        let mut expired = 0;
        for listing in state.listings.values_mut() {
            if listing.status == ListingStatus::Active
                && listing.expires_at.map_or(false, |at| at <= now)
            {
                listing.status = ListingStatus::Expired;
                listing.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn insert_order(&self, mut order: Order) -> AppResult<Order> {
        let id = order.id.unwrap_or_else(ObjectId::new);
        order.id = Some(id);
        self.write()?.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: &ObjectId) -> AppResult<Option<Order>> {
        Ok(self.read()?.orders.get(id).cloned())
    }

    async fn orders_by_seller(&self, seller_id: &ObjectId) -> AppResult<Vec<Order>> {
        let orders = self
            .read()?
            .orders
            .values()
            .filter(|o| &o.seller_id == seller_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| (o.created_at, o.id)))
    }

    async fn orders_by_buyer(&self, buyer_id: &ObjectId) -> AppResult<Vec<Order>> {
        let orders = self
            .read()?
            .orders
            .values()
            .filter(|o| &o.buyer_id == buyer_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| (o.created_at, o.id)))
    }

    async fn transition_order(
        &self,
        id: &ObjectId,
        from: OrderStatus,
        to: OrderStatus,
        now: i64,
    ) -> AppResult<Option<Order>> {
        let mut state = self.write()?;
        match state.orders.get_mut(id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = now;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn commit_acceptance(&self, acceptance: &Acceptance) -> AppResult<Order> {
        let mut state = self.write()?;

        #[cfg(test)]
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseError("injected commit failure".into()));
        }

        // Validate both guards before touching anything
        let order_pending = state
            .orders
            .get(&acceptance.order_id)
            .map_or(false, |o| o.status == OrderStatus::Pending);
        if !order_pending {
            return Err(AppError::Conflict("Order is no longer pending".into()));
        }
        let listing_unchanged = state.listings.get(&acceptance.listing_id).map_or(false, |l| {
            l.status == ListingStatus::Active && l.quantity_in_tons == acceptance.expected_quantity
        });
        if !listing_unchanged {
            return Err(AppError::Conflict(
                "Listing changed or is no longer active, please retry".into(),
            ));
        }

        match acceptance.listing_change {
            ListingChange::Remove => {
                state.listings.remove(&acceptance.listing_id);
            }
            ListingChange::SetQuantity(quantity) => {
                if let Some(listing) = state.listings.get_mut(&acceptance.listing_id) {
                    listing.quantity_in_tons = quantity;
                    listing.updated_at = acceptance.updated_at;
                }
            }
        }

        let order = state
            .orders
            .get_mut(&acceptance.order_id)
            .ok_or_else(|| AppError::Internal("order vanished during commit".into()))?;
        order.status = OrderStatus::Accepted;
        order.order_details.quantity_wanted = acceptance.fulfilled_quantity;
        order.order_details.total_amount = acceptance.total_amount;
        order.is_partial_fulfillment = acceptance.is_partial;
        order.original_quantity_requested = acceptance.original_quantity_requested;
        order.updated_at = acceptance.updated_at;
        Ok(order.clone())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_schedule(&self, mut schedule: Schedule) -> AppResult<Schedule> {
        let id = schedule.id.unwrap_or_else(ObjectId::new);
        schedule.id = Some(id);
        self.write()?.schedules.insert(id, schedule.clone());
        Ok(schedule)
    }

    async fn find_schedule(&self, id: &ObjectId) -> AppResult<Option<Schedule>> {
        Ok(self.read()?.schedules.get(id).cloned())
    }

    async fn list_schedules(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>> {
        let schedules = self
            .read()?
            .schedules
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(newest_first(schedules, |s| (s.created_at, s.id)))
    }

    async fn set_schedule_status(
        &self,
        id: &ObjectId,
        hhm_id: &ObjectId,
        status: ScheduleStatus,
        now: i64,
    ) -> AppResult<Option<Schedule>> {
        let mut state = self.write()?;
        match state.schedules.get_mut(id) {
            Some(schedule) if &schedule.hhm_id == hhm_id => {
                schedule.status = status;
                schedule.updated_at = now;
                Ok(Some(schedule.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_application(&self, mut application: Application) -> AppResult<Application> {
        let mut state = self.write()?;
        let duplicate = state.applications.values().any(|a| {
            a.schedule_id == application.schedule_id && a.worker_id == application.worker_id
        });
        if duplicate {
            return Err(AppError::Conflict(
                "You have already applied to this schedule".into(),
            ));
        }
        let schedule = state
            .schedules
            .get_mut(&application.schedule_id)
            .ok_or_else(|| AppError::NotFound("Schedule not found".into()))?;
        schedule.applications_count += 1;

        let id = application.id.unwrap_or_else(ObjectId::new);
        application.id = Some(id);
        state.applications.insert(id, application.clone());
        Ok(application)
    }

    async fn find_application(&self, id: &ObjectId) -> AppResult<Option<Application>> {
        Ok(self.read()?.applications.get(id).cloned())
    }

    async fn applications_for_schedule(&self, schedule_id: &ObjectId) -> AppResult<Vec<Application>> {
        let applications = self
            .read()?
            .applications
            .values()
            .filter(|a| &a.schedule_id == schedule_id)
            .cloned()
            .collect();
        Ok(newest_first(applications, |a| (a.created_at, a.id)))
    }

    async fn applications_for_worker(&self, worker_id: &ObjectId) -> AppResult<Vec<Application>> {
        let applications = self
            .read()?
            .applications
            .values()
            .filter(|a| &a.worker_id == worker_id)
            .cloned()
            .collect();
        Ok(newest_first(applications, |a| (a.created_at, a.id)))
    }

    async fn set_application_status(
        &self,
        id: &ObjectId,
        from: ApplicationStatus,
        to: ApplicationStatus,
        now: i64,
    ) -> AppResult<Option<Application>> {
        let mut state = self.write()?;
        match state.applications.get_mut(id) {
            Some(application) if application.status == from => {
                application.status = to;
                application.updated_at = now;
                Ok(Some(application.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn approve_application(&self, id: &ObjectId, now: i64) -> AppResult<(Application, Schedule)> {
        let mut state = self.write()?;
        let MemoryState {
            applications,
            schedules,
            ..
        } = &mut *state;

        let application = match applications.get_mut(id) {
            Some(a) if a.status == ApplicationStatus::Pending => a,
            _ => return Err(AppError::Conflict("Application is no longer pending".into())),
        };
        let schedule = schedules
            .get_mut(&application.schedule_id)
            .ok_or_else(|| AppError::NotFound("Schedule not found".into()))?;

        take_seat(schedule, now)?;
        application.status = ApplicationStatus::Approved;
        application.updated_at = now;
        Ok((application.clone(), schedule.clone()))
    }

    async fn insert_invitation(&self, mut invitation: Invitation) -> AppResult<Invitation> {
        let id = invitation.id.unwrap_or_else(ObjectId::new);
        invitation.id = Some(id);
        self.write()?.invitations.insert(id, invitation.clone());
        Ok(invitation)
    }

    async fn find_invitation(&self, id: &ObjectId) -> AppResult<Option<Invitation>> {
        Ok(self.read()?.invitations.get(id).cloned())
    }

    async fn invitations_for_worker(&self, worker_id: &ObjectId) -> AppResult<Vec<Invitation>> {
        let invitations = self
            .read()?
            .invitations
            .values()
            .filter(|i| &i.worker_id == worker_id)
            .cloned()
            .collect();
        Ok(newest_first(invitations, |i| (i.created_at, i.id)))
    }

    async fn invitations_for_hhm(&self, hhm_id: &ObjectId) -> AppResult<Vec<Invitation>> {
        let invitations = self
            .read()?
            .invitations
            .values()
            .filter(|i| &i.hhm_id == hhm_id)
            .cloned()
            .collect();
        Ok(newest_first(invitations, |i| (i.created_at, i.id)))
    }

    async fn set_invitation_status(
        &self,
        id: &ObjectId,
        from: InvitationStatus,
        to: InvitationStatus,
        now: i64,
    ) -> AppResult<Option<Invitation>> {
        let mut state = self.write()?;
        match state.invitations.get_mut(id) {
            Some(invitation) if invitation.status == from => {
                invitation.status = to;
                invitation.updated_at = now;
                Ok(Some(invitation.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn accept_invitation(&self, id: &ObjectId, now: i64) -> AppResult<(Invitation, Schedule)> {
        let mut state = self.write()?;
        let MemoryState {
            invitations,
            schedules,
            ..
        } = &mut *state;

        let invitation = match invitations.get_mut(id) {
            Some(i) if i.status == InvitationStatus::Pending => i,
            _ => return Err(AppError::Conflict("Invitation is no longer pending".into())),
        };
        let schedule_id = invitation
            .schedule_id
            .ok_or_else(|| AppError::InvalidRequest("Invitation is not bound to a schedule".into()))?;
        let schedule = schedules
            .get_mut(&schedule_id)
            .ok_or_else(|| AppError::NotFound("Schedule not found".into()))?;

        take_seat(schedule, now)?;
        invitation.status = InvitationStatus::Accepted;
        invitation.updated_at = now;
        Ok((invitation.clone(), schedule.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderDetails;

    fn listing(farmer: ObjectId, quantity: f64) -> Listing {
        Listing {
            id: None,
            farmer_id: farmer,
            crop_type: "sugarcane".into(),
            variety: None,
            quantity_in_tons: quantity,
            expected_price_per_ton: 3000.0,
            location: "Kolhapur".into(),
            description: None,
            harvest_date: None,
            expires_at: None,
            status: ListingStatus::Active,
            created_at: 1,
            updated_at: 1,
        }
    }

    fn order(listing: &Listing, buyer: ObjectId, quantity: f64) -> Order {
        Order {
            id: None,
            listing_id: listing.id.unwrap(),
            seller_id: listing.farmer_id,
            buyer_id: buyer,
            crop_type: listing.crop_type.clone(),
            status: OrderStatus::Pending,
            order_details: OrderDetails {
                quantity_wanted: quantity,
                price_per_ton: listing.expected_price_per_ton,
                total_amount: quantity * listing.expected_price_per_ton,
                delivery_location: None,
                notes: None,
            },
            is_partial_fulfillment: false,
            original_quantity_requested: None,
            created_at: 1,
            updated_at: 1,
        }
    }

    fn acceptance(order: &Order, expected: f64, change: ListingChange) -> Acceptance {
        Acceptance {
            order_id: order.id.unwrap(),
            listing_id: order.listing_id,
            expected_quantity: expected,
            listing_change: change,
            fulfilled_quantity: 10.0,
            total_amount: 30000.0,
            is_partial: false,
            original_quantity_requested: None,
            updated_at: 2,
        }
    }

    #[tokio::test]
    async fn test_stale_listing_guard_mutates_nothing() {
        let store = MemoryStore::new();
        let farmer = ObjectId::new();
        let l = store.insert_listing(listing(farmer, 40.0)).await.unwrap();
        let o = store.insert_order(order(&l, ObjectId::new(), 10.0)).await.unwrap();

        let stale = acceptance(&o, 50.0, ListingChange::SetQuantity(40.0));
        let err = store.commit_acceptance(&stale).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let l_after = store.find_listing(&l.id.unwrap()).await.unwrap().unwrap();
        let o_after = store.find_order(&o.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(l_after.quantity_in_tons, 40.0);
        assert_eq!(o_after.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_commit_rejects_listing_expired_after_read() {
        let store = MemoryStore::new();
        let mut due = listing(ObjectId::new(), 40.0);
        due.expires_at = Some(10);
        let l = store.insert_listing(due).await.unwrap();
        let o = store.insert_order(order(&l, ObjectId::new(), 10.0)).await.unwrap();

        // sweeper runs between the read in accept_order and the commit
        assert_eq!(store.expire_listings(100).await.unwrap(), 1);

        let err = store
            .commit_acceptance(&acceptance(&o, 40.0, ListingChange::SetQuantity(30.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let l_after = store.find_listing(&l.id.unwrap()).await.unwrap().unwrap();
        let o_after = store.find_order(&o.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(l_after.status, ListingStatus::Expired);
        assert_eq!(l_after.quantity_in_tons, 40.0);
        assert_eq!(o_after.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_commit_rejects_non_pending_order() {
        let store = MemoryStore::new();
        let l = store.insert_listing(listing(ObjectId::new(), 40.0)).await.unwrap();
        let o = store.insert_order(order(&l, ObjectId::new(), 10.0)).await.unwrap();
        store
            .transition_order(&o.id.unwrap(), OrderStatus::Pending, OrderStatus::Rejected, 2)
            .await
            .unwrap();

        let err = store
            .commit_acceptance(&acceptance(&o, 40.0, ListingChange::SetQuantity(30.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let l_after = store.find_listing(&l.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(l_after.quantity_in_tons, 40.0);
    }

    #[tokio::test]
    async fn test_remove_deletes_listing_and_accepts_order() {
        let store = MemoryStore::new();
        let l = store.insert_listing(listing(ObjectId::new(), 10.0)).await.unwrap();
        let o = store.insert_order(order(&l, ObjectId::new(), 10.0)).await.unwrap();

        let accepted = store
            .commit_acceptance(&acceptance(&o, 10.0, ListingChange::Remove))
            .await
            .unwrap();
        assert_eq!(accepted.status, OrderStatus::Accepted);
        assert!(store.find_listing(&l.id.unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_guard() {
        let store = MemoryStore::new();
        let l = store.insert_listing(listing(ObjectId::new(), 10.0)).await.unwrap();
        let o = store.insert_order(order(&l, ObjectId::new(), 10.0)).await.unwrap();
        let id = o.id.unwrap();

        let moved = store
            .transition_order(&id, OrderStatus::Accepted, OrderStatus::Completed, 2)
            .await
            .unwrap();
        assert!(moved.is_none());
        let moved = store
            .transition_order(&id, OrderStatus::Pending, OrderStatus::Cancelled, 2)
            .await
            .unwrap();
        assert_eq!(moved.unwrap().status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        let user = User {
            id: None,
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password_hash: "x".into(),
            role: crate::models::Role::Farmer,
            phone: None,
            location: None,
            attributes: HashMap::new(),
            created_at: 1,
            updated_at: 1,
        };
        store.insert_user(user.clone()).await.unwrap();
        let mut again = user;
        again.email = "ASHA@example.com".into();
        assert!(matches!(
            store.insert_user(again).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_listings_only_touches_due_active_listings() {
        let store = MemoryStore::new();
        let farmer = ObjectId::new();
        let mut due = listing(farmer, 5.0);
        due.expires_at = Some(100);
        let mut later = listing(farmer, 5.0);
        later.expires_at = Some(500);
        let never = listing(farmer, 5.0);
        let due = store.insert_listing(due).await.unwrap();
        store.insert_listing(later).await.unwrap();
        store.insert_listing(never).await.unwrap();

        assert_eq!(store.expire_listings(200).await.unwrap(), 1);
        let due = store.find_listing(&due.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(due.status, ListingStatus::Expired);
        assert_eq!(store.expire_listings(200).await.unwrap(), 0);
    }
}
