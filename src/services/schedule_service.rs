use crate::{
    models::{
        Application, ApplicationStatus, ApplyRequest, CreateInvitationRequest,
        CreateScheduleRequest, Invitation, InvitationStatus, Role, Schedule, ScheduleStatus,
    },
    services::order_service::parse_object_id,
    store::{JobStore, MarketStore, ScheduleFilter},
    utils::{AppError, AppResult},
};
use mongodb::bson::oid::ObjectId;

pub async fn create_schedule(
    store: &dyn JobStore,
    hhm_id: ObjectId,
    request: CreateScheduleRequest,
    now: i64,
) -> AppResult<Schedule> {
    if request.title.trim().is_empty() {
        return Err(AppError::InvalidRequest("title is required".into()));
    }
    if request.location.trim().is_empty() {
        return Err(AppError::InvalidRequest("location is required".into()));
    }
    if request.required_workers == 0 {
        return Err(AppError::InvalidRequest("requiredWorkers must be at least 1".into()));
    }
    if !request.wage_per_day.is_finite() || request.wage_per_day <= 0.0 {
        return Err(AppError::InvalidRequest("wagePerDay must be greater than zero".into()));
    }

    let schedule = Schedule {
        id: None,
        hhm_id,
        title: request.title.trim().to_string(),
        description: request.description,
        required_skills: request.required_skills,
        wage_per_day: request.wage_per_day,
        required_workers: request.required_workers,
        location: request.location.trim().to_string(),
        start_date: request.start_date,
        end_date: request.end_date,
        status: ScheduleStatus::Open,
        accepted_workers_count: 0,
        applications_count: 0,
        created_at: now,
        updated_at: now,
    };

    let schedule = store.insert_schedule(schedule).await?;
    log::info!(
        "📅 Schedule {} posted ({} workers needed)",
        schedule.id.map(|id| id.to_hex()).unwrap_or_default(),
        schedule.required_workers
    );
    Ok(schedule)
}

pub async fn open_schedules(store: &dyn JobStore) -> AppResult<Vec<Schedule>> {
    let filter = ScheduleFilter {
        hhm_id: None,
        status: Some(ScheduleStatus::Open),
    };
    store.list_schedules(&filter).await
}

pub async fn hhm_schedules(store: &dyn JobStore, hhm_id: ObjectId) -> AppResult<Vec<Schedule>> {
    let filter = ScheduleFilter {
        hhm_id: Some(hhm_id),
        status: None,
    };
    store.list_schedules(&filter).await
}

pub async fn get_schedule(store: &dyn JobStore, schedule_id: &ObjectId) -> AppResult<Schedule> {
    store
        .find_schedule(schedule_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Schedule not found".into()))
}

async fn owned_schedule(store: &dyn JobStore, hhm_id: ObjectId, schedule_id: &ObjectId) -> AppResult<Schedule> {
    let schedule = get_schedule(store, schedule_id).await?;
    if schedule.hhm_id != hhm_id {
        return Err(AppError::Forbidden("This schedule belongs to another HHM".into()));
    }
    Ok(schedule)
}

pub async fn set_schedule_status(
    store: &dyn JobStore,
    hhm_id: ObjectId,
    schedule_id: &ObjectId,
    status: ScheduleStatus,
    now: i64,
) -> AppResult<Schedule> {
    let schedule = owned_schedule(store, hhm_id, schedule_id).await?;
    if status == ScheduleStatus::Open && schedule.is_full() {
        return Err(AppError::InvalidRequest(
            "Schedule is already full and cannot be reopened".into(),
        ));
    }
    store
        .set_schedule_status(schedule_id, &hhm_id, status, now)
        .await?
        .ok_or_else(|| AppError::NotFound("Schedule not found".into()))
}

// ==================== APPLICATIONS ====================

pub async fn apply(
    store: &dyn JobStore,
    worker_id: ObjectId,
    schedule_id: &ObjectId,
    request: ApplyRequest,
    now: i64,
) -> AppResult<Application> {
    let schedule = get_schedule(store, schedule_id).await?;
    if schedule.status != ScheduleStatus::Open || schedule.is_full() {
        return Err(AppError::InvalidRequest(
            "Schedule is not accepting applications".into(),
        ));
    }

    let application = Application {
        id: None,
        schedule_id: *schedule_id,
        worker_id,
        hhm_id: schedule.hhm_id,
        cover_note: request.cover_note,
        status: ApplicationStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    store.insert_application(application).await
}

pub async fn schedule_applications(
    store: &dyn JobStore,
    hhm_id: ObjectId,
    schedule_id: &ObjectId,
) -> AppResult<Vec<Application>> {
    owned_schedule(store, hhm_id, schedule_id).await?;
    store.applications_for_schedule(schedule_id).await
}

pub async fn worker_applications(store: &dyn JobStore, worker_id: ObjectId) -> AppResult<Vec<Application>> {
    store.applications_for_worker(&worker_id).await
}

pub async fn decide_application(
    store: &dyn JobStore,
    hhm_id: ObjectId,
    application_id: &ObjectId,
    decision: ApplicationStatus,
    now: i64,
) -> AppResult<(Application, Option<Schedule>)> {
    let application = store
        .find_application(application_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))?;
    if application.hhm_id != hhm_id {
        return Err(AppError::Forbidden("This application belongs to another HHM".into()));
    }
    if application.status != ApplicationStatus::Pending {
        return Err(AppError::InvalidRequest(format!(
            "Application is already {}",
            application.status.as_str()
        )));
    }

    match decision {
        ApplicationStatus::Pending => Err(AppError::InvalidRequest(
            "Status must be approved or rejected".into(),
        )),
        ApplicationStatus::Approved => {
            let (application, schedule) = store.approve_application(application_id, now).await?;
            log::info!(
                "👷 Application {} approved ({}/{} seats)",
                application_id.to_hex(),
                schedule.accepted_workers_count,
                schedule.required_workers
            );
            Ok((application, Some(schedule)))
        }
        ApplicationStatus::Rejected => {
            let application = store
                .set_application_status(
                    application_id,
                    ApplicationStatus::Pending,
                    ApplicationStatus::Rejected,
                    now,
                )
                .await?
                .ok_or_else(|| AppError::Conflict("Application is no longer pending".into()))?;
            Ok((application, None))
        }
    }
}

// ==================== INVITATIONS ====================

pub async fn invite(
    jobs: &dyn JobStore,
    market: &dyn MarketStore,
    hhm_id: ObjectId,
    request: CreateInvitationRequest,
    now: i64,
) -> AppResult<Invitation> {
    let worker_id = parse_object_id(&request.worker_id, "worker")?;
    let worker = market
        .find_user(&worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Worker not found".into()))?;
    if worker.role != Role::Worker {
        return Err(AppError::InvalidRequest("Invitations can only be sent to workers".into()));
    }

    let schedule_id = match request.schedule_id.as_deref() {
        Some(raw) => {
            let id = parse_object_id(raw, "schedule")?;
            let schedule = owned_schedule(jobs, hhm_id, &id).await?;
            if schedule.status != ScheduleStatus::Open {
                return Err(AppError::InvalidRequest("Schedule is closed".into()));
            }
            Some(id)
        }
        None => None,
    };

    let invitation = Invitation {
        id: None,
        hhm_id,
        worker_id,
        schedule_id,
        message: request.message,
        status: InvitationStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    let invitation = jobs.insert_invitation(invitation).await?;
    log::info!("✉️ Invitation sent to worker {}", worker_id.to_hex());
    Ok(invitation)
}

/// Workers see what they received, HHMs what they sent
pub async fn my_invitations(store: &dyn JobStore, user_id: ObjectId, role: Role) -> AppResult<Vec<Invitation>> {
    match role {
        Role::Worker => store.invitations_for_worker(&user_id).await,
        Role::Hhm => store.invitations_for_hhm(&user_id).await,
        _ => Err(AppError::Forbidden("Only workers and HHMs have invitations".into())),
    }
}

pub async fn respond_invitation(
    store: &dyn JobStore,
    worker_id: ObjectId,
    invitation_id: &ObjectId,
    response: InvitationStatus,
    now: i64,
) -> AppResult<(Invitation, Option<Schedule>)> {
    let invitation = store
        .find_invitation(invitation_id)
        .await?
        .filter(|i| i.worker_id == worker_id)
        .ok_or_else(|| AppError::NotFound("Invitation not found".into()))?;
    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::InvalidRequest(format!(
            "Invitation is already {}",
            invitation.status.as_str()
        )));
    }

    match (response, invitation.schedule_id) {
        (InvitationStatus::Pending, _) => Err(AppError::InvalidRequest(
            "Status must be accepted or declined".into(),
        )),
        (InvitationStatus::Accepted, Some(_)) => {
            let (invitation, schedule) = store.accept_invitation(invitation_id, now).await?;
            Ok((invitation, Some(schedule)))
        }
        (response, _) => {
            let invitation = store
                .set_invitation_status(invitation_id, InvitationStatus::Pending, response, now)
                .await?
                .ok_or_else(|| AppError::Conflict("Invitation is no longer pending".into()))?;
            Ok((invitation, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn schedule_request(workers: u32) -> CreateScheduleRequest {
        CreateScheduleRequest {
            title: "Harvest crew".into(),
            description: "Cutting and loading".into(),
            required_skills: vec!["cutting".into()],
            wage_per_day: 650.0,
            required_workers: workers,
            location: "Baramati".into(),
            start_date: "2026-11-01".into(),
            end_date: "2026-11-20".into(),
        }
    }

    async fn user(store: &MemoryStore, role: Role) -> ObjectId {
        let user = User {
            id: None,
            name: "u".into(),
            email: format!("{}@example.com", ObjectId::new().to_hex()),
            password_hash: String::new(),
            role,
            phone: None,
            location: None,
            attributes: HashMap::new(),
            created_at: 0,
            updated_at: 0,
        };
        store.insert_user(user).await.unwrap().id.unwrap()
    }

    #[tokio::test]
    async fn test_apply_counts_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let hhm = ObjectId::new();
        let worker = ObjectId::new();
        let schedule = create_schedule(&store, hhm, schedule_request(2), 1).await.unwrap();
        let sid = schedule.id.unwrap();

        apply(&store, worker, &sid, ApplyRequest::default(), 2).await.unwrap();
        let dup = apply(&store, worker, &sid, ApplyRequest::default(), 3).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        let schedule = get_schedule(&store, &sid).await.unwrap();
        assert_eq!(schedule.applications_count, 1);
        assert_eq!(schedule_applications(&store, hhm, &sid).await.unwrap().len(), 1);
        assert!(matches!(
            schedule_applications(&store, ObjectId::new(), &sid).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_approvals_respect_capacity_and_close_schedule() {
        let store = MemoryStore::new();
        let hhm = ObjectId::new();
        let schedule = create_schedule(&store, hhm, schedule_request(1), 1).await.unwrap();
        let sid = schedule.id.unwrap();

        let a1 = apply(&store, ObjectId::new(), &sid, ApplyRequest::default(), 2).await.unwrap();
        let a2 = apply(&store, ObjectId::new(), &sid, ApplyRequest::default(), 2).await.unwrap();

        let (approved, schedule) =
            decide_application(&store, hhm, &a1.id.unwrap(), ApplicationStatus::Approved, 3)
                .await
                .unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);
        let schedule = schedule.unwrap();
        assert_eq!(schedule.accepted_workers_count, 1);
        assert_eq!(schedule.status, ScheduleStatus::Closed);

        let second =
            decide_application(&store, hhm, &a2.id.unwrap(), ApplicationStatus::Approved, 4).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
        let a2_after = store.find_application(&a2.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(a2_after.status, ApplicationStatus::Pending);
        assert_eq!(get_schedule(&store, &sid).await.unwrap().accepted_workers_count, 1);

        // closed schedules take no new applications
        let late = apply(&store, ObjectId::new(), &sid, ApplyRequest::default(), 5).await;
        assert!(matches!(late, Err(AppError::InvalidRequest(_))));
        assert!(set_schedule_status(&store, hhm, &sid, ScheduleStatus::Open, 6).await.is_err());
    }

    #[tokio::test]
    async fn test_rejection_and_double_decision() {
        let store = MemoryStore::new();
        let hhm = ObjectId::new();
        let sid = create_schedule(&store, hhm, schedule_request(3), 1).await.unwrap().id.unwrap();
        let app = apply(&store, ObjectId::new(), &sid, ApplyRequest::default(), 2).await.unwrap();
        let app_id = app.id.unwrap();

        let (rejected, schedule) =
            decide_application(&store, hhm, &app_id, ApplicationStatus::Rejected, 3).await.unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
        assert!(schedule.is_none());

        let again = decide_application(&store, hhm, &app_id, ApplicationStatus::Approved, 4).await;
        assert!(matches!(again, Err(AppError::InvalidRequest(_))));

        let stranger = decide_application(&store, ObjectId::new(), &app_id, ApplicationStatus::Approved, 4).await;
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_schedule_validation() {
        let store = MemoryStore::new();
        let result = create_schedule(&store, ObjectId::new(), schedule_request(0), 1).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invitation_flow_takes_a_seat() {
        let store = MemoryStore::new();
        let hhm = user(&store, Role::Hhm).await;
        let worker = user(&store, Role::Worker).await;
        let sid = create_schedule(&store, hhm, schedule_request(2), 1).await.unwrap().id.unwrap();

        let invitation = invite(
            &store,
            &store,
            hhm,
            CreateInvitationRequest {
                worker_id: worker.to_hex(),
                schedule_id: Some(sid.to_hex()),
                message: Some("Join the Baramati crew".into()),
            },
            2,
        )
        .await
        .unwrap();

        assert_eq!(my_invitations(&store, worker, Role::Worker).await.unwrap().len(), 1);
        assert_eq!(my_invitations(&store, hhm, Role::Hhm).await.unwrap().len(), 1);

        let (accepted, schedule) =
            respond_invitation(&store, worker, &invitation.id.unwrap(), InvitationStatus::Accepted, 3)
                .await
                .unwrap();
        assert_eq!(accepted.status, InvitationStatus::Accepted);
        assert_eq!(schedule.unwrap().accepted_workers_count, 1);

        let again =
            respond_invitation(&store, worker, &invitation.id.unwrap(), InvitationStatus::Declined, 4).await;
        assert!(matches!(again, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invitation_requires_worker_and_own_schedule() {
        let store = MemoryStore::new();
        let hhm = user(&store, Role::Hhm).await;
        let farmer = user(&store, Role::Farmer).await;
        let worker = user(&store, Role::Worker).await;
        let foreign = create_schedule(&store, ObjectId::new(), schedule_request(2), 1)
            .await
            .unwrap()
            .id
            .unwrap();

        let to_farmer = invite(
            &store,
            &store,
            hhm,
            CreateInvitationRequest { worker_id: farmer.to_hex(), schedule_id: None, message: None },
            2,
        )
        .await;
        assert!(matches!(to_farmer, Err(AppError::InvalidRequest(_))));

        let foreign_schedule = invite(
            &store,
            &store,
            hhm,
            CreateInvitationRequest {
                worker_id: worker.to_hex(),
                schedule_id: Some(foreign.to_hex()),
                message: None,
            },
            2,
        )
        .await;
        assert!(matches!(foreign_schedule, Err(AppError::Forbidden(_))));

        let open_invite = invite(
            &store,
            &store,
            hhm,
            CreateInvitationRequest { worker_id: worker.to_hex(), schedule_id: None, message: None },
            2,
        )
        .await
        .unwrap();
        let (declined, schedule) =
            respond_invitation(&store, worker, &open_invite.id.unwrap(), InvitationStatus::Declined, 3)
                .await
                .unwrap();
        assert_eq!(declined.status, InvitationStatus::Declined);
        assert!(schedule.is_none());
    }
}
