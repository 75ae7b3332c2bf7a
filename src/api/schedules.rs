use crate::{
    api::{now, AppState},
    middleware::auth::Claims,
    models::{
        Application, ApplicationResponse, ApplyRequest, CreateInvitationRequest,
        CreateScheduleRequest, DecideApplicationRequest, Invitation, InvitationResponse,
        RespondInvitationRequest, Role, Schedule, ScheduleResponse, UpdateScheduleStatusRequest,
    },
    services::{order_service::parse_object_id, schedule_service},
    utils::AppError,
};
use actix_web::{web, HttpResponse};

// ==================== SCHEDULES / APPLICATIONS / INVITATIONS ====================

fn schedule_list(schedules: Vec<Schedule>) -> HttpResponse {
    let data: Vec<ScheduleResponse> = schedules.into_iter().map(ScheduleResponse::from).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data
    }))
}

fn application_list(applications: Vec<Application>) -> HttpResponse {
    let data: Vec<ApplicationResponse> =
        applications.into_iter().map(ApplicationResponse::from).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data
    }))
}

fn invitation_list(invitations: Vec<Invitation>) -> HttpResponse {
    let data: Vec<InvitationResponse> =
        invitations.into_iter().map(InvitationResponse::from).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": data.len(),
        "data": data
    }))
}

#[utoipa::path(
    post,
    path = "/api/schedules",
    tag = "Schedules",
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule posted", body = ScheduleResponse),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Only HHMs post schedules")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_schedule(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    request: web::Json<CreateScheduleRequest>,
) -> Result<HttpResponse, AppError> {
    let hhm_id = user.require_role(&[Role::Hhm])?;
    log::info!("📅 POST /schedules - hhm {}", hhm_id.to_hex());

    let schedule =
        schedule_service::create_schedule(&*state.jobs, hhm_id, request.into_inner(), now()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Schedule created",
        "data": ScheduleResponse::from(schedule)
    })))
}

#[utoipa::path(
    get,
    path = "/api/schedules",
    tag = "Schedules",
    responses((status = 200, description = "Open schedules")),
    security(("bearer_auth" = []))
)]
pub async fn open_schedules(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let schedules = schedule_service::open_schedules(&*state.jobs).await?;
    Ok(schedule_list(schedules))
}

#[utoipa::path(
    get,
    path = "/api/schedules/mine",
    tag = "Schedules",
    responses((status = 200, description = "Schedules posted by the authenticated HHM")),
    security(("bearer_auth" = []))
)]
pub async fn my_schedules(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let hhm_id = user.require_role(&[Role::Hhm])?;
    let schedules = schedule_service::hhm_schedules(&*state.jobs, hhm_id).await?;
    Ok(schedule_list(schedules))
}

#[utoipa::path(
    get,
    path = "/api/schedules/{id}",
    tag = "Schedules",
    params(("id" = String, Path, description = "Schedule ObjectId")),
    responses(
        (status = 200, description = "Schedule", body = ScheduleResponse),
        (status = 404, description = "Schedule not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_schedule(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let schedule_id = parse_object_id(&path, "schedule")?;
    let schedule = schedule_service::get_schedule(&*state.jobs, &schedule_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": ScheduleResponse::from(schedule)
    })))
}

#[utoipa::path(
    put,
    path = "/api/schedules/{id}/status",
    tag = "Schedules",
    params(("id" = String, Path, description = "Schedule ObjectId")),
    request_body = UpdateScheduleStatusRequest,
    responses(
        (status = 200, description = "Schedule status changed", body = ScheduleResponse),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_schedule_status(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateScheduleStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let hhm_id = user.require_role(&[Role::Hhm])?;
    let schedule_id = parse_object_id(&path, "schedule")?;
    let schedule =
        schedule_service::set_schedule_status(&*state.jobs, hhm_id, &schedule_id, request.status, now())
            .await?;
    log::info!("📅 Schedule {} is now {}", schedule_id.to_hex(), schedule.status.as_str());
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Schedule {}", schedule.status.as_str()),
        "data": ScheduleResponse::from(schedule)
    })))
}

#[utoipa::path(
    post,
    path = "/api/schedules/{id}/applications",
    tag = "Applications",
    params(("id" = String, Path, description = "Schedule ObjectId")),
    request_body = ApplyRequest,
    responses(
        (status = 201, description = "Application submitted", body = ApplicationResponse),
        (status = 400, description = "Schedule closed or full"),
        (status = 409, description = "Already applied")
    ),
    security(("bearer_auth" = []))
)]
pub async fn apply(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: Option<web::Json<ApplyRequest>>,
) -> Result<HttpResponse, AppError> {
    let worker_id = user.require_role(&[Role::Worker])?;
    let schedule_id = parse_object_id(&path, "schedule")?;
    log::info!("👷 Worker {} applying to schedule {}", worker_id.to_hex(), schedule_id.to_hex());

    let request = request.map(web::Json::into_inner).unwrap_or_default();
    let application =
        schedule_service::apply(&*state.jobs, worker_id, &schedule_id, request, now()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Application submitted",
        "data": ApplicationResponse::from(application)
    })))
}

#[utoipa::path(
    get,
    path = "/api/schedules/{id}/applications",
    tag = "Applications",
    params(("id" = String, Path, description = "Schedule ObjectId")),
    responses(
        (status = 200, description = "Applications for the schedule"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = []))
)]
pub async fn schedule_applications(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let hhm_id = user.require_role(&[Role::Hhm])?;
    let schedule_id = parse_object_id(&path, "schedule")?;
    let applications =
        schedule_service::schedule_applications(&*state.jobs, hhm_id, &schedule_id).await?;
    Ok(application_list(applications))
}

#[utoipa::path(
    get,
    path = "/api/applications/mine",
    tag = "Applications",
    responses((status = 200, description = "Applications of the authenticated worker")),
    security(("bearer_auth" = []))
)]
pub async fn my_applications(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let worker_id = user.require_role(&[Role::Worker])?;
    let applications = schedule_service::worker_applications(&*state.jobs, worker_id).await?;
    Ok(application_list(applications))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}/status",
    tag = "Applications",
    params(("id" = String, Path, description = "Application ObjectId")),
    request_body = DecideApplicationRequest,
    responses(
        (status = 200, description = "Application decided", body = ApplicationResponse),
        (status = 400, description = "Application already decided"),
        (status = 409, description = "Schedule is full or closed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn decide_application(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<DecideApplicationRequest>,
) -> Result<HttpResponse, AppError> {
    let hhm_id = user.require_role(&[Role::Hhm])?;
    let application_id = parse_object_id(&path, "application")?;

    let (application, schedule) = schedule_service::decide_application(
        &*state.jobs,
        hhm_id,
        &application_id,
        request.status,
        now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Application {}", application.status.as_str()),
        "data": ApplicationResponse::from(application),
        "schedule": schedule.map(ScheduleResponse::from)
    })))
}

#[utoipa::path(
    post,
    path = "/api/invitations",
    tag = "Invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation sent", body = InvitationResponse),
        (status = 400, description = "Target is not a worker or schedule closed"),
        (status = 404, description = "Worker or schedule not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn invite(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    request: web::Json<CreateInvitationRequest>,
) -> Result<HttpResponse, AppError> {
    let hhm_id = user.require_role(&[Role::Hhm])?;
    let invitation = schedule_service::invite(
        &*state.jobs,
        &*state.market,
        hhm_id,
        request.into_inner(),
        now(),
    )
    .await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Invitation sent",
        "data": InvitationResponse::from(invitation)
    })))
}

#[utoipa::path(
    get,
    path = "/api/invitations/mine",
    tag = "Invitations",
    responses((status = 200, description = "Invitations received (worker) or sent (HHM)")),
    security(("bearer_auth" = []))
)]
pub async fn my_invitations(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.require_role(&[Role::Worker, Role::Hhm])?;
    let invitations = schedule_service::my_invitations(&*state.jobs, user_id, user.role).await?;
    Ok(invitation_list(invitations))
}

#[utoipa::path(
    put,
    path = "/api/invitations/{id}/respond",
    tag = "Invitations",
    params(("id" = String, Path, description = "Invitation ObjectId")),
    request_body = RespondInvitationRequest,
    responses(
        (status = 200, description = "Invitation answered", body = InvitationResponse),
        (status = 400, description = "Invitation already answered"),
        (status = 409, description = "Schedule is full or closed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn respond_invitation(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<RespondInvitationRequest>,
) -> Result<HttpResponse, AppError> {
    let worker_id = user.require_role(&[Role::Worker])?;
    let invitation_id = parse_object_id(&path, "invitation")?;

    let (invitation, schedule) = schedule_service::respond_invitation(
        &*state.jobs,
        worker_id,
        &invitation_id,
        request.status,
        now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Invitation {}", invitation.status.as_str()),
        "data": InvitationResponse::from(invitation),
        "schedule": schedule.map(ScheduleResponse::from)
    })))
}
