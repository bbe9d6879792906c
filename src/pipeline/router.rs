use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Actor, Enrollment, Lead, LeadId, LeadStatus, LedgerEntry, LinkToken, Money,
    PaymentMethodId, Role, SellerId, UserId,
};
use super::policy::LimitDecision;
use super::service::{ConversionNotifier, PipelineError, PipelineService};
use super::store::PipelineStore;
use super::transition::TransitionError;

/// Router builder exposing the pipeline operations over HTTP.
pub fn pipeline_router<S, N>(service: Arc<PipelineService<S, N>>) -> Router
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(create_lead_handler::<S, N>))
        .route("/api/v1/leads/:lead_id", get(get_lead_handler::<S, N>))
        .route(
            "/api/v1/leads/:lead_id/history",
            get(history_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/:lead_id/status",
            post(change_status_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/:lead_id/convert",
            post(convert_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/:lead_id/price",
            post(update_price_handler::<S, N>),
        )
        .route("/api/v1/leads/:lead_id/notes", post(note_handler::<S, N>))
        .route(
            "/api/v1/leads/:lead_id/enrollment-link",
            post(issue_link_handler::<S, N>),
        )
        .route(
            "/api/v1/value-limits/check",
            post(limit_check_handler::<S, N>),
        )
        .route("/matricular/:token", post(consume_link_handler::<S, N>))
        .with_state(service)
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::Transition(TransitionError::AlreadyConverted) => StatusCode::CONFLICT,
            PipelineError::Transition(_)
            | PipelineError::Settlement(_)
            | PipelineError::Limit(_)
            | PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Conflict(_) | PipelineError::Concurrency => StatusCode::CONFLICT,
            PipelineError::Denied { .. } => StatusCode::FORBIDDEN,
            PipelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Acting user attached to every mutating request.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorPayload {
    pub id: String,
    pub role: Role,
}

impl ActorPayload {
    fn into_actor(self) -> Actor {
        Actor {
            id: UserId(self.id),
            role: self.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quoted_price_cents: Option<i64>,
    pub actor: ActorPayload,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub target: LeadStatus,
    #[serde(default)]
    pub loss_reason: Option<String>,
    pub actor: ActorPayload,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub payment_method_id: String,
    pub installments: u8,
    pub actor: ActorPayload,
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub enrollment_number: String,
    pub lead: Lead,
    pub enrollment: Enrollment,
    pub ledger_entry: LedgerEntry,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price_cents: i64,
    pub actor: ActorPayload,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: String,
    pub actor: ActorPayload,
}

#[derive(Debug, Deserialize)]
pub struct IssueLinkRequest {
    pub seller_id: String,
    pub actor: ActorPayload,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub token: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LimitCheckRequest {
    pub seller_id: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
}

pub(crate) async fn create_lead_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Json(request): Json<CreateLeadRequest>,
) -> Result<Response, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let actor = request.actor.clone().into_actor();
    let intake = super::domain::NewLead {
        name: request.name,
        email: request.email,
        phone: request.phone,
        seller_id: request.seller_id.map(SellerId),
        course: request.course,
        category: request.category,
        quoted_price: request.quoted_price_cents.map(Money::from_cents),
    };

    let lead = service.create_lead(intake, &actor)?;
    Ok((StatusCode::CREATED, Json(lead)).into_response())
}

pub(crate) async fn get_lead_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
) -> Result<Json<Lead>, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let lead = service.get_lead(&LeadId(lead_id))?;
    Ok(Json(lead))
}

pub(crate) async fn history_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
) -> Result<Response, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let entries = service.history(&LeadId(lead_id))?;
    Ok(Json(entries).into_response())
}

pub(crate) async fn change_status_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<Lead>, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let actor = request.actor.clone().into_actor();
    let lead = service.change_status(
        &LeadId(lead_id),
        request.target,
        &actor,
        request.loss_reason.as_deref(),
    )?;
    Ok(Json(lead))
}

pub(crate) async fn convert_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ConversionResponse>, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let actor = request.actor.clone().into_actor();
    let record = service.convert(
        &LeadId(lead_id),
        &PaymentMethodId(request.payment_method_id),
        request.installments,
        &actor,
    )?;

    Ok(Json(ConversionResponse {
        enrollment_number: record.enrollment.number.to_string(),
        lead: record.lead,
        enrollment: record.enrollment,
        ledger_entry: record.ledger_entry,
    }))
}

pub(crate) async fn update_price_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
    Json(request): Json<UpdatePriceRequest>,
) -> Result<Json<Lead>, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let actor = request.actor.clone().into_actor();
    let lead = service.update_price(
        &LeadId(lead_id),
        Money::from_cents(request.price_cents),
        &actor,
    )?;
    Ok(Json(lead))
}

pub(crate) async fn note_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> Result<StatusCode, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let actor = request.actor.clone().into_actor();
    service.append_note(&LeadId(lead_id), &request.text, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn issue_link_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(lead_id): Path<String>,
    Json(request): Json<IssueLinkRequest>,
) -> Result<Json<LinkResponse>, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let actor = request.actor.clone().into_actor();
    let link = service.issue_link(&LeadId(lead_id), SellerId(request.seller_id), &actor)?;

    Ok(Json(LinkResponse {
        path: link.path(),
        token: link.token.0,
        expires_at: link.expires_at,
    }))
}

pub(crate) async fn limit_check_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Json(request): Json<LimitCheckRequest>,
) -> Result<Response, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let decision = service.check_value_limit(
        &SellerId(request.seller_id),
        request.category.as_deref(),
        Money::from_cents(request.price_cents),
    )?;

    let body = match decision {
        LimitDecision::Accepted => json!({ "ok": true }),
        LimitDecision::Rejected(violation) => json!({
            "ok": false,
            "violated_bound": violation.bound.label(),
            "limit_cents": violation.limit.cents(),
            "offered_cents": violation.offered.cents(),
        }),
    };
    Ok(Json(body).into_response())
}

pub(crate) async fn consume_link_handler<S, N>(
    State(service): State<Arc<PipelineService<S, N>>>,
    Path(token): Path<String>,
) -> Result<Response, PipelineError>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    let link = service.consume_link(&LinkToken(token))?;
    let body = json!({
        "lead_id": link.lead_id.0,
        "used_at": link.used_at,
    });
    Ok(Json(body).into_response())
}
