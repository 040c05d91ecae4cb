//! Weekly check-in handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fitledger_core::{
    CheckinConfigId, CheckinQuestion, CheckinResponse, CheckinState, QuestionId, QuestionKind,
    QuestionResponse, ResponseAnswer, UserId,
};
use fitledger_engine::{AvailableCheckin, CheckinProgress};

use super::parse_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Question as shown to the user.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    /// Question id.
    pub id: i64,
    /// Display order.
    pub position: u32,
    /// Question text.
    pub prompt: String,
    /// Answer format.
    pub kind: QuestionKind,
}

impl From<CheckinQuestion> for QuestionView {
    fn from(question: CheckinQuestion) -> Self {
        Self {
            id: question.id.get(),
            position: question.position,
            prompt: question.prompt,
            kind: question.kind,
        }
    }
}

/// Check-in the user should answer.
#[derive(Debug, Serialize)]
pub struct CheckinView {
    /// Config id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Instance anchor.
    pub week_date: String,
    /// Questions by position.
    pub questions: Vec<QuestionView>,
}

impl From<AvailableCheckin> for CheckinView {
    fn from(checkin: AvailableCheckin) -> Self {
        Self {
            id: checkin.id.get(),
            name: checkin.name,
            week_date: checkin.week_date.to_string(),
            questions: checkin.questions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Available check-in response.
#[derive(Debug, Serialize)]
pub struct AvailableResponse {
    /// The check-in to show, or null.
    pub available_checkin: Option<CheckinView>,
}

/// Get the check-in a user should see on the dashboard.
pub async fn get_available(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<i64>,
) -> Result<Json<AvailableResponse>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let available = state.engine.scheduler().available(user)?;
    Ok(Json(AvailableResponse {
        available_checkin: available.map(CheckinView::from),
    }))
}

/// One answer in request format.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Question answered.
    pub question_id: i64,
    /// Free-text answer.
    pub response_text: Option<String>,
    /// Numeric answer.
    pub response_value: Option<f64>,
}

impl AnswerRequest {
    fn parse(self) -> Result<QuestionResponse, ApiError> {
        let question_id: QuestionId = parse_id("question_id", self.question_id)?;
        let answer = match (self.response_text, self.response_value) {
            (Some(text), None) => ResponseAnswer::Text(text),
            (None, Some(value)) => ResponseAnswer::Value(value),
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "question {question_id}: exactly one of response_text and response_value is required"
                )))
            }
        };
        Ok(QuestionResponse {
            question_id,
            answer,
        })
    }
}

fn parse_answers(answers: Vec<AnswerRequest>) -> Result<Vec<QuestionResponse>, ApiError> {
    answers.into_iter().map(AnswerRequest::parse).collect()
}

/// Submit request.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Submitting user.
    pub user_id: i64,
    /// Answers.
    pub responses: Vec<AnswerRequest>,
}

/// Submit response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Always true; failures are error responses.
    pub success: bool,
    /// Points granted by this submission.
    pub points_awarded: i64,
    /// Balance after the submission.
    pub new_total_points: i64,
    /// Whether this submission completed the week for the first time.
    pub fresh_award: bool,
    /// Instance anchor.
    pub week_date: String,
}

/// Submit a check-in.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(config_id): Path<i64>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        config_id = %config_id,
        user_id = %body.user_id,
        answers = body.responses.len(),
        "Processing check-in submission"
    );

    let config: CheckinConfigId = parse_id("config_id", config_id)?;
    let user: UserId = parse_id("user_id", body.user_id)?;
    let responses = parse_answers(body.responses)?;

    let outcome = state.engine.scheduler().submit(config, user, &responses)?;

    Ok(Json(SubmitResponse {
        success: true,
        points_awarded: outcome.points_awarded,
        new_total_points: outcome.new_total_points,
        fresh_award: outcome.fresh_award,
        week_date: outcome.week_date.to_string(),
    }))
}

/// Saved answer.
#[derive(Debug, Serialize)]
pub struct AnswerView {
    /// Question answered.
    pub question_id: i64,
    /// Free-text answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    /// Numeric answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_value: Option<f64>,
    /// When the answer was saved.
    pub submitted_at: String,
}

impl From<CheckinResponse> for AnswerView {
    fn from(response: CheckinResponse) -> Self {
        let (response_text, response_value) = match response.answer {
            ResponseAnswer::Text(text) => (Some(text), None),
            ResponseAnswer::Value(value) => (None, Some(value)),
        };
        Self {
            question_id: response.question_id.get(),
            response_text,
            response_value,
            submitted_at: response.submitted_at.to_rfc3339(),
        }
    }
}

/// Progress response.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    /// Instance anchor, null before the first instance opens.
    pub week_date: Option<String>,
    /// Latest answer per question.
    pub responses: Vec<AnswerView>,
}

impl From<CheckinProgress> for ProgressResponse {
    fn from(progress: CheckinProgress) -> Self {
        Self {
            week_date: progress.week_date.map(|date| date.to_string()),
            responses: progress.responses.into_iter().map(Into::into).collect(),
        }
    }
}

/// Load autosaved answers for the current instance.
pub async fn load_progress(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((config_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let config: CheckinConfigId = parse_id("config_id", config_id)?;
    let user: UserId = parse_id("user_id", user_id)?;
    let progress = state.engine.scheduler().load_progress(config, user)?;
    Ok(Json(progress.into()))
}

/// Autosave request.
#[derive(Debug, Deserialize)]
pub struct SaveProgressRequest {
    /// Answers to save.
    pub responses: Vec<AnswerRequest>,
}

/// Autosave answers for the current instance.
pub async fn save_progress(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((config_id, user_id)): Path<(i64, i64)>,
    Json(body): Json<SaveProgressRequest>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let config: CheckinConfigId = parse_id("config_id", config_id)?;
    let user: UserId = parse_id("user_id", user_id)?;
    let responses = parse_answers(body.responses)?;
    let progress = state
        .engine
        .scheduler()
        .save_progress(config, user, &responses)?;
    Ok(Json(progress.into()))
}

/// Week status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Config id.
    pub config_id: i64,
    /// Instance anchor, null before the first instance opens.
    pub week_date: Option<String>,
    /// State of the instance.
    pub state: CheckinState,
}

/// State of the current instance for a user.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((config_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<StatusResponse>, ApiError> {
    let config: CheckinConfigId = parse_id("config_id", config_id)?;
    let user: UserId = parse_id("user_id", user_id)?;
    let status = state.engine.scheduler().week_status(config, user)?;
    Ok(Json(StatusResponse {
        config_id: status.config_id.get(),
        week_date: status.week_date.map(|date| date.to_string()),
        state: status.state,
    }))
}
