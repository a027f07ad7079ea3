//! TournamentService: tournament lifecycle endpoints
//!
//! Scores are submitted through `LeaderboardService/WriteRecord`; a
//! tournament id is a leaderboard id.
//!
//! Endpoints:
//! - POST /ladder.TournamentService/CreateTournament
//! - POST /ladder.TournamentService/JoinTournament
//! - POST /ladder.TournamentService/AddAttempt
//! - POST /ladder.TournamentService/GetStatus
//! - POST /ladder.TournamentService/ListTournaments

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use ladder_core::engine::{TournamentFilter, TournamentStatus};
use ladder_core::TournamentSettings;

use super::error::ApiResult;
use super::leaderboard::{ConfigFields, CreateLeaderboardResponse, LeaderboardDto, RecordDto};
use super::ApiState;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/ladder.TournamentService/CreateTournament",
            post(create_tournament),
        )
        .route(
            "/ladder.TournamentService/JoinTournament",
            post(join_tournament),
        )
        .route("/ladder.TournamentService/AddAttempt", post(add_attempt))
        .route("/ladder.TournamentService/GetStatus", post(get_status))
        .route(
            "/ladder.TournamentService/ListTournaments",
            post(list_tournaments),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateTournamentRequest {
    pub id: String,
    #[serde(flatten)]
    pub fields: ConfigFields,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: u8,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub end_time: i64,
    pub duration: i64,
    #[serde(default)]
    pub max_size: u32,
    #[serde(default)]
    pub max_num_score: i32,
    #[serde(default)]
    pub join_required: bool,
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub tournament_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct AddAttemptRequest {
    pub tournament_id: String,
    pub owner_id: String,
    pub count: i32,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub tournament_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Serialize)]
pub struct TournamentDto {
    pub tournament: LeaderboardDto,
    pub status: TournamentStatus,
}

#[derive(Serialize)]
pub struct ListTournamentsResponse {
    pub tournaments: Vec<TournamentDto>,
    pub next_cursor: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_tournament(
    State(state): State<ApiState>,
    Json(req): Json<CreateTournamentRequest>,
) -> ApiResult<CreateLeaderboardResponse> {
    let mut config = req.fields.into_config(req.id)?;
    config.tournament = Some(TournamentSettings {
        title: req.title,
        description: req.description,
        category: req.category,
        start_time: req.start_time,
        end_time: req.end_time,
        duration: req.duration,
        max_size: req.max_size,
        max_num_score: req.max_num_score,
        join_required: req.join_required,
    });
    let (config, created) = state.engine.create_tournament(config)?;
    Ok(Json(CreateLeaderboardResponse {
        leaderboard: LeaderboardDto::from(config.as_ref()),
        created,
    }))
}

async fn join_tournament(
    State(state): State<ApiState>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<RecordDto> {
    let record = state
        .engine
        .tournament_join(&req.tournament_id, &req.owner_id, req.username)?;
    Ok(Json(record.into()))
}

async fn add_attempt(
    State(state): State<ApiState>,
    Json(req): Json<AddAttemptRequest>,
) -> ApiResult<RecordDto> {
    let record = state
        .engine
        .tournament_add_attempt(&req.tournament_id, &req.owner_id, req.count)?;
    Ok(Json(record.into()))
}

async fn get_status(
    State(state): State<ApiState>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<TournamentStatus> {
    let status = state
        .engine
        .tournament_status(&req.tournament_id, req.owner_id.as_deref())?;
    Ok(Json(status))
}

async fn list_tournaments(
    State(state): State<ApiState>,
    Json(filter): Json<TournamentFilter>,
) -> ApiResult<ListTournamentsResponse> {
    let page = state.engine.tournament_list(&filter)?;
    Ok(Json(ListTournamentsResponse {
        tournaments: page
            .tournaments
            .into_iter()
            .map(|entry| TournamentDto {
                tournament: LeaderboardDto::from(entry.config.as_ref()),
                status: entry.status,
            })
            .collect(),
        next_cursor: page.next_cursor,
    }))
}
