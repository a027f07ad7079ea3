//! LeaderboardService: catalog, record write and listing endpoints
//!
//! Endpoints:
//! - POST /ladder.LeaderboardService/CreateLeaderboard
//! - POST /ladder.LeaderboardService/GetLeaderboards
//! - POST /ladder.LeaderboardService/ListLeaderboards
//! - POST /ladder.LeaderboardService/DeleteLeaderboard
//! - POST /ladder.LeaderboardService/DisableRanks
//! - POST /ladder.LeaderboardService/EnableRanks
//! - POST /ladder.LeaderboardService/WriteRecord
//! - POST /ladder.LeaderboardService/DeleteRecord
//! - POST /ladder.LeaderboardService/ListRecords
//! - POST /ladder.LeaderboardService/ListRecordsAroundOwner
//! - POST /ladder.LeaderboardService/CursorFromRank
//! - POST /ladder.LeaderboardService/GetEpoch

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use ladder_core::engine::{HaystackQuery, ListRecords, RecordPage, WriteRecord};
use ladder_core::{
    DecrementFloor, EpochState, LeaderboardConfig, LeaderboardRecord, Operator,
    OverrideOperator, SortOrder, TournamentSettings,
};

use super::error::ApiResult;
use super::ApiState;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/ladder.LeaderboardService/CreateLeaderboard",
            post(create_leaderboard),
        )
        .route(
            "/ladder.LeaderboardService/GetLeaderboards",
            post(get_leaderboards),
        )
        .route(
            "/ladder.LeaderboardService/ListLeaderboards",
            post(list_leaderboards),
        )
        .route(
            "/ladder.LeaderboardService/DeleteLeaderboard",
            post(delete_leaderboard),
        )
        .route("/ladder.LeaderboardService/DisableRanks", post(disable_ranks))
        .route("/ladder.LeaderboardService/EnableRanks", post(enable_ranks))
        .route("/ladder.LeaderboardService/WriteRecord", post(write_record))
        .route("/ladder.LeaderboardService/DeleteRecord", post(delete_record))
        .route("/ladder.LeaderboardService/ListRecords", post(list_records))
        .route(
            "/ladder.LeaderboardService/ListRecordsAroundOwner",
            post(list_records_around_owner),
        )
        .route(
            "/ladder.LeaderboardService/CursorFromRank",
            post(cursor_from_rank),
        )
        .route("/ladder.LeaderboardService/GetEpoch", post(get_epoch))
}

// ============================================================================
// Shared DTOs
// ============================================================================

/// Config as seen by clients; metadata travels as a UTF-8 string.
#[derive(Serialize)]
pub struct LeaderboardDto {
    pub id: String,
    pub sort_order: SortOrder,
    pub operator: Operator,
    pub authoritative: bool,
    pub reset_schedule: Option<String>,
    pub metadata: String,
    pub enable_ranks: bool,
    pub decrement_floor: DecrementFloor,
    pub create_time: i64,
    pub tournament: Option<TournamentSettings>,
}

impl From<&LeaderboardConfig> for LeaderboardDto {
    fn from(cfg: &LeaderboardConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            sort_order: cfg.sort_order,
            operator: cfg.operator,
            authoritative: cfg.authoritative,
            reset_schedule: cfg.reset_schedule.clone(),
            metadata: String::from_utf8_lossy(&cfg.metadata).into_owned(),
            enable_ranks: cfg.enable_ranks,
            decrement_floor: cfg.decrement_floor,
            create_time: cfg.create_time,
            tournament: cfg.tournament.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct RecordDto {
    pub leaderboard_id: String,
    pub owner_id: String,
    pub username: Option<String>,
    pub score: i64,
    pub subscore: i64,
    pub num_score: i32,
    pub max_num_score: i32,
    pub metadata: String,
    pub create_time: i64,
    pub update_time: i64,
    pub expiry_time: Option<i64>,
    pub rank: Option<i64>,
}

impl From<LeaderboardRecord> for RecordDto {
    fn from(r: LeaderboardRecord) -> Self {
        Self {
            metadata: String::from_utf8_lossy(&r.metadata).into_owned(),
            leaderboard_id: r.leaderboard_id,
            owner_id: r.owner_id,
            username: r.username,
            score: r.score,
            subscore: r.subscore,
            num_score: r.num_score,
            max_num_score: r.max_num_score,
            create_time: r.create_time,
            update_time: r.update_time,
            expiry_time: r.expiry_time,
            rank: r.rank,
        }
    }
}

#[derive(Serialize)]
pub struct RecordPageDto {
    pub records: Vec<RecordDto>,
    pub owner_records: Vec<RecordDto>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub rank_count: i64,
}

impl From<RecordPage> for RecordPageDto {
    fn from(page: RecordPage) -> Self {
        Self {
            records: page.records.into_iter().map(RecordDto::from).collect(),
            owner_records: page.owner_records.into_iter().map(RecordDto::from).collect(),
            next_cursor: page.next_cursor,
            prev_cursor: page.prev_cursor,
            rank_count: page.rank_count,
        }
    }
}

#[derive(Serialize)]
pub struct Empty {}

#[derive(Deserialize)]
pub struct IdRequest {
    pub id: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Shared by leaderboard and tournament creation. Enum fields accept the
/// usual string aliases (`asc`, `incr`, ...); blank means the default.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ConfigFields {
    pub sort_order: String,
    pub operator: String,
    pub reset_schedule: Option<String>,
    pub metadata: String,
    pub enable_ranks: Option<bool>,
    pub decrement_floor: String,
    pub authoritative: bool,
}

impl ConfigFields {
    pub fn into_config(self, id: String) -> ladder_core::Result<LeaderboardConfig> {
        let mut cfg = LeaderboardConfig::new(id)
            .with_sort_order(self.sort_order.parse()?)
            .with_operator(self.operator.parse()?)
            .with_ranks(self.enable_ranks.unwrap_or(true));
        cfg.reset_schedule = self.reset_schedule;
        cfg.metadata = self.metadata.into_bytes();
        cfg.decrement_floor = self.decrement_floor.parse()?;
        cfg.authoritative = self.authoritative;
        Ok(cfg)
    }
}

#[derive(Deserialize)]
pub struct CreateLeaderboardRequest {
    pub id: String,
    #[serde(flatten)]
    pub fields: ConfigFields,
}

#[derive(Serialize)]
pub struct CreateLeaderboardResponse {
    pub leaderboard: LeaderboardDto,
    pub created: bool,
}

#[derive(Deserialize)]
pub struct GetLeaderboardsRequest {
    pub ids: Vec<String>,
}

#[derive(Serialize)]
pub struct LeaderboardListResponse {
    pub leaderboards: Vec<LeaderboardDto>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct ListLeaderboardsRequest {
    #[serde(default = "default_catalog_limit")]
    pub limit: usize,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_catalog_limit() -> usize {
    10
}

#[derive(Deserialize)]
pub struct WriteRecordRequest {
    pub leaderboard_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub score: i64,
    #[serde(default)]
    pub subscore: i64,
    #[serde(default)]
    pub metadata: Option<String>,
    /// Per-write operator; blank or `no_override` uses the config's.
    #[serde(default)]
    pub operator: String,
}

#[derive(Deserialize)]
pub struct DeleteRecordRequest {
    pub leaderboard_id: String,
    pub owner_id: String,
}

#[derive(Deserialize)]
pub struct ListRecordsRequest {
    pub leaderboard_id: String,
    #[serde(default)]
    pub owner_ids: Vec<String>,
    pub limit: usize,
    #[serde(default)]
    pub cursor: Option<String>,
    /// Past epoch to read; 0 = current.
    #[serde(default)]
    pub expiry: i64,
}

#[derive(Deserialize)]
pub struct ListAroundOwnerRequest {
    pub leaderboard_id: String,
    pub owner_id: String,
    pub limit: usize,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub expiry: i64,
}

#[derive(Deserialize)]
pub struct CursorFromRankRequest {
    pub leaderboard_id: String,
    pub rank: i64,
    #[serde(default)]
    pub expiry: i64,
}

#[derive(Serialize)]
pub struct CursorResponse {
    pub cursor: String,
}

#[derive(Serialize)]
pub struct EpochResponse {
    pub leaderboard_id: String,
    pub start: i64,
    pub expiry_time: Option<i64>,
    pub prev_reset: i64,
    pub next_reset: Option<i64>,
    pub previous_expiries: Vec<i64>,
}

impl From<&EpochState> for EpochResponse {
    fn from(state: &EpochState) -> Self {
        Self {
            leaderboard_id: state.leaderboard_id.clone(),
            start: state.current.start,
            expiry_time: state.current.expiry_time(),
            prev_reset: state.prev_reset,
            next_reset: state.next_reset,
            previous_expiries: state.history.clone(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_leaderboard(
    State(state): State<ApiState>,
    Json(req): Json<CreateLeaderboardRequest>,
) -> ApiResult<CreateLeaderboardResponse> {
    let config = req.fields.into_config(req.id)?;
    let (config, created) = state.engine.create_leaderboard(config)?;
    Ok(Json(CreateLeaderboardResponse {
        leaderboard: LeaderboardDto::from(config.as_ref()),
        created,
    }))
}

async fn get_leaderboards(
    State(state): State<ApiState>,
    Json(req): Json<GetLeaderboardsRequest>,
) -> ApiResult<LeaderboardListResponse> {
    let leaderboards = state
        .engine
        .get_leaderboards(&req.ids)
        .iter()
        .map(|cfg| LeaderboardDto::from(cfg.as_ref()))
        .collect();
    Ok(Json(LeaderboardListResponse {
        leaderboards,
        next_cursor: None,
    }))
}

async fn list_leaderboards(
    State(state): State<ApiState>,
    Json(req): Json<ListLeaderboardsRequest>,
) -> ApiResult<LeaderboardListResponse> {
    let page = state
        .engine
        .list_leaderboards(req.limit, req.cursor.as_deref())?;
    Ok(Json(LeaderboardListResponse {
        leaderboards: page
            .configs
            .iter()
            .map(|cfg| LeaderboardDto::from(cfg.as_ref()))
            .collect(),
        next_cursor: page.next_cursor,
    }))
}

async fn delete_leaderboard(
    State(state): State<ApiState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<Empty> {
    state.engine.delete_leaderboard(&req.id)?;
    Ok(Json(Empty {}))
}

async fn disable_ranks(
    State(state): State<ApiState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<Empty> {
    state.engine.disable_ranks(&req.id)?;
    Ok(Json(Empty {}))
}

async fn enable_ranks(
    State(state): State<ApiState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<Empty> {
    state.engine.enable_ranks(&req.id)?;
    Ok(Json(Empty {}))
}

async fn write_record(
    State(state): State<ApiState>,
    Json(req): Json<WriteRecordRequest>,
) -> ApiResult<RecordDto> {
    let operator: OverrideOperator = req.operator.parse()?;
    let mut write = WriteRecord::new(req.leaderboard_id, req.owner_id, req.score)
        .with_subscore(req.subscore)
        .with_operator(operator);
    write.username = req.username;
    write.metadata = req.metadata.map(String::into_bytes);
    let record = state.engine.record_write(write)?;
    Ok(Json(record.into()))
}

async fn delete_record(
    State(state): State<ApiState>,
    Json(req): Json<DeleteRecordRequest>,
) -> ApiResult<Empty> {
    state
        .engine
        .record_delete(&req.leaderboard_id, &req.owner_id)?;
    Ok(Json(Empty {}))
}

async fn list_records(
    State(state): State<ApiState>,
    Json(req): Json<ListRecordsRequest>,
) -> ApiResult<RecordPageDto> {
    let mut list = ListRecords::new(req.leaderboard_id, req.limit)
        .with_cursor(req.cursor)
        .with_expiry(req.expiry);
    list.owner_ids = req.owner_ids;
    let page = state.engine.records_list(list)?;
    Ok(Json(page.into()))
}

async fn list_records_around_owner(
    State(state): State<ApiState>,
    Json(req): Json<ListAroundOwnerRequest>,
) -> ApiResult<RecordPageDto> {
    let page = state.engine.records_haystack(HaystackQuery {
        leaderboard_id: req.leaderboard_id,
        owner_id: req.owner_id,
        limit: req.limit,
        cursor: req.cursor,
        override_expiry: req.expiry,
    })?;
    Ok(Json(page.into()))
}

async fn cursor_from_rank(
    State(state): State<ApiState>,
    Json(req): Json<CursorFromRankRequest>,
) -> ApiResult<CursorResponse> {
    let cursor = state
        .engine
        .cursor_from_rank(&req.leaderboard_id, req.rank, req.expiry)?;
    Ok(Json(CursorResponse { cursor }))
}

async fn get_epoch(
    State(state): State<ApiState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<EpochResponse> {
    let epoch = state.engine.epoch_state(&req.id)?;
    Ok(Json(EpochResponse::from(epoch.as_ref())))
}
