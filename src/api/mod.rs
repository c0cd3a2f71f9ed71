use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::db::{get_live_games, init_database};
use crate::error::IngestError;
use crate::models::{ApiResponse, CurrentWeek, Game, GameDetail, TeamSeasonSummary, WeekSchedule};
use crate::services::espn::{refresh_live, EspnFetcher, IngestSummary, SeasonType};
use crate::services::ranking::{recompute_rankings, RankingSummary};
use crate::services::summary::{self, StandingRow};
use crate::services::validation::{season_completeness, CompletenessReport};
use crate::utils::{canonical_team_code, validate_team_code};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub fetcher: Arc<EspnFetcher>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let fetcher = EspnFetcher::new(&config)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
        })
    }

    fn season(&self, explicit: Option<i32>) -> i32 {
        self.config.season_or_default(explicit)
    }
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let pool = init_database(&config.database_url).await?;
    let port = config.port;

    let app = create_router().with_state(AppState::new(pool, config)?);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Gridiron API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/standings", get(standings_handler))
        .route("/teams/{code}", get(team_summary_handler))
        .route("/weeks/current", get(current_week_handler))
        .route("/weeks/{week}", get(week_handler))
        .route("/games/live", get(live_games_handler))
        .route("/games/{id}", get(game_detail_handler))
        .route("/seasons/{season}/completeness", get(completeness_handler))
        .route("/admin/rankings", post(recompute_rankings_handler))
        .route("/admin/live/refresh", post(refresh_live_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

fn internal_error(context: &str, e: anyhow::Error) -> StatusCode {
    tracing::error!("{}: {}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Deserialize)]
struct SeasonQuery {
    season: Option<i32>,
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Gridiron API is running"))
}

// GET /standings?season=
async fn standings_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> Result<Json<ApiResponse<Vec<StandingRow>>>, StatusCode> {
    let season = state.season(params.season);
    summary::standings(&state.pool, season)
        .await
        .map(|rows| Json(ApiResponse::success(rows)))
        .map_err(|e| internal_error("Failed to build standings", e))
}

// GET /teams/{code}?season= - accepts aliases like WSH
async fn team_summary_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<SeasonQuery>,
) -> Result<Json<ApiResponse<TeamSeasonSummary>>, StatusCode> {
    if !validate_team_code(&code) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let season = state.season(params.season);
    let code = canonical_team_code(&code);

    match summary::team_season_summary(&state.pool, &code, season).await {
        Ok(Some(summary)) => Ok(Json(ApiResponse::success(summary))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error("Failed to build team summary", e)),
    }
}

// GET /weeks/current?season=
async fn current_week_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> Result<Json<ApiResponse<CurrentWeek>>, StatusCode> {
    let season = state.season(params.season);
    summary::resolve_current_week(&state.pool, season)
        .await
        .map(|week| Json(ApiResponse::success(week)))
        .map_err(|e| internal_error("Failed to resolve current week", e))
}

// GET /weeks/{week}?season=
async fn week_handler(
    State(state): State<AppState>,
    Path(week): Path<i32>,
    Query(params): Query<SeasonQuery>,
) -> Result<Json<ApiResponse<WeekSchedule>>, StatusCode> {
    let season = state.season(params.season);
    summary::week_schedule(&state.pool, season, week)
        .await
        .map(|schedule| Json(ApiResponse::success(schedule)))
        .map_err(|e| internal_error("Failed to load week", e))
}

// GET /games/live
async fn live_games_handler(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Game>>>, StatusCode> {
    get_live_games(&state.pool)
        .await
        .map(|games| Json(ApiResponse::success(games)))
        .map_err(|e| internal_error("Failed to load live games", e))
}

// GET /games/{id}
async fn game_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<GameDetail>>, StatusCode> {
    match summary::game_detail(&state.pool, &id).await {
        Ok(Some(detail)) => Ok(Json(ApiResponse::success(detail))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error("Failed to load game detail", e)),
    }
}

// GET /seasons/{season}/completeness
async fn completeness_handler(
    State(state): State<AppState>,
    Path(season): Path<i32>,
) -> Result<Json<ApiResponse<CompletenessReport>>, StatusCode> {
    season_completeness(&state.pool, season)
        .await
        .map(|report| Json(ApiResponse::success(report)))
        .map_err(|e| internal_error("Failed to check completeness", e))
}

// POST /admin/rankings?season=
async fn recompute_rankings_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> Result<Json<ApiResponse<RankingSummary>>, StatusCode> {
    let season = state.season(params.season);
    recompute_rankings(&state.pool, season)
        .await
        .map(|summary| Json(ApiResponse::success(summary)))
        .map_err(|e| internal_error("Failed to recompute rankings", e))
}

#[derive(Deserialize)]
struct RefreshQuery {
    season: Option<i32>,
    week: Option<i32>,
    season_type: Option<String>,
}

// POST /admin/live/refresh?season=&week=&season_type=
async fn refresh_live_handler(
    State(state): State<AppState>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<ApiResponse<IngestSummary>>, StatusCode> {
    let season = state.season(params.season);
    let season_type = match params.season_type.as_deref() {
        Some(raw) => raw.parse::<SeasonType>().map_err(|_| StatusCode::BAD_REQUEST)?,
        None => SeasonType::Regular,
    };

    match refresh_live(&state.pool, &state.fetcher, season, season_type, params.week).await {
        Ok(summary) => Ok(Json(ApiResponse::success(summary))),
        Err(e) if e.downcast_ref::<IngestError>().is_some() => {
            tracing::error!("Live refresh failed upstream: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
        Err(e) => Err(internal_error("Live refresh failed", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_game;
    use crate::db::tests::test_pool;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> (Router, SqlitePool) {
        let pool = test_pool().await;
        let kickoff = Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap();
        insert_game(&pool, &Game::new("WAS", "NYG", kickoff, 2025, 1).with_score(21, 6))
            .await
            .unwrap();

        let config = AppConfig {
            season: Some(2025),
            ..AppConfig::default()
        };
        let state = AppState::new(pool.clone(), config).unwrap();
        (create_router().with_state(state), pool)
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app().await;
        let (status, body) = call(app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_team_summary_accepts_alias() {
        let (app, _) = app().await;
        let (status, body) = call(app.clone(), Method::GET, "/teams/wsh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["team"]["code"], "WAS");
        assert_eq!(body["data"]["record"]["wins"], 1);

        let (status, _) = call(app.clone(), Method::GET, "/teams/XYZ").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(app, Method::GET, "/teams/G-B").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_week_and_current_week() {
        let (app, _) = app().await;
        let (status, body) = call(app.clone(), Method::GET, "/weeks/1?season=2025").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_games"], 1);
        assert_eq!(body["data"]["bye_teams"].as_array().unwrap().len(), 30);

        let (status, body) = call(app, Method::GET, "/weeks/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["week"], 1);
    }

    #[tokio::test]
    async fn test_game_detail_not_found() {
        let (app, _) = app().await;
        let (status, _) = call(app, Method::GET, "/games/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recompute_then_standings() {
        let (app, pool) = app().await;
        let (status, body) = call(app.clone(), Method::POST, "/admin/rankings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["teams_ranked"], 32);
        assert_eq!(body["data"]["games_counted"], 1);
        assert_eq!(crate::db::get_season_stats(&pool, 2025).await.unwrap().len(), 32);

        let (status, body) = call(app, Method::GET, "/standings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["team"], "WAS");
    }

    #[tokio::test]
    async fn test_completeness_and_live() {
        let (app, _) = app().await;
        let (status, body) = call(app.clone(), Method::GET, "/seasons/2025/completeness").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_complete"], false);

        let (status, body) = call(app, Method::GET, "/games/live").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_season_type() {
        let (app, _) = app().await;
        let (status, _) = call(app, Method::POST, "/admin/live/refresh?season_type=winter").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
