use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use shiftlog_core::geo::validate_coordinate;
use shiftlog_core::util::required_text;
use shiftlog_core::wire::{
    IngestResponse, LocationRequest, NoteRequest, PhotoRequest, ShiftEndRequest, ShiftProjection,
    ShiftRequest,
};
use shiftlog_core::{LocationPoint, PairCode};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::mirror::MirrorStore;
use crate::rate_limit::{code_fingerprint, RateLimitMetricsSnapshot, ViewRateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    mirror: Arc<Mutex<MirrorStore>>,
    view_rate_limiter: Arc<ViewRateLimiter>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> shiftlog_core::Result<Self> {
        let mirror = match &config.db_path {
            Some(path) => MirrorStore::open(path)?,
            None => {
                tracing::warn!("SHIFTLOG_API_DB_PATH not set; mirror data is kept in memory");
                MirrorStore::open_in_memory()?
            }
        };
        Ok(Self {
            mirror: Arc::new(Mutex::new(mirror)),
            view_rate_limiter: Arc::new(ViewRateLimiter::from_config(config.as_ref())),
            config,
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let v1_routes = Router::new()
        .route("/shift", post(ingest_shift))
        .route("/location", post(ingest_location))
        .route("/photo", post(ingest_photo))
        .route("/note", post(ingest_note))
        .route("/shift-end", post(ingest_shift_end))
        .route("/shift/{pair_code}", get(view_shift))
        .route("/shift/{pair_code}/photos/{photo_id}", get(view_photo));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", v1_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.view_rate_limiter.metrics_snapshot(),
    })
}

async fn ingest_shift(
    State(state): State<AppState>,
    Json(mut body): Json<ShiftRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    body.pair_code = parse_pair_code(&body.pair_code)?;
    body.staff_name = required_text("staffName", &body.staff_name)?;
    body.site_name = required_text("siteName", &body.site_name)?;
    require_timestamp("startTime", body.start_time)?;

    let applied = state.mirror.lock().await.upsert_shift(&body)?;
    tracing::info!(pair = code_fingerprint(&body.pair_code), applied, "Shift upserted");
    Ok(Json(IngestResponse { applied }))
}

async fn ingest_location(
    State(state): State<AppState>,
    Json(mut body): Json<LocationRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    body.pair_code = parse_pair_code(&body.pair_code)?;
    LocationPoint::at(body.latitude, body.longitude, body.accuracy, body.timestamp)?;

    let applied = state.mirror.lock().await.add_location_point(&body)?;
    Ok(Json(IngestResponse { applied }))
}

async fn ingest_photo(
    State(state): State<AppState>,
    Json(mut body): Json<PhotoRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    body.pair_code = parse_pair_code(&body.pair_code)?;
    body.photo_ref = required_text("photoRef", &body.photo_ref)?;
    require_timestamp("timestamp", body.timestamp)?;
    optional_coordinate(body.latitude, body.longitude)?;

    let image = body
        .image_base64
        .take()
        .map(|encoded| {
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|error| AppError::bad_request(format!("imageBase64 is not valid base64: {error}")))
        })
        .transpose()?;

    let applied = state
        .mirror
        .lock()
        .await
        .add_photo(&body, image.as_deref())?;
    tracing::info!(
        pair = code_fingerprint(&body.pair_code),
        applied,
        with_image = image.is_some(),
        "Photo ingested"
    );
    Ok(Json(IngestResponse { applied }))
}

async fn ingest_note(
    State(state): State<AppState>,
    Json(mut body): Json<NoteRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    body.pair_code = parse_pair_code(&body.pair_code)?;
    body.text = required_text("text", &body.text)?;
    require_timestamp("timestamp", body.timestamp)?;
    optional_coordinate(body.latitude, body.longitude)?;

    let applied = state.mirror.lock().await.add_note(&body)?;
    Ok(Json(IngestResponse { applied }))
}

async fn ingest_shift_end(
    State(state): State<AppState>,
    Json(mut body): Json<ShiftEndRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    body.pair_code = parse_pair_code(&body.pair_code)?;
    require_timestamp("endTime", body.end_time)?;

    let applied = state.mirror.lock().await.end_shift(&body)?;
    tracing::info!(pair = code_fingerprint(&body.pair_code), applied, "Shift ended");
    Ok(Json(IngestResponse { applied }))
}

async fn view_shift(
    State(state): State<AppState>,
    Path(pair_code): Path<String>,
) -> Result<Json<ShiftProjection>, AppError> {
    let pair_code = parse_pair_code(&pair_code)?;
    state.view_rate_limiter.check(&pair_code).await?;

    state
        .mirror
        .lock()
        .await
        .get_shift_by_pair_code(&pair_code)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No shift for this pair code"))
}

async fn view_photo(
    State(state): State<AppState>,
    Path((pair_code, photo_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let pair_code = parse_pair_code(&pair_code)?;
    state.view_rate_limiter.check(&pair_code).await?;

    let image = state
        .mirror
        .lock()
        .await
        .photo_image(&pair_code, photo_id.trim())?
        .ok_or_else(|| AppError::not_found("No image for this photo"))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], image).into_response())
}

fn parse_pair_code(raw: &str) -> Result<String, AppError> {
    PairCode::parse(raw)
        .map(String::from)
        .map_err(|error| AppError::bad_request(error.to_string()))
}

fn require_timestamp(field: &str, value: i64) -> Result<(), AppError> {
    if value < 0 {
        return Err(AppError::bad_request(format!("{field} must not be negative")));
    }
    Ok(())
}

fn optional_coordinate(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), AppError> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => {
            validate_coordinate(latitude, longitude).map_err(AppError::from)
        }
        (None, None) => Ok(()),
        _ => Err(AppError::bad_request(
            "latitude and longitude must be given together",
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pretty_assertions::assert_eq;

    const CODE: &str = "HK7M2P";

    fn state_with_limit(limit: u32) -> AppState {
        let config = AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: None,
            view_rate_limit_window: Duration::from_secs(60),
            view_rate_limit_per_window: limit,
            max_body_bytes: 1_024 * 1_024,
        };
        AppState::from_config(Arc::new(config)).unwrap()
    }

    fn state() -> AppState {
        state_with_limit(100)
    }

    fn location_body(pair_code: &str) -> LocationRequest {
        LocationRequest {
            pair_code: pair_code.to_string(),
            latitude: 51.5,
            longitude: -0.1,
            accuracy: 5.0,
            timestamp: 2_000,
            address: None,
        }
    }

    async fn view(state: &AppState, code: &str) -> Result<ShiftProjection, AppError> {
        view_shift(State(state.clone()), Path(code.to_string()))
            .await
            .map(|Json(projection)| projection)
    }

    #[tokio::test]
    async fn duplicate_location_is_acknowledged_but_not_applied() {
        let state = state();
        let first = ingest_location(State(state.clone()), Json(location_body(CODE)))
            .await
            .unwrap();
        let second = ingest_location(State(state.clone()), Json(location_body(CODE)))
            .await
            .unwrap();

        assert!(first.0.applied);
        assert!(!second.0.applied);
        assert_eq!(view(&state, CODE).await.unwrap().locations.len(), 1);
    }

    #[tokio::test]
    async fn lowercase_pair_code_is_normalized() {
        let state = state();
        ingest_location(State(state.clone()), Json(location_body("hk7m2p")))
            .await
            .unwrap();
        assert_eq!(view(&state, CODE).await.unwrap().pair_code, CODE);
    }

    #[tokio::test]
    async fn malformed_input_is_rejected() {
        let state = state();
        let err = ingest_location(State(state.clone()), Json(location_body("NOPE0")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let mut body = location_body(CODE);
        body.latitude = 123.0;
        let err = ingest_location(State(state.clone()), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = ingest_note(
            State(state.clone()),
            Json(NoteRequest {
                pair_code: CODE.to_string(),
                event_id: None,
                text: "hi".to_string(),
                timestamp: 1,
                latitude: Some(51.5),
                longitude: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = view(&state, "0OOOO1").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unknown_pair_code_is_not_found() {
        let err = view(&state(), "ZZZZZZ").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn full_shift_projection() {
        let state = state();
        ingest_shift(
            State(state.clone()),
            Json(ShiftRequest {
                pair_code: CODE.to_string(),
                staff_name: "Alice".to_string(),
                site_name: "Warehouse A".to_string(),
                start_time: 1_000,
            }),
        )
        .await
        .unwrap();
        ingest_location(State(state.clone()), Json(location_body(CODE)))
            .await
            .unwrap();
        ingest_note(
            State(state.clone()),
            Json(NoteRequest {
                pair_code: CODE.to_string(),
                event_id: Some("n-1".to_string()),
                text: "Gate locked".to_string(),
                timestamp: 2_500,
                latitude: None,
                longitude: None,
            }),
        )
        .await
        .unwrap();
        let ended = ingest_shift_end(
            State(state.clone()),
            Json(ShiftEndRequest {
                pair_code: CODE.to_string(),
                end_time: 3_000,
            }),
        )
        .await
        .unwrap();
        assert!(ended.0.applied);

        let projection = view(&state, CODE).await.unwrap();
        assert_eq!(projection.staff_name.as_deref(), Some("Alice"));
        assert_eq!(projection.end_time, Some(3_000));
        assert!(!projection.active);
        assert_eq!(projection.notes[0].text, "Gate locked");
        assert_eq!(
            projection.latest_location.map(|location| location.timestamp),
            Some(2_000)
        );
    }

    #[tokio::test]
    async fn photo_bytes_are_served() {
        let state = state();
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let body = PhotoRequest {
            pair_code: CODE.to_string(),
            event_id: Some("p-1".to_string()),
            photo_ref: "/photos/dock.jpg".to_string(),
            latitude: None,
            longitude: None,
            timestamp: 5,
            address: None,
            image_base64: Some(base64::engine::general_purpose::STANDARD.encode(&jpeg)),
        };
        assert!(ingest_photo(State(state.clone()), Json(body)).await.unwrap().0.applied);

        let photo_id = view(&state, CODE).await.unwrap().photos[0].photo_id.clone();
        let response = view_photo(State(state.clone()), Path((CODE.to_string(), photo_id)))
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("image/jpeg")
        );
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let body = PhotoRequest {
            pair_code: CODE.to_string(),
            event_id: None,
            photo_ref: "/photos/dock.jpg".to_string(),
            latitude: None,
            longitude: None,
            timestamp: 5,
            address: None,
            image_base64: Some("***".to_string()),
        };
        let err = ingest_photo(State(state()), Json(body)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn views_are_rate_limited() {
        let state = state_with_limit(1);
        ingest_location(State(state.clone()), Json(location_body(CODE)))
            .await
            .unwrap();

        view(&state, CODE).await.unwrap();
        let err = view(&state, CODE).await.unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests(_, _)));

        let Json(health) = healthz(State(state)).await;
        assert_eq!(health.rate_limit.views_limited, 1);
    }
}
