use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, Router},
    Json,
};
use calendar::{
    normalize_year_month, BuiltCalendar, CalendarCache, CalendarError, DesignRegistry,
    HolidayResolver, HolidayTable, ImageRegion, Orientation, PaperSize,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug)]
enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<CalendarError> for AppError {
    fn from(error: CalendarError) -> Self {
        match error {
            CalendarError::UnknownDesign(_) => AppError::NotFound(error.to_string()),
            CalendarError::InvalidMonth { .. } | CalendarError::DateOutOfRange { .. } => {
                AppError::BadRequest(error.to_string())
            }
            _ => AppError::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
    #[error("Invalid number parse: {0}")]
    NumberParse(#[from] std::num::ParseIntError),
    #[error("Invalid boolean parse: {0}")]
    BoolParse(#[from] std::str::ParseBoolError),
    #[error("Invalid address: {0}")]
    AddressError(#[from] std::net::AddrParseError),
}

#[derive(Clone, Debug)]
struct Config {
    port: u16,
    host: String,
    designs_dir: PathBuf,
    holidays_file: Option<PathBuf>,
    anniversaries_file: Option<PathBuf>,
    cache_capacity: u64,
    cache_ttl_secs: u64,
    first_month_is_april: bool,
}

fn optional_var(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn var_or(name: &str, default: &str) -> Result<String, ConfigError> {
    Ok(optional_var(name)?.unwrap_or_else(|| default.to_string()))
}

impl Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: var_or("PORT", "3000")?.parse()?,
            host: var_or("HOST", "127.0.0.1")?,
            designs_dir: var_or("DESIGNS_DIR", "./designs")?.into(),
            holidays_file: optional_var("HOLIDAYS_FILE")?.map(PathBuf::from),
            anniversaries_file: optional_var("ANNIVERSARIES_FILE")?.map(PathBuf::from),
            cache_capacity: var_or("CACHE_CAPACITY", "512")?.parse()?,
            cache_ttl_secs: var_or("CACHE_TTL_SECS", "3600")?.parse()?,
            first_month_is_april: var_or("FIRST_MONTH_IS_APRIL", "false")?.parse()?,
        })
    }

    fn addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Clone)]
struct AppState {
    registry: Arc<DesignRegistry>,
    resolver: Arc<HolidayResolver>,
    cache: Arc<CalendarCache>,
    first_month_is_april: bool,
}

impl AppState {
    fn from_config(config: &Config) -> Result<Self, CalendarError> {
        let registry = DesignRegistry::load(&config.designs_dir)?;
        let statutory = match &config.holidays_file {
            Some(path) => HolidayTable::load(path)?,
            None => HolidayTable::bundled()?,
        };
        let anniversaries = match &config.anniversaries_file {
            Some(path) => HolidayTable::load(path)?,
            None => HolidayTable::new(),
        };
        info!(
            designs = registry.designs().len(),
            holidays = statutory.len(),
            anniversaries = anniversaries.len(),
            "Loaded calendar data"
        );

        Ok(Self {
            registry: Arc::new(registry),
            resolver: Arc::new(HolidayResolver::with_anniversaries(statutory, anniversaries)),
            cache: Arc::new(CalendarCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            )),
            first_month_is_april: config.first_month_is_april,
        })
    }
}

#[derive(Serialize)]
struct DesignSummary {
    id: String,
    name: String,
    orientation: Orientation,
    size: PaperSize,
    width_mm: f64,
    height_mm: f64,
    next: Option<String>,
    prev: Option<String>,
}

#[derive(Deserialize)]
struct CalendarParams {
    fiscal: Option<bool>,
    holidays_only: Option<bool>,
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/designs", get(list_designs))
        .route("/calendars/:design/:year/:month", get(handle_calendar))
        .route("/calendars/:design/:year/:month/images", get(handle_images))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

async fn health() -> Response {
    StatusCode::OK.into_response()
}

async fn list_designs(State(state): State<AppState>) -> Json<Vec<DesignSummary>> {
    let registry = &state.registry;
    let designs = registry
        .designs()
        .iter()
        .map(|design| {
            let (width_mm, height_mm) = design.layout.page_size_mm();
            DesignSummary {
                id: design.id.clone(),
                name: design.name.clone(),
                orientation: design.layout.orientation,
                size: design.layout.size,
                width_mm,
                height_mm,
                next: registry.next_id(&design.id).map(str::to_string),
                prev: registry.prev_id(&design.id).map(str::to_string),
            }
        })
        .collect();
    Json(designs)
}

fn render_calendar(
    state: &AppState,
    design: &str,
    year: i32,
    month: u32,
    params: &CalendarParams,
) -> AppResult<(Arc<BuiltCalendar>, bool)> {
    let fiscal = params.fiscal.unwrap_or(state.first_month_is_april);
    let year_month = normalize_year_month(year, month, fiscal)?;
    Ok(state.cache.calendar_or_build(
        &state.registry,
        &state.resolver,
        design,
        year_month,
        params.holidays_only.unwrap_or(false),
    )?)
}

fn log_failure(request_id: Uuid, design: &str, year: i32, month: u32, error: &AppError) {
    match error {
        AppError::Internal(_) => error!(
            request_id = %request_id,
            design = %design,
            year,
            month,
            error = %error,
            "Calendar build failed"
        ),
        _ => warn!(
            request_id = %request_id,
            design = %design,
            year,
            month,
            error = %error,
            "Calendar request rejected"
        ),
    }
}

async fn handle_calendar(
    Path((design, year, month)): Path<(String, i32, u32)>,
    Query(params): Query<CalendarParams>,
    State(state): State<AppState>,
) -> Response {
    let request_id = Uuid::new_v4();

    let mut response = match render_calendar(&state, &design, year, month, &params) {
        Ok((built, hit)) => {
            let cache_status = if hit { "HIT" } else { "MISS" };
            info!(
                request_id = %request_id,
                design = %design,
                year_month = %built.year_month(),
                cache = cache_status,
                "Served calendar"
            );
            (
                StatusCode::OK,
                [
                    ("Content-Type", "image/svg+xml"),
                    ("Cache-Control", "no-cache"),
                    ("X-Cache", cache_status),
                ],
                built.to_svg_string(),
            )
                .into_response()
        }
        Err(e) => {
            log_failure(request_id, &design, year, month, &e);
            e.into_response()
        }
    };

    add_response_headers(&mut response, request_id);
    response
}

async fn handle_images(
    Path((design, year, month)): Path<(String, i32, u32)>,
    Query(params): Query<CalendarParams>,
    State(state): State<AppState>,
) -> Response {
    let request_id = Uuid::new_v4();

    let mut response = match render_calendar(&state, &design, year, month, &params) {
        Ok((built, _)) => {
            let images: BTreeMap<String, ImageRegion> = built.image_regions().clone();
            Json(images).into_response()
        }
        Err(e) => {
            log_failure(request_id, &design, year, month, &e);
            e.into_response()
        }
    };

    add_response_headers(&mut response, request_id);
    response
}

fn add_response_headers(response: &mut Response, request_id: Uuid) {
    let headers = response.headers_mut();
    headers.insert(
        "X-Request-ID",
        HeaderValue::from_str(&request_id.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("")),
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!(
        port = config.port,
        host = %config.host,
        designs_dir = %config.designs_dir.display(),
        cache_ttl_secs = config.cache_ttl_secs,
        first_month_is_april = config.first_month_is_april,
        "Starting server"
    );

    let state = AppState::from_config(&config)?;
    let addr = config.addr()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const INDEX: &str = r#"[
        {"id": "simple", "name": "Simple", "layout": {"orientation": "landscape", "size": "A5"}, "colors": {"date": "black"}},
        {"id": "photo", "name": "Photo", "layout": {"orientation": "portrait", "size": "2L"}, "colors": {"date": "black"}}
    ]"#;

    const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" viewBox="0 0 200 100">
  <rect inkscape:label="month[short,enUS]" x="0" y="0" width="200" height="20"/>
  <rect inkscape:label="image[top]" x="0" y="20" width="200" height="40"/>
  <rect inkscape:label="day-3" x="0" y="60" width="20" height="10"/>
</svg>"#;

    // Keep the TempDir alive by returning it
    fn state() -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.json"), INDEX).unwrap();
        for id in ["simple", "photo"] {
            fs::create_dir(dir.path().join(id)).unwrap();
            fs::write(dir.path().join(id).join("main.svg"), TEMPLATE).unwrap();
        }
        let config = Config {
            port: 0,
            host: "127.0.0.1".to_string(),
            designs_dir: dir.path().to_path_buf(),
            holidays_file: None,
            anniversaries_file: None,
            cache_capacity: 16,
            cache_ttl_secs: 60,
            first_month_is_april: false,
        };
        (AppState::from_config(&config).unwrap(), dir)
    }

    async fn get_response(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _dir) = state();
        let response = get_response(app(state), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_designs() {
        let (state, _dir) = state();
        let response = get_response(app(state), "/designs").await;
        assert_eq!(response.status(), StatusCode::OK);

        let designs: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(designs[0]["id"], "simple");
        assert_eq!(designs[0]["orientation"], "landscape");
        assert_eq!(designs[0]["width_mm"], 210.0);
        assert_eq!(designs[0]["next"], "photo");
        assert_eq!(designs[1]["size"], "2L");
        assert_eq!(designs[1]["next"], "simple");
    }

    #[tokio::test]
    async fn test_calendar_cache_headers() {
        let (state, _dir) = state();
        let app = app(state);

        let first = get_response(app.clone(), "/calendars/simple/2025/4").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["X-Cache"], "MISS");
        assert_eq!(first.headers()["Content-Type"], "image/svg+xml");
        assert!(first.headers().contains_key("X-Request-ID"));
        let svg = body_text(first).await;
        assert!(svg.contains("<tspan>Apr</tspan>"));
        assert!(svg.contains("<tspan>2</tspan>"));

        let second = get_response(app, "/calendars/simple/2025/4").await;
        assert_eq!(second.headers()["X-Cache"], "HIT");
    }

    #[tokio::test]
    async fn test_fiscal_query() {
        let (state, _dir) = state();
        let response = get_response(app(state), "/calendars/simple/2025/10?fiscal=true").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<tspan>Jan</tspan>"));
    }

    #[tokio::test]
    async fn test_errors() {
        let (state, _dir) = state();
        let app = app(state);

        let missing = get_response(app.clone(), "/calendars/nope/2025/4").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(missing.headers().contains_key("X-Request-ID"));

        let bad_month = get_response(app.clone(), "/calendars/simple/2025/13").await;
        assert_eq!(bad_month.status(), StatusCode::BAD_REQUEST);

        let not_a_number = get_response(app, "/calendars/simple/2025/april").await;
        assert_eq!(not_a_number.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_image_regions() {
        let (state, _dir) = state();
        let response = get_response(app(state), "/calendars/photo/2025/7/images").await;
        assert_eq!(response.status(), StatusCode::OK);

        let images: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(images["top-7"]["name"], "top-7");
        assert_eq!(images["top-7"]["block"], "top");
        assert_eq!(images["top-7"]["rect_svg"]["height"], 40.0);
    }
}
