use crate::config::Config;
use crate::errors::AppError;
use crate::filters::{CompanyQuery, DistrictQuery, MunicipalityQuery, StateQuery};
use crate::models::*;
use crate::pagination::{PageRequest, Paginated, API_MAX_PAGE_SIZE, API_PAGE_SIZE};
use crate::storage::ListingStorage;
use axum::{
    extract::{OriginalUri, Query, State},
    http::{header::HOST, HeaderMap, StatusCode, Uri},
    Json,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_sessions::MemoryStore;
use url::Url;
use utoipa::IntoParams;

/// Lifetime of the cached filter-form choices.
const CHOICES_TTL: Duration = Duration::from_secs(300);

/// Reference lists shown as selects in the HTML filter forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChoiceSet {
    Regions,
    States,
    Municipalities,
}

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    pub config: Config,
    /// Read-side queries.
    pub storage: ListingStorage,
    /// Login sessions, shared by every router built from this state.
    pub sessions: MemoryStore,
    /// Filter-form choices (5 minute TTL). They only change on import.
    pub choices: Cache<ChoiceSet, Arc<Vec<Choice>>>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            storage: ListingStorage::new(db.clone()),
            db,
            config,
            sessions: MemoryStore::default(),
            choices: Cache::builder()
                .time_to_live(CHOICES_TTL)
                .max_capacity(16)
                .build(),
        }
    }

    /// Choices for a filter select, loaded on first use.
    pub async fn choices(&self, set: ChoiceSet) -> Result<Arc<Vec<Choice>>, AppError> {
        let storage = self.storage.clone();
        self.choices
            .try_get_with(set, async move {
                let choices = match set {
                    ChoiceSet::Regions => storage.region_choices().await?,
                    ChoiceSet::States => storage.state_choices().await?,
                    ChoiceSet::Municipalities => storage.municipality_choices().await?,
                };
                tracing::debug!("Loaded {} {:?} choices", choices.len(), set);
                Ok::<_, AppError>(Arc::new(choices))
            })
            .await
            .map_err(|e| AppError::InternalError(format!("loading {:?} choices: {}", set, e)))
    }
}

/// `page` and `page_size` of the JSON list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number, or `last`.
    pub page: Option<String>,
    /// Rows per page (default 25, maximum 100).
    pub page_size: Option<String>,
}

impl PageParams {
    fn request(&self) -> Result<PageRequest, AppError> {
        PageRequest::from_params(
            self.page.as_deref(),
            self.page_size.as_deref(),
            API_PAGE_SIZE,
            API_MAX_PAGE_SIZE,
        )
    }
}

/// Absolute URL of the current request, honouring `X-Forwarded-Proto`.
pub fn request_url(headers: &HeaderMap, uri: &Uri) -> Result<Url, AppError> {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Url::parse(&format!("{}://{}{}", scheme, host, path_and_query))
        .map_err(|e| AppError::BadRequest(format!("Invalid request URL: {}", e)))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "arko",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/regions/
#[utoipa::path(
    get,
    path = "/api/regions/",
    tag = "geography",
    params(PageParams),
    responses(
        (status = 200, description = "Page of regions", body = crate::pagination::PaginatedRegions),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_regions(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(paging): Query<PageParams>,
) -> Result<Json<Paginated<Region>>, AppError> {
    let request = paging.request()?;

    let count = state.storage.count_regions().await?;
    let page = request.resolve(count)?;
    let regions = state.storage.list_regions(&page).await?;

    let url = request_url(&headers, &uri)?;
    Ok(Json(Paginated::new(&page, &url, regions)))
}

/// GET /api/states/
///
/// States ordered by name, each with its region nested.
#[utoipa::path(
    get,
    path = "/api/states/",
    tag = "geography",
    params(PageParams, StateQuery),
    responses(
        (status = 200, description = "Page of states", body = crate::pagination::PaginatedStates),
        (status = 400, description = "Invalid filter value"),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_states(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(paging): Query<PageParams>,
    Query(query): Query<StateQuery>,
) -> Result<Json<Paginated<StateResponse>>, AppError> {
    let request = paging.request()?;
    let filter = query.validate(&state.db).await?.strict()?;

    let count = state.storage.count_states(&filter).await?;
    let page = request.resolve(count)?;
    let rows = state.storage.list_states(&filter, &page).await?;

    let url = request_url(&headers, &uri)?;
    let results = rows.into_iter().map(StateResponse::from).collect();
    Ok(Json(Paginated::new(&page, &url, results)))
}

/// GET /api/municipalities/
#[utoipa::path(
    get,
    path = "/api/municipalities/",
    tag = "geography",
    params(PageParams, MunicipalityQuery),
    responses(
        (status = 200, description = "Page of municipalities", body = crate::pagination::PaginatedMunicipalities),
        (status = 400, description = "Invalid filter value"),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_municipalities(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(paging): Query<PageParams>,
    Query(query): Query<MunicipalityQuery>,
) -> Result<Json<Paginated<MunicipalityResponse>>, AppError> {
    let request = paging.request()?;
    let filter = query.validate(&state.db).await?.strict()?;

    let count = state.storage.count_municipalities(&filter).await?;
    let page = request.resolve(count)?;
    let rows = state.storage.list_municipalities(&filter, &page).await?;

    let url = request_url(&headers, &uri)?;
    let results = rows.into_iter().map(MunicipalityResponse::from).collect();
    Ok(Json(Paginated::new(&page, &url, results)))
}

/// GET /api/districts/
#[utoipa::path(
    get,
    path = "/api/districts/",
    tag = "geography",
    params(PageParams, DistrictQuery),
    responses(
        (status = 200, description = "Page of districts", body = crate::pagination::PaginatedDistricts),
        (status = 400, description = "Invalid filter value"),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_districts(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(paging): Query<PageParams>,
    Query(query): Query<DistrictQuery>,
) -> Result<Json<Paginated<DistrictResponse>>, AppError> {
    let request = paging.request()?;
    let filter = query.validate(&state.db).await?.strict()?;

    let count = state.storage.count_districts(&filter).await?;
    let page = request.resolve(count)?;
    let rows = state.storage.list_districts(&filter, &page).await?;

    let url = request_url(&headers, &uri)?;
    let results = rows.into_iter().map(DistrictResponse::from).collect();
    Ok(Json(Paginated::new(&page, &url, results)))
}

/// GET /api/companies/
///
/// Companies ordered by legal name. `capital_social` is a two-place decimal
/// string.
#[utoipa::path(
    get,
    path = "/api/companies/",
    tag = "companies",
    params(PageParams, CompanyQuery),
    responses(
        (status = 200, description = "Page of companies", body = crate::pagination::PaginatedCompanies),
        (status = 404, description = "Invalid page")
    )
)]
pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(paging): Query<PageParams>,
    Query(query): Query<CompanyQuery>,
) -> Result<Json<Paginated<CompanyResponse>>, AppError> {
    let request = paging.request()?;
    let filter = query.validate().strict()?;

    let count = state.storage.count_companies(&filter).await?;
    let page = request.resolve(count)?;
    let rows = state.storage.list_companies(&filter, &page).await?;

    let url = request_url(&headers, &uri)?;
    let results = rows.into_iter().map(CompanyResponse::from).collect();
    Ok(Json(Paginated::new(&page, &url, results)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn request_url_uses_host_and_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("arko.example"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        let uri: Uri = "/api/states/?nome=par&page=2".parse().unwrap();

        let url = request_url(&headers, &uri).unwrap();
        assert_eq!(url.as_str(), "https://arko.example/api/states/?nome=par&page=2");
    }

    #[test]
    fn request_url_defaults_to_http_localhost() {
        let uri: Uri = "/api/regions/".parse().unwrap();
        let url = request_url(&HeaderMap::new(), &uri).unwrap();
        assert_eq!(url.as_str(), "http://localhost/api/regions/");
    }

    #[test]
    fn page_params_fall_back_to_api_defaults() {
        let request = PageParams::default().request().unwrap();
        assert_eq!(request.size, API_PAGE_SIZE);
    }
}
