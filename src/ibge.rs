use crate::config::Config;
use crate::errors::AppError;
use crate::ibge_models::{IbgeDistrict, IbgeMunicipality, IbgeState};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout for the IBGE API.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the IBGE localities API.
#[derive(Clone)]
pub struct IbgeClient {
    client: Client,
    base_url: String,
}

impl IbgeClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_base_url(config.ibge_api_url.clone())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create IBGE client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetches every state (with its region), ordered by name.
    pub async fn get_states(&self) -> Result<Vec<IbgeState>, AppError> {
        self.fetch("estados", "States").await
    }

    /// Fetches every municipality, ordered by name.
    pub async fn get_all_municipalities(&self) -> Result<Vec<IbgeMunicipality>, AppError> {
        self.fetch("municipios", "Municipalities").await
    }

    /// Fetches every district, ordered by name.
    pub async fn get_all_districts(&self) -> Result<Vec<IbgeDistrict>, AppError> {
        self.fetch("distritos", "Districts").await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        what: &str,
    ) -> Result<Vec<T>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/{}", self.base_url, endpoint),
            &[("orderBy", "nome")],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            tracing::error!("Error during API request to {}: {}", url, e);
            AppError::ExternalApiError(format!("IBGE request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("IBGE API returned error {} for {}: {}", status, url, error_text);
            return Err(AppError::ExternalApiError(format!(
                "IBGE API returned status {}: {}",
                status, error_text
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!("Error reading response from {}: {}", url, e);
            AppError::ExternalApiError(format!("Failed to read IBGE response: {}", e))
        })?;

        let items: Vec<T> = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!("API response for {} did not match schema: {}", what, e);
            AppError::ExternalApiError(format!(
                "IBGE response for {} did not match schema: {}",
                what, e
            ))
        })?;

        tracing::info!("Fetched {} {} from IBGE", items.len(), what.to_lowercase());
        Ok(items)
    }
}
