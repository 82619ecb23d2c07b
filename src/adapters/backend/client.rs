use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::types::{BackendConfig, CacheConfig};
use crate::domain::availability::{AvailabilityRecord, BookingStatus, DATE_FORMAT};
use crate::error::{CalendarError, Result};
use crate::ports::availability_store::AvailabilityStore;
use crate::ports::cache::SnapshotCache;

const RETRY_BACKOFF_MS: u64 = 500;

/// What a 404 from the backend refers to.
#[derive(Debug, Clone, Copy)]
enum NotFound<'a> {
    Apartment(&'a str),
    Record { apartment_id: &'a str, record_id: u64 },
}

impl NotFound<'_> {
    fn into_error(self) -> CalendarError {
        match self {
            Self::Apartment(id) => CalendarError::ApartmentNotFound { id: id.to_string() },
            Self::Record {
                apartment_id,
                record_id,
            } => CalendarError::RecordNotFound {
                apartment_id: apartment_id.to_string(),
                record_id,
            },
        }
    }
}

#[derive(Deserialize)]
struct ListingState {
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`AvailabilityStore`] backed by the listing backend's REST API.
pub struct BackendClient {
    http: Client,
    config: BackendConfig,
    cache: Arc<dyn SnapshotCache>,
    cache_ttl: Duration,
}

impl BackendClient {
    pub fn new(
        config: BackendConfig,
        cache_config: &CacheConfig,
        cache: Arc<dyn SnapshotCache>,
    ) -> std::result::Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            cache,
            cache_ttl: Duration::from_secs(cache_config.availability_ttl_secs),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)?;
        url.path_segments_mut()
            .map_err(|()| {
                CalendarError::Config(format!(
                    "backend base_url '{}' cannot carry a path",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the response body.
    ///
    /// GET and DELETE are retried on 429, 5xx and transport errors; POST is sent once.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        not_found: NotFound<'_>,
    ) -> Result<String> {
        let retries = if method == Method::POST {
            0
        } else {
            self.config.max_retries
        };

        let mut last_error = None;
        for attempt in 0..=retries {
            if attempt > 0 {
                let delay = Duration::from_millis(u64::from(attempt) * RETRY_BACKOFF_MS);
                debug!(attempt, delay_ms = delay.as_millis(), "Retrying backend request");
                tokio::time::sleep(delay).await;
            }

            debug!(%method, %url, "Calling backend");
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(token) = &self.config.api_token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(CalendarError::Http);
                    }
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            return Err(CalendarError::Unauthorized);
                        }
                        StatusCode::NOT_FOUND => return Err(not_found.into_error()),
                        StatusCode::TOO_MANY_REQUESTS => {
                            warn!("Rate limited by backend (429)");
                            last_error = Some(CalendarError::RateLimited);
                            continue;
                        }
                        _ => {}
                    }
                    let text = response.text().await.unwrap_or_default();
                    let error = CalendarError::Api {
                        status: status.as_u16(),
                        message: error_message(&text, status),
                    };
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    warn!(status = status.as_u16(), attempt, "Backend server error");
                    last_error = Some(error);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Backend request failed");
                    last_error = Some(CalendarError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CalendarError::Api {
            status: 0,
            message: "all retries exhausted".into(),
        }))
    }
}

fn availability_key(apartment_id: &str) -> String {
    format!("availabilities:{apartment_id}")
}

fn activity_key(apartment_id: &str) -> String {
    format!("active:{apartment_id}")
}

/// Prefer the backend's `{"error": "..."}` message, then the raw body, then the status reason.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decode a records list. The backend encodes an empty list as `null`.
pub fn parse_records(body: &str) -> Result<Vec<AvailabilityRecord>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let records: Option<Vec<AvailabilityRecord>> = serde_json::from_str(trimmed)?;
    Ok(records.unwrap_or_default())
}

#[async_trait]
impl AvailabilityStore for BackendClient {
    async fn fetch_availabilities(&self, apartment_id: &str) -> Result<Vec<AvailabilityRecord>> {
        let cache_key = availability_key(apartment_id);
        if let Some(cached) = self.cache.get(&cache_key)
            && let Ok(records) = serde_json::from_str::<Vec<AvailabilityRecord>>(&cached)
        {
            debug!(apartment_id, "Cache hit for availabilities");
            return Ok(records);
        }

        let url = self.endpoint(&["api", "apartments", apartment_id, "availabilities"])?;
        let body = self
            .send(Method::GET, url, None, NotFound::Apartment(apartment_id))
            .await?;
        let records = parse_records(&body)?;

        for record in records.iter().filter(|r| !r.is_well_formed()) {
            warn!(
                apartment_id,
                id = ?record.id,
                start = %record.date_start,
                end = %record.date_end,
                "Availability record ends before it starts; it will cover no dates"
            );
        }

        if let Ok(json) = serde_json::to_string(&records) {
            self.cache.set(&cache_key, &json, self.cache_ttl);
        }
        debug!(apartment_id, count = records.len(), "Fetched availabilities");
        Ok(records)
    }

    async fn is_listing_active(&self, apartment_id: &str) -> Result<bool> {
        let cache_key = activity_key(apartment_id);
        if let Some(cached) = self.cache.get(&cache_key)
            && let Ok(active) = cached.parse::<bool>()
        {
            return Ok(active);
        }

        let url = self.endpoint(&["api", "apartments", apartment_id])?;
        let body = self
            .send(Method::GET, url, None, NotFound::Apartment(apartment_id))
            .await?;
        let state: ListingState = serde_json::from_str(&body)?;
        self.cache
            .set(&cache_key, &state.is_active.to_string(), self.cache_ttl);
        Ok(state.is_active)
    }

    async fn save_blocked_range(
        &self,
        apartment_id: &str,
        record: &AvailabilityRecord,
    ) -> Result<AvailabilityRecord> {
        if !record.is_well_formed() {
            return Err(CalendarError::InvalidParams {
                reason: format!(
                    "range {} to {} ends before it starts",
                    record.date_start, record.date_end
                ),
            });
        }

        let url = self.endpoint(&["api", "apartments", apartment_id, "availabilities"])?;
        let payload = serde_json::json!({
            "date_start": record.date_start.format(DATE_FORMAT).to_string(),
            "date_end": record.date_end.format(DATE_FORMAT).to_string(),
            "status": record.status,
        });
        let body = self
            .send(
                Method::POST,
                url,
                Some(&payload),
                NotFound::Apartment(apartment_id),
            )
            .await?;
        self.cache.invalidate(&availability_key(apartment_id));

        let saved = serde_json::from_str::<AvailabilityRecord>(body.trim())
            .unwrap_or_else(|_| record.clone());
        info!(
            apartment_id,
            start = %saved.date_start,
            end = %saved.date_end,
            "Saved blocked range"
        );
        Ok(saved)
    }

    async fn remove_blocked_range(&self, apartment_id: &str, record_id: u64) -> Result<()> {
        self.cache.invalidate(&availability_key(apartment_id));
        let records = self.fetch_availabilities(apartment_id).await?;
        let record = records
            .iter()
            .find(|r| r.id == Some(record_id))
            .ok_or_else(|| CalendarError::RecordNotFound {
                apartment_id: apartment_id.to_string(),
                record_id,
            })?;
        if record.status == BookingStatus::Booked {
            return Err(CalendarError::InvalidParams {
                reason: format!(
                    "record {record_id} is a booking and can only be changed on its booking channel"
                ),
            });
        }

        let id = record_id.to_string();
        let url = self.endpoint(&["api", "apartments", apartment_id, "availabilities", id.as_str()])?;
        self.send(
            Method::DELETE,
            url,
            None,
            NotFound::Record {
                apartment_id,
                record_id,
            },
        )
        .await?;
        self.cache.invalidate(&availability_key(apartment_id));
        info!(apartment_id, record_id, "Removed blocked range");
        Ok(())
    }
}
