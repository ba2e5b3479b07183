//! Page-side client for the lightschool server.
//!
//! Every request goes through the `OfflineCacheManager`, exactly as page
//! fetches pass through the cache in the browser: lesson data is kept once
//! fetched, progress and tutor posts always reach the network.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::cache::{OfflineCacheManager, ResponseSource, LESSON_DATA_PATH};
use crate::models::{LessonPack, ProgressUpdate, TutorReply, TutorRequest};
use crate::net::{CacheRequest, CachedResponse};

use super::ApiError;

const PROGRESS_SET_PATH: &str = "/api/progress/set/";
const TUTOR_PATH: &str = "/api/tutor/";

/// A decoded payload and whether it was served offline.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub source: ResponseSource,
}

#[derive(Clone)]
pub struct SchoolClient {
    manager: Arc<OfflineCacheManager>,
    origin: Url,
}

impl SchoolClient {
    pub fn new(manager: Arc<OfflineCacheManager>, origin: Url) -> Self {
        Self { manager, origin }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn lesson_url(&self, subject: &str, grade: u32, locale: &str) -> Result<Url, ApiError> {
        let path = format!("{}{}/{}/grade{}.json", LESSON_DATA_PATH, locale, subject, grade);
        Ok(self.origin.join(&path)?)
    }

    fn check(response: CachedResponse) -> Result<CachedResponse, ApiError> {
        if response.is_ok() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.text()))
        }
    }

    fn decode<T: DeserializeOwned>(response: &CachedResponse, what: &str) -> Result<T, ApiError> {
        response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    async fn send(&self, request: CacheRequest) -> Result<(CachedResponse, ResponseSource), ApiError> {
        let routed = self.manager.route(&request).await?;
        debug!(url = %request.url, source = ?routed.source, status = routed.response.status, "Request served");
        Ok((Self::check(routed.response)?, routed.source))
    }

    // ===== Lessons =====

    /// Fetch the lesson pack for one subject and grade.
    pub async fn lesson_pack(&self, subject: &str, grade: u32, locale: &str) -> Result<Fetched<LessonPack>, ApiError> {
        let request = CacheRequest::get(self.lesson_url(subject, grade, locale)?)
            .with_header("Accept", "application/json");
        let (response, source) = self.send(request).await?;
        let data = Self::decode(&response, "lesson pack")?;
        Ok(Fetched { data, source })
    }

    // ===== Progress =====

    pub async fn save_progress(&self, update: &ProgressUpdate) -> Result<serde_json::Value, ApiError> {
        let url = self.origin.join(PROGRESS_SET_PATH)?;
        let request = CacheRequest::post_json(url, update)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let (response, _) = self.send(request).await?;
        Self::decode(&response, "progress response")
    }

    // ===== Tutor =====

    pub async fn ask_tutor(&self, request: &TutorRequest) -> Result<TutorReply, ApiError> {
        let url = self.origin.join(TUTOR_PATH)?;
        let request = CacheRequest::post_json(url, request)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let (response, _) = self.send(request).await?;
        Self::decode(&response, "tutor reply")
    }
}
