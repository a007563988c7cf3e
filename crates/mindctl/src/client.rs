//! HTTP client for communicating with mindd.

use anyhow::{Context, Result};
use mind_common::{
    BadgeView, CompletionOutcome, CompletionRequest, EnergyAdjustRequest, EnergyResponse, ErrorBody,
    HealthResponse, LearnerProfile, Lesson, ProgressResponse, PurchaseReceipt, PurchaseRequest,
    StoreItemView,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

/// Client for communicating with mindd
pub struct MinddClient {
    client: reqwest::Client,
    base_url: String,
}

/// Turn a non-2xx response into a readable message, keeping the error kind
pub fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("{} ({}): {}", parsed.error.kind, status.as_u16(), parsed.error.message),
        Err(_) if body.trim().is_empty() => format!("request failed ({})", status),
        Err(_) => format!("request failed ({}): {}", status, body.trim()),
    }
}

impl MinddClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{}", describe_error(status, &text));
        }
        resp.json().await.context("Failed to parse mindd response")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("Failed to connect to mindd at {}", self.base_url))?;
        Self::decode(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to mindd at {}", self.base_url))?;
        Self::decode(resp).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/v1/health").await
    }

    pub async fn profile(&self, learner_id: i64) -> Result<LearnerProfile> {
        self.get(&format!("/v1/learners/{}", learner_id)).await
    }

    pub async fn progress(&self, learner_id: i64, course: &str) -> Result<ProgressResponse> {
        self.get(&format!("/v1/progress/{}/{}", learner_id, course)).await
    }

    pub async fn complete(&self, req: &CompletionRequest) -> Result<CompletionOutcome> {
        self.post("/v1/progress", req).await
    }

    pub async fn adjust_energy(&self, learner_id: i64, delta: i64) -> Result<EnergyResponse> {
        self.post(
            &format!("/v1/learners/{}/energy", learner_id),
            &EnergyAdjustRequest { delta },
        )
        .await
    }

    pub async fn purchase(&self, learner_id: i64, item: &str) -> Result<PurchaseReceipt> {
        self.post(
            "/v1/store/purchase",
            &PurchaseRequest {
                learner_id,
                item: item.to_string(),
            },
        )
        .await
    }

    pub async fn store_items(&self) -> Result<Vec<StoreItemView>> {
        self.get("/v1/store/items").await
    }

    pub async fn badges(&self, learner_id: i64) -> Result<Vec<BadgeView>> {
        self.get(&format!("/v1/learners/{}/badges", learner_id)).await
    }

    pub async fn lesson(&self, course: &str, level: u32) -> Result<Lesson> {
        self.get(&format!("/v1/lessons/{}/{}", course, level)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_describe_error_keeps_kind() {
        let body = r#"{"error":{"kind":"energy_full","message":"energy is already full"}}"#;
        assert_eq!(
            describe_error(StatusCode::UNPROCESSABLE_ENTITY, body),
            "energy_full (422): energy is already full"
        );
    }

    #[test]
    fn test_describe_error_plain_body() {
        assert_eq!(
            describe_error(StatusCode::BAD_REQUEST, "Invalid JSON\n"),
            "request failed (400 Bad Request): Invalid JSON"
        );
        assert_eq!(
            describe_error(StatusCode::REQUEST_TIMEOUT, ""),
            "request failed (408 Request Timeout)"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = MinddClient::new("http://localhost:3000/");
        assert_eq!(client.url("/v1/health"), "http://localhost:3000/v1/health");
    }
}
