use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entitlements::EntitlementState;
use crate::errors::{CoreError, CoreResult, ErrorCode};
use crate::types::matching::{DiscoveryFilters, Match, SwipeAck};
use crate::types::messaging::{Message, OutgoingMessage};
use crate::types::profile::Profile;

use super::api::{ApiErrorResponse, ApiResponse, MatchmakerApi, ReportRequest, SwipeRequest};

/// Production collaborator client over HTTP.
///
/// Holds the signed-in user's bearer token for the whole session; a 401
/// from any endpoint maps to the auth-expired class, which tears the
/// session down (the token is never refreshed here).
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpApi {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &AppConfig, token: impl Into<String>) -> CoreResult<Self> {
        Self::new(&config.api_base_url, token, config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> CoreResult<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status.is_success() {
            let envelope: ApiResponse<T> = response.json().await.map_err(map_transport)?;
            Ok(envelope.data)
        } else {
            let body = response.json::<ApiErrorResponse>().await.ok();
            Err(map_api_error(status, body))
        }
    }

    async fn send_unit(&self, request: reqwest::RequestBuilder) -> CoreResult<()> {
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }
}

fn map_transport(err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::Timeout
    } else {
        CoreError::Network(err.to_string())
    }
}

fn map_api_error(status: StatusCode, body: Option<ApiErrorResponse>) -> CoreError {
    if let Some(body) = body {
        if let Some(code) = ErrorCode::from_code(&body.error.code) {
            return CoreError::new(code, body.error.message);
        }
    }
    match status {
        StatusCode::UNAUTHORIZED => CoreError::unauthorized("session expired, sign in again"),
        StatusCode::FORBIDDEN => CoreError::new(ErrorCode::Forbidden, "not allowed"),
        StatusCode::NOT_FOUND => CoreError::new(ErrorCode::NotFound, "resource not found"),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            CoreError::new(ErrorCode::ValidationError, "request rejected")
        }
        s if s.is_server_error() => {
            CoreError::new(ErrorCode::ServiceUnavailable, "collaborator unavailable")
        }
        s => CoreError::Network(format!("unexpected status {s}")),
    }
}

#[async_trait]
impl MatchmakerApi for HttpApi {
    async fn discovery(&self, filters: &DiscoveryFilters) -> CoreResult<Vec<Profile>> {
        self.send(self.http.get(self.url("/discovery")).query(filters))
            .await
    }

    async fn profile(&self, user_id: Uuid) -> CoreResult<Profile> {
        self.send(self.http.get(self.url(&format!("/profiles/{user_id}"))))
            .await
    }

    async fn like(&self, target_id: Uuid) -> CoreResult<SwipeAck> {
        self.send(
            self.http
                .post(self.url("/like"))
                .json(&SwipeRequest { target_id }),
        )
        .await
    }

    async fn pass(&self, target_id: Uuid) -> CoreResult<()> {
        self.send_unit(
            self.http
                .post(self.url("/pass"))
                .json(&SwipeRequest { target_id }),
        )
        .await
    }

    async fn wink(&self, target_id: Uuid) -> CoreResult<()> {
        self.send_unit(
            self.http
                .post(self.url("/wink"))
                .json(&SwipeRequest { target_id }),
        )
        .await
    }

    async fn matches(&self) -> CoreResult<Vec<Match>> {
        self.send(self.http.get(self.url("/matches"))).await
    }

    async fn messages(&self, match_id: Uuid) -> CoreResult<Vec<Message>> {
        self.send(
            self.http
                .get(self.url(&format!("/matches/{match_id}/messages"))),
        )
        .await
    }

    async fn send_message(&self, outgoing: &OutgoingMessage) -> CoreResult<Message> {
        self.send(self.http.post(self.url("/messages")).json(outgoing))
            .await
    }

    async fn delete_message(&self, message_id: Uuid) -> CoreResult<()> {
        self.send_unit(
            self.http
                .delete(self.url(&format!("/messages/{message_id}"))),
        )
        .await
    }

    async fn subscription_status(&self) -> CoreResult<EntitlementState> {
        self.send(self.http.get(self.url("/subscription/status")))
            .await
    }

    async fn who_liked_me(&self) -> CoreResult<Vec<Profile>> {
        self.send(self.http.get(self.url("/who-liked-me"))).await
    }

    async fn who_viewed_me(&self) -> CoreResult<Vec<Profile>> {
        self.send(self.http.get(self.url("/who-viewed-me"))).await
    }

    async fn block(&self, target_id: Uuid) -> CoreResult<()> {
        self.send_unit(
            self.http
                .post(self.url("/block"))
                .json(&SwipeRequest { target_id }),
        )
        .await
    }

    async fn unblock(&self, target_id: Uuid) -> CoreResult<()> {
        self.send_unit(
            self.http
                .post(self.url("/unblock"))
                .json(&SwipeRequest { target_id }),
        )
        .await
    }

    async fn report(&self, target_id: Uuid, reason: &str) -> CoreResult<()> {
        self.send_unit(self.http.post(self.url("/report")).json(&ReportRequest {
            target_id,
            reason: reason.to_string(),
        }))
        .await
    }

    async fn blocked_users(&self) -> CoreResult<Vec<Uuid>> {
        self.send(self.http.get(self.url("/blocked-users"))).await
    }
}
