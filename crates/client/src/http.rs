use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use procura_core::backend::{
    ApprovalStepOutcome, ApprovalStepRequest, BackendError, DocumentUpload, IdempotencyKey,
    ProcurementBackend, SelectVendorRequest, SessionObserver, SubmitBidRequest,
};
use procura_core::config::BackendConfig;
use procura_core::domain::approval::{ApprovalId, ApprovalItem};
use procura_core::domain::rfq::{Rfq, RfqId, VendorId};
use procura_core::domain::subscription::SubscriptionSnapshot;
use procura_core::domain::tender::{Bid, TenderId};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Talks to the procurement REST backend. Every request carries the bearer
/// credential and is bounded by the configured timeout.
#[derive(Clone)]
pub struct HttpProcurementBackend {
    http_client: Client,
    base_url: Url,
    token: Option<SecretString>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl HttpProcurementBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| BackendError::Transport(format!("failed to build client: {error}")))?;
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|error| {
            BackendError::Transport(format!("invalid base url `{}`: {error}", config.base_url))
        })?;

        Ok(Self {
            http_client,
            base_url,
            token: config.api_token.clone(),
            observer: None,
        })
    }

    pub fn with_session_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so ids containing `/`, `?` or `#` stay inside their segment.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::Transport(format!("base url `{}` cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn execute(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = self.authorize(builder).send().await.map_err(|error| {
            let error = transport_error(&error);
            log_failure(operation, &error);
            error
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            if let Some(observer) = &self.observer {
                observer.session_expired();
            }
            BackendError::SessionExpired { status: status.as_u16() }
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            BackendError::Rejected { status: status.as_u16(), message: error_message(&body) }
        };
        log_failure(operation, &error);
        Err(error)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.execute(operation, builder).await?;
        decode(operation, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let body = response.bytes().await.map_err(|error| transport_error(&error))?;
    serde_json::from_slice(&body).map_err(|error| {
        let error = BackendError::Decode(format!("{operation}: {error}"));
        log_failure(operation, &error);
        error
    })
}

fn transport_error(error: &reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(error.to_string())
    }
}

/// Pulls `message` out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned())
}

fn log_failure(operation: &'static str, error: &BackendError) {
    tracing::warn!(
        event_name = "backend.request_failed",
        operation,
        error_class = error.error_class(),
        error = %error,
        "backend request failed"
    );
}

#[async_trait]
impl ProcurementBackend for HttpProcurementBackend {
    async fn subscription(&self) -> Result<SubscriptionSnapshot, BackendError> {
        let request = self.http_client.get(self.url(&["subscription"])?);
        self.fetch("subscription", request).await
    }

    async fn pending_approvals(&self) -> Result<Vec<ApprovalItem>, BackendError> {
        let request = self.http_client.get(self.url(&["approvals", "pending-by-user"])?);
        self.fetch("pending_approvals", request).await
    }

    async fn submit_approval_step(
        &self,
        approval_id: &ApprovalId,
        request: &ApprovalStepRequest,
        key: &IdempotencyKey,
    ) -> Result<ApprovalStepOutcome, BackendError> {
        let builder = self
            .http_client
            .post(self.url(&["approvals", approval_id.0.as_str(), "approve-step"])?)
            .header(IDEMPOTENCY_HEADER, key.to_string())
            .json(request);
        self.fetch("submit_approval_step", builder).await
    }

    async fn rfqs(&self) -> Result<Vec<Rfq>, BackendError> {
        let request = self.http_client.get(self.url(&["rfqs"])?);
        self.fetch("rfqs", request).await
    }

    async fn select_vendor(
        &self,
        rfq_id: &RfqId,
        request: &SelectVendorRequest,
        key: &IdempotencyKey,
    ) -> Result<Rfq, BackendError> {
        let builder = self
            .http_client
            .put(self.url(&["rfqs", rfq_id.0.as_str(), "select"])?)
            .header(IDEMPOTENCY_HEADER, key.to_string())
            .json(request);
        self.fetch("select_vendor", builder).await
    }

    async fn bid_for(
        &self,
        vendor_id: &VendorId,
        tender_id: &TenderId,
    ) -> Result<Option<Bid>, BackendError> {
        let request = self
            .http_client
            .get(self.url(&[
                "bids",
                "vendor",
                vendor_id.0.as_str(),
                "tender",
                tender_id.0.as_str(),
            ])?);
        match self.fetch("bid_for", request).await {
            Err(BackendError::Rejected { status: 404, .. }) => Ok(None),
            other => other,
        }
    }

    async fn upload_bid_document(
        &self,
        upload: &DocumentUpload,
        key: &IdempotencyKey,
    ) -> Result<Bid, BackendError> {
        let file = Part::bytes(upload.content.clone()).file_name(upload.file_name.clone());
        let form = Form::new()
            .part("documents", file)
            .text("bidId", upload.bid_id.0.clone())
            .text("tenderId", upload.tender_id.0.clone())
            .text("vendorId", upload.vendor_id.0.clone())
            .text("documentType", upload.document_type.as_str());

        let builder = self
            .http_client
            .post(self.url(&["bids", "documents"])?)
            .header(IDEMPOTENCY_HEADER, key.to_string())
            .multipart(form);
        self.fetch("upload_bid_document", builder).await
    }

    async fn submit_bid(
        &self,
        request: &SubmitBidRequest,
        key: &IdempotencyKey,
    ) -> Result<Bid, BackendError> {
        let builder = self
            .http_client
            .post(self.url(&["bids", "submit"])?)
            .header(IDEMPOTENCY_HEADER, key.to_string())
            .json(request);
        self.fetch("submit_bid", builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::error_message;

    #[test]
    fn error_message_prefers_json_message_field() {
        assert_eq!(error_message(r#"{"message":"rfq has no quotes"}"#), "rfq has no quotes");
        assert_eq!(error_message("  plain failure \n"), "plain failure");
        assert_eq!(error_message(r#"{"error":"x"}"#), r#"{"error":"x"}"#);
    }
}
