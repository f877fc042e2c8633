//! HTTP implementation of the remote upsert client.

use reqwest::header::ACCEPT;
use serde::Serialize;

use super::{classify_response, RemoteError, RemoteUpsert, UpsertReceipt};
use crate::config::SinkConfig;
use crate::error::Result;
use crate::models::{Record, RecordFields, WriteMode};

/// Stateless client posting rows to the sheet endpoint.
///
/// Holds only the connection pool; endpoint, token, and timeout come from the
/// [`SinkConfig`] passed to each call.
#[derive(Clone)]
pub struct HttpUpsertClient {
    client: reqwest::Client,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    mode: WriteMode,
    #[serde(flatten)]
    fields: &'a RecordFields,
}

impl HttpUpsertClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("linklog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Check that the endpoint is reachable and accepts the token.
    pub async fn test_connection(&self, config: &SinkConfig) -> std::result::Result<(), RemoteError> {
        let response = self
            .client
            .get(config.endpoint_url())
            .bearer_auth(config.token())
            .header(ACCEPT, "application/json")
            .timeout(config.request_timeout())
            .send()
            .await
            .map_err(|error| RemoteError::from_transport(&error))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(endpoint = config.endpoint_url(), "Remote connection test passed");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        match classify_response(status, &body) {
            Err(error) => Err(error),
            Ok(_) => Err(RemoteError::protocol(
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unexpected status")
                ),
                false,
            )),
        }
    }
}

impl RemoteUpsert for HttpUpsertClient {
    async fn send(
        &self,
        config: &SinkConfig,
        record: &Record,
        mode: WriteMode,
    ) -> std::result::Result<UpsertReceipt, RemoteError> {
        let payload = UpsertRequest {
            mode,
            fields: record.fields(),
        };

        let response = self
            .client
            .post(config.endpoint_url())
            .bearer_auth(config.token())
            .header(ACCEPT, "application/json")
            .timeout(config.request_timeout())
            .json(&payload)
            .send()
            .await
            .map_err(|error| RemoteError::from_transport(&error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| RemoteError::from_transport(&error))?;

        let outcome = classify_response(status, &body);
        match &outcome {
            Ok(receipt) => tracing::debug!(
                key = %record.key(),
                %mode,
                row = receipt.remote_id.as_ref().map_or("-", |id| id.as_str()),
                "Remote write accepted"
            ),
            Err(error) => tracing::debug!(
                key = %record.key(),
                %mode,
                kind = %error.kind(),
                status = status.as_u16(),
                "Remote write rejected: {error}"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::models::RemoteRowId;
    use crate::remote::RemoteErrorKind;

    #[derive(Clone, Default)]
    struct FakeSheet {
        requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn record_row(
        State(sheet): State<FakeSheet>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        sheet.requests.lock().unwrap().push((auth.clone(), body));

        if auth.as_deref() != Some("Bearer secret") {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad token" })));
        }
        (StatusCode::OK, Json(json!({ "ok": true, "rowId": 17 })))
    }

    async fn spawn_server(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn sample_record() -> Record {
        Record::new(RecordFields {
            name: "Jane Doe".to_string(),
            company: "Acme".to_string(),
            profile_url: "https://example.com/in/jane".to_string(),
            tag: "rust".to_string(),
            ..RecordFields::default()
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_posts_mode_and_fields_with_bearer_token() {
        let sheet = FakeSheet::default();
        let router = Router::new()
            .route("/exec", post(record_row).get(|| async { StatusCode::OK }))
            .with_state(sheet.clone());
        let addr = spawn_server(router).await;

        let config = SinkConfig::new(format!("http://{addr}/exec"), "secret").unwrap();
        let client = HttpUpsertClient::new().unwrap();
        let receipt = client
            .send(&config, &sample_record(), WriteMode::Append)
            .await
            .unwrap();
        assert_eq!(receipt.remote_id, Some(RemoteRowId::new("17")));

        let requests = sheet.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        let (auth, body) = &requests[0];
        assert_eq!(auth.as_deref(), Some("Bearer secret"));
        assert_eq!(body["mode"], "append");
        assert_eq!(body["profileUrl"], "https://example.com/in/jane");
        assert_eq!(body["company"], "Acme");
        assert_eq!(body.as_object().unwrap().len(), 9);

        client.test_connection(&config).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_classifies_rejected_token_as_auth() {
        let router = Router::new()
            .route("/exec", post(record_row))
            .with_state(FakeSheet::default());
        let addr = spawn_server(router).await;

        let config = SinkConfig::new(format!("http://{addr}/exec"), "wrong").unwrap();
        let error = HttpUpsertClient::new()
            .unwrap()
            .send(&config, &sample_record(), WriteMode::Update)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), RemoteErrorKind::Auth);
        assert!(!error.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_times_out_as_network_error() {
        let router = Router::new().route(
            "/exec",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let addr = spawn_server(router).await;

        let config = SinkConfig::new(format!("http://{addr}/exec"), "secret")
            .unwrap()
            .with_request_timeout(Duration::from_millis(100));
        let error = HttpUpsertClient::new()
            .unwrap()
            .send(&config, &sample_record(), WriteMode::Append)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), RemoteErrorKind::Network);
        assert!(error.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_to_closed_port_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = SinkConfig::new(format!("http://{addr}/exec"), "secret").unwrap();
        let error = HttpUpsertClient::new()
            .unwrap()
            .send(&config, &sample_record(), WriteMode::Append)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), RemoteErrorKind::Network);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connection_reports_http_status() {
        let router = Router::new().route("/exec", post(|| async { StatusCode::OK }));
        let addr = spawn_server(router).await;

        let config = SinkConfig::new(format!("http://{addr}/exec"), "secret").unwrap();
        let error = HttpUpsertClient::new()
            .unwrap()
            .test_connection(&config)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), RemoteErrorKind::Client);
    }
}
