//! HTTP implementation of the instance client.
//!
//! Every response from the instances API is wrapped in an envelope:
//!
//! ```text
//! {"status": "success", "data": {"instances": [ {...}, ... ]}}
//! {"status": "error", "message": "...", "data": {"instances": [{"status": "error", "error": 404, ...}]}}
//! ```
//!
//! A 404, either as the HTTP status or as the per-item `error` code, is
//! reported as [`ClientError::NotFound`].

use async_trait::async_trait;
use kraftcloud_core::InstanceId;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::client::InstanceClient;
use crate::config::{ClientConfig, ConfigError};
use crate::error::{ClientError, Result};
use crate::types::{CreateInstancePayload, CreatedInstance, Instance, InstanceSummary};

/// HTTP client for the instances API.
#[derive(Debug, Clone)]
pub struct HttpInstanceClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpInstanceClient {
    /// Create a new client from a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HttpClient` if the underlying HTTP client cannot
    /// be built.
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create a new client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    /// Get the base URL of the API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.config.endpoint);
        let builder = self.client.request(method, url);
        match &self.config.user {
            Some(user) => builder.basic_auth(user, Some(&self.config.token)),
            None => builder.bearer_auth(&self.config.token),
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Request(format!("failed to read response body: {e}")))?;
        Ok((status, body))
    }
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    instances: Vec<serde_json::Value>,
}

/// Error entry inside `data.instances`.
#[derive(Debug, Deserialize)]
struct ItemError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<u16>,
}

/// Decode the items of an envelope, mapping error entries to `ClientError`.
///
/// `subject` names what was addressed and ends up in `NotFound`.
fn decode_items<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    subject: &str,
) -> Result<Vec<T>> {
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(subject.to_string()));
    }

    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            let message = body.trim();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message.to_string()
                },
            });
        }
        Err(e) => return Err(ClientError::InvalidResponse(e.to_string())),
    };

    let items = envelope.data.unwrap_or_default().instances;

    for item in &items {
        if item.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let err: ItemError = serde_json::from_value(item.clone())
                .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
            return match err.error {
                Some(404) => Err(ClientError::NotFound(subject.to_string())),
                code => Err(ClientError::Api {
                    status: code.unwrap_or_else(|| status.as_u16()),
                    message: err
                        .message
                        .or(envelope.message)
                        .unwrap_or_else(|| "unknown error".to_string()),
                }),
            };
        }
    }

    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| status.to_string()),
        });
    }

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| ClientError::InvalidResponse(e.to_string()))
        })
        .collect()
}

fn single<T>(items: Vec<T>, what: &str) -> Result<T> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::InvalidResponse(format!("{what}: response contained no instance")))
}

#[async_trait]
impl InstanceClient for HttpInstanceClient {
    async fn create(&self, payload: &CreateInstancePayload) -> Result<CreatedInstance> {
        let builder = self.request(Method::POST, "/v1/instances").json(payload);
        let (status, body) = self.execute(builder).await?;

        let created = single(
            decode_items::<CreatedInstance>(status, &body, &payload.image)?,
            "create",
        )?;

        tracing::debug!(uuid = %created.uuid, image = %payload.image, "Created instance via API");
        Ok(created)
    }

    async fn get(&self, uuid: &InstanceId) -> Result<Instance> {
        let builder = self.request(Method::GET, &format!("/v1/instances/{uuid}"));
        let (status, body) = self.execute(builder).await?;

        let instance = single(
            decode_items::<Instance>(status, &body, &uuid.to_string())?,
            "get",
        )?;

        if instance.uuid != *uuid {
            return Err(ClientError::InvalidResponse(format!(
                "requested instance {uuid} but received {}",
                instance.uuid
            )));
        }

        tracing::debug!(uuid = %uuid, state = ?instance.state, "Fetched instance status");
        Ok(instance)
    }

    async fn list(&self) -> Result<Vec<InstanceSummary>> {
        let builder = self.request(Method::GET, "/v1/instances");
        let (status, body) = self.execute(builder).await?;

        let instances = decode_items::<InstanceSummary>(status, &body, "instances")?;
        tracing::debug!(count = instances.len(), "Listed instances");
        Ok(instances)
    }

    async fn delete(&self, uuid: &InstanceId) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/v1/instances/{uuid}"));
        let (status, body) = self.execute(builder).await?;

        if !(status.is_success() && body.trim().is_empty()) {
            decode_items::<serde_json::Value>(status, &body, &uuid.to_string())?;
        }

        tracing::debug!(uuid = %uuid, "Deleted instance via API");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Handler, InstanceStatus, ServiceGroupPayload, ServicePayload};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UUID: &str = "6c3a3f6e-6a8b-4d6e-9f52-0b3f1c1f7a11";

    fn client_for(server: &MockServer) -> HttpInstanceClient {
        HttpInstanceClient::new(ClientConfig::new(server.uri(), "test-token")).unwrap()
    }

    fn uuid() -> InstanceId {
        UUID.parse().unwrap()
    }

    #[test]
    fn http_client_creation() {
        let client =
            HttpInstanceClient::new(ClientConfig::new("http://localhost:8080/", "t")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn create_posts_payload_with_bearer_auth() {
        let server = MockServer::start().await;
        let payload = CreateInstancePayload {
            image: "nginx:latest".to_string(),
            args: vec!["-g".to_string(), "daemon off;".to_string()],
            memory_mb: 128,
            service_group: Some(ServiceGroupPayload {
                services: vec![ServicePayload {
                    port: 443,
                    destination_port: 80,
                    handlers: vec![Handler::Http, Handler::Tls],
                }],
            }),
            autostart: None,
        };

        Mock::given(method("POST"))
            .and(path("/v1/instances"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({
                "image": "nginx:latest",
                "args": ["-g", "daemon off;"],
                "memory_mb": 128,
                "service_group": {"services": [
                    {"port": 443, "destination_port": 80, "handlers": ["http", "tls"]}
                ]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"instances": [{
                    "status": "success",
                    "uuid": UUID,
                    "name": "nginx-1a2b",
                    "fqdn": "nginx-1a2b.fra0.kraft.host",
                    "private_ip": "10.0.0.5"
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client_for(&server).create(&payload).await.unwrap();
        assert_eq!(created.uuid, uuid());
        assert_eq!(created.fqdn.as_deref(), Some("nginx-1a2b.fra0.kraft.host"));
        assert!(created.private_fqdn.is_none());
    }

    #[tokio::test]
    async fn basic_auth_when_user_configured() {
        let server = MockServer::start().await;
        let mut config = ClientConfig::new(server.uri(), "token");
        config.user = Some("alice".to_string());

        // base64("alice:token")
        Mock::given(method("GET"))
            .and(path("/v1/instances"))
            .and(header("authorization", "Basic YWxpY2U6dG9rZW4="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"instances": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpInstanceClient::new(config).unwrap();
        assert!(client.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_decodes_full_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/instances/{UUID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"instances": [{
                    "status": "success",
                    "uuid": UUID,
                    "name": "nginx-1a2b",
                    "created_at": "2024-01-15T10:30:00Z",
                    "state": "running",
                    "image": "nginx@sha256:abcd",
                    "memory_mb": 128,
                    "args": [],
                    "env": {"PATH": "/bin"},
                    "service_group": {"uuid": "0d6c1ad4-7d52-4a89-9a3f-6e7a2d1f9b00", "name": "nginx-svc"},
                    "network_interfaces": [{
                        "uuid": "1b7f2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d",
                        "private_ip": "10.0.0.5",
                        "mac": "02:00:0a:00:00:05"
                    }],
                    "boot_time_us": 15321
                }]}
            })))
            .mount(&server)
            .await;

        let instance = client_for(&server).get(&uuid()).await.unwrap();
        assert_eq!(instance.state, Some(InstanceStatus::Running));
        assert_eq!(instance.memory_mb, Some(128));
        assert_eq!(instance.boot_time_us, Some(15321));
        assert_eq!(
            instance.service_group.unwrap().name.as_deref(),
            Some("nginx-svc")
        );
    }

    #[tokio::test]
    async fn http_404_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/instances/{UUID}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).get(&uuid()).await.unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn envelope_404_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/v1/instances/{UUID}")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "error",
                "message": "One or more instances could not be deleted",
                "data": {"instances": [{
                    "status": "error",
                    "uuid": UUID,
                    "message": "No instance with UUID",
                    "error": 404
                }]}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).delete(&uuid()).await.unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instances"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).list().await.unwrap_err();
        match err {
            ClientError::Api { status, ref message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn delete_accepts_empty_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/v1/instances/{UUID}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).delete(&uuid()).await.unwrap();
    }

    #[tokio::test]
    async fn get_rejects_mismatched_uuid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/instances/{UUID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"instances": [{"uuid": "0d6c1ad4-7d52-4a89-9a3f-6e7a2d1f9b00"}]}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get(&uuid()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
