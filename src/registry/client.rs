use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::registry::models::{CredentialSet, HealthInfo, Manifest};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Client for the registry helper micro-service
///
/// Every request carries `Authorization: Bearer {auth_token}`, even with an
/// empty token. The client keeps no state between calls besides its
/// configuration, so it can be shared freely across concurrent callers.
pub struct RegistryHelperClient {
    transport: Arc<dyn HttpTransport>,
    auth_token: String,
}

impl RegistryHelperClient {
    pub fn new(transport: Arc<dyn HttpTransport>, auth_token: impl Into<String>) -> Self {
        Self {
            transport,
            auth_token: auth_token.into(),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, RegistryError> {
        let mut request = HttpRequest::new(method, path)
            .header("Authorization", format!("Bearer {}", self.auth_token));
        if let Some(body) = body {
            request = request.body(body);
        }
        self.transport.request(request).await
    }

    fn status_error(method: &Method, path: &str, response: &HttpResponse) -> RegistryError {
        RegistryError::Status {
            method: method.to_string(),
            path: path.to_string(),
            status: response.status,
            body: response.text(),
        }
    }

    /// GET a JSON document, translating 404 into `None`
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: String,
    ) -> Result<Option<T>, RegistryError> {
        let response = self.send(Method::GET, path.clone(), None).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(Self::status_error(&Method::GET, &path, &response));
        }
        response.json(&path).map(Some)
    }

    /// GET a JSON document that must exist
    async fn get_required<T: DeserializeOwned>(&self, path: String) -> Result<T, RegistryError> {
        let response = self.send(Method::GET, path.clone(), None).await?;
        if !response.is_success() {
            return Err(Self::status_error(&Method::GET, &path, &response));
        }
        response.json(&path)
    }

    /// Look up a repository record
    ///
    /// Returns `None` if the helper reports the repository as absent.
    pub async fn get_repository(&self, repository: &str) -> Result<Option<Value>, RegistryError> {
        let path = format!("/repo/{}", repository);
        debug!("Checking whether repository exists: {}", path);
        self.get_optional(path).await
    }

    /// Create a repository; the response body is not inspected
    pub async fn create_repository(&self, repository: &str) -> Result<(), RegistryError> {
        let path = format!("/repo/{}", repository);
        info!("Creating repository: {}", path);
        let response = self
            .send(Method::POST, path.clone(), Some(Vec::new()))
            .await?;
        if !response.is_success() {
            return Err(Self::status_error(&Method::POST, &path, &response));
        }
        Ok(())
    }

    /// Make sure the repository exists, creating it if absent
    ///
    /// Returns true if it already existed, false if it was just created.
    /// Safe to call repeatedly: an existing repository costs a single GET.
    pub async fn ensure_repository_exists(&self, repository: &str) -> Result<bool, RegistryError> {
        match self.get_repository(repository).await? {
            Some(_) => Ok(true),
            None => {
                self.create_repository(repository).await?;
                Ok(false)
            }
        }
    }

    /// Look up an image tag through the helper's own endpoint
    pub async fn get_image(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<Manifest>, RegistryError> {
        let path = format!("/image/{}:{}", image, tag);
        debug!("Checking whether image exists: {}", path);
        self.get_optional(path).await
    }

    /// Fetch pull credentials for an image
    ///
    /// `None` means the helper does not issue credentials for this image.
    pub async fn get_token(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<Option<CredentialSet>, RegistryError> {
        let path = format!("/token/{}:{}", image, tag);
        debug!("Fetching registry credentials: {}", path);
        self.get_optional(path).await
    }

    /// List all repositories known to the helper
    pub async fn list_repositories(&self) -> Result<Vec<Value>, RegistryError> {
        debug!("Listing repositories");
        let repos: Option<Vec<Value>> = self.get_required("/repos".to_string()).await?;
        Ok(repos.unwrap_or_default())
    }

    /// Delete a repository and all its images
    ///
    /// Deleting an absent repository is not an error.
    pub async fn delete_repository(&self, repository: &str) -> Result<(), RegistryError> {
        let path = format!("/repo/{}", repository);
        info!("Deleting repository: {}", path);
        let response = self.send(Method::DELETE, path.clone(), None).await?;
        if response.is_success() || response.is_not_found() {
            return Ok(());
        }
        Err(Self::status_error(&Method::DELETE, &path, &response))
    }

    /// Version information reported by the helper
    pub async fn health(&self) -> Result<HealthInfo, RegistryError> {
        self.get_required("/health".to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::FakeTransport;
    use serde_json::json;

    fn client(transport: &Arc<FakeTransport>) -> RegistryHelperClient {
        RegistryHelperClient::new(transport.clone(), "secret")
    }

    #[tokio::test]
    async fn test_ensure_existing_repository_only_looks_up() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repo/foo", 200, r#"{"name":"foo"}"#);

        let client = client(&transport);
        assert!(client.ensure_repository_exists("foo").await.unwrap());
        assert!(client.ensure_repository_exists("foo").await.unwrap());

        assert_eq!(
            transport.calls(),
            vec!["GET /repo/foo".to_string(), "GET /repo/foo".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ensure_absent_repository_creates_then_observes() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repo/org/foo", 404, "null");
        transport.respond(Method::POST, "/repo/org/foo", 201, "");
        transport.respond(Method::GET, "/repo/org/foo", 200, r#"{"name":"org/foo"}"#);

        let client = client(&transport);
        assert!(!client.ensure_repository_exists("org/foo").await.unwrap());
        assert!(client.ensure_repository_exists("org/foo").await.unwrap());

        assert_eq!(
            transport.calls(),
            vec![
                "GET /repo/org/foo".to_string(),
                "POST /repo/org/foo".to_string(),
                "GET /repo/org/foo".to_string(),
            ]
        );
        let post = &transport.requests()[1];
        assert_eq!(post.body, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_bearer_header_on_every_request() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repo/foo", 404, "null");
        transport.respond(Method::POST, "/repo/foo", 200, "{}");

        client(&transport)
            .ensure_repository_exists("foo")
            .await
            .unwrap();

        for request in transport.requests() {
            assert!(request
                .headers
                .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
        }
    }

    #[tokio::test]
    async fn test_empty_token_still_sends_bearer_header() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/health", 200, r#"{"version":"1.0"}"#);

        let client = RegistryHelperClient::new(transport.clone(), "");
        let health = client.health().await.unwrap();
        assert_eq!(health.version, "1.0");
        assert_eq!(
            transport.requests()[0].headers,
            vec![("Authorization".to_string(), "Bearer ".to_string())]
        );
    }

    #[tokio::test]
    async fn test_lookup_error_is_fatal_and_skips_create() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repo/foo", 403, r#"{"error": "not authorised"}"#);

        let err = client(&transport)
            .ensure_repository_exists("foo")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(transport.calls(), vec!["GET /repo/foo".to_string()]);
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repo/foo", 404, "null");
        transport.respond(Method::POST, "/repo/foo", 500, r#"{"error": "quota"}"#);

        let err = client(&transport)
            .ensure_repository_exists("foo")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Status { ref method, status: 500, .. } if method == "POST"
        ));
    }

    #[tokio::test]
    async fn test_success_with_invalid_json_is_decode_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repo/foo", 200, "not json");

        let err = client(&transport).get_repository("foo").await.unwrap_err();
        assert!(matches!(err, RegistryError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_get_token_not_found_is_none() {
        let transport = Arc::new(FakeTransport::new());
        let client = client(&transport);
        assert!(client.get_token("foo", "v1").await.unwrap().is_none());
        assert_eq!(transport.calls(), vec!["GET /token/foo:v1".to_string()]);
    }

    #[tokio::test]
    async fn test_list_repositories() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(
            Method::GET,
            "/repos",
            200,
            r#"[{"repositoryName":"a"},{"repositoryName":"b"}]"#,
        );
        let repos = client(&transport).list_repositories().await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0], json!({"repositoryName": "a"}));
    }

    #[tokio::test]
    async fn test_list_repositories_null_is_empty() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/repos", 200, "null");
        assert!(client(&transport)
            .list_repositories()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_repository_is_idempotent() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::DELETE, "/repo/foo", 200, "");
        transport.respond(Method::DELETE, "/repo/foo", 404, "null");
        transport.respond(Method::DELETE, "/repo/foo", 500, "boom");

        let client = client(&transport);
        client.delete_repository("foo").await.unwrap();
        client.delete_repository("foo").await.unwrap();
        assert_eq!(
            client.delete_repository("foo").await.unwrap_err().status(),
            Some(500)
        );
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail(Method::GET, "/image/foo:v1", "connection refused");

        let err = client(&transport).get_image("foo", "v1").await.unwrap_err();
        assert!(matches!(err, RegistryError::Transport { ref message, .. } if message == "connection refused"));
    }
}
