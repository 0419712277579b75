//! Client for the Yuque v2 REST API.
//!
//! Covers the handful of endpoints the exporter needs: the current user, a
//! user's repositories, a repository's TOC and document listing, single
//! document bodies, and the remaining request quota. Every request carries
//! the access token in the `X-Auth-Token` header.

mod paginate;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use yuque_export_shared::{
    AUTH_HEADER, ApiEnvelope, ClientConfig, DocDetail, DocId, DocSummary, ExportError, ListResponse, RepoId,
    Repository, Result, TocEntry, User,
};

pub use paginate::{PAGE_SIZE, paginate};

/// Response header reporting the remaining hourly quota.
const RATE_LIMIT_HEADER: &str = "x-ratelimit-remaining";

// ---------------------------------------------------------------------------
// YuqueClient
// ---------------------------------------------------------------------------

/// Authenticated API client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct YuqueClient {
    client: Client,
    base_url: String,
}

impl YuqueClient {
    /// Build a client from an explicit configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut token = HeaderValue::from_str(&config.token)
            .map_err(|_| ExportError::config("access token contains invalid characters"))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(AUTH_HEADER), token);

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExportError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// The authenticated user.
    pub async fn current_user(&self) -> Result<User> {
        self.get_data("/user", &[]).await
    }

    /// Repositories owned by `user_id`.
    #[instrument(skip(self))]
    pub async fn list_repos(&self, user_id: u64) -> Result<Vec<Repository>> {
        let repos: Vec<Repository> = self.get_data(&format!("/users/{user_id}/repos"), &[]).await?;
        debug!(count = repos.len(), "listed repositories");
        Ok(repos)
    }

    /// The full, ordered TOC of a repository.
    #[instrument(skip(self))]
    pub async fn repo_toc(&self, repo_id: RepoId) -> Result<Vec<TocEntry>> {
        let toc: Vec<TocEntry> = self.get_data(&format!("/repos/{repo_id}/toc"), &[]).await?;
        debug!(entries = toc.len(), "fetched TOC");
        Ok(toc)
    }

    /// One page of a repository's document listing.
    pub async fn list_docs_page(
        &self,
        repo_id: RepoId,
        offset: usize,
        limit: usize,
    ) -> Result<ListResponse<DocSummary>> {
        self.get_json(
            &format!("/repos/{repo_id}/docs"),
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Every document of a repository, across all pages.
    #[instrument(skip(self))]
    pub async fn list_docs(&self, repo_id: RepoId) -> Result<ListResponse<DocSummary>> {
        let client = self;
        let docs =
            paginate(move |offset, limit| client.list_docs_page(repo_id, offset, limit)).await?;
        debug!(count = docs.data.len(), total = docs.meta.total, "listed documents");
        Ok(docs)
    }

    /// Raw markup body of one document.
    #[instrument(skip(self))]
    pub async fn doc_body(&self, repo_id: RepoId, doc_id: DocId) -> Result<String> {
        let doc: DocDetail = self
            .get_data(&format!("/repos/{repo_id}/docs/{doc_id}"), &[])
            .await?;
        Ok(doc.body)
    }

    /// Remaining API requests for the current hour, if the server reports it.
    pub async fn rate_limit_remaining(&self) -> Result<Option<u64>> {
        let url = self.endpoint("/user");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExportError::fetch(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Api {
                url,
                status: status.as_u16(),
            });
        }

        let remaining = response
            .headers()
            .get(RATE_LIMIT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Ok(remaining)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a `{data: T}` envelope and unwrap it.
    async fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let envelope: ApiEnvelope<T> = self.get_json(path, query).await?;
        Ok(envelope.data)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ExportError::fetch(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Api {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExportError::fetch(&url, format!("failed to read body: {e}")))?;

        serde_json::from_str(&body).map_err(|e| ExportError::parse(format!("{url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> YuqueClient {
        let config = ClientConfig {
            base_url: format!("{}/api/v2", server.uri()).parse().unwrap(),
            token: "test-token".into(),
            timeout: Duration::from_secs(5),
            user_agent: "yuque-export-test".into(),
        };
        YuqueClient::new(&config).unwrap()
    }

    fn docs_page(start: usize, count: usize, total: usize) -> serde_json::Value {
        let data: Vec<_> = (start..start + count)
            .map(|i| serde_json::json!({"id": i + 1, "title": format!("Doc {}", i + 1), "slug": format!("doc-{}", i + 1)}))
            .collect();
        serde_json::json!({"meta": {"total": total}, "data": data})
    }

    #[tokio::test]
    async fn current_user_sends_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/user"))
            .and(header("X-Auth-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"data": {"id": 7, "login": "alice", "name": "Alice"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server).current_user().await.unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.login, "alice");
    }

    #[tokio::test]
    async fn list_docs_walks_every_page() {
        let server = MockServer::start().await;

        for (offset, count) in [(0, 100), (100, 100), (200, 37)] {
            Mock::given(method("GET"))
                .and(path("/api/v2/repos/9/docs"))
                .and(query_param("offset", offset.to_string()))
                .and(query_param("limit", "100"))
                .respond_with(ResponseTemplate::new(200).set_body_json(docs_page(offset, count, count)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let docs = client_for(&server).list_docs(9).await.unwrap();
        assert_eq!(docs.data.len(), 237);
        assert_eq!(docs.meta.total, 237);
        assert_eq!(docs.data[0].id, 1);
        assert_eq!(docs.data[236].title, "Doc 237");
    }

    #[tokio::test]
    async fn repo_toc_preserves_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/repos/3/toc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": [
                {"type": "TITLE", "title": "Guide", "uuid": "a", "parent_uuid": "", "depth": 1},
                {"type": "DOC", "title": "Intro", "uuid": "b", "parent_uuid": "a", "id": 11, "depth": 2}
            ]})))
            .mount(&server)
            .await;

        let toc = client_for(&server).repo_toc(3).await.unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].title, "Guide");
        assert_eq!(toc[1].id, Some(11));
    }

    #[tokio::test]
    async fn doc_body_unwraps_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/repos/3/docs/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"data": {"id": 11, "title": "Intro", "body": "# Hello"}}),
            ))
            .mount(&server)
            .await;

        let body = client_for(&server).doc_body(3, 11).await.unwrap();
        assert_eq!(body, "# Hello");
    }

    #[tokio::test]
    async fn error_status_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/repos/404/toc"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).repo_toc(404).await.unwrap_err();
        assert!(matches!(err, ExportError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).current_user().await.unwrap_err();
        assert!(matches!(err, ExportError::Parse { .. }));
    }

    #[tokio::test]
    async fn rate_limit_header_is_read() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-RateLimit-Remaining", "4999")
                    .set_body_json(serde_json::json!({"data": {"id": 1}})),
            )
            .mount(&server)
            .await;

        let remaining = client_for(&server).rate_limit_remaining().await.unwrap();
        assert_eq!(remaining, Some(4999));
    }

    #[tokio::test]
    async fn missing_rate_limit_header_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"id": 1}})))
            .mount(&server)
            .await;

        let remaining = client_for(&server).rate_limit_remaining().await.unwrap();
        assert_eq!(remaining, None);
    }
}
