use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode, header::ACCEPT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::AppConfig;
use crate::domain::hosting::{MergeRequest, Project, Release};
use crate::error::{AppError, AppResult};
use crate::services::{HostingService, MergeRequestQuery};

const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const MERGED_STATE: &str = "merged";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// GitLab REST API v4 client. One instance per invocation.
pub struct GitLabClient {
    http: Client,
    base_url: String,
    private_token: Option<String>,
}

impl GitLabClient {
    pub fn new(
        base_url: &str,
        private_token: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| AppError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            private_token,
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::new(&config.gitlab_url, config.private_token.clone(), config.timeout)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        debug!(path, ?query, "requesting GitLab API");

        let mut request = self
            .http
            .get(self.endpoint(path))
            .header(ACCEPT, "application/json")
            .query(query);
        if let Some(token) = &self.private_token {
            request = request.header(PRIVATE_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AppError::Transport(format!("failed to call GitLab: {err}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read response>".to_string());
            return Err(AppError::HostingApi {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| AppError::Transport(format!("failed to read GitLab response: {err}")))?;
        serde_json::from_str(&body)
            .map_err(|err| AppError::Transport(format!("failed to parse GitLab response: {err}")))
    }
}

#[async_trait]
impl HostingService for GitLabClient {
    async fn resolve_project(&self, project_id: u64) -> AppResult<Project> {
        let project: GitLabProject = self
            .get_json(&format!("/projects/{project_id}"), &[])
            .await
            .map_err(|err| match err {
                AppError::NotFound(_) => {
                    AppError::NotFound(format!("project {project_id}"))
                }
                other => other,
            })?;
        Ok(project.into())
    }

    async fn list_releases(&self, project: &Project) -> AppResult<Vec<Release>> {
        let releases: Vec<GitLabRelease> = self
            .get_json(
                &format!("/projects/{}/releases", project.id),
                &[("per_page", "1".to_string())],
            )
            .await?;
        Ok(releases.into_iter().map(Release::from).collect())
    }

    async fn list_merge_requests(
        &self,
        project: &Project,
        query: &MergeRequestQuery,
    ) -> AppResult<Vec<MergeRequest>> {
        let merge_requests: Vec<GitLabMergeRequest> = self
            .get_json(
                &format!("/projects/{}/merge_requests", project.id),
                &merge_request_params(query),
            )
            .await?;
        Ok(merge_requests.into_iter().map(MergeRequest::from).collect())
    }
}

fn merge_request_params(query: &MergeRequestQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("state", MERGED_STATE.to_string()),
        ("page", query.page.to_string()),
    ];
    if let Some(per_page) = query.per_page {
        params.push(("per_page", per_page.to_string()));
    }
    if let Some(updated_after) = query.updated_after {
        params.push(("updated_after", format_timestamp(updated_after)));
    }
    if let Some(branch) = &query.target_branch {
        params.push(("target_branch", branch.clone()));
    }
    if let Some(order_by) = query.order_by {
        params.push(("order_by", order_by.as_str().to_string()));
    }
    if let Some(sort) = query.sort {
        params.push(("sort", sort.as_str().to_string()));
    }
    params
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Deserialize)]
struct GitLabProject {
    id: u64,
    name: String,
}

impl From<GitLabProject> for Project {
    fn from(project: GitLabProject) -> Self {
        Self {
            id: project.id,
            name: project.name,
        }
    }
}

#[derive(Deserialize)]
struct GitLabRelease {
    name: Option<String>,
    tag_name: String,
    released_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<GitLabRelease> for Release {
    fn from(release: GitLabRelease) -> Self {
        Self {
            name: release
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(release.tag_name),
            released_at: release.released_at.unwrap_or(release.created_at),
        }
    }
}

#[derive(Deserialize)]
struct GitLabMergeRequest {
    title: String,
    author: GitLabUser,
    merged_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    target_branch: String,
}

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
}

impl From<GitLabMergeRequest> for MergeRequest {
    fn from(mr: GitLabMergeRequest) -> Self {
        Self {
            title: mr.title,
            author: mr.author.username,
            merged_at: mr.merged_at,
            updated_at: mr.updated_at,
            target_branch: mr.target_branch,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::services::{OrderBy, SortDirection};

    fn client(server: &MockServer, token: Option<&str>) -> GitLabClient {
        GitLabClient::new(&server.uri(), token.map(str::to_string), Duration::from_secs(5)).unwrap()
    }

    fn demo() -> Project {
        Project {
            id: 42,
            name: "Demo".to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_project_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .and(header("PRIVATE-TOKEN", "glpat-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "name": "Demo",
                "path_with_namespace": "group/demo"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let project = client(&server, Some("glpat-secret"))
            .resolve_project(42)
            .await
            .unwrap();

        assert_eq!(project, demo());
    }

    #[tokio::test]
    async fn anonymous_requests_omit_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .and(header_exists("PRIVATE-TOKEN"))
            .respond_with(ResponseTemplate::new(401))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "name": "Demo"})))
            .mount(&server)
            .await;

        let project = client(&server, None).resolve_project(42).await.unwrap();

        assert_eq!(project.name, "Demo");
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/404"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "404 Project Not Found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server, None).resolve_project(404).await.unwrap_err();

        match err {
            AppError::NotFound(message) => assert_eq!(message, "project 404"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server, None).resolve_project(42).await.unwrap_err();

        match err {
            AppError::HostingApi { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = client(&server, None).resolve_project(42).await.unwrap_err();

        assert!(matches!(err, AppError::Transport(_)));
    }

    #[tokio::test]
    async fn lists_latest_release_with_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/releases"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "name": null,
                    "tag_name": "v1.0",
                    "released_at": null,
                    "created_at": "2024-01-01T00:00:00.000Z"
                }
            ])))
            .mount(&server)
            .await;

        let releases = client(&server, None).list_releases(&demo()).await.unwrap();

        assert_eq!(
            releases,
            vec![Release {
                name: "v1.0".to_string(),
                released_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            }]
        );
    }

    #[tokio::test]
    async fn lists_merge_requests_with_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests"))
            .and(query_param("state", "merged"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "20"))
            .and(query_param("updated_after", "2024-01-01T00:00:00Z"))
            .and(query_param("target_branch", "main"))
            .and(query_param("order_by", "updated_at"))
            .and(query_param("sort", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "iid": 3,
                    "title": "Fix bug",
                    "author": {"id": 1, "username": "alice", "name": "Alice"},
                    "merged_at": "2024-01-02T10:00:00.000Z",
                    "updated_at": "2024-01-05T08:00:00.000Z",
                    "target_branch": "main"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = MergeRequestQuery::merged(Some("main".to_string()))
            .updated_after("2024-01-01T00:00:00Z".parse().unwrap())
            .ordered(OrderBy::UpdatedAt, SortDirection::Ascending)
            .per_page(20);
        query.page = 2;

        let merge_requests = client(&server, None)
            .list_merge_requests(&demo(), &query)
            .await
            .unwrap();

        assert_eq!(merge_requests.len(), 1);
        let mr = &merge_requests[0];
        assert_eq!(mr.title, "Fix bug");
        assert_eq!(mr.author, "alice");
        assert_eq!(mr.merged_at, Some("2024-01-02T10:00:00Z".parse().unwrap()));
        assert_eq!(mr.updated_at, "2024-01-05T08:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn optional_parameters_are_omitted_when_unset() {
        let params = merge_request_params(&MergeRequestQuery::merged(None));
        assert_eq!(
            params,
            vec![("state", "merged".to_string()), ("page", "1".to_string())]
        );

        let params = merge_request_params(&MergeRequestQuery::merged(None).per_page(1));
        assert!(params.contains(&("per_page", "1".to_string())));
        assert!(!params.iter().any(|(key, _)| *key == "updated_after"));
        assert!(!params.iter().any(|(key, _)| *key == "target_branch"));
    }
}
