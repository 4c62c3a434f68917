//! Vercel adapter.
//!
//! Vercel deduplicates files by their SHA-1 digest, so every file is uploaded
//! first and the deployment is created afterwards from a manifest that only
//! references digests.

use async_trait::async_trait;
use db::project::Platform;
use reqwest::{header::CONTENT_LENGTH, Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    endpoint, error_body, https_url, upload_all, CreatedDeployment, ProviderAdapter, ProviderDomain,
    ProviderError, ReadyState, UploadOutcome, DEFAULT_ERROR_BODY_LIMIT,
};
use crate::{digest::SiteFile, retry::RetryPolicy};

/// Vercel REST API adapter.
pub struct VercelAdapter {
    client: Client,
    token: String,
    api_url: String,
    team_id: Option<String>,
    error_body_limit: usize,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    file: &'a str,
    sha: &'a str,
    size: u64,
}

#[derive(Serialize)]
struct ProjectSettings {
    framework: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentRequest<'a> {
    name: &'a str,
    files: Vec<ManifestEntry<'a>>,
    target: &'static str,
    project_settings: ProjectSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentResponse {
    id: String,
    url: String,
    #[serde(default)]
    ready_state: Option<String>,
}

#[derive(Serialize)]
struct AliasRequest<'a> {
    alias: &'a str,
}

#[derive(Serialize)]
struct DomainRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainResponse {
    name: String,
    #[serde(default)]
    verified: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    created_at: Option<i64>,
}

impl From<DomainResponse> for ProviderDomain {
    fn from(domain: DomainResponse) -> Self {
        ProviderDomain {
            name: domain.name,
            verified: domain.verified,
            created_at: domain.created_at.map(|millis| millis / 1000),
        }
    }
}

#[derive(Deserialize)]
struct DomainListResponse {
    domains: Vec<DomainResponse>,
}

/// Map Vercel `readyState` value.
fn ready_state(value: &str) -> ReadyState {
    match value {
        "READY" => ReadyState::Ready,
        "ERROR" | "CANCELED" => ReadyState::Error,
        _ => ReadyState::Building,
    }
}

/// Expand a bare alias name into a Vercel subdomain.
fn alias_host(alias: &str) -> String {
    if alias.contains('.') {
        alias.to_owned()
    } else {
        format!("{alias}.vercel.app")
    }
}

impl VercelAdapter {
    /// Create a new adapter.
    pub fn new(client: Client, token: String, api_url: String) -> Self {
        Self {
            client,
            token,
            api_url: api_url.trim_end_matches('/').to_owned(),
            team_id: None,
            error_body_limit: DEFAULT_ERROR_BODY_LIMIT,
            retry: RetryPolicy::default(),
        }
    }

    /// Scope every request to the provided team.
    pub fn team_id(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    /// Set max size of error bodies kept in errors.
    pub fn error_body_limit(mut self, limit: usize) -> Self {
        self.error_body_limit = limit;
        self
    }

    /// Set upload retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request<'a, I>(&self, method: Method, segments: I) -> Result<RequestBuilder, ProviderError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let request = self
            .client
            .request(method, endpoint(&self.api_url, segments)?)
            .bearer_auth(&self.token);

        Ok(match &self.team_id {
            Some(team_id) => request.query(&[("teamId", team_id)]),
            None => request,
        })
    }

    async fn api_error(&self, response: reqwest::Response) -> ProviderError {
        ProviderError::Api {
            status: response.status().as_u16(),
            body: error_body(response, self.error_body_limit).await,
        }
    }

    /// Upload a single file, keyed by its digest.
    ///
    /// A file that is already known to Vercel is reported as [`UploadOutcome::AlreadyExists`].
    pub async fn upload_file(&self, file: &SiteFile) -> Result<UploadOutcome, ProviderError> {
        let outcome = self
            .retry
            .run(ProviderError::is_transient, || async move {
                let response = self
                    .request(Method::POST, ["v2", "files"])?
                    .header("x-vercel-digest", &file.digest.sha1)
                    .header(CONTENT_LENGTH, file.digest.size)
                    .body(file.content.clone())
                    .send()
                    .await
                    .map_err(|source| ProviderError::UploadTransport {
                        path: file.path().to_owned(),
                        source,
                    })?;

                match response.status() {
                    StatusCode::OK => Ok(UploadOutcome::Stored),
                    StatusCode::CONFLICT => Ok(UploadOutcome::AlreadyExists),
                    status => Err(ProviderError::Upload {
                        path: file.path().to_owned(),
                        status: status.as_u16(),
                        body: error_body(response, self.error_body_limit).await,
                    }),
                }
            })
            .await?;

        debug!(path = file.path(), ?outcome, "file uploaded");

        Ok(outcome)
    }

    /// Create a production deployment out of previously uploaded files.
    pub async fn create_deployment(
        &self,
        project_name: &str,
        files: &[SiteFile],
    ) -> Result<CreatedDeployment, ProviderError> {
        let body = DeploymentRequest {
            name: project_name,
            files: files
                .iter()
                .map(|file| ManifestEntry {
                    file: file.path(),
                    sha: &file.digest.sha1,
                    size: file.digest.size,
                })
                .collect(),
            target: "production",
            project_settings: ProjectSettings { framework: None },
        };

        let response = self
            .request(Method::POST, ["v13", "deployments"])?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Create {
                status: response.status().as_u16(),
                body: error_body(response, self.error_body_limit).await,
            });
        }

        let deployment: DeploymentResponse = response.json().await?;

        Ok(CreatedDeployment {
            id: deployment.id,
            url: https_url(&deployment.url),
            ready_state: deployment.ready_state.as_deref().map(ready_state),
            required: Vec::new(),
            uploads: Default::default(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for VercelAdapter {
    fn platform(&self) -> Platform {
        Platform::Vercel
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    async fn publish(
        &self,
        project_name: &str,
        files: &[SiteFile],
        concurrency: usize,
    ) -> Result<CreatedDeployment, ProviderError> {
        let uploads = upload_all(files, concurrency, |file| self.upload_file(file)).await?;

        let mut deployment = self.create_deployment(project_name, files).await?;
        deployment.uploads = uploads;

        Ok(deployment)
    }

    async fn poll_status(&self, deployment_id: &str) -> Result<ReadyState, ProviderError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct StatusResponse {
            ready_state: String,
        }

        let response = self
            .request(Method::GET, ["v13", "deployments", deployment_id])?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let status: StatusResponse = response.json().await?;

        Ok(ready_state(&status.ready_state))
    }

    #[instrument(skip(self))]
    async fn assign_alias(
        &self,
        deployment_id: &str,
        alias: &str,
    ) -> Result<String, ProviderError> {
        let host = alias_host(alias);

        let response = self
            .request(Method::POST, ["v2", "deployments", deployment_id, "aliases"])?
            .json(&AliasRequest { alias: &host })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        Ok(https_url(&host))
    }

    async fn list_domains(&self, project_name: &str) -> Result<Vec<ProviderDomain>, ProviderError> {
        let response = self
            .request(Method::GET, ["v9", "projects", project_name, "domains"])?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let list: DomainListResponse = response.json().await?;

        Ok(list.domains.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn add_domain(
        &self,
        project_name: &str,
        domain: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        let response = self
            .request(Method::POST, ["v10", "projects", project_name, "domains"])?
            .json(&DomainRequest { name: domain })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let domain: DomainResponse = response.json().await?;

        Ok(domain.into())
    }

    #[instrument(skip(self))]
    async fn remove_domain(&self, project_name: &str, domain: &str) -> Result<(), ProviderError> {
        let response = self
            .request(
                Method::DELETE,
                ["v9", "projects", project_name, "domains", domain],
            )?
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ProviderError::DomainNotLinked {
                domain: domain.to_owned(),
            }),
            _ => Err(self.api_error(response).await),
        }
    }
}
