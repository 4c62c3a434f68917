//! Netlify adapter.
//!
//! Netlify receives the deployment manifest first and answers with the list of
//! digests it does not have yet. Only files carrying those digests are uploaded.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use db::project::Platform;
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use super::{
    endpoint, error_body, https_url, upload_all, CreatedDeployment, ProviderAdapter, ProviderDomain,
    ProviderError, ReadyState, UploadOutcome, DEFAULT_ERROR_BODY_LIMIT,
};
use crate::{digest::SiteFile, retry::RetryPolicy};

/// Netlify REST API adapter.
pub struct NetlifyAdapter {
    client: Client,
    token: String,
    api_url: String,
    error_body_limit: usize,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct DeployRequest<'a> {
    files: BTreeMap<String, &'a str>,
}

#[derive(Deserialize)]
struct DeployResponse {
    id: String,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    ssl_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    deploy_ssl_url: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
struct SiteResponse {
    #[serde(default)]
    custom_domain: Option<String>,
    #[serde(default)]
    domain_aliases: Vec<String>,
}

impl SiteResponse {
    fn domains(self) -> Vec<String> {
        self.custom_domain
            .into_iter()
            .chain(self.domain_aliases)
            .collect()
    }
}

/// Map Netlify deploy `state` value.
fn ready_state(value: &str) -> ReadyState {
    match value {
        "ready" => ReadyState::Ready,
        "error" => ReadyState::Error,
        _ => ReadyState::Building,
    }
}

/// Netlify site identifier of a project.
fn site_id(name: &str) -> String {
    if name.contains('.') {
        name.to_owned()
    } else {
        format!("{name}.netlify.app")
    }
}

/// Pick one file for every digest requested by Netlify.
///
/// Fails if Netlify requested a digest that is not a part of the manifest.
fn select_required<'a>(
    files: &'a [SiteFile],
    required: &[String],
) -> Result<Vec<&'a SiteFile>, ProviderError> {
    let mut by_digest = HashMap::new();

    for file in files {
        by_digest.entry(file.digest.sha1.as_str()).or_insert(file);
    }

    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for digest in required {
        let file = by_digest
            .get(digest.as_str())
            .ok_or_else(|| ProviderError::UnknownDigest {
                digest: digest.clone(),
            })?;

        if seen.insert(digest.as_str()) {
            selected.push(*file);
        }
    }

    Ok(selected)
}

impl NetlifyAdapter {
    /// Create a new adapter.
    pub fn new(client: Client, token: String, api_url: String) -> Self {
        Self {
            client,
            token,
            api_url: api_url.trim_end_matches('/').to_owned(),
            error_body_limit: DEFAULT_ERROR_BODY_LIMIT,
            retry: RetryPolicy::default(),
        }
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
        let url = endpoint(&self.api_url, ["api", "v1"].into_iter().chain(segments))?;

        Ok(self.client.request(method, url).bearer_auth(&self.token))
    }

    async fn api_error(&self, response: reqwest::Response) -> ProviderError {
        ProviderError::Api {
            status: response.status().as_u16(),
            body: error_body(response, self.error_body_limit).await,
        }
    }

    /// Create a deploy from the file manifest.
    ///
    /// The returned deployment lists digests that must be uploaded before
    /// Netlify starts processing it.
    pub async fn create_deployment(
        &self,
        project_name: &str,
        files: &[SiteFile],
    ) -> Result<CreatedDeployment, ProviderError> {
        let body = DeployRequest {
            files: files
                .iter()
                .map(|file| (format!("/{}", file.path()), file.digest.sha1.as_str()))
                .collect(),
        };

        let site = site_id(project_name);

        let response = self
            .request(Method::POST, ["sites", site.as_str(), "deploys"])?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Create {
                status: response.status().as_u16(),
                body: error_body(response, self.error_body_limit).await,
            });
        }

        let deploy: DeployResponse = response.json().await?;

        let url = deploy
            .deploy_ssl_url
            .or(deploy.ssl_url)
            .or(deploy.url)
            .map(|url| https_url(&url))
            .unwrap_or_else(|| https_url(&site));

        Ok(CreatedDeployment {
            id: deploy.id,
            url,
            ready_state: deploy.state.as_deref().map(ready_state),
            required: deploy.required,
            uploads: Default::default(),
        })
    }

    /// Upload a single file requested by a deploy.
    pub async fn upload_file(
        &self,
        deployment_id: &str,
        file: &SiteFile,
    ) -> Result<UploadOutcome, ProviderError> {
        let outcome = self
            .retry
            .run(ProviderError::is_transient, || async move {
                let segments = ["deploys", deployment_id, "files"]
                    .into_iter()
                    .chain(file.path().split('/'));

                let response = self
                    .request(Method::PUT, segments)?
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(file.content.clone())
                    .send()
                    .await
                    .map_err(|source| ProviderError::UploadTransport {
                        path: file.path().to_owned(),
                        source,
                    })?;

                match response.status() {
                    StatusCode::OK => Ok(UploadOutcome::Stored),
                    StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                        Ok(UploadOutcome::AlreadyExists)
                    }
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

    async fn site(&self, project_name: &str) -> Result<SiteResponse, ProviderError> {
        let site = site_id(project_name);

        let response = self
            .request(Method::GET, ["sites", site.as_str()])?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn update_site(
        &self,
        project_name: &str,
        patch: serde_json::Value,
    ) -> Result<(), ProviderError> {
        let site = site_id(project_name);

        let response = self
            .request(Method::PATCH, ["sites", site.as_str()])?
            .json(&patch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for NetlifyAdapter {
    fn platform(&self) -> Platform {
        Platform::Netlify
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    async fn publish(
        &self,
        project_name: &str,
        files: &[SiteFile],
        concurrency: usize,
    ) -> Result<CreatedDeployment, ProviderError> {
        let mut deployment = self.create_deployment(project_name, files).await?;
        let required = select_required(files, &deployment.required)?;

        debug!(
            id = %deployment.id,
            required = required.len(),
            "deploy created"
        );

        let deployment_id = deployment.id.as_str();
        deployment.uploads = upload_all(required, concurrency, |file| {
            self.upload_file(deployment_id, file)
        })
        .await?;

        Ok(deployment)
    }

    async fn poll_status(&self, deployment_id: &str) -> Result<ReadyState, ProviderError> {
        #[derive(Deserialize)]
        struct StatusResponse {
            state: String,
        }

        let response = self
            .request(Method::GET, ["deploys", deployment_id])?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let status: StatusResponse = response.json().await?;

        Ok(ready_state(&status.state))
    }

    #[instrument(skip(self))]
    async fn assign_alias(
        &self,
        deployment_id: &str,
        alias: &str,
    ) -> Result<String, ProviderError> {
        #[derive(Deserialize)]
        struct RestoreResponse {
            #[serde(default)]
            ssl_url: Option<String>,
        }

        let site = site_id(alias);

        let response = self
            .request(
                Method::POST,
                ["sites", site.as_str(), "deploys", deployment_id, "restore"],
            )?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let restored: RestoreResponse = response.json().await?;

        Ok(restored
            .ssl_url
            .map(|url| https_url(&url))
            .unwrap_or_else(|| https_url(&site)))
    }

    async fn list_domains(&self, project_name: &str) -> Result<Vec<ProviderDomain>, ProviderError> {
        let site = self.site(project_name).await?;

        // Netlify links custom domains without an ownership verification step.
        Ok(site
            .domains()
            .into_iter()
            .map(|name| ProviderDomain {
                name,
                verified: true,
                created_at: None,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn add_domain(
        &self,
        project_name: &str,
        domain: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        let site = self.site(project_name).await?;

        if site.custom_domain.is_none() {
            self.update_site(project_name, json!({ "custom_domain": domain }))
                .await?;
        } else if site.custom_domain.as_deref() != Some(domain)
            && !site.domain_aliases.iter().any(|alias| alias == domain)
        {
            let mut aliases = site.domain_aliases;
            aliases.push(domain.to_owned());

            self.update_site(project_name, json!({ "domain_aliases": aliases }))
                .await?;
        }

        Ok(ProviderDomain {
            name: domain.to_owned(),
            verified: true,
            created_at: None,
        })
    }

    #[instrument(skip(self))]
    async fn remove_domain(&self, project_name: &str, domain: &str) -> Result<(), ProviderError> {
        let site = self.site(project_name).await?;

        if site.custom_domain.as_deref() == Some(domain) {
            return self
                .update_site(project_name, json!({ "custom_domain": null }))
                .await;
        }

        if !site.domain_aliases.iter().any(|alias| alias == domain) {
            return Err(ProviderError::DomainNotLinked {
                domain: domain.to_owned(),
            });
        }

        let aliases: Vec<_> = site
            .domain_aliases
            .into_iter()
            .filter(|alias| alias != domain)
            .collect();

        self.update_site(project_name, json!({ "domain_aliases": aliases }))
            .await
    }
}
