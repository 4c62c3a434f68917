//! Hosting provider adapters.
//!
//! Every provider is accessed through the [`ProviderAdapter`] trait.
//! Providers differ in the order of the upload and deployment creation steps,
//! which is why both steps are hidden behind a single [`ProviderAdapter::publish`]
//! call, leaving the orchestrator provider-agnostic.

pub mod netlify;
pub mod vercel;

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use common::config;
use db::project::Platform;
use derive_more::{Display, Error, From};
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::{Client, Response, Url};
use serde::Serialize;

use crate::digest::SiteFile;

pub use netlify::NetlifyAdapter;
pub use vercel::VercelAdapter;

/// Default max size of a provider error body kept in errors.
pub const DEFAULT_ERROR_BODY_LIMIT: usize = 2048;

/// Successful file upload outcome.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Provider stored a new file.
    Stored,

    /// Provider already had a file with the same digest.
    AlreadyExists,
}

/// Upload statistics of a single deployment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    /// Count of newly stored files.
    pub stored: usize,

    /// Count of files that were already present on the provider side.
    pub already_present: usize,
}

impl UploadSummary {
    fn record(mut self, outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Stored => self.stored += 1,
            UploadOutcome::AlreadyExists => self.already_present += 1,
        }

        self
    }
}

/// Provider-side build state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadyState {
    /// Deployment is queued or still building.
    Building,

    /// Deployment is ready to serve traffic.
    Ready,

    /// Deployment build failed.
    Error,
}

/// Deployment created on the provider side.
#[derive(Clone, Debug)]
pub struct CreatedDeployment {
    /// Provider deployment identifier.
    pub id: String,

    /// Raw, non-aliased deployment URL.
    pub url: String,

    /// Build state reported at creation time, if any.
    pub ready_state: Option<ReadyState>,

    /// Digests the provider requested to upload.
    ///
    /// Always empty for providers that receive files before the deployment is created.
    pub required: Vec<String>,

    /// Upload statistics.
    pub uploads: UploadSummary,
}

/// Custom domain, as seen by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderDomain {
    /// Domain name.
    pub name: String,

    /// Whether the provider verified domain ownership.
    pub verified: bool,

    /// Link creation time, as a Unix timestamp.
    pub created_at: Option<i64>,
}

/// Errors returned by provider adapters.
#[derive(Debug, Display, From, Error)]
pub enum ProviderError {
    /// HTTP client error.
    #[display(fmt = "provider request failed: {}", _0)]
    Http(reqwest::Error),

    /// Upload request failed before a response was received.
    #[from(ignore)]
    #[display(fmt = "upload of {} failed: {}", path, source)]
    UploadTransport { path: String, source: reqwest::Error },

    /// Provider rejected a file upload.
    #[from(ignore)]
    #[display(fmt = "upload of {} rejected with status {}: {}", path, status, body)]
    Upload {
        path: String,
        status: u16,
        body: String,
    },

    /// Provider rejected the deployment manifest.
    #[from(ignore)]
    #[display(fmt = "deployment rejected with status {}: {}", status, body)]
    Create { status: u16, body: String },

    /// Provider requested a file that was never declared.
    #[from(ignore)]
    #[display(fmt = "provider requested an undeclared digest {}", digest)]
    UnknownDigest { digest: String },

    /// Domain is not linked to the project.
    #[from(ignore)]
    #[display(fmt = "domain {} is not linked to the project", domain)]
    DomainNotLinked { domain: String },

    /// Provider responded with an unexpected status.
    #[from(ignore)]
    #[display(fmt = "provider responded with status {}: {}", status, body)]
    Api { status: u16, body: String },

    /// Configured API URL cannot be used as a base for requests.
    #[from(ignore)]
    #[display(fmt = "invalid provider API URL {}", url)]
    InvalidUrl { url: String },
}

impl ProviderError {
    /// Check if the error happened before the provider could respond.
    ///
    /// Only these errors are safe to retry.
    pub fn is_transient(&self) -> bool {
        let err = match self {
            ProviderError::Http(err) => err,
            ProviderError::UploadTransport { source, .. } => source,
            _ => return false,
        };

        err.is_connect() || err.is_timeout() || err.is_request()
    }
}

/// Uniform hosting provider contract.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter talks to.
    fn platform(&self) -> Platform;

    /// Upload site files and create a deployment out of them.
    ///
    /// Uploads run concurrently, limited by `concurrency`. The first failed
    /// upload aborts the whole publication.
    async fn publish(
        &self,
        project_name: &str,
        files: &[SiteFile],
        concurrency: usize,
    ) -> Result<CreatedDeployment, ProviderError>;

    /// Check deployment build state once.
    async fn poll_status(&self, deployment_id: &str) -> Result<ReadyState, ProviderError>;

    /// Point a friendly alias at the deployment, returning the aliased URL.
    async fn assign_alias(&self, deployment_id: &str, alias: &str)
        -> Result<String, ProviderError>;

    /// List custom domains linked to the project.
    async fn list_domains(&self, project_name: &str) -> Result<Vec<ProviderDomain>, ProviderError>;

    /// Link a custom domain to the project.
    async fn add_domain(
        &self,
        project_name: &str,
        domain: &str,
    ) -> Result<ProviderDomain, ProviderError>;

    /// Unlink a custom domain from the project.
    async fn remove_domain(&self, project_name: &str, domain: &str) -> Result<(), ProviderError>;
}

/// Requested provider has no credentials configured.
#[derive(Debug, Display, Error)]
#[display(fmt = "no credentials configured for {}", _0)]
pub struct MissingCredentials(#[error(not(source))] pub Platform);

/// Provider adapters available to the application.
#[derive(Default, Clone)]
pub struct Providers {
    vercel: Option<Arc<dyn ProviderAdapter>>,
    netlify: Option<Arc<dyn ProviderAdapter>>,
}

impl Providers {
    /// Create adapters for every provider that has a token configured.
    pub fn from_config(config: &config::Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.deployment.request_timeout))
            .build()?;

        let error_body_limit = config.deployment.error_body_limit;
        let mut providers = Providers::default();

        if let Some(token) = &config.providers.vercel.token {
            providers = providers.with(Arc::new(
                VercelAdapter::new(
                    client.clone(),
                    token.clone(),
                    config.providers.vercel.api_url.clone(),
                )
                .team_id(config.providers.vercel.team_id.clone())
                .error_body_limit(error_body_limit),
            ));
        }

        if let Some(token) = &config.providers.netlify.token {
            providers = providers.with(Arc::new(
                NetlifyAdapter::new(
                    client,
                    token.clone(),
                    config.providers.netlify.api_url.clone(),
                )
                .error_body_limit(error_body_limit),
            ));
        }

        Ok(providers)
    }

    /// Register an adapter, replacing any previous adapter of the same platform.
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        match adapter.platform() {
            Platform::Vercel => self.vercel = Some(adapter),
            Platform::Netlify => self.netlify = Some(adapter),
        }

        self
    }

    /// Get an adapter for the provided platform.
    pub fn adapter(&self, platform: Platform) -> Result<Arc<dyn ProviderAdapter>, MissingCredentials> {
        match platform {
            Platform::Vercel => self.vercel.clone(),
            Platform::Netlify => self.netlify.clone(),
        }
        .ok_or(MissingCredentials(platform))
    }
}

/// Upload files concurrently, stopping at the first failure.
pub(crate) fn upload_all<'a, I, F, Fut>(
    files: I,
    concurrency: usize,
    upload: F,
) -> futures_util::future::BoxFuture<'a, Result<UploadSummary, ProviderError>>
where
    I: IntoIterator<Item = &'a SiteFile>,
    I::IntoIter: Send + 'a,
    F: FnMut(&'a SiteFile) -> Fut + Send + 'a,
    Fut: Future<Output = Result<UploadOutcome, ProviderError>> + Send + 'a,
{
    Box::pin(
        stream::iter(files)
            .map(upload)
            .buffer_unordered(concurrency.max(1))
            .try_fold(UploadSummary::default(), |summary, outcome| async move {
                Ok(summary.record(outcome))
            }),
    )
}

/// Read a provider error body, capped at `limit` bytes.
pub(crate) async fn error_body(response: Response, limit: usize) -> String {
    match response.text().await {
        Ok(text) => truncate_body(&text, limit),
        Err(err) => format!("<unreadable body: {err}>"),
    }
}

/// Cap the body length at `limit` bytes without splitting a character.
pub fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_owned();
    }

    let mut end = limit;

    while !body.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...[truncated]", &body[..end])
}

/// Append path segments to the API base URL.
///
/// Every segment is percent-encoded on its own, so `/`, `?` and `#` inside of
/// a segment never change the shape of the resulting path.
pub(crate) fn endpoint<'a, I>(base: &str, segments: I) -> Result<Url, ProviderError>
where
    I: IntoIterator<Item = &'a str>,
{
    let invalid = || ProviderError::InvalidUrl {
        url: base.to_owned(),
    };

    let mut url = Url::parse(base).map_err(|_| invalid())?;

    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// Prefix a bare host name with the `https` scheme.
pub(crate) fn https_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    }
}
