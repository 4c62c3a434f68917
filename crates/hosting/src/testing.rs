//! In-memory provider used by unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use db::project::Platform;

use crate::{
    digest::{FileDigest, SiteFile},
    provider::{
        CreatedDeployment, ProviderAdapter, ProviderDomain, ProviderError, ReadyState,
        UploadSummary,
    },
};

/// Provider adapter that keeps all state in memory.
///
/// Every status check pops the next scripted state, falling back to
/// [`ReadyState::Ready`] once the script is exhausted.
pub struct MockProvider {
    platform: Platform,
    initial_state: Option<ReadyState>,
    ready_states: Mutex<VecDeque<ReadyState>>,
    fallback_state: ReadyState,
    failing_alias: bool,
    failing_upload: Option<String>,
    polls: AtomicUsize,
    published: Mutex<Vec<Vec<FileDigest>>>,
    domains: Mutex<Vec<ProviderDomain>>,
}

impl MockProvider {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            initial_state: None,
            ready_states: Mutex::new(VecDeque::new()),
            fallback_state: ReadyState::Ready,
            failing_alias: false,
            failing_upload: None,
            polls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
            domains: Mutex::new(Vec::new()),
        }
    }

    /// Report the provided state right at deployment creation.
    pub fn initial_state(mut self, state: ReadyState) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Script states returned by consecutive status checks.
    pub fn ready_states<I: IntoIterator<Item = ReadyState>>(self, states: I) -> Self {
        self.ready_states.lock().unwrap().extend(states);
        self
    }

    /// State returned once the scripted states are exhausted.
    pub fn fallback_state(mut self, state: ReadyState) -> Self {
        self.fallback_state = state;
        self
    }

    /// Reject every alias assignment.
    pub fn failing_alias(mut self) -> Self {
        self.failing_alias = true;
        self
    }

    /// Reject the upload of a file with the provided path.
    pub fn failing_upload(mut self, path: &str) -> Self {
        self.failing_upload = Some(path.to_owned());
        self
    }

    /// Pre-link a custom domain.
    pub fn domain(self, name: &str) -> Self {
        self.domains.lock().unwrap().push(ProviderDomain {
            name: name.to_owned(),
            verified: true,
            created_at: None,
        });
        self
    }

    /// Count of status checks performed so far.
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// File manifests of all published deployments.
    pub fn published(&self) -> Vec<Vec<FileDigest>> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(
        &self,
        project_name: &str,
        files: &[SiteFile],
        _concurrency: usize,
    ) -> Result<CreatedDeployment, ProviderError> {
        if let Some(path) = &self.failing_upload {
            if files.iter().any(|file| file.path() == path) {
                return Err(ProviderError::Upload {
                    path: path.clone(),
                    status: 500,
                    body: String::from("storage unavailable"),
                });
            }
        }

        let mut published = self.published.lock().unwrap();
        published.push(files.iter().map(|file| file.digest.clone()).collect());
        let number = published.len();

        Ok(CreatedDeployment {
            id: format!("dpl_{number}"),
            url: format!("https://{project_name}-{number}.mock.app"),
            ready_state: self.initial_state,
            required: Vec::new(),
            uploads: UploadSummary {
                stored: files.len(),
                already_present: 0,
            },
        })
    }

    async fn poll_status(&self, _deployment_id: &str) -> Result<ReadyState, ProviderError> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .ready_states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback_state))
    }

    async fn assign_alias(
        &self,
        _deployment_id: &str,
        alias: &str,
    ) -> Result<String, ProviderError> {
        if self.failing_alias {
            return Err(ProviderError::Api {
                status: 403,
                body: String::from("forbidden"),
            });
        }

        Ok(format!("https://{alias}.mock.app"))
    }

    async fn list_domains(&self, _project_name: &str) -> Result<Vec<ProviderDomain>, ProviderError> {
        Ok(self.domains.lock().unwrap().clone())
    }

    async fn add_domain(
        &self,
        _project_name: &str,
        domain: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        let mut domains = self.domains.lock().unwrap();

        if let Some(existing) = domains.iter().find(|existing| existing.name == domain) {
            return Ok(existing.clone());
        }

        let domain = ProviderDomain {
            name: domain.to_owned(),
            verified: false,
            created_at: Some(1_700_000_000),
        };
        domains.push(domain.clone());

        Ok(domain)
    }

    async fn remove_domain(&self, _project_name: &str, domain: &str) -> Result<(), ProviderError> {
        let mut domains = self.domains.lock().unwrap();
        let count = domains.len();

        domains.retain(|existing| existing.name != domain);

        if domains.len() == count {
            return Err(ProviderError::DomainNotLinked {
                domain: domain.to_owned(),
            });
        }

        Ok(())
    }
}
