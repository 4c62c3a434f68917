//! Deployment orchestration.
//!
//! A single [`Orchestrator::deploy`] call drives one deployment from the build
//! directory to a live URL and records its outcome as a [`deployment`] row.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use common::config;
use db::{
    deployment, project, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde_json::json;
use tokio::task::JoinError;
use tracing::{error, info, instrument, warn};

use crate::{
    collector::{self, BuildArtifact, CollectError},
    digest::SiteFile,
    poller::{PollOutcome, Poller},
    provider::{truncate_body, ProviderAdapter, ProviderError, ReadyState, UploadSummary},
};

/// Deployment pipeline settings.
#[derive(Clone, Debug)]
pub struct DeploySettings {
    /// Delay between two readiness checks.
    pub poll_interval: Duration,

    /// Max time to wait for a deployment to become ready.
    pub max_wait: Duration,

    /// Max count of concurrent file uploads.
    pub upload_concurrency: usize,

    /// Build artifacts that are never uploaded.
    pub excluded_files: Vec<String>,

    /// Max size of the error text stored in failed deployment logs.
    pub log_limit: usize,
}

impl From<&config::Deployment> for DeploySettings {
    fn from(config: &config::Deployment) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval),
            max_wait: Duration::from_millis(config.max_wait),
            upload_concurrency: config.upload_concurrency,
            excluded_files: config.excluded_files.clone(),
            log_limit: config.error_body_limit,
        }
    }
}

/// Deployment pipeline stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum Stage {
    #[display(fmt = "collecting")]
    Collecting,
    #[display(fmt = "hashing")]
    Hashing,
    #[display(fmt = "uploading")]
    Uploading,
    #[display(fmt = "creating")]
    Creating,
    #[display(fmt = "polling")]
    Polling,
    #[display(fmt = "aliasing")]
    Aliasing,
    #[display(fmt = "done")]
    Done,
    #[display(fmt = "failed")]
    Failed,
}

/// Successful deployment details.
#[derive(Clone, Debug)]
pub struct DeployOutcome {
    /// Deployment record identifier.
    pub record_id: i64,

    /// Per-project deployment number.
    pub version: i64,

    /// Provider deployment identifier.
    pub deployment_id: String,

    /// Live URL, aliased when possible.
    pub url: String,

    /// Whether the friendly alias was assigned.
    pub aliased: bool,

    /// Whether readiness polling gave up before the deployment became ready.
    pub timed_out: bool,
}

/// Errors that may occur during a deployment.
#[derive(Debug, Display, From, Error)]
pub enum DeployError {
    /// Database-related error.
    Database(DbErr),

    /// Deployment failed, the failure was recorded.
    #[from(ignore)]
    #[display(fmt = "deployment failed while {}: {}", stage, message)]
    Failed {
        stage: Stage,
        message: String,
        record_id: i64,
    },
}

/// Pipeline failure, before it is recorded.
struct StageError {
    stage: Stage,
    message: String,
}

impl StageError {
    fn new<E: ToString>(stage: Stage, err: E) -> Self {
        Self {
            stage,
            message: err.to_string(),
        }
    }
}

/// Published, but not yet recorded deployment.
struct Published {
    deployment_id: String,
    url: String,
    files: usize,
    uploads: UploadSummary,
    aliased: bool,
    timed_out: bool,
}

/// Stage a failed provider publication ended at.
fn publish_stage(err: &ProviderError) -> Stage {
    match err {
        ProviderError::Upload { .. } | ProviderError::UploadTransport { .. } => Stage::Uploading,
        _ => Stage::Creating,
    }
}

/// Deployment pipeline driver.
pub struct Orchestrator {
    db: Arc<DatabaseConnection>,
    settings: DeploySettings,
}

impl Orchestrator {
    pub fn new(db: Arc<DatabaseConnection>, settings: DeploySettings) -> Self {
        Self { db, settings }
    }

    /// Build directory of the provided project.
    pub fn build_dir(builds_path: &Path, project: &project::Model) -> PathBuf {
        builds_path.join(&project.slug)
    }

    /// Deploy contents of the `build_dir` with the provided adapter.
    ///
    /// Any pipeline failure is recorded on the deployment row and returned as
    /// [`DeployError::Failed`]. On success the project's deployment URL is
    /// overwritten with the new one.
    #[instrument(skip_all, fields(project = %project.slug, platform = %adapter.platform()))]
    pub async fn deploy(
        &self,
        project: &project::Model,
        adapter: &dyn ProviderAdapter,
        build_dir: &Path,
    ) -> Result<DeployOutcome, DeployError> {
        let started = Instant::now();
        let record = self.start(project, adapter).await?;

        info!(record_id = record.id, version = record.version, "deployment started");

        match self.run(project, adapter, build_dir).await {
            Ok(published) => {
                let outcome = self
                    .succeed(&record, project, published, started.elapsed())
                    .await?;

                info!(
                    record_id = record.id,
                    url = %outcome.url,
                    stage = %Stage::Done,
                    "deployment finished"
                );

                Ok(outcome)
            }
            Err(StageError { stage, message }) => {
                error!(record_id = record.id, %stage, %message, "deployment failed");

                self.fail(&record, stage, &message).await?;

                Err(DeployError::Failed {
                    stage,
                    message,
                    record_id: record.id,
                })
            }
        }
    }

    async fn run(
        &self,
        project: &project::Model,
        adapter: &dyn ProviderAdapter,
        build_dir: &Path,
    ) -> Result<Published, StageError> {
        info!(stage = %Stage::Collecting, path = %build_dir.display(), "collecting build artifacts");

        let root = build_dir.to_owned();
        let excluded = self.settings.excluded_files.clone();

        let artifacts = tokio::task::spawn_blocking(
            move || -> Result<Vec<BuildArtifact>, CollectError> {
                Ok(collector::exclude(collector::collect(&root)?, &excluded))
            },
        )
        .await
        .map_err(|err| StageError::new(Stage::Collecting, err))?
        .map_err(|err| StageError::new(Stage::Collecting, err))?;

        if artifacts.is_empty() {
            return Err(StageError::new(
                Stage::Collecting,
                "build directory contains no deployable files",
            ));
        }

        info!(stage = %Stage::Hashing, files = artifacts.len(), "hashing build artifacts");

        let files = tokio::task::spawn_blocking(move || {
            artifacts.into_iter().map(SiteFile::new).collect::<Vec<_>>()
        })
        .await
        .map_err(|err: JoinError| StageError::new(Stage::Hashing, err))?;

        info!(stage = %Stage::Uploading, "publishing deployment");

        let created = adapter
            .publish(&project.slug, &files, self.settings.upload_concurrency)
            .await
            .map_err(|err| StageError::new(publish_stage(&err), err))?;

        info!(
            stage = %Stage::Polling,
            deployment_id = %created.id,
            stored = created.uploads.stored,
            already_present = created.uploads.already_present,
            "deployment created"
        );

        let poll = match created.ready_state {
            Some(ReadyState::Ready) => PollOutcome::Ready,
            Some(ReadyState::Error) => PollOutcome::Failed,
            _ => {
                Poller::new(self.settings.poll_interval, self.settings.max_wait)
                    .wait(|| adapter.poll_status(&created.id))
                    .await
            }
        };

        let timed_out = match poll {
            PollOutcome::Ready => false,
            PollOutcome::Failed => {
                return Err(StageError::new(
                    Stage::Polling,
                    "provider reported a failed build",
                ))
            }
            PollOutcome::TimedOut => {
                warn!(
                    max_wait = ?self.settings.max_wait,
                    "deployment is not ready yet, proceeding"
                );
                true
            }
        };

        info!(stage = %Stage::Aliasing, "assigning alias");

        let (url, aliased) = match adapter.assign_alias(&created.id, &project.slug).await {
            Ok(url) if !url.is_empty() => (url, true),
            Ok(_) => {
                warn!("provider returned an empty alias, using the deployment url");
                (created.url.clone(), false)
            }
            Err(err) => {
                warn!(%err, "unable to assign alias, using the deployment url");
                (created.url.clone(), false)
            }
        };

        Ok(Published {
            deployment_id: created.id,
            url,
            files: files.len(),
            uploads: created.uploads,
            aliased,
            timed_out,
        })
    }

    /// Insert a new deployment record with the next per-project version.
    async fn start(
        &self,
        project: &project::Model,
        adapter: &dyn ProviderAdapter,
    ) -> Result<deployment::Model, DbErr> {
        let project_id = project.id;
        let platform = adapter.platform();

        self.db
            .transaction::<_, _, DbErr>(|txn| {
                Box::pin(async move {
                    let version = deployment::next_version(txn, project_id).await?;

                    deployment::Entity::insert(deployment::ActiveModel {
                        project_id: ActiveValue::Set(project_id),
                        version: ActiveValue::Set(version),
                        status: ActiveValue::Set(deployment::Status::Building),
                        platform: ActiveValue::Set(platform),
                        created_at: ActiveValue::Set(db::utc_now()),
                        ..Default::default()
                    })
                    .exec_with_returning(txn)
                    .await
                })
            })
            .await
            .into_raw_result()
    }

    async fn succeed(
        &self,
        record: &deployment::Model,
        project: &project::Model,
        published: Published,
        elapsed: Duration,
    ) -> Result<DeployOutcome, DbErr> {
        let metadata = json!({
            "provider": record.platform.name(),
            "deployment_id": published.deployment_id,
            "files": published.files,
            "uploaded": published.uploads,
            "aliased": published.aliased,
            "timed_out": published.timed_out,
        })
        .to_string();

        let record_id = record.id;
        let project_id = project.id;
        let url = published.url.clone();
        let build_time_ms = elapsed.as_millis().min(i64::MAX as u128) as i64;

        self.db
            .transaction::<_, _, DbErr>(|txn| {
                Box::pin(async move {
                    deployment::Entity::update_many()
                        .filter(deployment::Column::Id.eq(record_id))
                        .col_expr(
                            deployment::Column::Status,
                            deployment::Status::Success.into(),
                        )
                        .col_expr(deployment::Column::DeployUrl, url.clone().into())
                        .col_expr(deployment::Column::BuildTimeMs, build_time_ms.into())
                        .col_expr(deployment::Column::Metadata, metadata.into())
                        .exec(txn)
                        .await?;

                    project::Entity::update_many()
                        .filter(project::Column::Id.eq(project_id))
                        .col_expr(project::Column::DeployUrl, url.into())
                        .exec(txn)
                        .await?;

                    Ok(())
                })
            })
            .await
            .into_raw_result()?;

        Ok(DeployOutcome {
            record_id,
            version: record.version,
            deployment_id: published.deployment_id,
            url: published.url,
            aliased: published.aliased,
            timed_out: published.timed_out,
        })
    }

    async fn fail(&self, record: &deployment::Model, stage: Stage, message: &str) -> Result<(), DbErr> {
        let logs = truncate_body(&format!("{stage}: {message}"), self.settings.log_limit);

        deployment::Entity::update_many()
            .filter(deployment::Column::Id.eq(record.id))
            .col_expr(
                deployment::Column::Status,
                deployment::Status::Failed.into(),
            )
            .col_expr(deployment::Column::Logs, logs.into())
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }
}
