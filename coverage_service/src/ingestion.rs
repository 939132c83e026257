//! Job Ingestion
//!
//! Records the coverage result of one CI job:
//! 1. resolve the commit the job ran on, creating it on first sight
//! 2. record the job's report against that commit
//!
//! Reports are append-only per `(commit, job_name)`: submitting the same job
//! twice for a commit is a conflict. Commit creation, on the other hand, is
//! idempotent. Two submissions for the same commit may race to create it,
//! and the loser's duplicate-identity failure simply means the commit exists.

use tracing::{debug, info};

use crate::error::{CoverageError, Result};
use crate::models::{Commit, Entity, NewJob, Report};
use crate::repository::{CommitRepository, ReportRepository, Repositories};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct JobIngestion<S> {
    commits: CommitRepository<S>,
    reports: ReportRepository<S>,
}

impl<S: DocumentStore> JobIngestion<S> {
    pub fn new(repositories: &Repositories<S>) -> Self {
        Self {
            commits: repositories.commits.clone(),
            reports: repositories.reports.clone(),
        }
    }

    pub async fn record(&self, job: NewJob) -> Result<Report> {
        let commit = self.resolve_commit(&job).await?;

        let report = Report::new(
            commit.id().clone(),
            commit.branch(),
            job.job_name,
            job.coverage_value,
        )?;

        let report = self.reports.save(report).await?;
        info!(
            project_id = %job.project_id,
            commit_id = %commit.id(),
            job_name = report.job_name(),
            "Job recorded"
        );
        Ok(report)
    }

    async fn resolve_commit(&self, job: &NewJob) -> Result<Commit> {
        let commit_id = job.commit_id();
        if let Some(existing) = self.commits.find(commit_id.as_str()).await? {
            return Ok(existing);
        }

        let commit = Commit::new(
            job.project_id.clone(),
            job.branch.as_str(),
            job.commit_sha.clone(),
            job.commit_timestamp,
        )?;

        match self.commits.save(commit).await {
            Ok(saved) => Ok(saved),
            Err(CoverageError::AlreadyExists(_)) => {
                debug!(commit_id = %commit_id, "Commit created concurrently, reusing it");
                self.commits.get(commit_id.as_str()).await
            }
            Err(err) => Err(err),
        }
    }
}
