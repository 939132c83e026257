use tracing::info;

use crate::error::Result;
use crate::models::{fields, Entity, Report};
use crate::store::{DocumentStore, Filter, Query};

use super::{CommitRepository, EntityStore, Listing};

#[derive(Clone)]
pub struct ReportRepository<S> {
    reports: EntityStore<S, Report>,
    commits: CommitRepository<S>,
}

impl<S: DocumentStore> ReportRepository<S> {
    pub fn new(store: S, commits: CommitRepository<S>) -> Self {
        Self {
            reports: EntityStore::new(store),
            commits,
        }
    }

    /// Persist a report. Its commit must exist, and a report for the same
    /// `(commit, job_name)` must not: re-submissions fail with `AlreadyExists`
    /// instead of overwriting the recorded value.
    pub async fn save(&self, report: Report) -> Result<Report> {
        self.commits.get(report.commit_id().as_str()).await?;
        self.reports.insert(&report).await?;

        info!(
            report_id = %report.id(),
            commit_id = %report.commit_id(),
            job_name = report.job_name(),
            coverage = report.coverage_value(),
            "Report saved"
        );
        Ok(report)
    }

    pub async fn get(&self, report_id: &str) -> Result<Report> {
        self.reports.get(report_id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Listing<Report>> {
        self.reports.list(limit).await
    }

    pub async fn get_reports(&self, commit_id: &str) -> Result<Listing<Report>> {
        self.commits.get(commit_id).await?;
        self.reports
            .find(&Query::new(Filter::new().eq(fields::COMMIT_ID, commit_id)))
            .await
    }
}
