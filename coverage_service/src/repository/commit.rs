use tracing::{debug, info};

use crate::error::{CoverageError, Result};
use crate::models::{fields, Commit, Entity};
use crate::store::{DocumentStore, Filter, Query};

use super::{EntityStore, Listing, ProjectRepository};

#[derive(Clone)]
pub struct CommitRepository<S> {
    commits: EntityStore<S, Commit>,
    projects: ProjectRepository<S>,
}

impl<S: DocumentStore> CommitRepository<S> {
    pub fn new(store: S, projects: ProjectRepository<S>) -> Self {
        Self {
            commits: EntityStore::new(store),
            projects,
        }
    }

    /// Persist a commit. Its project must exist.
    pub async fn save(&self, commit: Commit) -> Result<Commit> {
        self.projects.get(commit.project_id().as_str()).await?;
        self.commits.insert(&commit).await?;

        info!(
            commit_id = %commit.id(),
            project_id = %commit.project_id(),
            branch = commit.branch(),
            sha = %commit.sha(),
            "Commit saved"
        );
        Ok(commit)
    }

    pub async fn get(&self, commit_id: &str) -> Result<Commit> {
        self.commits.get(commit_id).await
    }

    /// Like [`get`](Self::get), but absence is not an error.
    pub async fn find(&self, commit_id: &str) -> Result<Option<Commit>> {
        self.commits.find_by_id(commit_id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Listing<Commit>> {
        self.commits.list(limit).await
    }

    pub async fn get_project_commits(&self, project_id: &str) -> Result<Listing<Commit>> {
        self.projects.get(project_id).await?;
        self.commits
            .find(&Query::new(Filter::new().eq(fields::PROJECT_ID, project_id)))
            .await
    }

    /// Most recent commit of a project, optionally restricted to one branch.
    pub async fn get_last_commit(&self, project_id: &str, branch: Option<&str>) -> Result<Commit> {
        self.projects.get(project_id).await?;

        let mut filter = Filter::new().eq(fields::PROJECT_ID, project_id);
        if let Some(branch) = branch {
            filter = filter.eq(fields::BRANCH, branch);
        }

        let query = Query::new(filter).sort_desc(fields::TIMESTAMP).limit(1);
        let last = self.commits.find(&query).await?.next().transpose()?;

        match last {
            Some(commit) => {
                debug!(project_id, commit_id = %commit.id(), "Last commit resolved");
                Ok(commit)
            }
            None => Err(CoverageError::NotFound(match branch {
                Some(branch) => format!("No commits for project {} on branch {}", project_id, branch),
                None => format!("No commits for project {}", project_id),
            })),
        }
    }
}
