use tracing::{info, warn};

use crate::error::Result;
use crate::models::{fields, Commit, Entity, Membership, Project, Report};
use crate::store::{DocumentStore, Filter, Query};

use super::{EntityStore, Listing};

#[derive(Clone)]
pub struct ProjectRepository<S> {
    projects: EntityStore<S, Project>,
    commits: EntityStore<S, Commit>,
    reports: EntityStore<S, Report>,
    memberships: EntityStore<S, Membership>,
}

impl<S: DocumentStore> ProjectRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            projects: EntityStore::new(store.clone()),
            commits: EntityStore::new(store.clone()),
            reports: EntityStore::new(store.clone()),
            memberships: EntityStore::new(store),
        }
    }

    pub async fn save(&self, project: Project) -> Result<Project> {
        self.projects.insert(&project).await?;
        info!(project_id = %project.id(), name = project.name(), "Project saved");
        Ok(project)
    }

    pub async fn get(&self, project_id: &str) -> Result<Project> {
        self.projects.get(project_id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Listing<Project>> {
        self.projects.list(limit).await
    }

    /// Delete a project together with its commits, their reports and the
    /// project's memberships.
    ///
    /// The phases run one after another without a transaction. If a run is
    /// interrupted, running it again finishes the job: dependents are swept by
    /// `project_id` even when the project row is already gone. Returns whether
    /// the project row itself was removed by this call.
    pub async fn delete(&self, project_id: &str) -> Result<bool> {
        let commit_ids: Vec<String> = self
            .commits
            .find(&Query::new(Filter::new().eq(fields::PROJECT_ID, project_id)))
            .await?
            .map(|commit| commit.map(|c| c.id().to_string()))
            .collect::<Result<_>>()?;

        let reports = self
            .reports
            .delete_where(&Filter::new().any_of(fields::COMMIT_ID, commit_ids))
            .await?;
        let commits = self
            .commits
            .delete_where(&Filter::new().eq(fields::PROJECT_ID, project_id))
            .await?;
        let memberships = self
            .memberships
            .delete_where(&Filter::new().eq(fields::PROJECT_ID, project_id))
            .await?;
        let removed = self.projects.delete_by_id(project_id).await?;

        if removed {
            info!(project_id, commits, reports, memberships, "Project deleted");
        } else {
            warn!(project_id, commits, reports, memberships, "Project not present, dependents swept");
        }

        Ok(removed)
    }
}
