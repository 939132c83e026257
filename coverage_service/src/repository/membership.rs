use tracing::{debug, info};

use crate::error::{CoverageError, Result};
use crate::models::{fields, Entity, Membership};
use crate::store::{DocumentStore, Filter, Query};
use crate::validation::EntityId;

use super::{EntityStore, ProjectRepository, UserRepository};

/// Which users belong to which projects.
#[derive(Clone)]
pub struct MembershipRepository<S> {
    memberships: EntityStore<S, Membership>,
    users: UserRepository<S>,
    projects: ProjectRepository<S>,
}

impl<S: DocumentStore> MembershipRepository<S> {
    pub fn new(store: S, users: UserRepository<S>, projects: ProjectRepository<S>) -> Self {
        Self {
            memberships: EntityStore::new(store),
            users,
            projects,
        }
    }

    /// Add a user to a project. Adding an existing membership again is a
    /// no-op that returns the stored membership.
    pub async fn add(&self, user_id: &EntityId, project_id: &EntityId) -> Result<Membership> {
        self.users.get(user_id.as_str()).await?;
        self.projects.get(project_id.as_str()).await?;

        let membership = Membership::new(user_id.clone(), project_id.clone());
        match self.memberships.insert(&membership).await {
            Ok(()) => {
                info!(%user_id, %project_id, "User added to project");
                Ok(membership)
            }
            Err(CoverageError::AlreadyExists(_)) => {
                debug!(%user_id, %project_id, "Membership already present");
                self.memberships.get(membership.id().as_str()).await
            }
            Err(err) => Err(err),
        }
    }

    /// Remove a user from a project. Returns false if they were not a member.
    ///
    /// Rows written before ids were derived carry arbitrary ids, so when the
    /// derived id is not found the pair itself is looked up.
    pub async fn remove(&self, user_id: &EntityId, project_id: &EntityId) -> Result<bool> {
        let derived = Membership::derive_id(user_id, project_id);

        let found = match self.memberships.find_by_id(derived.as_str()).await? {
            Some(membership) => Some(membership),
            None => {
                self.memberships
                    .find_one(
                        &Filter::new()
                            .eq(fields::USER_ID, user_id.as_str())
                            .eq(fields::PROJECT_ID, project_id.as_str()),
                    )
                    .await?
            }
        };

        let Some(membership) = found else {
            return Ok(false);
        };

        let removed = self.memberships.delete_by_id(membership.id().as_str()).await?;
        if removed {
            info!(%user_id, %project_id, membership_id = %membership.id(), "User removed from project");
        }
        Ok(removed)
    }

    /// Ids of the projects a user belongs to.
    pub async fn project_ids_for_user(&self, user_id: &str) -> Result<Vec<EntityId>> {
        self.users.get(user_id).await?;

        self.memberships
            .find(&Query::new(Filter::new().eq(fields::USER_ID, user_id)))
            .await?
            .map(|membership| membership.map(|m| m.project_id().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, User};
    use crate::store::{Collection, Document, MemoryStore};
    use crate::validation::ProjectUrl;
    use serde_json::json;

    struct Fixture {
        store: MemoryStore,
        repo: MembershipRepository<MemoryStore>,
        users: UserRepository<MemoryStore>,
        user: User,
        project: Project,
    }

    async fn setup() -> Fixture {
        let store = MemoryStore::new();
        let users = UserRepository::new(store.clone());
        let projects = ProjectRepository::new(store.clone());

        let user = users.save(User::new("alice", "secret", None)).await.unwrap();
        let project = projects
            .save(Project::new("take-over", ProjectUrl::parse("https://github.com/acme/take-over").unwrap()))
            .await
            .unwrap();

        Fixture {
            repo: MembershipRepository::new(store.clone(), users.clone(), projects),
            store,
            users,
            user,
            project,
        }
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let f = setup().await;

        let first = f.repo.add(f.user.id(), f.project.id()).await.unwrap();
        let second = f.repo.add(f.user.id(), f.project.id()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.id().as_str(), "8552c4f4b062152011ffa9c881f90dfa");
        assert_eq!(f.store.count(Collection::UserXProject), 1);
        assert_eq!(
            f.repo.project_ids_for_user(f.user.id().as_str()).await.unwrap(),
            vec![f.project.id().clone()]
        );
    }

    #[tokio::test]
    async fn test_add_requires_both_sides() {
        let f = setup().await;
        let missing = EntityId::parse("ffffffffffffffffffffffffffffffff").unwrap();

        assert!(matches!(
            f.repo.add(&missing, f.project.id()).await,
            Err(CoverageError::NotFound(_))
        ));
        assert!(matches!(
            f.repo.add(f.user.id(), &missing).await,
            Err(CoverageError::NotFound(_))
        ));
        assert_eq!(f.store.count(Collection::UserXProject), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let f = setup().await;
        f.repo.add(f.user.id(), f.project.id()).await.unwrap();

        assert!(f.repo.remove(f.user.id(), f.project.id()).await.unwrap());
        assert!(!f.repo.remove(f.user.id(), f.project.id()).await.unwrap());
        assert_eq!(f.store.count(Collection::UserXProject), 0);
    }

    #[tokio::test]
    async fn test_remove_finds_rows_with_legacy_ids() {
        let f = setup().await;
        let legacy: Document = serde_json::from_value(json!({
            "_id": "5f1d7c3a9b1e8a0012345678",
            "user_id": f.user.id().as_str(),
            "project_id": f.project.id().as_str(),
        }))
        .unwrap();
        f.store.insert(Collection::UserXProject, legacy).await.unwrap();

        assert!(f.repo.remove(f.user.id(), f.project.id()).await.unwrap());
        assert_eq!(f.store.count(Collection::UserXProject), 0);
    }

    #[tokio::test]
    async fn test_user_delete_cascades_to_memberships() {
        let f = setup().await;
        f.repo.add(f.user.id(), f.project.id()).await.unwrap();

        assert!(f.users.delete(f.user.id().as_str()).await.unwrap());
        assert_eq!(f.store.count(Collection::UserXProject), 0);
        assert!(matches!(
            f.repo.project_ids_for_user(f.user.id().as_str()).await,
            Err(CoverageError::NotFound(_))
        ));
    }
}
