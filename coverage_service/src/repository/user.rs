use tracing::info;

use crate::error::Result;
use crate::models::{fields, Entity, Membership, User};
use crate::store::{DocumentStore, Filter};

use super::{EntityStore, Listing};

#[derive(Clone)]
pub struct UserRepository<S> {
    users: EntityStore<S, User>,
    memberships: EntityStore<S, Membership>,
}

impl<S: DocumentStore> UserRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            users: EntityStore::new(store.clone()),
            memberships: EntityStore::new(store),
        }
    }

    pub async fn save(&self, user: User) -> Result<User> {
        self.users.insert(&user).await?;
        info!(user_id = %user.id(), name = user.name(), "User saved");
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Result<User> {
        self.users.get(user_id).await
    }

    pub async fn list(&self, limit: usize) -> Result<Listing<User>> {
        self.users.list(limit).await
    }

    /// Delete a user and the user's project memberships. Returns whether the
    /// user row was removed.
    pub async fn delete(&self, user_id: &str) -> Result<bool> {
        let memberships = self
            .memberships
            .delete_where(&Filter::new().eq(fields::USER_ID, user_id))
            .await?;
        let removed = self.users.delete_by_id(user_id).await?;

        info!(user_id, memberships, removed, "User deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_save_get_delete() {
        let repo = UserRepository::new(MemoryStore::new());
        let alice = repo
            .save(User::new("alice", "secret", Some("alice@example.com".to_string())))
            .await
            .unwrap();

        assert_eq!(alice.id().as_str(), "6384e2b2184bcbf58eccf10ca7a6563c");
        assert_eq!(repo.get(alice.id().as_str()).await.unwrap().email(), Some("alice@example.com"));

        assert!(repo.delete(alice.id().as_str()).await.unwrap());
        assert!(!repo.delete(alice.id().as_str()).await.unwrap());
        assert!(repo.get(alice.id().as_str()).await.is_err());
    }
}
