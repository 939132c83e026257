//! Repositories
//!
//! One repository per entity type, all sharing a single store handle. They
//! own every read and write of persisted state and enforce what the store
//! cannot: references must resolve before a dependent entity is written, and
//! deletes cascade to dependents.
//!
//! [`EntityStore`] is the typed layer over the raw document store that all of
//! them build on.

mod commit;
mod membership;
mod project;
mod report;
mod user;

use std::marker::PhantomData;

use serde_json::Value;

use crate::error::{CoverageError, Result};
use crate::models::Entity;
use crate::store::{Document, DocumentStore, Filter, Query, StoreError};

pub use commit::CommitRepository;
pub use membership::MembershipRepository;
pub use project::ProjectRepository;
pub use report::ReportRepository;
pub use user::UserRepository;

pub(crate) fn to_document<E: Entity>(entity: &E) -> Result<Document> {
    match serde_json::to_value(entity).map_err(StoreError::from)? {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::InvalidData(format!(
            "{} serialized to a non-object value: {}",
            E::KIND,
            other
        ))
        .into()),
    }
}

pub(crate) fn from_document<E: Entity>(document: Document) -> Result<E> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| CoverageError::Store(StoreError::Serialization(e)))
}

// ============================================================================
// Typed collection access
// ============================================================================

pub struct EntityStore<S, E> {
    store: S,
    _entity: PhantomData<fn() -> E>,
}

impl<S: Clone, E> Clone for EntityStore<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<S: DocumentStore, E: Entity> EntityStore<S, E> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn insert(&self, entity: &E) -> Result<()> {
        let document = to_document(entity)?;
        match self.store.insert(E::COLLECTION, document).await {
            Ok(()) => Ok(()),
            Err(StoreError::DuplicateIdentity(id)) => Err(CoverageError::AlreadyExists(format!(
                "{} already exists: {}",
                E::KIND,
                id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<E>> {
        self.store
            .find_one(E::COLLECTION, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<E>> {
        self.find_one(&Filter::by_id(id)).await
    }

    pub async fn get(&self, id: &str) -> Result<E> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| CoverageError::NotFound(format!("{} doesn't exist: {}", E::KIND, id)))
    }

    pub async fn find(&self, query: &Query) -> Result<Listing<E>> {
        let documents = self.store.find(E::COLLECTION, query).await?;
        Ok(Listing::new(documents))
    }

    pub async fn list(&self, limit: usize) -> Result<Listing<E>> {
        self.find(&Query::new(Filter::new()).limit(limit)).await
    }

    pub async fn delete_where(&self, filter: &Filter) -> Result<u64> {
        Ok(self.store.delete_many(E::COLLECTION, filter).await?)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_one(E::COLLECTION, &Filter::by_id(id)).await?;
        Ok(deleted != 0)
    }
}

/// Query result decoded into entities on iteration.
///
/// Each call to a `list`/`find` operation produces a fresh listing; a listing
/// itself is consumed by iterating it once.
pub struct Listing<E> {
    documents: std::vec::IntoIter<Document>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Listing<E> {
    fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: documents.into_iter(),
            _entity: PhantomData,
        }
    }

    pub fn into_vec(self) -> Result<Vec<E>> {
        self.collect()
    }
}

impl<E: Entity> Iterator for Listing<E> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.documents.next().map(from_document)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.documents.size_hint()
    }
}

impl<E: Entity> ExactSizeIterator for Listing<E> {}

// ============================================================================
// All repositories over one store
// ============================================================================

/// Every repository, wired to one shared store handle.
#[derive(Clone)]
pub struct Repositories<S> {
    pub projects: ProjectRepository<S>,
    pub commits: CommitRepository<S>,
    pub reports: ReportRepository<S>,
    pub users: UserRepository<S>,
    pub memberships: MembershipRepository<S>,
}

impl<S: DocumentStore> Repositories<S> {
    pub fn new(store: S) -> Self {
        let projects = ProjectRepository::new(store.clone());
        let commits = CommitRepository::new(store.clone(), projects.clone());
        let reports = ReportRepository::new(store.clone(), commits.clone());
        let users = UserRepository::new(store.clone());
        let memberships = MembershipRepository::new(store, users.clone(), projects.clone());

        Self {
            projects,
            commits,
            reports,
            users,
            memberships,
        }
    }
}
