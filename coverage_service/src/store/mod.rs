//! Document Store Layer
//!
//! The persistence primitives the rest of the service is written against: a
//! key-document store with insert/find/delete, sorting, limits and a distinct
//! duplicate-identity failure. There are no foreign keys and no multi-document
//! transactions; integrity is enforced one layer up, in the repositories.
//!
//! Two backends are provided:
//! - [`SqliteStore`] - one SQLite table per collection holding JSON bodies
//! - [`MemoryStore`] - in-process substitute for tests and embedding

mod memory;
mod sqlite;

use std::cmp::Ordering;
use std::future::Future;

use serde_json::Value;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored document. The identity lives under [`ID_FIELD`].
pub type Document = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "_id";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum StoreError {
    Connection(sqlx::Error),
    Query(sqlx::Error),
    Serialization(serde_json::Error),
    InvalidData(String),
    DuplicateIdentity(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connection(err) => write!(f, "Store connection error: {}", err),
            StoreError::Query(err) => write!(f, "Store query error: {}", err),
            StoreError::Serialization(err) => write!(f, "Document serialization error: {}", err),
            StoreError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            StoreError::DuplicateIdentity(id) => write!(f, "Duplicate identity: {}", id),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Connection(err) | StoreError::Query(err) => Some(err),
            StoreError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Query(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Collections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Projects,
    Commits,
    Reports,
    Users,
    UserXProject,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Projects,
        Collection::Commits,
        Collection::Reports,
        Collection::Users,
        Collection::UserXProject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Commits => "commits",
            Collection::Reports => "reports",
            Collection::Users => "users",
            Collection::UserXProject => "user_x_project",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Filters and queries
// ============================================================================

/// A single predicate over a top-level string field.
///
/// Field names are static so that backends can splice them into queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(&'static str, String),
    In(&'static str, Vec<String>),
}

impl Condition {
    pub fn field(&self) -> &'static str {
        match self {
            Condition::Equals(field, _) | Condition::In(field, _) => field,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        let value = document.get(self.field()).and_then(Value::as_str);
        match (self, value) {
            (Condition::Equals(_, expected), Some(value)) => value == expected,
            (Condition::In(_, candidates), Some(value)) => candidates.iter().any(|c| c == value),
            (_, None) => false,
        }
    }
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Equals(field, value.into()));
        self
    }

    pub fn any_of<I, V>(mut self, field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push(Condition::In(field, values));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sort {
    pub field: &'static str,
    pub descending: bool,
}

impl Sort {
    /// Order two documents by the sort field. Missing values sort first
    /// ascending, matching SQL NULL ordering.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(a.get(self.field), b.get(self.field));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Filter plus optional ordering and limit. Without a sort, results come back
/// in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort_desc(mut self, field: &'static str) -> Self {
        self.sort = Some(Sort { field, descending: true });
        self
    }

    pub fn sort_asc(mut self, field: &'static str) -> Self {
        self.sort = Some(Sort { field, descending: false });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Generic key-document store.
///
/// Implementations are cheap to clone and shared by every repository; they
/// must be safe for concurrent use without caller-side locking.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Insert a new document. Fails with [`StoreError::DuplicateIdentity`] if a
    /// document with the same id already exists in the collection.
    fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> impl Future<Output = Result<()>> + Send;

    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<Document>>> + Send;

    fn find(
        &self,
        collection: Collection,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Document>>> + Send;

    /// Returns the number of deleted documents.
    fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Deletes at most one matching document.
    fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64>> + Send;
}

pub(crate) fn document_id(document: &Document) -> Result<&str> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidData(format!("document has no string '{}'", ID_FIELD)))
}
