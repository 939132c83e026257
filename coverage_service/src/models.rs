//! Domain Models
//!
//! Entities persisted by the service. Each one carries a content-derived id
//! (see [`crate::identity`]) serialized as `_id`, and is a plain value object:
//! fields are set at construction and never change afterwards.
//!
//! The `New*` types are submissions from outside (HTTP bodies, CLI files)
//! before they become entities.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::identity::IdentityKey;
use crate::store::Collection;
use crate::validation::{
    normalize_timestamp, stored_timestamp, validate_coverage, CommitSha, EntityId, ProjectUrl,
    RawTimestamp, ValidationError,
};

/// Document field names used by relationship queries.
pub mod fields {
    pub const PROJECT_ID: &str = "project_id";
    pub const COMMIT_ID: &str = "commit_id";
    pub const USER_ID: &str = "user_id";
    pub const BRANCH: &str = "branch";
    pub const TIMESTAMP: &str = "timestamp";
}

/// A persisted entity type and the collection it lives in.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Human-readable kind used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &EntityId;
}

// ============================================================================
// User
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    id: EntityId,
    name: String,
    password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>, password: impl Into<String>, email: Option<String>) -> Self {
        let name = name.into();
        let id = IdentityKey::User { name: &name }.derive();
        Self {
            id,
            name,
            password: password.into(),
            email,
        }
    }

    /// Replace the derived id with a known one.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;
    const KIND: &'static str = "User";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(rename = "_id", default)]
    pub id: Option<EntityId>,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewUser {
    pub fn into_user(self) -> User {
        let user = User::new(self.name, self.password, self.email);
        match self.id {
            Some(id) => user.with_id(id),
            None => user,
        }
    }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    id: EntityId,
    name: String,
    url: ProjectUrl,
}

impl Project {
    pub fn new(name: impl Into<String>, url: ProjectUrl) -> Self {
        let name = name.into();
        let id = IdentityKey::Project { name: &name, url: &url }.derive();
        Self { id, name, url }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &ProjectUrl {
        &self.url
    }
}

impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;
    const KIND: &'static str = "Project";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Project definition as submitted, e.g. from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    #[serde(rename = "_id", default)]
    pub id: Option<EntityId>,
    pub name: String,
    pub url: ProjectUrl,
}

impl NewProject {
    pub fn into_project(self) -> Project {
        let project = Project::new(self.name, self.url);
        match self.id {
            Some(id) => project.with_id(id),
            None => project,
        }
    }
}

// ============================================================================
// Commit
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(rename = "_id")]
    id: EntityId,
    project_id: EntityId,
    branch: String,
    sha: CommitSha,
    #[serde(with = "stored_timestamp")]
    timestamp: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        project_id: EntityId,
        branch: impl Into<String>,
        sha: CommitSha,
        timestamp: impl Into<RawTimestamp>,
    ) -> Result<Self, ValidationError> {
        let timestamp = normalize_timestamp(timestamp)?;
        let id = Self::derive_id(&project_id, &sha);
        Ok(Self {
            id,
            project_id,
            branch: branch.into(),
            sha,
            timestamp,
        })
    }

    /// The id a commit for `(project_id, sha)` has, without building it.
    pub fn derive_id(project_id: &EntityId, sha: &CommitSha) -> EntityId {
        IdentityKey::Commit { project_id, sha }.derive()
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn project_id(&self) -> &EntityId {
        &self.project_id
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn sha(&self) -> &CommitSha {
        &self.sha
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Entity for Commit {
    const COLLECTION: Collection = Collection::Commits;
    const KIND: &'static str = "Commit";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "_id")]
    id: EntityId,
    commit_id: EntityId,
    branch: String,
    job_name: String,
    coverage_value: f64,
}

impl Report {
    pub fn new(
        commit_id: EntityId,
        branch: impl Into<String>,
        job_name: impl Into<String>,
        coverage_value: f64,
    ) -> Result<Self, ValidationError> {
        let coverage_value = validate_coverage(coverage_value)?;
        let job_name = job_name.into();
        let id = IdentityKey::Report { commit_id: &commit_id, job_name: &job_name }.derive();
        Ok(Self {
            id,
            commit_id,
            branch: branch.into(),
            job_name,
            coverage_value,
        })
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn commit_id(&self) -> &EntityId {
        &self.commit_id
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn coverage_value(&self) -> f64 {
        self.coverage_value
    }
}

impl Entity for Report {
    const COLLECTION: Collection = Collection::Reports;
    const KIND: &'static str = "Report";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

// ============================================================================
// Membership (user x project)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(rename = "_id")]
    id: EntityId,
    user_id: EntityId,
    project_id: EntityId,
}

impl Membership {
    pub fn new(user_id: EntityId, project_id: EntityId) -> Self {
        let id = Self::derive_id(&user_id, &project_id);
        Self {
            id,
            user_id,
            project_id,
        }
    }

    pub fn derive_id(user_id: &EntityId, project_id: &EntityId) -> EntityId {
        IdentityKey::Membership { user_id, project_id }.derive()
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn user_id(&self) -> &EntityId {
        &self.user_id
    }

    pub fn project_id(&self) -> &EntityId {
        &self.project_id
    }
}

impl Entity for Membership {
    const COLLECTION: Collection = Collection::UserXProject;
    const KIND: &'static str = "Membership";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

// ============================================================================
// Job submission
// ============================================================================

/// Coverage result of one CI job for one commit.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub project_id: EntityId,
    pub branch: String,
    pub commit_sha: CommitSha,
    /// Normalized to UTC on construction and on deserialization.
    #[serde(alias = "commit_dttm", deserialize_with = "stored_timestamp::deserialize")]
    pub commit_timestamp: DateTime<Utc>,
    pub job_name: String,
    pub coverage_value: f64,
}

impl NewJob {
    pub fn new(
        project_id: &str,
        branch: impl Into<String>,
        commit_sha: &str,
        commit_timestamp: impl Into<RawTimestamp>,
        job_name: impl Into<String>,
        coverage_value: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            project_id: EntityId::parse(project_id)?,
            branch: branch.into(),
            commit_sha: CommitSha::parse(commit_sha)?,
            commit_timestamp: normalize_timestamp(commit_timestamp)?,
            job_name: job_name.into(),
            coverage_value: validate_coverage(coverage_value)?,
        })
    }

    /// Id of the commit this job reports on, derived without storage access.
    pub fn commit_id(&self) -> EntityId {
        Commit::derive_id(&self.project_id, &self.commit_sha)
    }
}
