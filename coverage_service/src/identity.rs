//! Content-derived identity
//!
//! Every entity id is the lowercase hex MD5 digest of its semantic key fields,
//! concatenated in a fixed order with no separator:
//!
//! | kind       | digest input            |
//! |------------|-------------------------|
//! | User       | `name`                  |
//! | Project    | `name` + `url`          |
//! | Commit     | `project_id` + `sha`    |
//! | Report     | `commit_id` + `job_name`|
//! | Membership | `user_id` + `project_id`|
//!
//! The format is shared by every writer of the store; changing it orphans all
//! previously written ids.

use md5::{Digest, Md5};

use crate::validation::{CommitSha, EntityId, ProjectUrl};

#[derive(Debug, Clone, Copy)]
pub enum IdentityKey<'a> {
    User { name: &'a str },
    Project { name: &'a str, url: &'a ProjectUrl },
    Commit { project_id: &'a EntityId, sha: &'a CommitSha },
    Report { commit_id: &'a EntityId, job_name: &'a str },
    Membership { user_id: &'a EntityId, project_id: &'a EntityId },
}

impl IdentityKey<'_> {
    fn fields(&self) -> [&str; 2] {
        match self {
            IdentityKey::User { name } => [*name, ""],
            IdentityKey::Project { name, url } => [*name, url.as_str()],
            IdentityKey::Commit { project_id, sha } => [project_id.as_str(), sha.as_str()],
            IdentityKey::Report { commit_id, job_name } => [commit_id.as_str(), *job_name],
            IdentityKey::Membership { user_id, project_id } => {
                [user_id.as_str(), project_id.as_str()]
            }
        }
    }

    pub fn derive(&self) -> EntityId {
        let mut hasher = Md5::new();
        for field in self.fields() {
            hasher.update(field.as_bytes());
        }
        EntityId::from_digest(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT_ID: &str = "13607e0f7a0bb3f26b2bc06cc9ebc853";
    const SHA: &str = "f1e95cf2878741f42fd371a2df553a2b94065bc2";

    fn project_id() -> EntityId {
        EntityId::parse(PROJECT_ID).unwrap()
    }

    #[test]
    fn test_user_digest() {
        let id = IdentityKey::User { name: "alice" }.derive();
        assert_eq!(id.as_str(), "6384e2b2184bcbf58eccf10ca7a6563c");
    }

    #[test]
    fn test_project_digest() {
        let url = ProjectUrl::parse("https://github.com/acme/take-over").unwrap();
        let id = IdentityKey::Project { name: "take-over", url: &url }.derive();
        assert_eq!(id.as_str(), PROJECT_ID);
    }

    #[test]
    fn test_commit_and_report_digest_chain() {
        let sha = CommitSha::parse(SHA).unwrap();
        let commit_id = IdentityKey::Commit { project_id: &project_id(), sha: &sha }.derive();
        assert_eq!(commit_id.as_str(), "2842d5fbe5f43a21bf9e8ef98fc23a2c");

        let report_id = IdentityKey::Report { commit_id: &commit_id, job_name: "unit-tests" }.derive();
        assert_eq!(report_id.as_str(), "a03a7071945b4c1d9e9b672845e2d982");
    }

    #[test]
    fn test_membership_digest() {
        let user_id = IdentityKey::User { name: "alice" }.derive();
        let id = IdentityKey::Membership { user_id: &user_id, project_id: &project_id() }.derive();
        assert_eq!(id.as_str(), "8552c4f4b062152011ffa9c881f90dfa");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let first = IdentityKey::User { name: "bob" }.derive();
        let second = IdentityKey::User { name: "bob" }.derive();
        assert_eq!(first, second);
        assert_ne!(first, IdentityKey::User { name: "alice" }.derive());
    }
}
