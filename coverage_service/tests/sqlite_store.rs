use coverage_service::models::{Entity, NewJob, Project};
use coverage_service::store::{Collection, Document, Filter, Query, StoreError};
use coverage_service::validation::ProjectUrl;
use coverage_service::{
    BadgeService, CoverageError, DocumentStore, JobIngestion, Repositories, SqliteStore,
};
use serde_json::json;
use tempfile::TempDir;

async fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("coverage.db").display());
    let store = SqliteStore::connect(&url).await.unwrap();
    (dir, store)
}

fn doc(value: serde_json::Value) -> Document {
    serde_json::from_value(value).unwrap()
}

fn ids(documents: &[Document]) -> Vec<&str> {
    documents
        .iter()
        .map(|d| d["_id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_duplicate_identity() {
    let (_dir, store) = open_store().await;
    store
        .insert(Collection::Users, doc(json!({"_id": "a", "name": "alice"})))
        .await
        .unwrap();

    let err = store
        .insert(Collection::Users, doc(json!({"_id": "a", "name": "other"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateIdentity(id) if id == "a"));

    // Same id in another collection is a different document
    store
        .insert(Collection::Projects, doc(json!({"_id": "a", "name": "p"})))
        .await
        .unwrap();

    let stored = store
        .find_one(Collection::Users, &Filter::by_id("a"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["name"], "alice");
}

#[tokio::test]
async fn test_filters() {
    let (_dir, store) = open_store().await;
    for (id, commit) in [("r1", "c1"), ("r2", "c2"), ("r3", "c1"), ("r4", "c3")] {
        store
            .insert(Collection::Reports, doc(json!({"_id": id, "commit_id": commit})))
            .await
            .unwrap();
    }

    let by_commit = store
        .find(Collection::Reports, &Query::new(Filter::new().eq("commit_id", "c1")))
        .await
        .unwrap();
    assert_eq!(ids(&by_commit), vec!["r1", "r3"]);

    let any = store
        .find(
            Collection::Reports,
            &Query::new(Filter::new().any_of("commit_id", ["c2", "c3"])),
        )
        .await
        .unwrap();
    assert_eq!(ids(&any), vec!["r2", "r4"]);

    let none = store
        .find(
            Collection::Reports,
            &Query::new(Filter::new().any_of("commit_id", Vec::<String>::new())),
        )
        .await
        .unwrap();
    assert!(none.is_empty());

    let all = store
        .find(Collection::Reports, &Query::new(Filter::new()).limit(3))
        .await
        .unwrap();
    assert_eq!(ids(&all), vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn test_sort_and_delete() {
    let (_dir, store) = open_store().await;
    for (id, ts) in [
        ("c1", "2024-05-01T10:00:00.000000Z"),
        ("c2", "2024-05-03T10:00:00.000000Z"),
        ("c3", "2024-05-02T10:00:00.000000Z"),
    ] {
        store
            .insert(
                Collection::Commits,
                doc(json!({"_id": id, "project_id": "p", "timestamp": ts})),
            )
            .await
            .unwrap();
    }

    let newest = store
        .find(
            Collection::Commits,
            &Query::new(Filter::new().eq("project_id", "p"))
                .sort_desc("timestamp")
                .limit(1),
        )
        .await
        .unwrap();
    assert_eq!(ids(&newest), vec!["c2"]);

    let oldest_first = store
        .find(Collection::Commits, &Query::new(Filter::new()).sort_asc("timestamp"))
        .await
        .unwrap();
    assert_eq!(ids(&oldest_first), vec!["c1", "c3", "c2"]);

    let project = Filter::new().eq("project_id", "p");
    assert_eq!(store.delete_one(Collection::Commits, &project).await.unwrap(), 1);
    assert_eq!(store.delete_many(Collection::Commits, &project).await.unwrap(), 2);
    assert_eq!(store.delete_many(Collection::Commits, &project).await.unwrap(), 0);
}

#[tokio::test]
async fn test_data_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("coverage.db").display());

    let project = {
        let repositories = Repositories::new(SqliteStore::connect(&url).await.unwrap());
        repositories
            .projects
            .save(Project::new(
                "take-over",
                ProjectUrl::parse("https://github.com/acme/take-over").unwrap(),
            ))
            .await
            .unwrap()
    };

    let repositories = Repositories::new(SqliteStore::connect(&url).await.unwrap());
    let stored = repositories.projects.get(project.id().as_str()).await.unwrap();
    assert_eq!(stored, project);
}

#[tokio::test]
async fn test_ingestion_badge_and_cascade_on_sqlite() {
    let (_dir, store) = open_store().await;
    let repositories = Repositories::new(store);
    let ingestion = JobIngestion::new(&repositories);
    let badges = BadgeService::new(&repositories, "https://img.shields.io/badge/");

    let project = repositories
        .projects
        .save(Project::new(
            "take-over",
            ProjectUrl::parse("https://github.com/acme/take-over").unwrap(),
        ))
        .await
        .unwrap();
    let pid = project.id().as_str();

    for (sha, ts, name, coverage) in [
        ("0123456789abcdef0123456789abcdef01234567", "2024-04-30 09:00:00", "unit", 20.0),
        ("f1e95cf2878741f42fd371a2df553a2b94065bc2", "2024-05-01T10:00:00Z", "unit", 85.0),
        ("f1e95cf2878741f42fd371a2df553a2b94065bc2", "2024-05-01T10:00:00Z", "lint", 100.0),
    ] {
        ingestion
            .record(NewJob::new(pid, "main", sha, ts, name, coverage).unwrap())
            .await
            .unwrap();
    }

    let duplicate = ingestion
        .record(
            NewJob::new(
                pid,
                "main",
                "f1e95cf2878741f42fd371a2df553a2b94065bc2",
                "2024-05-01T10:00:00Z",
                "unit",
                1.0,
            )
            .unwrap(),
        )
        .await;
    assert!(matches!(duplicate, Err(CoverageError::AlreadyExists(_))));

    assert_eq!(
        badges.badge_url(pid, None).await.unwrap(),
        "https://img.shields.io/badge/coverage-85.0%25-0?color=809200"
    );

    assert!(repositories.projects.delete(pid).await.unwrap());
    assert!(!repositories.projects.delete(pid).await.unwrap());
    assert_eq!(repositories.commits.list(10).await.unwrap().count(), 0);
    assert_eq!(repositories.reports.list(10).await.unwrap().count(), 0);
}
