//! Coverage API Handlers
//!
//! - `POST /job` - Record the coverage of one CI job
//! - `GET /project/{project_id}` - Get a project
//! - `GET /project/{project_id}/badge.svg?branch=` - Redirect to the coverage badge
//! - `GET /health` - Liveness probe

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::badge::BadgeService;
use crate::config::Config;
use crate::error::CoverageError;
use crate::ingestion::JobIngestion;
use crate::models::{NewJob, Project, Report};
use crate::repository::Repositories;
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState<S> {
    pub repositories: Repositories<S>,
    pub ingestion: JobIngestion<S>,
    pub badges: BadgeService<S>,
}

impl<S: DocumentStore> AppState<S> {
    pub fn new(store: S, config: &Config) -> Self {
        let repositories = Repositories::new(store);
        Self {
            ingestion: JobIngestion::new(&repositories),
            badges: BadgeService::new(&repositories, config.badge_base_url.as_str()),
            repositories,
        }
    }
}

impl IntoResponse for CoverageError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoverageError::NotFound(_) => StatusCode::NOT_FOUND,
            CoverageError::AlreadyExists(_) => StatusCode::CONFLICT,
            CoverageError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoverageError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

async fn post_job<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Json(job): Json<NewJob>,
) -> Result<Json<Report>, CoverageError> {
    info!(
        project_id = %job.project_id,
        commit_sha = %job.commit_sha,
        job_name = job.job_name.as_str(),
        "Job received"
    );
    let report = state.ingestion.record(job).await?;
    Ok(Json(report))
}

async fn get_project<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, CoverageError> {
    let project = state.repositories.projects.get(&project_id).await?;
    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
pub struct BadgeParams {
    branch: Option<String>,
}

async fn get_badge<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<String>,
    Query(params): Query<BadgeParams>,
) -> Result<Redirect, CoverageError> {
    let url = state
        .badges
        .badge_url(&project_id, params.branch.as_deref())
        .await?;
    Ok(Redirect::temporary(&url))
}

pub fn routes<S: DocumentStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/job", post(post_job::<S>))
        .route("/project/{project_id}", get(get_project::<S>))
        .route("/project/{project_id}/badge.svg", get(get_badge::<S>))
        .route("/health", get(|| async { "OK" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::validation::ValidationError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoverageError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoverageError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (
                CoverageError::Validation(ValidationError::InvalidSha("abc".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CoverageError::Store(StoreError::InvalidData("bad".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
