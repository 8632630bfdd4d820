//! Issue report endpoints.

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    db::Db,
    models::{IssueReport, ISSUE_CATEGORIES, ISSUE_PRIORITIES, ISSUE_STATUSES},
    points::{self, Milestone, PointAction},
    serve::AppState,
    Error, Result,
};

#[derive(Deserialize)]
struct CreateIssueRequest {
    lga_id: String,
    user_id: Option<String>,
    title: String,
    description: Option<String>,
    category: Option<String>,
    location_address: Option<String>,
    #[serde(default)]
    image_urls: Vec<String>,
    priority: Option<String>,
}

/// File a new environmental issue report. Any attached photos become visible
/// in the LGA's image feed immediately; reports carry no moderation step.
async fn create_issue(
    State(db): State<Db>,
    Json(input): Json<CreateIssueRequest>,
) -> Result<Json<IssueReport>> {
    if input.title.trim().is_empty() {
        return Err(Error::bad_request(anyhow!("title must not be empty")));
    }
    if let Some(category) = &input.category {
        if !ISSUE_CATEGORIES.contains(&category.as_str()) {
            return Err(Error::bad_request(anyhow!(
                "unknown issue category {category:?}"
            )));
        }
    }
    let priority = input.priority.as_deref().unwrap_or("medium");
    if !ISSUE_PRIORITIES.contains(&priority) {
        return Err(Error::bad_request(anyhow!(
            "unknown priority {priority:?}"
        )));
    }

    let lga: Option<String> = sqlx::query_scalar("SELECT id FROM lgas WHERE id = ?")
        .bind(&input.lga_id)
        .fetch_optional(&db)
        .await
        .context("failed to check LGA")?;
    if lga.is_none() {
        return Err(Error::not_found(anyhow!(
            "no LGA with id {:?}",
            input.lga_id
        )));
    }

    let id = Uuid::new_v4().to_string();
    let report: IssueReport = sqlx::query_as(
        "INSERT INTO issue_reports \
             (id, user_id, lga_id, title, description, category, location_address, \
              image_urls, status, priority, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'reported', ?, ?) \
         RETURNING *",
    )
    .bind(&id)
    .bind(&input.user_id)
    .bind(&input.lga_id)
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.location_address)
    .bind(sqlx::types::Json(&input.image_urls))
    .bind(priority)
    .bind(Utc::now())
    .fetch_one(&db)
    .await
    .context("failed to create issue report")?;

    info!("issue reported: {} ({})", report.title, report.id);
    metrics::counter!(crate::metrics::ISSUES_REPORTED).increment(1);

    if let Some(user_id) = &input.user_id {
        points::award_action(&db, user_id, PointAction::ReportIssue)
            .await
            .context("failed to award report points")?;

        // A referred user's first report rewards their referrer.
        let reports: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM issue_reports WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&db)
                .await
                .context("failed to count reports")?;
        if reports == 1 {
            points::referred_milestone(&db, user_id, Milestone::FirstReport)
                .await
                .context("failed to process referral milestone")?;
        }
    }

    Ok(Json(report))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

/// Move a report through its lifecycle. Entering `resolved` stamps the
/// resolution date; leaving it does not clear the stamp.
async fn update_status(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<StatusRequest>,
) -> Result<Json<IssueReport>> {
    if !ISSUE_STATUSES.contains(&input.status.as_str()) {
        return Err(Error::bad_request(anyhow!(
            "unknown status {:?}",
            input.status
        )));
    }

    let resolved_date = (input.status == "resolved").then(Utc::now);
    let report: Option<IssueReport> = sqlx::query_as(
        "UPDATE issue_reports \
         SET status = ?, resolved_date = COALESCE(?, resolved_date) \
         WHERE id = ? \
         RETURNING *",
    )
    .bind(&input.status)
    .bind(resolved_date)
    .bind(&id)
    .fetch_optional(&db)
    .await
    .context("failed to update issue status")?;

    report
        .map(Json)
        .ok_or_else(|| Error::not_found(anyhow!("no issue with id {id:?}")))
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

async fn list_issues(
    State(db): State<Db>,
    Path(lga_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<IssueReport>>> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let issues: Vec<IssueReport> = sqlx::query_as(
        "SELECT * FROM issue_reports WHERE lga_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(&lga_id)
    .bind(limit)
    .fetch_all(&db)
    .await
    .context("failed to list issue reports")?;

    Ok(Json(issues))
}

#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/issues",                 post(create_issue))
        .route("/issues/{id}/status",     post(update_status))
        .route("/lgas/{id}/issues",       get(list_issues))
}
