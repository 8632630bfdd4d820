//! LGA catalogue endpoints.

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;

use crate::{
    db::Db,
    models::{IssueReport, Lga},
    serve::AppState,
    Error, Result,
};

#[derive(Deserialize)]
struct ListParams {
    state: Option<String>,
    search: Option<String>,
}

async fn list_lgas(
    State(db): State<Db>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Lga>>> {
    let mut query = QueryBuilder::new("SELECT * FROM lgas WHERE 1 = 1");

    // `all` is the UI's sentinel for "no state filter".
    if let Some(state) = params.state.filter(|s| s.as_str() != "all") {
        query.push(" AND state = ");
        query.push_bind(state);
    }
    if let Some(search) = params.search.filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        query.push(" AND (name LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR state LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    query.push(" ORDER BY state ASC, name ASC");

    let lgas: Vec<Lga> = query
        .build_query_as()
        .fetch_all(&db)
        .await
        .context("failed to list LGAs")?;

    Ok(Json(lgas))
}

async fn list_states(State(db): State<Db>) -> Result<Json<Vec<String>>> {
    let states: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT state FROM lgas ORDER BY state ASC")
            .fetch_all(&db)
            .await
            .context("failed to list states")?;

    Ok(Json(states))
}

#[derive(Serialize, sqlx::FromRow)]
struct BudgetAllocation {
    id: String,
    lga_id: String,
    year: i64,
    category: String,
    allocated_amount: i64,
    spent_amount: i64,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, sqlx::FromRow)]
struct LgaProject {
    id: String,
    lga_id: String,
    name: String,
    description: Option<String>,
    budget_allocated: Option<i64>,
    budget_spent: Option<i64>,
    status: String,
    category: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, sqlx::FromRow)]
struct GalleryStats {
    total_images: i64,
    approved_images: i64,
    featured_images: i64,
    total_likes: i64,
}

#[derive(Serialize)]
struct LgaDetails {
    #[serde(flatten)]
    lga: Lga,
    budget_allocations: Vec<BudgetAllocation>,
    projects: Vec<LgaProject>,
    issues: Vec<IssueReport>,
    gallery_stats: GalleryStats,
}

async fn lga_details(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<LgaDetails>> {
    let lga: Option<Lga> = sqlx::query_as("SELECT * FROM lgas WHERE id = ?")
        .bind(&id)
        .fetch_optional(&db)
        .await
        .context("failed to fetch LGA")?;
    let lga = lga.ok_or_else(|| Error::not_found(anyhow!("no LGA with id {id:?}")))?;

    let budget_allocations: Vec<BudgetAllocation> =
        sqlx::query_as("SELECT * FROM budget_allocations WHERE lga_id = ? ORDER BY year DESC")
            .bind(&id)
            .fetch_all(&db)
            .await
            .context("failed to fetch budget allocations")?;

    let projects: Vec<LgaProject> =
        sqlx::query_as("SELECT * FROM lga_projects WHERE lga_id = ? ORDER BY created_at DESC")
            .bind(&id)
            .fetch_all(&db)
            .await
            .context("failed to fetch projects")?;

    let issues: Vec<IssueReport> = sqlx::query_as(
        "SELECT * FROM issue_reports WHERE lga_id = ? ORDER BY created_at DESC LIMIT 10",
    )
    .bind(&id)
    .fetch_all(&db)
    .await
    .context("failed to fetch issues")?;

    let gallery_stats: GalleryStats = sqlx::query_as(
        "SELECT COUNT(*) AS total_images, \
                COALESCE(SUM(is_approved), 0) AS approved_images, \
                COALESCE(SUM(is_featured), 0) AS featured_images, \
                COALESCE(SUM(likes_count), 0) AS total_likes \
         FROM lga_images WHERE lga_id = ?",
    )
    .bind(&id)
    .fetch_one(&db)
    .await
    .context("failed to fetch gallery stats")?;

    Ok(Json(LgaDetails {
        lga,
        budget_allocations,
        projects,
        issues,
        gallery_stats,
    }))
}

async fn update_governance(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(governance): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let updated = sqlx::query("UPDATE lgas SET governance = ? WHERE id = ?")
        .bind(sqlx::types::Json(&governance))
        .bind(&id)
        .execute(&db)
        .await
        .context("failed to update governance")?;

    if updated.rows_affected() == 0 {
        return Err(Error::not_found(anyhow!("no LGA with id {id:?}")));
    }

    Ok(Json(governance))
}

#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lgas",                 get(list_lgas))
        .route("/lgas/states",          get(list_states))
        .route("/lgas/{id}",            get(lga_details))
        .route("/lgas/{id}/governance", put(update_governance))
}
