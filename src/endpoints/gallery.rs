//! Gallery endpoints: the merged image feed, uploads, moderation, and likes.

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::Db,
    feed::{self, FeedOptions, FeedPage},
    models::{FeedImage, GALLERY_CATEGORIES, ISSUE_CATEGORIES},
    points::{self, PointAction},
    serve::AppState,
    Error, Result,
};

#[derive(Deserialize)]
struct FeedParams {
    limit: Option<usize>,
    offset: Option<usize>,
    category: Option<String>,
    user_id: Option<String>,
}

/// The merged, paginated image feed for one LGA.
async fn image_feed(
    State(db): State<Db>,
    Path(lga_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>> {
    let limit = params.limit.unwrap_or(20);
    if limit == 0 {
        return Err(Error::bad_request(anyhow!("limit must be positive")));
    }

    // The filter may name either enumeration: gallery rows are matched in the
    // store, issue-derived rows in memory.
    if let Some(category) = &params.category {
        let known = GALLERY_CATEGORIES.contains(&category.as_str())
            || ISSUE_CATEGORIES.contains(&category.as_str());
        if !known {
            return Err(Error::bad_request(anyhow!(
                "unknown category {category:?}"
            )));
        }
    }

    let opts = FeedOptions {
        limit,
        offset: params.offset.unwrap_or(0),
        category: params.category,
        user_id: params.user_id,
    };

    let page = feed::lga_images(&db, &lga_id, &opts).await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
struct UploadRequest {
    user_id: Option<String>,
    image_url: String,
    caption: Option<String>,
    category: Option<String>,
}

/// Record an uploaded gallery image. The object itself already lives in
/// external storage; only its URL is recorded here. New images await
/// moderation and stay out of the public feed until approved.
async fn upload_image(
    State(db): State<Db>,
    Path(lga_id): Path<String>,
    Json(input): Json<UploadRequest>,
) -> Result<Json<FeedImage>> {
    if input.image_url.is_empty() {
        return Err(Error::bad_request(anyhow!("image_url must not be empty")));
    }
    if let Some(category) = &input.category {
        if !GALLERY_CATEGORIES.contains(&category.as_str()) {
            return Err(Error::bad_request(anyhow!(
                "unknown gallery category {category:?}"
            )));
        }
    }

    let lga: Option<String> = sqlx::query_scalar("SELECT id FROM lgas WHERE id = ?")
        .bind(&lga_id)
        .fetch_optional(&db)
        .await
        .context("failed to check LGA")?;
    if lga.is_none() {
        return Err(Error::not_found(anyhow!("no LGA with id {lga_id:?}")));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO lga_images (id, lga_id, user_id, image_url, caption, category, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&lga_id)
    .bind(&input.user_id)
    .bind(&input.image_url)
    .bind(&input.caption)
    .bind(&input.category)
    .bind(now)
    .execute(&db)
    .await
    .context("failed to record image")?;

    if let Some(user_id) = &input.user_id {
        points::award_action(&db, user_id, PointAction::UploadImage)
            .await
            .context("failed to award upload points")?;
    }

    metrics::counter!(crate::metrics::IMAGES_UPLOADED).increment(1);

    Ok(Json(FeedImage {
        id,
        lga_id,
        user_id: input.user_id,
        image_url: input.image_url,
        caption: input.caption,
        category: input.category,
        likes_count: 0,
        is_approved: false,
        is_featured: false,
        created_at: now,
        uploader: None,
        is_liked_by_user: None,
        issue_id: None,
    }))
}

#[derive(Deserialize)]
struct ApproveRequest {
    approved_by: String,
}

async fn approve_image(
    State(db): State<Db>,
    Path(image_id): Path<String>,
    Json(input): Json<ApproveRequest>,
) -> Result<Json<serde_json::Value>> {
    let updated = sqlx::query(
        "UPDATE lga_images SET is_approved = 1, approved_at = ?, approved_by = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(&input.approved_by)
    .bind(&image_id)
    .execute(&db)
    .await
    .context("failed to approve image")?;

    if updated.rows_affected() == 0 {
        return Err(Error::not_found(anyhow!("no image with id {image_id:?}")));
    }

    info!("image {image_id} approved by {}", input.approved_by);
    metrics::counter!(crate::metrics::IMAGES_APPROVED).increment(1);

    Ok(Json(serde_json::json!({ "id": image_id, "is_approved": true })))
}

#[derive(Deserialize)]
struct LikeRequest {
    user_id: String,
}

#[derive(Serialize)]
struct LikeResponse {
    likes_count: i64,
}

/// Record a like. Returns the server-confirmed count, which is the source of
/// truth for the UI; a duplicate like surfaces as a conflict.
async fn like_image(
    State(db): State<Db>,
    Path(image_id): Path<String>,
    Json(input): Json<LikeRequest>,
) -> Result<Json<LikeResponse>> {
    let likes_count = feed::like_image(&db, &image_id, &input.user_id).await?;
    Ok(Json(LikeResponse { likes_count }))
}

/// Remove a like. Removing a like that never existed is a successful no-op.
async fn unlike_image(
    State(db): State<Db>,
    Path(image_id): Path<String>,
    Json(input): Json<LikeRequest>,
) -> Result<Json<LikeResponse>> {
    let likes_count = feed::unlike_image(&db, &image_id, &input.user_id).await?;
    Ok(Json(LikeResponse { likes_count }))
}

#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lgas/{id}/images",     get(image_feed).post(upload_image))
        .route("/images/{id}/approve",  post(approve_image))
        .route("/images/{id}/likes",    post(like_image).delete(unlike_image))
}
