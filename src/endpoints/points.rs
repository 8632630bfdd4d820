//! Gamification endpoints: points, badges, leaderboard, referrals.

use anyhow::{anyhow, Context as _};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::Db,
    models::{Badge, LeaderboardEntry, PointHistoryEntry, Referral, UserBadge, UserPoints},
    points::{self, Milestone, PointAction},
    serve::AppState,
    Error, Result,
};

#[derive(Deserialize)]
struct AwardRequest {
    user_id: String,
    /// One of the fixed point actions...
    action: Option<PointAction>,
    /// ...or a custom award with an explicit reason.
    points: Option<i64>,
    reason: Option<String>,
}

async fn award(
    State(db): State<Db>,
    Json(input): Json<AwardRequest>,
) -> Result<Json<UserPoints>> {
    let totals = match (input.action, input.points, input.reason) {
        (Some(action), None, None) => points::award_action(&db, &input.user_id, action).await?,
        (None, Some(pts), Some(reason)) => {
            points::award_points(&db, &input.user_id, pts, &reason).await?
        }
        _ => {
            return Err(Error::bad_request(anyhow!(
                "provide either an action, or points with a reason"
            )))
        }
    };

    Ok(Json(totals))
}

async fn user_points(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Result<Json<UserPoints>> {
    let totals: Option<UserPoints> = sqlx::query_as("SELECT * FROM user_points WHERE user_id = ?")
        .bind(&user_id)
        .fetch_optional(&db)
        .await
        .context("failed to fetch points")?;

    totals
        .map(Json)
        .ok_or_else(|| Error::not_found(anyhow!("no points recorded for {user_id:?}")))
}

#[derive(Deserialize)]
struct LimitParam {
    limit: Option<i64>,
}

async fn point_history(
    State(db): State<Db>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParam>,
) -> Result<Json<Vec<PointHistoryEntry>>> {
    let limit = params.limit.unwrap_or(20).clamp(1, 200);

    let history: Vec<PointHistoryEntry> = sqlx::query_as(
        "SELECT * FROM point_history WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(&user_id)
    .bind(limit)
    .fetch_all(&db)
    .await
    .context("failed to fetch point history")?;

    Ok(Json(history))
}

async fn leaderboard(
    State(db): State<Db>,
    Query(params): Query<LimitParam>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let limit = params.limit.unwrap_or(100).clamp(1, 500);

    let entries: Vec<LeaderboardEntry> = sqlx::query_as(
        "SELECT u.user_id, p.full_name, p.avatar_url, u.total_points, u.level \
         FROM user_points u \
         LEFT JOIN profiles p ON p.id = u.user_id \
         ORDER BY u.total_points DESC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&db)
    .await
    .context("failed to fetch leaderboard")?;

    Ok(Json(entries))
}

async fn all_badges(State(db): State<Db>) -> Result<Json<Vec<Badge>>> {
    let badges: Vec<Badge> =
        sqlx::query_as("SELECT * FROM badges ORDER BY requirement_count ASC")
            .fetch_all(&db)
            .await
            .context("failed to fetch badges")?;

    Ok(Json(badges))
}

async fn user_badges(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserBadge>>> {
    let badges: Vec<UserBadge> = sqlx::query_as(
        "SELECT b.id AS badge_id, b.name, b.description, b.icon, ub.earned_at \
         FROM user_badges ub \
         JOIN badges b ON b.id = ub.badge_id \
         WHERE ub.user_id = ? \
         ORDER BY ub.earned_at DESC",
    )
    .bind(&user_id)
    .fetch_all(&db)
    .await
    .context("failed to fetch user badges")?;

    Ok(Json(badges))
}

#[derive(Deserialize)]
struct BadgeCheckRequest {
    badge_name: String,
}

async fn check_badge(
    State(db): State<Db>,
    Path(user_id): Path<String>,
    Json(input): Json<BadgeCheckRequest>,
) -> Result<Json<serde_json::Value>> {
    let awarded = points::check_and_award_badge(&db, &user_id, &input.badge_name).await?;
    Ok(Json(serde_json::json!({ "awarded": awarded })))
}

#[derive(Deserialize)]
struct CodeRequest {
    user_id: String,
}

async fn referral_code(
    State(db): State<Db>,
    Json(input): Json<CodeRequest>,
) -> Result<Json<serde_json::Value>> {
    let code = points::referral_code(&db, &input.user_id).await?;
    Ok(Json(serde_json::json!({ "referral_code": code })))
}

#[derive(Deserialize)]
struct TrackRequest {
    referral_code: String,
    new_user_id: String,
}

async fn track_referral(
    State(db): State<Db>,
    Json(input): Json<TrackRequest>,
) -> Result<Json<serde_json::Value>> {
    let recorded = points::track_signup(&db, &input.referral_code, &input.new_user_id).await?;
    Ok(Json(serde_json::json!({ "recorded": recorded })))
}

#[derive(Deserialize)]
struct MilestoneRequest {
    milestone: Milestone,
}

async fn referral_milestone(
    State(db): State<Db>,
    Path(user_id): Path<String>,
    Json(input): Json<MilestoneRequest>,
) -> Result<Json<serde_json::Value>> {
    points::referred_milestone(&db, &user_id, input.milestone).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn user_referrals(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Referral>>> {
    let referrals: Vec<Referral> = sqlx::query_as(
        "SELECT r.id, r.referrer_id, r.referred_id, r.referral_code, r.created_at, \
                p.full_name AS referred_name, p.avatar_url AS referred_avatar_url \
         FROM referrals r \
         LEFT JOIN profiles p ON p.id = r.referred_id \
         WHERE r.referrer_id = ? \
         ORDER BY r.created_at DESC",
    )
    .bind(&user_id)
    .fetch_all(&db)
    .await
    .context("failed to fetch referrals")?;

    Ok(Json(referrals))
}

#[derive(Serialize)]
struct ReferralStats {
    total: i64,
    /// Referred users who have reported at least one issue.
    active_users: i64,
}

async fn referral_stats(
    State(db): State<Db>,
    Path(user_id): Path<String>,
) -> Result<Json<ReferralStats>> {
    let (total, active_users): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COALESCE(SUM(EXISTS ( \
                    SELECT 1 FROM issue_reports i WHERE i.user_id = r.referred_id \
                )), 0) \
         FROM referrals r \
         WHERE r.referrer_id = ?",
    )
    .bind(&user_id)
    .fetch_one(&db)
    .await
    .context("failed to fetch referral stats")?;

    Ok(Json(ReferralStats {
        total,
        active_users,
    }))
}

#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/points/award",                 post(award))
        .route("/users/{id}/points",             get(user_points))
        .route("/users/{id}/points/history",     get(point_history))
        .route("/leaderboard",                   get(leaderboard))
        .route("/badges",                        get(all_badges))
        .route("/users/{id}/badges",             get(user_badges))
        .route("/users/{id}/badges/check",      post(check_badge))
        .route("/referrals/code",               post(referral_code))
        .route("/referrals/track",              post(track_referral))
        .route("/users/{id}/referrals",          get(user_referrals))
        .route("/users/{id}/referrals/stats",    get(referral_stats))
        .route("/users/{id}/referrals/milestone", post(referral_milestone))
}
