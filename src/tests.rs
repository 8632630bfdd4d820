//! Database-backed tests over an in-memory SQLite store.

use std::str::FromStr as _;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, TimeZone as _, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use crate::{
    db::{Db, MIGRATOR},
    feed::{self, FeedOptions},
    points::{self, Milestone, PointAction},
};

/// Open a fresh in-memory database with the schema applied. A single
/// connection keeps every query on the same in-memory store.
async fn test_db() -> Result<Db> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;
    MIGRATOR.run(&db).await?;
    Ok(db)
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

async fn seed_lga(db: &Db, id: &str) -> Result<()> {
    sqlx::query("INSERT INTO lgas (id, name, state) VALUES (?, ?, 'Lagos')")
        .bind(id)
        .bind(format!("{id} LGA"))
        .execute(db)
        .await?;
    Ok(())
}

async fn seed_profile(db: &Db, id: &str, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO profiles (id, full_name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(db)
        .await?;
    Ok(())
}

async fn seed_gallery_image(
    db: &Db,
    id: &str,
    lga_id: &str,
    user_id: Option<&str>,
    category: Option<&str>,
    approved: bool,
    created_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO lga_images (id, lga_id, user_id, image_url, category, is_approved, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(lga_id)
    .bind(user_id)
    .bind(format!("https://img.example/{id}.jpg"))
    .bind(category)
    .bind(approved)
    .bind(created_at)
    .execute(db)
    .await?;
    Ok(())
}

async fn seed_issue(
    db: &Db,
    id: &str,
    lga_id: &str,
    user_id: Option<&str>,
    category: Option<&str>,
    urls: &[&str],
    created_at: DateTime<Utc>,
) -> Result<()> {
    let urls: Vec<String> = urls.iter().map(|u| (*u).to_owned()).collect();
    sqlx::query(
        "INSERT INTO issue_reports (id, lga_id, user_id, title, category, image_urls, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(lga_id)
    .bind(user_id)
    .bind(format!("Issue {id}"))
    .bind(category)
    .bind(sqlx::types::Json(urls))
    .bind(created_at)
    .execute(db)
    .await?;
    Ok(())
}

async fn seed_issue_report_row(db: &Db, user_id: &str, lga_id: &str) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    seed_issue(db, &id, lga_id, Some(user_id), Some("waste"), &[], Utc::now()).await
}

#[tokio::test]
async fn feed_merges_sources_and_annotates_viewer_likes() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_profile(&db, "ada", "Ada Obi").await?;

    seed_gallery_image(&db, "g1", "lga1", Some("ada"), Some("nature"), true, ts(30)).await?;
    seed_issue(&db, "r1", "lga1", Some("ada"), Some("waste"), &["a.jpg"], ts(20)).await?;

    feed::like_image(&db, "g1", "ada").await.unwrap();

    let page = feed::lga_images(
        &db,
        "lga1",
        &FeedOptions {
            limit: 20,
            offset: 0,
            category: None,
            user_id: Some("ada".to_owned()),
        },
    )
    .await?;

    assert_eq!(page.total, 2);
    assert_eq!(page.images.len(), 2);

    let gallery = &page.images[0];
    assert_eq!(gallery.id, "g1");
    assert_eq!(gallery.is_liked_by_user, Some(true));
    assert_eq!(gallery.likes_count, 1);
    assert_eq!(
        gallery.uploader.as_ref().and_then(|u| u.full_name.as_deref()),
        Some("Ada Obi")
    );

    // Issue-derived entries are never marked liked; no like path exists.
    let issue = &page.images[1];
    assert_eq!(issue.id, "issue-r1-0");
    assert_eq!(issue.is_liked_by_user, None);
    assert_eq!(issue.caption.as_deref(), Some("Issue r1"));

    Ok(())
}

#[tokio::test]
async fn unapproved_uploads_stay_out_of_the_feed_until_approved() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_gallery_image(&db, "g1", "lga1", None, None, false, ts(0)).await?;

    let opts = FeedOptions {
        limit: 20,
        ..Default::default()
    };
    let page = feed::lga_images(&db, "lga1", &opts).await?;
    assert!(page.images.is_empty());
    assert_eq!(page.total, 0);

    sqlx::query("UPDATE lga_images SET is_approved = 1 WHERE id = 'g1'")
        .execute(&db)
        .await?;

    let page = feed::lga_images(&db, "lga1", &opts).await?;
    assert_eq!(page.images.len(), 1);
    assert_eq!(page.total, 1);

    Ok(())
}

#[tokio::test]
async fn filtered_total_still_counts_removed_issue_images() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_gallery_image(&db, "g1", "lga1", None, Some("nature"), true, ts(10)).await?;
    seed_issue(&db, "r1", "lga1", None, Some("waste"), &["a.jpg"], ts(20)).await?;

    let page = feed::lga_images(
        &db,
        "lga1",
        &FeedOptions {
            limit: 20,
            offset: 0,
            category: Some("nature".to_owned()),
            user_id: None,
        },
    )
    .await?;

    // The waste issue image is filtered from the page but not from the total.
    assert_eq!(page.images.len(), 1);
    assert_eq!(page.images[0].id, "g1");
    assert_eq!(page.total, 2);

    Ok(())
}

#[tokio::test]
async fn duplicate_like_surfaces_as_a_conflict() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_profile(&db, "ada", "Ada Obi").await?;
    seed_gallery_image(&db, "g1", "lga1", None, None, true, ts(0)).await?;

    assert_eq!(feed::like_image(&db, "g1", "ada").await.unwrap(), 1);

    let err = feed::like_image(&db, "g1", "ada").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);

    // The count was not double-bumped by the failed call.
    let count: i64 = sqlx::query_scalar("SELECT likes_count FROM lga_images WHERE id = 'g1'")
        .fetch_one(&db)
        .await?;
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn unlike_is_idempotent_and_confirms_counts() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_profile(&db, "ada", "Ada Obi").await?;
    seed_gallery_image(&db, "g1", "lga1", None, None, true, ts(0)).await?;

    // Never-liked pair: succeeds without error, count untouched.
    assert_eq!(feed::unlike_image(&db, "g1", "ada").await.unwrap(), 0);

    assert_eq!(feed::like_image(&db, "g1", "ada").await.unwrap(), 1);
    assert_eq!(feed::unlike_image(&db, "g1", "ada").await.unwrap(), 0);
    assert_eq!(feed::unlike_image(&db, "g1", "ada").await.unwrap(), 0);

    Ok(())
}

#[tokio::test]
async fn point_awards_accumulate_and_level_up() -> Result<()> {
    let db = test_db().await?;
    seed_profile(&db, "ada", "Ada Obi").await?;

    for _ in 0..3 {
        points::award_action(&db, "ada", PointAction::ReportIssue).await?;
    }
    let totals = points::award_points(&db, "ada", 50, "Community cleanup bonus").await?;

    assert_eq!(totals.total_points, 110);
    assert_eq!(totals.level, 2);

    let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM point_history WHERE user_id = 'ada'")
        .fetch_one(&db)
        .await?;
    assert_eq!(history, 4);

    Ok(())
}

#[tokio::test]
async fn referral_signup_rewards_the_referrer() -> Result<()> {
    let db = test_db().await?;
    seed_profile(&db, "ref", "Referrer").await?;
    seed_profile(&db, "new", "Newcomer").await?;

    let code = points::referral_code(&db, "ref").await?;
    assert_eq!(code.len(), 8);
    // Stable across calls.
    assert_eq!(points::referral_code(&db, "ref").await?, code);

    assert!(points::track_signup(&db, &code, "new").await?);
    let totals: i64 =
        sqlx::query_scalar("SELECT total_points FROM user_points WHERE user_id = 'ref'")
            .fetch_one(&db)
            .await?;
    assert_eq!(totals, PointAction::ReferralSignup.points());

    // Re-tracking the same user and unknown codes are no-ops.
    assert!(!points::track_signup(&db, &code, "new").await?);
    assert!(!points::track_signup(&db, "NOSUCH00", "new").await?);

    Ok(())
}

#[tokio::test]
async fn first_report_milestone_rewards_the_referrer() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_profile(&db, "ref", "Referrer").await?;
    seed_profile(&db, "new", "Newcomer").await?;

    let code = points::referral_code(&db, "ref").await?;
    points::track_signup(&db, &code, "new").await?;

    points::referred_milestone(&db, "new", Milestone::FirstReport).await?;

    let totals: i64 =
        sqlx::query_scalar("SELECT total_points FROM user_points WHERE user_id = 'ref'")
            .fetch_one(&db)
            .await?;
    assert_eq!(
        totals,
        PointAction::ReferralSignup.points() + PointAction::ReferredFirstReport.points()
    );

    // A user without a referrer is a quiet no-op.
    points::referred_milestone(&db, "ref", Milestone::FirstReport).await?;

    Ok(())
}

#[tokio::test]
async fn badges_award_at_the_threshold_exactly_once() -> Result<()> {
    let db = test_db().await?;
    seed_lga(&db, "lga1").await?;
    seed_profile(&db, "ada", "Ada Obi").await?;
    sqlx::query(
        "INSERT INTO badges (id, name, requirement_count) VALUES ('b1', 'First Reporter', 2)",
    )
    .execute(&db)
    .await?;

    seed_issue_report_row(&db, "ada", "lga1").await?;
    assert!(!points::check_and_award_badge(&db, "ada", "First Reporter").await?);

    seed_issue_report_row(&db, "ada", "lga1").await?;
    assert!(points::check_and_award_badge(&db, "ada", "First Reporter").await?);

    // Already earned: no duplicate row, no error.
    assert!(!points::check_and_award_badge(&db, "ada", "First Reporter").await?);
    let earned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_badges WHERE user_id = 'ada'")
        .fetch_one(&db)
        .await?;
    assert_eq!(earned, 1);

    Ok(())
}
