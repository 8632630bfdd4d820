//! Gamification: point awards, badges, and referral tracking.

use anyhow::{Context as _, Result};
use chrono::Utc;
use rand::Rng as _;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{db::Db, models::UserPoints};

/// The fixed catalogue of point-earning actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointAction {
    ReferralSignup,
    ReferredFirstReport,
    ReferredDonate,
    ReferredCompleteProfile,
    ReportIssue,
    UploadImage,
    Image10Likes,
    FollowUser,
    DailyLogin,
    CompleteProfile,
    DonatePlastic,
    CreateCleanup,
    AttendEvent,
}

impl PointAction {
    pub fn points(self) -> i64 {
        match self {
            Self::ReferralSignup => 100,
            Self::ReferredFirstReport => 50,
            Self::ReferredDonate => 30,
            Self::ReferredCompleteProfile => 20,
            Self::ReportIssue => 20,
            Self::UploadImage => 10,
            Self::Image10Likes => 5,
            Self::FollowUser => 2,
            Self::DailyLogin => 3,
            Self::CompleteProfile => 15,
            Self::DonatePlastic => 50,
            Self::CreateCleanup => 150,
            Self::AttendEvent => 200,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::ReferralSignup => "User signed up with your referral code",
            Self::ReferredFirstReport => "Referred user submitted first report",
            Self::ReferredDonate => "Referred user donated plastic",
            Self::ReferredCompleteProfile => "Referred user completed profile",
            Self::ReportIssue => "Reported an environmental issue",
            Self::UploadImage => "Uploaded LGA image",
            Self::Image10Likes => "Image reached 10 likes",
            Self::FollowUser => "Followed another user",
            Self::DailyLogin => "Daily login streak",
            Self::CompleteProfile => "Completed full profile",
            Self::DonatePlastic => "Donated plastic waste",
            Self::CreateCleanup => "Created/led community cleanup",
            Self::AttendEvent => "Attended verified event",
        }
    }
}

/// Referred-user milestones that reward the referrer.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    FirstReport,
    Donate,
    CompleteProfile,
}

impl Milestone {
    fn action(self) -> PointAction {
        match self {
            Self::FirstReport => PointAction::ReferredFirstReport,
            Self::Donate => PointAction::ReferredDonate,
            Self::CompleteProfile => PointAction::ReferredCompleteProfile,
        }
    }
}

/// Award a fixed action's points to a user.
pub async fn award_action(db: &Db, user_id: &str, action: PointAction) -> Result<UserPoints> {
    award_points(db, user_id, action.points(), action.reason()).await
}

/// Award points to a user, updating their running total and level and
/// appending to their point history in one transaction.
///
/// Levels advance every 100 points: level = total / 100 + 1.
pub async fn award_points(db: &Db, user_id: &str, points: i64, reason: &str) -> Result<UserPoints> {
    let mut tx = db.begin().await.context("failed to begin transaction")?;

    let now = Utc::now();
    let level = points / 100 + 1;
    let totals: UserPoints = sqlx::query_as(
        "INSERT INTO user_points (user_id, total_points, level, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (user_id) DO UPDATE SET \
             total_points = user_points.total_points + excluded.total_points, \
             level = (user_points.total_points + excluded.total_points) / 100 + 1, \
             updated_at = excluded.updated_at \
         RETURNING user_id, total_points, level, created_at, updated_at",
    )
    .bind(user_id)
    .bind(points)
    .bind(level)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .context("failed to update point totals")?;

    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO point_history (id, user_id, points, reason, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(points)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("failed to record point history")?;

    tx.commit().await.context("failed to commit transaction")?;

    metrics::counter!(crate::metrics::POINTS_AWARDED).increment(points.unsigned_abs());

    Ok(totals)
}

/// Award `badge_name` to the user if their issue-report count meets the
/// badge's requirement. Idempotent: re-checking an earned badge is a no-op.
/// Returns whether the badge was newly awarded.
pub async fn check_and_award_badge(db: &Db, user_id: &str, badge_name: &str) -> Result<bool> {
    let badge: Option<(String, i64)> =
        sqlx::query_as("SELECT id, requirement_count FROM badges WHERE name = ?")
            .bind(badge_name)
            .fetch_optional(db)
            .await
            .context("failed to look up badge")?;
    let Some((badge_id, requirement)) = badge else {
        anyhow::bail!("unknown badge {badge_name:?}");
    };

    let reports: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issue_reports WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("failed to count issue reports")?;
    if reports < requirement {
        return Ok(false);
    }

    let result = sqlx::query(
        "INSERT OR IGNORE INTO user_badges (user_id, badge_id, earned_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(&badge_id)
    .bind(Utc::now())
    .execute(db)
    .await
    .context("failed to award badge")?;

    let awarded = result.rows_affected() > 0;
    if awarded {
        info!("user {user_id} earned badge {badge_name}");
    }
    Ok(awarded)
}

/// Get (generating on first use) a user's referral code: eight uppercase
/// alphanumeric characters, unique across profiles.
pub async fn referral_code(db: &Db, user_id: &str) -> Result<String> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT referral_code FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("failed to fetch referral code")?;
    let Some(existing) = existing else {
        anyhow::bail!("unknown user {user_id:?}");
    };
    if let Some(code) = existing {
        return Ok(code);
    }

    // Retry on the (unlikely) collision with another user's code.
    for _ in 0..5 {
        let code: String = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(8)
            .map(|c| char::from(c).to_ascii_uppercase())
            .collect();

        let result = sqlx::query(
            "UPDATE profiles SET referral_code = ? \
             WHERE id = ? AND referral_code IS NULL \
             AND NOT EXISTS (SELECT 1 FROM profiles WHERE referral_code = ?)",
        )
        .bind(&code)
        .bind(user_id)
        .bind(&code)
        .execute(db)
        .await
        .context("failed to store referral code")?;

        if result.rows_affected() > 0 {
            return Ok(code);
        }

        // Either the code collided or a concurrent call already set one.
        if let Some(code) =
            sqlx::query_scalar::<_, Option<String>>("SELECT referral_code FROM profiles WHERE id = ?")
                .bind(user_id)
                .fetch_one(db)
                .await
                .context("failed to re-fetch referral code")?
        {
            return Ok(code);
        }
    }

    anyhow::bail!("failed to generate a unique referral code")
}

/// Record that `new_user_id` signed up through `code` and award signup points
/// to the referrer. An unknown code is a logged no-op, matching how signup
/// flows tolerate stale links. Returns whether a referral was recorded.
pub async fn track_signup(db: &Db, code: &str, new_user_id: &str) -> Result<bool> {
    let referrer: Option<String> =
        sqlx::query_scalar("SELECT id FROM profiles WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(db)
            .await
            .context("failed to resolve referral code")?;
    let Some(referrer_id) = referrer else {
        info!("referral code not found: {code}");
        return Ok(false);
    };

    let id = Uuid::new_v4().to_string();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO referrals (id, referrer_id, referred_id, referral_code, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&referrer_id)
    .bind(new_user_id)
    .bind(code)
    .bind(Utc::now())
    .execute(db)
    .await
    .context("failed to record referral")?;

    // A user can only be referred once; re-tracking is a no-op.
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    award_action(db, &referrer_id, PointAction::ReferralSignup).await?;
    Ok(true)
}

/// Reward the referrer (if any) when a referred user reaches a milestone.
pub async fn referred_milestone(db: &Db, referred_user_id: &str, milestone: Milestone) -> Result<()> {
    let referrer: Option<String> =
        sqlx::query_scalar("SELECT referrer_id FROM referrals WHERE referred_id = ?")
            .bind(referred_user_id)
            .fetch_optional(db)
            .await
            .context("failed to look up referral")?;

    if let Some(referrer_id) = referrer {
        award_action(db, &referrer_id, milestone.action()).await?;
    }
    Ok(())
}
