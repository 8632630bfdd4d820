//! Domain models shared across endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Categories a gallery image may be filed under.
pub const GALLERY_CATEGORIES: &[&str] = &[
    "infrastructure",
    "events",
    "nature",
    "people",
    "development",
    "culture",
    "other",
];

/// Categories an issue report may be filed under. Overlaps with the gallery
/// enumeration only at `infrastructure`.
pub const ISSUE_CATEGORIES: &[&str] = &["waste", "pollution", "infrastructure", "hazard"];

pub const ISSUE_STATUSES: &[&str] =
    &["reported", "verified", "in_progress", "resolved", "rejected"];

pub const ISSUE_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

/// A Local Government Area.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lga {
    pub id: String,
    pub name: String,
    pub state: String,
    pub headquarters: Option<String>,
    pub chairman: Option<String>,
    pub population: Option<i64>,
    pub annual_budget: Option<i64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub geopolitical_zone: Option<String>,
    pub governance: Option<Json<serde_json::Value>>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A citizen-submitted environmental issue report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IssueReport {
    pub id: String,
    pub user_id: Option<String>,
    pub lga_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location_address: Option<String>,
    pub image_urls: Json<Vec<String>>,
    pub status: String,
    pub priority: String,
    pub resolved_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Display info for the uploader of an image, joined from `profiles`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Uploader {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// One entry in an LGA's merged image feed. Either a moderated gallery row or
/// an image synthesized from an issue report (`issue_id` is set for the
/// latter).
#[derive(Debug, Clone, Serialize)]
pub struct FeedImage {
    pub id: String,
    pub lga_id: String,
    pub user_id: Option<String>,
    pub image_url: String,
    pub caption: Option<String>,
    /// Gallery categories for gallery rows, issue categories for synthesized
    /// rows. The two enumerations differ, so this is kept as loose text.
    pub category: Option<String>,
    pub likes_count: i64,
    pub is_approved: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<Uploader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked_by_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
}

impl FeedImage {
    /// Whether this entry came from an issue report rather than the gallery
    /// table.
    pub fn is_issue_derived(&self) -> bool {
        self.issue_id.is_some()
    }
}

/// A user's gamification totals.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserPoints {
    pub user_id: String,
    pub total_points: i64,
    pub level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub points: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub requirement_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserBadge {
    pub badge_id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Referral {
    pub id: String,
    pub referrer_id: String,
    pub referred_id: String,
    pub referral_code: String,
    pub created_at: DateTime<Utc>,
    pub referred_name: Option<String>,
    pub referred_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub total_points: i64,
    pub level: i64,
}
