//! The LGA gallery feed aggregator.
//!
//! An LGA's photo feed is drawn from two disjoint sources: the moderated
//! `lga_images` gallery table, and photos embedded in `issue_reports` rows.
//! The two are merged in memory into one chronological, paginated feed rather
//! than forcing both into a single table. Expected volume per LGA is small
//! (tens to low hundreds of images), so the in-memory merge is acceptable.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use crate::{
    db::Db,
    models::{FeedImage, Uploader},
};

/// Options for a feed page request.
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    /// Page size. Must be positive. Defaults to 20 at the route layer.
    pub limit: usize,
    /// Page start. Offsets beyond the available range yield an empty page.
    pub offset: usize,
    /// Optional exact category filter.
    pub category: Option<String>,
    /// Optional viewer identity, for liked-by-viewer annotation.
    pub user_id: Option<String>,
}

/// One page of the merged feed.
#[derive(Debug, serde::Serialize)]
pub struct FeedPage {
    pub images: Vec<FeedImage>,
    /// Approved gallery-row count plus the count of synthesized issue images.
    ///
    /// Known defect, preserved from the original system: issue images removed
    /// by the category filter are still counted, so `total` can overcount the
    /// filtered universe.
    pub total: i64,
}

#[derive(sqlx::FromRow)]
struct GalleryRow {
    id: String,
    lga_id: String,
    user_id: Option<String>,
    image_url: String,
    caption: Option<String>,
    category: Option<String>,
    likes_count: i64,
    is_approved: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    uploader_name: Option<String>,
    uploader_avatar: Option<String>,
}

impl From<GalleryRow> for FeedImage {
    fn from(row: GalleryRow) -> Self {
        let uploader = row.user_id.is_some().then(|| Uploader {
            full_name: row.uploader_name,
            avatar_url: row.uploader_avatar,
        });

        Self {
            id: row.id,
            lga_id: row.lga_id,
            user_id: row.user_id,
            image_url: row.image_url,
            caption: row.caption,
            category: row.category,
            likes_count: row.likes_count,
            is_approved: row.is_approved,
            is_featured: row.is_featured,
            created_at: row.created_at,
            uploader,
            is_liked_by_user: None,
            issue_id: None,
        }
    }
}

/// The slice of an issue report the synthesizer needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssueSource {
    pub id: String,
    pub lga_id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub category: Option<String>,
    pub image_urls: sqlx::types::Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub uploader_name: Option<String>,
    pub uploader_avatar: Option<String>,
}

/// Produce one page of the merged image feed for an LGA.
pub async fn lga_images(db: &Db, lga_id: &str, opts: &FeedOptions) -> Result<FeedPage> {
    metrics::counter!(crate::metrics::FEED_REQUESTS).increment(1);

    // 1. Approved gallery rows, filtered by category at the store when asked.
    let mut query = QueryBuilder::new(
        "SELECT i.id, i.lga_id, i.user_id, i.image_url, i.caption, i.category, \
                i.likes_count, i.is_approved, i.is_featured, i.created_at, \
                p.full_name AS uploader_name, p.avatar_url AS uploader_avatar \
         FROM lga_images i \
         LEFT JOIN profiles p ON p.id = i.user_id \
         WHERE i.lga_id = ",
    );
    query.push_bind(lga_id);
    query.push(" AND i.is_approved = 1");
    if let Some(category) = &opts.category {
        query.push(" AND i.category = ");
        query.push_bind(category);
    }

    let gallery: Vec<GalleryRow> = query
        .build_query_as()
        .fetch_all(db)
        .await
        .context("failed to fetch gallery images")?;
    let gallery_total = gallery.len() as i64;
    let gallery: Vec<FeedImage> = gallery.into_iter().map(Into::into).collect();

    // 2. Issue reports are not filtered by category at the store, because the
    // issue and gallery category enumerations differ.
    let issues: Vec<IssueSource> = sqlx::query_as(
        "SELECT r.id, r.lga_id, r.user_id, r.title, r.category, r.image_urls, r.created_at, \
                p.full_name AS uploader_name, p.avatar_url AS uploader_avatar \
         FROM issue_reports r \
         LEFT JOIN profiles p ON p.id = r.user_id \
         WHERE r.lga_id = ?",
    )
    .bind(lga_id)
    .fetch_all(db)
    .await
    .context("failed to fetch issue reports")?;

    // 3/4. Synthesize issue images, then apply the category filter. The total
    // is taken before filtering (see FeedPage::total).
    let issue_images = synthesize_issue_images(&issues);
    let total = gallery_total + issue_images.len() as i64;
    let issue_images = retain_for_category(issue_images, opts.category.as_deref());

    // 5-8. Merge, sort, slice.
    let merged = merge_by_recency(gallery, issue_images);
    let mut page = paginate(merged, opts.offset, opts.limit);

    // 9. Liked-by-viewer annotation for gallery rows on the returned page.
    if let Some(user_id) = &opts.user_id {
        annotate_likes(db, user_id, &mut page).await?;
    }

    metrics::counter!(crate::metrics::FEED_IMAGES).increment(page.len() as u64);

    Ok(FeedPage {
        images: page,
        total,
    })
}

/// Synthesize one feed entry per image URL carried by an issue report.
///
/// Issue images have no stored identity: ids are derived as
/// `issue-{report}-{index}`, the report title doubles as the caption, and the
/// like count is fixed at zero since no like mechanism exists for them. They
/// are implicitly approved the moment the report exists, with no moderation
/// step (a deliberate asymmetry with gallery rows).
fn synthesize_issue_images(issues: &[IssueSource]) -> Vec<FeedImage> {
    let mut out = Vec::new();
    for issue in issues {
        let uploader = issue.user_id.is_some().then(|| Uploader {
            full_name: issue.uploader_name.clone(),
            avatar_url: issue.uploader_avatar.clone(),
        });

        for (index, url) in issue.image_urls.0.iter().enumerate() {
            out.push(FeedImage {
                id: format!("issue-{}-{}", issue.id, index),
                lga_id: issue.lga_id.clone(),
                user_id: issue.user_id.clone(),
                image_url: url.clone(),
                caption: Some(issue.title.clone()),
                category: issue.category.clone(),
                likes_count: 0,
                is_approved: true,
                is_featured: false,
                created_at: issue.created_at,
                uploader: uploader.clone(),
                is_liked_by_user: None,
                issue_id: Some(issue.id.clone()),
            });
        }
    }
    out
}

/// Apply the requested category filter to synthesized issue images.
///
/// The catch-all `other` filter retains every issue image regardless of its
/// actual category. This asymmetric relaxation is intentional: issue
/// categories are drawn from a different enumeration than gallery categories,
/// and `other` is the gallery's bucket for everything unclassified.
fn retain_for_category(images: Vec<FeedImage>, category: Option<&str>) -> Vec<FeedImage> {
    match category {
        None | Some("other") => images,
        Some(category) => images
            .into_iter()
            .filter(|img| img.category.as_deref() == Some(category))
            .collect(),
    }
}

/// Concatenate both sources and sort by creation time, most recent first.
/// The sort is stable, so the synthesis order of URLs within one issue is
/// kept; ordering between entries with equal timestamps is otherwise
/// unspecified.
fn merge_by_recency(gallery: Vec<FeedImage>, issue_images: Vec<FeedImage>) -> Vec<FeedImage> {
    let mut merged = gallery;
    merged.extend(issue_images);
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

/// Slice out `[offset, offset + limit)`. Out-of-range offsets yield an empty
/// page rather than an error.
fn paginate(images: Vec<FeedImage>, offset: usize, limit: usize) -> Vec<FeedImage> {
    images
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect()
}

/// Mark the gallery rows of `page` the viewer has liked. Issue-derived images
/// carry no like mechanism and are never checked or marked.
async fn annotate_likes(db: &Db, user_id: &str, page: &mut [FeedImage]) -> Result<()> {
    let gallery_ids: Vec<&str> = page
        .iter()
        .filter(|img| !img.is_issue_derived())
        .map(|img| img.id.as_str())
        .collect();
    if gallery_ids.is_empty() {
        return Ok(());
    }

    let mut query =
        QueryBuilder::new("SELECT image_id FROM lga_image_likes WHERE user_id = ");
    query.push_bind(user_id);
    query.push(" AND image_id IN (");
    let mut separated = query.separated(", ");
    for id in &gallery_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let liked: Vec<String> = query
        .build_query_scalar()
        .fetch_all(db)
        .await
        .context("failed to fetch viewer likes")?;
    let liked: std::collections::HashSet<String> = liked.into_iter().collect();

    for img in page.iter_mut().filter(|img| !img.is_issue_derived()) {
        img.is_liked_by_user = Some(liked.contains(&img.id));
    }

    Ok(())
}

/// Record a viewer's like of a gallery image and bump its stored count.
///
/// A duplicate (image, user) pair surfaces the store's unique-constraint
/// conflict rather than silently succeeding: the caller saw the annotated
/// feed first, so a duplicate call signals a race. Returns the
/// server-confirmed like count, which is the source of truth for displays.
pub async fn like_image(db: &Db, image_id: &str, user_id: &str) -> crate::Result<i64> {
    let mut tx = db
        .begin()
        .await
        .context("failed to begin transaction")
        .map_err(crate::Error::from)?;

    sqlx::query("INSERT INTO lga_image_likes (image_id, user_id, created_at) VALUES (?, ?, ?)")
        .bind(image_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    let likes_count: i64 = sqlx::query_scalar(
        "UPDATE lga_images SET likes_count = likes_count + 1 WHERE id = ? RETURNING likes_count",
    )
    .bind(image_id)
    .fetch_one(&mut *tx)
    .await
    .context("failed to bump like count")
    .map_err(crate::Error::from)?;

    tx.commit()
        .await
        .context("failed to commit transaction")
        .map_err(crate::Error::from)?;

    metrics::counter!(crate::metrics::LIKES_ADDED).increment(1);
    Ok(likes_count)
}

/// Remove a viewer's like. Deleting a pair that never existed is a successful
/// no-op; the stored count only moves when a row was actually removed.
pub async fn unlike_image(db: &Db, image_id: &str, user_id: &str) -> crate::Result<i64> {
    let mut tx = db
        .begin()
        .await
        .context("failed to begin transaction")
        .map_err(crate::Error::from)?;

    let deleted = sqlx::query("DELETE FROM lga_image_likes WHERE image_id = ? AND user_id = ?")
        .bind(image_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("failed to remove like")
        .map_err(crate::Error::from)?;

    let likes_count: i64 = if deleted.rows_affected() > 0 {
        sqlx::query_scalar(
            "UPDATE lga_images SET likes_count = MAX(likes_count - 1, 0) WHERE id = ? \
             RETURNING likes_count",
        )
        .bind(image_id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to drop like count")
        .map_err(crate::Error::from)?
    } else {
        sqlx::query_scalar("SELECT likes_count FROM lga_images WHERE id = ?")
            .bind(image_id)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to fetch like count")
            .map_err(crate::Error::from)?
            .ok_or_else(|| {
                crate::Error::not_found(anyhow::anyhow!("no image with id {image_id:?}"))
            })?
    };

    tx.commit()
        .await
        .context("failed to commit transaction")
        .map_err(crate::Error::from)?;

    if deleted.rows_affected() > 0 {
        metrics::counter!(crate::metrics::LIKES_REMOVED).increment(1);
    }
    Ok(likes_count)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn gallery_image(id: &str, category: Option<&str>, secs: i64) -> FeedImage {
        FeedImage {
            id: id.to_owned(),
            lga_id: "lga-1".to_owned(),
            user_id: None,
            image_url: format!("https://img.example/{id}.jpg"),
            caption: None,
            category: category.map(str::to_owned),
            likes_count: 0,
            is_approved: true,
            is_featured: false,
            created_at: ts(secs),
            uploader: None,
            is_liked_by_user: None,
            issue_id: None,
        }
    }

    fn issue(id: &str, title: &str, category: Option<&str>, urls: &[&str], secs: i64) -> IssueSource {
        IssueSource {
            id: id.to_owned(),
            lga_id: "lga-1".to_owned(),
            user_id: None,
            title: title.to_owned(),
            category: category.map(str::to_owned),
            image_urls: sqlx::types::Json(urls.iter().map(|u| (*u).to_owned()).collect()),
            created_at: ts(secs),
            uploader_name: None,
            uploader_avatar: None,
        }
    }

    #[test]
    fn gallery_only_feed_is_sorted_most_recent_first() {
        let gallery = vec![
            gallery_image("a", None, 10),
            gallery_image("b", None, 30),
            gallery_image("c", None, 20),
        ];

        let merged = merge_by_recency(gallery, Vec::new());
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn issue_urls_synthesize_in_order_with_title_as_caption() {
        let issues = vec![issue(
            "r1",
            "Blocked drainage",
            Some("waste"),
            &["one.jpg", "two.jpg", "three.jpg"],
            0,
        )];

        let images = synthesize_issue_images(&issues);
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].id, "issue-r1-0");
        assert_eq!(images[1].id, "issue-r1-1");
        assert_eq!(images[2].id, "issue-r1-2");
        assert_eq!(images[0].image_url, "one.jpg");
        assert_eq!(images[2].image_url, "three.jpg");
        for img in &images {
            assert_eq!(img.caption.as_deref(), Some("Blocked drainage"));
            assert_eq!(img.category.as_deref(), Some("waste"));
            assert_eq!(img.likes_count, 0);
            assert!(img.is_approved);
            assert_eq!(img.issue_id.as_deref(), Some("r1"));
        }

        // Order within one issue survives the merge sort: all three entries
        // share the report timestamp and the sort is stable.
        let merged = merge_by_recency(Vec::new(), images);
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["issue-r1-0", "issue-r1-1", "issue-r1-2"]);
    }

    #[test]
    fn reports_without_images_contribute_nothing() {
        let issues = vec![issue("r1", "No photos here", Some("hazard"), &[], 0)];
        assert!(synthesize_issue_images(&issues).is_empty());
    }

    #[test]
    fn merged_feed_interleaves_sources_by_timestamp() {
        let gallery = vec![gallery_image("g1", None, 40), gallery_image("g2", None, 10)];
        let issues = vec![
            issue("r1", "Flooding", Some("hazard"), &["a.jpg"], 30),
            issue("r2", "Dump site", Some("waste"), &["b.jpg"], 20),
        ];

        let merged = merge_by_recency(gallery, synthesize_issue_images(&issues));
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["g1", "issue-r1-0", "issue-r2-0", "g2"]);
    }

    #[test]
    fn adjacent_pages_neither_skip_nor_duplicate() {
        let gallery = vec![
            gallery_image("g1", None, 50),
            gallery_image("g2", None, 40),
            gallery_image("g3", None, 30),
            gallery_image("g4", None, 20),
            gallery_image("g5", None, 10),
        ];
        let merged = merge_by_recency(gallery, Vec::new());

        let first = paginate(merged.clone(), 0, 2);
        let second = paginate(merged.clone(), 2, 2);
        let first: Vec<&str> = first.iter().map(|i| i.id.as_str()).collect();
        let second: Vec<&str> = second.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(first, ["g1", "g2"]);
        assert_eq!(second, ["g3", "g4"]);

        // Past the end: empty page, no error.
        assert!(paginate(merged, 10, 2).is_empty());
    }

    #[test]
    fn other_filter_retains_all_issue_images() {
        let issues = vec![
            issue("r1", "Spill", Some("pollution"), &["a.jpg"], 0),
            issue("r2", "Collapse", Some("hazard"), &["b.jpg"], 1),
        ];
        let images = synthesize_issue_images(&issues);

        let kept = retain_for_category(images, Some("other"));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn exact_filter_keeps_only_matching_issue_images() {
        let issues = vec![
            issue("r1", "Refuse heap", Some("waste"), &["a.jpg"], 0),
            issue("r2", "Oil spill", Some("pollution"), &["b.jpg"], 1),
        ];
        let images = synthesize_issue_images(&issues);

        let kept = retain_for_category(images, Some("waste"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "issue-r1-0");
    }

    #[test]
    fn total_counts_issue_images_removed_by_the_filter() {
        // Pinning the known defect: the reported total is computed from the
        // synthesized set before the category filter runs.
        let issues = vec![
            issue("r1", "Refuse heap", Some("waste"), &["a.jpg", "b.jpg"], 0),
            issue("r2", "Oil spill", Some("pollution"), &["c.jpg"], 1),
        ];
        let images = synthesize_issue_images(&issues);
        let total = images.len() as i64;
        let kept = retain_for_category(images, Some("waste"));

        assert_eq!(total, 3);
        assert_eq!(kept.len(), 2);
    }
}
