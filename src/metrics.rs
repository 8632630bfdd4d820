//! Metric name constants.

use std::time::Duration;

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const FEED_REQUESTS: &str = "greenconnect.feed.requests"; // Counter.
pub const FEED_IMAGES: &str = "greenconnect.feed.images"; // Counter.

pub const IMAGES_UPLOADED: &str = "greenconnect.images.uploaded"; // Counter.
pub const IMAGES_APPROVED: &str = "greenconnect.images.approved"; // Counter.
pub const LIKES_ADDED: &str = "greenconnect.likes.added"; // Counter.
pub const LIKES_REMOVED: &str = "greenconnect.likes.removed"; // Counter.

pub const ISSUES_REPORTED: &str = "greenconnect.issues.reported"; // Counter.
pub const POINTS_AWARDED: &str = "greenconnect.points.awarded"; // Counter.

pub const ORACLE_REQUESTS: &str = "greenconnect.oracle.requests"; // Counter.
pub const ORACLE_FAILURES: &str = "greenconnect.oracle.failures"; // Counter.

/// Must be ran exactly once on startup. This will declare all of the instruments for `metrics`.
pub fn setup(config: Option<&config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(FEED_REQUESTS, "The number of gallery feed page requests.");
    describe_counter!(FEED_IMAGES, "The number of images returned on feed pages.");

    describe_counter!(IMAGES_UPLOADED, "The number of gallery images recorded.");
    describe_counter!(IMAGES_APPROVED, "The number of gallery images approved.");
    describe_counter!(LIKES_ADDED, "The number of image likes recorded.");
    describe_counter!(LIKES_REMOVED, "The number of image likes removed.");

    describe_counter!(ISSUES_REPORTED, "The number of issue reports created.");
    describe_counter!(POINTS_AWARDED, "The total points awarded to users.");

    describe_counter!(ORACLE_REQUESTS, "The number of GreenOracle questions asked.");
    describe_counter!(
        ORACLE_FAILURES,
        "The number of GreenOracle upstream failures."
    );

    if let Some(config) = config {
        match config {
            config::MetricConfig::PrometheusPush(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_push_gateway(
                        prometheus_config.url.clone(),
                        Duration::from_secs(10),
                        None,
                        None,
                    )
                    .context("failed to set up push gateway")?
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
