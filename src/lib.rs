//! Green Future Connect API server.
mod config;
mod db;
mod endpoints;
pub mod error;
mod feed;
mod metrics;
mod models;
mod oracle;
mod points;
mod serve;
#[cfg(test)]
mod tests;

pub use error::Error;
pub use serve::run;

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
   ____                     _____      _
  / ___|_ __ ___  ___ _ __ |  ___|   _| |_ _   _ _ __ ___
 | |  _| '__/ _ \/ _ \ '_ \| |_ | | | | __| | | | '__/ _ \
 | |_| | | |  __/  __/ | | |  _|| |_| | |_| |_| | | |  __/
  \____|_|  \___|\___|_| |_|_|   \__,_|\__|\__,_|_|  \___|
                                        C o n n e c t

Civic engagement for Nigeria's Local Government Areas:
report environmental issues, explore LGA budgets and governance,
earn points, and ask the GreenOracle.

API routes are under /api/
    "
}
