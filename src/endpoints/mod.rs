use axum::Router;

use crate::serve::AppState;

mod gallery;
mod issues;
mod lgas;
mod oracle;
mod points;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(lgas::routes())
        .merge(gallery::routes())
        .merge(issues::routes())
        .merge(points::routes())
        .merge(oracle::routes())
}
