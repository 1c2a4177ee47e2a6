use axum::{routing::get, Router};

use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/trips",
            get(handlers::list_trips).post(handlers::create_trip),
        )
        .route(
            "/trips/:id",
            get(handlers::get_trip)
                .put(handlers::replace_trip)
                .patch(handlers::patch_trip)
                .delete(handlers::delete_trip),
        )
}
