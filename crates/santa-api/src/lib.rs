pub mod assignments;
pub mod draw;
pub mod error;
pub mod middleware;
pub mod participants;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

pub use state::{AppState, AppStateInner, Orchestrator};

/// All routes. Everything under `/admin` requires the admin bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/participants", post(participants::register))
        .route("/participants/{telegram_id}/recipient", get(participants::my_recipient))
        .route("/budget", get(participants::budget));

    let admin_routes = Router::new()
        .route("/admin/participants", get(participants::list))
        .route("/admin/participants/{telegram_id}", delete(participants::remove))
        .route("/admin/draw", post(draw::run_draw))
        .route("/admin/draw/restart", post(draw::restart_draw))
        .route("/admin/draw/notify", post(draw::resend_notifications))
        .route("/admin/assignments", get(assignments::list).delete(draw::clear_assignments))
        .route("/admin/assignments/{participant_id}", get(assignments::get_for))
        .route("/admin/pairs", get(assignments::pairs_text))
        .route("/admin/ledger", get(draw::ledger))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}
