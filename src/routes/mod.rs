use axum::{middleware, Router};
use crate::{
    middleware::auth_guard::require_auth,
    state::AppState,
};

mod auth;
mod pilots;
mod reports;
mod vehicles;

/// Build the full `/api/v1` router.
///
/// Public auth routes are left unprotected; every other route is wrapped in
/// the session-based [`require_auth`] middleware. Admin-only routes carry an
/// additional role guard inside their own routers.
pub fn all_routes(state: AppState) -> Router<AppState> {
    let auth_mw = middleware::from_fn_with_state(state, require_auth);
    Router::new()
        .merge(auth::router())
        .merge(
            Router::new()
                .merge(pilots::router())
                .merge(vehicles::router())
                .merge(reports::router())
                .route_layer(auth_mw),
        )
}
