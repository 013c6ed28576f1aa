use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::health::healthcheck))
        .merge(build_routes())
}

fn build_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::build::list_builds))
        .routes(routes!(handlers::build::add_bundles))
        .routes(routes!(
            handlers::build::get_build,
            handlers::build::update_build
        ))
}
