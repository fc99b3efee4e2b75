// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{CallTokenResponse, MeResponse, OkResponse},
    state::AppState,
};

pub mod auth;
pub mod call;
pub mod health;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/auth/passkey/register/start", post(auth::register_start))
        .route("/auth/passkey/register/finish", post(auth::register_finish))
        .route("/auth/passkey/login/start", post(auth::login_start))
        .route("/auth/passkey/login/finish", post(auth::login_finish))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/call/token", get(call::issue_call_token))
        .route("/health", get(health::liveness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_start,
        auth::register_finish,
        auth::login_start,
        auth::login_finish,
        auth::logout,
        auth::me,
        call::issue_call_token,
        health::liveness
    ),
    components(schemas(OkResponse, MeResponse, CallTokenResponse, health::HealthResponse)),
    tags(
        (name = "Auth", description = "Passkey ceremonies and session management"),
        (name = "Call", description = "Guest call-token issuance"),
        (name = "Health", description = "Liveness probe")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::default());
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
