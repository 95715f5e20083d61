use axum::{
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chatportal_core::AppState;
use serde_json::json;

pub mod error;
pub mod middleware;
pub mod routes;

/// Build the full router. Admin endpoints live under `/api/{admin_base_path}`.
pub fn build_router(admin_base_path: &str) -> Router<AppState> {
    let cors = build_cors_layer();
    let admin_prefix = format!("/api/{}", admin_base_path.trim_matches('/'));
    Router::new()
        // Health
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/api/v1/settings", get(routes::settings::public_settings))
        // End-user auth
        .route("/api/v1/auth/login", post(routes::auth::login))
        .route("/api/v1/auth/logout", post(routes::auth::logout))
        .route("/api/v1/auth/me", get(routes::auth::me))
        .route(
            "/api/v1/auth/password-policy",
            get(routes::auth::password_policy),
        )
        .route(
            "/api/v1/auth/embed",
            get(routes::auth::embed_from_query).post(routes::auth::embed_from_body),
        )
        // Apps and chat
        .route("/api/v1/apps", get(routes::apps::list_apps))
        .route("/api/v1/apps/{app_id}", get(routes::apps::get_app))
        .route(
            "/api/v1/apps/{app_id}/messages",
            post(routes::chat::send_message),
        )
        .route(
            "/api/v1/apps/{app_id}/messages/{message_id}/feedbacks",
            post(routes::chat::send_feedback),
        )
        .route(
            "/api/v1/apps/{app_id}/parameters",
            get(routes::chat::parameters),
        )
        .route(
            "/api/v1/apps/{app_id}/conversations/{conversation_id}/name",
            post(routes::chat::rename_conversation),
        )
        .nest(&admin_prefix, admin_router())
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn admin_router() -> Router<AppState> {
    Router::new()
        // Admin auth
        .route("/auth/login", post(routes::admin_auth::login))
        .route("/auth/logout", post(routes::admin_auth::logout))
        .route(
            "/auth/me",
            get(routes::admin_auth::get_me).patch(routes::admin_auth::update_me),
        )
        .route("/auth/password", post(routes::admin_auth::change_password))
        // Admin accounts
        .route(
            "/admins",
            get(routes::admins::list_admins).post(routes::admins::create_admin),
        )
        .route(
            "/admins/{admin_id}",
            patch(routes::admins::update_admin).delete(routes::admins::delete_admin),
        )
        .route(
            "/admins/{admin_id}/reset-password",
            post(routes::admins::reset_password),
        )
        .route(
            "/admins/{admin_id}/unlock",
            post(routes::admins::unlock_admin),
        )
        // Groups
        .route(
            "/groups",
            get(routes::groups::list_groups).post(routes::groups::create_group),
        )
        .route(
            "/groups/{group_id}",
            get(routes::groups::get_group)
                .patch(routes::groups::update_group)
                .delete(routes::groups::delete_group),
        )
        .route(
            "/groups/{group_id}/members",
            post(routes::groups::add_member),
        )
        .route(
            "/groups/{group_id}/members/{admin_id}",
            delete(routes::groups::remove_member),
        )
        .route("/groups/{group_id}/apps", put(routes::groups::set_apps))
        // Apps
        .route(
            "/apps",
            get(routes::admin_apps::list_apps).post(routes::admin_apps::create_app),
        )
        .route(
            "/apps/{app_id}",
            patch(routes::admin_apps::update_app).delete(routes::admin_apps::delete_app),
        )
        // Reporting
        .route("/statistics", get(routes::statistics::get_statistics))
        .route("/audit-logs", get(routes::audit_logs::get_audit_logs))
        // Settings
        .route(
            "/settings",
            get(routes::settings::get_settings).patch(routes::settings::update_settings),
        )
}

fn build_cors_layer() -> tower_http::cors::CorsLayer {
    tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "chatportal" })),
    )
}
