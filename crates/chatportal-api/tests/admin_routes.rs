mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chatportal_models::identity::Identity;
use chatportal_models::role::Role;
use common::{bearer, TestContext};
use serde_json::json;

const STRONG_PASSWORD: &str = "Str0ng!Pass";

#[tokio::test]
async fn admin_login_locks_after_repeated_failures() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let hash = chatportal_core::auth::hash_password(STRONG_PASSWORD)?;
    ctx.seed_admin_with_hash(1, "opsadmin", Role::Admin, &hash).await?;

    for _ in 0..5 {
        let res = ctx
            .send(
                "POST",
                "/api/admin/auth/login",
                &[],
                Some(json!({ "login_id": "opsadmin", "password": "Wrong!Pass1" })),
            )
            .await?;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.error(), "Invalid credentials");
    }

    let res = ctx
        .send(
            "POST",
            "/api/admin/auth/login",
            &[],
            Some(json!({ "login_id": "opsadmin", "password": STRONG_PASSWORD })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Account is locked");
    Ok(())
}

#[tokio::test]
async fn admin_login_sets_console_cookie() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let hash = chatportal_core::auth::hash_password(STRONG_PASSWORD)?;
    ctx.seed_admin_with_hash(1, "opsadmin", Role::SuperAdmin, &hash).await?;

    let res = ctx
        .send(
            "POST",
            "/api/admin/auth/login",
            &[],
            Some(json!({ "loginId": "opsadmin", "password": STRONG_PASSWORD })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["admin"]["id"], "1");
    assert!(res.cookies().iter().any(|c| c.starts_with("admin_token=")));

    let token = res.body["token"].as_str().expect("token");
    let me = ctx
        .send(
            "GET",
            "/api/admin/auth/me",
            &[("cookie", format!("admin_token={token}").as_str())],
            None,
        )
        .await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["login_id"], "opsadmin");
    assert!(me.body["visible_app_ids"].is_null());
    Ok(())
}

#[tokio::test]
async fn unknown_admin_gets_generic_message() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx
        .send(
            "POST",
            "/api/admin/auth/login",
            &[],
            Some(json!({ "login_id": "ghost", "password": STRONG_PASSWORD })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid credentials");
    Ok(())
}

#[tokio::test]
async fn portal_token_does_not_open_the_console() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    ctx.seed_admin(1, "opsadmin", Role::SuperAdmin).await?;

    // Same login id and an admin role, but not minted for the admin account.
    let forged = ctx.state.tokens.sign(&Identity {
        login_id: "opsadmin".to_string(),
        employee_number: "E10002".to_string(),
        display_name: "Ops".to_string(),
        role: Role::SuperAdmin,
    })?;
    let res = ctx
        .send("GET", "/api/admin/auth/me", &[("authorization", bearer(&forged).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let user = ctx.user_token("opsadmin", "1")?;
    let res = ctx
        .send("GET", "/api/admin/auth/me", &[("authorization", bearer(&user).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn deactivated_admin_token_stops_working() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let token = ctx.seed_admin(2, "leaver", Role::Admin).await?;
    chatportal_db::admins::update_admin_access(&ctx.state.db, 2, None, Some(false)).await?;
    let res = ctx
        .send("GET", "/api/admin/apps", &[("authorization", bearer(&token).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn super_admin_routes_reject_plain_admins() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let token = ctx.seed_admin(2, "plain", Role::Admin).await?;

    let res = ctx.send("GET", "/api/admin/admins", &[], None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    for uri in ["/api/admin/admins", "/api/admin/groups", "/api/admin/audit-logs", "/api/admin/settings"] {
        let res = ctx
            .send("GET", uri, &[("authorization", bearer(&token).as_str())], None)
            .await?;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(res.error(), "Super admin access required");
    }
    Ok(())
}

#[tokio::test]
async fn weak_password_is_rejected_with_details() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let token = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let res = ctx
        .send(
            "POST",
            "/api/admin/admins",
            &[("authorization", bearer(&token).as_str())],
            Some(json!({ "login_id": "newbie", "password": "short", "name": "New Admin" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["details"].as_array().is_some_and(|d| !d.is_empty()));
    Ok(())
}

#[tokio::test]
async fn create_admin_and_reject_duplicate_login() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let token = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let body = json!({ "login_id": "newbie", "password": STRONG_PASSWORD, "name": "New Admin" });

    let res = ctx
        .send(
            "POST",
            "/api/admin/admins",
            &[("authorization", bearer(&token).as_str())],
            Some(body.clone()),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["role"], "admin");
    assert!(res.body.get("password_hash").is_none());

    let res = ctx
        .send(
            "POST",
            "/api/admin/admins",
            &[("authorization", bearer(&token).as_str())],
            Some(body),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn admin_belongs_to_one_group_at_a_time() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let token = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    ctx.seed_admin(2, "member", Role::Admin).await?;
    chatportal_db::groups::create_group(&ctx.state.db, 10, "north", None).await?;
    chatportal_db::groups::create_group(&ctx.state.db, 20, "south", None).await?;
    let auth = bearer(&token);
    let headers = [("authorization", auth.as_str())];

    let res = ctx
        .send(
            "POST",
            "/api/admin/groups/10/members",
            &headers,
            Some(json!({ "admin_id": "2" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = ctx
        .send(
            "POST",
            "/api/admin/groups/20/members",
            &headers,
            Some(json!({ "admin_id": 2 })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error(), "Admin already belongs to another group");

    let res = ctx
        .send("DELETE", "/api/admin/groups/10/members/2", &headers, None)
        .await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = ctx
        .send(
            "POST",
            "/api/admin/groups/20/members",
            &headers,
            Some(json!({ "admin_id": "2", "group_role": "group_admin" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["members"][0]["group_role"], "group_admin");
    Ok(())
}

#[tokio::test]
async fn group_admins_only_see_their_apps_and_usage() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let root = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let scoped = ctx.seed_admin(2, "scoped", Role::Admin).await?;
    ctx.seed_app(100, "alpha", true, "").await?;
    ctx.seed_app(200, "beta", true, "").await?;
    chatportal_db::groups::create_group(&ctx.state.db, 10, "north", None).await?;
    chatportal_db::groups::upsert_member(&ctx.state.db, 10, 2, "member").await?;

    let res = ctx
        .send(
            "PUT",
            "/api/admin/groups/10/apps",
            &[("authorization", bearer(&root).as_str())],
            Some(json!({ "app_ids": ["100", "100"] })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["app_ids"], json!(["100"]));

    let res = ctx
        .send("GET", "/api/admin/apps", &[("authorization", bearer(&scoped).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let apps = res.body["apps"].as_array().expect("apps");
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0]["id"], "100");
    assert!(apps[0].get("api_key").is_none());

    let res = ctx
        .send(
            "PATCH",
            "/api/admin/apps/200",
            &[("authorization", bearer(&scoped).as_str())],
            Some(json!({ "name": "hijacked" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    chatportal_db::usage::increment_daily_usage(&ctx.state.db, 100, &today, false).await?;
    chatportal_db::usage::increment_daily_usage(&ctx.state.db, 200, &today, true).await?;

    let res = ctx
        .send("GET", "/api/admin/statistics", &[("authorization", bearer(&scoped).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["totals"]["messages"], 1);
    assert_eq!(res.body["apps"][0]["app_id"], "100");

    let res = ctx
        .send("GET", "/api/admin/statistics", &[("authorization", bearer(&root).as_str())], None)
        .await?;
    assert_eq!(res.body["totals"]["messages"], 2);
    assert_eq!(res.body["totals"]["anonymous_messages"], 1);
    Ok(())
}

#[tokio::test]
async fn unknown_app_ids_are_rejected_for_groups() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let root = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    chatportal_db::groups::create_group(&ctx.state.db, 10, "north", None).await?;
    let res = ctx
        .send(
            "PUT",
            "/api/admin/groups/10/apps",
            &[("authorization", bearer(&root).as_str())],
            Some(json!({ "app_ids": [404] })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn statistics_rejects_inverted_window() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let root = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let res = ctx
        .send(
            "GET",
            "/api/admin/statistics?from=2025-02-01&to=2025-01-01",
            &[("authorization", bearer(&root).as_str())],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn app_creation_validates_allow_list() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let root = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let res = ctx
        .send(
            "POST",
            "/api/admin/apps",
            &[("authorization", bearer(&root).as_str())],
            Some(json!({
                "name": "helpdesk",
                "api_url": "https://chat.example.com/v1",
                "api_key": "secret",
                "allowed_ips": "10.0.0.0/33, 10.1.1.1",
            })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["details"], json!(["10.0.0.0/33"]));

    let res = ctx
        .send(
            "POST",
            "/api/admin/apps",
            &[("authorization", bearer(&root).as_str())],
            Some(json!({
                "name": "helpdesk",
                "api_url": "https://chat.example.com/v1",
                "api_key": "secret",
            })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["max_anonymous_msgs"], 10);
    assert!(res.body.get("api_key").is_none());
    Ok(())
}

#[tokio::test]
async fn group_creation_is_audited() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let root = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let res = ctx
        .send(
            "POST",
            "/api/admin/groups",
            &[("authorization", bearer(&root).as_str()), ("user-agent", "itest")],
            Some(json!({ "name": "support" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);

    let mut found = None;
    for _ in 0..50 {
        let res = ctx
            .send(
                "GET",
                "/api/admin/audit-logs?action=group.create",
                &[("authorization", bearer(&root).as_str())],
                None,
            )
            .await?;
        if let Some(entry) = res.body["audit_log_entries"].as_array().and_then(|e| e.first()) {
            found = Some(entry.clone());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let entry = found.expect("audit entry written");
    assert_eq!(entry["actor_id"], "root");
    assert_eq!(entry["user_agent"], "itest");
    assert_eq!(entry["request_path"], "/api/admin/groups");
    Ok(())
}

#[tokio::test]
async fn settings_update_is_visible_publicly() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let root = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;
    let res = ctx
        .send(
            "PATCH",
            "/api/admin/settings",
            &[("authorization", bearer(&root).as_str())],
            Some(json!({ "portal_name": "Help Desk", "default_max_anonymous_msgs": 3 })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = ctx.send("GET", "/api/v1/settings", &[], None).await?;
    assert_eq!(res.body["portal_name"], "Help Desk");
    assert_eq!(
        chatportal_db::server_settings::get_setting(&ctx.state.db, "default_max_anonymous_msgs")
            .await?
            .as_deref(),
        Some("3")
    );
    Ok(())
}

#[tokio::test]
async fn admin_base_path_is_configurable() -> anyhow::Result<()> {
    let ctx = TestContext::with_admin_base("console").await?;
    let token = ctx.seed_admin(1, "root", Role::SuperAdmin).await?;

    let res = ctx
        .send("GET", "/api/console/auth/me", &[("authorization", bearer(&token).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = ctx
        .send("GET", "/api/admin/auth/me", &[("authorization", bearer(&token).as_str())], None)
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}
