mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine};
use chatportal_core::embed::{EmbedIdentity, EMBED_TOLERANCE_SECS};
use common::{bearer, TestContext};
use serde_json::json;

fn kim() -> EmbedIdentity {
    EmbedIdentity {
        login_id: "kim".to_string(),
        emp_no: "E20001".to_string(),
        name: "Kim".to_string(),
    }
}

#[tokio::test]
async fn health_reports_service_name() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx.send("GET", "/api/v1/health", &[], None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["service"], "chatportal");
    Ok(())
}

#[tokio::test]
async fn mock_login_sets_session_cookie() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx
        .send(
            "POST",
            "/api/v1/auth/login",
            &[],
            Some(json!({ "login_id": "testuser", "password": "Test1234!@" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["employee_number"], "E10001");

    let cookies = res.cookies();
    let cookie = cookies
        .iter()
        .find(|c| c.starts_with("auth_token="))
        .expect("auth cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=3600"));

    let token = res.body["token"].as_str().expect("token");
    let me = ctx
        .send("GET", "/api/v1/auth/me", &[("cookie", format!("auth_token={token}").as_str())], None)
        .await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["login_id"], "testuser");
    Ok(())
}

#[tokio::test]
async fn mock_login_rejects_wrong_password() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx
        .send(
            "POST",
            "/api/v1/auth/login",
            &[],
            Some(json!({ "loginId": "testuser", "password": "nope" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid login ID or password");
    assert!(res.cookies().is_empty());
    Ok(())
}

#[tokio::test]
async fn trusted_identity_headers_win_over_bearer_token() -> anyhow::Result<()> {
    let ctx = TestContext::trusting_identity_headers().await?;
    let token = ctx.user_token("bearer-user", "E99999")?;
    let encoded_name = STANDARD.encode("Proxy Person");
    let res = ctx
        .send(
            "GET",
            "/api/v1/auth/me",
            &[
                ("authorization", bearer(&token).as_str()),
                ("x-user-id", "E30003"),
                ("x-user-login-id", "proxied"),
                ("x-user-name", encoded_name.as_str()),
            ],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["login_id"], "proxied");
    assert_eq!(res.body["user"]["name"], "Proxy Person");
    Ok(())
}

#[tokio::test]
async fn identity_headers_from_clients_are_ignored_by_default() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let token = ctx.user_token("bearer-user", "E99999")?;
    let encoded_name = STANDARD.encode("Proxy Person");
    let forged = [
        ("x-user-id", "E30003"),
        ("x-user-login-id", "proxied"),
        ("x-user-name", encoded_name.as_str()),
    ];

    let res = ctx.send("GET", "/api/v1/auth/me", &forged, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let auth = bearer(&token);
    let mut with_bearer = forged.to_vec();
    with_bearer.push(("authorization", auth.as_str()));
    let res = ctx.send("GET", "/api/v1/auth/me", &with_bearer, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["login_id"], "bearer-user");

    // Forged headers do not stand in for a session on an open app either.
    ctx.seed_app(1, "open", true, "").await?;
    let res = ctx
        .send(
            "POST",
            "/api/v1/apps/1/messages",
            &forged,
            Some(json!({ "query": "hi", "inputs": {} })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn me_without_credentials_is_unauthorized() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx
        .send("GET", "/api/v1/auth/me", &[("authorization", "Bearer not-a-jwt")], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn embed_launch_sets_embed_cookie() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let signed = ctx.state.embed.sign(&kim());
    let uri = format!(
        "/api/v1/auth/embed?loginId=kim&empNo=E20001&name=Kim&ts={}&sig={}",
        signed.ts, signed.sig
    );
    let res = ctx.send("GET", &uri, &[], None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["employee_number"], "E20001");
    assert!(res
        .cookies()
        .iter()
        .any(|c| c.starts_with("embed_auth_token=") && c.contains("Max-Age=28800")));
    Ok(())
}

#[tokio::test]
async fn embed_body_accepts_numeric_timestamp() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let signed = ctx.state.embed.sign(&kim());
    let res = ctx
        .send(
            "POST",
            "/api/v1/auth/embed",
            &[],
            Some(json!({
                "loginId": "kim",
                "empNo": "E20001",
                "name": "Kim",
                "ts": signed.ts,
                "sig": signed.sig,
            })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn embed_rejects_stale_and_forged_launches() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let stale_ts = chrono::Utc::now().timestamp() - EMBED_TOLERANCE_SECS as i64 - 60;
    let stale = ctx.state.embed.sign_at(&kim(), stale_ts);
    let res = ctx
        .send(
            "GET",
            &format!(
                "/api/v1/auth/embed?loginId=kim&empNo=E20001&name=Kim&ts={}&sig={}",
                stale.ts, stale.sig
            ),
            &[],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Timestamp expired");

    let fresh = ctx.state.embed.sign(&kim());
    let res = ctx
        .send(
            "GET",
            &format!(
                "/api/v1/auth/embed?loginId=kim&empNo=E20002&name=Kim&ts={}&sig={}",
                fresh.ts, fresh.sig
            ),
            &[],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid signature");

    let res = ctx
        .send("GET", "/api/v1/auth/embed?loginId=kim", &[], None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Missing required parameters");
    Ok(())
}

#[tokio::test]
async fn anonymous_listing_only_shows_open_apps() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    ctx.seed_app(1, "open", true, "").await?;
    ctx.seed_app(2, "members", false, "").await?;

    let anon = ctx.send("GET", "/api/v1/apps", &[], None).await?;
    assert_eq!(anon.status, StatusCode::OK);
    assert_eq!(anon.body["authenticated"], false);
    assert_eq!(anon.body["apps"].as_array().map(Vec::len), Some(1));
    assert_eq!(anon.body["apps"][0]["id"], "1");
    assert!(anon.body["apps"][0].get("api_key").is_none());

    let token = ctx.user_token("testuser", "E10001")?;
    let authed = ctx
        .send("GET", "/api/v1/apps", &[("authorization", bearer(&token).as_str())], None)
        .await?;
    assert_eq!(authed.body["authenticated"], true);
    assert_eq!(authed.body["apps"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn anonymous_message_requires_session_id() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    ctx.seed_app(1, "open", true, "").await?;

    let res = ctx
        .send(
            "POST",
            "/api/v1/apps/1/messages",
            &[],
            Some(json!({ "query": "hi", "inputs": {} })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Past the access checks, the dead upstream surfaces as a server error.
    let res = ctx
        .send(
            "POST",
            "/api/v1/apps/1/messages",
            &[("x-session-id", "sess-1")],
            Some(json!({ "query": "hi", "inputs": {} })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.error(), "Upstream service error");
    Ok(())
}

#[tokio::test]
async fn members_only_app_rejects_anonymous_session() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    ctx.seed_app(2, "members", false, "").await?;
    let res = ctx
        .send("GET", "/api/v1/apps/2", &[("x-session-id", "sess-1")], None)
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn anonymous_limit_returns_too_many_requests() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    ctx.seed_app(1, "open", true, "").await?;
    for _ in 0..2 {
        chatportal_db::usage::increment_anonymous_count(&ctx.state.db, 1, "sess-9").await?;
    }

    let detail = ctx
        .send("GET", "/api/v1/apps/1", &[("x-session-id", "sess-9")], None)
        .await?;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["anonymous_messages_used"], 2);

    let res = ctx
        .send(
            "POST",
            "/api/v1/apps/1/messages",
            &[("x-session-id", "sess-9")],
            Some(json!({ "query": "one more" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.error(), "Anonymous message limit reached");

    // Signed-in users are not counted.
    let token = ctx.user_token("testuser", "E10001")?;
    let res = ctx
        .send(
            "POST",
            "/api/v1/apps/1/messages",
            &[("authorization", bearer(&token).as_str())],
            Some(json!({ "query": "hello" })),
        )
        .await?;
    assert_ne!(res.status, StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn ip_allow_list_is_enforced_before_identity() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    ctx.seed_app(3, "internal", false, "10.0.0.0/24").await?;
    let token = ctx.user_token("testuser", "E10001")?;

    let res = ctx
        .send(
            "GET",
            "/api/v1/apps/3/parameters",
            &[("x-forwarded-for", "192.168.1.5"), ("authorization", bearer(&token).as_str())],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // Parameters tolerate a dead upstream and fall back to an empty object.
    let res = ctx
        .send(
            "GET",
            "/api/v1/apps/3/parameters",
            &[("x-forwarded-for", "10.0.0.7, 172.16.0.1"), ("authorization", bearer(&token).as_str())],
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({}));
    Ok(())
}

#[tokio::test]
async fn unknown_app_is_not_found() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx.send("GET", "/api/v1/apps/404", &[], None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn password_policy_is_public() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx.send("GET", "/api/v1/auth/password-policy", &[], None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["rules"].as_array().is_some_and(|r| !r.is_empty()));
    assert_eq!(res.body["min_length"], 10);
    Ok(())
}

#[tokio::test]
async fn logout_clears_both_cookies() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let res = ctx.send("POST", "/api/v1/auth/logout", &[], None).await?;
    assert_eq!(res.status, StatusCode::OK);
    let cookies = res.cookies();
    assert!(cookies.iter().any(|c| c.starts_with("auth_token=;") && c.contains("Max-Age=0")));
    assert!(cookies.iter().any(|c| c.starts_with("embed_auth_token=;")));
    Ok(())
}
