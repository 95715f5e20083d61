//! Who may talk to which app, and under what chat identity.

use crate::error::CoreError;
use crate::usage;
use chatportal_db::apps::AppRow;
use chatportal_db::DbPool;
use chatportal_models::identity::{anonymous_chat_user_id, Identity};

#[derive(Debug, Clone)]
pub enum ChatPrincipal {
    User(Identity),
    Anonymous { session_id: String },
}

#[derive(Debug, Clone)]
pub struct AppAccess {
    pub app: AppRow,
    pub principal: ChatPrincipal,
}

impl AppAccess {
    /// Identifier forwarded to the upstream chat service.
    pub fn chat_user_id(&self) -> String {
        match &self.principal {
            ChatPrincipal::User(identity) => identity.chat_user_id(self.app.id),
            ChatPrincipal::Anonymous { session_id } => {
                anonymous_chat_user_id(self.app.id, session_id)
            }
        }
    }

    pub fn anonymous_session(&self) -> Option<&str> {
        match &self.principal {
            ChatPrincipal::User(_) => None,
            ChatPrincipal::Anonymous { session_id } => Some(session_id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub identity: Option<&'a Identity>,
    /// `x-session-id` header, if any.
    pub session_id: Option<&'a str>,
    pub client_ip: &'a str,
    /// Sending a message consumes anonymous allowance; reads do not.
    pub counts_message: bool,
}

/// Whether an app shows up in a caller's app list.
pub fn listed_for(app: &AppRow, identity: Option<&Identity>) -> bool {
    app.is_active && (identity.is_some() || (app.is_public && app.allow_anonymous))
}

pub async fn authorize_app_access(
    db: &DbPool,
    app_id: i64,
    request: AccessRequest<'_>,
) -> Result<AppAccess, CoreError> {
    let app = chatportal_db::apps::get_app(db, app_id)
        .await?
        .filter(|app| app.is_active)
        .ok_or(CoreError::NotFound)?;

    if !chatportal_util::ip_allowlist::is_allowed(request.client_ip, &app.allowed_ips) {
        tracing::info!(app_id, ip = request.client_ip, "request blocked by app IP allow-list");
        return Err(CoreError::Forbidden);
    }

    if let Some(identity) = request.identity {
        return Ok(AppAccess {
            app,
            principal: ChatPrincipal::User(identity.clone()),
        });
    }

    if !(app.is_public && app.allow_anonymous) {
        return Err(CoreError::Unauthorized);
    }
    let session_id = request
        .session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CoreError::Unauthorized)?;

    if request.counts_message && usage::anonymous_limit_reached(db, &app, session_id).await? {
        return Err(CoreError::RateLimited(
            "Anonymous message limit reached".into(),
        ));
    }

    Ok(AppAccess {
        app,
        principal: ChatPrincipal::Anonymous {
            session_id: session_id.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_app, test_pool};
    use chatportal_db::apps::AppUpdate;
    use chatportal_models::role::Role;

    fn user() -> Identity {
        Identity {
            login_id: "testuser".into(),
            employee_number: "E10001".into(),
            display_name: "Test User".into(),
            role: Role::User,
        }
    }

    fn anonymous<'a>(session_id: Option<&'a str>, counts_message: bool) -> AccessRequest<'a> {
        AccessRequest {
            identity: None,
            session_id,
            client_ip: "unknown",
            counts_message,
        }
    }

    #[tokio::test]
    async fn anonymous_needs_a_session_id() {
        let pool = test_pool().await;
        seed_app(&pool, 7, "alpha").await;
        assert!(matches!(
            authorize_app_access(&pool, 7, anonymous(None, true)).await,
            Err(CoreError::Unauthorized)
        ));
        let access = authorize_app_access(&pool, 7, anonymous(Some("abc"), true))
            .await
            .expect("anonymous access");
        assert_eq!(access.chat_user_id(), "anon_7:abc");
        assert_eq!(access.anonymous_session(), Some("abc"));
    }

    #[tokio::test]
    async fn signed_in_user_gets_employee_chat_id() {
        let pool = test_pool().await;
        seed_app(&pool, 7, "alpha").await;
        let identity = user();
        let access = authorize_app_access(
            &pool,
            7,
            AccessRequest {
                identity: Some(&identity),
                session_id: None,
                client_ip: "10.0.0.1",
                counts_message: true,
            },
        )
        .await
        .expect("user access");
        assert_eq!(access.chat_user_id(), "user_7:E10001");
        assert!(access.anonymous_session().is_none());
    }

    #[tokio::test]
    async fn missing_or_inactive_app_is_not_found() {
        let pool = test_pool().await;
        seed_app(&pool, 7, "alpha").await;
        assert!(matches!(
            authorize_app_access(&pool, 8, anonymous(Some("abc"), false)).await,
            Err(CoreError::NotFound)
        ));
        chatportal_db::apps::update_app(
            &pool,
            7,
            &AppUpdate {
                is_active: Some(false),
                ..AppUpdate::default()
            },
        )
        .await
        .expect("deactivate");
        assert!(matches!(
            authorize_app_access(&pool, 7, anonymous(Some("abc"), false)).await,
            Err(CoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn ip_allow_list_blocks_outsiders() {
        let pool = test_pool().await;
        seed_app(&pool, 7, "alpha").await;
        chatportal_db::apps::update_app(
            &pool,
            7,
            &AppUpdate {
                allowed_ips: Some("192.168.1.0/24"),
                ..AppUpdate::default()
            },
        )
        .await
        .expect("restrict");
        let identity = user();
        let mut request = AccessRequest {
            identity: Some(&identity),
            session_id: None,
            client_ip: "192.168.2.1",
            counts_message: false,
        };
        assert!(matches!(
            authorize_app_access(&pool, 7, request).await,
            Err(CoreError::Forbidden)
        ));
        request.client_ip = "192.168.1.50";
        assert!(authorize_app_access(&pool, 7, request).await.is_ok());
    }

    #[tokio::test]
    async fn private_app_rejects_anonymous() {
        let pool = test_pool().await;
        seed_app(&pool, 7, "alpha").await;
        chatportal_db::apps::update_app(
            &pool,
            7,
            &AppUpdate {
                allow_anonymous: Some(false),
                ..AppUpdate::default()
            },
        )
        .await
        .expect("private");
        assert!(matches!(
            authorize_app_access(&pool, 7, anonymous(Some("abc"), false)).await,
            Err(CoreError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn exhausted_session_is_rate_limited_for_sends_only() {
        let pool = test_pool().await;
        seed_app(&pool, 7, "alpha").await;
        for _ in 0..2 {
            chatportal_db::usage::increment_anonymous_count(&pool, 7, "abc")
                .await
                .expect("inc");
        }
        assert!(matches!(
            authorize_app_access(&pool, 7, anonymous(Some("abc"), true)).await,
            Err(CoreError::RateLimited(_))
        ));
        assert!(authorize_app_access(&pool, 7, anonymous(Some("abc"), false)).await.is_ok());
    }

    #[test]
    fn listing_hides_private_apps_from_anonymous() {
        let now = chrono::Utc::now();
        let app = AppRow {
            id: 1,
            name: "alpha".into(),
            description: None,
            api_url: String::new(),
            api_key: String::new(),
            is_active: true,
            is_public: false,
            allow_anonymous: true,
            max_anonymous_msgs: 0,
            allowed_ips: String::new(),
            created_at: now,
            updated_at: now,
        };
        assert!(!listed_for(&app, None));
        assert!(listed_for(&app, Some(&user())));
        let inactive = AppRow {
            is_active: false,
            ..app
        };
        assert!(!listed_for(&inactive, Some(&user())));
    }
}
