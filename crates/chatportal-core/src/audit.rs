//! Fire-and-forget audit trail for privileged mutations.

use chatportal_db::audit_log::NewAuditLog;
use chatportal_db::DbPool;
use chatportal_models::audit_log::ActorType;
use serde_json::{json, Value};

/// Where a request came from, as recorded in the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
    pub request_path: String,
}

impl RequestMeta {
    /// `lookup` returns a header value by lowercase name.
    pub fn from_headers<'a>(lookup: impl Fn(&str) -> Option<&'a str>, path: &str) -> Self {
        let ip_address = lookup("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| lookup("x-real-ip").map(str::trim).filter(|v| !v.is_empty()))
            .unwrap_or("unknown")
            .to_string();
        Self {
            ip_address,
            user_agent: lookup("user-agent").unwrap_or_default().to_string(),
            request_path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: String,
    pub actor_type: ActorType,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<String>,
    pub changes: Option<Value>,
    pub success: bool,
    pub meta: RequestMeta,
}

impl AuditEntry {
    pub fn new(
        actor_id: impl Into<String>,
        actor_type: ActorType,
        action: &'static str,
        entity_type: &'static str,
        meta: RequestMeta,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_type,
            action,
            entity_type,
            entity_id: None,
            changes: None,
            success: true,
            meta,
        }
    }

    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn changes(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.changes = Some(json!({ "before": before, "after": after }));
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    db: DbPool,
}

impl AuditLogger {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Record `entry` in the background. The caller never waits and never
    /// sees a failure.
    pub fn log(&self, entry: AuditEntry) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(err) = write(&db, &entry).await {
                tracing::warn!(
                    action = entry.action,
                    actor = %entry.actor_id,
                    "failed to write audit log: {err}"
                );
            }
        });
    }
}

async fn write(db: &DbPool, entry: &AuditEntry) -> Result<(), chatportal_db::DbError> {
    chatportal_db::audit_log::create_entry(
        db,
        &NewAuditLog {
            id: chatportal_util::snowflake::generate(1),
            actor_id: &entry.actor_id,
            actor_type: entry.actor_type.as_str(),
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id.as_deref(),
            changes: entry.changes.as_ref(),
            success: entry.success,
            ip_address: &entry.meta.ip_address,
            user_agent: &entry.meta.user_agent,
            request_path: &entry.meta.request_path,
        },
    )
    .await
}
