use crate::error::CoreError;
use crate::jwt::Claims;
use chatportal_db::admins::AdminRow;
use chatportal_db::DbPool;
use chatportal_models::role::{GroupRole, Role};
use serde::Serialize;

/// An admin as seen by authorization checks: always re-read from the
/// database, never trusted from the token alone.
#[derive(Debug, Clone, Serialize)]
pub struct AdminPrincipal {
    pub id: i64,
    pub login_id: String,
    pub name: String,
    pub role: Role,
    pub group_id: Option<i64>,
}

impl AdminPrincipal {
    pub fn from_row(row: &AdminRow) -> Result<Self, CoreError> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| CoreError::Internal(format!("unknown admin role '{}'", row.role)))?;
        Ok(Self {
            id: row.id,
            login_id: row.login_id.clone(),
            name: row.name.clone(),
            role,
            group_id: row.group_id,
        })
    }
}

/// Check verified admin-token claims against the stored account.
pub async fn authorize_admin(pool: &DbPool, claims: &Claims) -> Result<AdminPrincipal, CoreError> {
    if !claims.role.is_admin() {
        return Err(CoreError::Forbidden);
    }
    let row = chatportal_db::admins::get_admin_by_login_id(pool, &claims.sub)
        .await?
        .ok_or(CoreError::Unauthorized)?;
    // Admin tokens carry the account id in `emp_no`; a portal user token
    // with the same login id does not.
    if !row.is_active || claims.emp_no != row.id.to_string() {
        return Err(CoreError::Unauthorized);
    }
    let principal = AdminPrincipal::from_row(&row)?;
    if !principal.role.is_admin() {
        return Err(CoreError::Forbidden);
    }
    Ok(principal)
}

pub fn require_super_admin(admin: &AdminPrincipal) -> Result<(), CoreError> {
    if admin.role.is_super_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}

/// App ids an admin may see. `None` means unrestricted.
pub async fn visible_app_ids(
    pool: &DbPool,
    admin: &AdminPrincipal,
) -> Result<Option<Vec<i64>>, CoreError> {
    if admin.role.is_super_admin() {
        return Ok(None);
    }
    match admin.group_id {
        Some(group_id) => Ok(Some(
            chatportal_db::groups::list_group_app_ids(pool, group_id).await?,
        )),
        None => Ok(Some(Vec::new())),
    }
}

pub fn can_see_app(visible: Option<&[i64]>, app_id: i64) -> bool {
    visible.is_none_or(|ids| ids.contains(&app_id))
}

/// Add an admin to a group. An admin belongs to at most one group: a
/// membership elsewhere is a conflict, the same group only updates the role.
pub async fn add_group_member(
    pool: &DbPool,
    group_id: i64,
    admin_id: i64,
    group_role: GroupRole,
) -> Result<(), CoreError> {
    chatportal_db::groups::get_group(pool, group_id)
        .await?
        .ok_or(CoreError::NotFound)?;
    chatportal_db::admins::get_admin_by_id(pool, admin_id)
        .await?
        .ok_or(CoreError::NotFound)?;

    if let Some((current, _)) = chatportal_db::groups::get_membership(pool, admin_id).await? {
        if current != group_id {
            return Err(CoreError::Conflict(
                "Admin already belongs to another group".into(),
            ));
        }
    }

    let affected =
        chatportal_db::groups::upsert_member(pool, group_id, admin_id, group_role.as_str()).await?;
    if affected == 0 {
        // Lost a race with a concurrent add to another group.
        return Err(CoreError::Conflict(
            "Admin already belongs to another group".into(),
        ));
    }
    Ok(())
}

pub async fn remove_group_member(
    pool: &DbPool,
    group_id: i64,
    admin_id: i64,
) -> Result<(), CoreError> {
    if chatportal_db::groups::remove_member(pool, group_id, admin_id).await? {
        Ok(())
    } else {
        Err(CoreError::NotFound)
    }
}
