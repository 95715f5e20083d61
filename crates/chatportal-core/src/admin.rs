//! Admin account lifecycle: sign-in with lockout, password changes and
//! account management performed by a super admin.

use crate::auth::{self, AuthError};
use crate::authz::AdminPrincipal;
use crate::error::CoreError;
use crate::jwt::TokenService;
use crate::AppConfig;
use chatportal_db::admins::{AdminRow, NewAdmin};
use chatportal_db::DbPool;
use chatportal_models::identity::Identity;
use chatportal_models::role::Role;
use chatportal_util::validation;
use chrono::{Duration, Utc};

pub struct AdminSession {
    pub token: String,
    pub admin: AdminPrincipal,
}

pub struct NewAdminInput<'a> {
    pub login_id: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub department: Option<&'a str>,
    pub role: Role,
}

/// Token subject for an admin session. Admins have no employee number of
/// their own, so the account id stands in.
pub fn admin_identity(admin: &AdminPrincipal) -> Identity {
    Identity {
        login_id: admin.login_id.clone(),
        employee_number: admin.id.to_string(),
        display_name: admin.name.clone(),
        role: admin.role,
    }
}

pub async fn login(
    pool: &DbPool,
    tokens: &TokenService,
    config: &AppConfig,
    login_id: &str,
    password: &str,
) -> Result<AdminSession, AuthError> {
    let row = chatportal_db::admins::get_admin_by_login_id(pool, login_id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let now = Utc::now();
    if row.is_locked(now) {
        return Err(AuthError::AccountLocked);
    }
    if !row.is_active {
        return Err(AuthError::AccountDisabled);
    }

    if !auth::verify_password(password, &row.password_hash)? {
        let failure = chatportal_db::admins::record_failed_login(
            pool,
            row.id,
            config.max_login_attempts,
            now + Duration::minutes(config.lock_minutes),
            now,
        )
        .await?;
        if failure.locked_until.is_some() {
            tracing::warn!(
                "admin {} locked after {} failed logins",
                row.login_id,
                failure.attempts
            );
        }
        return Err(AuthError::InvalidCredentials);
    }

    if row.login_attempts != 0 || row.locked_until.is_some() {
        chatportal_db::admins::reset_login_state(pool, row.id).await?;
    }

    let admin = AdminPrincipal::from_row(&row).map_err(|e| AuthError::Internal(e.to_string()))?;
    let token = tokens.sign(&admin_identity(&admin))?;
    Ok(AdminSession { token, admin })
}

pub fn check_password_policy(password: &str) -> Result<(), CoreError> {
    let report = validation::validate_password(password);
    if report.is_valid {
        Ok(())
    } else {
        Err(CoreError::password_policy(report.errors))
    }
}

pub async fn change_password(
    pool: &DbPool,
    admin_id: i64,
    current_password: &str,
    new_password: &str,
) -> Result<(), CoreError> {
    let row = load(pool, admin_id).await?;
    if !verify(current_password, &row.password_hash)? {
        return Err(CoreError::BadRequest("Current password is incorrect".into()));
    }
    check_password_policy(new_password)?;
    store_password(pool, admin_id, new_password).await
}

/// Set a new password without knowing the old one. Also clears any lock.
pub async fn reset_password(pool: &DbPool, admin_id: i64, new_password: &str) -> Result<(), CoreError> {
    load(pool, admin_id).await?;
    check_password_policy(new_password)?;
    store_password(pool, admin_id, new_password).await?;
    chatportal_db::admins::reset_login_state(pool, admin_id).await?;
    Ok(())
}

pub async fn unlock(pool: &DbPool, admin_id: i64) -> Result<(), CoreError> {
    chatportal_db::admins::reset_login_state(pool, admin_id)
        .await
        .map_err(not_found)
}

pub async fn create_admin(pool: &DbPool, input: &NewAdminInput<'_>) -> Result<AdminRow, CoreError> {
    validation::validate_login_id(input.login_id)
        .map_err(|e| CoreError::BadRequest(format!("login_id: {e}")))?;
    validation::validate_display_name(input.name)
        .map_err(|e| CoreError::BadRequest(format!("name: {e}")))?;
    if let Some(email) = input.email {
        validation::validate_email(email)
            .map_err(|e| CoreError::BadRequest(format!("email: {e}")))?;
    }
    check_password_policy(input.password)?;

    if chatportal_db::admins::get_admin_by_login_id(pool, input.login_id)
        .await?
        .is_some()
    {
        return Err(CoreError::Conflict("Login ID is already in use".into()));
    }

    let hash = hash(input.password)?;
    let row = chatportal_db::admins::create_admin(
        pool,
        &NewAdmin {
            id: chatportal_util::snowflake::generate(1),
            login_id: input.login_id,
            password_hash: &hash,
            name: input.name.trim(),
            email: input.email,
            department: input.department,
            role: input.role.as_str(),
        },
    )
    .await?;
    Ok(row)
}

pub async fn delete_admin(pool: &DbPool, actor: &AdminPrincipal, admin_id: i64) -> Result<AdminRow, CoreError> {
    if actor.id == admin_id {
        return Err(CoreError::BadRequest("Cannot delete your own account".into()));
    }
    let row = load(pool, admin_id).await?;
    chatportal_db::admins::delete_admin(pool, admin_id)
        .await
        .map_err(not_found)?;
    Ok(row)
}

/// Create the first super admin when the table is empty. Returns whether
/// an account was created.
pub async fn bootstrap_super_admin(
    pool: &DbPool,
    login_id: &str,
    password: &str,
) -> Result<bool, CoreError> {
    if chatportal_db::admins::count_admins(pool).await? > 0 {
        return Ok(false);
    }
    create_admin(
        pool,
        &NewAdminInput {
            login_id,
            password,
            name: login_id,
            email: None,
            department: None,
            role: Role::SuperAdmin,
        },
    )
    .await?;
    tracing::info!("bootstrapped super admin {login_id}");
    Ok(true)
}

async fn load(pool: &DbPool, admin_id: i64) -> Result<AdminRow, CoreError> {
    chatportal_db::admins::get_admin_by_id(pool, admin_id)
        .await?
        .ok_or(CoreError::NotFound)
}

async fn store_password(pool: &DbPool, admin_id: i64, password: &str) -> Result<(), CoreError> {
    let hash = hash(password)?;
    chatportal_db::admins::update_password_hash(pool, admin_id, &hash)
        .await
        .map_err(not_found)
}

fn hash(password: &str) -> Result<String, CoreError> {
    auth::hash_password(password).map_err(|e| CoreError::Internal(e.to_string()))
}

fn verify(password: &str, hash: &str) -> Result<bool, CoreError> {
    auth::verify_password(password, hash).map_err(|e| CoreError::Internal(e.to_string()))
}

fn not_found(err: chatportal_db::DbError) -> CoreError {
    match err {
        chatportal_db::DbError::NotFound => CoreError::NotFound,
        other => CoreError::Database(other),
    }
}
