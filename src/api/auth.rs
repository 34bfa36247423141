//! Admin authentication endpoints / 管理员认证接口

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

use catalog_backend::models::{AdminUser, ChangePasswordRequest, LoginRequest, RegisterRequest};

use super::{bad_request, db_error};
use crate::auth::{self, SESSION_COOKIE_NAME};
use crate::state::AppState;

fn invalid_credentials() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Authentication Failed", "message": "Invalid credentials"})),
    )
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let ip = addr.ip().to_string();

    if state.login_security.is_ip_blocked(&ip) {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too Many Attempts",
                "message": "too many failed logins, try again in 30 minutes"
            })),
        ));
    }

    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(bad_request("Username and password are required"));
    }

    // 支持用户名或邮箱登录 / username or email both work
    let user = sqlx::query_as::<_, AdminUser>(
        "SELECT id, username, email, password_hash, created_at, last_login \
         FROM admin_users WHERE username = ? OR email = ?",
    )
    .bind(&req.username)
    .bind(&req.username)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| {
        state.login_security.record_failure(&ip);
        invalid_credentials()
    })?;

    let valid = bcrypt::verify(&req.password, &user.password_hash).map_err(|err| {
        tracing::error!("bcrypt verify failed: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Authentication Error", "message": "Login failed"})),
        )
    })?;

    if !valid {
        state.login_security.record_failure(&ip);
        return Err(invalid_credentials());
    }

    state.login_security.clear_failure(&ip);

    let (token, expires_at) = auth::create_session(&state.db, user.id)
        .await
        .map_err(db_error)?;

    sqlx::query("UPDATE admin_users SET last_login = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(user.id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    Ok(Json(json!({
        "success": true,
        "token": token,
        "expires_at": expires_at,
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "last_login": user.last_login,
        }
    })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(token) = auth::extract_token(&headers, &cookies) {
        auth::delete_session(&state.db, &token)
            .await
            .map_err(db_error)?;
    }

    // 必须设置相同的 path 才能正确删除 cookie
    let mut removal_cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    removal_cookie.set_path("/");
    cookies.remove(removal_cookie);

    Ok(Json(json!({"success": true, "message": "Logged out successfully"})))
}

/// GET /api/auth/verify - 校验当前令牌
pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(token) = auth::extract_token(&headers, &cookies) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"valid": false, "message": "missing authorization"})),
        ));
    };

    match auth::verify_session(&state.db, &token).await.map_err(db_error)? {
        Some((user, expires_at)) => Ok(Json(json!({
            "valid": true,
            "user": user,
            "expires_at": expires_at,
        }))),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"valid": false, "message": "invalid or expired token"})),
        )),
    }
}

/// POST /api/auth/register
///
/// Open only while no admin exists (initial setup); afterwards an
/// authenticated admin is required. / 首个管理员可自由注册，之后需管理员权限
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(bad_request("Username, email, and password are required"));
    }

    let (user_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin_users")
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    if user_count > 0 {
        auth::require_admin(&state.db, &headers, &cookies).await?;
    }

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM admin_users WHERE username = ? OR email = ?")
            .bind(&req.username)
            .bind(&req.email)
            .fetch_optional(&state.db)
            .await
            .map_err(db_error)?;

    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({"error": "User Exists", "message": "Username or email already exists"})),
        ));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|err| {
        tracing::error!("bcrypt hash failed: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Registration Error", "message": "Failed to create user"})),
        )
    })?;

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO admin_users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&req.username)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": {
                "id": result.last_insert_rowid(),
                "username": req.username,
                "email": req.email,
                "created_at": now,
            }
        })),
    ))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user = auth::require_admin(&state.db, &headers, &cookies).await?;

    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(bad_request("Current password and new password are required"));
    }

    let (password_hash,): (String,) =
        sqlx::query_as("SELECT password_hash FROM admin_users WHERE id = ?")
            .bind(user.id)
            .fetch_one(&state.db)
            .await
            .map_err(db_error)?;

    let valid = bcrypt::verify(&req.current_password, &password_hash).unwrap_or(false);
    if !valid {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Authentication Failed",
                "message": "Current password is incorrect"
            })),
        ));
    }

    let new_hash = bcrypt::hash(&req.new_password, bcrypt::DEFAULT_COST).map_err(|err| {
        tracing::error!("bcrypt hash failed: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Password Change Error", "message": "Failed to change password"})),
        )
    })?;

    sqlx::query("UPDATE admin_users SET password_hash = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(user.id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    // 改密后注销该用户的其他会话
    if let Some(token) = auth::extract_token(&headers, &cookies) {
        auth::delete_other_sessions(&state.db, user.id, &token)
            .await
            .map_err(db_error)?;
    }

    Ok(Json(json!({"success": true, "message": "Password changed successfully"})))
}
