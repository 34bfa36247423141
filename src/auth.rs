//! Admin session primitives / 管理员会话原语
//!
//! Tokens are 32 random bytes hex-encoded, stored in `admin_sessions` with
//! an expiry. Handlers accept either an `Authorization: Bearer` header or
//! the session cookie.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_cookies::Cookies;

use catalog_backend::config;

pub const SESSION_COOKIE_NAME: &str = "admin_session";

/// Authenticated admin identity / 已认证的管理员身份
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuthedUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Generate a random session token / 生成随机会话令牌
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create a session for a user, sweeping expired ones / 创建会话并清理过期会话
///
/// Returns the token and its RFC3339 expiry.
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<(String, String), sqlx::Error> {
    let token = generate_session_token();
    let now = Utc::now();
    let ttl_hours = config::config().session.ttl_hours;
    let expires_at = (now + Duration::hours(ttl_hours)).to_rfc3339();
    let now = now.to_rfc3339();

    sqlx::query(
        "INSERT INTO admin_sessions (token, user_id, expires_at, created_at, last_activity) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&token)
    .bind(user_id)
    .bind(&expires_at)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    // 顺手清理过期会话
    sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= ?")
        .bind(&now)
        .execute(pool)
        .await?;

    Ok((token, expires_at))
}

/// Validate a token and refresh its last activity / 验证令牌并刷新活动时间
///
/// Returns the user plus the session expiry, or `None` for unknown/expired
/// tokens.
pub async fn verify_session(
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<(AuthedUser, String)>, sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    let session: Option<(i64, String, String, String)> = sqlx::query_as(
        "SELECT u.id, u.username, u.email, s.expires_at \
         FROM admin_sessions s \
         JOIN admin_users u ON s.user_id = u.id \
         WHERE s.token = ? AND s.expires_at > ?",
    )
    .bind(token)
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    let Some((id, username, email, expires_at)) = session else {
        return Ok(None);
    };

    sqlx::query("UPDATE admin_sessions SET last_activity = ? WHERE token = ?")
        .bind(&now)
        .bind(token)
        .execute(pool)
        .await?;

    Ok(Some((
        AuthedUser {
            id,
            username,
            email,
        },
        expires_at,
    )))
}

/// Delete one session (logout) / 删除会话（登出）
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM admin_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every other session of a user (after password change)
/// 删除该用户的其他所有会话（改密后调用）
pub async fn delete_other_sessions(
    pool: &SqlitePool,
    user_id: i64,
    keep_token: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM admin_sessions WHERE user_id = ? AND token != ?")
        .bind(user_id)
        .bind(keep_token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Extract the session token: Bearer header first, cookie fallback
/// 提取会话令牌：优先 Bearer 头，其次 cookie
pub fn extract_token(headers: &HeaderMap, cookies: &Cookies) -> Option<String> {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    cookies
        .get(SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
}

/// Require an authenticated admin / 要求已认证的管理员
pub async fn require_admin(
    pool: &SqlitePool,
    headers: &HeaderMap,
    cookies: &Cookies,
) -> Result<AuthedUser, (StatusCode, Json<Value>)> {
    let token = extract_token(headers, cookies).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized", "message": "missing authorization"})),
        )
    })?;

    match verify_session(pool, &token).await {
        Ok(Some((user, _))) => Ok(user),
        Ok(None) => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized", "message": "invalid or expired token"})),
        )),
        Err(err) => {
            tracing::error!("session lookup failed: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal Server Error", "message": "authentication error"})),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        catalog_backend::db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn insert_admin(pool: &SqlitePool) -> i64 {
        let result = sqlx::query(
            "INSERT INTO admin_users (username, email, password_hash, created_at) \
             VALUES ('admin', 'admin@example.com', 'x', '2024-01-01T00:00:00+00:00')",
        )
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    #[test]
    fn test_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let pool = test_pool().await;
        let user_id = insert_admin(&pool).await;

        let (token, expires_at) = create_session(&pool, user_id).await.unwrap();
        let (user, session_expiry) = verify_session(&pool, &token).await.unwrap().unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.username, "admin");
        assert_eq!(session_expiry, expires_at);

        // 未知令牌无效
        assert!(verify_session(&pool, "deadbeef").await.unwrap().is_none());

        delete_session(&pool, &token).await.unwrap();
        assert!(verify_session(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = test_pool().await;
        let user_id = insert_admin(&pool).await;

        sqlx::query(
            "INSERT INTO admin_sessions (token, user_id, expires_at, created_at, last_activity) \
             VALUES ('stale', ?, '2000-01-01T00:00:00+00:00', '2000-01-01T00:00:00+00:00', \
             '2000-01-01T00:00:00+00:00')",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

        assert!(verify_session(&pool, "stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_other_sessions_keeps_current() {
        let pool = test_pool().await;
        let user_id = insert_admin(&pool).await;

        let (first, _) = create_session(&pool, user_id).await.unwrap();
        let (second, _) = create_session(&pool, user_id).await.unwrap();

        delete_other_sessions(&pool, user_id, &second).await.unwrap();
        assert!(verify_session(&pool, &first).await.unwrap().is_none());
        assert!(verify_session(&pool, &second).await.unwrap().is_some());
    }
}
