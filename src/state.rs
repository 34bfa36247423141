use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::SqlitePool;

use catalog_backend::search::SearchCache;

/// Login failure record / 登录失败记录
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub fail_count: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Login security state / 登录安全状态
///
/// IP 连续失败 5 次后封禁 30 分钟。
pub struct LoginSecurity {
    /// IP login failure records: IP -> LoginAttempt / IP登录失败记录
    ip_attempts: RwLock<HashMap<String, LoginAttempt>>,
}

impl LoginSecurity {
    pub fn new() -> Self {
        Self {
            ip_attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Check if IP is blocked (5+ failures within 30 minutes) / 检查IP是否被封禁
    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        let attempts = self.ip_attempts.read();
        if let Some(attempt) = attempts.get(ip) {
            if attempt.fail_count >= 5 {
                let elapsed = Utc::now().signed_duration_since(attempt.last_attempt);
                return elapsed.num_minutes() < 30;
            }
        }
        false
    }

    /// Record login failure / 记录登录失败
    pub fn record_failure(&self, ip: &str) {
        let now = Utc::now();
        let mut attempts = self.ip_attempts.write();
        let entry = attempts.entry(ip.to_string()).or_insert(LoginAttempt {
            fail_count: 0,
            last_attempt: now,
        });
        // 超过30分钟重新计数
        if now.signed_duration_since(entry.last_attempt).num_minutes() >= 30 {
            entry.fail_count = 0;
        }
        entry.fail_count += 1;
        entry.last_attempt = now;
    }

    /// Login succeeded, clear failure records / 登录成功，清除失败记录
    pub fn clear_failure(&self, ip: &str) {
        self.ip_attempts.write().remove(ip);
    }
}

impl Default for LoginSecurity {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state / 共享应用状态
pub struct AppState {
    pub db: SqlitePool,
    /// Best-effort search result cache, cleared on every product mutation
    /// 搜索结果缓存，产品变更时清空
    pub search_cache: SearchCache,
    pub login_security: LoginSecurity,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            search_cache: SearchCache::default(),
            login_security: LoginSecurity::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_block_after_five_failures() {
        let security = LoginSecurity::new();
        assert!(!security.is_ip_blocked("10.0.0.1"));

        for _ in 0..4 {
            security.record_failure("10.0.0.1");
        }
        assert!(!security.is_ip_blocked("10.0.0.1"));

        security.record_failure("10.0.0.1");
        assert!(security.is_ip_blocked("10.0.0.1"));

        // 其他IP不受影响
        assert!(!security.is_ip_blocked("10.0.0.2"));

        security.clear_failure("10.0.0.1");
        assert!(!security.is_ip_blocked("10.0.0.1"));
    }
}
