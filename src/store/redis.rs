//! Redis/KeyDB coordination store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use url::Url;

use crate::config::StoreConfig;
use crate::store::{CoordinationStore, StoreError};

/// Keys returned per SCAN round trip.
const SCAN_BATCH: usize = 256;

/// Store client backed by an auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    address: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("address", &self.address).finish()
    }
}

impl RedisStore {
    /// Open a managed connection to the configured server.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = connection_url(config)?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::debug!(address = %config.address, db = config.database, "Store connection established");

        Ok(Self {
            conn,
            address: config.address.clone(),
        })
    }
}

/// Build a `redis://` URL, percent-encoding the password.
fn connection_url(config: &StoreConfig) -> Result<Url, StoreError> {
    let mut url = Url::parse(&format!("redis://{}/{}", config.address, config.database))
        .map_err(|e| StoreError::Connection(format!("invalid store address {}: {}", config.address, e)))?;

    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| StoreError::Connection("store address cannot carry a password".into()))?;
    }
    Ok(url)
}

/// Escape SCAN glob metacharacters so the prefix matches literally.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

fn millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("DECR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = glob_escape(prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_escape() {
        assert_eq!(glob_escape("pod-registry:"), "pod-registry:*");
        assert_eq!(glob_escape("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }

    #[test]
    fn test_connection_url_encodes_password() {
        let config = StoreConfig {
            address: "keydb:6379".into(),
            password: Some("p@ss/word".into()),
            database: 2,
        };
        let url = connection_url(&config).unwrap();
        assert_eq!(url.host_str(), Some("keydb"));
        assert_eq!(url.port(), Some(6379));
        assert_eq!(url.path(), "/2");
        assert_eq!(url.password(), Some("p%40ss%2Fword"));
    }

    #[test]
    fn test_connection_url_without_password() {
        let config = StoreConfig {
            address: "127.0.0.1:6379".into(),
            password: None,
            database: 0,
        };
        let url = connection_url(&config).unwrap();
        assert_eq!(url.as_str(), "redis://127.0.0.1:6379/0");
    }
}
