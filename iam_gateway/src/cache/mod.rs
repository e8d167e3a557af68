//! Redis-backed implementation of [`iam_core::contracts::CacheStore`] —
//! the atomic string-keyed primitives (`SET NX EX`, `INCR`, `GET`-and-DEL)
//! the gateway pipeline's concurrency model (spec §5) relies on.

use async_trait::async_trait;
use iam_core::contracts::CacheStore;
use iam_core::error::CoreError;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

#[derive(Clone)]
pub struct RedisCacheStore {
  conn: ConnectionManager,
  prefix: String,
}

impl RedisCacheStore {
  pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
    Self {
      conn,
      prefix: prefix.into(),
    }
  }

  fn make_key(&self, key: &str) -> String {
    format!("{}:{}", self.prefix, key)
  }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
  async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
    let mut conn = self.conn.clone();
    conn
      .get(self.make_key(key))
      .await
      .map_err(|e| CoreError::ServiceUnavailable(e.to_string()))
  }

  async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CoreError> {
    let mut conn = self.conn.clone();
    conn
      .set_ex::<_, _, ()>(self.make_key(key), value, ttl_secs)
      .await
      .map_err(|e| CoreError::ServiceUnavailable(e.to_string()))
  }

  async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, CoreError> {
    let mut conn = self.conn.clone();
    let result: bool = redis::cmd("SET")
      .arg(self.make_key(key))
      .arg(value)
      .arg("NX")
      .arg("EX")
      .arg(ttl_secs)
      .query_async::<_, Option<String>>(&mut conn)
      .await
      .map_err(|e| CoreError::ServiceUnavailable(e.to_string()))?
      .is_some();
    Ok(result)
  }

  async fn get_and_delete(&self, key: &str) -> Result<Option<String>, CoreError> {
    let mut conn = self.conn.clone();
    let full_key = self.make_key(key);
    redis::pipe()
      .atomic()
      .get(&full_key)
      .del(&full_key)
      .query_async::<_, (Option<String>, i64)>(&mut conn)
      .await
      .map(|(value, _)| value)
      .map_err(|e| CoreError::ServiceUnavailable(e.to_string()))
  }

  async fn delete(&self, key: &str) -> Result<(), CoreError> {
    let mut conn = self.conn.clone();
    conn
      .del::<_, ()>(self.make_key(key))
      .await
      .map_err(|e| CoreError::ServiceUnavailable(e.to_string()))
  }

  async fn incr(&self, key: &str, amount: i64, ttl_secs: u64) -> Result<i64, CoreError> {
    let mut conn = self.conn.clone();
    let full_key = self.make_key(key);
    redis::pipe()
      .atomic()
      .incr(&full_key, amount)
      .expire(&full_key, ttl_secs as i64)
      .ignore()
      .query_async::<_, i64>(&mut conn)
      .await
      .map_err(|e| CoreError::ServiceUnavailable(e.to_string()))
  }
}
