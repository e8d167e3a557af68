//! Runtime-context traits (spec §9: "carry a runtime context object
//! through every handler"). `iam_gateway::state::AppState` implements all
//! of these; tests substitute fakes.

use sqlx::PgPool;

use crate::jwt::TokenManager;

pub trait WithDbPool {
  fn db_pool(&self) -> &PgPool;
}

impl WithDbPool for PgPool {
  fn db_pool(&self) -> &PgPool {
    self
  }
}

impl WithDbPool for &PgPool {
  fn db_pool(&self) -> &PgPool {
    self
  }
}

pub trait WithTokenManager {
  fn token_manager(&self) -> &TokenManager;
}

/// A TTL-capable cache of `K -> V`. Implementations back the short-TTL
/// authorization cache (spec §4.E) among others; the hot-path primitives
/// the gateway pipeline itself relies on (`INCR`, `SET NX EX`,
/// `GET-and-DEL`) are modeled separately by `contracts::cache::CacheStore`
/// because they are string-keyed and atomic in a way a generic `K, V`
/// cache is not.
pub trait WithCache<K, V> {
  fn get_from_cache(&self, key: &K) -> Option<V>;
  fn insert_into_cache(&self, key: K, value: V, ttl_seconds: u64);
  fn remove_from_cache(&self, key: &K);
}
