//! Redis storage backend.
//!
//! Key layout (all under the `admitdesk:` prefix):
//! ```text
//! counter:{name}        hash  seq, version, updated_at
//! docs:{collection}     hash  id -> document body (JSON)
//! meta:{collection}     hash  id -> unique key
//! keys:{collection}     hash  unique key -> id
//! ```
//!
//! Increments run as `MULTI`/`HINCRBY` transactions; inserts, deletes and
//! floor raises run as Lua scripts so each is a single atomic step.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, RedisError, Script};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};
use serde_json::Value;

use crate::config::RedisStorageConfig;
use crate::domain::{CounterState, Document};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{CounterStorage, DocumentStorage, Storage};

const PREFIX: &str = "admitdesk";

const RAISE_FLOOR: &str = r"
local raw = redis.call('HGET', KEYS[1], 'seq')
local value = tonumber(ARGV[1])
if raw then
  local current = tonumber(raw)
  if current > value then value = current end
end
redis.call('HSET', KEYS[1], 'seq', value, 'updated_at', ARGV[2])
redis.call('HINCRBY', KEYS[1], 'version', 1)
return value
";

const INSERT: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
  return 'id'
end
if ARGV[3] == '1' then
  if redis.call('HSETNX', KEYS[3], ARGV[4], ARGV[1]) == 0 then
    return 'key'
  end
  redis.call('HSET', KEYS[2], ARGV[1], ARGV[4])
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 'ok'
";

const REPLACE: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
";

const DELETE: &str = r"
if redis.call('HDEL', KEYS[1], ARGV[1]) == 0 then
  return 0
end
local key = redis.call('HGET', KEYS[2], ARGV[1])
if key then
  redis.call('HDEL', KEYS[2], ARGV[1])
  if redis.call('HGET', KEYS[3], key) == ARGV[1] then
    redis.call('HDEL', KEYS[3], key)
  end
end
return 1
";

const DELETE_ALL: &str = r"
local n = redis.call('HLEN', KEYS[1])
redis.call('DEL', KEYS[1], KEYS[2], KEYS[3])
return n
";

/// Redis-backed storage using a deadpool connection pool.
pub struct RedisStorage {
    pool: Pool,
}

struct CollectionKeys {
    docs: String,
    meta: String,
    keys: String,
}

impl CollectionKeys {
    fn new(collection: &str) -> Self {
        Self {
            docs: format!("{PREFIX}:docs:{collection}"),
            meta: format!("{PREFIX}:meta:{collection}"),
            keys: format!("{PREFIX}:keys:{collection}"),
        }
    }
}

fn counter_key(name: &str) -> String {
    format!("{PREFIX}:counter:{name}")
}

fn map_redis_error(err: RedisError) -> StorageError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
        StorageError::Connection(err.to_string())
    } else {
        StorageError::Query(err.to_string())
    }
}

fn parse_body(id: &str, raw: &str) -> StorageResult<Value> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("document '{id}': {e}")))
}

impl RedisStorage {
    /// Build the pool and verify the server answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built or Redis is unreachable.
    pub async fn connect(config: &RedisStorageConfig) -> StorageResult<Self> {
        let timeout = Some(Duration::from_secs(config.connect_timeout));
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts = Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        };

        let mut cfg = Config::from_url(config.url.clone());
        cfg.pool = Some(pool_config);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.health_check().await?;
        Ok(storage)
    }

    async fn conn(&self) -> StorageResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CounterStorage for RedisStorage {
    async fn increment(&self, name: &str) -> StorageResult<i64> {
        let mut conn = self.conn().await?;
        let key = counter_key(name);
        let (seq,): (i64,) = redis::pipe()
            .atomic()
            .hincr(&key, "seq", 1)
            .hincr(&key, "version", 1)
            .ignore()
            .hset(&key, "updated_at", chrono::Utc::now().timestamp_millis())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(seq)
    }

    async fn raise_floor(&self, name: &str, seq: i64) -> StorageResult<i64> {
        let mut conn = self.conn().await?;
        Script::new(RAISE_FLOOR)
            .key(counter_key(name))
            .arg(seq)
            .arg(chrono::Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<CounterState>> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, i64> = redis::cmd("HGETALL")
            .arg(counter_key(name))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        let Some(seq) = fields.get("seq").copied() else {
            return Ok(None);
        };
        Ok(Some(CounterState {
            name: name.to_string(),
            seq,
            version: fields
                .get("version")
                .and_then(|v| u64::try_from(*v).ok())
                .unwrap_or_default(),
            updated_at: fields.get("updated_at").copied().unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl DocumentStorage for RedisStorage {
    async fn insert(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        let mut conn = self.conn().await?;
        let keys = CollectionKeys::new(collection);
        let body = serde_json::to_string(&doc.body)?;

        let outcome: String = Script::new(INSERT)
            .key(&keys.docs)
            .key(&keys.meta)
            .key(&keys.keys)
            .arg(&doc.id)
            .arg(body)
            .arg(if doc.key.is_some() { "1" } else { "0" })
            .arg(doc.key.as_deref().unwrap_or_default())
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        match outcome.as_str() {
            "ok" => Ok(()),
            "key" => Err(StorageError::DuplicateKey(format!(
                "{collection}: key '{}' already exists",
                doc.key.as_deref().unwrap_or_default()
            ))),
            _ => Err(StorageError::DuplicateKey(format!(
                "{collection}: id '{}' already exists",
                doc.id
            ))),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let mut conn = self.conn().await?;
        let keys = CollectionKeys::new(collection);

        let (body, key): (Option<String>, Option<String>) = redis::pipe()
            .hget(&keys.docs, id)
            .hget(&keys.meta, id)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        body.map(|raw| {
            Ok(Document {
                id: id.to_string(),
                key,
                body: parse_body(id, &raw)?,
            })
        })
        .transpose()
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> StorageResult<Option<Document>> {
        let id: Option<String> = {
            let mut conn = self.conn().await?;
            redis::cmd("HGET")
                .arg(CollectionKeys::new(collection).keys)
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?
        };
        match id {
            Some(id) => self.get(collection, &id).await,
            None => Ok(None),
        }
    }

    async fn list(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let mut conn = self.conn().await?;
        let keys = CollectionKeys::new(collection);

        let (bodies, meta): (HashMap<String, String>, HashMap<String, String>) = redis::pipe()
            .atomic()
            .hgetall(&keys.docs)
            .hgetall(&keys.meta)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        bodies
            .into_iter()
            .map(|(id, raw)| {
                let body = parse_body(&id, &raw)?;
                let key = meta.get(&id).cloned();
                Ok(Document { id, key, body })
            })
            .collect()
    }

    async fn replace(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        let mut conn = self.conn().await?;
        let keys = CollectionKeys::new(collection);

        let replaced: i64 = Script::new(REPLACE)
            .key(&keys.docs)
            .arg(&doc.id)
            .arg(serde_json::to_string(&doc.body)?)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if replaced == 0 {
            return Err(StorageError::NotFound(format!(
                "{collection}: document '{}' not found",
                doc.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let mut conn = self.conn().await?;
        let keys = CollectionKeys::new(collection);

        let deleted: i64 = Script::new(DELETE)
            .key(&keys.docs)
            .key(&keys.meta)
            .key(&keys.keys)
            .arg(id)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(deleted == 1)
    }

    async fn delete_all(&self, collection: &str) -> StorageResult<u64> {
        let mut conn = self.conn().await?;
        let keys = CollectionKeys::new(collection);

        Script::new(DELETE_ALL)
            .key(&keys.docs)
            .key(&keys.meta)
            .key(&keys.keys)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn count(&self, collection: &str) -> StorageResult<u64> {
        let mut conn = self.conn().await?;
        redis::cmd("HLEN")
            .arg(CollectionKeys::new(collection).docs)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn health_check(&self) -> StorageResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
