use std::sync::{Mutex, PoisonError};

use redis::{Commands, Script};
use tracing::debug;

use super::{CounterStore, Result};

const RAISE_SCRIPT: &str = r"
local current = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0')
local wanted = tonumber(ARGV[2])
if wanted > current then
  redis.call('HSET', KEYS[1], ARGV[1], wanted)
  return wanted
end
return current
";

/// Counter store backed by redis hashes.
pub struct RedisCounterStore {
    conn: Mutex<redis::Connection>,
    raise: Script,
}

impl RedisCounterStore {
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        debug!("connected counter store");
        Ok(Self {
            conn: Mutex::new(conn),
            raise: Script::new(RAISE_SCRIPT),
        })
    }
}

impl CounterStore for RedisCounterStore {
    fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conn.hincr(key, field, delta)?)
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conn.hget(key, field)?)
    }

    fn hset_max(&self, key: &str, field: &str, value: i64) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.raise.key(key).arg(field).arg(value).invoke(&mut *conn)?)
    }
}
