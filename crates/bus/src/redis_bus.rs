use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};

use crate::bus::Bus;
use crate::error::BusError;
use crate::message::{PendingEntry, StreamEntry, StreamGroupInfo, StreamRead};

fn map_err(e: RedisError) -> BusError {
    BusError::Provider(e.to_string())
}

/// Redis Streams adapter. Grounded in the teacher's `SqsConsumer` (a typed
/// client wrapping a provider SDK, constructed once and reused), swapped
/// here for `redis::aio::ConnectionManager`, which auto-reconnects with its
/// own backoff and is safe to clone/share across tasks — the Redis analogue
/// of the teacher's bounded connection pool (§4.1, §5).
pub struct RedisBus {
    conn: ConnectionManager,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(map_err)?;
        let conn = client.get_connection_manager().await.map_err(map_err)?;
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn is_member(&self, set: &str, value: &str) -> Result<bool, BusError> {
        let mut conn = self.conn();
        conn.sismember(set, value).await.map_err(map_err)
    }

    async fn add_member(&self, set: &str, value: &str) -> Result<(), BusError> {
        let mut conn = self.conn();
        let _: i64 = conn.sadd(set, value).await.map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BusError> {
        let mut conn = self.conn();
        conn.get(key).await.map_err(map_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BusError> {
        let mut conn = self.conn();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await.map_err(map_err)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(map_err)?;
            }
        }
        Ok(())
    }

    async fn append(
        &self,
        stream: &str,
        fields: &HashMap<String, String>,
        max_len: u64,
    ) -> Result<String, BusError> {
        let mut conn = self.conn();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("MAXLEN").arg("~").arg(max_len).arg("*");
        for (k, v) in fields {
            cmd.arg(k).arg(v);
        }
        let id: String = cmd.query_async(&mut conn).await.map_err(map_err)?;
        Ok(id)
    }

    async fn group_create(&self, stream: &str, group: &str, start_id: &str) -> Result<(), BusError> {
        let mut conn = self.conn();
        let result: Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg(start_id)
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn group_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<StreamRead, BusError> {
        let mut conn = self.conn();
        let raw: redis::Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(stream)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        parse_xread_value(stream, raw)
    }

    async fn pending(&self, stream: &str, group: &str, count: usize) -> Result<Vec<PendingEntry>, BusError> {
        let mut conn = self.conn();
        let raw: redis::Value = redis::cmd("XPENDING")
            .arg(stream)
            .arg(group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        parse_xpending_value(raw)
    }

    async fn range(&self, stream: &str, from: &str, to: &str, count: usize) -> Result<Vec<StreamEntry>, BusError> {
        let mut conn = self.conn();
        let raw: redis::Value = redis::cmd("XRANGE")
            .arg(stream)
            .arg(from)
            .arg(to)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        parse_entries_value(raw)
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), BusError> {
        let mut conn = self.conn();
        let _: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        ids: &[String],
    ) -> Result<Vec<StreamEntry>, BusError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn();
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream).arg(group).arg(consumer).arg(0);
        for id in ids {
            cmd.arg(id);
        }
        let raw: redis::Value = cmd.query_async(&mut conn).await.map_err(map_err)?;
        parse_entries_value(raw)
    }

    async fn group_info(&self, stream: &str, group: &str) -> Result<Option<StreamGroupInfo>, BusError> {
        let mut conn = self.conn();
        let stream_info: Result<redis::Value, RedisError> =
            redis::cmd("XINFO").arg("STREAM").arg(stream).query_async(&mut conn).await;
        let stream_info = match stream_info {
            Ok(v) => v,
            Err(e) if e.to_string().contains("no such key") => return Ok(None),
            Err(e) => return Err(map_err(e)),
        };
        let last_generated_id = field_from_flat_value(&stream_info, "last-generated-id")
            .unwrap_or_else(|| "0-0".to_string());

        let groups: redis::Value = redis::cmd("XINFO")
            .arg("GROUPS")
            .arg(stream)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        let groups = match groups {
            redis::Value::Array(items) => items,
            _ => vec![],
        };
        for item in groups {
            let name = field_from_flat_value(&item, "name");
            if name.as_deref() == Some(group) {
                let last_delivered_id =
                    field_from_flat_value(&item, "last-delivered-id").unwrap_or_else(|| "0-0".to_string());
                let pending = field_from_flat_value(&item, "pending")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                return Ok(Some(StreamGroupInfo {
                    last_generated_id,
                    last_delivered_id,
                    pending,
                }));
            }
        }
        Ok(None)
    }

    async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(map_err)?;
        Ok(())
    }
}

/// Pulls a named field's string value out of one of Redis's flat
/// `[k1, v1, k2, v2, ...]` info replies.
fn field_from_flat_value(value: &redis::Value, field: &str) -> Option<String> {
    let items = match value {
        redis::Value::Array(items) => items,
        _ => return None,
    };
    let mut iter = items.iter();
    while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
        if value_to_string(k).as_deref() == Some(field) {
            return value_to_string(v);
        }
    }
    None
}

fn value_to_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
        redis::Value::SimpleString(s) => Some(s.clone()),
        redis::Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Parses an `XREADGROUP`/`XREAD` reply: `[[stream, [[id, [k,v,...]], ...]]]`.
fn parse_xread_value(stream: &str, raw: redis::Value) -> Result<StreamRead, BusError> {
    let streams = match raw {
        redis::Value::Array(items) => items,
        redis::Value::Nil => return Ok(StreamRead { stream: stream.to_string(), entries: vec![] }),
        _ => return Ok(StreamRead { stream: stream.to_string(), entries: vec![] }),
    };
    for entry in streams {
        let parts = match entry {
            redis::Value::Array(items) => items,
            _ => continue,
        };
        if parts.len() != 2 {
            continue;
        }
        let entries = parse_entries_value(parts[1].clone())?;
        return Ok(StreamRead { stream: stream.to_string(), entries });
    }
    Ok(StreamRead { stream: stream.to_string(), entries: vec![] })
}

/// Parses an `XRANGE`/`XCLAIM` reply: `[[id, [k,v,...]], ...]`.
fn parse_entries_value(raw: redis::Value) -> Result<Vec<StreamEntry>, BusError> {
    let items = match raw {
        redis::Value::Array(items) => items,
        redis::Value::Nil => return Ok(vec![]),
        _ => return Ok(vec![]),
    };
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let parts = match item {
            redis::Value::Array(p) => p,
            _ => continue,
        };
        if parts.len() != 2 {
            continue;
        }
        let id = value_to_string(&parts[0]).unwrap_or_default();
        let field_items = match &parts[1] {
            redis::Value::Array(f) => f.clone(),
            _ => vec![],
        };
        let mut fields = HashMap::new();
        let mut iter = field_items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            if let (Some(k), Some(v)) = (value_to_string(&k), value_to_string(&v)) {
                fields.insert(k, v);
            }
        }
        entries.push(StreamEntry { id, fields });
    }
    Ok(entries)
}

/// Parses an `XPENDING stream group - + count` summary reply:
/// `[[id, consumer, idle_ms, delivery_count], ...]`.
fn parse_xpending_value(raw: redis::Value) -> Result<Vec<PendingEntry>, BusError> {
    let items = match raw {
        redis::Value::Array(items) => items,
        redis::Value::Nil => return Ok(vec![]),
        _ => return Ok(vec![]),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let parts = match item {
            redis::Value::Array(p) => p,
            _ => continue,
        };
        if parts.len() != 4 {
            continue;
        }
        let id = value_to_string(&parts[0]).unwrap_or_default();
        let consumer = value_to_string(&parts[1]).unwrap_or_default();
        let idle_ms = value_to_string(&parts[2]).and_then(|v| v.parse().ok()).unwrap_or(0);
        let delivery_count = value_to_string(&parts[3]).and_then(|v| v.parse().ok()).unwrap_or(0);
        out.push(PendingEntry { id, consumer, idle_ms, delivery_count });
    }
    Ok(out)
}
