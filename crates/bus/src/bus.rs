use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::BusError;
use crate::message::{PendingEntry, StreamEntry, StreamGroupInfo, StreamRead};

/// Typed operations over the message bus (§4.1): connection handling is the
/// adapter's concern, this trait is the narrow surface every worker stage
/// consumes. Grounded in the teacher's `QueueConsumer` trait shape
/// (poll/ack/health), generalized here to Redis Streams' richer
/// consumer-group primitives since this pipeline needs replay and drain
/// detection that a plain at-least-once SQS-style queue does not expose.
#[async_trait]
pub trait Bus: Send + Sync {
    /// `member?(set, value)`.
    async fn is_member(&self, set: &str, value: &str) -> Result<bool, BusError>;

    /// `add(set, value)`.
    async fn add_member(&self, set: &str, value: &str) -> Result<(), BusError>;

    /// `get(key)`.
    async fn get(&self, key: &str) -> Result<Option<String>, BusError>;

    /// `set(key, value, ttl)`. `ttl` of `None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<std::time::Duration>) -> Result<(), BusError>;

    /// `append(stream, fields, max_len, approx)`. Returns the assigned id.
    async fn append(
        &self,
        stream: &str,
        fields: &HashMap<String, String>,
        max_len: u64,
    ) -> Result<String, BusError>;

    /// `group_create(stream, group, start_id, make_stream)`. Idempotent:
    /// `BUSYGROUP` (group already exists) is treated as success.
    async fn group_create(&self, stream: &str, group: &str, start_id: &str) -> Result<(), BusError>;

    /// `group_read(group, consumer, {stream: ">"}, count, block_ms)`.
    async fn group_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<StreamRead, BusError>;

    /// `pending(stream, group, "-", "+", count)`.
    async fn pending(&self, stream: &str, group: &str, count: usize) -> Result<Vec<PendingEntry>, BusError>;

    /// `range(stream, from, to, count)` — fetch entries by id, used by the
    /// reclaim path to re-read a pending entry's payload.
    async fn range(&self, stream: &str, from: &str, to: &str, count: usize) -> Result<Vec<StreamEntry>, BusError>;

    /// `ack(stream, group, id)`.
    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), BusError>;

    /// Claim pending entries for `consumer`, used during reclaim so a
    /// restarted worker owns the entries it is about to reprocess.
    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        ids: &[String],
    ) -> Result<Vec<StreamEntry>, BusError>;

    /// Stream/group info for the drain predicate (§4.7, §8). Returns `None`
    /// if the stream or group does not exist (treated as drained by
    /// callers).
    async fn group_info(&self, stream: &str, group: &str) -> Result<Option<StreamGroupInfo>, BusError>;

    /// Cheap reachability check for health endpoints (§6).
    async fn ping(&self) -> Result<(), BusError>;
}
