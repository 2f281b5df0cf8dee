use std::collections::HashMap;

/// A single entry read back from a stream: the bus-assigned id plus its
/// field map. Mirrors `QueueMessage` from the teacher's queue crate, adapted
/// to the bus's flat string-field stream model (§3/§4.1) instead of SQS's
/// opaque body + receipt handle.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

impl StreamEntry {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }
}

/// Messages read for one stream during a `group_read` call, keyed by stream
/// name as the bus itself returns (`XREADGROUP` can read several streams at
/// once; this pipeline only ever reads one per worker, but the shape is kept
/// general to match the underlying operation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRead {
    pub stream: String,
    pub entries: Vec<StreamEntry>,
}

/// Snapshot used by the drain predicate (§4.7, §8): `last_generated_id` is
/// the stream's own high-water mark, `last_delivered_id` and `pending` come
/// from `XINFO GROUPS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGroupInfo {
    pub last_generated_id: String,
    pub last_delivered_id: String,
    pub pending: u64,
}

impl StreamGroupInfo {
    /// `last_generated_id == last_delivered_id AND pending == 0` (§4.7, §8).
    pub fn is_drained(&self) -> bool {
        self.last_generated_id == self.last_delivered_id && self.pending == 0
    }
}

/// One previously-delivered, unacknowledged entry (`XPENDING` row), used by
/// the worker loop's startup reclaim path (§4.2 step 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: String,
    pub consumer: String,
    pub idle_ms: u64,
    pub delivery_count: u64,
}
