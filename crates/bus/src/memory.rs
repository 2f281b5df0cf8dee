use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::bus::Bus;
use crate::error::BusError;
use crate::message::{PendingEntry, StreamEntry, StreamGroupInfo, StreamRead};

struct Group {
    last_delivered_offset: usize,
    pending: HashMap<String, (String, u64)>, // id -> (consumer, delivery_count)
}

struct MemoryStream {
    entries: Vec<StreamEntry>,
    groups: HashMap<String, Group>,
    seq: u64,
}

/// In-memory `Bus` double, the testing counterpart to `RedisBus`. Grounded
/// in the teacher's `MockNotifier` style (in-process state behind a mutex,
/// no network), generalized to the richer stream/consumer-group surface
/// this pipeline's workers depend on.
#[derive(Default)]
pub struct MemoryBus {
    sets: Mutex<HashMap<String, HashSet<String>>>,
    kv: Mutex<HashMap<String, String>>,
    streams: Mutex<HashMap<String, MemoryStream>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(seq: &mut u64) -> String {
    *seq += 1;
    format!("{}-0", seq)
}

#[async_trait]
impl Bus for MemoryBus {
    async fn is_member(&self, set: &str, value: &str) -> Result<bool, BusError> {
        Ok(self.sets.lock().unwrap().get(set).is_some_and(|s| s.contains(value)))
    }

    async fn add_member(&self, set: &str, value: &str) -> Result<(), BusError> {
        self.sets.lock().unwrap().entry(set.to_string()).or_default().insert(value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BusError> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), BusError> {
        // TTL expiry is not simulated; tests that need expiry assert on the
        // presence/absence contract directly rather than waiting it out.
        self.kv.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn append(&self, stream: &str, fields: &HashMap<String, String>, max_len: u64) -> Result<String, BusError> {
        let mut streams = self.streams.lock().unwrap();
        let s = streams.entry(stream.to_string()).or_insert_with(|| MemoryStream {
            entries: vec![],
            groups: HashMap::new(),
            seq: 0,
        });
        let id = next_id(&mut s.seq);
        s.entries.push(StreamEntry { id: id.clone(), fields: fields.clone() });
        let max_len = max_len as usize;
        if s.entries.len() > max_len {
            let drop = s.entries.len() - max_len;
            s.entries.drain(0..drop);
        }
        Ok(id)
    }

    async fn group_create(&self, stream: &str, group: &str, _start_id: &str) -> Result<(), BusError> {
        let mut streams = self.streams.lock().unwrap();
        let s = streams.entry(stream.to_string()).or_insert_with(|| MemoryStream {
            entries: vec![],
            groups: HashMap::new(),
            seq: 0,
        });
        s.groups.entry(group.to_string()).or_insert_with(|| Group {
            last_delivered_offset: 0,
            pending: HashMap::new(),
        });
        Ok(())
    }

    async fn group_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        _block_ms: u64,
    ) -> Result<StreamRead, BusError> {
        let mut streams = self.streams.lock().unwrap();
        let s = streams.get_mut(stream).ok_or_else(|| BusError::NotFound(stream.to_string()))?;
        let g = s.groups.get_mut(group).ok_or_else(|| BusError::GroupNotFound(group.to_string()))?;
        let available = &s.entries[g.last_delivered_offset.min(s.entries.len())..];
        let take = available.iter().take(count).cloned().collect::<Vec<_>>();
        for entry in &take {
            g.pending.insert(entry.id.clone(), (consumer.to_string(), 1));
        }
        g.last_delivered_offset += take.len();
        Ok(StreamRead { stream: stream.to_string(), entries: take })
    }

    async fn pending(&self, stream: &str, group: &str, count: usize) -> Result<Vec<PendingEntry>, BusError> {
        let streams = self.streams.lock().unwrap();
        let s = streams.get(stream).ok_or_else(|| BusError::NotFound(stream.to_string()))?;
        let g = s.groups.get(group).ok_or_else(|| BusError::GroupNotFound(group.to_string()))?;
        let mut out: Vec<PendingEntry> = g
            .pending
            .iter()
            .map(|(id, (consumer, count))| PendingEntry {
                id: id.clone(),
                consumer: consumer.clone(),
                idle_ms: 0,
                delivery_count: *count,
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out.truncate(count);
        Ok(out)
    }

    async fn range(&self, stream: &str, _from: &str, _to: &str, count: usize) -> Result<Vec<StreamEntry>, BusError> {
        let streams = self.streams.lock().unwrap();
        let s = streams.get(stream).ok_or_else(|| BusError::NotFound(stream.to_string()))?;
        Ok(s.entries.iter().take(count).cloned().collect())
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), BusError> {
        let mut streams = self.streams.lock().unwrap();
        let s = streams.get_mut(stream).ok_or_else(|| BusError::NotFound(stream.to_string()))?;
        let g = s.groups.get_mut(group).ok_or_else(|| BusError::GroupNotFound(group.to_string()))?;
        g.pending.remove(id);
        Ok(())
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        ids: &[String],
    ) -> Result<Vec<StreamEntry>, BusError> {
        let mut streams = self.streams.lock().unwrap();
        let s = streams.get_mut(stream).ok_or_else(|| BusError::NotFound(stream.to_string()))?;
        let g = s.groups.get_mut(group).ok_or_else(|| BusError::GroupNotFound(group.to_string()))?;
        let mut out = vec![];
        for id in ids {
            if let Some(entry) = s.entries.iter().find(|e| &e.id == id) {
                out.push(entry.clone());
            }
            if let Some((owner, count)) = g.pending.get_mut(id) {
                *owner = consumer.to_string();
                *count += 1;
            }
        }
        Ok(out)
    }

    async fn group_info(&self, stream: &str, group: &str) -> Result<Option<StreamGroupInfo>, BusError> {
        let streams = self.streams.lock().unwrap();
        let Some(s) = streams.get(stream) else { return Ok(None) };
        let Some(g) = s.groups.get(group) else { return Ok(None) };
        let last_generated_id = s.entries.last().map(|e| e.id.clone()).unwrap_or_else(|| "0-0".to_string());
        let last_delivered_id = if g.last_delivered_offset == 0 {
            "0-0".to_string()
        } else {
            s.entries[g.last_delivered_offset - 1].id.clone()
        };
        Ok(Some(StreamGroupInfo {
            last_generated_id,
            last_delivered_id,
            pending: g.pending.len() as u64,
        }))
    }

    async fn ping(&self) -> Result<(), BusError> {
        Ok(())
    }
}
