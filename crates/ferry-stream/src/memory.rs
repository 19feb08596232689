//! Loopback host serving payloads from memory.
//!
//! Implements both host capabilities over `Bytes` buffers so streams can be
//! driven without a browser: the CLI streams local files through it and the
//! tests use it to observe fetch concurrency. An optional per-fetch latency
//! simulates the round trip of a real channel.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use ferry_core::{ChannelError, RemoteEntry};

use crate::host::{DirectMemory, Host, ReadRequest, RemoteChannel};

#[derive(Default)]
pub struct MemoryHost {
    entries: RwLock<HashMap<u32, (RemoteEntry, Bytes)>>,
    next_id: AtomicU32,
    latency: Duration,
    resident: Mutex<HashSet<u32>>,
    stats: HostCounters,
}

#[derive(Default)]
struct HostCounters {
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    resident_calls: AtomicUsize,
    direct_calls: AtomicUsize,
}

/// Snapshot of what the host has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    pub fetches: usize,
    pub max_in_flight: usize,
    pub resident_calls: usize,
    pub direct_calls: usize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every channel fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add a payload to the selection and return its descriptor.
    pub fn select(&self, name: &str, content_type: &str, data: impl Into<Bytes>) -> RemoteEntry {
        let data = data.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = RemoteEntry {
            id,
            name: name.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            last_modified: None,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (entry.clone(), data));
        entry
    }

    /// The change notification a browser host would send for the current
    /// selection, ordered by id.
    pub fn notification(&self) -> String {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<&RemoteEntry> = entries.values().map(|(entry, _)| entry).collect();
        list.sort_by_key(|entry| entry.id);
        serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string())
    }

    /// A host handle backed by this loopback. `direct` attaches the
    /// direct-memory capability as well as the channel.
    pub fn host(self: &Arc<Self>, element_id: &str, direct: bool) -> Host {
        let host = Host::new(element_id, self.clone() as Arc<dyn RemoteChannel>);
        if direct {
            host.with_direct_memory(self.clone() as Arc<dyn DirectMemory>)
        } else {
            host
        }
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            max_in_flight: self.stats.max_in_flight.load(Ordering::Relaxed),
            resident_calls: self.stats.resident_calls.load(Ordering::Relaxed),
            direct_calls: self.stats.direct_calls.load(Ordering::Relaxed),
        }
    }

    fn payload(&self, entry_id: u32) -> Result<Bytes, ChannelError> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&entry_id)
            .map(|(_, data)| data.clone())
            .ok_or(ChannelError::UnknownEntry(entry_id))
    }
}

/// Decrements the in-flight counter even when the fetch task is dropped.
struct InFlight<'a>(&'a HostCounters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a HostCounters) -> Self {
        counters.fetches.fetch_add(1, Ordering::Relaxed);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteChannel for MemoryHost {
    async fn read_file_data(
        &self,
        entry_id: u32,
        source_offset: u64,
        count: usize,
    ) -> Result<String, ChannelError> {
        let _guard = InFlight::enter(&self.stats);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let data = self.payload(entry_id)?;
        let start = usize::try_from(source_offset)
            .ok()
            .filter(|&start| start <= data.len())
            .ok_or_else(|| {
                ChannelError::Protocol(format!(
                    "offset {source_offset} is past the end of entry {entry_id}"
                ))
            })?;
        let end = start.saturating_add(count).min(data.len());
        Ok(STANDARD.encode(&data[start..end]))
    }
}

#[async_trait]
impl DirectMemory for MemoryHost {
    async fn ensure_resident(&self, entry_id: u32) -> Result<(), ChannelError> {
        self.stats.resident_calls.fetch_add(1, Ordering::Relaxed);
        self.payload(entry_id)?;
        self.resident
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry_id);
        Ok(())
    }

    fn read_shared(&self, request: ReadRequest<'_>) -> Result<usize, ChannelError> {
        self.stats.direct_calls.fetch_add(1, Ordering::Relaxed);
        let entry_id = request.entry_id;
        let resident = self
            .resident
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&entry_id);
        if !resident {
            return Err(ChannelError::Protocol(format!(
                "entry {entry_id} is not resident"
            )));
        }

        let data = self.payload(entry_id)?;
        let start = usize::try_from(request.source_offset)
            .ok()
            .filter(|&start| start <= data.len())
            .ok_or_else(|| {
                ChannelError::Protocol(format!(
                    "offset {} is past the end of entry {entry_id}",
                    request.source_offset
                ))
            })?;
        let count = request.maximum_bytes.min(data.len() - start);
        let destination = request
            .destination
            .get_mut(request.destination_offset..request.destination_offset + count)
            .ok_or_else(|| ChannelError::Protocol("destination buffer too small".into()))?;
        destination.copy_from_slice(&data[start..start + count]);
        Ok(count)
    }
}
