use tokio::sync::broadcast;

/// Fired once per read call that delivered at least one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRead {
    pub entry_id: u32,
    /// Bytes delivered by this call.
    pub bytes_read: usize,
    /// Stream position after the call.
    pub position: u64,
    pub length: u64,
}

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast of data-read events. Clones share one channel.
///
/// Sending never fails a read: with no subscribers the event is dropped,
/// and a lagging subscriber skips what it missed.
#[derive(Debug, Clone)]
pub struct DataReadEvents {
    tx: broadcast::Sender<DataRead>,
}

impl DataReadEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataRead> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: DataRead) {
        let _ = self.tx.send(event);
    }
}

impl Default for DataReadEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
