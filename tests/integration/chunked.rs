//! Chunked strategy end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ferry_core::entry::{chunk_count, chunk_span};
use ferry_core::{ChannelError, RemoteEntry, TransferMode};
use ferry_stream::{CapabilitySelector, DataReadEvents, Host, MemoryHost, RemoteChannel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::*;

#[tokio::test]
async fn test_small_payload_in_three_chunks() -> Result<()> {
    let memory = Arc::new(MemoryHost::new().with_latency(Duration::from_millis(20)));
    let data = payload(2500);
    let (input, mut entry) = select(
        &memory,
        data.clone(),
        config(1000, 2000, TransferMode::Chunked),
        false,
    )?;

    assert_eq!(chunk_count(2500, 1000), 3);
    let lengths: Vec<usize> = (0..3).map(|i| chunk_span(2500, i, 1000).1).collect();
    assert_eq!(lengths, vec![1000, 1000, 500]);

    let stream = entry.data(&input)?;
    let out = drain(stream, 2500).await?;
    assert_eq!(out, data);
    assert_eq!(stream.position(), 2500);

    let stats = memory.stats();
    assert_eq!(stats.fetches, 3);
    assert!(stats.max_in_flight <= 2, "window exceeded: {}", stats.max_in_flight);
    Ok(())
}

#[tokio::test]
async fn test_arbitrary_read_sizes_reconstruct_the_payload() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x0f_e2_2a);

    for (size, message, buffer) in [
        (0usize, 1000usize, 3000usize),
        (1, 1000, 3000),
        (999, 1000, 3000),
        (1000, 1000, 3000),
        (1001, 1000, 3000),
        (50_000, 1000, 3000),
        (50_000, 4096, 1024),
        (77_777, 3, 30),
    ] {
        let memory = Arc::new(MemoryHost::new());
        let data = payload(size);
        let (input, mut entry) = select(
            &memory,
            data.clone(),
            config(message, buffer, TransferMode::Chunked),
            false,
        )?;
        let stream = entry.data(&input)?;

        let mut out = Vec::with_capacity(size);
        let mut buf = vec![0u8; 3000];
        loop {
            let want = rng.gen_range(1..=buf.len());
            let n = stream.read(&mut buf[..want]).await?;
            assert!(n <= want);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out.len(), size, "size {size}, chunk {message}");
        assert!(out == data, "payload mismatch: size {size}, chunk {message}");
        assert_eq!(memory.stats().fetches as u64, chunk_count(size as u64, message));
        assert!(memory.stats().max_in_flight <= (buffer / message).max(1));
    }
    Ok(())
}

#[tokio::test]
async fn test_read_at_end_issues_no_fetch() -> Result<()> {
    let memory = Arc::new(MemoryHost::new());
    let (input, mut entry) = select(
        &memory,
        payload(4000),
        config(1000, 4000, TransferMode::Chunked),
        false,
    )?;
    let stream = entry.data(&input)?;
    drain(stream, 1024).await?;
    let fetches = memory.stats().fetches;
    assert_eq!(fetches, 4);

    let mut buf = [0u8; 16];
    assert_eq!(stream.read(&mut buf).await?, 0);
    assert_eq!(stream.read(&mut buf).await?, 0);
    assert_eq!(memory.stats().fetches, fetches);
    Ok(())
}

#[tokio::test]
async fn test_one_event_per_productive_read() -> Result<()> {
    let memory = Arc::new(MemoryHost::new());
    let (input, mut entry) = select(
        &memory,
        payload(10_000),
        config(1000, 3000, TransferMode::Chunked),
        false,
    )?;
    let mut rx = entry.subscribe();
    let stream = entry.data(&input)?;

    let mut reads = Vec::new();
    let mut buf = [0u8; 1500];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        reads.push((n, stream.position()));
    }

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.length, 10_000);
        events.push((event.bytes_read, event.position));
    }
    assert_eq!(events, reads);
    Ok(())
}

/// Serves every chunk, later ones sooner than earlier ones.
struct Reversed {
    data: Vec<u8>,
    chunk: usize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl RemoteChannel for Reversed {
    async fn read_file_data(
        &self,
        _entry_id: u32,
        source_offset: u64,
        count: usize,
    ) -> Result<String, ChannelError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let index = source_offset as usize / self.chunk;
        let chunks = self.data.len().div_ceil(self.chunk);
        tokio::time::sleep(Duration::from_millis(5 * (chunks - index) as u64)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let start = source_offset as usize;
        Ok(STANDARD.encode(&self.data[start..start + count]))
    }
}

#[tokio::test]
async fn test_out_of_order_completion_is_delivered_in_order() -> Result<()> {
    let data = payload(8 * 500);
    let channel = Arc::new(Reversed {
        data: data.clone(),
        chunk: 500,
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let entry = RemoteEntry {
        id: 1,
        name: "reversed.bin".into(),
        size: data.len() as u64,
        content_type: String::new(),
        last_modified: None,
    };

    let selector = CapabilitySelector::new(Host::new(ELEMENT_ID, channel.clone()));
    let mut stream = selector.open(
        &entry,
        &config(500, 2000, TransferMode::Auto),
        DataReadEvents::default(),
    )?;
    let out = drain(&mut stream, 700).await?;

    assert!(out == data, "chunks were spliced out of order");
    assert!(channel.max_in_flight.load(Ordering::SeqCst) <= 4);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_keeps_the_stream_consistent() -> Result<()> {
    let memory = Arc::new(MemoryHost::new().with_latency(Duration::from_millis(200)));
    let data = payload(3000);
    let (input, mut entry) = select(
        &memory,
        data.clone(),
        config(1000, 2000, TransferMode::Chunked),
        false,
    )?;
    let stream = entry.data(&input)?;

    let token = tokio_util::sync::CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let mut buf = [0u8; 1000];
    let err = stream.read_cancellable(&mut buf, &token).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(stream.position(), 0);
    assert!(!stream.is_failed());

    // Nothing was lost: the next read starts at byte 0.
    let out = drain(stream, 1000).await?;
    assert!(out == data);
    assert_eq!(memory.stats().fetches, 3);
    Ok(())
}
