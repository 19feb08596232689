//! Direct-memory strategy end to end.

use std::sync::Arc;

use ferry_core::TransferMode;
use ferry_stream::{Capability, MemoryHost};

use crate::*;

#[tokio::test]
async fn test_whole_payload_in_one_call() -> Result<()> {
    let memory = Arc::new(MemoryHost::new());
    let data = payload(500_000);
    let (input, mut entry) = select(
        &memory,
        data.clone(),
        config(20 * 1024, 1024 * 1024, TransferMode::Auto),
        true,
    )?;
    let mut rx = entry.subscribe();
    let stream = entry.data(&input)?;
    assert_eq!(stream.capability(), Capability::DirectMemory);

    let mut buf = vec![0u8; 500_000];
    assert_eq!(stream.position(), 0);
    let n = stream.read(&mut buf).await?;
    assert_eq!(n, 500_000);
    assert_eq!(stream.position(), 500_000);
    assert!(buf == data);

    let stats = memory.stats();
    assert_eq!(stats.direct_calls, 1);
    assert_eq!(stats.resident_calls, 1);
    assert_eq!(stats.fetches, 0);

    let event = rx.try_recv()?;
    assert_eq!((event.bytes_read, event.position), (500_000, 500_000));
    Ok(())
}

#[tokio::test]
async fn test_short_reads_continue_from_position() -> Result<()> {
    let memory = Arc::new(MemoryHost::new());
    let data = payload(10_000);
    let (input, mut entry) = select(
        &memory,
        data.clone(),
        config(1000, 2000, TransferMode::Direct),
        true,
    )?;
    let stream = entry.data(&input)?;

    let out = drain(stream, 3333).await?;
    assert!(out == data);

    let stats = memory.stats();
    assert_eq!(stats.direct_calls, 4);
    assert_eq!(stats.resident_calls, 1);
    Ok(())
}

#[tokio::test]
async fn test_read_into_offset() -> Result<()> {
    let memory = Arc::new(MemoryHost::new());
    let (input, mut entry) = select(
        &memory,
        b"direct".to_vec(),
        config(1000, 2000, TransferMode::Direct),
        true,
    )?;
    let stream = entry.data(&input)?;

    let mut buf = [b'-'; 10];
    assert_eq!(stream.read_into(&mut buf, 3, 4, None).await?, 4);
    assert_eq!(&buf, b"---dire---");
    assert_eq!(stream.read_into(&mut buf, 0, 10, None).await?, 2);
    assert_eq!(&buf[..2], b"ct");
    Ok(())
}

#[tokio::test]
async fn test_read_all_and_copy_to() -> Result<()> {
    let memory = Arc::new(MemoryHost::new());
    let data = payload(70_000);
    let (input, mut entry) = select(
        &memory,
        data.clone(),
        config(1000, 2000, TransferMode::Direct),
        true,
    )?;
    let all = entry.read_all(&input).await?;
    assert!(all[..] == data[..]);

    // A second entry copied to a writer instead.
    let (input, mut entry) = select(
        &memory,
        data.clone(),
        config(1000, 2000, TransferMode::Direct),
        true,
    )?;
    let mut sink = Vec::new();
    let copied = entry.data(&input)?.copy_to(&mut sink).await?;
    assert_eq!(copied, 70_000);
    assert!(sink == data);
    Ok(())
}
