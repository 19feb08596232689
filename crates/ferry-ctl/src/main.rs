//! ferry-ctl — stream a local file through the loopback host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::AsyncWrite;
use tokio::sync::broadcast::error::RecvError;

use ferry_core::config::FerryConfig;
use ferry_core::size::format_size;
use ferry_core::TransferMode;
use ferry_stream::{DataRead, FileInput, MemoryHost};

const ELEMENT_ID: &str = "ferry-ctl";

// ── Options ───────────────────────────────────────────────────────────────────

struct ReadOptions<'a> {
    file: &'a str,
    out: Option<&'a str>,
    mode: Option<TransferMode>,
    latency: Duration,
}

fn parse_read_options<'a>(args: &[&'a str]) -> Result<ReadOptions<'a>> {
    let mut file = None;
    let mut options = ReadOptions {
        file: "",
        out: None,
        mode: None,
        latency: Duration::ZERO,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--out" => {
                i += 1;
                options.out = Some(args.get(i).copied().context("--out requires a path")?);
            }
            "--mode" => {
                i += 1;
                let value = args.get(i).context("--mode requires a value")?;
                options.mode = Some(value.parse().context("invalid --mode")?);
            }
            "--latency-ms" => {
                i += 1;
                let ms: u64 = args
                    .get(i)
                    .context("--latency-ms requires a value")?
                    .parse()
                    .context("--latency-ms must be a number")?;
                options.latency = Duration::from_millis(ms);
            }
            other if file.is_none() => file = Some(other),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
        i += 1;
    }

    options.file = file.context("read requires a file")?;
    Ok(options)
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_read(config: FerryConfig, options: ReadOptions<'_>) -> Result<()> {
    let data = tokio::fs::read(options.file)
        .await
        .with_context(|| format!("failed to read {}", options.file))?;
    let name = std::path::Path::new(options.file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| options.file.to_string());

    let memory = Arc::new(MemoryHost::new().with_latency(options.latency));
    memory.select(&name, "application/octet-stream", data);

    let mut stream_config = config.stream;
    if let Some(mode) = options.mode {
        stream_config.transfer_mode = mode;
    }
    let input = FileInput::new(memory.host(ELEMENT_ID, true), stream_config)
        .context("invalid stream configuration")?;
    let mut entries = input
        .entries_from_notification(&memory.notification())
        .context("host notification rejected")?;
    let mut entry = entries.pop().context("host reported no entries")?;

    let progress = tokio::spawn(log_progress(entry.subscribe()));

    let mut writer: Box<dyn AsyncWrite + Unpin + Send> = match options.out {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {path}"))?,
        ),
        None => Box::new(tokio::io::sink()),
    };

    let started = Instant::now();
    let stream = entry.data(&input).context("failed to open stream")?;
    let capability = stream.capability();
    let copied = stream
        .copy_to(&mut *writer)
        .await
        .context("stream copy failed")?;
    let elapsed = started.elapsed();

    drop(entry);
    let _ = progress.await;

    let stats = memory.stats();
    let throughput = copied as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!("═══════════════════════════════════════");
    println!("  {name}");
    println!("═══════════════════════════════════════");
    println!("  Strategy        : {capability}");
    println!("  Bytes           : {} ({copied})", format_size(copied));
    println!("  Chunk fetches   : {}", stats.fetches);
    println!("  Peak in flight  : {}", stats.max_in_flight);
    println!("  Direct calls    : {}", stats.direct_calls);
    println!("  Elapsed         : {:.3}s", elapsed.as_secs_f64());
    println!("  Throughput      : {}/s", format_size(throughput as u64));
    if let Some(path) = options.out {
        println!("  Written to      : {path}");
    }

    Ok(())
}

/// Log roughly every tenth of the payload until the entry goes away.
async fn log_progress(mut rx: tokio::sync::broadcast::Receiver<DataRead>) {
    let mut next_mark = 0u64;
    loop {
        match rx.recv().await {
            Ok(event) => {
                if event.position >= next_mark || event.position == event.length {
                    tracing::info!(
                        entry_id = event.entry_id,
                        read = %format_size(event.position),
                        total = %format_size(event.length),
                        "progress"
                    );
                    next_mark = event.position + (event.length / 10).max(1);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress events skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn cmd_config(config: &FerryConfig) -> Result<()> {
    println!("# {}", FerryConfig::file_path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = FerryConfig::write_default_if_missing()?;
    println!("Config file: {}", path.display());
    Ok(())
}

fn print_usage() {
    println!("Usage: ferry-ctl <command>");
    println!();
    println!("Commands:");
    println!("  read <file>   Stream a file through the loopback host");
    println!("  config        Show the effective configuration");
    println!("  config init   Write the default config file if missing");
    println!();
    println!("Read options:");
    println!("  --out <path>          Write the streamed bytes to a file");
    println!("  --mode <mode>         auto, chunked or direct (default: from config)");
    println!("  --latency-ms <n>      Simulated round trip per chunk fetch (default: 0)");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["read", rest @ ..] => {
            let options = parse_read_options(rest)?;
            let config = FerryConfig::load().context("failed to load config")?;
            cmd_read(config, options).await
        }
        ["config"] => cmd_config(&FerryConfig::load().context("failed to load config")?),
        ["config", "init"] => cmd_config_init(),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
