//! Entry point for `arq-over-tcp`.
//!
//! Parses CLI arguments and dispatches into either **server** (receiver) or
//! **client** (sender) mode.  All protocol work is delegated to library
//! modules; `main.rs` owns only process setup (logging, argument parsing,
//! the TCP listener and the stdin loop).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use arq_over_tcp::fragment::FRAGMENT_SIZE;
use arq_over_tcp::session::{MAX_MESSAGE_LEN, MAX_WINDOW, MIN_MESSAGE_LEN};
use arq_over_tcp::{ArqReceiver, ArqSender, FaultPlan, Mode, SenderOptions, TimerConfig};

/// Sliding-window ARQ (Go-Back-N / Selective Repeat) over TCP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Receive messages, printing each one as it completes.
    Server {
        /// Local address to bind.
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        bind: String,
        /// Window advertised during the handshake (clamped to 1..=5).
        #[arg(short, long, default_value_t = MAX_WINDOW)]
        window: u8,
        /// Sequences whose first arrival is ignored.
        #[arg(long, value_delimiter = ',')]
        drop: Vec<u16>,
        /// Sequences whose first arrival is treated as corrupted.
        #[arg(long, value_delimiter = ',')]
        corrupt: Vec<u16>,
        /// Delayed replies as `SEQ:MILLIS`, comma separated.
        #[arg(long, value_delimiter = ',', value_parser = parse_delay)]
        delay_ack: Vec<(u16, Duration)>,
    },
    /// Send each line typed on stdin as one message; an empty line quits.
    Client {
        /// Server address.
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        server: String,
        /// `GBN` or `SR`.
        #[arg(short, long, default_value = "GBN")]
        mode: Mode,
        /// Shortest accepted message, in bytes.
        #[arg(long, default_value_t = 30)]
        min: u16,
        /// Longest accepted message, in bytes (at most 99).
        #[arg(long, default_value_t = 50)]
        max: u16,
        /// Sequences whose first transmission is not sent.
        #[arg(long, value_delimiter = ',')]
        drop: Vec<u16>,
        /// Sequences whose first transmission has a payload bit flipped.
        #[arg(long, value_delimiter = ',')]
        corrupt: Vec<u16>,
        /// Sequences whose first transmission is sent twice.
        #[arg(long, value_delimiter = ',')]
        duplicate: Vec<u16>,
        /// Probability of disturbing each sequence (drop, corrupt or duplicate).
        #[arg(long)]
        random_faults: Option<f64>,
        /// Seed for `--random-faults`.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Retransmission timeout in milliseconds.
        #[arg(long = "rto", default_value_t = 1000)]
        rto_ms: u64,
    },
}

fn parse_delay(s: &str) -> Result<(u16, Duration), String> {
    let (seq, ms) = s
        .split_once(':')
        .ok_or_else(|| format!("expected SEQ:MILLIS, got {s:?}"))?;
    let seq = seq.parse::<u16>().map_err(|e| format!("bad sequence {seq:?}: {e}"))?;
    let ms = ms.parse::<u64>().map_err(|e| format!("bad delay {ms:?}: {e}"))?;
    Ok((seq, Duration::from_millis(ms)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.role {
        Role::Server {
            bind,
            window,
            drop,
            corrupt,
            delay_ack,
        } => {
            let faults = FaultPlan {
                drop: drop.into_iter().collect(),
                corrupt: corrupt.into_iter().collect(),
                duplicate: BTreeSet::new(),
                delay_ack: delay_ack.into_iter().collect::<BTreeMap<_, _>>(),
            };
            run_server(&bind, window, faults).await
        }
        Role::Client {
            server,
            mode,
            min,
            max,
            drop,
            corrupt,
            duplicate,
            random_faults,
            seed,
            rto_ms,
        } => {
            if min < MIN_MESSAGE_LEN || max > MAX_MESSAGE_LEN || min > max {
                bail!(
                    "length range {min}..={max} must satisfy \
                     {MIN_MESSAGE_LEN} <= min <= max <= {MAX_MESSAGE_LEN}"
                );
            }
            let mut faults = match random_faults {
                Some(rate) => {
                    let fragments = MAX_MESSAGE_LEN.div_ceil(FRAGMENT_SIZE as u16);
                    FaultPlan::sampled(seed, rate, fragments)
                }
                None => FaultPlan::default(),
            };
            faults.drop.extend(drop);
            faults.corrupt.extend(corrupt);
            faults.duplicate.extend(duplicate);
            if !faults.is_empty() {
                log::info!("client fault plan: {faults:?}");
            }

            let options = SenderOptions {
                mode,
                min_len: min,
                max_len: max,
                timers: TimerConfig::with_rto(Duration::from_millis(rto_ms)),
                faults,
            };
            run_client(&server, options).await
        }
    }
}

async fn run_server(bind: &str, window: u8, faults: FaultPlan) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    log::info!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("Connection from {peer}");

        let mut receiver = match ArqReceiver::accept(stream, window, faults.clone()).await {
            Ok(receiver) => receiver,
            Err(e) => {
                log::error!("handshake with {peer} failed: {e}");
                continue;
            }
        };

        loop {
            match receiver.recv_message().await {
                Ok(Some(message)) => match message.text() {
                    Some(text) => println!("{text}"),
                    None => println!("{:?}", message.payload),
                },
                Ok(None) => {
                    log::info!("{peer} closed the session");
                    break;
                }
                Err(e) => {
                    log::error!("session with {peer} aborted: {e}");
                    break;
                }
            }
        }
    }
}

async fn run_client(server: &str, options: SenderOptions) -> Result<()> {
    let stream = TcpStream::connect(server)
        .await
        .with_context(|| format!("connecting to {server}"))?;
    stream.set_nodelay(true)?;

    let mut sender = ArqSender::connect(stream, options)
        .await
        .context("handshake failed")?;
    let config = *sender.config();
    println!(
        "Connected: mode={} window={} length={}..={}",
        config.mode, config.window_size, config.min_len, config.max_len
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            break;
        }
        match sender.send_message(line.as_bytes()).await {
            Ok(report) => println!(
                "Delivered {} fragment(s): {} written, {} retransmitted, {} NACK(s)",
                report.fragments,
                report.frames_written,
                report.retransmitted.len(),
                report.nacks
            ),
            Err(e) if !e.is_fatal() => eprintln!("Rejected: {e}"),
            Err(e) => return Err(e.into()),
        }
    }

    sender.close().await?;
    Ok(())
}
