//! MeshCache Daemon - serves a cache group over RESP and shards it across peers

mod client;
mod handler;
mod resp;
mod source;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::BytesMut;
use clap::Parser;
use meshcache::{PeerGetter, Registry, RingPicker, DEFAULT_REPLICAS};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::client::RespPeer;
use crate::handler::CommandHandler;
use crate::resp::Frame;
use crate::source::JsonSource;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1:7001")]
    bind: String,

    /// Address peers use to reach this node (defaults to --bind)
    #[arg(long)]
    advertise: Option<String>,

    /// Comma-separated addresses of every node in the cluster, this one included
    #[arg(short, long, value_delimiter = ',')]
    peers: Vec<String>,

    /// Cache group served by this node
    #[arg(short, long, default_value = "scores")]
    group: String,

    /// Cache capacity in bytes (0 = unbounded)
    #[arg(short, long, default_value_t = 64 << 20)]
    capacity: usize,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// JSON object file the loader reads values from
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Peer connect/read timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    peer_timeout_ms: u64,

    /// Health check mode (for Docker)
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.health {
        match TcpStream::connect(&args.bind).await {
            Ok(_) => {
                println!("OK");
                std::process::exit(0);
            }
            Err(_) => {
                eprintln!("FAILED");
                std::process::exit(1);
            }
        }
    }

    info!("Starting MeshCache Daemon v{}", env!("CARGO_PKG_VERSION"));

    let source = match &args.source {
        Some(path) => JsonSource::open(path)?,
        None => {
            warn!("No --source given; every local load will fail");
            JsonSource::default()
        }
    };
    info!("Source holds {} keys", source.len());

    let registry = Arc::new(Registry::new());
    let group = registry.create_group(args.group.clone(), args.capacity, source);

    let self_id = args.advertise.clone().unwrap_or_else(|| args.bind.clone());
    if !args.peers.is_empty() {
        let picker = Arc::new(ring_picker(
            &self_id,
            args.replicas,
            Duration::from_millis(args.peer_timeout_ms),
        ));
        picker.set(args.peers.iter().cloned());
        group
            .register_peers(picker)
            .context("registering peer picker")?;
        info!("Peers: {}", args.peers.join(", "));
    }

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║          MeshCache Node Ready!                               ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("   Listening:   {}", args.bind);
    println!("   Node id:     {}", self_id);
    println!("   Group:       {} ({} bytes)", args.group, args.capacity);
    println!(
        "   Cluster:     {}",
        if args.peers.is_empty() {
            "standalone".to_string()
        } else {
            format!("{} nodes, {} replicas each", args.peers.len(), args.replicas)
        }
    );
    println!(
        "   Try:         redis-cli -h {} -p {} GET {} <key>",
        args.bind.split(':').next().unwrap_or("127.0.0.1"),
        args.bind.split(':').nth(1).unwrap_or("7001"),
        args.group
    );
    println!("\n🛑 Press Ctrl+C to stop\n");

    serve(listener, CommandHandler::new(registry)).await
}

/// Ring picker reaching remote peers over RESP
fn ring_picker(self_id: &str, replicas: usize, timeout: Duration) -> RingPicker {
    RingPicker::new(self_id, replicas, move |peer: &str| -> Arc<dyn PeerGetter> {
        Arc::new(RespPeer::new(peer, timeout))
    })
}

async fn serve(listener: TcpListener, handler: CommandHandler) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let handler = handler.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, handler).await {
                        error!("Error handling client {}: {}", addr, e);
                    }
                    info!("Connection closed: {}", addr);
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, handler: CommandHandler) -> Result<()> {
    let mut buffer = BytesMut::with_capacity(4096);
    let mut out = BytesMut::with_capacity(4096);

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }

        loop {
            match Frame::decode(&mut buffer) {
                Ok(Some(cmd)) => {
                    // Lookups may block on a load or a peer round trip
                    let handler = handler.clone();
                    let response = tokio::task::spawn_blocking(move || handler.handle(cmd)).await?;
                    response.encode(&mut out);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Parse error: {}", e);
                    Frame::err(e).encode(&mut out);
                    buffer.clear();
                    break;
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
            out.clear();
        }
    }
}
