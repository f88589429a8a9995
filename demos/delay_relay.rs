//! Delay relay - relays one transport stream with a fixed delay
//!
//! Run with:
//!   cargo run --example delay_relay -- <type> <source> <delay_secs> <output_type> <output_address> [hls_root]
//!
//! Examples:
//!   # Multicast in, multicast out, 30 seconds behind
//!   cargo run --example delay_relay -- udp 239.1.1.1:5000 30 udp 239.1.1.2:5000
//!
//!   # Multicast in, HLS out under ./hls_output/channel-1
//!   cargo run --example delay_relay -- udp 239.1.1.1:5000 10 hls channel-1
//!
//!   # Pulled HLS in, UDP out
//!   cargo run --example delay_relay -- pulled http://origin/live/playlist.m3u8 5 udp 127.0.0.1:6000
//!
//! ## Feeding a test stream
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.mp4 -c copy -f mpegts "udp://239.1.1.1:5000?pkt_size=1316"
//!
//! ## Watching the output
//!
//! With ffplay:
//!   ffplay udp://239.1.1.2:5000
//!   ffplay hls_output/channel-1/playlist.m3u8

use std::sync::Arc;
use std::time::Duration;

use ts_delay::{RelayConfig, StreamConfig, StreamRegistry};

fn print_usage() {
    eprintln!("Usage: delay_relay <type> <source> <delay_secs> <output_type> <output_address> [hls_root]");
    eprintln!();
    eprintln!("  type            udp | pulled");
    eprintln!("  source          host:port for udp, playlist URL for pulled");
    eprintln!("  delay_secs      delay in seconds (fractions allowed)");
    eprintln!("  output_type     udp | hls");
    eprintln!("  output_address  host:port for udp, directory name for hls");
    eprintln!("  hls_root        parent directory for hls output (default: hls_output)");
}

fn format_bitrate(bps: u64) -> String {
    if bps >= 1_000_000 {
        format!("{:.2} Mbps", bps as f64 / 1_000_000.0)
    } else {
        format!("{:.1} kbps", bps as f64 / 1_000.0)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 6 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let delay_secs: f64 = match args[3].parse() {
        Ok(delay) => delay,
        Err(_) => {
            eprintln!("Error: invalid delay: {}", args[3]);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ts_delay=info".parse()?)
                .add_directive("delay_relay=info".parse()?),
        )
        .init();

    let mut relay_config = RelayConfig::default();
    if let Some(root) = args.get(6) {
        relay_config = relay_config.hls_root(root);
    }

    let config = StreamConfig::from_request(&args[1], &args[2], delay_secs, &args[4], &args[5])?;

    let registry = Arc::new(StreamRegistry::with_config(relay_config));
    let cleanup = registry.spawn_cleanup_task();
    let id = registry.start(config).await?;

    println!("Relaying {} -> {} with {}s delay as {}", args[2], args[5], delay_secs, id);
    println!("Press Ctrl+C to stop");

    let mut stats_ticker = tokio::time::interval(Duration::from_secs(5));
    stats_ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
            _ = stats_ticker.tick() => {
                let Some(info) = registry.get(&id).await else {
                    println!("Stream {} ended", id);
                    break;
                };
                let stats = &info.stats;
                println!(
                    "[{}] state={} captured={} released={} backlog={} swept={} sink_failures={} bitrate={}",
                    info.id,
                    info.state,
                    stats.segments_captured,
                    stats.segments_released,
                    stats.backlog(),
                    stats.segments_swept,
                    stats.sink_failures,
                    format_bitrate(stats.bitrate()),
                );
            }
        }
    }

    registry.shutdown().await;
    cleanup.abort();
    Ok(())
}
