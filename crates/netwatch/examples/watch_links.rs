//! Print an event every time an interface gains carrier.
//!
//! Run with: RUST_LOG=netwatch=debug cargo run -p netwatch --example watch_links
//!
//! Then in another terminal, try:
//!   ip link add test0 type dummy
//!   ip link set test0 up
//!   ip link set test0 down
//!   ip link set test0 up
//!   ip link del test0

use netwatch::{Monitor, WatcherConfig};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> netwatch::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let (handle, mut events) = Monitor::spawn(WatcherConfig::new().owner(1u64))?;
    println!("Watching link state (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => println!("[{}] {}", event.owner, event.kind()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop().await
}
