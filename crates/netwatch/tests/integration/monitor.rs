//! Tokio driver tests.

use std::time::Duration;

use netwatch::netlink::NetlinkChannel;
use netwatch::{LinkUp, Monitor, PendingCloses, Result, WatcherConfig};
use tokio_stream::StreamExt;

use crate::common::{self, DummyLink};

static REGISTRY: PendingCloses<NetlinkChannel> = PendingCloses::new();

#[tokio::test]
async fn test_stop_releases_channel() -> Result<()> {
    require_netlink!();

    let (handle, mut events) = Monitor::spawn_with_registry(WatcherConfig::new(), &REGISTRY)?;
    let fd = handle.fd();
    assert!(!handle.is_finished());

    handle.stop().await?;
    assert!(!REGISTRY.contains(fd));

    // The sink is gone, so the stream ends
    let next = tokio::time::timeout(Duration::from_secs(1), events.next()).await;
    assert!(matches!(next, Ok(None)));
    Ok(())
}

#[tokio::test]
async fn test_dropping_handle_stops_watcher() -> Result<()> {
    require_netlink!();

    let (handle, mut events) = Monitor::spawn_with_registry(WatcherConfig::new(), &REGISTRY)?;
    drop(handle);

    let next = tokio::time::timeout(Duration::from_secs(2), events.next()).await;
    assert!(matches!(next, Ok(None)));
    Ok(())
}

#[tokio::test]
async fn test_owners_are_distinct() -> Result<()> {
    require_netlink!();

    let (a, _a_events) =
        Monitor::spawn_with_registry(WatcherConfig::new().owner(100u64), &REGISTRY)?;
    let (b, _b_events) =
        Monitor::spawn_with_registry(WatcherConfig::new().owner(101u64), &REGISTRY)?;
    assert_ne!(a.owner(), b.owner());
    assert_ne!(a.fd(), b.fd());

    a.stop().await?;
    b.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_link_up_reported_once() -> Result<()> {
    require_root!();
    let _serial = common::serial();

    let owner: u64 = 7;
    let (handle, mut events) =
        Monitor::spawn_with_registry(WatcherConfig::new().owner(owner), &REGISTRY)?;

    let link = DummyLink::new()?;
    link.set_up()?;

    let event = tokio::time::timeout(Duration::from_secs(2), events.next()).await;
    let Ok(Some(event)) = event else {
        panic!("no up-event for {}", link.name());
    };
    assert_eq!(event.owner.0, owner);
    assert_eq!(event.kind(), LinkUp::KIND);

    // Losing carrier and regaining it is a new transition
    link.set_down()?;
    link.set_up()?;
    let again = tokio::time::timeout(Duration::from_secs(2), events.next()).await;
    assert!(matches!(again, Ok(Some(_))), "down/up cycle must report again");

    handle.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_flood_is_drained_across_callbacks() -> Result<()> {
    require_root!();
    let _serial = common::serial();

    let config = WatcherConfig::new().drain_limit(1);
    let (handle, mut events) = Monitor::spawn_with_registry(config, &REGISTRY)?;

    let link = DummyLink::new()?;
    for _ in 0..3 {
        link.set_up()?;
        link.set_down()?;
    }

    for cycle in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(2), events.next()).await;
        assert!(
            matches!(event, Ok(Some(_))),
            "missing up-event {} for {}",
            cycle,
            link.name()
        );
    }

    let extra = tokio::time::timeout(Duration::from_millis(200), events.next()).await;
    assert!(extra.is_err(), "only three up-transitions happened");
    assert!(!handle.is_finished());

    handle.stop().await?;
    Ok(())
}
