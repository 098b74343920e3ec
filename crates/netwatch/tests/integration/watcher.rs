//! Watcher lifecycle tests.
//!
//! Each test parks channels in its own registry so tests running in
//! parallel never compete for slots.

use netwatch::Result;
use netwatch::netlink::NetlinkChannel;
use netwatch::watch::{MIN_RECV_BUFFER, RegistryError};
use netwatch::{Error, LinkUp, PendingCloses, Watcher, WatcherConfig, WatcherState};
use tokio::sync::mpsc;

use crate::common::{self, DummyLink, ScriptedSelector};

fn watcher() -> Result<(Watcher<mpsc::UnboundedSender<LinkUp>>, mpsc::UnboundedReceiver<LinkUp>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = Watcher::create(&WatcherConfig::new(), tx)?;
    Ok((watcher, rx))
}

#[test]
fn test_create_then_close_without_activation() -> Result<()> {
    require_netlink!();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let (watcher, _rx) = watcher()?;
    assert_eq!(watcher.state(), WatcherState::Created);
    assert!(watcher.fd() >= 0);

    let mut selector = ScriptedSelector::default();
    assert_eq!(watcher.stop(&mut selector, &registry), WatcherState::Closed);
    assert!(selector.deselected.is_empty());
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn test_registration_failure_closes_channel() -> Result<()> {
    require_netlink!();

    let (mut watcher, _rx) = watcher()?;
    let mut selector = ScriptedSelector::rejecting(libc::EBADF);

    let err = watcher.activate(&mut selector).unwrap_err();
    assert!(matches!(err, Error::Registration(_)));
    assert_eq!(err.errno(), Some(libc::EBADF));
    assert_eq!(watcher.state(), WatcherState::Closed);

    // A closed watcher cannot be driven
    assert!(matches!(
        watcher.on_readable(),
        Err(Error::InvalidState {
            actual: WatcherState::Closed,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_invalid_transitions() -> Result<()> {
    require_netlink!();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let (mut watcher, _rx) = watcher()?;
    let mut selector = ScriptedSelector::default();

    assert!(matches!(
        watcher.on_readable(),
        Err(Error::InvalidState {
            expected: WatcherState::Active,
            actual: WatcherState::Created,
        })
    ));

    watcher.activate(&mut selector)?;
    assert!(matches!(
        watcher.activate(&mut selector),
        Err(Error::InvalidState {
            expected: WatcherState::Created,
            actual: WatcherState::Active,
        })
    ));
    assert_eq!(selector.selected, vec![watcher.fd()]);

    let fd = watcher.fd();
    watcher.stop(&mut selector, &registry);
    registry.confirm_closed(fd);
    Ok(())
}

#[test]
fn test_readable_without_messages_does_not_block() -> Result<()> {
    require_netlink!();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let (mut watcher, _rx) = watcher()?;
    let mut selector = ScriptedSelector::default();
    watcher.activate(&mut selector)?;

    let drain = watcher.on_readable()?;
    assert!(drain.exhausted);

    let fd = watcher.fd();
    watcher.stop(&mut selector, &registry);
    registry.confirm_closed(fd);
    Ok(())
}

#[test]
fn test_stop_defers_close_until_confirmed() -> Result<()> {
    require_netlink!();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let (mut watcher, mut rx) = watcher()?;
    let mut selector = ScriptedSelector::default();
    watcher.activate(&mut selector)?;

    let fd = watcher.fd();
    assert_eq!(watcher.stop(&mut selector, &registry), WatcherState::Stopping);
    assert_eq!(selector.deselected, vec![fd]);
    assert!(registry.contains(fd));

    // The sink went away with the watcher: nothing can be emitted anymore
    assert_eq!(
        rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    );

    assert!(registry.confirm_closed(fd));
    assert!(!registry.confirm_closed(fd));
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn test_registry_exhaustion_leaks_instead_of_closing() -> Result<()> {
    require_netlink!();

    let registry: PendingCloses<NetlinkChannel, 1> = PendingCloses::new();
    let mut selector = ScriptedSelector::default();

    let (mut first, _rx1) = watcher()?;
    let (mut second, _rx2) = watcher()?;
    first.activate(&mut selector)?;
    second.activate(&mut selector)?;
    let (first_fd, second_fd) = (first.fd(), second.fd());

    assert_eq!(first.stop(&mut selector, &registry), WatcherState::Stopping);
    assert_eq!(second.stop(&mut selector, &registry), WatcherState::Leaked);

    assert_eq!(registry.len(), 1);
    assert!(registry.contains(first_fd));
    assert!(!registry.contains(second_fd));

    // Both were still deselected
    assert_eq!(selector.deselected, vec![first_fd, second_fd]);

    registry.confirm_closed(first_fd);
    Ok(())
}

#[test]
fn test_registry_rejects_duplicate_fd() -> Result<()> {
    require_netlink!();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let channel = NetlinkChannel::open(false)?;
    let other = NetlinkChannel::open(false)?;

    registry.register(7, channel).unwrap();
    let rejected = registry.register(7, other).unwrap_err();
    assert_eq!(rejected.reason, RegistryError::Duplicate(7));

    assert!(registry.confirm_closed(7));
    Ok(())
}

#[test]
fn test_oversized_notification_arrives_whole() -> Result<()> {
    require_root!();
    let _serial = common::serial();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = WatcherConfig::new().recv_buffer(MIN_RECV_BUFFER);
    let mut watcher = Watcher::create(&config, tx)?;
    let mut selector = ScriptedSelector::default();
    watcher.activate(&mut selector)?;

    // Index far above anything the host assigns
    let index = 0x7fff_0001;
    let datagram = common::big_link_up(index, 4 * MIN_RECV_BUFFER);
    common::send_to_port(common::port_id(watcher.fd())?, &datagram)?;

    let drain = watcher.on_readable()?;
    assert!(drain.datagrams >= 1);
    assert_eq!(drain.truncated, 0);
    assert!(watcher.alive().contains(index as u32));
    assert!(rx.try_recv().is_ok());

    let fd = watcher.fd();
    watcher.stop(&mut selector, &registry);
    registry.confirm_closed(fd);
    Ok(())
}

#[test]
fn test_drain_limit_bounds_one_callback() -> Result<()> {
    require_root!();
    let _serial = common::serial();

    let registry: PendingCloses<NetlinkChannel> = PendingCloses::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = Watcher::create(&WatcherConfig::new().drain_limit(1), tx)?;
    let mut selector = ScriptedSelector::default();
    watcher.activate(&mut selector)?;

    let link = DummyLink::new()?;
    for _ in 0..3 {
        link.set_up()?;
        link.set_down()?;
    }

    // Far more than one datagram is queued, but one callback reads one
    let first = watcher.on_readable()?;
    assert_eq!(first.datagrams, 1);
    assert!(!first.exhausted);

    let mut emitted = first.emitted;
    let mut calls = 1;
    loop {
        let drain = watcher.on_readable()?;
        assert!(drain.datagrams <= 1);
        emitted += drain.emitted;
        calls += 1;
        if drain.exhausted {
            break;
        }
        assert!(calls < 1000, "queue for {} never drained", link.name());
    }

    assert_eq!(emitted, 3);
    let mut delivered = 0;
    while rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 3);

    let fd = watcher.fd();
    watcher.stop(&mut selector, &registry);
    registry.confirm_closed(fd);
    Ok(())
}
