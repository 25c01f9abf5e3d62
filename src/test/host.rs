use super::PollSignal;
use crate::*;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn deferred_calls_run_in_order() {
    let (mut host, _sig) = PollSignal::host();
    let log = Rc::new(RefCell::new(Vec::new()));
    let l1 = log.clone();
    let l2 = log.clone();
    host.defer(move |h| {
        l1.borrow_mut().push(1);
        let l3 = l1.clone();
        // Deferred from a deferred call: runs in the same `run`
        h.defer(move |_| l3.borrow_mut().push(3));
    });
    host.defer(move |_| l2.borrow_mut().push(2));
    assert!(log.borrow().is_empty());
    assert!(!host.run());
    assert_eq!(vec![1, 2, 3], *log.borrow());
}

#[test]
fn keep_alive_follows_bridge_refs() {
    let (mut host, mut sig) = PollSignal::host();
    assert!(!host.is_referenced());

    let bridge = Bridge::new(&mut host, BridgeConfig::new("refs"), |_, _: u8| {}, |_| {});
    assert_eq!(1, host.ref_count());

    bridge.unref_host(&mut host);
    bridge.unref_host(&mut host);
    assert_eq!(0, host.ref_count());
    assert!(!host.run());

    bridge.ref_host(&mut host);
    bridge.ref_host(&mut host);
    assert_eq!(1, host.ref_count());
    assert!(host.run());

    // Finalize gives up the reference
    drop(bridge);
    assert!(sig.take());
    host.poll_wake();
    assert!(!host.is_referenced());
}

#[test]
fn unrefed_bridge_still_delivers() {
    let (mut host, mut sig) = PollSignal::host();
    let got = Rc::new(RefCell::new(Vec::new()));
    let got2 = got.clone();
    let bridge = Bridge::new(
        &mut host,
        BridgeConfig::new("unrefed"),
        move |_, v: u32| got2.borrow_mut().push(v),
        |_| {},
    );
    bridge.unref_host(&mut host);
    bridge.try_call(7).unwrap();
    assert!(sig.take());
    host.poll_wake();
    assert_eq!(vec![7], *got.borrow());
    drop(bridge);
    host.poll_wake();
    assert_eq!(0, host.ref_count());
}

#[test]
#[should_panic(expected = "called more than once")]
fn poll_waker_set_twice() {
    let (mut host, _sig) = PollSignal::host();
    host.set_poll_waker(|| {});
}

#[test]
#[should_panic(expected = "no poll-waker")]
fn waker_without_poll_waker() {
    let mut host = Host::new();
    let _waker = host.waker(|_, _| {});
}
