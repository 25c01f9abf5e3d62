//! Test `Waker` functionality
//!
//! This checks that wakes come through as expected, and that the drop
//! handler runs okay, with a large combination of orderings.  A
//! longer multi-threaded run to stress the code for races can be
//! found under `extra/`.

use super::PollSignal;
use crate::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::thread;

// Test it all in one thread so that we have total control over the
// order of operations, to exercise many combinations but reliably and
// repeatably.
//
// Rather than try to specifically test particular cases, use a
// pseudo-random generator with a fixed seed to drive the test, and
// then check the output to see that this exercises things
// sufficiently.
#[test]
#[cfg_attr(miri, ignore)]
fn waker_test() {
    let (mut host, mut sig) = PollSignal::host();
    let h = &mut host;

    #[derive(Default)]
    struct State {
        awaiting: HashSet<u32>,
        running: HashSet<u32>,
    }
    let state = Rc::new(RefCell::new(State::default()));

    let check_awaiting = || {
        if !state.borrow().awaiting.is_empty() {
            panic!("Still awaiting call for: {:?}", state.borrow().awaiting);
        }
    };
    let check_running = || {
        if !state.borrow().running.is_empty() {
            panic!("Still awaiting drop for: {:?}", state.borrow().running);
        }
    };

    // ZX Spectrum 16-bit pseudo-random number generator
    let mut seed: usize = 12345;
    let mut rand = |n: usize| {
        seed = ((seed + 1) * 75) % 65537 - 1;
        (seed * n) >> 16
    };

    struct IdAndWaker {
        id: u32,
        waker: Waker,
    }

    let mut id = 0;
    let mut new_waker = |h: &mut Host| {
        id += 1;
        let state = state.clone();
        let id = id;
        state.borrow_mut().running.insert(id);
        IdAndWaker {
            id,
            waker: h.waker(move |_, deleted| {
                let mut st = state.borrow_mut();
                if deleted {
                    // Should only be deleted once
                    assert!(st.running.remove(&id));
                } else {
                    // Spurious wakeups are okay, so long as there is
                    // at least one
                    st.awaiting.remove(&id);
                }
            }),
        }
    };

    // Start with 320 wakers, so that several groups are in use
    let mut wakers = Vec::new();
    for _ in 0..320 {
        wakers.push(new_waker(h));
    }

    while !wakers.is_empty() {
        match rand(4) {
            0 => {
                // If there has been a notify, run handlers.  This
                // should leave the `awaiting` set empty.
                if sig.take() {
                    h.poll_wake();
                }
                check_awaiting();
            }
            1 => {
                let w = &wakers[rand(wakers.len())];
                state.borrow_mut().awaiting.insert(w.id);
                w.waker.wake();
            }
            2 => {
                // If we drop a waker with a call outstanding, the
                // drop is handled instead of the call
                let w = wakers.remove(rand(wakers.len()));
                state.borrow_mut().awaiting.remove(&w.id);
                drop(w);
            }
            _ => {
                if rand(100) < 80 {
                    // Biased towards reducing the number of wakers
                    // until there are none, which ends the test.
                    // Re-using freed slots is tested along the way.
                    let w = new_waker(h);
                    wakers.push(w);
                }
            }
        }
    }
    if sig.take() {
        h.poll_wake();
    }

    check_awaiting();
    check_running();
    assert_eq!(0, h.wake_handler_count());
}

#[test]
fn repeated_wakes_coalesce() {
    let (mut host, mut sig) = PollSignal::host();
    let calls = Rc::new(RefCell::new(0));
    let calls2 = calls.clone();
    let waker = host.waker(move |_, deleted| {
        if !deleted {
            *calls2.borrow_mut() += 1;
        }
    });

    for _ in 0..100 {
        waker.wake();
    }
    assert_eq!(1, sig.arms());
    assert!(sig.take());
    host.poll_wake();
    assert_eq!(1, *calls.borrow());

    // Collected, so the next wake arms again
    waker.wake();
    assert_eq!(2, sig.arms());
    host.poll_wake();
    assert_eq!(2, *calls.borrow());
}

#[test]
fn only_woken_handler_runs() {
    let (mut host, _sig) = PollSignal::host();
    let log = Rc::new(RefCell::new(Vec::new()));
    let wakers: Vec<Waker> = (0..200)
        .map(|i| {
            let log = log.clone();
            host.waker(move |_, deleted| {
                if !deleted {
                    log.borrow_mut().push(i);
                }
            })
        })
        .collect();

    wakers[150].wake();
    wakers[3].wake();
    host.poll_wake();
    let mut seen = log.borrow().clone();
    seen.sort_unstable();
    assert_eq!(vec![3, 150], seen);
}

#[test]
fn drop_calls_handler_with_deleted() {
    let (mut host, mut sig) = PollSignal::host();
    let deleted_calls = Rc::new(RefCell::new(0));
    let deleted_calls2 = deleted_calls.clone();
    let waker = host.waker(move |_, deleted| {
        if deleted {
            *deleted_calls2.borrow_mut() += 1;
        }
    });
    assert_eq!(1, host.wake_handler_count());

    // Dropped from another thread, like a producer exiting
    thread::spawn(move || drop(waker)).join().unwrap();
    assert!(sig.take());
    host.poll_wake();
    assert_eq!(1, *deleted_calls.borrow());
    assert_eq!(0, host.wake_handler_count());

    // Nothing further on another poll
    host.poll_wake();
    assert_eq!(1, *deleted_calls.borrow());
}

#[test]
fn wake_from_other_thread() {
    let (mut host, mut sig) = PollSignal::host();
    let calls = Rc::new(RefCell::new(0));
    let calls2 = calls.clone();
    let waker = host.waker(move |_, deleted| {
        if !deleted {
            *calls2.borrow_mut() += 1;
        }
    });
    let handle = thread::spawn(move || {
        waker.wake();
        waker
    });
    sig.wait();
    host.poll_wake();
    assert_eq!(1, *calls.borrow());
    drop(handle.join().unwrap());
}
