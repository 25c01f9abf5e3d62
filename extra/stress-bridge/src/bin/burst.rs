//! Producers push bursts into a bounded bridge whilst the owner
//! thread drains it.  Each burst ends with the bridge going idle, so
//! this hammers the crossing between a producer arming the waker and
//! the owner thread leaving a drain cycle.  A lost wake-up shows up
//! as a timeout, and a lost or reordered payload as an error.

use callbridge::{Bridge, BridgeConfig, CallMode, Host};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use stress_bridge::notify_channel;

/// Number of producer threads
const THREADS: usize = 8;
/// Payloads per producer per burst
const BURST: usize = 500;
/// Number of bursts
const REPEAT: usize = 2000;

fn main() {
    let mut host = Host::new();
    let (wake_tx, mut wake_rx) = notify_channel(Duration::from_secs(10));
    host.set_poll_waker(wake_tx);

    let next = Rc::new(RefCell::new(vec![0_usize; THREADS]));
    let cycles = Rc::new(RefCell::new(0_usize));
    let next2 = next.clone();
    let config = BridgeConfig::new("stress")
        .with_max_queue_size(256)
        .with_iteration_cap(100);
    let bridge = Bridge::new(
        &mut host,
        config,
        move |_, (t, i): (usize, usize)| {
            let mut next = next2.borrow_mut();
            if next[t] != i {
                println!("ERROR: producer {} sent {} but expected {}", t, i, next[t]);
                std::process::exit(1);
            }
            next[t] += 1;
        },
        |_| println!("finalized"),
    );

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let b = bridge.acquire().unwrap();
        handles.push(thread::spawn(move || {
            for i in 0..BURST * REPEAT {
                // Mix the two modes: spin on a full queue some of the time
                let mut payload = (t, i);
                if i % 3 == 0 {
                    loop {
                        match b.push(payload, CallMode::NonBlocking) {
                            Ok(()) => break,
                            Err(e) if e.is_full() => {
                                payload = e.into_inner();
                                thread::yield_now();
                            }
                            Err(_) => panic!("bridge closed under producer"),
                        }
                    }
                } else {
                    b.call(payload).unwrap();
                }
                if i % BURST == BURST - 1 {
                    thread::yield_now();
                }
            }
        }));
    }
    drop(bridge);

    let mut reported = 0;
    let mut sends = 0;
    loop {
        match wake_rx() {
            Some(n) => sends += n,
            None => {
                println!("ERROR: no wake-up for 10s, delivered {:?}", next.borrow());
                std::process::exit(1);
            }
        }
        host.poll_wake();
        *cycles.borrow_mut() += 1;
        if !host.run() {
            break;
        }
        let done = next.borrow().iter().sum::<usize>() / (THREADS * BURST);
        if done > reported {
            reported = done;
            if reported % 100 == 0 {
                println!(
                    "{} bursts, {} wake-ups from {} poll-waker calls",
                    reported,
                    cycles.borrow(),
                    sends
                );
            }
        }
    }
    for h in handles {
        h.join().unwrap();
    }

    for (t, n) in next.borrow().iter().enumerate() {
        if *n != BURST * REPEAT {
            println!("ERROR: producer {} delivered {} of {}", t, n, BURST * REPEAT);
            std::process::exit(1);
        }
    }
    println!("SUCCESS");
}
