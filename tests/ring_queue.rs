extern crate concurrent_collections;

mod common;

use concurrent_collections::BoundedRingQueue;
use std::sync::Arc;
use std::thread;

const SIZE: u32 = 200_000;

#[test]
fn test_capacity_boundary() {
    common::init_tracing();
    let k = 16;
    let queue = BoundedRingQueue::new(k).unwrap();
    for i in 0..k {
        assert!(queue.push(i).is_ok());
    }
    assert!(queue.is_full());
    assert_eq!(queue.push(k), Err(k));
    assert_eq!(queue.pop(), Some(0));
    assert!(queue.push(k).is_ok());
    assert_eq!(queue.push(k + 1), Err(k + 1));
}

#[test]
fn test_spsc_capacity_boundary() {
    let (mut tx, mut rx) = BoundedRingQueue::spsc(4).unwrap();
    for i in 0..4 {
        tx.push(i).unwrap();
    }
    assert!(tx.is_full());
    assert_eq!(tx.push(4), Err(4));
    assert_eq!(rx.pop(), Some(0));
    tx.push(4).unwrap();
    assert_eq!(rx.len(), 4);
}

#[test]
fn test_empty_after_exhaustive_pop() {
    let queue = BoundedRingQueue::new(10_000).unwrap();
    for i in 0..10_000 {
        queue.push(i).unwrap();
    }
    let mut popped = 0;
    while queue.pop().is_some() {
        popped += 1;
    }
    assert_eq!(popped, 10_000);
    assert!(queue.is_empty());
    assert_eq!(queue.pop(), None);
    queue.push(1).unwrap();
    assert_eq!(queue.pop(), Some(1));
}

#[test]
fn test_spsc_preserves_exact_order() {
    common::init_tracing();
    let (mut tx, mut rx) = BoundedRingQueue::spsc(1000).unwrap();
    let keys = common::keys(SIZE);
    let expected = keys.clone();

    let producer = thread::spawn(move || {
        for key in keys {
            let mut key = key;
            while let Err(back) = tx.push(key) {
                key = back;
                thread::yield_now();
            }
        }
    });
    let consumer = thread::spawn(move || {
        let mut ans = Vec::with_capacity(SIZE as usize);
        while ans.len() != SIZE as usize {
            match rx.pop() {
                Some(v) => ans.push(v),
                None => thread::yield_now(),
            }
        }
        ans
    });

    producer.join().unwrap();
    assert_eq!(consumer.join().unwrap(), expected);
}

fn run_mpmc(producers: u32, consumers: u32) {
    let queue = Arc::new(BoundedRingQueue::new(1000).unwrap());
    let mut handles = Vec::new();

    for stride in 0..producers {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            let mut key = stride + 1;
            while key <= SIZE {
                let mut value = key;
                while let Err(back) = queue.push(value) {
                    value = back;
                    thread::yield_now();
                }
                key += producers;
            }
            Vec::new()
        }));
    }
    for stride in 0..consumers {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            let share = (SIZE - stride + consumers - 1) / consumers;
            let mut got = Vec::with_capacity(share as usize);
            while got.len() < share as usize {
                match queue.pop() {
                    Some(v) => got.push(v),
                    None => thread::yield_now(),
                }
            }
            got
        }));
    }

    let mut ans: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ans.sort();
    assert_eq!(ans, common::keys(SIZE));
    assert!(queue.is_empty());
}

#[test]
fn test_spmc_multiset() {
    run_mpmc(1, 3);
}

#[test]
fn test_mpsc_multiset() {
    run_mpmc(3, 1);
}

#[test]
fn test_mpmc_multiset() {
    common::init_tracing();
    run_mpmc(3, 3);
}

#[test]
fn test_mpmc_small_buffer_heavy_wrap() {
    let queue = Arc::new(BoundedRingQueue::new(2).unwrap());
    let per_producer = 20_000u32;
    let mut producers = Vec::new();
    for p in 0..4u32 {
        let queue = queue.clone();
        producers.push(thread::spawn(move || {
            for i in 0..per_producer {
                let mut value = p * per_producer + i;
                while let Err(back) = queue.push(value) {
                    value = back;
                    thread::yield_now();
                }
            }
        }));
    }
    let mut consumers = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        consumers.push(thread::spawn(move || {
            let mut got = Vec::new();
            while got.len() < per_producer as usize {
                match queue.pop() {
                    Some(v) => got.push(v),
                    None => thread::yield_now(),
                }
            }
            got
        }));
    }
    for p in producers {
        p.join().unwrap();
    }
    let mut all: Vec<u32> = consumers.into_iter().flat_map(|c| c.join().unwrap()).collect();
    all.sort();
    assert_eq!(all, (0..4 * per_producer).collect::<Vec<_>>());
}

#[test]
fn test_per_producer_order_is_kept() {
    let queue = Arc::new(BoundedRingQueue::new(64).unwrap());
    let per_producer = 50_000u32;
    let mut producers = Vec::new();
    for p in 0..3u32 {
        let queue = queue.clone();
        producers.push(thread::spawn(move || {
            for seq in 0..per_producer {
                let mut value = (p, seq);
                while let Err(back) = queue.push(value) {
                    value = back;
                    thread::yield_now();
                }
            }
        }));
    }

    let mut last_seen = [None::<u32>; 3];
    let mut received = 0;
    while received < 3 * per_producer {
        match queue.pop() {
            Some((p, seq)) => {
                if let Some(prev) = last_seen[p as usize] {
                    assert!(seq > prev, "producer {} went backwards: {} after {}", p, seq, prev);
                }
                last_seen[p as usize] = Some(seq);
                received += 1;
            }
            None => thread::yield_now(),
        }
    }
    for p in producers {
        p.join().unwrap();
    }
}
