#[macro_use]
extern crate criterion;
extern crate concurrent_collections;
extern crate crossbeam;

use concurrent_collections::BoundedRingQueue;
use criterion::Criterion;
use crossbeam::queue::ArrayQueue;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

const CAPACITY: usize = 1024;
const OPS_PER_THREAD: u32 = 10_000;

fn bench_ring_spsc() {
    let (mut tx, mut rx) = BoundedRingQueue::spsc(CAPACITY).unwrap();
    let producer = thread::spawn(move || {
        for n in 0..OPS_PER_THREAD {
            let mut value = n;
            while let Err(back) = tx.push(value) {
                value = back;
            }
        }
    });
    for _ in 0..OPS_PER_THREAD {
        while rx.pop().is_none() {}
    }
    producer.join().unwrap();
}

fn bench_ring_mpmc(num_threads: usize) {
    let queue: Arc<BoundedRingQueue<u32>> = Arc::new(BoundedRingQueue::new(CAPACITY).unwrap());
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();
    for _ in 0..num_threads {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for n in 0..OPS_PER_THREAD {
                let mut value = n;
                while let Err(back) = q.push(value) {
                    value = back;
                }
            }
        }));
    }
    for _ in 0..num_threads {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                while q.pop().is_none() {}
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_array_queue(num_threads: usize) {
    let queue: Arc<ArrayQueue<u32>> = Arc::new(ArrayQueue::new(CAPACITY));
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();
    for _ in 0..num_threads {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for n in 0..OPS_PER_THREAD {
                let mut value = n;
                while let Err(back) = q.push(value) {
                    value = back;
                }
            }
        }));
    }
    for _ in 0..num_threads {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                while q.pop().is_none() {}
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_locked_ring(num_threads: usize) {
    let queue: Arc<Mutex<VecDeque<u32>>> = Arc::new(Mutex::new(VecDeque::with_capacity(CAPACITY)));
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();
    for _ in 0..num_threads {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for n in 0..OPS_PER_THREAD {
                loop {
                    let mut guard = q.lock().unwrap();
                    if guard.len() < CAPACITY {
                        guard.push_back(n);
                        break;
                    }
                }
            }
        }));
    }
    for _ in 0..num_threads {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                while q.lock().unwrap().pop_front().is_none() {}
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_spsc(c: &mut Criterion) {
    c.bench_function("ring_spsc", |b| b.iter(bench_ring_spsc));
}

fn bench_mpmc_low(c: &mut Criterion) {
    c.bench_function("ring_mpmc_low", |b| b.iter(|| bench_ring_mpmc(2)));
}

fn bench_array_low(c: &mut Criterion) {
    c.bench_function("array_queue_low", |b| b.iter(|| bench_array_queue(2)));
}

fn bench_lock_low(c: &mut Criterion) {
    c.bench_function("locked_ring_low", |b| b.iter(|| bench_locked_ring(2)));
}

fn bench_mpmc_high(c: &mut Criterion) {
    c.bench_function("ring_mpmc_high", |b| b.iter(|| bench_ring_mpmc(8)));
}

fn bench_array_high(c: &mut Criterion) {
    c.bench_function("array_queue_high", |b| b.iter(|| bench_array_queue(8)));
}

fn bench_lock_high(c: &mut Criterion) {
    c.bench_function("locked_ring_high", |b| b.iter(|| bench_locked_ring(8)));
}

criterion_group!(
    benches,
    bench_spsc,
    bench_mpmc_low,
    bench_array_low,
    bench_lock_low,
    bench_mpmc_high,
    bench_array_high,
    bench_lock_high
);
criterion_main!(benches);
