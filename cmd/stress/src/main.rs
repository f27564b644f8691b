//! Stress test - many small tasks
//!
//! Submits a large number of tasks from several submitter threads and
//! checks every result, then reports throughput and recollector reuse.
//!
//! Usage: stress [tasks] [submitters]

use taskpool::{PoolConfig, ThreadPool};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    println!("=== taskpool Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_tasks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let submitters: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(4).max(1);

    let config = PoolConfig::from_env();
    let pool = match ThreadPool::new(config) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            eprintln!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "Running {} tasks from {} submitters on {} workers...",
        num_tasks,
        submitters,
        pool.num_workers()
    );

    let start = Instant::now();
    let per_submitter = num_tasks / submitters;

    let threads: Vec<_> = (0..submitters)
        .map(|s| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let base = s * per_submitter;
                let mut mismatches = 0u64;
                // Keep a window of in-flight handles so workers stay busy
                let mut window = Vec::with_capacity(64);
                for i in base..base + per_submitter {
                    match pool.submit(move || i.wrapping_mul(31)) {
                        Ok(h) => window.push((i, h)),
                        Err(e) => {
                            eprintln!("submit failed: {}", e);
                            mismatches += 1;
                        }
                    }
                    if window.len() == 64 {
                        for (i, h) in window.drain(..) {
                            if h.wait_as::<u64>().ok() != Some(i.wrapping_mul(31)) {
                                mismatches += 1;
                            }
                        }
                    }
                }
                for (i, h) in window.drain(..) {
                    if h.wait_as::<u64>().ok() != Some(i.wrapping_mul(31)) {
                        mismatches += 1;
                    }
                }
                mismatches
            })
        })
        .collect();

    let mut mismatches = 0;
    for t in threads {
        mismatches = t.join().map_or(u64::MAX, |m| mismatches.saturating_add(m));
    }
    let elapsed = start.elapsed();
    let total = per_submitter * submitters;

    let stats = pool.stats();
    let (hits, misses) = stats.workers.iter().fold((0, 0), |(h, m), w| {
        (h + w.recollector.hits, m + w.recollector.misses)
    });

    println!("\n=== Results ===");
    println!("Total tasks:     {}", total);
    println!("Mismatches:      {}", mismatches);
    println!("Time:            {:?}", elapsed);
    println!(
        "Throughput:      {:.0} tasks/sec",
        total as f64 / elapsed.as_secs_f64()
    );
    println!(
        "Result reuse:    {:.1}% ({} hits, {} misses)",
        100.0 * hits as f64 / (hits + misses).max(1) as f64,
        hits,
        misses
    );
    for w in &stats.workers {
        println!("  worker {:2}: executed {}", w.id, w.executed);
    }

    match Arc::try_unwrap(pool) {
        Ok(pool) => {
            if let Err(e) = pool.shutdown() {
                eprintln!("shutdown: {}", e);
            }
        }
        Err(_) => eprintln!("pool still shared at exit"),
    }

    println!("\n=== Stress Test Complete ===");
    if mismatches != 0 {
        std::process::exit(1);
    }
}
