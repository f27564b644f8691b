//! Basic taskpool example
//!
//! Submits one task per payload type, waits on each, and shows a task
//! that panics coming back as `NoValue`.
//!
//! # Environment Variables
//!
//! - `TP_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `TP_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `TP_NUM_WORKERS=N` - Worker thread count

use taskpool::{kdebug, kinfo, OpaquePtr, PoolConfig, PoolError, ResultStatus, Runtime};
use std::time::Duration;

static GREETING: &str = "hello from a worker";

// TP_LOG_LEVEL=debug TP_FLUSH_EPRINT=1 cargo run -p taskpool-basic
fn main() {
    println!("=== taskpool Basic Example ===\n");

    let config = PoolConfig::from_env().num_workers(4).debug_logging(true);

    let mut runtime = match Runtime::new(config) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(|pool| -> Result<(), PoolError> {
        kinfo!("Submitting tasks...");

        let answer = pool.submit(|| 6u64 * 7)?;
        let negative = pool.submit(|| -1i32)?;
        let bits = pool.submit(|| 0xcafe_u32)?;
        let ratio = pool.submit(|| 22.0f64 / 7.0)?;
        let greeting = pool.submit(|| OpaquePtr::from_ref(&GREETING))?;

        // Pending until the worker gets to it
        let slow = pool.submit_to(0, || {
            std::thread::sleep(Duration::from_millis(50));
            1u32
        })?;
        println!("slow task status right after submit: {}", slow.poll());

        println!("u64 : {}", answer.wait_as::<u64>()?);
        println!("i32 : {}", negative.wait_as::<i32>()?);
        println!("u32 : {:#x}", bits.wait_as::<u32>()?);
        println!("f64 : {:.5}", ratio.wait_as::<f64>()?);

        let p = greeting.wait_as::<OpaquePtr>()?;
        // Safety: points at the static above
        let text = unsafe { *(p.as_ptr() as *const &str) };
        println!("ptr : {}", text);

        while slow.poll() != ResultStatus::Done {
            std::thread::sleep(Duration::from_millis(5));
        }
        println!("slow task status after signal: {}", slow.poll());
        println!("slow: {}", slow.wait()?);

        let failing = pool.submit(|| -> u64 { panic!("task failed on purpose") })?;
        match failing.wait() {
            Err(PoolError::NoValue) => println!("panicking task reported no value"),
            other => println!("unexpected: {:?}", other),
        }

        for stats in pool.stats().workers {
            kdebug!(
                "worker {}: executed={} panicked={} hit_rate={:.2}",
                stats.id,
                stats.executed,
                stats.panicked,
                stats.recollector.hit_rate()
            );
        }
        Ok(())
    });

    match outcome {
        Ok(Ok(())) => println!("\n=== Example Complete ==="),
        Ok(Err(e)) | Err(e) => {
            eprintln!("example failed: {}", e);
            std::process::exit(1);
        }
    }
}
