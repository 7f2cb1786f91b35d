//! mq-demo: one producer and one consumer sharing a [`BoundedQueue`].
//!
//! The producer pushes `--items` tagged messages and finalizes the queue; the
//! consumer drains it slowly with a pop timeout. Ctrl-C finalizes early.
//!
//! ```bash
//! RUST_LOG=debug mq-demo --capacity 5 --items 16 --pop-timeout-ms 250
//! ```

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use monitor_queue::{BlockingQueue, BoundedQueue, QueueError, Timeout};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

static SIGINT_SEEN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "mq-demo")]
#[command(about = "Producer/consumer demo for the bounded finalizing queue")]
struct Cli {
    /// Queue capacity.
    #[arg(long, default_value_t = 5)]
    capacity: usize,

    /// Number of messages the producer pushes (tags 0..items).
    #[arg(long, default_value_t = 16)]
    items: i32,

    /// Consumer pop timeout in milliseconds; negative waits forever.
    #[arg(long, default_value_t = 250, allow_negative_numbers = true)]
    pop_timeout_ms: i64,

    /// Delay before each consumer pop, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    consumer_delay_ms: u64,
}

extern "C" fn on_sigint(_: libc::c_int) {
    SIGINT_SEEN.store(true, Ordering::SeqCst);
}

fn install_sigint_handler() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }.map(|_| ())
}

fn produce<Q>(queue: &Q, items: i32)
where
    Q: BlockingQueue<String> + ?Sized,
{
    for tag in 0..items {
        match queue.push(tag, format!("message #{tag}"), Timeout::Infinite) {
            Ok(()) => {}
            Err(e) if e.error() == QueueError::Finalized => {
                info!("producer: queue is finalized");
                break;
            }
            Err(e) => {
                error!(%e, "producer: push failed");
                break;
            }
        }
    }

    queue.finalize();
    info!("producer exiting");
}

fn consume<Q>(queue: &Q, delay: Duration, timeout: Timeout) -> usize
where
    Q: BlockingQueue<String> + ?Sized,
{
    let mut consumed = 0;
    loop {
        thread::sleep(delay);

        match queue.pop(timeout) {
            Ok((tag, payload)) => {
                consumed += 1;
                info!(tag, %payload, "consumer: received");
            }
            Err(QueueError::Finalized) => {
                info!("consumer: queue is finalized");
                break;
            }
            Err(e) if e.is_retryable() => {
                info!(%e, "consumer: nothing to read yet");
            }
            Err(e) => {
                error!(%e, "consumer: pop failed");
                break;
            }
        }
    }

    info!(consumed, "consumer exiting");
    consumed
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = install_sigint_handler() {
        error!(%e, "cannot install SIGINT handler");
        return ExitCode::FAILURE;
    }
    println!("Press Ctrl-C to exit.");

    let queue = match BoundedQueue::<String>::new(cli.capacity) {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(%e, capacity = cli.capacity, "cannot create queue");
            return ExitCode::FAILURE;
        }
    };

    let producer = {
        let queue = Arc::clone(&queue);
        let items = cli.items;
        thread::spawn(move || produce(queue.as_ref(), items))
    };
    let consumer = {
        let queue = Arc::clone(&queue);
        let delay = Duration::from_millis(cli.consumer_delay_ms);
        let timeout = Timeout::from_millis(cli.pop_timeout_ms);
        thread::spawn(move || consume(queue.as_ref(), delay, timeout))
    };

    while !queue.is_finalized() {
        thread::sleep(POLL_INTERVAL);
        if SIGINT_SEEN.load(Ordering::SeqCst) {
            info!("got SIGINT, finalizing queue");
            queue.finalize();
            break;
        }
    }

    let mut failed = false;
    if producer.join().is_err() {
        error!("producer thread panicked");
        failed = true;
    }
    match consumer.join() {
        Ok(consumed) => info!(consumed, "consumer joined"),
        Err(_) => {
            error!("consumer thread panicked");
            failed = true;
        }
    }

    match BoundedQueue::destroy_shared(queue) {
        Ok(leftover) if leftover.is_empty() => {}
        Ok(leftover) => warn!(count = leftover.len(), "queue destroyed with undelivered items"),
        Err(e) => {
            error!(%e, "cannot destroy queue");
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
