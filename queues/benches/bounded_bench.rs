use criterion::{criterion_group, criterion_main, Criterion};
use monitor_queue::{BlockingQueue, BoundedQueue, QueueError, Timeout};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const ITEMS_PER_THREAD_TARGET: usize = 100_000;
const CAPACITY: usize = 1024;
const THREAD_COUNTS_TO_TEST: &[(usize, usize)] = &[
   (1, 1),
   (2, 2),
   (4, 4),
];

// Runs `producers` x `consumers` threads over one queue and returns the time
// from the start barrier until every consumer has seen `Finalized`.
fn run_threads<Q>(queue: Arc<Q>, producers: usize, consumers: usize, items_per_producer: usize) -> Duration
where
   Q: BlockingQueue<usize> + 'static,
{
   let barrier = Arc::new(Barrier::new(producers + consumers + 1));

   let producer_handles: Vec<_> = (0..producers)
      .map(|p| {
         let queue = Arc::clone(&queue);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            for i in 0..items_per_producer {
               if queue.push(p as i32, i, Timeout::Infinite).is_err() {
                  panic!("producer {p}: push failed");
               }
            }
         })
      })
      .collect();

   let consumer_handles: Vec<_> = (0..consumers)
      .map(|_| {
         let queue = Arc::clone(&queue);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            let mut consumed = 0usize;
            loop {
               match queue.pop(Timeout::Infinite) {
                  Ok(_) => consumed += 1,
                  Err(QueueError::Finalized) => return consumed,
                  Err(e) => panic!("consumer: pop failed: {e}"),
               }
            }
         })
      })
      .collect();

   barrier.wait();
   let start = Instant::now();

   for h in producer_handles {
      h.join().unwrap();
   }
   queue.finalize();

   let consumed: usize = consumer_handles.into_iter().map(|h| h.join().unwrap()).sum();
   let duration = start.elapsed();

   if consumed != producers * items_per_producer {
      eprintln!(
         "Warning: consumed {}/{} items",
         consumed,
         producers * items_per_producer
      );
   }
   duration
}

fn bench_single_thread(c: &mut Criterion) {
   let queue = BoundedQueue::with_capacity(CAPACITY);
   c.bench_function("bounded_push_pop_single_thread", |b| {
      b.iter(|| {
         for i in 0..CAPACITY {
            queue.try_push(i as i32, i).unwrap();
         }
         for _ in 0..CAPACITY {
            criterion::black_box(queue.try_pop().unwrap());
         }
      })
   });
}

fn bench_threads(c: &mut Criterion) {
   for &(producers, consumers) in THREAD_COUNTS_TO_TEST {
      let items_per_producer = ITEMS_PER_THREAD_TARGET / producers;
      let name = format!("bounded_{}p_{}c", producers, consumers);
      c.bench_function(&name, |b| {
         b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
               let queue = Arc::new(BoundedQueue::<usize>::with_capacity(CAPACITY));
               total += run_threads(queue, producers, consumers, items_per_producer);
            }
            total
         })
      });
   }
}

fn custom_criterion() -> Criterion {
   Criterion::default()
      .warm_up_time(Duration::from_secs(2))
      .measurement_time(Duration::from_secs(10))
      .sample_size(10)
}

criterion_group! {
   name = benches;
   config = custom_criterion();
   targets =
      bench_single_thread,
      bench_threads,
}
criterion_main!(benches);
