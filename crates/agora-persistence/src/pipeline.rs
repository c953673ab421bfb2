//! The background event pipeline.
//!
//! Producers (request threads emitting observer events) enqueue encoded
//! blobs into a fixed-capacity lock-free queue; one dedicated writer
//! thread drains the whole queue per wakeup and hands the batch to its
//! consumer (the file appender). A full queue makes the producer spin
//! with backoff; events are never dropped. The writer never takes the
//! entity-store lock, so the backoff cannot deadlock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use tracing::warn;

use crate::LOG_TARGET;

/// One encoded event payload, owned by the producer until dequeued.
pub struct Blob {
    bytes: Box<[u8]>,
}

impl Blob {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

const FULL_QUEUE_BACKOFF: Duration = Duration::from_millis(400);

struct Shared {
    queue: ArrayQueue<Blob>,
    stop: AtomicBool,
    wakeup: Condvar,
    wakeup_mutex: Mutex<()>,
}

pub struct EventPipeline {
    shared: Arc<Shared>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl EventPipeline {
    pub const DEFAULT_CAPACITY: usize = 32768;

    /// Starts the writer thread; `consume` receives each drained batch
    /// in queue order.
    pub fn start(capacity: usize, mut consume: impl FnMut(Vec<Blob>) + Send + 'static) -> Self {
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity),
            stop: AtomicBool::new(false),
            wakeup: Condvar::new(),
            wakeup_mutex: Mutex::new(()),
        });

        let writer_shared = shared.clone();
        let writer = std::thread::Builder::new()
            .name("event-writer".into())
            .spawn(move || {
                loop {
                    {
                        let guard = writer_shared.wakeup_mutex.lock().expect("Locking failed");
                        let _guard = writer_shared
                            .wakeup
                            .wait_while(guard, |_| {
                                writer_shared.queue.is_empty()
                                    && !writer_shared.stop.load(Ordering::Acquire)
                            })
                            .expect("Locking failed");
                    }
                    Self::drain(&writer_shared, &mut consume);
                    if writer_shared.stop.load(Ordering::Acquire) {
                        // One final sweep for blobs racing the stop flag
                        Self::drain(&writer_shared, &mut consume);
                        break;
                    }
                }
            })
            .expect("Spawning thread failed");

        Self {
            shared,
            writer: Mutex::new(Some(writer)),
        }
    }

    fn drain(shared: &Shared, consume: &mut impl FnMut(Vec<Blob>)) {
        let mut batch = Vec::new();
        while let Some(blob) = shared.queue.pop() {
            batch.push(blob);
        }
        if !batch.is_empty() {
            consume(batch);
        }
    }

    /// Blocks (spinning with backoff) while the queue is full; logs one
    /// warning per contiguous full-streak.
    pub fn enqueue(&self, blob: Blob) {
        let mut blob = blob;
        let mut fail_nr = 0u32;
        while let Err(rejected) = self.shared.queue.push(blob) {
            if fail_nr == 0 {
                warn!(target: LOG_TARGET, "Persistence queue is full");
            }
            fail_nr += 1;
            blob = rejected;
            std::thread::sleep(FULL_QUEUE_BACKOFF);
        }
        self.shared.wakeup.notify_one();
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    /// Signals the writer, which drains whatever is still queued before
    /// exiting.
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wakeup.notify_one();
        if let Some(writer) = self.writer.lock().expect("Locking failed").take() {
            writer.join().expect("Writer thread panicked");
        }
    }
}

impl Drop for EventPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test_log::test]
    fn everything_enqueued_is_consumed_in_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let pipeline = EventPipeline::start(EventPipeline::DEFAULT_CAPACITY, move |batch| {
            let mut sink = sink.lock().expect("Locking failed");
            for blob in batch {
                sink.push(blob.as_slice().to_vec());
            }
        });

        for i in 0..100u32 {
            pipeline.enqueue(Blob::from_vec(i.to_le_bytes().to_vec()));
        }
        pipeline.shutdown();

        let received = received.lock().expect("Locking failed");
        assert_eq!(received.len(), 100);
        for (i, bytes) in received.iter().enumerate() {
            assert_eq!(bytes.as_slice(), (i as u32).to_le_bytes());
        }
    }

    #[test_log::test]
    fn tiny_queue_backpressure_loses_nothing() {
        let received = Arc::new(Mutex::new(0usize));
        let sink = received.clone();
        // Slow consumer with a 4-slot queue forces the producer into the
        // backoff path.
        let pipeline = EventPipeline::start(4, move |batch| {
            std::thread::sleep(Duration::from_millis(1));
            *sink.lock().expect("Locking failed") += batch.len();
        });

        for i in 0..12u32 {
            pipeline.enqueue(Blob::from_vec(i.to_le_bytes().to_vec()));
        }
        pipeline.shutdown();
        assert_eq!(*received.lock().expect("Locking failed"), 12);
    }

    #[test_log::test]
    fn shutdown_drains_pending_blobs() {
        let received = Arc::new(Mutex::new(0usize));
        let sink = received.clone();
        let pipeline = EventPipeline::start(1024, move |batch| {
            *sink.lock().expect("Locking failed") += batch.len();
        });
        for _ in 0..10 {
            pipeline.enqueue(Blob::from_vec(vec![0u8; 8]));
        }
        pipeline.shutdown();
        assert_eq!(*received.lock().expect("Locking failed"), 10);
    }
}
