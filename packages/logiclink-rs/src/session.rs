//! Hand-off point between the acquisition thread and the decoding thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::types::RawBlock;

/// One capture run. The device side pushes raw transfers, the processing
/// side pops them. `request_stop` asks the producer to wind down, `finish`
/// tells consumers no more data will arrive.
#[derive(Debug, Default)]
pub struct Session {
    queue: Mutex<VecDeque<RawBlock>>,
    available: Condvar,

    stop: AtomicBool,
    finished: AtomicBool,

    /// Bytes received so far irrespective of queue state.
    transferred: AtomicUsize,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn push(&self, block: RawBlock) {
        self.transferred.fetch_add(block.data.len(), Ordering::Relaxed);

        let mut queue = self.queue.lock().unwrap();
        queue.push_back(block);
        self.available.notify_one();
    }

    /// Pops the next transfer, blocking while the capture is live. Returns
    /// `None` once the session is finished and the queue drained.
    pub fn pop_blocking(&self) -> Option<RawBlock> {
        let mut queue = self.queue.lock().unwrap();

        loop {
            if let Some(block) = queue.pop_front() {
                return Some(block);
            }

            if self.is_finished() {
                return None;
            }

            // Wake up periodically to observe `finished`, set without the
            // queue lock held.
            let (q, _) = self
                .available
                .wait_timeout(queue, Duration::from_millis(50))
                .unwrap();
            queue = q;
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Called by the producer when no more transfers will be pushed.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.available.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn transferred_bytes(&self) -> usize {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bytes;

    fn block(data: Bytes) -> RawBlock {
        RawBlock {
            mbps: 0.0,
            overruns: 0,
            data,
        }
    }

    #[test]
    fn fifo_order() {
        let session = Session::new();
        session.push(block(vec![1]));
        session.push(block(vec![2, 3]));

        assert_eq!(session.queued(), 2);
        assert_eq!(session.transferred_bytes(), 3);

        assert_eq!(session.pop_blocking().unwrap().data, vec![1]);
        assert_eq!(session.pop_blocking().unwrap().data, vec![2, 3]);
    }

    #[test]
    fn finish_unblocks_consumer() {
        let session = Session::new();
        session.push(block(vec![9]));
        session.finish();

        // Remaining data is still drained after finish.
        assert_eq!(session.pop_blocking().unwrap().data, vec![9]);
        assert!(session.pop_blocking().is_none());
    }

    #[test]
    fn finish_wakes_blocked_consumer() {
        let session = Session::new();

        std::thread::scope(|s| {
            let consumer = s.spawn(|| session.pop_blocking());
            std::thread::sleep(Duration::from_millis(10));
            session.finish();
            assert!(consumer.join().unwrap().is_none());
        });
    }

    #[test]
    fn stop_flag() {
        let session = Session::new();
        assert!(!session.stop_requested());
        session.request_stop();
        assert!(session.stop_requested());
    }
}
