//! FIFO of compressed packets between the capture and playback callbacks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

pub struct FrameQueue {
    packets: Mutex<VecDeque<Bytes>>,
    /// `None` keeps the queue unbounded.
    max_depth: Option<usize>,
    high_water: AtomicUsize,
    dropped: AtomicU64,
}

impl FrameQueue {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            packets: Mutex::new(VecDeque::new()),
            max_depth,
            high_water: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    fn packets(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a packet onto the tail. With a depth cap, a full queue loses its
    /// oldest packet first.
    pub fn append(&self, packet: Bytes) {
        let (depth, evicted) = {
            let mut packets = self.packets();
            let evicted = match self.max_depth {
                Some(max) if packets.len() >= max => packets.pop_front().is_some(),
                _ => false,
            };
            packets.push_back(packet);
            (packets.len(), evicted)
        };

        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.high_water.fetch_max(depth, Ordering::Relaxed);
    }

    /// Pop the oldest packet, or `None` if nothing is buffered.
    pub fn take_first(&self) -> Option<Bytes> {
        self.packets().pop_front()
    }

    pub fn len(&self) -> usize {
        self.packets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets().is_empty()
    }

    /// Deepest the queue has been since creation.
    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Packets evicted by the depth cap.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let q = FrameQueue::unbounded();
        for i in 0..5u8 {
            q.append(Bytes::from(vec![i; i as usize + 1]));
        }
        assert_eq!(q.len(), 5);
        for i in 0..5u8 {
            assert_eq!(q.take_first().unwrap(), Bytes::from(vec![i; i as usize + 1]));
        }
        assert!(q.take_first().is_none());
        assert!(q.is_empty());
        assert_eq!(q.high_water_mark(), 5);
    }

    #[test]
    fn test_depth_cap_drops_oldest() {
        let q = FrameQueue::new(Some(2));
        q.append(Bytes::from_static(b"a"));
        q.append(Bytes::from_static(b"b"));
        q.append(Bytes::from_static(b"c"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.take_first().unwrap(), Bytes::from_static(b"b"));
        assert_eq!(q.take_first().unwrap(), Bytes::from_static(b"c"));
    }

    #[test]
    fn test_concurrent_producer_consumer_keeps_order() {
        let q = Arc::new(FrameQueue::unbounded());
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    q.append(Bytes::copy_from_slice(&i.to_le_bytes()));
                }
            })
        };

        let mut seen = Vec::with_capacity(1000);
        while seen.len() < 1000 {
            match q.take_first() {
                Some(p) => {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&p);
                    seen.push(u32::from_le_bytes(raw));
                }
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();

        assert!(seen.iter().copied().eq(0..1000));
        assert!(q.is_empty());
    }
}
