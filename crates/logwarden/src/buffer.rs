use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::types::LogRecord;

/// Bounded, ordered record buffer shared between the read loops and any reader.
///
/// Once the buffer is full, the next append first drops a batch of the oldest
/// records. All writes go through one lock, so records from stdout and stderr
/// are serialized, and `snapshot` always observes a whole append or none of it.
#[derive(Debug)]
pub struct MessageBuffer {
	inner: Mutex<Ring>,
}

#[derive(Debug)]
struct Ring {
	records: VecDeque<LogRecord>,
	capacity: usize,
	batch: usize,
}

impl MessageBuffer {
	pub fn new(capacity: usize, eviction_batch_size: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			inner: Mutex::new(Ring {
				records: VecDeque::with_capacity(capacity),
				capacity,
				batch: eviction_batch_size.max(1),
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, Ring> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn append(&self, record: LogRecord) {
		let mut ring = self.lock();
		if ring.records.len() >= ring.capacity {
			let evict = ring.batch.min(ring.records.len());
			ring.records.drain(..evict);
		}
		ring.records.push_back(record);
	}

	pub fn clear(&self) {
		self.lock().records.clear();
	}

	pub fn snapshot(&self) -> Vec<LogRecord> {
		self.lock().records.iter().cloned().collect()
	}

	/// Change limits for subsequent appends, trimming the oldest records if the
	/// buffer already holds more than the new capacity.
	pub fn reconfigure(&self, capacity: usize, eviction_batch_size: usize) {
		let mut ring = self.lock();
		ring.capacity = capacity.max(1);
		ring.batch = eviction_batch_size.max(1);
		let excess = ring.records.len().saturating_sub(ring.capacity);
		ring.records.drain(..excess);
	}

	pub fn len(&self) -> usize {
		self.lock().records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().records.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.lock().capacity
	}
}

impl Default for MessageBuffer {
	fn default() -> Self {
		Self::new(250, 100)
	}
}
