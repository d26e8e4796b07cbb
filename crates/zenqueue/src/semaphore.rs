//! Waitable counter with FIFO waiter ordering.
//!
//! Unlike `tokio::sync::Semaphore`, releases hand permits to waiters
//! directly: when the list is non-empty, `release` pops the oldest waiter
//! and transfers the permit to it without ever exposing the permit on the
//! counter, so a concurrent fast-path `acquire` cannot steal it. This keeps
//! fulfillment order exactly equal to arrival order and gives every waiter
//! its own timeout and a mass-cancellation path, which is what the queue's
//! pull side needs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use crate::error::SemaphoreError;

type Result<T> = std::result::Result<T, SemaphoreError>;

/// What a waiter is woken with.
#[derive(Debug)]
enum Signal {
	/// A `release` popped this waiter; a permit is reserved for it.
	Fulfilled,
	/// `cancel_all` drained the list.
	Cancelled,
}

struct Waiter {
	id: u64,
	tx: oneshot::Sender<Signal>,
}

struct Inner {
	count: usize,
	waiters: VecDeque<Waiter>,
	next_id: u64,
}

impl Inner {
	/// Removes the waiter with the given id. Returns false if a release or
	/// cancellation already consumed it.
	fn remove_waiter(&mut self, id: u64) -> bool {
		match self.waiters.iter().position(|w| w.id == id) {
			Some(index) => {
				self.waiters.remove(index);
				true
			}
			None => false,
		}
	}
}

/// A counting semaphore whose waiters are fulfilled strictly in arrival
/// order, each with an optional timeout.
pub struct Semaphore {
	inner: Mutex<Inner>,
}

impl Semaphore {
	#[must_use]
	pub fn new(initial: usize) -> Self {
		Self {
			inner: Mutex::new(Inner {
				count: initial,
				waiters: VecDeque::new(),
				next_id: 0,
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		// The lock is only held for queue surgery, never across an await,
		// so a poisoned guard still contains consistent state.
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Takes one permit, suspending until a producer provides one.
	///
	/// With `timeout` set, waits at most that long before failing with
	/// [`SemaphoreError::Timeout`]. A waiter that loses the race between
	/// its timer and a near-simultaneous `release` keeps the permit: the
	/// first signal wins.
	pub async fn acquire(&self, timeout: Option<Duration>) -> Result<()> {
		let (id, mut rx) = {
			let mut inner = self.lock();
			if inner.count > 0 {
				inner.count -= 1;
				return Ok(());
			}

			let (tx, rx) = oneshot::channel();
			let id = inner.next_id;
			inner.next_id = inner.next_id.wrapping_add(1);
			inner.waiters.push_back(Waiter { id, tx });
			(id, rx)
		};

		let signal = match timeout {
			Some(limit) => match time::timeout(limit, &mut rx).await {
				Ok(signal) => signal,
				Err(_elapsed) => {
					let removed = self.lock().remove_waiter(id);
					if removed {
						return Err(SemaphoreError::Timeout);
					}
					// A release popped this waiter before the timer could
					// finalize it; consume the handoff instead.
					rx.await
				}
			},
			None => rx.await,
		};

		match signal {
			// The handoff already carries the permit; nothing to decrement.
			Ok(Signal::Fulfilled) => Ok(()),
			Ok(Signal::Cancelled) => Err(SemaphoreError::WaitCancelled),
			// The semaphore itself was dropped while we waited.
			Err(_) => Err(SemaphoreError::WaitCancelled),
		}
	}

	/// Returns one permit. If waiters are queued, the oldest one receives
	/// the permit directly; otherwise the counter is incremented.
	pub fn release(&self) {
		let mut inner = self.lock();
		while let Some(waiter) = inner.waiters.pop_front() {
			if waiter.tx.send(Signal::Fulfilled).is_ok() {
				return;
			}
			// The waiting task was dropped without deregistering; try the
			// next waiter in line.
		}
		inner.count += 1;
	}

	/// Fails every queued waiter with [`SemaphoreError::WaitCancelled`] and
	/// empties the list. The counter is untouched.
	pub fn cancel_all(&self) {
		let mut inner = self.lock();
		while let Some(waiter) = inner.waiters.pop_front() {
			let _ = waiter.tx.send(Signal::Cancelled);
		}
	}

	/// Current number of available permits.
	#[must_use]
	pub fn count(&self) -> usize {
		self.lock().count
	}

	/// Current length of the waiter list.
	#[must_use]
	pub fn waiters(&self) -> usize {
		self.lock().waiters.len()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Instant;

	use super::*;

	#[tokio::test]
	async fn test_fast_path_does_not_block() {
		let sem = Semaphore::new(2);

		sem.acquire(None).await.unwrap();
		sem.acquire(Some(Duration::from_millis(1))).await.unwrap();

		assert_eq!(sem.count(), 0);
		assert_eq!(sem.waiters(), 0);
	}

	#[tokio::test]
	async fn test_acquire_times_out_on_empty_semaphore() {
		let sem = Semaphore::new(0);
		let started = Instant::now();

		let result = sem.acquire(Some(Duration::from_millis(50))).await;

		assert_eq!(result, Err(SemaphoreError::Timeout));
		let elapsed = started.elapsed();
		assert!(elapsed >= Duration::from_millis(50));
		assert!(elapsed < Duration::from_millis(500));
		assert_eq!(sem.waiters(), 0);
	}

	#[tokio::test]
	async fn test_release_wakes_blocked_acquire() {
		let sem = Arc::new(Semaphore::new(0));

		let waiter = {
			let sem = sem.clone();
			tokio::spawn(async move { sem.acquire(Some(Duration::from_secs(2))).await })
		};

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(sem.waiters(), 1);
		sem.release();

		waiter.await.unwrap().unwrap();
		assert_eq!(sem.count(), 0);
		assert_eq!(sem.waiters(), 0);
	}

	#[tokio::test]
	async fn test_waiters_are_fulfilled_in_arrival_order() {
		let sem = Arc::new(Semaphore::new(0));
		let (order_tx, mut order_rx) = tokio::sync::mpsc::unbounded_channel();

		let mut handles = Vec::new();
		for tag in 0..3 {
			let sem = sem.clone();
			let order_tx = order_tx.clone();
			handles.push(tokio::spawn(async move {
				sem.acquire(None).await.unwrap();
				order_tx.send(tag).unwrap();
			}));
			// Give each waiter time to enqueue before the next arrives.
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
		assert_eq!(sem.waiters(), 3);

		for _ in 0..3 {
			sem.release();
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let mut woken = Vec::new();
		while let Ok(tag) = order_rx.try_recv() {
			woken.push(tag);
		}
		assert_eq!(woken, vec![0, 1, 2]);
	}

	#[tokio::test]
	async fn test_timed_out_waiter_is_skipped_by_release() {
		let sem = Arc::new(Semaphore::new(0));

		let loser = {
			let sem = sem.clone();
			tokio::spawn(async move { sem.acquire(Some(Duration::from_millis(40))).await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;
		let winner = {
			let sem = sem.clone();
			tokio::spawn(async move { sem.acquire(Some(Duration::from_secs(2))).await })
		};

		tokio::time::sleep(Duration::from_millis(80)).await;
		assert_eq!(loser.await.unwrap(), Err(SemaphoreError::Timeout));
		assert_eq!(sem.waiters(), 1);

		sem.release();
		winner.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_cancel_all_fails_every_waiter() {
		let sem = Arc::new(Semaphore::new(0));

		let mut handles = Vec::new();
		for _ in 0..4 {
			let sem = sem.clone();
			handles.push(tokio::spawn(async move { sem.acquire(None).await }));
		}
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(sem.waiters(), 4);

		sem.cancel_all();

		for handle in handles {
			assert_eq!(handle.await.unwrap(), Err(SemaphoreError::WaitCancelled));
		}
		assert_eq!(sem.waiters(), 0);
		assert_eq!(sem.count(), 0);
	}

	#[tokio::test]
	async fn test_counter_accounts_for_handoffs() {
		let sem = Arc::new(Semaphore::new(0));

		let waiter = {
			let sem = sem.clone();
			tokio::spawn(async move { sem.acquire(None).await })
		};
		tokio::time::sleep(Duration::from_millis(30)).await;

		sem.release();
		waiter.await.unwrap().unwrap();

		// The woken waiter consumed the released permit.
		assert_eq!(sem.count(), 0);

		sem.release();
		sem.release();
		assert_eq!(sem.count(), 2);
	}

	#[tokio::test]
	async fn test_release_with_dropped_waiter_keeps_permit() {
		let sem = Arc::new(Semaphore::new(0));

		let abandoned = {
			let sem = sem.clone();
			tokio::spawn(async move { sem.acquire(None).await })
		};
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert_eq!(sem.waiters(), 1);
		abandoned.abort();
		let _ = abandoned.await;

		sem.release();
		// The dropped waiter could not take the handoff, so the permit
		// remains available.
		assert_eq!(sem.count(), 1);
		sem.acquire(Some(Duration::from_millis(10))).await.unwrap();
	}
}
