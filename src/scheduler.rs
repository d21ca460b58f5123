//! Thread-local cooperative event loop.
//!
//! Timers, microtasks and local futures all run on the thread that created
//! them. Nothing runs unless the loop is driven with [`run`], [`advance`] or
//! [`run_microtasks`]. With the default [`Clock::Virtual`] time only moves
//! inside those calls, so timing behaviour is fully deterministic.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use fxhash::FxHashMap;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
	/// Time advances only when the loop is driven.
	#[default]
	Virtual,
	/// Time follows the wall clock; the loop sleeps until the next timer.
	Realtime,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
	pub clock: Clock,
}

impl SchedulerConfig {
	pub fn clock(mut self, clock: Clock) -> Self {
		self.clock = clock;
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
	pub fn cancel(self) {
		clear(self)
	}
}

enum Task {
	Once(Box<dyn FnOnce()>),
	Repeat(Rc<dyn Fn()>, Duration),
}

struct Timers {
	clock: Clock,
	origin: Instant,
	now: Duration,
	seq: u64,
	queue: BTreeMap<(Duration, u64), ()>,
	tasks: FxHashMap<u64, (Duration, Task)>,
}

impl Timers {
	fn now(&self) -> Duration {
		match self.clock {
			Clock::Virtual => self.now,
			Clock::Realtime => self.origin.elapsed(),
		}
	}

	fn insert(&mut self, due: Duration, task: Task) -> TimerHandle {
		self.seq += 1;
		let id = self.seq;
		self.queue.insert((due, id), ());
		self.tasks.insert(id, (due, task));
		TimerHandle(id)
	}

	fn remove(&mut self, id: u64) -> Option<Task> {
		let (due, task) = self.tasks.remove(&id)?;
		self.queue.remove(&(due, id));
		Some(task)
	}

	fn peek(&self) -> Option<Duration> {
		self.queue.keys().next().map(|(due, _)| *due)
	}

	/// Pops the earliest timer. Repeating timers are re-armed before they
	/// run so that a cancel issued from inside the callback sticks.
	fn pop(&mut self) -> Option<(Duration, Runnable)> {
		let (due, id) = *self.queue.keys().next()?;
		let task = self.remove(id)?;
		let runnable = match task {
			Task::Once(func) => Runnable::Once(func),
			Task::Repeat(func, period) => {
				self.queue.insert((due + period, id), ());
				self.tasks
					.insert(id, (due + period, Task::Repeat(func.clone(), period)));
				Runnable::Repeat(func)
			}
		};
		Some((due, runnable))
	}
}

enum Runnable {
	Once(Box<dyn FnOnce()>),
	Repeat(Rc<dyn Fn()>),
}

impl Runnable {
	fn run(self) {
		match self {
			Runnable::Once(func) => func(),
			Runnable::Repeat(func) => func(),
		}
	}
}

struct Scheduler {
	timers: RefCell<Timers>,
	microtasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
	pool: RefCell<LocalPool>,
	spawner: LocalSpawner,
}

impl Scheduler {
	fn new() -> Self {
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		Scheduler {
			timers: RefCell::new(Timers {
				clock: Clock::Virtual,
				origin: Instant::now(),
				now: Duration::ZERO,
				seq: 0,
				queue: BTreeMap::new(),
				tasks: FxHashMap::default(),
			}),
			microtasks: RefCell::new(VecDeque::new()),
			pool: RefCell::new(pool),
			spawner,
		}
	}
}

thread_local! {
	static SCHEDULER: Scheduler = Scheduler::new();
}

/// Replaces the clock and drops every pending timer and microtask.
pub fn configure(config: SchedulerConfig) {
	let dropped = SCHEDULER.with(|s| {
		let mut timers = s.timers.borrow_mut();
		timers.clock = config.clock;
		timers.origin = Instant::now();
		timers.now = Duration::ZERO;
		timers.queue.clear();
		let tasks = std::mem::take(&mut timers.tasks);
		let microtasks = std::mem::take(&mut *s.microtasks.borrow_mut());
		(tasks, microtasks)
	});
	std::mem::drop(dropped);
	tracing::debug!(clock = ?config.clock, "scheduler configured");
}

pub fn now() -> Duration {
	SCHEDULER.with(|s| s.timers.borrow().now())
}

pub fn set_timeout(delay: Duration, func: impl FnOnce() + 'static) -> TimerHandle {
	SCHEDULER.with(|s| {
		let mut timers = s.timers.borrow_mut();
		let due = timers.now() + delay;
		timers.insert(due, Task::Once(Box::new(func)))
	})
}

pub fn set_interval(period: Duration, func: impl Fn() + 'static) -> TimerHandle {
	SCHEDULER.with(|s| {
		let mut timers = s.timers.borrow_mut();
		let due = timers.now() + period;
		timers.insert(due, Task::Repeat(Rc::new(func), period))
	})
}

pub fn clear(handle: TimerHandle) {
	let task = SCHEDULER.with(|s| s.timers.borrow_mut().remove(handle.0));
	std::mem::drop(task);
}

pub fn pending_timers() -> usize {
	SCHEDULER.with(|s| s.timers.borrow().tasks.len())
}

pub fn queue_microtask(func: impl FnOnce() + 'static) {
	SCHEDULER.with(|s| s.microtasks.borrow_mut().push_back(Box::new(func)))
}

pub fn spawn_local(future: impl Future<Output = ()> + 'static) -> Result<()> {
	SCHEDULER.with(|s| s.spawner.spawn_local(future))?;
	Ok(())
}

/// Drains microtasks and polls local futures until both are idle.
pub fn run_microtasks() {
	loop {
		while let Some(task) = SCHEDULER.with(|s| s.microtasks.borrow_mut().pop_front()) {
			task();
		}

		SCHEDULER.with(|s| {
			if let Ok(mut pool) = s.pool.try_borrow_mut() {
				pool.run_until_stalled();
			}
		});

		if SCHEDULER.with(|s| s.microtasks.borrow().is_empty()) {
			break;
		}
	}
}

fn next_due(limit: Option<Duration>) -> Option<(Duration, Runnable)> {
	SCHEDULER.with(|s| {
		let mut timers = s.timers.borrow_mut();
		let due = timers.peek()?;
		if limit.map_or(false, |limit| due > limit) {
			return None;
		}

		if timers.clock == Clock::Realtime {
			let elapsed = timers.origin.elapsed();
			if due > elapsed {
				std::thread::sleep(due - elapsed);
			}
		}

		let (due, runnable) = timers.pop()?;
		if timers.clock == Clock::Virtual && due > timers.now {
			timers.now = due;
		}
		Some((due, runnable))
	})
}

/// Moves time forward by `by`, running every timer that falls due in order.
pub fn advance(by: Duration) {
	let target = now() + by;
	run_microtasks();

	while let Some((due, runnable)) = next_due(Some(target)) {
		tracing::trace!(?due, "timer fired");
		runnable.run();
		run_microtasks();
	}

	SCHEDULER.with(|s| {
		let mut timers = s.timers.borrow_mut();
		match timers.clock {
			Clock::Virtual => timers.now = target,
			Clock::Realtime => {
				let elapsed = timers.origin.elapsed();
				if target > elapsed {
					std::thread::sleep(target - elapsed);
				}
			}
		}
	});
}

/// Runs the loop until no timers are left. Never returns while an interval
/// is still armed.
pub fn run() {
	run_microtasks();
	while let Some((due, runnable)) = next_due(None) {
		tracing::trace!(?due, "timer fired");
		runnable.run();
		run_microtasks();
	}
}

/// Future resolved by a scheduler timer. Dropping it cancels the timer.
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
	handle: Option<TimerHandle>,
	rx: oneshot::Receiver<()>,
}

pub fn sleep(duration: Duration) -> Sleep {
	let (tx, rx) = oneshot::channel();
	let handle = set_timeout(duration, move || {
		let _ = tx.send(());
	});
	Sleep {
		handle: Some(handle),
		rx,
	}
}

impl Future for Sleep {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(_) => {
				self.handle = None;
				Poll::Ready(())
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl Drop for Sleep {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.cancel();
		}
	}
}
