use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::{scheduler, Error, Stream, Subscribable, Subscription};

/// Emits `value` and completes.
pub fn of<T>(value: T) -> Stream<T>
where
	T: Clone + 'static,
{
	Stream::new(move |observer| {
		observer.next(value.clone());
		observer.complete();
		Ok(Subscription::empty())
	})
}

pub fn empty<T: 'static>() -> Stream<T> {
	Stream::new(|observer| {
		observer.complete();
		Ok(Subscription::empty())
	})
}

pub fn never<T: 'static>() -> Stream<T> {
	Stream::new(|_| Ok(Subscription::empty()))
}

pub fn throw_error<T: 'static>(err: Error) -> Stream<T> {
	Stream::new(move |_| Err(err.clone()))
}

/// Builds the actual stream lazily, once per subscription.
pub fn defer<T, F>(factory: F) -> Stream<T>
where
	T: 'static,
	F: Fn() -> Stream<T> + 'static,
{
	Stream::new(move |observer| Ok(factory().subscribe_observer(observer)))
}

/// Emits `0` after `delay`, then completes.
pub fn timer(delay: Duration) -> Stream<u64> {
	Stream::new(move |observer| {
		let handle = scheduler::set_timeout(delay, move || {
			observer.next(0);
			observer.complete();
		});
		Ok(Subscription::new(move || handle.cancel()))
	})
}

/// Emits `0, 1, 2, ...` every `period`. Never completes.
pub fn interval(period: Duration) -> Stream<u64> {
	Stream::new(move |observer| {
		let counter = Rc::new(Cell::new(0u64));
		let handle = scheduler::set_interval(period, move || {
			let n = counter.get();
			counter.set(n + 1);
			observer.next(n);
		});
		Ok(Subscription::new(move || handle.cancel()))
	})
}
