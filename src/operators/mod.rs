//! Operator library.
//!
//! Every operator is a plain function returning `FnOnce(Stream<T>) ->
//! Stream<U>`, so it can be passed to [`Stream::pipe`] or composed with
//! [`pipe!`](crate::pipe). Operator state lives inside the producer and is
//! created again for every subscription. The same operators are available
//! as methods on [`Stream`] for chaining, which also lets closure argument
//! types be inferred from the stream.

use std::time::Duration;

use crate::{Error, Observer, Result, Stream, Subscribable};

mod combine;
mod creation;
mod flatten;
mod recovery;
mod share;
mod timing;
mod transform;

pub use combine::{combine_latest, combine_latest_with, concat_with, merge, merge_with, take_until};
pub use creation::{defer, empty, interval, never, of, throw_error, timer};
pub use flatten::switch_map;
pub use recovery::{catch_error, finalize, retry, retry_with, RetryConfig, RetryDelay, RetryNotice};
pub use share::{share, share_replay, share_with, ShareConfig, ShareReplayConfig};
pub use timing::{
	debounce, debounce_time, delay, throttle, throttle_time, timeout, DebounceConfig, ThrottleConfig,
	TimeoutConfig,
};
pub use transform::{
	distinct_until_changed, filter, first, first_or, last, last_or, map, pairwise, scan, skip,
	start_with, take, take_while, tap, try_map,
};

/// Wraps `source` so that each subscriber's observer is adapted by `setup`
/// before reaching it. `setup` runs once per subscription.
pub(crate) fn lift<T, U>(
	source: Stream<T>,
	setup: impl Fn(Observer<U>) -> Observer<T> + 'static,
) -> Stream<U>
where
	T: 'static,
	U: 'static,
{
	Stream::new(move |observer| Ok(source.subscribe_observer(setup(observer))))
}

impl<T: 'static> Stream<T> {
	pub fn map<U: 'static>(self, func: impl Fn(T) -> U + 'static) -> Stream<U> {
		self.pipe(map(func))
	}

	pub fn try_map<U: 'static>(self, func: impl Fn(T) -> Result<U> + 'static) -> Stream<U> {
		self.pipe(try_map(func))
	}

	pub fn filter(self, predicate: impl Fn(&T) -> bool + 'static) -> Stream<T> {
		self.pipe(filter(predicate))
	}

	pub fn scan<A: Clone + 'static>(self, seed: A, func: impl Fn(&A, T) -> A + 'static) -> Stream<A> {
		self.pipe(scan(seed, func))
	}

	pub fn tap(self, func: impl Fn(&T) + 'static) -> Stream<T> {
		self.pipe(tap(func))
	}

	pub fn take(self, count: usize) -> Stream<T> {
		self.pipe(take(count))
	}

	pub fn skip(self, count: usize) -> Stream<T> {
		self.pipe(skip(count))
	}

	pub fn take_while(self, predicate: impl Fn(&T) -> bool + 'static) -> Stream<T> {
		self.pipe(take_while(predicate))
	}

	pub fn take_until<N: 'static>(self, notifier: Stream<N>) -> Stream<T> {
		self.pipe(take_until(notifier))
	}

	pub fn merge_with(self, other: Stream<T>) -> Stream<T> {
		self.pipe(merge_with(other))
	}

	pub fn concat_with(self, other: Stream<T>) -> Stream<T> {
		self.pipe(concat_with(other))
	}

	pub fn switch_map<U: 'static>(self, project: impl Fn(T) -> Stream<U> + 'static) -> Stream<U> {
		self.pipe(switch_map(project))
	}

	pub fn catch_error(self, selector: impl Fn(Error) -> Stream<T> + 'static) -> Stream<T> {
		self.pipe(catch_error(selector))
	}

	pub fn finalize(self, func: impl Fn() + 'static) -> Stream<T> {
		self.pipe(finalize(func))
	}

	pub fn delay(self, due: Duration) -> Stream<T> {
		self.pipe(delay(due))
	}

	pub fn timeout(self, config: TimeoutConfig) -> Stream<T> {
		self.pipe(timeout(config))
	}
}

impl<T: Clone + 'static> Stream<T> {
	pub fn first(self) -> Stream<T> {
		self.pipe(first())
	}

	pub fn last(self) -> Stream<T> {
		self.pipe(last())
	}

	pub fn start_with(self, value: T) -> Stream<T> {
		self.pipe(start_with(value))
	}

	pub fn pairwise(self) -> Stream<(T, T)> {
		self.pipe(pairwise())
	}

	pub fn combine_latest_with<U: Clone + 'static>(self, other: Stream<U>) -> Stream<(T, U)> {
		self.pipe(combine_latest_with(other))
	}

	pub fn retry(self, count: usize) -> Stream<T> {
		self.pipe(retry(count))
	}

	pub fn retry_with(self, config: RetryConfig<T>) -> Stream<T> {
		self.pipe(retry_with(config))
	}

	pub fn debounce_time(self, due: Duration) -> Stream<T> {
		self.pipe(debounce_time(due))
	}

	pub fn throttle_time(self, duration: Duration, config: ThrottleConfig) -> Stream<T> {
		self.pipe(throttle_time(duration, config))
	}

	pub fn share(self) -> Stream<T> {
		self.pipe(share())
	}

	pub fn share_replay(self, config: ShareReplayConfig) -> Stream<T> {
		self.pipe(share_replay(config))
	}
}

impl<T: Clone + PartialEq + 'static> Stream<T> {
	pub fn distinct_until_changed(self) -> Stream<T> {
		self.pipe(distinct_until_changed())
	}
}
