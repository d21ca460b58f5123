use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use super::creation::timer;
use super::transform::map;
use crate::{Error, Observer, Stream, Subscribable, Subscription};

/// Replaces a failed source with the stream returned by `selector`.
pub fn catch_error<T, F>(selector: F) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: 'static,
	F: Fn(Error) -> Stream<T> + 'static,
{
	let selector = Rc::new(selector);
	move |source| {
		Stream::new(move |observer| {
			let subscription = Subscription::empty();
			let fallback = subscription.clone();
			let selector = selector.clone();
			let target = observer.clone();
			let on_complete = observer.clone();
			let link = observer.clone();
			subscription.add(source.subscribe_observer(Observer::chained(
				&link,
				move |value| target.next(value),
				move |err| {
					tracing::debug!(%err, "catch_error switching to fallback");
					if !fallback.is_closed() {
						fallback.add(selector(err).subscribe_observer(observer.clone()));
					}
				},
				move || on_complete.complete(),
			)));
			Ok(subscription)
		})
	}
}

/// Runs `func` exactly once when the subscription ends, whether through
/// completion, error or unsubscribe.
pub fn finalize<T, F>(func: F) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: 'static,
	F: Fn() + 'static,
{
	let func = Rc::new(func);
	move |source| {
		Stream::new(move |observer| {
			let subscription = Subscription::empty();
			subscription.add(source.subscribe_observer(observer));
			let func = func.clone();
			subscription.add_fn(move || func());
			Ok(subscription)
		})
	}
}

/// What a retry delay selector gets to look at.
#[derive(Debug, Clone)]
pub struct RetryNotice<T> {
	pub error: Error,
	/// 1 for the first retry.
	pub attempt: usize,
	/// Most recent value seen from the source, across attempts.
	pub last_value: Option<T>,
}

type DelaySelector<T> = Rc<dyn Fn(&RetryNotice<T>) -> Stream<()>>;

pub enum RetryDelay<T> {
	/// Resubscribe synchronously.
	Immediate,
	Fixed(Duration),
	/// Resubscribe when the returned stream first emits. If it completes
	/// without emitting the result completes, if it errors the result errors.
	Selector(DelaySelector<T>),
}

impl<T: 'static> RetryDelay<T> {
	pub fn selector<D, F>(func: F) -> Self
	where
		D: 'static,
		F: Fn(&RetryNotice<T>) -> Stream<D> + 'static,
	{
		RetryDelay::Selector(Rc::new(move |notice| func(notice).pipe(map(|_| ()))))
	}
}

impl<T> Clone for RetryDelay<T> {
	fn clone(&self) -> Self {
		match self {
			RetryDelay::Immediate => RetryDelay::Immediate,
			RetryDelay::Fixed(delay) => RetryDelay::Fixed(*delay),
			RetryDelay::Selector(func) => RetryDelay::Selector(func.clone()),
		}
	}
}

impl<T> std::fmt::Debug for RetryDelay<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RetryDelay::Immediate => f.write_str("Immediate"),
			RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
			RetryDelay::Selector(_) => f.write_str("Selector(..)"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct RetryConfig<T> {
	/// Maximum number of resubscriptions. `None` retries forever.
	pub count: Option<usize>,
	pub delay: RetryDelay<T>,
	/// Reset the attempt counter whenever the source emits.
	pub reset_on_success: bool,
}

impl<T> Default for RetryConfig<T> {
	fn default() -> Self {
		RetryConfig {
			count: None,
			delay: RetryDelay::Immediate,
			reset_on_success: false,
		}
	}
}

impl<T> RetryConfig<T> {
	pub fn count(mut self, count: usize) -> Self {
		self.count = Some(count);
		self
	}

	pub fn delay(mut self, delay: RetryDelay<T>) -> Self {
		self.delay = delay;
		self
	}

	pub fn reset_on_success(mut self, reset: bool) -> Self {
		self.reset_on_success = reset;
		self
	}
}

struct RetryRun<T> {
	source: Stream<T>,
	config: RetryConfig<T>,
	observer: Observer<T>,
	attempt: Cell<usize>,
	last_value: RefCell<Option<T>>,
	current: RefCell<Subscription>,
	waiting: RefCell<Option<Subscription>>,
	subscribing: Cell<bool>,
	again: Cell<bool>,
	stopped: Cell<bool>,
}

impl<T: Clone + 'static> RetryRun<T> {
	/// Subscribes to the source. A source that fails synchronously asks for
	/// another round through `again` instead of recursing.
	fn subscribe(this: &Rc<Self>) {
		if this.subscribing.get() {
			this.again.set(true);
			return;
		}
		this.subscribing.set(true);
		loop {
			this.again.set(false);
			let previous = this.current.replace(Subscription::empty());
			previous.unsubscribe();
			if this.stopped.get() || this.observer.is_closed() {
				break;
			}

			let holder = this.current.borrow().clone();
			holder.add(this.source.subscribe_observer(Self::attempt_observer(this)));
			if !this.again.get() {
				break;
			}
		}
		this.subscribing.set(false);
	}

	fn attempt_observer(this: &Rc<Self>) -> Observer<T> {
		let on_next = Rc::downgrade(this);
		let on_error = Rc::downgrade(this);
		let on_complete = this.observer.clone();
		Observer::chained(
			&this.observer,
			move |value: T| {
				if let Some(this) = on_next.upgrade() {
					if this.config.reset_on_success {
						this.attempt.set(0);
					}
					*this.last_value.borrow_mut() = Some(value.clone());
					this.observer.next(value);
				}
			},
			move |err| {
				if let Some(this) = on_error.upgrade() {
					Self::failed(&this, err);
				}
			},
			move || on_complete.complete(),
		)
	}

	fn failed(this: &Rc<Self>, err: Error) {
		let attempt = this.attempt.get() + 1;
		if this.config.count.map_or(false, |count| attempt > count) {
			tracing::debug!(%err, attempts = attempt - 1, "retry giving up");
			this.observer.error(err);
			return;
		}
		this.attempt.set(attempt);
		tracing::debug!(%err, attempt, "retrying");

		match &this.config.delay {
			RetryDelay::Immediate => Self::subscribe(this),
			RetryDelay::Fixed(delay) if delay.is_zero() => Self::subscribe(this),
			RetryDelay::Fixed(delay) => Self::wait(this, timer(*delay).pipe(map(|_| ()))),
			RetryDelay::Selector(select) => {
				let notice = RetryNotice {
					error: err,
					attempt,
					last_value: this.last_value.borrow().clone(),
				};
				let notifier = select(&notice);
				Self::wait(this, notifier)
			}
		}
	}

	fn wait(this: &Rc<Self>, notifier: Stream<()>) {
		let holder = Subscription::empty();
		if let Some(previous) = this.waiting.replace(Some(holder.clone())) {
			previous.unsubscribe();
		}

		let resume: Weak<Self> = Rc::downgrade(this);
		let on_error = this.observer.clone();
		let on_complete = this.observer.clone();
		holder.add(notifier.subscribe_observer(Observer::chained(
			&this.observer,
			move |()| {
				if let Some(this) = resume.upgrade() {
					let waiting = this.waiting.borrow_mut().take();
					if let Some(waiting) = waiting {
						waiting.unsubscribe();
					}
					Self::subscribe(&this);
				}
			},
			move |err| on_error.error(err),
			move || on_complete.complete(),
		)));
	}

	fn stop(&self) {
		self.stopped.set(true);
		let current = self.current.borrow().clone();
		current.unsubscribe();
		let waiting = self.waiting.borrow_mut().take();
		if let Some(waiting) = waiting {
			waiting.unsubscribe();
		}
	}
}

/// Resubscribes to the source on error, up to `count` times.
pub fn retry<T: Clone + 'static>(count: usize) -> impl FnOnce(Stream<T>) -> Stream<T> {
	retry_with(RetryConfig::default().count(count))
}

pub fn retry_with<T: Clone + 'static>(config: RetryConfig<T>) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		Stream::new(move |observer| {
			let run = Rc::new(RetryRun {
				source: source.clone(),
				config: config.clone(),
				observer,
				attempt: Cell::new(0),
				last_value: RefCell::new(None),
				current: RefCell::new(Subscription::empty()),
				waiting: RefCell::new(None),
				subscribing: Cell::new(false),
				again: Cell::new(false),
				stopped: Cell::new(false),
			});
			RetryRun::subscribe(&run);
			Ok(Subscription::new(move || run.stop()))
		})
	}
}
