use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use fxhash::FxHashMap;

use super::creation::timer;
use crate::{Error, Observer, Stream, Subscribable, Subscription};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceConfig {
	/// Emit the very first value right away and debounce the rest.
	pub emit_first: bool,
}

impl DebounceConfig {
	pub fn emit_first(mut self, emit_first: bool) -> Self {
		self.emit_first = emit_first;
		self
	}
}

struct Debounce<T> {
	observer: Observer<T>,
	pending: RefCell<Option<T>>,
	window: RefCell<Option<Subscription>>,
	emitted_first: Cell<bool>,
}

impl<T: 'static> Debounce<T> {
	fn cancel_window(&self) {
		let window = self.window.borrow_mut().take();
		if let Some(window) = window {
			window.unsubscribe();
		}
	}

	fn flush(&self) {
		self.cancel_window();
		let pending = self.pending.borrow_mut().take();
		if let Some(value) = pending {
			self.observer.next(value);
		}
	}
}

/// Emits a value only once the stream returned by `selector` for it emits
/// before the source produced another value. Completion flushes the pending
/// value first.
pub fn debounce<T, D, F>(selector: F, config: DebounceConfig) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: Clone + 'static,
	D: 'static,
	F: Fn(&T) -> Stream<D> + 'static,
{
	let selector = Rc::new(selector);
	move |source| {
		Stream::new(move |observer| {
			let state = Rc::new(Debounce {
				observer: observer.clone(),
				pending: RefCell::new(None),
				window: RefCell::new(None),
				emitted_first: Cell::new(false),
			});

			let on_next = {
				let state = state.clone();
				let selector = selector.clone();
				move |value: T| {
					if config.emit_first && !state.emitted_first.replace(true) {
						state.observer.next(value);
						return;
					}

					state.cancel_window();
					*state.pending.borrow_mut() = Some(value.clone());

					let holder = Subscription::empty();
					*state.window.borrow_mut() = Some(holder.clone());
					let fire: Weak<Debounce<T>> = Rc::downgrade(&state);
					let on_error = state.observer.clone();
					holder.add(selector(&value).subscribe_observer(Observer::chained(
						&state.observer,
						move |_| {
							if let Some(state) = fire.upgrade() {
								state.flush();
							}
						},
						move |err| on_error.error(err),
						|| {},
					)));
				}
			};

			let on_complete = {
				let state = state.clone();
				move || {
					state.flush();
					state.observer.complete();
				}
			};

			let subscription = Subscription::empty();
			subscription.add(source.subscribe_observer(Observer::chained(
				&state.observer,
				on_next,
				move |err| observer.error(err),
				on_complete,
			)));
			subscription.add_fn(move || state.cancel_window());
			Ok(subscription)
		})
	}
}

pub fn debounce_time<T: Clone + 'static>(due: Duration) -> impl FnOnce(Stream<T>) -> Stream<T> {
	debounce(move |_: &T| timer(due), DebounceConfig::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
	pub leading: bool,
	pub trailing: bool,
}

impl Default for ThrottleConfig {
	fn default() -> Self {
		ThrottleConfig {
			leading: true,
			trailing: false,
		}
	}
}

impl ThrottleConfig {
	pub fn leading(mut self, leading: bool) -> Self {
		self.leading = leading;
		self
	}

	pub fn trailing(mut self, trailing: bool) -> Self {
		self.trailing = trailing;
		self
	}
}

struct Throttle<T> {
	observer: Observer<T>,
	config: ThrottleConfig,
	selector: Rc<dyn Fn(&T) -> Stream<()>>,
	send_value: RefCell<Option<T>>,
	throttled: RefCell<Option<Subscription>>,
	completed: Cell<bool>,
}

impl<T: Clone + 'static> Throttle<T> {
	fn is_throttling(&self) -> bool {
		self.throttled
			.borrow()
			.as_ref()
			.map_or(false, |window| !window.is_closed())
	}

	fn start(this: &Rc<Self>, value: &T) {
		let holder = Subscription::empty();
		*this.throttled.borrow_mut() = Some(holder.clone());

		let on_next: Weak<Self> = Rc::downgrade(this);
		let on_complete: Weak<Self> = Rc::downgrade(this);
		let on_error = this.observer.clone();
		holder.add((this.selector)(value).subscribe_observer(Observer::chained(
			&this.observer,
			move |()| {
				if let Some(this) = on_next.upgrade() {
					Self::end(&this);
				}
			},
			move |err| on_error.error(err),
			move || {
				if let Some(this) = on_complete.upgrade() {
					this.throttled.borrow_mut().take();
					if this.completed.get() {
						this.observer.complete();
					}
				}
			},
		)));
	}

	fn end(this: &Rc<Self>) {
		let window = this.throttled.borrow_mut().take();
		if let Some(window) = window {
			window.unsubscribe();
		}
		if this.config.trailing {
			Self::send(this);
			if this.completed.get() {
				this.observer.complete();
			}
		}
	}

	fn send(this: &Rc<Self>) {
		let value = this.send_value.borrow_mut().take();
		if let Some(value) = value {
			this.observer.next(value.clone());
			if !this.completed.get() {
				Self::start(this, &value);
			}
		}
	}
}

/// Emits a value, then ignores the source while the stream returned by
/// `selector` for that value is pending.
///
/// With `trailing` the last value seen inside a window is emitted when the
/// window closes, which starts a new window.
pub fn throttle<T, D, F>(selector: F, config: ThrottleConfig) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: Clone + 'static,
	D: 'static,
	F: Fn(&T) -> Stream<D> + 'static,
{
	let selector: Rc<dyn Fn(&T) -> Stream<()>> =
		Rc::new(move |value: &T| selector(value).pipe(super::map(|_| ())));
	move |source| {
		Stream::new(move |observer| {
			let state = Rc::new(Throttle {
				observer: observer.clone(),
				config,
				selector: selector.clone(),
				send_value: RefCell::new(None),
				throttled: RefCell::new(None),
				completed: Cell::new(false),
			});

			let on_next = {
				let state = state.clone();
				move |value: T| {
					*state.send_value.borrow_mut() = Some(value.clone());
					if !state.is_throttling() {
						if state.config.leading {
							Throttle::send(&state);
						} else {
							Throttle::start(&state, &value);
						}
					}
				}
			};

			let on_complete = {
				let state = state.clone();
				move || {
					state.completed.set(true);
					let trailing_due = state.config.trailing
						&& state.send_value.borrow().is_some()
						&& state.is_throttling();
					if !trailing_due {
						state.observer.complete();
					}
				}
			};

			let subscription = Subscription::empty();
			subscription.add(source.subscribe_observer(Observer::chained(
				&state.observer,
				on_next,
				move |err| observer.error(err),
				on_complete,
			)));
			subscription.add_fn(move || {
				let window = state.throttled.borrow_mut().take();
				if let Some(window) = window {
					window.unsubscribe();
				}
			});
			Ok(subscription)
		})
	}
}

pub fn throttle_time<T: Clone + 'static>(
	duration: Duration,
	config: ThrottleConfig,
) -> impl FnOnce(Stream<T>) -> Stream<T> {
	throttle(move |_: &T| timer(duration), config)
}

/// Shifts every notification but errors forward in time by `due`.
pub fn delay<T: 'static>(due: Duration) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		Stream::new(move |observer| {
			let pending: Rc<RefCell<FxHashMap<u64, Subscription>>> = Rc::default();
			let seq = Rc::new(Cell::new(0u64));

			let schedule = {
				let pending = pending.clone();
				Rc::new(move |func: Box<dyn FnOnce()>| {
					let key = seq.get();
					seq.set(key + 1);
					let done = pending.clone();
					let func = Cell::new(Some(func));
					let window = timer(due).subscribe_observer(Observer::new(
						move |_| {
							done.borrow_mut().remove(&key);
							if let Some(func) = func.take() {
								func();
							}
						},
						|_| {},
						|| {},
					));
					if !window.is_closed() {
						pending.borrow_mut().insert(key, window);
					}
				})
			};

			let on_next = {
				let schedule = schedule.clone();
				let observer = observer.clone();
				move |value: T| {
					let observer = observer.clone();
					schedule(Box::new(move || observer.next(value)));
				}
			};
			let on_complete = {
				let observer = observer.clone();
				move || {
					let observer = observer.clone();
					schedule(Box::new(move || observer.complete()));
				}
			};

			let subscription = Subscription::empty();
			let link = observer.clone();
			subscription.add(source.subscribe_observer(Observer::chained(
				&link,
				on_next,
				move |err| observer.error(err),
				on_complete,
			)));
			subscription.add_fn(move || {
				let windows: Vec<Subscription> = pending.borrow_mut().drain().map(|(_, w)| w).collect();
				for window in windows {
					window.unsubscribe();
				}
			});
			Ok(subscription)
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutConfig {
	/// Deadline for the first value. Falls back to `each`.
	pub first: Option<Duration>,
	/// Maximum gap after every value.
	pub each: Option<Duration>,
}

impl TimeoutConfig {
	pub fn first(mut self, first: Duration) -> Self {
		self.first = Some(first);
		self
	}

	pub fn each(mut self, each: Duration) -> Self {
		self.each = Some(each);
		self
	}
}

/// Fails with [`Error::Timeout`] when a deadline passes without a value.
pub fn timeout<T: 'static>(config: TimeoutConfig) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		Stream::new(move |observer| {
			let deadline: Rc<RefCell<Option<Subscription>>> = Rc::default();

			let disarm = {
				let deadline = deadline.clone();
				Rc::new(move || {
					let window = deadline.borrow_mut().take();
					if let Some(window) = window {
						window.unsubscribe();
					}
				})
			};

			let arm = {
				let deadline = deadline.clone();
				let disarm = disarm.clone();
				let observer = observer.clone();
				Rc::new(move |due: Duration| {
					disarm();
					let observer = observer.clone();
					let window = timer(due).subscribe_observer(Observer::new(
						move |_| {
							tracing::debug!(?due, "timeout elapsed");
							observer.error(Error::Timeout);
						},
						|_| {},
						|| {},
					));
					*deadline.borrow_mut() = Some(window);
				})
			};

			if let Some(first) = config.first.or(config.each) {
				arm(first);
			}

			let on_next = {
				let disarm = disarm.clone();
				let observer = observer.clone();
				move |value: T| {
					disarm();
					observer.next(value);
					if let Some(each) = config.each {
						if !observer.is_closed() {
							arm(each);
						}
					}
				}
			};
			let on_error = {
				let disarm = disarm.clone();
				let observer = observer.clone();
				move |err| {
					disarm();
					observer.error(err);
				}
			};
			let on_complete = {
				let disarm = disarm.clone();
				let observer = observer.clone();
				move || {
					disarm();
					observer.complete();
				}
			};

			let subscription = Subscription::empty();
			subscription.add(source.subscribe_observer(Observer::chained(
				&observer,
				on_next,
				on_error,
				on_complete,
			)));
			subscription.add_fn(move || disarm());
			Ok(subscription)
		})
	}
}
