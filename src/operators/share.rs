use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::multicast::Subject;
use crate::{MulticastStream, Observer, ReplayConfig, ReplayStream, Stream, Subscribable, Subscription};

type Connector<T> = Rc<dyn Fn() -> Rc<dyn Subject<Item = T>>>;

pub struct ShareConfig<T> {
	/// Builds the subject subscribers attach to. A fresh one is created on
	/// every (re)connect.
	pub connector: Connector<T>,
	pub reset_on_error: bool,
	pub reset_on_complete: bool,
	pub reset_on_ref_count_zero: bool,
}

impl<T: Clone + 'static> Default for ShareConfig<T> {
	fn default() -> Self {
		ShareConfig {
			connector: Rc::new(|| -> Rc<dyn Subject<Item = T>> { Rc::new(MulticastStream::<T>::new()) }),
			reset_on_error: true,
			reset_on_complete: true,
			reset_on_ref_count_zero: true,
		}
	}
}

impl<T> Clone for ShareConfig<T> {
	fn clone(&self) -> Self {
		ShareConfig {
			connector: self.connector.clone(),
			reset_on_error: self.reset_on_error,
			reset_on_complete: self.reset_on_complete,
			reset_on_ref_count_zero: self.reset_on_ref_count_zero,
		}
	}
}

impl<T: 'static> ShareConfig<T> {
	pub fn connector<S, F>(mut self, factory: F) -> Self
	where
		S: Subject<Item = T>,
		F: Fn() -> S + 'static,
	{
		self.connector = Rc::new(move || -> Rc<dyn Subject<Item = T>> { Rc::new(factory()) });
		self
	}

	pub fn reset_on_error(mut self, reset: bool) -> Self {
		self.reset_on_error = reset;
		self
	}

	pub fn reset_on_complete(mut self, reset: bool) -> Self {
		self.reset_on_complete = reset;
		self
	}

	pub fn reset_on_ref_count_zero(mut self, reset: bool) -> Self {
		self.reset_on_ref_count_zero = reset;
		self
	}
}

impl<T> std::fmt::Debug for ShareConfig<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ShareConfig")
			.field("reset_on_error", &self.reset_on_error)
			.field("reset_on_complete", &self.reset_on_complete)
			.field("reset_on_ref_count_zero", &self.reset_on_ref_count_zero)
			.finish_non_exhaustive()
	}
}

struct Shared<T> {
	subject: Option<Rc<dyn Subject<Item = T>>>,
	upstream: Option<Subscription>,
	ref_count: usize,
	terminated: bool,
}

impl<T> Shared<T> {
	/// Forgets the subject and hands back the upstream subscription so the
	/// caller can tear it down outside the borrow.
	fn reset(&mut self) -> Option<Subscription> {
		self.subject = None;
		self.terminated = false;
		self.upstream.take()
	}
}

fn reset<T>(shared: &RefCell<Shared<T>>) {
	let upstream = shared.borrow_mut().reset();
	if let Some(upstream) = upstream {
		tracing::debug!("share disconnecting upstream");
		upstream.unsubscribe();
	}
}

/// Multicasts the source through a subject, connecting on the first
/// subscriber.
pub fn share<T: Clone + 'static>() -> impl FnOnce(Stream<T>) -> Stream<T> {
	share_with(ShareConfig::default())
}

pub fn share_with<T: Clone + 'static>(config: ShareConfig<T>) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		let shared = Rc::new(RefCell::new(Shared {
			subject: None,
			upstream: None,
			ref_count: 0,
			terminated: false,
		}));

		Stream::new(move |observer| {
			let (subject, connect) = {
				let mut state = shared.borrow_mut();
				state.ref_count += 1;
				let subject = state
					.subject
					.get_or_insert_with(|| (config.connector)())
					.clone();
				(subject, state.upstream.is_none())
			};

			let inner = subject.subscribe_observer(observer);

			if connect {
				tracing::debug!("share connecting upstream");
				let upstream = Subscription::empty();
				shared.borrow_mut().upstream = Some(upstream.clone());

				let on_next = subject.clone();
				let on_error = (subject.clone(), shared.clone(), config.reset_on_error);
				let on_complete = (subject.clone(), shared.clone(), config.reset_on_complete);
				upstream.add(source.subscribe_observer(Observer::new(
					move |value| on_next.next(value),
					move |err| {
						let (subject, shared, reset_on_error) = &on_error;
						shared.borrow_mut().terminated = true;
						if *reset_on_error {
							reset(shared);
						}
						let _ = subject.error(err);
					},
					move || {
						let (subject, shared, reset_on_complete) = &on_complete;
						shared.borrow_mut().terminated = true;
						if *reset_on_complete {
							reset(shared);
						}
						let _ = subject.complete();
					},
				)));
			}

			let shared = shared.clone();
			let reset_on_ref_count_zero = config.reset_on_ref_count_zero;
			Ok(Subscription::new(move || {
				inner.unsubscribe();
				let disconnect = {
					let mut state = shared.borrow_mut();
					state.ref_count -= 1;
					state.ref_count == 0 && reset_on_ref_count_zero && !state.terminated
				};
				if disconnect {
					reset(&shared);
				}
			}))
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShareReplayConfig {
	pub buffer_size: Option<usize>,
	pub window: Option<Duration>,
	/// Disconnect the source when the last subscriber leaves. Off by
	/// default, so the source keeps running and the buffer stays warm.
	pub reset_on_ref_count_zero: bool,
}

impl ShareReplayConfig {
	pub fn buffer_size(mut self, size: usize) -> Self {
		self.buffer_size = Some(size);
		self
	}

	pub fn window(mut self, window: Duration) -> Self {
		self.window = Some(window);
		self
	}

	pub fn reset_on_ref_count_zero(mut self, reset: bool) -> Self {
		self.reset_on_ref_count_zero = reset;
		self
	}
}

/// `share` through a [`ReplayStream`]. A completed source is never
/// resubscribed; late subscribers get the buffer and the completion.
pub fn share_replay<T: Clone + 'static>(config: ShareReplayConfig) -> impl FnOnce(Stream<T>) -> Stream<T> {
	let replay = ReplayConfig {
		buffer_size: config.buffer_size,
		window: config.window,
	};
	share_with(
		ShareConfig::default()
			.connector(move || ReplayStream::<T>::new(replay))
			.reset_on_error(true)
			.reset_on_complete(false)
			.reset_on_ref_count_zero(config.reset_on_ref_count_zero),
	)
}
