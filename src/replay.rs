use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::multicast::Subject;
use crate::{scheduler, Error, MulticastStream, Observer, Result, Subscribable, Subscription};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayConfig {
	/// Maximum number of values kept. `None` keeps everything.
	pub buffer_size: Option<usize>,
	/// Maximum age of a kept value. `None` keeps values forever.
	pub window: Option<Duration>,
}

impl ReplayConfig {
	pub fn buffer_size(mut self, size: usize) -> Self {
		self.buffer_size = Some(size);
		self
	}

	pub fn window(mut self, window: Duration) -> Self {
		self.window = Some(window);
		self
	}
}

struct ReplayBody<T> {
	multicast: MulticastStream<T>,
	buffer: RefCell<VecDeque<(T, Duration)>>,
	config: ReplayConfig,
}

/// Multicast that replays a bounded history to late subscribers, including
/// subscribers arriving after completion.
pub struct ReplayStream<T> {
	body: Rc<ReplayBody<T>>,
}

impl<T> Clone for ReplayStream<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> ReplayStream<T>
where
	T: Clone + 'static,
{
	pub fn new(config: ReplayConfig) -> Self {
		ReplayStream {
			body: Rc::new(ReplayBody {
				multicast: MulticastStream::new(),
				buffer: RefCell::new(VecDeque::new()),
				config,
			}),
		}
	}

	pub fn with_buffer_size(size: usize) -> Self {
		Self::new(ReplayConfig::default().buffer_size(size))
	}

	pub fn next(&self, value: T) {
		if self.body.multicast.is_completed() {
			return;
		}
		self.body
			.buffer
			.borrow_mut()
			.push_back((value.clone(), scheduler::now()));
		self.trim();
		self.body.multicast.next(value)
	}

	pub fn error(&self, err: Error) -> Result<()> {
		self.body.multicast.error(err)
	}

	pub fn complete(&self) -> Result<()> {
		self.body.multicast.complete()
	}

	pub fn observer_count(&self) -> usize {
		self.body.multicast.observer_count()
	}

	pub fn buffered(&self) -> Vec<T> {
		self.trim();
		self.body.buffer.borrow().iter().map(|(v, _)| v.clone()).collect()
	}

	fn trim(&self) {
		let mut buffer = self.body.buffer.borrow_mut();
		if let Some(size) = self.body.config.buffer_size {
			while buffer.len() > size {
				buffer.pop_front();
			}
		}
		if let Some(window) = self.body.config.window {
			let now = scheduler::now();
			while buffer.front().map_or(false, |(_, at)| *at + window < now) {
				buffer.pop_front();
			}
		}
	}
}

impl<T> Subscribable for ReplayStream<T>
where
	T: Clone + 'static,
{
	type Item = T;

	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		let replay = self.buffered();

		if let Some(termination) = self.body.multicast.termination() {
			for value in replay {
				observer.next(value);
			}
			termination.deliver(&observer);
			return Subscription::closed();
		}

		let subscription = self
			.body
			.multicast
			.register(observer.clone())
			.unwrap_or_else(Subscription::closed);
		for value in replay {
			observer.next(value);
		}
		subscription
	}
}

impl<T> Subject for ReplayStream<T>
where
	T: Clone + 'static,
{
	fn next(&self, value: T) {
		ReplayStream::next(self, value)
	}

	fn error(&self, err: Error) -> Result<()> {
		ReplayStream::error(self, err)
	}

	fn complete(&self) -> Result<()> {
		ReplayStream::complete(self)
	}

	fn observer_count(&self) -> usize {
		ReplayStream::observer_count(self)
	}
}
