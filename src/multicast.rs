use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::{Error, Observer, Result, Subscribable, Subscription};

/// A writable, hot source. Implemented by every multicast flavour so that
/// operators such as `share` can pick their connector.
pub trait Subject: Subscribable {
	fn next(&self, value: Self::Item);

	fn error(&self, err: Error) -> Result<()>;

	fn complete(&self) -> Result<()>;

	fn observer_count(&self) -> usize;
}

#[derive(Clone)]
pub(crate) enum Termination {
	Completed,
	Errored(Error),
}

impl Termination {
	pub(crate) fn deliver<T: 'static>(&self, observer: &Observer<T>) {
		let observer = observer.guarded();
		match self {
			Termination::Completed => observer.complete(),
			Termination::Errored(err) => observer.error(err.clone()),
		}
	}
}

struct MulticastInner<T> {
	observers: SmallVec<[(u64, Observer<T>); 4]>,
	next_id: u64,
	terminated: Option<Termination>,
}

pub struct MulticastBody<T> {
	inner: RefCell<MulticastInner<T>>,
}

/// Hot broadcast stream. `next` fans out to the observers registered at the
/// moment of the call, in subscription order.
pub struct MulticastStream<T> {
	body: Rc<MulticastBody<T>>,
}

impl<T> Clone for MulticastStream<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for MulticastStream<T>
where
	T: Clone + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<T> MulticastStream<T>
where
	T: Clone + 'static,
{
	pub fn new() -> Self {
		MulticastStream {
			body: Rc::new(MulticastBody {
				inner: RefCell::new(MulticastInner {
					observers: SmallVec::new(),
					next_id: 0,
					terminated: None,
				}),
			}),
		}
	}

	pub fn next(&self, value: T) {
		// Observers added during the broadcast wait for the next one. Removed
		// observers are closed, so they are skipped even though they are
		// still in the snapshot.
		let observers: SmallVec<[Observer<T>; 4]> = {
			let inner = self.body.inner.borrow();
			if inner.terminated.is_some() {
				return;
			}
			inner.observers.iter().map(|(_, o)| o.clone()).collect()
		};

		tracing::trace!(observers = observers.len(), "multicast next");
		for observer in observers {
			observer.next(value.clone());
		}
	}

	pub fn error(&self, err: Error) -> Result<()> {
		let observers = self.terminate(Termination::Errored(err.clone()))?;
		for (_, observer) in observers {
			observer.error(err.clone());
		}
		Ok(())
	}

	pub fn complete(&self) -> Result<()> {
		let observers = self.terminate(Termination::Completed)?;
		for (_, observer) in observers {
			observer.complete();
		}
		Ok(())
	}

	fn terminate(
		&self,
		termination: Termination,
	) -> Result<SmallVec<[(u64, Observer<T>); 4]>> {
		let mut inner = self.body.inner.borrow_mut();
		if inner.terminated.is_some() {
			tracing::warn!("multicast stream terminated twice");
			return Err(Error::AlreadyCompleted);
		}
		inner.terminated = Some(termination);
		Ok(std::mem::take(&mut inner.observers))
	}

	pub fn is_completed(&self) -> bool {
		self.body.inner.borrow().terminated.is_some()
	}

	pub fn observer_count(&self) -> usize {
		self.body.inner.borrow().observers.len()
	}

	pub(crate) fn termination(&self) -> Option<Termination> {
		self.body.inner.borrow().terminated.clone()
	}

	/// Registers without any replay. Returns `None` when already terminated,
	/// after delivering the termination to `observer`.
	pub(crate) fn register(&self, observer: Observer<T>) -> Option<Subscription> {
		let mut inner = self.body.inner.borrow_mut();
		if let Some(termination) = inner.terminated.clone() {
			std::mem::drop(inner);
			termination.deliver(&observer);
			return None;
		}

		let guarded = observer.guarded();
		inner.next_id += 1;
		let id = inner.next_id;
		inner.observers.push((id, guarded.clone()));
		std::mem::drop(inner);

		let body: Weak<MulticastBody<T>> = Rc::downgrade(&self.body);
		Some(Subscription::new(move || {
			guarded.close();
			if let Some(body) = body.upgrade() {
				body.inner.borrow_mut().observers.retain(|(i, _)| *i != id);
			}
		}))
	}
}

impl<T> Subscribable for MulticastStream<T>
where
	T: Clone + 'static,
{
	type Item = T;

	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		tracing::trace!("multicast subscribe");
		self.register(observer).unwrap_or_else(Subscription::closed)
	}
}

impl<T> Subject for MulticastStream<T>
where
	T: Clone + 'static,
{
	fn next(&self, value: T) {
		MulticastStream::next(self, value)
	}

	fn error(&self, err: Error) -> Result<()> {
		MulticastStream::error(self, err)
	}

	fn complete(&self) -> Result<()> {
		MulticastStream::complete(self)
	}

	fn observer_count(&self) -> usize {
		MulticastStream::observer_count(self)
	}
}

impl<T> std::fmt::Debug for MulticastStream<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.body.inner.borrow();
		f.debug_struct("MulticastStream")
			.field("observers", &inner.observers.len())
			.field("terminated", &inner.terminated.is_some())
			.finish()
	}
}
