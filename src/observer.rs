use std::cell::Cell;
use std::rc::Rc;

use crate::Error;

trait Liveness {
	fn is_closed(&self) -> bool;
}

struct ObserverBody<T> {
	next: Box<dyn Fn(T)>,
	error: Box<dyn Fn(Error)>,
	complete: Box<dyn Fn()>,
	closed: Cell<bool>,
	downstream: Option<Rc<dyn Liveness>>,
}

impl<T> Liveness for ObserverBody<T> {
	fn is_closed(&self) -> bool {
		self.closed.get() || self.downstream.as_ref().map_or(false, |d| d.is_closed())
	}
}

/// The `{next, error, complete}` sink supplied by a subscriber.
///
/// After `error` or `complete` fires the observer is closed and every later
/// notification is silently dropped. An observer built with
/// [`Observer::chained`] also counts as closed once its downstream is, which
/// lets a synchronous producer notice that nobody listens any more.
pub struct Observer<T> {
	body: Rc<ObserverBody<T>>,
}

impl<T> Clone for Observer<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T: 'static> Observer<T> {
	pub fn new(
		next: impl Fn(T) + 'static,
		error: impl Fn(Error) + 'static,
		complete: impl Fn() + 'static,
	) -> Self {
		Self::build(next, error, complete, None)
	}

	/// Like [`Observer::new`], closed as soon as `downstream` is.
	pub fn chained<U: 'static>(
		downstream: &Observer<U>,
		next: impl Fn(T) + 'static,
		error: impl Fn(Error) + 'static,
		complete: impl Fn() + 'static,
	) -> Self {
		let link: Rc<dyn Liveness> = downstream.body.clone();
		Self::build(next, error, complete, Some(link))
	}

	fn build(
		next: impl Fn(T) + 'static,
		error: impl Fn(Error) + 'static,
		complete: impl Fn() + 'static,
		downstream: Option<Rc<dyn Liveness>>,
	) -> Self {
		Observer {
			body: Rc::new(ObserverBody {
				next: Box::new(next),
				error: Box::new(error),
				complete: Box::new(complete),
				closed: Cell::new(false),
				downstream,
			}),
		}
	}

	/// An observer for a bare callback. Errors are not handled and
	/// resurface as a panic at the call site that delivered them.
	pub fn from_next(next: impl Fn(T) + 'static) -> Self {
		Self::new(
			next,
			|err| panic!("unhandled stream error: {}", err),
			|| {},
		)
	}

	/// Builds an observer that feeds `next` with values and forwards
	/// termination to `downstream`.
	pub fn forward<U: 'static>(downstream: &Observer<U>, next: impl Fn(T) + 'static) -> Self {
		let on_error = downstream.clone();
		let on_complete = downstream.clone();
		Self::chained(
			downstream,
			next,
			move |err| on_error.error(err),
			move || on_complete.complete(),
		)
	}

	pub fn next(&self, value: T) {
		if !self.body.is_closed() {
			(self.body.next)(value)
		}
	}

	pub fn error(&self, err: Error) {
		if !self.body.closed.replace(true) {
			(self.body.error)(err)
		}
	}

	pub fn complete(&self) {
		if !self.body.closed.replace(true) {
			(self.body.complete)()
		}
	}

	pub fn is_closed(&self) -> bool {
		self.body.is_closed()
	}

	/// Silences the observer without notifying it.
	pub(crate) fn close(&self) {
		self.body.closed.set(true);
	}

	/// A fresh observer with its own closed flag delivering into `self`.
	///
	/// Terminating the wrapper runs the target's callbacks but leaves the
	/// target open, so one observer can be handed to several subscriptions.
	pub(crate) fn guarded(&self) -> Observer<T> {
		let on_next = self.clone();
		let on_error = self.clone();
		let on_complete = self.clone();
		Observer::chained(
			self,
			move |value| on_next.next(value),
			move |err| {
				if !on_error.body.closed.get() {
					(on_error.body.error)(err)
				}
			},
			move || {
				if !on_complete.body.closed.get() {
					(on_complete.body.complete)()
				}
			},
		)
	}
}

impl<T, F> From<F> for Observer<T>
where
	T: 'static,
	F: Fn(T) + 'static,
{
	fn from(next: F) -> Self {
		Observer::from_next(next)
	}
}

impl<T> std::fmt::Debug for Observer<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Observer")
			.field("closed", &self.body.closed.get())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	#[test]
	fn terminal_notifications_close() {
		let seen = Rc::new(RefCell::new(vec![]));
		let observer = Observer::new(
			{
				let seen = seen.clone();
				move |v: u8| seen.borrow_mut().push(v)
			},
			|_| {},
			|| {},
		);

		observer.next(1);
		observer.complete();
		observer.next(2);
		assert_eq!(*seen.borrow(), vec![1]);
		assert!(observer.is_closed());
	}

	#[test]
	fn chained_observer_follows_downstream() {
		let downstream: Observer<u8> = Observer::new(|_| {}, |_| {}, || {});
		let upstream = Observer::forward(&downstream, |_: u16| {});
		assert!(!upstream.is_closed());

		downstream.complete();
		assert!(upstream.is_closed());
	}

	#[test]
	fn guarded_wrapper_leaves_target_open() {
		let completions = Rc::new(RefCell::new(0));
		let target: Observer<u8> = Observer::new(|_| {}, |_| {}, {
			let completions = completions.clone();
			move || *completions.borrow_mut() += 1
		});

		let first = target.guarded();
		first.complete();
		first.complete();
		assert!(first.is_closed());
		assert!(!target.is_closed());

		target.guarded().complete();
		assert_eq!(*completions.borrow(), 2);
	}
}
