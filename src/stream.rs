use std::rc::Rc;

use crate::{Observer, Result, Subscription};

/// Anything a subscriber can attach an [`Observer`] to.
///
/// This is the single capability every source in the crate exposes and the
/// only thing the interop layer checks for.
pub trait Subscribable: 'static {
	type Item: 'static;

	fn subscribe_observer(&self, observer: Observer<Self::Item>) -> Subscription;

	/// Subscribes either a full [`Observer`] or a bare `next` callback.
	fn subscribe(&self, observer: impl Into<Observer<Self::Item>>) -> Subscription
	where
		Self: Sized,
	{
		self.subscribe_observer(observer.into())
	}

	fn subscribe_next(&self, next: impl Fn(Self::Item) + 'static) -> Subscription
	where
		Self: Sized,
	{
		self.subscribe_observer(Observer::from_next(next))
	}

	fn as_stream(&self) -> Stream<Self::Item>
	where
		Self: Sized + Clone,
	{
		crate::interop::from(self.clone())
	}
}

type Producer<T> = dyn Fn(Observer<T>) -> Result<Subscription>;

/// Unicast push stream.
///
/// Every subscription runs the producer again; nothing is shared between two
/// subscriptions of the same stream.
pub struct Stream<T> {
	producer: Rc<Producer<T>>,
}

impl<T> Clone for Stream<T> {
	fn clone(&self) -> Self {
		Self {
			producer: self.producer.clone(),
		}
	}
}

impl<T: 'static> Stream<T> {
	pub fn new(producer: impl Fn(Observer<T>) -> Result<Subscription> + 'static) -> Self {
		Stream {
			producer: Rc::new(producer),
		}
	}

	/// Applies an operator. Chain calls, or use [`pipe!`](crate::pipe), to
	/// compose several.
	pub fn pipe<U, F>(self, operator: F) -> Stream<U>
	where
		F: FnOnce(Stream<T>) -> Stream<U>,
	{
		operator(self)
	}
}

impl<T: 'static> Subscribable for Stream<T> {
	type Item = T;

	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		let observer = observer.guarded();
		let subscription = Subscription::empty();

		// The guard keeps the subscription alive until it terminates, so a
		// completing producer tears itself down even if the caller dropped
		// its handle.
		let guard = Observer::chained(
			&observer,
			{
				let target = observer.clone();
				move |value| target.next(value)
			},
			{
				let target = observer.clone();
				let subscription = subscription.clone();
				move |err| {
					target.error(err);
					subscription.unsubscribe();
				}
			},
			{
				let target = observer.clone();
				let subscription = subscription.clone();
				move || {
					target.complete();
					subscription.unsubscribe();
				}
			},
		);

		subscription.add_fn({
			let guard = guard.clone();
			move || guard.close()
		});

		tracing::trace!("stream subscribe");
		match (self.producer)(guard.clone()) {
			Ok(teardown) => subscription.add(teardown),
			Err(err) => guard.error(err),
		}

		subscription
	}
}

impl<T> std::fmt::Debug for Stream<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Stream").finish_non_exhaustive()
	}
}
