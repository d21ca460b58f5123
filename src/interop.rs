//! Conversions from foreign sources into [`Stream`].
//!
//! Anything implementing [`Subscribable`] plugs in through [`from`]; plain
//! iterables and futures have their own constructors. Other crates integrate
//! by implementing [`Subscribable`] (or [`Fetch`] for request/response I/O)
//! rather than by reaching into stream internals.

use std::future::Future;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable, LocalBoxFuture};

use crate::{scheduler, Result, Stream, Subscribable, Subscription};

pub fn from<S>(source: S) -> Stream<S::Item>
where
	S: Subscribable,
{
	Stream::new(move |observer| Ok(source.subscribe_observer(observer)))
}

/// Replays the iterable from the start on every subscription.
pub fn from_iter<I>(iter: I) -> Stream<I::Item>
where
	I: IntoIterator + Clone + 'static,
	I::Item: 'static,
{
	Stream::new(move |observer| {
		for value in iter.clone() {
			if observer.is_closed() {
				break;
			}
			observer.next(value);
		}
		observer.complete();
		Ok(Subscription::empty())
	})
}

/// Runs a fresh future on the local executor per subscription. The value is
/// delivered once the scheduler polls the future; unsubscribing aborts it.
pub fn from_future<T, F, Fut>(factory: F) -> Stream<T>
where
	T: 'static,
	F: Fn() -> Fut + 'static,
	Fut: Future<Output = Result<T>> + 'static,
{
	Stream::new(move |observer| {
		let (handle, registration) = AbortHandle::new_pair();
		let future = Abortable::new(factory(), registration);

		scheduler::spawn_local(async move {
			match future.await {
				Ok(Ok(value)) => {
					observer.next(value);
					observer.complete();
				}
				Ok(Err(err)) => observer.error(err),
				Err(_) => tracing::trace!("future aborted"),
			}
		})?;

		Ok(Subscription::new(move || handle.abort()))
	})
}

/// Request/response transport, e.g. an HTTP client.
pub trait Fetch: 'static {
	type Request: Clone + 'static;
	type Response: 'static;

	fn fetch(&self, request: Self::Request) -> LocalBoxFuture<'static, Result<Self::Response>>;
}

/// One request per subscription, aborted on unsubscribe.
pub fn from_fetch<F>(client: Rc<F>, request: F::Request) -> Stream<F::Response>
where
	F: Fetch,
{
	from_future(move || client.fetch(request.clone()))
}
