use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::{Observer, Stream, Subscribable, Subscription};

/// Subscribes to every stream at once; completes when all of them did.
pub fn merge<T: 'static>(streams: Vec<Stream<T>>) -> Stream<T> {
	Stream::new(move |observer| {
		let active = Rc::new(Cell::new(streams.len()));
		if streams.is_empty() {
			observer.complete();
		}

		let subscription = Subscription::empty();
		for stream in &streams {
			if observer.is_closed() {
				break;
			}
			let target = observer.clone();
			let on_error = observer.clone();
			let on_complete = observer.clone();
			let active = active.clone();
			subscription.add(stream.subscribe_observer(Observer::chained(
				&observer,
				move |value| target.next(value),
				move |err| on_error.error(err),
				move || {
					active.set(active.get() - 1);
					if active.get() == 0 {
						on_complete.complete();
					}
				},
			)));
		}
		Ok(subscription)
	})
}

pub fn merge_with<T: 'static>(other: Stream<T>) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| merge(vec![source, other])
}

/// Subscribes to `other` once the source completed.
pub fn concat_with<T: 'static>(other: Stream<T>) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		Stream::new(move |observer| {
			let subscription = Subscription::empty();
			let tail = subscription.clone();
			let other = other.clone();
			let target = observer.clone();
			let on_error = observer.clone();
			let link = observer.clone();
			subscription.add(source.subscribe_observer(Observer::chained(
				&link,
				move |value| target.next(value),
				move |err| on_error.error(err),
				move || {
					if !tail.is_closed() {
						tail.add(other.subscribe_observer(observer.clone()));
					}
				},
			)));
			Ok(subscription)
		})
	}
}

/// Emits the latest value of every stream once all of them emitted at
/// least once, then on every further emission of any of them.
pub fn combine_latest<T>(streams: Vec<Stream<T>>) -> Stream<Vec<T>>
where
	T: Clone + 'static,
{
	Stream::new(move |observer| {
		if streams.is_empty() {
			observer.complete();
			return Ok(Subscription::empty());
		}

		let values: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; streams.len()]));
		let active = Rc::new(Cell::new(streams.len()));
		let subscription = Subscription::empty();

		for (index, stream) in streams.iter().enumerate() {
			if observer.is_closed() {
				break;
			}
			let target = observer.clone();
			let on_error = observer.clone();
			let on_complete = observer.clone();
			let values = values.clone();
			let filled = values.clone();
			let active = active.clone();
			subscription.add(stream.subscribe_observer(Observer::chained(
				&observer,
				move |value: T| {
					values.borrow_mut()[index] = Some(value);
					let all: Option<Vec<T>> = values.borrow().iter().cloned().collect();
					if let Some(all) = all {
						target.next(all);
					}
				},
				move |err| on_error.error(err),
				move || {
					active.set(active.get() - 1);
					// A source that never emitted means nothing ever will.
					if active.get() == 0 || filled.borrow()[index].is_none() {
						on_complete.complete();
					}
				},
			)));
		}
		Ok(subscription)
	})
}

pub fn combine_latest_with<T, U>(other: Stream<U>) -> impl FnOnce(Stream<T>) -> Stream<(T, U)>
where
	T: Clone + 'static,
	U: Clone + 'static,
{
	move |source| {
		Stream::new(move |observer| {
			let latest: Rc<RefCell<(Option<T>, Option<U>)>> = Rc::new(RefCell::new((None, None)));
			let active = Rc::new(Cell::new(2));
			let subscription = Subscription::empty();

			let emit = {
				let latest = latest.clone();
				let target = observer.clone();
				Rc::new(move || {
					let pair = match &*latest.borrow() {
						(Some(a), Some(b)) => Some((a.clone(), b.clone())),
						_ => None,
					};
					if let Some(pair) = pair {
						target.next(pair);
					}
				})
			};

			let on_complete = {
				let active = active.clone();
				let observer = observer.clone();
				Rc::new(move |emitted: bool| {
					active.set(active.get() - 1);
					if active.get() == 0 || !emitted {
						observer.complete();
					}
				})
			};

			subscription.add(source.subscribe_observer(Observer::chained(
				&observer,
				{
					let latest = latest.clone();
					let emit = emit.clone();
					move |value: T| {
						latest.borrow_mut().0 = Some(value);
						emit();
					}
				},
				{
					let observer = observer.clone();
					move |err| observer.error(err)
				},
				{
					let latest = latest.clone();
					let on_complete = on_complete.clone();
					move || on_complete(latest.borrow().0.is_some())
				},
			)));

			if !observer.is_closed() {
				subscription.add(other.subscribe_observer(Observer::chained(
					&observer,
					{
						let latest = latest.clone();
						move |value: U| {
							latest.borrow_mut().1 = Some(value);
							emit();
						}
					},
					{
						let observer = observer.clone();
						move |err| observer.error(err)
					},
					move || on_complete(latest.borrow().1.is_some()),
				)));
			}

			Ok(subscription)
		})
	}
}

/// Mirrors the source until `notifier` emits, then completes.
pub fn take_until<T, N>(notifier: Stream<N>) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: 'static,
	N: 'static,
{
	move |source| {
		Stream::new(move |observer| {
			let subscription = Subscription::empty();
			let stop = observer.clone();
			let on_error = observer.clone();
			subscription.add(notifier.subscribe_observer(Observer::chained(
				&observer,
				move |_| stop.complete(),
				move |err| on_error.error(err),
				|| {},
			)));

			if !observer.is_closed() {
				subscription.add(source.subscribe_observer(observer));
			}
			Ok(subscription)
		})
	}
}
