use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::lift;
use crate::{Error, Observer, Result, Stream, Subscribable, Subscription};

pub fn map<T, U, F>(func: F) -> impl FnOnce(Stream<T>) -> Stream<U>
where
	T: 'static,
	U: 'static,
	F: Fn(T) -> U + 'static,
{
	let func = Rc::new(func);
	move |source| {
		lift(source, move |downstream: Observer<U>| {
			let func = func.clone();
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| target.next(func(value)))
		})
	}
}

/// `map` with a fallible projection. An `Err` terminates the stream.
pub fn try_map<T, U, F>(func: F) -> impl FnOnce(Stream<T>) -> Stream<U>
where
	T: 'static,
	U: 'static,
	F: Fn(T) -> Result<U> + 'static,
{
	let func = Rc::new(func);
	move |source| {
		lift(source, move |downstream: Observer<U>| {
			let func = func.clone();
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| match func(value) {
				Ok(value) => target.next(value),
				Err(err) => target.error(err),
			})
		})
	}
}

pub fn filter<T, F>(predicate: F) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: 'static,
	F: Fn(&T) -> bool + 'static,
{
	let predicate = Rc::new(predicate);
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let predicate = predicate.clone();
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				if predicate(&value) {
					target.next(value)
				}
			})
		})
	}
}

/// Running fold; emits every intermediate accumulator. State is per
/// subscription.
pub fn scan<T, A, F>(seed: A, func: F) -> impl FnOnce(Stream<T>) -> Stream<A>
where
	T: 'static,
	A: Clone + 'static,
	F: Fn(&A, T) -> A + 'static,
{
	let func = Rc::new(func);
	move |source| {
		lift(source, move |downstream: Observer<A>| {
			let func = func.clone();
			let acc = RefCell::new(seed.clone());
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				let next = func(&acc.borrow(), value);
				*acc.borrow_mut() = next.clone();
				target.next(next);
			})
		})
	}
}

pub fn tap<T, F>(func: F) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: 'static,
	F: Fn(&T) + 'static,
{
	let func = Rc::new(func);
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let func = func.clone();
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				func(&value);
				target.next(value);
			})
		})
	}
}

pub fn take<T: 'static>(count: usize) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		Stream::new(move |observer| {
			if count == 0 {
				observer.complete();
				return Ok(Subscription::empty());
			}

			let seen = Cell::new(0);
			let target = observer.clone();
			Ok(source.subscribe_observer(Observer::forward(&observer, move |value: T| {
				let n = seen.get() + 1;
				seen.set(n);
				if n <= count {
					target.next(value);
				}
				if n >= count {
					target.complete();
				}
			})))
		})
	}
}

pub fn skip<T: 'static>(count: usize) -> impl FnOnce(Stream<T>) -> Stream<T> {
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let skipped = Cell::new(0);
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				if skipped.get() < count {
					skipped.set(skipped.get() + 1);
				} else {
					target.next(value);
				}
			})
		})
	}
}

pub fn take_while<T, F>(predicate: F) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: 'static,
	F: Fn(&T) -> bool + 'static,
{
	let predicate = Rc::new(predicate);
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let predicate = predicate.clone();
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				if predicate(&value) {
					target.next(value);
				} else {
					target.complete();
				}
			})
		})
	}
}

fn first_with<T: 'static>(default: Option<T>) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: Clone,
{
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let default = default.clone();
			let target = downstream.clone();
			let on_error = downstream.clone();
			let link = downstream.clone();
			Observer::chained(
				&link,
				move |value: T| {
					target.next(value);
					target.complete();
				},
				move |err| on_error.error(err),
				move || match default.clone() {
					Some(value) => {
						downstream.next(value);
						downstream.complete();
					}
					None => downstream.error(Error::Empty),
				},
			)
		})
	}
}

/// First value, or [`Error::Empty`] if the source completes without one.
pub fn first<T: Clone + 'static>() -> impl FnOnce(Stream<T>) -> Stream<T> {
	first_with(None)
}

pub fn first_or<T: Clone + 'static>(default: T) -> impl FnOnce(Stream<T>) -> Stream<T> {
	first_with(Some(default))
}

fn last_with<T: 'static>(default: Option<T>) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: Clone,
{
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let last = Rc::new(RefCell::new(default.clone()));
			let on_error = downstream.clone();
			let link = downstream.clone();
			Observer::chained(
				&link,
				{
					let last = last.clone();
					move |value: T| *last.borrow_mut() = Some(value)
				},
				move |err| on_error.error(err),
				move || match last.borrow_mut().take() {
					Some(value) => {
						downstream.next(value);
						downstream.complete();
					}
					None => downstream.error(Error::Empty),
				},
			)
		})
	}
}

/// Last value, or [`Error::Empty`] if the source completes without one.
pub fn last<T: Clone + 'static>() -> impl FnOnce(Stream<T>) -> Stream<T> {
	last_with(None)
}

pub fn last_or<T: Clone + 'static>(default: T) -> impl FnOnce(Stream<T>) -> Stream<T> {
	last_with(Some(default))
}

pub fn distinct_until_changed<T>() -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: Clone + PartialEq + 'static,
{
	move |source| {
		lift(source, move |downstream: Observer<T>| {
			let previous: RefCell<Option<T>> = RefCell::new(None);
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				if previous.borrow().as_ref() == Some(&value) {
					return;
				}
				*previous.borrow_mut() = Some(value.clone());
				target.next(value);
			})
		})
	}
}

pub fn start_with<T>(value: T) -> impl FnOnce(Stream<T>) -> Stream<T>
where
	T: Clone + 'static,
{
	move |source| {
		Stream::new(move |observer| {
			observer.next(value.clone());
			if observer.is_closed() {
				return Ok(Subscription::empty());
			}
			Ok(source.subscribe_observer(observer))
		})
	}
}

/// Emits `(previous, current)` from the second value on.
pub fn pairwise<T>() -> impl FnOnce(Stream<T>) -> Stream<(T, T)>
where
	T: Clone + 'static,
{
	move |source| {
		lift(source, move |downstream: Observer<(T, T)>| {
			let previous: RefCell<Option<T>> = RefCell::new(None);
			let target = downstream.clone();
			Observer::forward(&downstream, move |value: T| {
				let prev = previous.replace(Some(value.clone()));
				if let Some(prev) = prev {
					target.next((prev, value));
				}
			})
		})
	}
}
