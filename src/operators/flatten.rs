use std::cell::RefCell;
use std::rc::Rc;

use crate::{Observer, Stream, Subscribable, Subscription};

enum Inner {
	Idle,
	Active { id: u64, subscription: Subscription },
}

struct SwitchState {
	inner: Inner,
	seq: u64,
	outer_done: bool,
}

impl SwitchState {
	fn take_inner(&mut self) -> Option<Subscription> {
		match std::mem::replace(&mut self.inner, Inner::Idle) {
			Inner::Idle => None,
			Inner::Active { subscription, .. } => Some(subscription),
		}
	}

	fn is_idle(&self) -> bool {
		matches!(self.inner, Inner::Idle)
	}
}

/// Projects every value to an inner stream and mirrors only the newest one.
///
/// The previous inner subscription is torn down before the next one is
/// subscribed, so a superseded inner can never emit. The result completes
/// once the source completed and no inner is active.
pub fn switch_map<T, U, F>(project: F) -> impl FnOnce(Stream<T>) -> Stream<U>
where
	T: 'static,
	U: 'static,
	F: Fn(T) -> Stream<U> + 'static,
{
	let project = Rc::new(project);
	move |source| {
		Stream::new(move |observer| {
			let state = Rc::new(RefCell::new(SwitchState {
				inner: Inner::Idle,
				seq: 0,
				outer_done: false,
			}));

			let on_next = {
				let state = state.clone();
				let project = project.clone();
				let observer = observer.clone();
				move |value: T| {
					let inner = project(value);

					let (id, previous) = {
						let mut state = state.borrow_mut();
						state.seq += 1;
						(state.seq, state.take_inner())
					};
					if let Some(previous) = previous {
						tracing::trace!(id, "switch_map cancelling inner");
						previous.unsubscribe();
					}
					if observer.is_closed() {
						return;
					}

					let holder = Subscription::empty();
					state.borrow_mut().inner = Inner::Active {
						id,
						subscription: holder.clone(),
					};

					let target = observer.clone();
					let on_error = observer.clone();
					let on_complete = observer.clone();
					let state = state.clone();
					holder.add(inner.subscribe_observer(Observer::chained(
						&observer,
						move |value: U| target.next(value),
						move |err| on_error.error(err),
						move || {
							let finished = {
								let mut state = state.borrow_mut();
								if matches!(state.inner, Inner::Active { id: current, .. } if current == id) {
									state.inner = Inner::Idle;
								}
								state.outer_done && state.is_idle()
							};
							if finished {
								on_complete.complete();
							}
						},
					)));
				}
			};

			let on_complete = {
				let state = state.clone();
				let observer = observer.clone();
				move || {
					let finished = {
						let mut state = state.borrow_mut();
						state.outer_done = true;
						state.is_idle()
					};
					if finished {
						observer.complete();
					}
				}
			};

			let on_error = observer.clone();
			let subscription = Subscription::empty();
			subscription.add(source.subscribe_observer(Observer::chained(
				&observer,
				on_next,
				move |err| on_error.error(err),
				on_complete,
			)));
			subscription.add_fn(move || {
				let inner = state.borrow_mut().take_inner();
				if let Some(inner) = inner {
					inner.unsubscribe();
				}
			});
			Ok(subscription)
		})
	}
}
