use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use smallvec::SmallVec;

enum Teardown {
	Fn(Box<dyn FnOnce()>),
	Child(Subscription),
}

impl Teardown {
	fn run(self) {
		match self {
			Teardown::Fn(func) => func(),
			Teardown::Child(sub) => sub.unsubscribe(),
		}
	}
}

struct SubscriptionInner {
	closed: bool,
	teardowns: SmallVec<[Teardown; 2]>,
}

/// Handle released by a subscriber.
///
/// A subscription collects teardowns and runs them in insertion order on the
/// first `unsubscribe`. Every later call is a no-op, and anything added to an
/// already closed subscription is torn down immediately.
#[must_use = "dropping a subscription does not unsubscribe it"]
#[derive(Clone)]
pub struct Subscription {
	inner: Rc<RefCell<SubscriptionInner>>,
}

impl Subscription {
	pub fn new(teardown: impl FnOnce() + 'static) -> Self {
		let sub = Self::empty();
		sub.add_fn(teardown);
		sub
	}

	pub fn empty() -> Self {
		Subscription {
			inner: Rc::new(RefCell::new(SubscriptionInner {
				closed: false,
				teardowns: SmallVec::new(),
			})),
		}
	}

	/// A subscription that is already closed.
	pub fn closed() -> Self {
		let sub = Self::empty();
		sub.unsubscribe();
		sub
	}

	pub fn is_closed(&self) -> bool {
		self.inner.borrow().closed
	}

	pub fn add(&self, child: Subscription) {
		if Rc::ptr_eq(&self.inner, &child.inner) {
			return;
		}
		self.push(Teardown::Child(child))
	}

	pub fn add_fn(&self, teardown: impl FnOnce() + 'static) {
		self.push(Teardown::Fn(Box::new(teardown)))
	}

	fn push(&self, teardown: Teardown) {
		let mut inner = self.inner.borrow_mut();
		if inner.closed {
			std::mem::drop(inner);
			teardown.run();
		} else {
			inner.teardowns.push(teardown);
		}
	}

	pub fn unsubscribe(&self) {
		let teardowns = {
			let mut inner = self.inner.borrow_mut();
			if inner.closed {
				return;
			}
			inner.closed = true;
			std::mem::take(&mut inner.teardowns)
		};

		for teardown in teardowns {
			teardown.run();
		}
	}
}

impl Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.borrow();
		f.debug_struct("Subscription")
			.field("closed", &inner.closed)
			.field("teardowns", &inner.teardowns.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::rc::Rc;

	use super::Subscription;

	#[test]
	fn teardown_runs_once_in_order() {
		let log = Rc::new(std::cell::RefCell::new(vec![]));
		let sub = Subscription::empty();
		for i in 0..3 {
			let log = log.clone();
			sub.add_fn(move || log.borrow_mut().push(i));
		}

		sub.unsubscribe();
		sub.unsubscribe();

		assert_eq!(*log.borrow(), vec![0, 1, 2]);
		assert!(sub.is_closed());
	}

	#[test]
	fn add_after_close_runs_immediately() {
		let hits = Rc::new(Cell::new(0));
		let sub = Subscription::closed();

		let child = Subscription::new({
			let hits = hits.clone();
			move || hits.set(hits.get() + 1)
		});

		sub.add(child.clone());
		assert_eq!(hits.get(), 1);
		assert!(child.is_closed());
	}
}
