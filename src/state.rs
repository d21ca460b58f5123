use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::graph::{self, NodeId, NodeKind};
use crate::multicast::Subject;
use crate::{Error, LinkedState, MulticastStream, Observer, Result, Subscribable, Subscription};

pub struct State<T> {
	body: Rc<StateBody<T>>,
}

struct StateBody<T> {
	value: RefCell<T>,
	multicast: MulticastStream<T>,
	node: NodeId,
}

impl<T> Drop for StateBody<T> {
	fn drop(&mut self) {
		graph::unregister(self.node);
	}
}

impl<T> Clone for State<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for State<T>
where
	T: Clone + Default + 'static,
{
	fn default() -> Self {
		State::new(Default::default())
	}
}

impl<T> State<T>
where
	T: Clone + 'static,
{
	pub fn new(value: T) -> Self {
		Self::with_kind(value, NodeKind::State, &[])
	}

	pub(crate) fn with_kind(value: T, kind: NodeKind, parents: &[NodeId]) -> Self {
		State {
			body: Rc::new(StateBody {
				value: RefCell::new(value),
				multicast: MulticastStream::new(),
				node: graph::register(kind, parents),
			}),
		}
	}

	#[inline]
	pub fn value(&self) -> T {
		self.body.value.borrow().clone()
	}

	#[inline]
	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		func(&self.body.value.borrow())
	}

	/// Stores `value` and broadcasts it. A no-op once the state completed.
	pub fn next(&self, value: T) {
		if self.body.multicast.is_completed() {
			return;
		}
		*self.body.value.borrow_mut() = value.clone();
		self.body.multicast.next(value)
	}

	/// Read-modify-write against the value current at the time of the call.
	pub fn update(&self, func: impl FnOnce(&T) -> T) {
		let current = self.value();
		self.next(func(&current))
	}

	/// Like [`State::update`], mutating in place.
	pub fn modify(&self, func: impl FnOnce(&mut T)) {
		let mut value = self.value();
		func(&mut value);
		self.next(value)
	}

	pub fn error(&self, err: Error) -> Result<()> {
		self.body.multicast.error(err)
	}

	pub fn complete(&self) -> Result<()> {
		self.body.multicast.complete()
	}

	pub fn is_completed(&self) -> bool {
		self.body.multicast.is_completed()
	}

	pub fn observer_count(&self) -> usize {
		self.body.multicast.observer_count()
	}

	pub fn node(&self) -> NodeId {
		self.body.node
	}

	/// Two-way projection of a part of this state.
	///
	/// `getter` reads the part, `setter` produces a new whole from the current
	/// whole and a new part.
	pub fn partial<U>(
		&self,
		getter: impl Fn(&T) -> U + 'static,
		setter: impl Fn(&T, U) -> T + 'static,
	) -> LinkedState<U>
	where
		U: Clone + PartialEq + 'static,
	{
		let parent = self.clone();
		let initial = self.with(&getter);
		LinkedState::link(
			self,
			initial,
			move |value: &T| Ok(getter(value)),
			move |part: U| parent.update(|whole| setter(whole, part)),
		)
	}
}

impl<T> Subscribable for State<T>
where
	T: Clone + 'static,
{
	type Item = T;

	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		let current = self.value();
		match self.body.multicast.register(observer.clone()) {
			Some(subscription) => {
				observer.next(current);
				subscription
			}
			None => Subscription::closed(),
		}
	}
}

impl<T> Subject for State<T>
where
	T: Clone + 'static,
{
	fn next(&self, value: T) {
		State::next(self, value)
	}

	fn error(&self, err: Error) -> Result<()> {
		State::error(self, err)
	}

	fn complete(&self) -> Result<()> {
		State::complete(self)
	}

	fn observer_count(&self) -> usize {
		State::observer_count(self)
	}
}

impl<T> Debug for State<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.body.value.borrow().fmt(f)
	}
}
