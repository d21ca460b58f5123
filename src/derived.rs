use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::{smallvec, SmallVec};

use crate::graph::{self, NodeId, NodeKind};
use crate::memo::Memo;
use crate::{Error, LinkedState, MulticastStream, Observer, State, Subscribable, Subscription};

/// A source a [`DerivedState`] can be built on.
///
/// Every derivable delivers its current value synchronously on subscribe,
/// which is what lets a derivation compute as soon as it is activated.
pub trait Derivable: Subscribable + Clone {
	fn node(&self) -> NodeId;

	fn derive<U>(&self, func: impl Fn(&Self::Item) -> U + 'static) -> DerivedState<U>
	where
		Self::Item: Clone + PartialEq,
		U: Clone + 'static,
	{
		DerivedState::new((self.clone(),), move |(value,)| func(value))
	}
}

impl<T: Clone + 'static> Derivable for State<T> {
	fn node(&self) -> NodeId {
		State::node(self)
	}
}

impl<T: Clone + PartialEq + 'static> Derivable for LinkedState<T> {
	fn node(&self) -> NodeId {
		LinkedState::node(self)
	}
}

impl<T: Clone + 'static> Derivable for DerivedState<T> {
	fn node(&self) -> NodeId {
		self.body.node()
	}
}

type OnChange = Rc<dyn Fn()>;
type OnError = Rc<dyn Fn(Error)>;

/// A positional set of parents. Implemented for tuples of up to six
/// derivables and for vectors of one derivable type.
pub trait Parents: 'static {
	type Values: Clone + 'static;
	type Slots: 'static;

	fn empty_slots(&self) -> Self::Slots;

	/// All parent values, once every position has been filled.
	fn collect(slots: &Self::Slots) -> Option<Self::Values>;

	fn nodes(&self) -> SmallVec<[NodeId; 4]>;

	fn connect(
		&self,
		slots: &Rc<RefCell<Self::Slots>>,
		on_change: &OnChange,
		on_error: &OnError,
	) -> Vec<Subscription>;
}

macro_rules! impl_parents {
	($($P:ident $idx:tt),+) => {
		impl<$($P),+> Parents for ($($P,)+)
		where
			$($P: Derivable, $P::Item: Clone,)+
		{
			type Values = ($($P::Item,)+);
			type Slots = ($(Option<$P::Item>,)+);

			fn empty_slots(&self) -> Self::Slots {
				($(None::<$P::Item>,)+)
			}

			fn collect(slots: &Self::Slots) -> Option<Self::Values> {
				Some(($(slots.$idx.clone()?,)+))
			}

			fn nodes(&self) -> SmallVec<[NodeId; 4]> {
				smallvec![$(self.$idx.node()),+]
			}

			fn connect(
				&self,
				slots: &Rc<RefCell<Self::Slots>>,
				on_change: &OnChange,
				on_error: &OnError,
			) -> Vec<Subscription> {
				vec![$({
					let slots = slots.clone();
					let on_change = on_change.clone();
					let on_error = on_error.clone();
					self.$idx.subscribe_observer(Observer::new(
						move |value: $P::Item| {
							slots.borrow_mut().$idx = Some(value);
							on_change();
						},
						move |err| on_error(err),
						|| {},
					))
				}),+]
			}
		}
	};
}

impl_parents!(A 0);
impl_parents!(A 0, B 1);
impl_parents!(A 0, B 1, C 2);
impl_parents!(A 0, B 1, C 2, D 3);
impl_parents!(A 0, B 1, C 2, D 3, E 4);
impl_parents!(A 0, B 1, C 2, D 3, E 4, F 5);

impl<P> Parents for Vec<P>
where
	P: Derivable,
	P::Item: Clone,
{
	type Values = Vec<P::Item>;
	type Slots = Vec<Option<P::Item>>;

	fn empty_slots(&self) -> Self::Slots {
		vec![None; self.len()]
	}

	fn collect(slots: &Self::Slots) -> Option<Self::Values> {
		slots.iter().cloned().collect()
	}

	fn nodes(&self) -> SmallVec<[NodeId; 4]> {
		self.iter().map(|p| p.node()).collect()
	}

	fn connect(
		&self,
		slots: &Rc<RefCell<Self::Slots>>,
		on_change: &OnChange,
		on_error: &OnError,
	) -> Vec<Subscription> {
		self.iter()
			.enumerate()
			.map(|(index, parent)| {
				let slots = slots.clone();
				let on_change = on_change.clone();
				let on_error = on_error.clone();
				parent.subscribe_observer(Observer::new(
					move |value: P::Item| {
						slots.borrow_mut()[index] = Some(value);
						on_change();
					},
					move |err| on_error(err),
					|| {},
				))
			})
			.collect()
	}
}

trait DerivedSource<T> {
	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription;
	fn value(&self) -> Option<T>;
	fn observer_count(&self) -> usize;
	fn node(&self) -> NodeId;
}

struct DerivedInner<P: Parents, T> {
	slots: Rc<RefCell<P::Slots>>,
	memo: Memo<P::Values, T>,
	last: Option<T>,
	parent_subs: Vec<Subscription>,
	count: usize,
}

struct DerivedBody<P: Parents, T> {
	parents: P,
	derive: Box<dyn Fn(&P::Values) -> T>,
	inner: RefCell<DerivedInner<P, T>>,
	observers: MulticastStream<T>,
	node: NodeId,
	this: Weak<DerivedBody<P, T>>,
}

impl<P: Parents, T> Drop for DerivedBody<P, T> {
	fn drop(&mut self) {
		graph::unregister(self.node);
	}
}

impl<P, T> DerivedBody<P, T>
where
	P: Parents,
	T: Clone + 'static,
{
	fn activate(&self) {
		tracing::debug!(node = ?self.node, "derived state activated");
		graph::set_active(self.node, true);

		let slots = Rc::new(RefCell::new(self.parents.empty_slots()));
		self.inner.borrow_mut().slots = slots.clone();

		let on_change: OnChange = {
			let this = self.this.clone();
			Rc::new(move || {
				if let Some(body) = this.upgrade() {
					body.recompute();
				}
			})
		};
		let on_error: OnError = {
			let this = self.this.clone();
			Rc::new(move |err| {
				if let Some(body) = this.upgrade() {
					let _ = body.observers.error(err);
				}
			})
		};

		let subs = self.parents.connect(&slots, &on_change, &on_error);

		let mut inner = self.inner.borrow_mut();
		if inner.count == 0 {
			// Released while the parents were still delivering.
			std::mem::drop(inner);
			subs.iter().for_each(Subscription::unsubscribe);
			graph::set_active(self.node, false);
		} else {
			inner.parent_subs = subs;
		}
	}

	fn deactivate(&self) {
		tracing::debug!(node = ?self.node, "derived state deactivated");
		let subs = std::mem::take(&mut self.inner.borrow_mut().parent_subs);
		subs.iter().for_each(Subscription::unsubscribe);
		graph::set_active(self.node, false);
	}

	fn recompute(&self) {
		let slots = self.inner.borrow().slots.clone();
		let values = match P::collect(&slots.borrow()) {
			Some(values) => values,
			None => return,
		};

		let cached = self.inner.borrow_mut().memo.get(&values).cloned();
		let value = match cached {
			Some(value) => value,
			None => {
				let value = (self.derive)(&values);
				self.inner.borrow_mut().memo.insert(values, value.clone());
				value
			}
		};

		self.inner.borrow_mut().last = Some(value.clone());
		// Emitted even on a memo hit: caching skips work, not notifications.
		self.observers.next(value);
	}

	fn release(&self) {
		let idle = {
			let mut inner = self.inner.borrow_mut();
			inner.count = inner.count.saturating_sub(1);
			inner.count == 0
		};
		if idle {
			self.deactivate();
		}
	}
}

impl<P, T> DerivedSource<T> for DerivedBody<P, T>
where
	P: Parents,
	T: Clone + 'static,
{
	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		let this = match self.this.upgrade() {
			Some(this) => this,
			None => return Subscription::closed(),
		};

		let last = self.inner.borrow().last.clone();
		let registration = match self.observers.register(observer.clone()) {
			Some(registration) => registration,
			None => return Subscription::closed(),
		};

		let first = {
			let mut inner = self.inner.borrow_mut();
			inner.count += 1;
			inner.count == 1
		};

		if first {
			self.activate();
		} else if let Some(value) = last {
			observer.next(value);
		}

		Subscription::new(move || {
			registration.unsubscribe();
			this.release();
		})
	}

	fn value(&self) -> Option<T> {
		if self.inner.borrow().count > 0 {
			return self.inner.borrow().last.clone();
		}

		let probe = self.subscribe_observer(Observer::new(|_| {}, |_| {}, || {}));
		let value = self.inner.borrow().last.clone();
		probe.unsubscribe();
		value
	}

	fn observer_count(&self) -> usize {
		self.inner.borrow().count
	}

	fn node(&self) -> NodeId {
		self.node
	}
}

/// Read-only, memoized projection over one or more parents.
///
/// Parents are subscribed only while the derivation itself has observers.
/// The derive function reruns only when the tuple of parent values changes,
/// but every parent notification is forwarded to observers.
pub struct DerivedState<T> {
	body: Rc<dyn DerivedSource<T>>,
}

impl<T> Clone for DerivedState<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> DerivedState<T>
where
	T: Clone + 'static,
{
	/// Parent tuples are compared with `PartialEq`, so a float parent
	/// holding NaN never matches its cached tuple and recomputes on every
	/// trigger. Use [`DerivedState::with_eq`] with [`same_f64`](crate::same_f64)
	/// for NaN-aware memoization.
	pub fn new<P>(parents: P, derive: impl Fn(&P::Values) -> T + 'static) -> Self
	where
		P: Parents,
		P::Values: PartialEq,
	{
		Self::with_memo(parents, Memo::new(), derive)
	}

	/// Like [`DerivedState::new`] with a custom notion of "same inputs".
	pub fn with_eq<P>(
		parents: P,
		eq: impl Fn(&P::Values, &P::Values) -> bool + 'static,
		derive: impl Fn(&P::Values) -> T + 'static,
	) -> Self
	where
		P: Parents,
	{
		Self::with_memo(parents, Memo::with_eq(eq), derive)
	}

	fn with_memo<P>(
		parents: P,
		memo: Memo<P::Values, T>,
		derive: impl Fn(&P::Values) -> T + 'static,
	) -> Self
	where
		P: Parents,
	{
		let node = graph::register(NodeKind::Derived, &parents.nodes());
		let slots = Rc::new(RefCell::new(parents.empty_slots()));
		let body: Rc<DerivedBody<P, T>> = Rc::new_cyclic(|this| DerivedBody {
			parents,
			derive: Box::new(derive),
			inner: RefCell::new(DerivedInner {
				slots,
				memo,
				last: None,
				parent_subs: Vec::new(),
				count: 0,
			}),
			observers: MulticastStream::new(),
			node,
			this: this.clone(),
		});

		DerivedState { body }
	}

	/// The current value. When nothing observes this derivation, a
	/// throwaway subscription forces one pass through the parent chain.
	pub fn value(&self) -> Option<T> {
		self.body.value()
	}

	pub fn observer_count(&self) -> usize {
		self.body.observer_count()
	}

	pub fn is_active(&self) -> bool {
		graph::is_active(self.body.node())
	}
}

impl<T: Clone + 'static> Subscribable for DerivedState<T> {
	type Item = T;

	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		self.body.subscribe_observer(observer)
	}
}

impl<T: Clone + 'static> From<DerivedState<T>> for Rc<dyn Any> {
	fn from(derived: DerivedState<T>) -> Self {
		Rc::new(derived)
	}
}

impl<T: Clone + 'static> TryFrom<Rc<dyn Any>> for DerivedState<T> {
	type Error = Rc<dyn Any>;
	fn try_from(value: Rc<dyn Any>) -> Result<Self, Self::Error> {
		Rc::downcast::<DerivedState<T>>(value).map(|derived| (*derived).clone())
	}
}

impl<T> std::fmt::Debug for DerivedState<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DerivedState")
			.field("node", &self.body.node())
			.field("observers", &self.body.observer_count())
			.finish()
	}
}
