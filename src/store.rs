//! Reducer-driven state container.
//!
//! A [`Store`] owns a [`State`] and only changes it through named reducers
//! selected by [`Action::kind`]. Every store understands three built-in
//! actions:
//!
//! * `set` replaces the state with the payload,
//! * `patch` deep-merges a JSON object into the state,
//! * `reset` restores the initial state.
//!
//! Effects registered with [`Store::effect`] run only while the store itself
//! has at least one subscriber.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fxhash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::effect::{EffectRunner, EffectTask};
use crate::{
	DerivedState, Effect, Error, LinkedState, MulticastStream, Observer, Result, State, Stream,
	Subscribable, Subscription,
};

pub const SET: &str = "set";
pub const PATCH: &str = "patch";
pub const RESET: &str = "reset";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
}

impl Action {
	pub fn new(kind: impl Into<String>) -> Self {
		Action {
			kind: kind.into(),
			payload: None,
		}
	}

	pub fn with_payload(kind: impl Into<String>, payload: impl Serialize) -> Result<Self> {
		let kind = kind.into();
		let payload = serde_json::to_value(payload).map_err(|err| Error::payload(&kind, err))?;
		Ok(Action {
			kind,
			payload: Some(payload),
		})
	}
}

type Reducer<S> = Rc<dyn Fn(&S, Option<Value>) -> Result<S>>;

fn decode<P: DeserializeOwned>(action: &str, payload: Option<Value>) -> Result<P> {
	serde_json::from_value(payload.unwrap_or(Value::Null)).map_err(|err| Error::payload(action, err))
}

/// Deep merge: objects merge key by key, anything else is replaced.
fn merge(target: &mut Value, patch: Value) {
	match (target, patch) {
		(Value::Object(target), Value::Object(patch)) => {
			for (key, value) in patch {
				merge(target.entry(key).or_insert(Value::Null), value);
			}
		}
		(target, patch) => *target = patch,
	}
}

fn pointer(path: &str) -> String {
	path.split('.').fold(String::new(), |mut acc, segment| {
		acc.push('/');
		acc.push_str(&segment.replace('~', "~0").replace('/', "~1"));
		acc
	})
}

/// `a.b.c` and `v` to `{"a": {"b": {"c": v}}}`.
fn nest(path: &str, value: Value) -> Value {
	path.rsplit('.').fold(value, |inner, segment| {
		let mut object = Map::new();
		object.insert(segment.to_owned(), inner);
		Value::Object(object)
	})
}

pub struct StoreBuilder<S> {
	initial: S,
	reducers: FxHashMap<String, Reducer<S>>,
}

impl<S> StoreBuilder<S>
where
	S: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
	pub fn new(initial: S) -> Self {
		let mut builder = StoreBuilder {
			initial: initial.clone(),
			reducers: FxHashMap::default(),
		};

		builder.insert(SET, |_, payload| decode::<S>(SET, payload));
		builder.insert(PATCH, |state: &S, payload| {
			let mut whole = serde_json::to_value(state).map_err(|err| Error::payload(PATCH, err))?;
			merge(&mut whole, payload.unwrap_or(Value::Null));
			decode::<S>(PATCH, Some(whole))
		});
		builder.insert(RESET, move |_, _| Ok(initial.clone()));
		builder
	}

	fn insert(&mut self, name: &str, reducer: impl Fn(&S, Option<Value>) -> Result<S> + 'static) {
		self.reducers.insert(name.to_owned(), Rc::new(reducer));
	}

	/// Registers a pure reducer. The payload is decoded into `P` before the
	/// reducer runs; a payload of the wrong shape fails the dispatch.
	pub fn reducer<P>(self, name: &str, reducer: impl Fn(&S, P) -> S + 'static) -> Self
	where
		P: DeserializeOwned,
	{
		self.try_reducer(name, move |state: &S, payload: P| Ok(reducer(state, payload)))
	}

	pub fn try_reducer<P>(mut self, name: &str, reducer: impl Fn(&S, P) -> Result<S> + 'static) -> Self
	where
		P: DeserializeOwned,
	{
		let action = name.to_owned();
		self.insert(name, move |state, payload| reducer(state, decode::<P>(&action, payload)?));
		self
	}

	pub fn build(self) -> Store<S> {
		Store {
			body: Rc::new(StoreBody {
				state: State::new(self.initial),
				reducers: self.reducers,
				selectors: RefCell::default(),
				effects: RefCell::default(),
				ref_count: Cell::new(0),
			}),
		}
	}
}

struct StoreBody<S> {
	state: State<S>,
	reducers: FxHashMap<String, Reducer<S>>,
	selectors: RefCell<FxHashMap<String, Rc<dyn Any>>>,
	effects: RefCell<Vec<Rc<dyn EffectTask>>>,
	ref_count: Cell<usize>,
}

pub struct Store<S> {
	body: Rc<StoreBody<S>>,
}

impl<S> Clone for Store<S> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<S> Store<S>
where
	S: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
	pub fn new(initial: S) -> Self {
		StoreBuilder::new(initial).build()
	}

	pub fn builder(initial: S) -> StoreBuilder<S> {
		StoreBuilder::new(initial)
	}

	/// Runs the named reducer and publishes its result synchronously.
	pub fn dispatch(&self, action: Action) -> Result<()> {
		let reducer = self
			.body
			.reducers
			.get(&action.kind)
			.cloned()
			.ok_or_else(|| Error::UnknownAction {
				action: action.kind.clone(),
			})?;

		tracing::debug!(action = %action.kind, "dispatch");
		let next = self.body.state.with(|state| reducer(state, action.payload))?;
		self.body.state.next(next);
		Ok(())
	}

	pub fn value(&self) -> S {
		self.body.state.value()
	}

	pub fn state(&self) -> State<S> {
		self.body.state.clone()
	}

	/// Registers a named selector and returns it. Registering the same name
	/// again replaces the previous selector.
	pub fn select<R>(&self, name: &str, func: impl Fn(&S) -> R + 'static) -> DerivedState<R>
	where
		R: Clone + 'static,
	{
		let derived = DerivedState::new((self.body.state.clone(),), move |(state,)| func(state));
		self.body
			.selectors
			.borrow_mut()
			.insert(name.to_owned(), derived.clone().into());
		derived
	}

	/// A selector previously registered with [`Store::select`], if it
	/// exists and produces `R`.
	pub fn selector<R>(&self, name: &str) -> Option<DerivedState<R>>
	where
		R: Clone + 'static,
	{
		let any = self.body.selectors.borrow().get(name).cloned()?;
		DerivedState::try_from(any).ok()
	}

	/// Two-way binding to the value at a dotted object path. Writes go
	/// through the `patch` reducer, so only the addressed branch changes.
	pub fn partial<T>(&self, path: &str) -> Result<LinkedState<T>>
	where
		T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
	{
		let location = pointer(path);
		let owned = path.to_owned();
		let getter = move |state: &S| -> Result<T> {
			let whole = serde_json::to_value(state)?;
			let part = whole.pointer(&location).ok_or_else(|| Error::Path {
				path: owned.clone(),
			})?;
			T::deserialize(part).map_err(|err| Error::payload(PATCH, err))
		};

		let initial = self.body.state.with(&getter)?;
		let store = self.clone();
		let target = path.to_owned();
		Ok(LinkedState::link(
			&self.body.state,
			initial,
			getter,
			move |part: T| {
				let result = serde_json::to_value(part)
					.map_err(Error::from)
					.and_then(|value| Action::with_payload(PATCH, nest(&target, value)))
					.and_then(|action| store.dispatch(action));
				if let Err(err) = result {
					tracing::warn!(path = %target, %err, "partial write failed");
				}
			},
		))
	}

	/// Registers a side-effect pipeline. `definition` turns the stream of
	/// payloads pushed through the returned [`Effect`] into actions, which
	/// are dispatched on this store. The pipeline is subscribed only while
	/// the store has subscribers, and at most once.
	pub fn effect<P>(&self, definition: impl Fn(Stream<P>) -> Stream<Action> + 'static) -> Effect<P>
	where
		P: Clone + 'static,
	{
		let input = MulticastStream::new();
		let store = Rc::downgrade(&self.body);
		let name = format!("effect#{}", self.body.effects.borrow().len());
		let runner: Rc<dyn EffectTask> = Rc::new(EffectRunner::new(
			name,
			input.clone(),
			definition,
			move |action| match store.upgrade() {
				Some(body) => Store { body }.dispatch(action),
				None => Ok(()),
			},
		));

		if self.body.ref_count.get() > 0 {
			runner.start();
		}
		self.body.effects.borrow_mut().push(runner);
		Effect::new(input)
	}

	pub fn observer_count(&self) -> usize {
		self.body.ref_count.get()
	}

	fn effects(&self) -> Vec<Rc<dyn EffectTask>> {
		self.body.effects.borrow().clone()
	}
}

impl<S> Subscribable for Store<S>
where
	S: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
	type Item = S;

	fn subscribe_observer(&self, observer: Observer<S>) -> Subscription {
		let inner = self.body.state.subscribe_observer(observer);

		let count = self.body.ref_count.get() + 1;
		self.body.ref_count.set(count);
		if count == 1 {
			tracing::debug!("store active, starting effects");
			for effect in self.effects() {
				effect.start();
			}
		}

		let store = self.clone();
		Subscription::new(move || {
			inner.unsubscribe();
			let count = store.body.ref_count.get() - 1;
			store.body.ref_count.set(count);
			if count == 0 {
				tracing::debug!("store idle, stopping effects");
				for effect in store.effects() {
					effect.stop();
				}
			}
		})
	}
}

impl<S> std::fmt::Debug for Store<S>
where
	S: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Store")
			.field("state", &self.body.state)
			.field("subscribers", &self.body.ref_count.get())
			.finish()
	}
}
