use std::cell::RefCell;
use std::rc::Rc;

use crate::{Action, MulticastStream, Observer, Result, Stream, Subscribable, Subscription};

/// Lifecycle of a side-effect pipeline owned by a store.
///
/// A store starts every task when it gains its first subscriber and stops
/// them all when it loses the last one.
pub trait EffectTask {
	fn start(&self);

	fn stop(&self);

	fn is_running(&self) -> bool;
}

/// Invoker returned by [`Store::effect`](crate::Store::effect).
///
/// Payloads pushed while the owning store has no subscribers are dropped.
pub struct Effect<P> {
	input: MulticastStream<P>,
}

impl<P> Clone for Effect<P> {
	fn clone(&self) -> Self {
		Self {
			input: self.input.clone(),
		}
	}
}

impl<P: Clone + 'static> Effect<P> {
	pub(crate) fn new(input: MulticastStream<P>) -> Self {
		Effect { input }
	}

	pub fn call(&self, payload: P) {
		if self.input.observer_count() == 0 {
			tracing::trace!("effect invoked while stopped, payload dropped");
		}
		self.input.next(payload)
	}
}

impl<P> std::fmt::Debug for Effect<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Effect").finish_non_exhaustive()
	}
}

type Pipeline<P> = Rc<dyn Fn(Stream<P>) -> Stream<Action>>;
type Dispatch = Rc<dyn Fn(Action) -> Result<()>>;

/// Runs a pipeline from a private payload channel to the store's dispatch.
pub(crate) struct EffectRunner<P> {
	name: String,
	input: MulticastStream<P>,
	pipeline: Pipeline<P>,
	dispatch: Dispatch,
	running: Rc<RefCell<Option<Subscription>>>,
}

impl<P: Clone + 'static> EffectRunner<P> {
	pub(crate) fn new(
		name: impl Into<String>,
		input: MulticastStream<P>,
		pipeline: impl Fn(Stream<P>) -> Stream<Action> + 'static,
		dispatch: impl Fn(Action) -> Result<()> + 'static,
	) -> Self {
		EffectRunner {
			name: name.into(),
			input,
			pipeline: Rc::new(pipeline),
			dispatch: Rc::new(dispatch),
			running: Rc::default(),
		}
	}
}

fn halt(running: &RefCell<Option<Subscription>>) {
	let subscription = running.borrow_mut().take();
	if let Some(subscription) = subscription {
		subscription.unsubscribe();
	}
}

impl<P: Clone + 'static> EffectTask for EffectRunner<P> {
	fn start(&self) {
		if self.is_running() {
			return;
		}
		tracing::debug!(effect = %self.name, "effect start");

		let holder = Subscription::empty();
		*self.running.borrow_mut() = Some(holder.clone());

		let output = (self.pipeline)(self.input.as_stream());
		let dispatch = self.dispatch.clone();
		let name = self.name.clone();
		let on_error = (self.name.clone(), self.running.clone());
		let on_complete = (self.name.clone(), self.running.clone());
		holder.add(output.subscribe_observer(Observer::new(
			move |action: Action| {
				let kind = action.kind.clone();
				if let Err(err) = dispatch(action) {
					tracing::warn!(effect = %name, action = %kind, %err, "effect dispatch failed");
				}
			},
			move |err| {
				let (name, running) = &on_error;
				tracing::error!(effect = %name, %err, "effect failed");
				halt(running);
			},
			move || {
				let (name, running) = &on_complete;
				tracing::debug!(effect = %name, "effect completed");
				halt(running);
			},
		)));
	}

	fn stop(&self) {
		if self.is_running() {
			tracing::debug!(effect = %self.name, "effect stop");
		}
		halt(&self.running);
	}

	fn is_running(&self) -> bool {
		self.running
			.borrow()
			.as_ref()
			.map_or(false, |subscription| !subscription.is_closed())
	}
}
