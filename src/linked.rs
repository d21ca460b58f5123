use std::cell::Cell;
use std::fmt::Debug;
use std::rc::Rc;

use enclose::enclose;

use crate::graph::{NodeId, NodeKind};
use crate::{Error, Observer, Result, State, Subscribable, Subscription};

/// Direction in which a linked pair is currently propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
	Idle,
	/// A parent change is being applied to the child; writes back up are
	/// suppressed.
	SuppressingUp,
	/// A child write is being applied to the parent; the parent's echo is
	/// suppressed.
	SuppressingDown,
}

#[derive(Debug)]
pub struct EchoGuard {
	state: Cell<Echo>,
}

impl Default for EchoGuard {
	fn default() -> Self {
		Self::new()
	}
}

impl EchoGuard {
	pub fn new() -> Self {
		EchoGuard {
			state: Cell::new(Echo::Idle),
		}
	}

	pub fn current(&self) -> Echo {
		self.state.get()
	}

	pub fn allows_up(&self) -> bool {
		self.state.get() != Echo::SuppressingUp
	}

	pub fn allows_down(&self) -> bool {
		self.state.get() != Echo::SuppressingDown
	}

	/// Switches to `state` until the returned scope is dropped.
	pub fn enter(&self, state: Echo) -> EchoScope<'_> {
		let previous = self.state.replace(state);
		EchoScope {
			guard: self,
			previous,
		}
	}
}

pub struct EchoScope<'a> {
	guard: &'a EchoGuard,
	previous: Echo,
}

impl Drop for EchoScope<'_> {
	fn drop(&mut self) {
		self.guard.state.set(self.previous);
	}
}

/// A writable projection of a parent [`State`].
///
/// Parent changes flow down through the getter, and only reach the child's
/// observers when the projected part actually changed. Child writes flow up
/// through the writer.
pub struct LinkedState<T> {
	body: Rc<LinkedBody<T>>,
}

struct LinkedBody<T> {
	state: State<T>,
	write: Box<dyn Fn(T)>,
	echo: Rc<EchoGuard>,
	upstream: Subscription,
}

impl<T> Drop for LinkedBody<T> {
	fn drop(&mut self) {
		self.upstream.unsubscribe();
	}
}

impl<T> Clone for LinkedState<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> LinkedState<T>
where
	T: Clone + PartialEq + 'static,
{
	pub(crate) fn link<F>(
		parent: &State<F>,
		initial: T,
		getter: impl Fn(&F) -> Result<T> + 'static,
		write: impl Fn(T) + 'static,
	) -> Self
	where
		F: Clone + 'static,
	{
		let state = State::with_kind(initial, NodeKind::Linked, &[parent.node()]);
		let echo = Rc::new(EchoGuard::new());

		let upstream = parent.subscribe_observer(Observer::new(
			enclose!((state, echo) move |whole: F| {
				if !echo.allows_down() {
					return;
				}
				match getter(&whole) {
					Ok(part) => {
						if state.with(|current| current != &part) {
							let _scope = echo.enter(Echo::SuppressingUp);
							state.next(part);
						}
					}
					Err(err) => tracing::warn!(%err, "linked state getter failed"),
				}
			}),
			enclose!((state) move |err: Error| {
				let _ = state.error(err);
			}),
			enclose!((state) move || {
				let _ = state.complete();
			}),
		));

		LinkedState {
			body: Rc::new(LinkedBody {
				state,
				write: Box::new(write),
				echo,
				upstream,
			}),
		}
	}

	pub fn value(&self) -> T {
		self.body.state.value()
	}

	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		self.body.state.with(func)
	}

	pub fn next(&self, value: T) {
		self.body.state.next(value.clone());
		if self.body.echo.allows_up() {
			let _scope = self.body.echo.enter(Echo::SuppressingDown);
			(self.body.write)(value);
		}
	}

	pub fn update(&self, func: impl FnOnce(&T) -> T) {
		let current = self.value();
		self.next(func(&current))
	}

	pub fn echo(&self) -> Echo {
		self.body.echo.current()
	}

	pub fn observer_count(&self) -> usize {
		self.body.state.observer_count()
	}

	pub fn node(&self) -> NodeId {
		self.body.state.node()
	}
}

impl<T> Subscribable for LinkedState<T>
where
	T: Clone + PartialEq + 'static,
{
	type Item = T;

	fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
		self.body.state.subscribe_observer(observer)
	}
}

impl<T> Debug for LinkedState<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LinkedState")
			.field("value", &self.body.state)
			.field("echo", &self.body.echo.current())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scopes_restore_previous_state() {
		let guard = EchoGuard::new();
		assert!(guard.allows_up() && guard.allows_down());
		{
			let _down = guard.enter(Echo::SuppressingDown);
			assert!(!guard.allows_down());
			assert!(guard.allows_up());
			{
				let _up = guard.enter(Echo::SuppressingUp);
				assert!(!guard.allows_up());
			}
			assert_eq!(guard.current(), Echo::SuppressingDown);
		}
		assert_eq!(guard.current(), Echo::Idle);
	}

	#[test]
	fn child_write_is_not_echoed_back() {
		let parent = State::new((1, 2));
		let first = parent.partial(|p| p.0, |p, v| (v, p.1));

		let seen = Rc::new(std::cell::RefCell::new(vec![]));
		let _sub = first.subscribe_next(enclose!((seen) move |v| seen.borrow_mut().push(v)));

		first.next(10);
		assert_eq!(parent.value(), (10, 2));
		assert_eq!(*seen.borrow(), vec![1, 10]);

		parent.next((20, 2));
		assert_eq!(first.value(), 20);
		assert_eq!(*seen.borrow(), vec![1, 10, 20]);
		assert_eq!(first.echo(), Echo::Idle);
	}
}
