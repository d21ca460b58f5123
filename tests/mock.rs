use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use mockall::*;

#[automock]
pub trait Spy {
	fn trigger(&self, value: u64);
}

#[derive(Clone)]
pub struct SharedMock(Arc<Mutex<MockSpy>>);

impl SharedMock {
	pub fn new() -> SharedMock {
		SharedMock(Arc::new(Mutex::new(MockSpy::new())))
	}

	pub fn get<'a>(&'a self) -> MutexGuard<'a, MockSpy> {
		return self.0.lock().unwrap();
	}
}

/// Records every notification in arrival order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Event<T> {
	Next(T),
	Error(rxstate::Error),
	Complete,
}

pub struct Recorder<T>(Rc<RefCell<Vec<Event<T>>>>);

impl<T> Clone for Recorder<T> {
	fn clone(&self) -> Self {
		Recorder(self.0.clone())
	}
}

impl<T: Clone + 'static> Recorder<T> {
	pub fn new() -> Self {
		Recorder(Rc::new(RefCell::new(vec![])))
	}

	pub fn observer(&self) -> rxstate::Observer<T> {
		let next = self.0.clone();
		let error = self.0.clone();
		let complete = self.0.clone();
		rxstate::Observer::new(
			move |value| next.borrow_mut().push(Event::Next(value)),
			move |err| error.borrow_mut().push(Event::Error(err)),
			move || complete.borrow_mut().push(Event::Complete),
		)
	}

	pub fn events(&self) -> Vec<Event<T>> {
		self.0.borrow().clone()
	}

	pub fn values(&self) -> Vec<T> {
		self.0
			.borrow()
			.iter()
			.filter_map(|event| match event {
				Event::Next(value) => Some(value.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn completed(&self) -> bool {
		self.0.borrow().iter().any(|event| matches!(event, Event::Complete))
	}

	pub fn error(&self) -> Option<rxstate::Error> {
		self.0.borrow().iter().find_map(|event| match event {
			Event::Error(err) => Some(err.clone()),
			_ => None,
		})
	}
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::TRACE)
		.with_test_writer()
		.try_init();
}
