use std::cell::Cell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use rxstate::interop::{from_fetch, from_future, from_iter, Fetch};
use rxstate::operators::{interval, map, of, take};
use rxstate::{scheduler, Error, MulticastStream, Observer, Result, Stream, Subscribable, Subscription};

use crate::mock::{self, Event, Recorder, Spy};
use crate::ms;

#[test]
fn every_subscription_runs_the_producer() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(2).return_const(());

	let stream = Stream::new({
		let mock = mock.clone();
		move |observer: Observer<u64>| {
			mock.get().trigger(1);
			observer.next(1);
			observer.complete();
			Ok(Subscription::empty())
		}
	});

	let a = Recorder::new();
	let b = Recorder::new();
	let _a = stream.subscribe(a.observer());
	let _b = stream.subscribe(b.observer());

	mock.get().checkpoint();
	assert_eq!(a.events(), vec![Event::Next(1), Event::Complete]);
	assert_eq!(a.events(), b.events());
}

#[test]
fn completion_tears_down_once() {
	let teardowns = Rc::new(Cell::new(0));
	let stream = Stream::new({
		let teardowns = teardowns.clone();
		move |observer: Observer<u32>| {
			observer.next(1);
			observer.complete();
			observer.next(2);
			let teardowns = teardowns.clone();
			Ok(Subscription::new(move || teardowns.set(teardowns.get() + 1)))
		}
	});

	let rec = Recorder::new();
	let subscription = stream.subscribe(rec.observer());
	assert!(subscription.is_closed());
	assert_eq!(teardowns.get(), 1);

	subscription.unsubscribe();
	assert_eq!(teardowns.get(), 1);
	assert_eq!(rec.events(), vec![Event::Next(1), Event::Complete]);
}

#[test]
fn one_observer_serves_several_subscriptions() {
	let rec = Recorder::new();
	let observer = rec.observer();
	let stream = of(1);

	let _a = stream.subscribe(observer.clone());
	let _b = stream.subscribe(observer.clone());
	assert_eq!(
		rec.events(),
		vec![Event::Next(1), Event::Complete, Event::Next(1), Event::Complete]
	);

	let subject = MulticastStream::new();
	let _c = subject.subscribe(observer.clone());
	subject.complete().unwrap();
	let _d = subject.subscribe(observer.clone());
	let _e = stream.subscribe(observer);
	assert_eq!(rec.values(), vec![1, 1, 1]);
	assert_eq!(rec.events().iter().filter(|e| **e == Event::Complete).count(), 5);
}

#[test]
fn producer_error_reaches_observer_once() {
	let stream = Stream::new(|_: Observer<u32>| Err(Error::msg("boom")));
	let rec = Recorder::new();
	let _s = stream.subscribe(rec.observer());
	assert_eq!(rec.events(), vec![Event::Error(Error::msg("boom"))]);
}

#[test]
#[should_panic(expected = "unhandled stream error")]
fn bare_callback_rethrows_errors() {
	let stream = Stream::new(|_: Observer<u32>| Err(Error::msg("boom")));
	let _s = stream.subscribe_next(|_| {});
}

#[test]
fn unsubscribe_stops_timers() {
	let rec = Recorder::new();
	let subscription = interval(ms(10)).subscribe(rec.observer());

	scheduler::advance(ms(25));
	assert_eq!(rec.values(), vec![0, 1]);

	subscription.unsubscribe();
	scheduler::advance(ms(50));
	assert_eq!(rec.values(), vec![0, 1]);
	assert_eq!(scheduler::pending_timers(), 0);
}

#[test]
fn chained_operators() {
	let rec = Recorder::new();
	let _s = from_iter(vec![1, 2, 3, 4])
		.map(|v| v * 10)
		.filter(|v| *v > 10)
		.subscribe(rec.observer());
	assert_eq!(
		rec.events(),
		vec![Event::Next(20), Event::Next(30), Event::Next(40), Event::Complete]
	);

	let rec = Recorder::new();
	let _s = rxstate::pipe!(from_iter(vec![1, 2, 3]), map(|v: i32| v + 1), take(2))
		.subscribe(rec.observer());
	assert_eq!(rec.events(), vec![Event::Next(2), Event::Next(3), Event::Complete]);
}

#[test]
fn future_resolves_on_the_loop() {
	let rec = Recorder::new();
	let _s = from_future(|| async { Ok::<_, Error>(5) }).subscribe(rec.observer());
	assert!(rec.events().is_empty());

	scheduler::run_microtasks();
	assert_eq!(rec.events(), vec![Event::Next(5), Event::Complete]);
}

struct SlowClient {
	finished: Rc<Cell<bool>>,
}

impl Fetch for SlowClient {
	type Request = &'static str;
	type Response = String;

	fn fetch(&self, request: &'static str) -> LocalBoxFuture<'static, Result<String>> {
		let finished = self.finished.clone();
		Box::pin(async move {
			scheduler::sleep(ms(100)).await;
			finished.set(true);
			Ok(format!("response to {}", request))
		})
	}
}

#[test]
fn fetch_delivers_response() {
	let client = Rc::new(SlowClient {
		finished: Rc::new(Cell::new(false)),
	});
	let rec = Recorder::new();
	let _s = from_fetch(client, "/users").subscribe(rec.observer());

	scheduler::advance(ms(100));
	assert_eq!(
		rec.events(),
		vec![Event::Next("response to /users".to_owned()), Event::Complete]
	);
}

#[test]
fn unsubscribe_aborts_fetch() {
	let finished = Rc::new(Cell::new(false));
	let client = Rc::new(SlowClient {
		finished: finished.clone(),
	});
	let rec = Recorder::new();
	let subscription = from_fetch(client, "/users").subscribe(rec.observer());

	scheduler::advance(ms(50));
	subscription.unsubscribe();
	scheduler::advance(ms(100));

	assert!(rec.events().is_empty());
	assert!(!finished.get());
	assert_eq!(scheduler::pending_timers(), 0);
}
