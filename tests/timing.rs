use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rxstate::interop::from_iter;
use rxstate::operators::{debounce, interval, never, throw_error, timer, DebounceConfig, ThrottleConfig, TimeoutConfig};
use rxstate::{scheduler, Error, MulticastStream, Observer, Subscribable};

use crate::mock::{Event, Recorder};
use crate::ms;

type Timeline<T> = Rc<RefCell<Vec<(T, Duration)>>>;

/// Observer that stamps every value with the virtual time it arrived at.
fn stamped<T: 'static>(log: &Timeline<T>) -> Observer<T> {
	let log = log.clone();
	Observer::new(
		move |value| log.borrow_mut().push((value, scheduler::now())),
		|err| panic!("unexpected error: {}", err),
		|| {},
	)
}

fn emit_at(subject: &MulticastStream<u32>, script: &[(u64, u32)], complete_at: u64) {
	for &(at, value) in script {
		let subject = subject.clone();
		scheduler::set_timeout(ms(at), move || subject.next(value));
	}
	let subject = subject.clone();
	scheduler::set_timeout(ms(complete_at), move || {
		let _ = subject.complete();
	});
}

const SCRIPT: &[(u64, u32)] = &[(10, 1), (40, 2), (130, 3), (160, 4), (260, 5)];

#[test]
fn throttle_leading_only() {
	let subject = MulticastStream::new();
	let log: Timeline<u32> = Rc::default();
	let _s = subject
		.as_stream()
		.throttle_time(ms(100), ThrottleConfig::default())
		.subscribe(stamped(&log));

	emit_at(&subject, SCRIPT, 500);
	scheduler::run();
	assert_eq!(*log.borrow(), vec![(1, ms(10)), (3, ms(130)), (5, ms(260))]);
}

#[test]
fn throttle_leading_and_trailing() {
	let subject = MulticastStream::new();
	let log: Timeline<u32> = Rc::default();
	let _s = subject
		.as_stream()
		.throttle_time(ms(100), ThrottleConfig::default().trailing(true))
		.subscribe(stamped(&log));

	emit_at(&subject, SCRIPT, 500);
	scheduler::run();
	assert_eq!(
		*log.borrow(),
		vec![(1, ms(10)), (2, ms(110)), (4, ms(210)), (5, ms(310))]
	);
	assert_eq!(scheduler::pending_timers(), 0);
}

#[test]
fn throttle_trailing_only() {
	let subject = MulticastStream::new();
	let log: Timeline<u32> = Rc::default();
	let _s = subject
		.as_stream()
		.throttle_time(ms(100), ThrottleConfig::default().leading(false).trailing(true))
		.subscribe(stamped(&log));

	emit_at(&subject, SCRIPT, 500);
	scheduler::run();
	assert_eq!(*log.borrow(), vec![(2, ms(110)), (4, ms(210)), (5, ms(310))]);
}

#[test]
fn debounce_emits_after_silence_and_flushes_on_complete() {
	let subject = MulticastStream::new();
	let log: Timeline<u32> = Rc::default();
	let rec = Recorder::new();
	let _s = subject.as_stream().debounce_time(ms(50)).subscribe(stamped(&log));
	let _r = subject.as_stream().debounce_time(ms(50)).subscribe(rec.observer());

	emit_at(&subject, &[(10, 1), (30, 2), (100, 3)], 120);
	scheduler::run();
	assert_eq!(*log.borrow(), vec![(2, ms(80)), (3, ms(120))]);
	assert_eq!(rec.events(), vec![Event::Next(2), Event::Next(3), Event::Complete]);
}

#[test]
fn debounce_can_let_the_first_value_through() {
	let subject = MulticastStream::new();
	let log: Timeline<u32> = Rc::default();
	let _s = subject
		.as_stream()
		.pipe(debounce(|_: &u32| timer(ms(50)), DebounceConfig::default().emit_first(true)))
		.subscribe(stamped(&log));

	emit_at(&subject, &[(10, 1), (20, 2), (30, 3)], 200);
	scheduler::run();
	assert_eq!(*log.borrow(), vec![(1, ms(10)), (3, ms(80))]);
}

#[test]
fn delay_shifts_values_and_completion() {
	let rec = Recorder::new();
	let _s = from_iter(vec![1, 2]).delay(ms(50)).subscribe(rec.observer());

	assert!(rec.events().is_empty());
	scheduler::advance(ms(49));
	assert!(rec.events().is_empty());
	scheduler::advance(ms(1));
	assert_eq!(rec.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
	assert_eq!(scheduler::pending_timers(), 0);
}

#[test]
fn delay_does_not_hold_back_errors() {
	let rec = Recorder::new();
	let _s = from_iter(vec![1])
		.concat_with(throw_error(Error::msg("late")))
		.delay(ms(50))
		.subscribe(rec.observer());

	assert_eq!(rec.events(), vec![Event::Error(Error::msg("late"))]);
	assert_eq!(scheduler::pending_timers(), 0);
}

#[test]
fn timeout_on_first_value() {
	let rec = Recorder::new();
	let _s = never::<u8>()
		.timeout(TimeoutConfig::default().first(ms(100)))
		.subscribe(rec.observer());

	scheduler::advance(ms(99));
	assert!(rec.events().is_empty());
	scheduler::advance(ms(1));
	assert_eq!(rec.events(), vec![Event::Error(Error::Timeout)]);
}

#[test]
fn timeout_between_values() {
	let subject = MulticastStream::new();
	let rec = Recorder::new();
	let _s = subject
		.as_stream()
		.timeout(TimeoutConfig::default().each(ms(60)))
		.subscribe(rec.observer());

	emit_at(&subject, &[(10, 1), (50, 2)], 1000);
	scheduler::advance(ms(200));
	assert_eq!(
		rec.events(),
		vec![Event::Next(1), Event::Next(2), Event::Error(Error::Timeout)]
	);
	assert_eq!(scheduler::now(), ms(200));
	scheduler::run();
	assert_eq!(rec.events().len(), 3);
}

#[test]
fn interval_with_take_leaves_no_timers() {
	let rec = Recorder::new();
	let _s = interval(ms(10)).take(3).subscribe(rec.observer());

	scheduler::run();
	assert_eq!(rec.values(), vec![0, 1, 2]);
	assert!(rec.completed());
	assert_eq!(scheduler::now(), ms(30));
	assert_eq!(scheduler::pending_timers(), 0);
}
