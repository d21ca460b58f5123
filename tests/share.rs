use std::cell::Cell;
use std::rc::Rc;

use rxstate::interop::from_iter;
use rxstate::operators::{defer, empty, interval, of, share_with, throw_error, ShareConfig, ShareReplayConfig};
use rxstate::{scheduler, Error, Stream, Subscribable};

use crate::mock::{init_tracing, Event, Recorder};
use crate::ms;

#[test]
fn producer_runs_once_for_every_subscriber() {
	let runs = Rc::new(Cell::new(0));
	let ticks = Rc::new(Cell::new(0));
	let shared = defer({
		let runs = runs.clone();
		move || {
			runs.set(runs.get() + 1);
			interval(ms(10))
		}
	})
	.tap({
		let ticks = ticks.clone();
		move |_| ticks.set(ticks.get() + 1)
	})
	.share();

	let a = Recorder::new();
	let b = Recorder::new();
	let _a = shared.subscribe(a.observer());
	let _b = shared.subscribe(b.observer());

	scheduler::advance(ms(25));
	assert_eq!(a.values(), vec![0, 1]);
	assert_eq!(b.values(), vec![0, 1]);
	assert_eq!(runs.get(), 1);
	assert_eq!(ticks.get(), 2);
}

#[test]
fn share_reconnects_after_ref_count_drops_to_zero() {
	init_tracing();
	let shared = interval(ms(10)).share();

	let a = Recorder::new();
	let first = shared.subscribe(a.observer());
	scheduler::advance(ms(35));
	assert_eq!(a.values(), vec![0, 1, 2]);
	first.unsubscribe();
	assert_eq!(scheduler::pending_timers(), 0);

	let c = Recorder::new();
	let _c = shared.subscribe(c.observer());
	scheduler::advance(ms(10));
	assert_eq!(c.values(), vec![0]);
}

#[test]
fn share_can_keep_the_source_running() {
	let shared = interval(ms(10)).pipe(share_with(ShareConfig::default().reset_on_ref_count_zero(false)));

	let a = Recorder::new();
	let first = shared.subscribe(a.observer());
	scheduler::advance(ms(35));
	first.unsubscribe();
	assert_eq!(scheduler::pending_timers(), 1);

	let c = Recorder::new();
	let _c = shared.subscribe(c.observer());
	scheduler::advance(ms(10));
	assert_eq!(c.values(), vec![3]);
}

#[test]
fn share_replay_serves_late_subscribers_after_completion() {
	let runs = Rc::new(Cell::new(0));
	let shared = defer({
		let runs = runs.clone();
		move || {
			runs.set(runs.get() + 1);
			from_iter(vec![1, 2, 3])
		}
	})
	.share_replay(ShareReplayConfig::default().buffer_size(2));

	let first = Recorder::new();
	let _first = shared.subscribe(first.observer());
	assert_eq!(
		first.events(),
		vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Complete]
	);

	let second = Recorder::new();
	let _second = shared.subscribe(second.observer());
	assert_eq!(second.events(), vec![Event::Next(2), Event::Next(3), Event::Complete]);
	assert_eq!(runs.get(), 1);
}

/// Source that counts its runs and emits the run number before ending
/// with `end`.
fn counted(runs: &Rc<Cell<u32>>, end: fn() -> Stream<u32>) -> Stream<u32> {
	defer({
		let runs = runs.clone();
		move || {
			runs.set(runs.get() + 1);
			of(runs.get()).concat_with(end())
		}
	})
}

#[test]
fn share_restarts_after_termination() {
	let runs = Rc::new(Cell::new(0));
	let shared = counted(&runs, empty).share();

	let first = Recorder::new();
	let _first = shared.subscribe(first.observer());
	let second = Recorder::new();
	let _second = shared.subscribe(second.observer());

	assert_eq!(runs.get(), 2);
	assert_eq!(first.events(), vec![Event::Next(1), Event::Complete]);
	assert_eq!(second.events(), vec![Event::Next(2), Event::Complete]);

	let runs = Rc::new(Cell::new(0));
	let failing = counted(&runs, || throw_error(Error::msg("gone"))).share();
	let first = Recorder::new();
	let _first = failing.subscribe(first.observer());
	let second = Recorder::new();
	let _second = failing.subscribe(second.observer());

	assert_eq!(runs.get(), 2);
	assert_eq!(second.events(), vec![Event::Next(2), Event::Error(Error::msg("gone"))]);
}

#[test]
fn share_can_keep_the_terminated_subject() {
	let runs = Rc::new(Cell::new(0));
	let shared = counted(&runs, empty).pipe(share_with(ShareConfig::default().reset_on_complete(false)));

	let _first = shared.subscribe(Recorder::new().observer());
	let late = Recorder::new();
	let _late = shared.subscribe(late.observer());
	assert_eq!(runs.get(), 1);
	assert_eq!(late.events(), vec![Event::Complete]);

	let runs = Rc::new(Cell::new(0));
	let failing = counted(&runs, || throw_error(Error::msg("gone")))
		.pipe(share_with(ShareConfig::default().reset_on_error(false)));

	let _first = failing.subscribe(Recorder::new().observer());
	let late = Recorder::new();
	let _late = failing.subscribe(late.observer());
	assert_eq!(runs.get(), 1);
	assert_eq!(late.events(), vec![Event::Error(Error::msg("gone"))]);
}

#[test]
fn share_replay_can_disconnect_when_unobserved() {
	let shared = interval(ms(10)).share_replay(
		ShareReplayConfig::default()
			.buffer_size(2)
			.reset_on_ref_count_zero(true),
	);

	let a = Recorder::new();
	let first = shared.subscribe(a.observer());
	scheduler::advance(ms(35));
	assert_eq!(a.values(), vec![0, 1, 2]);
	first.unsubscribe();
	assert_eq!(scheduler::pending_timers(), 0);

	let c = Recorder::new();
	let _c = shared.subscribe(c.observer());
	assert!(c.values().is_empty());
	scheduler::advance(ms(10));
	assert_eq!(c.values(), vec![0]);
}

#[test]
fn share_replay_keeps_the_buffer_warm_by_default() {
	let shared = interval(ms(10)).share_replay(ShareReplayConfig::default().buffer_size(2));

	let a = Recorder::new();
	let first = shared.subscribe(a.observer());
	scheduler::advance(ms(35));
	first.unsubscribe();
	assert_eq!(scheduler::pending_timers(), 1);

	let c = Recorder::new();
	let _c = shared.subscribe(c.observer());
	assert_eq!(c.values(), vec![1, 2]);
}
