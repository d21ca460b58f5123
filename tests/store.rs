use serde::{Deserialize, Serialize};
use serde_json::json;

use rxstate::{scheduler, Action, Error, Store, Stream, Subscribable, PATCH, RESET, SET};

use crate::mock::{self, init_tracing, Recorder, Spy};
use crate::ms;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct User {
	name: String,
	age: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct App {
	count: i64,
	user: User,
}

fn counter() -> Store<App> {
	Store::builder(App::default())
		.reducer("add", |state: &App, by: i64| App {
			count: state.count + by,
			..state.clone()
		})
		.build()
}

#[test]
fn custom_reducer() {
	let store = counter();
	let rec = Recorder::new();
	let _s = store.subscribe(rec.observer());

	store.dispatch(Action::with_payload("add", 2).unwrap()).unwrap();
	store.dispatch(Action::with_payload("add", 3).unwrap()).unwrap();

	assert_eq!(store.value().count, 5);
	let counts: Vec<i64> = rec.values().iter().map(|app| app.count).collect();
	assert_eq!(counts, vec![0, 2, 5]);
}

#[test]
fn bad_dispatches_leave_state_alone() {
	let store = counter();

	assert_eq!(
		store.dispatch(Action::new("nope")),
		Err(Error::UnknownAction {
			action: "nope".into()
		})
	);
	assert!(matches!(
		store.dispatch(Action::with_payload("add", "two").unwrap()),
		Err(Error::Payload { action, .. }) if action == "add"
	));
	assert_eq!(store.value(), App::default());
}

#[test]
fn built_in_reducers() {
	let store = counter();
	store
		.dispatch(Action::with_payload(SET, json!({ "count": 4, "user": { "name": "ann", "age": 30 } })).unwrap())
		.unwrap();
	assert_eq!(store.value().user.name, "ann");

	store
		.dispatch(Action::with_payload(PATCH, json!({ "user": { "age": 31 } })).unwrap())
		.unwrap();
	assert_eq!(
		store.value(),
		App {
			count: 4,
			user: User {
				name: "ann".into(),
				age: 31
			}
		}
	);

	store.dispatch(Action::new(RESET)).unwrap();
	assert_eq!(store.value(), App::default());
}

#[test]
fn actions_use_type_on_the_wire() {
	let action: Action = serde_json::from_value(json!({ "type": "add", "payload": 1 })).unwrap();
	assert_eq!(action, Action::with_payload("add", 1).unwrap());
	assert_eq!(serde_json::to_value(Action::new(RESET)).unwrap(), json!({ "type": "reset" }));
}

#[test]
fn selectors() {
	let store = counter();
	let doubled = store.select("doubled", |app: &App| app.count * 2);
	let rec = Recorder::new();
	let _s = doubled.subscribe(rec.observer());

	store.dispatch(Action::with_payload("add", 3).unwrap()).unwrap();
	assert_eq!(rec.values(), vec![0, 6]);

	let found = store.selector::<i64>("doubled").unwrap();
	assert_eq!(found.value(), Some(6));
	assert!(store.selector::<String>("doubled").is_none());
	assert!(store.selector::<i64>("missing").is_none());
}

#[test]
fn effects_run_only_while_subscribed() {
	init_tracing();
	let store = counter();
	let bump = store.effect(|payloads: Stream<i64>| payloads.try_map(|by| Action::with_payload("add", by)));

	bump.call(1);
	assert_eq!(store.value().count, 0);

	let a = store.subscribe_next(|_| {});
	let b = store.subscribe_next(|_| {});
	assert_eq!(store.observer_count(), 2);
	bump.call(2);
	assert_eq!(store.value().count, 2);

	a.unsubscribe();
	bump.call(3);
	assert_eq!(store.value().count, 5);

	b.unsubscribe();
	bump.call(4);
	assert_eq!(store.value().count, 5);
}

#[test]
fn stopping_effects_cancels_work_in_flight() {
	let store = counter();
	let bump = store.effect(|payloads: Stream<i64>| {
		payloads
			.delay(ms(50))
			.try_map(|by| Action::with_payload("add", by))
	});

	let subscription = store.subscribe_next(|_| {});
	bump.call(1);
	scheduler::advance(ms(50));
	assert_eq!(store.value().count, 1);

	bump.call(1);
	subscription.unsubscribe();
	scheduler::run();
	assert_eq!(store.value().count, 1);
}

#[test]
fn partial_state_is_isolated() {
	let store = counter();
	let name = store.partial::<String>("user.name").unwrap();
	let age = store.partial::<u32>("user.age").unwrap();

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());
	let watching = age.subscribe_next({
		let mock = mock.clone();
		move |value| mock.get().trigger(value as u64)
	});

	name.next("bob".to_owned());
	mock.get().checkpoint();
	assert_eq!(store.value().user.name, "bob");
	assert_eq!(store.value().user.age, 0);

	store.dispatch(Action::with_payload("add", 1).unwrap()).unwrap();
	assert_eq!(name.value(), "bob");

	watching.unsubscribe();
	age.next(40);
	assert_eq!(store.value().user, User { name: "bob".into(), age: 40 });
}

#[test]
fn partial_rejects_missing_paths() {
	let store = counter();
	assert_eq!(
		store.partial::<u32>("user.height").err(),
		Some(Error::Path {
			path: "user.height".into()
		})
	);
}
