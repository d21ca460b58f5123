//! Push-based streams, derived state and reducer stores for single-threaded
//! UIs.
//!
//! The building blocks:
//!
//! * [`Stream`]: a cold, unicast source. Every subscription runs the
//!   producer again.
//! * [`MulticastStream`], [`State`], [`ReplayStream`]: hot sources sharing
//!   one sequence between all observers.
//! * [`DerivedState`] and [`LinkedState`]: memoized read-only projections
//!   and two-way bound parts of a [`State`].
//! * [`Store`]: a [`State`] changed only through named reducers, with
//!   side effects that run only while the store is observed.
//!
//! Everything is `!Send`. Timers and futures run on the thread-local
//! [`scheduler`].

#[macro_use]
pub mod macros;

mod derived;
mod effect;
mod error;
mod linked;
mod memo;
mod multicast;
mod observer;
mod replay;
mod state;
mod store;
mod stream;
mod subscription;

pub mod graph;
pub mod interop;
pub mod operators;
pub mod scheduler;

pub use derived::{Derivable, DerivedState, Parents};
pub use effect::{Effect, EffectTask};
pub use error::{Error, Result};
pub use linked::{Echo, EchoGuard, EchoScope, LinkedState};
pub use memo::{same_f64, Memo};
pub use multicast::{MulticastStream, Subject};
pub use observer::Observer;
pub use replay::{ReplayConfig, ReplayStream};
pub use state::State;
pub use store::{Action, Store, StoreBuilder, PATCH, RESET, SET};
pub use stream::{Stream, Subscribable};
pub use subscription::Subscription;
