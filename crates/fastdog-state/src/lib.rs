//! Loading lifecycle for a streamed model.
//!
//! ```text
//! idle -> loading -> downloading <-> paused
//!                       |
//!                       v
//!                    decoding -> building -> success
//!
//! loading | downloading | decoding | building -> error
//! any active state -> cancelled;  success | error | cancelled -> idle
//! ```
//!
//! [`StateMachine`] checks every transition against the table in
//! [`LoadingState::successors`] and notifies typed listeners synchronously.

pub use context::{ContextPatch, LoadingContext, LoadingError};
pub use error::{Result, StateError};
pub use event::{Listener, ListenerId, LoadingEvent};
pub use machine::StateMachine;
pub use state::LoadingState;

mod context;
mod error;
mod event;
mod machine;
mod state;
