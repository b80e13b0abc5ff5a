use std::fmt;

use tracing::{debug, trace};

use crate::context::{ContextPatch, LoadingContext, LoadingError, clamp_progress};
use crate::error::{Result, StateError};
use crate::event::{Listener, ListenerId, Listeners, LoadingEvent};
use crate::state::LoadingState;

/// Checked state machine for one model load.
///
/// Every accepted transition replaces the context and then notifies
/// listeners synchronously, in registration order, before returning.
/// A rejected transition changes nothing and notifies no one.
///
/// Listeners receive the event by reference and cannot call back into the
/// machine; forward into a channel if a reaction needs to drive it.
pub struct StateMachine<D> {
    state: LoadingState,
    context: LoadingContext<D>,
    listeners: Listeners<D>,
}

impl<D: fmt::Debug> fmt::Debug for StateMachine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.state)
            .field("context", &self.context)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<D> Default for StateMachine<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> StateMachine<D> {
    pub fn new() -> Self {
        Self {
            state: LoadingState::Idle,
            context: LoadingContext::default(),
            listeners: Listeners::default(),
        }
    }

    pub fn state(&self) -> LoadingState {
        self.state
    }

    pub fn context(&self) -> &LoadingContext<D> {
        &self.context
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LoadingEvent<'_, D>) + Send + 'static,
    {
        self.listeners.add(Box::new(listener) as Listener<D>)
    }

    /// Returns whether `id` was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn can_transition_to(&self, to: LoadingState) -> bool {
        self.state.can_transition_to(to)
    }

    /// Move to `to`, applying `patch` to the context.
    pub fn transition(&mut self, to: LoadingState, patch: ContextPatch<D>) -> Result<()> {
        let from = self.state;
        if !from.can_transition_to(to) {
            debug!(%from, %to, "transition rejected");
            return Err(StateError::IllegalTransition { from, to });
        }

        let context = std::mem::take(&mut self.context);
        self.context = patch.apply(context);
        self.state = to;
        debug!(%from, %to, progress = self.context.progress, "state transition");

        self.listeners.emit(&LoadingEvent::StateChange {
            from,
            to,
            context: &self.context,
        });
        self.listeners.emit(&LoadingEvent::Entered {
            state: to,
            context: &self.context,
        });
        Ok(())
    }

    pub fn start_loading(&mut self) -> Result<()> {
        self.transition(
            LoadingState::Loading,
            ContextPatch::new()
                .progress(0.0)
                .message("Loading")
                .clear_error(),
        )
    }

    pub fn start_downloading(&mut self) -> Result<()> {
        self.transition(
            LoadingState::Downloading,
            ContextPatch::new().message("Downloading"),
        )
    }

    pub fn start_decoding(&mut self) -> Result<()> {
        self.transition(
            LoadingState::Decoding,
            ContextPatch::new().message("Decoding"),
        )
    }

    pub fn start_building(&mut self) -> Result<()> {
        self.transition(
            LoadingState::Building,
            ContextPatch::new().message("Building"),
        )
    }

    pub fn succeed(&mut self, data: D) -> Result<()> {
        self.transition(
            LoadingState::Success,
            ContextPatch::new()
                .progress(100.0)
                .message("Loaded")
                .data(data),
        )
    }

    /// Record `message` as the failure of `phase` and move to error.
    pub fn fail(&mut self, message: impl Into<String>, phase: LoadingState) -> Result<()> {
        let message = message.into();
        self.transition(
            LoadingState::Error,
            ContextPatch::new().message(message.clone()).error(LoadingError {
                message,
                phase,
            }),
        )
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition(LoadingState::Paused, ContextPatch::new().message("Paused"))
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != LoadingState::Paused {
            return Err(StateError::IllegalTransition {
                from: self.state,
                to: LoadingState::Downloading,
            });
        }
        self.start_downloading()
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(
            LoadingState::Cancelled,
            ContextPatch::new().message("Cancelled"),
        )
    }

    /// Return to idle with an empty context from any state.
    pub fn reset(&mut self) {
        let from = self.state;
        self.state = LoadingState::Idle;
        self.context = LoadingContext::default();
        debug!(%from, "state reset");
        self.listeners.emit(&LoadingEvent::StateChange {
            from,
            to: LoadingState::Idle,
            context: &self.context,
        });
    }

    /// Set progress (and optionally the message) without changing state.
    /// Only accepted while downloading or decoding.
    pub fn update_progress(&mut self, progress: f64, message: Option<String>) -> Result<()> {
        if !matches!(self.state, LoadingState::Downloading | LoadingState::Decoding) {
            return Err(StateError::ProgressRejected { state: self.state });
        }
        self.context.progress = clamp_progress(progress);
        if let Some(message) = message {
            self.context.message = message;
        }
        trace!(state = %self.state, progress = self.context.progress, "progress");
        self.listeners.emit(&LoadingEvent::Progress {
            state: self.state,
            context: &self.context,
        });
        Ok(())
    }

    pub fn can_pause(&self) -> bool {
        self.state == LoadingState::Downloading
    }

    pub fn can_resume(&self) -> bool {
        self.state == LoadingState::Paused
    }

    pub fn can_cancel(&self) -> bool {
        self.state.is_active()
    }
}
