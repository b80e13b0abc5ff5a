use crate::context::LoadingContext;
use crate::state::LoadingState;

/// Notification delivered to listeners, borrowing the machine's context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadingEvent<'a, D> {
    /// Emitted first for every accepted transition and for `reset`.
    StateChange {
        from: LoadingState,
        to: LoadingState,
        context: &'a LoadingContext<D>,
    },
    /// Emitted right after the matching `StateChange` of a transition.
    Entered {
        state: LoadingState,
        context: &'a LoadingContext<D>,
    },
    /// In-phase progress update; the state does not change.
    Progress {
        state: LoadingState,
        context: &'a LoadingContext<D>,
    },
}

impl<D> LoadingEvent<'_, D> {
    pub fn context(&self) -> &LoadingContext<D> {
        match self {
            Self::StateChange { context, .. }
            | Self::Entered { context, .. }
            | Self::Progress { context, .. } => context,
        }
    }

    /// The state the machine is in once the event is delivered.
    pub fn state(&self) -> LoadingState {
        match *self {
            Self::StateChange { to, .. } => to,
            Self::Entered { state, .. } | Self::Progress { state, .. } => state,
        }
    }
}

/// Handle returned by [`StateMachine::subscribe`](crate::StateMachine::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener<D> = Box<dyn FnMut(&LoadingEvent<'_, D>) + Send>;

/// Listeners in registration order.
pub(crate) struct Listeners<D> {
    next: u64,
    entries: Vec<(ListenerId, Listener<D>)>,
}

impl<D> Default for Listeners<D> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }
}

impl<D> Listeners<D> {
    pub(crate) fn add(&mut self, listener: Listener<D>) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn emit(&mut self, event: &LoadingEvent<'_, D>) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}
