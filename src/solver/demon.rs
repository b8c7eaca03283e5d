//! Demons: the scheduled propagator closures attached to variable events.

use std::rc::Rc;

use crate::error::PropagationResult;
use crate::solver::engine::Solver;
use crate::solver::trail::RevCell;

/// Scheduling priority of a demon. `Normal` demons run first, then `Var`
/// demons, and `Delayed` demons only once everything else is quiescent.
/// Delayed demons suit expensive propagators that benefit from batched
/// domain changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DemonPriority {
    Delayed = 0,
    Var = 1,
    Normal = 2,
}

/// A handle to a demon owned by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DemonId(pub(crate) u32);

pub(crate) type DemonBody = Rc<dyn Fn(&mut Solver) -> PropagationResult>;

pub(crate) struct DemonData {
    pub priority: DemonPriority,
    /// Queue batch stamp; enforces one pending schedule per batch.
    pub stamp: u64,
    /// While set, the dequeue loop silently drops this demon. Reversible.
    pub inhibited: RevCell<bool>,
    pub body: DemonBody,
    pub name: String,
}

impl std::fmt::Debug for DemonData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demon")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

impl Solver {
    /// Creates a demon wrapping `body`, run whenever an event it is
    /// subscribed to fires. The name shows up in propagation profiles.
    pub fn make_demon(
        &mut self,
        priority: DemonPriority,
        name: impl Into<String>,
        body: impl Fn(&mut Solver) -> PropagationResult + 'static,
    ) -> DemonId {
        let inhibited = self.trail.alloc_bool(false);
        let id = DemonId(self.demons.len() as u32);
        self.demons.push(DemonData {
            priority,
            stamp: 0,
            inhibited,
            body: Rc::new(body),
            name: name.into(),
        });
        id
    }

    /// Marks a demon as inhibited: it is dropped from the dequeue loop for
    /// the rest of the current subtree. Undone on backtrack.
    pub fn inhibit(&mut self, demon: DemonId) {
        let cell = self.demons[demon.0 as usize].inhibited;
        self.trail.set_bool(cell, true);
    }

    /// Clears an inhibition before the trail does.
    pub fn desinhibit(&mut self, demon: DemonId) {
        let cell = self.demons[demon.0 as usize].inhibited;
        self.trail.set_bool(cell, false);
    }

    pub fn is_inhibited(&self, demon: DemonId) -> bool {
        self.trail.get_bool(self.demons[demon.0 as usize].inhibited)
    }
}
