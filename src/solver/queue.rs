//! The demon queue: priority-ordered event dispatch with freeze/unfreeze
//! batching and once-per-batch scheduling.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::PropagationResult;
use crate::solver::demon::{DemonId, DemonPriority};
use crate::solver::engine::{Solver, VarId};

const LANES: usize = 3;

pub(crate) struct DemonQueue {
    lanes: [VecDeque<DemonId>; LANES],
    freeze_level: u32,
    /// Current batch stamp; a demon is pending iff its stamp equals this.
    stamp: u64,
    in_process: bool,
    /// Variables modified since the last batch cleanup; their old bounds
    /// and hole lists are synchronized when the batch settles.
    pub(crate) touched: Vec<VarId>,
}

impl DemonQueue {
    pub fn new() -> Self {
        Self {
            lanes: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            freeze_level: 0,
            stamp: 1,
            in_process: false,
            touched: Vec::new(),
        }
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_level > 0
    }

    fn pop(&mut self) -> Option<DemonId> {
        // Normal first, then Var; Delayed only when the others are dry.
        for lane in (0..LANES).rev() {
            if let Some(d) = self.lanes[lane].pop_front() {
                return Some(d);
            }
        }
        None
    }

    fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
    }
}

impl Solver {
    /// Suspends queue processing. Freezes nest; demons enqueued while
    /// frozen are buffered until the matching [`unfreeze`](Self::unfreeze).
    pub fn freeze_queue(&mut self) {
        self.queue.freeze_level += 1;
    }

    /// Releases one freeze level; when the last level is released, drains
    /// the buffered demons to fixpoint.
    pub fn unfreeze_queue(&mut self) -> PropagationResult {
        assert!(self.queue.freeze_level > 0, "unbalanced unfreeze");
        self.queue.freeze_level -= 1;
        if self.queue.freeze_level == 0 {
            self.process_queue()?;
        }
        Ok(())
    }

    /// Schedules a demon. Collapses repeated schedules within one batch.
    pub fn enqueue(&mut self, demon: DemonId) {
        let data = &mut self.demons[demon.0 as usize];
        if data.stamp >= self.queue.stamp {
            return; // already pending in this batch
        }
        data.stamp = self.queue.stamp;
        let lane = data.priority as usize;
        self.queue.lanes[lane].push_back(demon);
    }

    /// Schedules a demon on the delayed lane regardless of its priority.
    pub fn enqueue_delayed(&mut self, demon: DemonId) {
        let data = &mut self.demons[demon.0 as usize];
        if data.stamp >= self.queue.stamp {
            return;
        }
        data.stamp = self.queue.stamp;
        self.queue.lanes[DemonPriority::Delayed as usize].push_back(demon);
    }

    pub(crate) fn enqueue_all(&mut self, demons: &[DemonId]) {
        for &d in demons {
            self.enqueue(d);
        }
    }

    /// Runs every demon in the list immediately, bypassing the queue.
    pub fn execute_all(&mut self, demons: &[DemonId]) -> PropagationResult {
        for &d in demons {
            if self.is_inhibited(d) {
                continue;
            }
            let body = self.demons[d.0 as usize].body.clone();
            self.run_demon_body(d, body)?;
        }
        Ok(())
    }

    /// Drains the queue to fixpoint unless it is frozen or already
    /// draining. Mutators call this after emitting their events.
    pub(crate) fn process_queue(&mut self) -> PropagationResult {
        if self.queue.is_frozen() || self.queue.in_process {
            return Ok(());
        }
        self.queue.in_process = true;
        let outcome = self.drain_queue();
        self.queue.in_process = false;
        match outcome {
            Ok(()) => {
                self.queue.stamp += 1;
                self.sync_touched_vars();
                Ok(())
            }
            Err(failure) => {
                self.queue.clear();
                self.queue.stamp += 1;
                Err(failure)
            }
        }
    }

    fn drain_queue(&mut self) -> PropagationResult {
        while let Some(d) = self.queue.pop() {
            if self.is_inhibited(d) {
                continue;
            }
            // Retreat the stamp so events raised by this very run can
            // reschedule the demon within the same batch.
            let data = &mut self.demons[d.0 as usize];
            data.stamp = self.queue.stamp - 1;
            let body = data.body.clone();
            self.run_demon_body(d, body)?;
        }
        Ok(())
    }

    fn run_demon_body(
        &mut self,
        demon: DemonId,
        body: crate::solver::demon::DemonBody,
    ) -> PropagationResult {
        if self.parameters.profile {
            let started = std::time::Instant::now();
            let result = body(self);
            self.record_demon_run(demon, started.elapsed(), result.is_err());
            result
        } else {
            trace!(demon = %self.demons[demon.0 as usize].name, "running demon");
            body(self)
        }
    }

    /// Runs `f` with the queue frozen and drains on success. On failure the
    /// buffered demons are discarded; the trail, not the queue, is
    /// responsible for restoring state.
    pub(crate) fn with_frozen_queue<F>(&mut self, f: F) -> PropagationResult
    where
        F: FnOnce(&mut Solver) -> PropagationResult,
    {
        self.freeze_queue();
        let result = f(self);
        match result {
            Ok(()) => self.unfreeze_queue(),
            Err(failure) => {
                self.queue.freeze_level -= 1;
                if self.queue.freeze_level == 0 {
                    self.queue.clear();
                    self.queue.stamp += 1;
                }
                Err(failure)
            }
        }
    }

    pub(crate) fn sync_touched_vars(&mut self) {
        let touched = std::mem::take(&mut self.queue.touched);
        for v in touched {
            self.settle_var_events(v);
        }
    }
}
