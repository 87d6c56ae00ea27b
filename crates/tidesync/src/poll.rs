/// Live-poll lane state. At most one poll request is ever outstanding;
/// `Halted` is terminal for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Halted,
}

/// Guarded state machine for the live-poll lane: `Idle -> Requesting ->
/// Idle`, with a one-way transition to `Halted` on a server-reported fatal
/// error. Timer-free, so the transitions are testable on their own; the
/// engine drives it from its tick loop.
#[derive(Debug)]
pub struct PollLane {
    state: PollState,
    first_call: bool,
}

/// Outcome of a successful `try_begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTurn {
    /// The first activation participates in the busy contract and tags its
    /// batch as the initial load; every later turn does neither.
    pub first: bool,
}

impl PollLane {
    pub fn new() -> Self {
        Self {
            state: PollState::Idle,
            first_call: true,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == PollState::Halted
    }

    /// Attempt the `Idle -> Requesting` transition. Returns `None` while a
    /// request is outstanding or after the lane has halted, making each
    /// tick a no-op in those states.
    pub fn try_begin(&mut self) -> Option<PollTurn> {
        if self.state != PollState::Idle {
            return None;
        }
        self.state = PollState::Requesting;
        let first = self.first_call;
        self.first_call = false;
        Some(PollTurn { first })
    }

    /// Complete the outstanding request, successfully or not. The next tick
    /// may begin a new one.
    pub fn finish(&mut self) {
        if self.state == PollState::Requesting {
            self.state = PollState::Idle;
        }
    }

    /// Permanently stop the lane. There is no resume path; a fresh engine
    /// is required to poll again.
    pub fn halt(&mut self) {
        self.state = PollState::Halted;
    }
}

impl Default for PollLane {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_turn_is_marked_initial() {
        let mut lane = PollLane::new();
        let turn = lane.try_begin().expect("idle lane begins");
        assert!(turn.first);
        lane.finish();
        let turn = lane.try_begin().expect("idle lane begins again");
        assert!(!turn.first);
    }

    #[test]
    fn outstanding_request_blocks_further_turns() {
        let mut lane = PollLane::new();
        assert!(lane.try_begin().is_some());
        assert_eq!(lane.state(), PollState::Requesting);
        assert!(lane.try_begin().is_none());
        lane.finish();
        assert!(lane.try_begin().is_some());
    }

    #[test]
    fn halt_is_terminal() {
        let mut lane = PollLane::new();
        lane.try_begin();
        lane.halt();
        assert!(lane.is_halted());
        assert!(lane.try_begin().is_none());
        // finish() after halt must not revive the lane.
        lane.finish();
        assert_eq!(lane.state(), PollState::Halted);
    }

    #[test]
    fn failed_first_call_consumes_the_initial_marker() {
        let mut lane = PollLane::new();
        let turn = lane.try_begin().expect("begin");
        assert!(turn.first);
        // The request fails; the lane goes back to idle but the next turn
        // is ordinary steady-state polling.
        lane.finish();
        assert!(!lane.try_begin().expect("begin").first);
    }
}
