//! Step bounds and deadlines honored by long-running loops (`spec.md` §5).
//!
//! The rewriting outer loop, the backtracking homomorphism search, and the
//! core-computation strategies all accept a [`Limits`] and check it between
//! units of work (one rewriting step, one backtracking node, one piece).
//! Grounded on `examples/inputlayer-inputlayer/src/execution/timeout.rs`'s
//! cooperative-cancellation shape, simplified: this core has no async
//! runtime, so cancellation is polled rather than signalled.

use std::time::{Duration, Instant};

/// A caller-supplied bound on the number of steps a loop may take, and/or a
/// wall-clock deadline. Either, both, or neither may be set; `None` means
/// unbounded in that dimension.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    max_steps: Option<u64>,
    deadline: Option<Instant>,
    steps_taken: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_steps: None, deadline: None, steps_taken: 0 }
    }
}

impl Limits {
    pub fn unbounded() -> Self {
        Limits::default()
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Record one unit of work and report whether the caller should stop.
    pub fn tick(&mut self) -> bool {
        self.steps_taken += 1;
        self.exhausted()
    }

    pub fn exhausted(&self) -> bool {
        if let Some(max) = self.max_steps {
            if self.steps_taken >= max {
                return true;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_exhausted() {
        let mut limits = Limits::unbounded();
        for _ in 0..1000 {
            assert!(!limits.tick());
        }
    }

    #[test]
    fn max_steps_exhausts_exactly_at_bound() {
        let mut limits = Limits::unbounded().with_max_steps(3);
        assert!(!limits.tick());
        assert!(!limits.tick());
        assert!(limits.tick());
        assert_eq!(limits.steps_taken(), 3);
    }

    #[test]
    fn elapsed_deadline_is_exhausted() {
        let limits = Limits::unbounded().with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(limits.exhausted());
    }
}
