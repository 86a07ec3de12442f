use std::time::Duration;

use tokio::time::Instant;

/// Caller-supplied bound on how long a registry operation may wait.
///
/// Lock acquisition waits until the deadline at most; each persistence round
/// trip is additionally bounded by the registry's configured timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    no_wait: bool,
}

impl Deadline {
    /// No caller bound. Persistence calls are still capped by the registry timeout.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn after(duration: Duration) -> Self {
        Self::at(Instant::now() + duration)
    }

    pub fn at(instant: Instant) -> Self {
        Self {
            at: Some(instant),
            no_wait: false,
        }
    }

    /// Do not wait for the registry lock at all. Persistence calls are capped
    /// by the registry timeout only.
    pub fn immediate() -> Self {
        Self {
            at: None,
            no_wait: true,
        }
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// True when the lock must be taken without waiting.
    pub fn is_expired(&self) -> bool {
        self.no_wait || self.at.is_some_and(|at| at <= Instant::now())
    }

    /// The earlier of this deadline and `now + timeout`.
    pub fn bound(&self, timeout: Duration) -> Instant {
        let capped = Instant::now() + timeout;
        match self.at {
            Some(at) => at.min(capped),
            None => capped,
        }
    }
}
