//! Task deadline helpers shared by the executor and oracle transports.

use std::time::{Duration, Instant};

/// Remaining time until `deadline`, or `None` once it has passed.
pub fn remaining_budget(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|remaining| !remaining.is_zero())
}

/// Per-attempt timeout: the configured timeout capped by what is left of the
/// task budget.
pub fn attempt_timeout(request_timeout: Duration, deadline: Instant) -> Option<Duration> {
    remaining_budget(deadline).map(|remaining| remaining.min(request_timeout))
}
