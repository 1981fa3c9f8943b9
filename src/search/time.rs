//! Time management.
//!
//! Converts the clock situation into two budgets: `optimum`, the target
//! spend for this move, and `maximum`, the hard cap. The search checks the
//! optimum between iterations (scaled by best-move stability) and the
//! maximum inside iterations via the shared stop flag. In "nodes as time"
//! mode, searched nodes stand in for milliseconds.

use std::time::Instant;

use crate::board::Color;

use super::SearchLimits;

/// Assumed horizon when the GUI does not send `movestogo`.
const DEFAULT_HORIZON: u64 = 50;

/// Never plan to spend less than this per move.
const MIN_THINK_MS: u64 = 1;

#[derive(Clone, Debug)]
pub struct TimeManager {
    start: Instant,
    optimum_ms: u64,
    maximum_ms: u64,
    /// Nodes per millisecond when "nodes as time" is active (0 = off)
    nodes_time: u64,
    managed: bool,
}

impl Default for TimeManager {
    fn default() -> Self {
        TimeManager {
            start: Instant::now(),
            optimum_ms: u64::MAX,
            maximum_ms: u64::MAX,
            nodes_time: 0,
            managed: false,
        }
    }
}

impl TimeManager {
    /// Set up the budgets for the move about to be searched. `us` is the
    /// side the engine plays, `ply` the game ply (affects the opening
    /// spend slightly).
    #[must_use]
    pub fn initialize(
        limits: &SearchLimits,
        us: Color,
        ply: u32,
        move_overhead: u64,
        slow_mover: u64,
        nodes_time: u64,
    ) -> Self {
        let start = Instant::now();

        if let Some(movetime) = limits.movetime {
            let budget = movetime.saturating_sub(move_overhead).max(MIN_THINK_MS);
            return TimeManager {
                start,
                optimum_ms: budget,
                maximum_ms: budget,
                nodes_time,
                managed: true,
            };
        }

        let Some(remaining) = limits.time[us.index()] else {
            // Depth, nodes or infinite searches never stop on time
            return TimeManager {
                start,
                optimum_ms: u64::MAX,
                maximum_ms: u64::MAX,
                nodes_time,
                managed: false,
            };
        };

        let inc = limits.inc[us.index()];
        let mtg = match limits.movestogo {
            Some(n) => u64::from(n).clamp(1, DEFAULT_HORIZON),
            // Assume the game lasts a while longer, tapering as it goes
            None => (DEFAULT_HORIZON - (ply as u64 / 4).min(30)).max(20),
        };

        // Keep a reserve so increments and overhead never flag us
        let usable = remaining
            .saturating_sub(move_overhead.saturating_mul(2 + mtg))
            .max(MIN_THINK_MS);

        let base = usable / mtg + inc.saturating_mul(3) / 4;
        let optimum = (base * slow_mover / 100).clamp(MIN_THINK_MS, usable);
        let maximum = (optimum.saturating_mul(6))
            .min(usable.saturating_mul(8) / 10)
            .max(optimum);

        TimeManager {
            start,
            optimum_ms: optimum,
            maximum_ms: maximum,
            nodes_time,
            managed: true,
        }
    }

    /// Milliseconds since `initialize` (or searched nodes scaled by the
    /// configured ratio in nodes-as-time mode).
    #[inline]
    #[must_use]
    pub fn elapsed(&self, nodes: u64) -> u64 {
        if self.nodes_time > 0 {
            nodes / self.nodes_time
        } else {
            self.start.elapsed().as_millis() as u64
        }
    }

    /// Target spend for this move.
    #[inline]
    #[must_use]
    pub fn optimum(&self) -> u64 {
        self.optimum_ms
    }

    /// Hard cap for this move.
    #[inline]
    #[must_use]
    pub fn maximum(&self) -> u64 {
        self.maximum_ms
    }

    /// True when the clock (rather than depth/nodes) ends the search.
    #[inline]
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.managed
    }
}
