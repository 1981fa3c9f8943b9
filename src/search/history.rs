//! Move-ordering statistics.
//!
//! All tables use the same damped update: `entry += bonus − entry·|bonus|/D`
//! with bonuses capped to ±D, so values saturate instead of growing without
//! bound and recent results gradually wash out old ones.

use crate::board::{Color, Move, Piece, Square};

/// Saturation bound for every history table.
pub const HISTORY_MAX: i32 = 16384;

#[inline]
fn apply(entry: &mut i32, bonus: i32) {
    let bonus = bonus.clamp(-HISTORY_MAX, HISTORY_MAX);
    *entry += bonus - *entry * bonus.abs() / HISTORY_MAX;
}

/// Butterfly history: indexed by side to move and the from/to squares of a
/// quiet move.
pub struct ButterflyHistory {
    table: Vec<i32>,
}

impl ButterflyHistory {
    fn new() -> Self {
        ButterflyHistory {
            table: vec![0; 2 * 64 * 64],
        }
    }

    #[inline]
    fn slot(color: Color, mv: Move) -> usize {
        color.index() * 4096 + mv.from().index() * 64 + mv.to().index()
    }

    #[inline]
    #[must_use]
    pub fn score(&self, color: Color, mv: Move) -> i32 {
        self.table[Self::slot(color, mv)]
    }

    pub fn update(&mut self, color: Color, mv: Move, bonus: i32) {
        apply(&mut self.table[Self::slot(color, mv)], bonus);
    }

    pub fn clear(&mut self) {
        self.table.fill(0);
    }
}

/// Capture history: attacker kind, destination square, victim kind.
pub struct CaptureHistory {
    table: Vec<i32>,
}

impl CaptureHistory {
    fn new() -> Self {
        CaptureHistory {
            table: vec![0; 6 * 64 * 6],
        }
    }

    #[inline]
    fn slot(piece: Piece, to: Square, victim: Piece) -> usize {
        (piece.index() * 64 + to.index()) * 6 + victim.index()
    }

    #[inline]
    #[must_use]
    pub fn score(&self, piece: Piece, to: Square, victim: Piece) -> i32 {
        self.table[Self::slot(piece, to, victim)]
    }

    pub fn update(&mut self, piece: Piece, to: Square, victim: Piece, bonus: i32) {
        apply(&mut self.table[Self::slot(piece, to, victim)], bonus);
    }

    pub fn clear(&mut self) {
        self.table.fill(0);
    }
}

/// Continuation history: conditioned on a previous (piece, to) pair, scores
/// the current move's (piece, to). Chained over the last 1, 2 and 4 plies
/// by the search.
pub struct ContinuationHistory {
    table: Vec<i32>,
}

/// Index of a (piece, to) pair into the continuation table.
pub type PieceToKey = usize;

/// Make a continuation key from a moved piece and its destination.
#[inline]
#[must_use]
pub fn piece_to_key(piece: Piece, to: Square) -> PieceToKey {
    piece.index() * 64 + to.index()
}

impl ContinuationHistory {
    fn new() -> Self {
        ContinuationHistory {
            table: vec![0; 384 * 384],
        }
    }

    #[inline]
    #[must_use]
    pub fn score(&self, prev: PieceToKey, piece: Piece, to: Square) -> i32 {
        self.table[prev * 384 + piece_to_key(piece, to)]
    }

    pub fn update(&mut self, prev: PieceToKey, piece: Piece, to: Square, bonus: i32) {
        apply(&mut self.table[prev * 384 + piece_to_key(piece, to)], bonus);
    }

    pub fn clear(&mut self) {
        self.table.fill(0);
    }
}

/// Counter moves: the quiet refutation of a previous (piece, to).
pub struct CounterMoves {
    table: Vec<Move>,
}

impl CounterMoves {
    fn new() -> Self {
        CounterMoves {
            table: vec![Move::null(); 384],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, prev: PieceToKey) -> Move {
        self.table[prev]
    }

    pub fn set(&mut self, prev: PieceToKey, mv: Move) {
        self.table[prev] = mv;
    }

    pub fn clear(&mut self) {
        self.table.fill(Move::null());
    }
}

/// All per-thread ordering tables bundled together, so the move picker can
/// borrow them as one unit.
pub struct Histories {
    pub butterfly: ButterflyHistory,
    pub capture: CaptureHistory,
    pub continuation: ContinuationHistory,
    pub counters: CounterMoves,
}

impl Histories {
    #[must_use]
    pub fn new() -> Self {
        Histories {
            butterfly: ButterflyHistory::new(),
            capture: CaptureHistory::new(),
            continuation: ContinuationHistory::new(),
            counters: CounterMoves::new(),
        }
    }

    /// Reset everything (new game).
    pub fn clear(&mut self) {
        self.butterfly.clear();
        self.capture.clear();
        self.continuation.clear();
        self.counters.clear();
    }
}

impl Default for Histories {
    fn default() -> Self {
        Histories::new()
    }
}

/// Bonus awarded at a beta cutoff of the given depth.
#[inline]
#[must_use]
pub fn stat_bonus(depth: i32) -> i32 {
    (depth * depth + 2 * depth - 2).clamp(0, HISTORY_MAX / 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_saturates() {
        let mut hist = ButterflyHistory::new();
        let mv = Move::quiet(Square::A1, Square::B1);
        for _ in 0..1000 {
            hist.update(Color::White, mv, HISTORY_MAX);
        }
        assert!(hist.score(Color::White, mv) <= HISTORY_MAX);
        for _ in 0..1000 {
            hist.update(Color::White, mv, -HISTORY_MAX);
        }
        assert!(hist.score(Color::White, mv) >= -HISTORY_MAX);
    }

    #[test]
    fn test_sides_are_independent() {
        let mut hist = ButterflyHistory::new();
        let mv = Move::quiet(Square::A1, Square::B1);
        hist.update(Color::White, mv, 100);
        assert_eq!(hist.score(Color::Black, mv), 0);
        assert!(hist.score(Color::White, mv) > 0);
    }

    #[test]
    fn test_continuation_keys() {
        let mut cont = ContinuationHistory::new();
        let prev = piece_to_key(Piece::Knight, Square::from_index(21));
        cont.update(prev, Piece::Bishop, Square::from_index(33), 500);
        assert!(cont.score(prev, Piece::Bishop, Square::from_index(33)) > 0);
        assert_eq!(cont.score(prev, Piece::Bishop, Square::from_index(34)), 0);
    }

    #[test]
    fn test_counter_moves() {
        let mut counters = CounterMoves::new();
        let prev = piece_to_key(Piece::Pawn, Square::from_index(28));
        let reply = Move::quiet(Square::from_index(57), Square::from_index(42));
        counters.set(prev, reply);
        assert_eq!(counters.get(prev), reply);
        counters.clear();
        assert_eq!(counters.get(prev), Move::null());
    }

    #[test]
    fn test_stat_bonus_monotone() {
        assert!(stat_bonus(1) < stat_bonus(5));
        assert!(stat_bonus(5) < stat_bonus(12));
        assert!(stat_bonus(60) <= HISTORY_MAX / 4);
    }
}
