//! Staged move picker.
//!
//! A pull-driven state machine that yields moves in an order chosen to
//! maximize beta cutoffs: transposition move, winning captures, killer and
//! counter moves, history-ordered quiets, then losing captures. In check
//! the sequence collapses to TT move plus scored evasions; quiescence and
//! ProbCut have their own reduced sequences.
//!
//! The picker never yields the same move twice and never yields a move
//! that fails `pseudo_legal`; full legality stays with the caller.

use crate::board::{see_value, Board, GenType, Move, MoveList, Piece, ScoredMoveList, Value};

use super::history::{Histories, PieceToKey};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    TtMove,
    CaptureInit,
    GoodCapture,
    Refutation,
    QuietInit,
    Quiet,
    BadCapture,
    EvasionTt,
    EvasionInit,
    Evasion,
    ProbcutTt,
    ProbcutInit,
    Probcut,
    QsearchTt,
    QsCaptureInit,
    QsCapture,
    QsCheckInit,
    QsCheck,
    Done,
}

/// Continuation-history keys for the last 1, 2 and 4 plies.
pub type ContKeys = [Option<PieceToKey>; 3];

pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    moves: ScoredMoveList,
    bad_captures: ScoredMoveList,
    idx: usize,
    bad_idx: usize,
    refutation_idx: usize,
    qs_depth: i32,
    probcut_threshold: Value,
    skip_quiets: bool,
}

impl MovePicker {
    /// Picker for main-search nodes. Collapses to the evasion sequence if
    /// the side to move is in check.
    #[must_use]
    pub fn new(board: &Board, tt_move: Move, killers: [Move; 2], counter: Move) -> Self {
        let stage = if board.in_check() {
            Stage::EvasionTt
        } else {
            Stage::TtMove
        };
        MovePicker {
            stage,
            tt_move,
            killers,
            counter,
            moves: ScoredMoveList::new(),
            bad_captures: ScoredMoveList::new(),
            idx: 0,
            bad_idx: 0,
            refutation_idx: 0,
            qs_depth: 0,
            probcut_threshold: 0,
            skip_quiets: false,
        }
    }

    /// Picker for quiescence nodes. At `qs_depth == 0` quiet checks are
    /// appended after the captures.
    #[must_use]
    pub fn new_qsearch(board: &Board, tt_move: Move, qs_depth: i32) -> Self {
        let stage = if board.in_check() {
            Stage::EvasionTt
        } else {
            Stage::QsearchTt
        };
        MovePicker {
            stage,
            tt_move,
            killers: [Move::null(); 2],
            counter: Move::null(),
            moves: ScoredMoveList::new(),
            bad_captures: ScoredMoveList::new(),
            idx: 0,
            bad_idx: 0,
            refutation_idx: 0,
            qs_depth,
            probcut_threshold: 0,
            skip_quiets: false,
        }
    }

    /// Picker for ProbCut: only captures whose static exchange clears the
    /// threshold are yielded.
    #[must_use]
    pub fn new_probcut(tt_move: Move, threshold: Value) -> Self {
        MovePicker {
            stage: Stage::ProbcutTt,
            tt_move,
            killers: [Move::null(); 2],
            counter: Move::null(),
            moves: ScoredMoveList::new(),
            bad_captures: ScoredMoveList::new(),
            idx: 0,
            bad_idx: 0,
            refutation_idx: 0,
            qs_depth: 0,
            probcut_threshold: threshold,
            skip_quiets: false,
        }
    }

    /// Called by the search once quiet moves are futile at this node; the
    /// remaining quiet stages are skipped.
    pub fn skip_quiet_moves(&mut self) {
        self.skip_quiets = true;
    }

    fn score_captures(&mut self, board: &Board, hist: &Histories, list: &MoveList) {
        self.moves.clear();
        for &m in list.iter() {
            let victim = if m.is_en_passant() {
                Piece::Pawn
            } else {
                board.piece_on(m.to()).unwrap_or(Piece::Queen)
            };
            let attacker = board.piece_on(m.from()).expect("generated move");
            let score = 16 * see_value(victim) + hist.capture.score(attacker, m.to(), victim);
            self.moves.push(m, score);
        }
    }

    fn score_quiets(
        &mut self,
        board: &Board,
        hist: &Histories,
        cont: &ContKeys,
        list: &MoveList,
    ) {
        self.moves.clear();
        let us = board.side_to_move();
        for &m in list.iter() {
            let piece = board.piece_on(m.from()).expect("generated move");
            let mut score = hist.butterfly.score(us, m);
            for key in cont.iter().flatten() {
                score += hist.continuation.score(*key, piece, m.to());
            }
            self.moves.push(m, score);
        }
    }

    fn score_evasions(&mut self, board: &Board, hist: &Histories, list: &MoveList) {
        self.moves.clear();
        let us = board.side_to_move();
        for &m in list.iter() {
            let score = if m.is_capture() {
                let victim = if m.is_en_passant() {
                    Piece::Pawn
                } else {
                    board.piece_on(m.to()).unwrap_or(Piece::Queen)
                };
                let attacker = board.piece_on(m.from()).expect("generated move");
                1_000_000 + 16 * see_value(victim) - attacker.index() as i32
            } else {
                hist.butterfly.score(us, m)
            };
            self.moves.push(m, score);
        }
    }

    /// Yield the next move, or `None` when the sequence is exhausted.
    /// Stage transitions are irreversible.
    pub fn next(&mut self, board: &Board, hist: &Histories, cont: &ContKeys) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove | Stage::EvasionTt | Stage::QsearchTt | Stage::ProbcutTt => {
                    self.stage = match self.stage {
                        Stage::TtMove => Stage::CaptureInit,
                        Stage::EvasionTt => Stage::EvasionInit,
                        Stage::QsearchTt => Stage::QsCaptureInit,
                        _ => Stage::ProbcutInit,
                    };
                    if self.tt_move != Move::null() && board.pseudo_legal(self.tt_move) {
                        return Some(self.tt_move);
                    }
                }

                Stage::CaptureInit => {
                    let mut list = MoveList::new();
                    board.generate(GenType::Captures, &mut list);
                    self.score_captures(board, hist, &list);
                    self.idx = 0;
                    self.stage = Stage::GoodCapture;
                }

                Stage::GoodCapture => {
                    while let Some(scored) = self.moves.pick_best(self.idx) {
                        self.idx += 1;
                        let m = scored.mv;
                        if m == self.tt_move {
                            continue;
                        }
                        // Losing captures wait until the quiets ran out
                        if !board.see_ge(m, -scored.score.max(0) / 64) {
                            self.bad_captures.push(m, scored.score);
                            continue;
                        }
                        return Some(m);
                    }
                    self.refutation_idx = 0;
                    self.stage = Stage::Refutation;
                }

                Stage::Refutation => {
                    while self.refutation_idx < 3 {
                        let m = match self.refutation_idx {
                            0 => self.killers[0],
                            1 => self.killers[1],
                            _ => self.counter,
                        };
                        self.refutation_idx += 1;
                        if self.skip_quiets
                            || m == Move::null()
                            || m == self.tt_move
                            || m.is_capture()
                            || (self.refutation_idx == 3
                                && (m == self.killers[0] || m == self.killers[1]))
                            || !board.pseudo_legal(m)
                        {
                            continue;
                        }
                        return Some(m);
                    }
                    self.stage = Stage::QuietInit;
                }

                Stage::QuietInit => {
                    if self.skip_quiets {
                        self.bad_idx = 0;
                        self.stage = Stage::BadCapture;
                        continue;
                    }
                    let mut list = MoveList::new();
                    board.generate(GenType::Quiets, &mut list);
                    self.score_quiets(board, hist, cont, &list);
                    self.idx = 0;
                    self.stage = Stage::Quiet;
                }

                Stage::Quiet => {
                    if !self.skip_quiets {
                        while let Some(scored) = self.moves.pick_best(self.idx) {
                            self.idx += 1;
                            let m = scored.mv;
                            if m == self.tt_move
                                || m == self.killers[0]
                                || m == self.killers[1]
                                || m == self.counter
                            {
                                continue;
                            }
                            return Some(m);
                        }
                    }
                    self.bad_idx = 0;
                    self.stage = Stage::BadCapture;
                }

                Stage::BadCapture => {
                    while let Some(scored) = self.bad_captures.pick_best(self.bad_idx) {
                        self.bad_idx += 1;
                        return Some(scored.mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::EvasionInit => {
                    let mut list = MoveList::new();
                    board.generate(GenType::Evasions, &mut list);
                    self.score_evasions(board, hist, &list);
                    self.idx = 0;
                    self.stage = Stage::Evasion;
                }

                Stage::Evasion => {
                    while let Some(scored) = self.moves.pick_best(self.idx) {
                        self.idx += 1;
                        if scored.mv == self.tt_move {
                            continue;
                        }
                        return Some(scored.mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::ProbcutInit => {
                    let mut list = MoveList::new();
                    board.generate(GenType::Captures, &mut list);
                    self.score_captures(board, hist, &list);
                    self.idx = 0;
                    self.stage = Stage::Probcut;
                }

                Stage::Probcut => {
                    while let Some(scored) = self.moves.pick_best(self.idx) {
                        self.idx += 1;
                        let m = scored.mv;
                        if m == self.tt_move || !board.see_ge(m, self.probcut_threshold) {
                            continue;
                        }
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }

                Stage::QsCaptureInit => {
                    let mut list = MoveList::new();
                    board.generate(GenType::Captures, &mut list);
                    self.score_captures(board, hist, &list);
                    self.idx = 0;
                    self.stage = Stage::QsCapture;
                }

                Stage::QsCapture => {
                    while let Some(scored) = self.moves.pick_best(self.idx) {
                        self.idx += 1;
                        if scored.mv == self.tt_move {
                            continue;
                        }
                        return Some(scored.mv);
                    }
                    if self.qs_depth == 0 {
                        self.stage = Stage::QsCheckInit;
                    } else {
                        self.stage = Stage::Done;
                    }
                }

                Stage::QsCheckInit => {
                    let mut list = MoveList::new();
                    board.generate(GenType::QuietChecks, &mut list);
                    self.moves.clear();
                    for &m in list.iter() {
                        self.moves.push(m, 0);
                    }
                    self.idx = 0;
                    self.stage = Stage::QsCheck;
                }

                Stage::QsCheck => {
                    while let Some(scored) = self.moves.pick_best(self.idx) {
                        self.idx += 1;
                        if scored.mv == self.tt_move {
                            continue;
                        }
                        return Some(scored.mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    fn drain(board: &Board, mut picker: MovePicker) -> Vec<Move> {
        let hist = Histories::new();
        let cont: ContKeys = [None; 3];
        let mut out = Vec::new();
        while let Some(m) = picker.next(board, &hist, &cont) {
            out.push(m);
        }
        out
    }

    #[test]
    fn test_no_duplicates_and_complete() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let picker = MovePicker::new(&board, Move::null(), [Move::null(); 2], Move::null());
        let yielded = drain(&board, picker);

        for (i, a) in yielded.iter().enumerate() {
            for b in yielded.iter().skip(i + 1) {
                assert_ne!(a, b, "duplicate move from picker");
            }
        }

        // Everything pseudo-legal is yielded (captures + quiets)
        let mut all = MoveList::new();
        board.generate(GenType::NonEvasions, &mut all);
        assert_eq!(yielded.len(), all.len());
    }

    #[test]
    fn test_tt_move_first() {
        let board = Board::new();
        let tt_move = board.parse_move("e2e4").unwrap();
        let picker = MovePicker::new(&board, tt_move, [Move::null(); 2], Move::null());
        let yielded = drain(&board, picker);
        assert_eq!(yielded[0], tt_move);
        assert_eq!(yielded.iter().filter(|&&m| m == tt_move).count(), 1);
    }

    #[test]
    fn test_stale_tt_move_skipped() {
        let board = Board::new();
        // A move that is not pseudo-legal here
        let stale = Move::quiet(
            crate::board::Square::from_index(35),
            crate::board::Square::from_index(42),
        );
        let picker = MovePicker::new(&board, stale, [Move::null(); 2], Move::null());
        let yielded = drain(&board, picker);
        assert!(!yielded.contains(&stale));
        assert_eq!(yielded.len(), 20);
    }

    #[test]
    fn test_winning_capture_before_quiets() {
        // White can win a queen with a pawn capture
        let board = Board::from_fen("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1");
        let picker = MovePicker::new(&board, Move::null(), [Move::null(); 2], Move::null());
        let yielded = drain(&board, picker);
        assert!(yielded[0].is_capture(), "first yielded move is the capture");
    }

    #[test]
    fn test_losing_capture_deferred() {
        // Rook can grab a defended pawn (losing) or play quiet moves
        let board = Board::from_fen("4k3/4p3/3p4/8/8/8/3R4/3K4 w - - 0 1");
        let picker = MovePicker::new(&board, Move::null(), [Move::null(); 2], Move::null());
        let yielded = drain(&board, picker);
        let losing = board.parse_move("d2d6").unwrap();
        let pos = yielded.iter().position(|&m| m == losing).unwrap();
        assert_eq!(pos, yielded.len() - 1, "losing capture comes last");
    }

    #[test]
    fn test_killer_ordered_before_other_quiets() {
        let board = Board::new();
        let killer = board.parse_move("g1f3").unwrap();
        let picker = MovePicker::new(&board, Move::null(), [killer, Move::null()], Move::null());
        let yielded = drain(&board, picker);
        // No captures exist at startpos, so the killer leads
        assert_eq!(yielded[0], killer);
        assert_eq!(yielded.iter().filter(|&&m| m == killer).count(), 1);
    }

    #[test]
    fn test_evasion_sequence_in_check() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
        assert!(board.in_check());
        let picker = MovePicker::new(&board, Move::null(), [Move::null(); 2], Move::null());
        let yielded = drain(&board, picker);
        let mut evasions = MoveList::new();
        board.generate(GenType::Evasions, &mut evasions);
        assert_eq!(yielded.len(), evasions.len());
        // Capturing the checker is tried first
        assert!(yielded[0].is_capture());
    }

    #[test]
    fn test_probcut_only_strong_captures() {
        let board = Board::from_fen("4k3/8/8/3q4/4P3/8/8/3QK3 w - - 0 1");
        let picker = MovePicker::new_probcut(Move::null(), 400);
        let yielded = drain(&board, picker);
        for m in &yielded {
            assert!(m.is_capture());
            assert!(board.see_ge(*m, 400));
        }
    }

    #[test]
    fn test_skip_quiets() {
        let board = Board::new();
        let mut picker = MovePicker::new(&board, Move::null(), [Move::null(); 2], Move::null());
        picker.skip_quiet_moves();
        let yielded = drain(&board, picker);
        assert!(yielded.is_empty(), "startpos has no captures to yield");
    }
}
