//! Pseudo-legal move generation in staged categories.
//!
//! Pawn moves are computed by whole-set bitboard shifts and then serialized;
//! the other pieces iterate their bitboards and intersect attack sets with a
//! target mask. Legality filtering is separate (`Board::legal`), so the
//! search can defer it until a move is actually tried.

use super::attacks;
use super::types::{Bitboard, Color, Move, MoveList, Piece, PROMOTION_PIECES};
use super::Board;

/// Generation categories.
///
/// `Captures` includes promotion captures and queen push-promotions;
/// `Quiets` includes the remaining underpromotions and castling.
/// `Evasions` is the only valid category while in check.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenType {
    Captures,
    Quiets,
    QuietChecks,
    Evasions,
    NonEvasions,
    Legal,
}

impl Board {
    /// Generate moves of the requested category into `list`.
    ///
    /// Except for `Legal`, the output is pseudo-legal: pins and exposed
    /// kings are not yet accounted for. No move is ever emitted twice
    /// within one call.
    pub fn generate(&self, gen: GenType, list: &mut MoveList) {
        debug_assert!(
            gen == GenType::Legal || gen == GenType::Evasions || !self.in_check(),
            "in check only evasions can be generated"
        );

        match gen {
            GenType::Legal => {
                if self.in_check() {
                    self.generate(GenType::Evasions, list);
                } else {
                    self.generate(GenType::NonEvasions, list);
                }
                list.retain(|m| self.legal(m));
            }
            GenType::Evasions => self.generate_evasions(list),
            GenType::QuietChecks => self.generate_quiet_checks(list),
            GenType::Captures | GenType::Quiets | GenType::NonEvasions => {
                let us = self.side;
                let them_bb = self.color(us.opponent());
                let empty = !self.occupied();
                let (capture_mask, push_mask) = match gen {
                    GenType::Captures => (them_bb, Bitboard::EMPTY),
                    GenType::Quiets => (Bitboard::EMPTY, empty),
                    _ => (them_bb, empty),
                };

                self.generate_pawn_moves(gen, capture_mask, push_mask, list);
                for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
                    self.generate_piece_moves(piece, capture_mask | push_mask, list);
                }
                self.generate_king_moves(capture_mask | push_mask, list);
                if gen != GenType::Captures {
                    self.generate_castling(list);
                }
            }
        }
    }

    /// All strictly legal moves in the position.
    #[must_use]
    pub fn legal_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        self.generate(GenType::Legal, &mut list);
        list
    }

    /// Cheaper than `legal_moves` when only existence matters.
    #[must_use]
    pub fn has_legal_moves(&self) -> bool {
        let mut list = MoveList::new();
        if self.in_check() {
            self.generate(GenType::Evasions, &mut list);
        } else {
            self.generate(GenType::NonEvasions, &mut list);
        }
        list.iter().any(|&m| self.legal(m))
    }

    // =========================================================================
    // Pawns (whole-set shifts)
    // =========================================================================

    fn generate_pawn_moves(
        &self,
        gen: GenType,
        capture_mask: Bitboard,
        push_mask: Bitboard,
        list: &mut MoveList,
    ) {
        let us = self.side;
        let them = us.opponent();
        let pawns = self.pieces(us, Piece::Pawn);
        let rank7 = pawns & Bitboard::rank_mask(if us == Color::White { 6 } else { 1 });
        let rest = pawns & !rank7;
        let empty = !self.occupied();
        let enemies = self.color(them);

        let up: i8 = if us == Color::White { 8 } else { -8 };
        let up_west: i8 = if us == Color::White { 7 } else { -9 };
        let up_east: i8 = if us == Color::White { 9 } else { -7 };

        // Single and double pushes
        if push_mask.any() {
            let single = rest.shift_forward(us) & empty;
            let third_rank = Bitboard::rank_mask(if us == Color::White { 2 } else { 5 });
            let double = (single & third_rank).shift_forward(us) & empty & push_mask;
            for to in single & push_mask {
                list.push(Move::quiet(to.offset(-up), to));
            }
            for to in double {
                list.push(Move::double_pawn_push(to.offset(-2 * up), to));
            }
        }

        // Captures
        if capture_mask.any() {
            let west = rest.shift_forward(us).shift_west() & enemies & capture_mask;
            let east = rest.shift_forward(us).shift_east() & enemies & capture_mask;
            for to in west {
                list.push(Move::capture(to.offset(-up_west), to));
            }
            for to in east {
                list.push(Move::capture(to.offset(-up_east), to));
            }

            if let Some(ep_sq) = self.ep_square() {
                // During evasions the mask holds the checker: the capture is
                // only useful when the checker is the double-pushed pawn
                let victim_sq = ep_sq.forward(them);
                if capture_mask.contains(victim_sq) {
                    let capturers =
                        attacks::pawn_attacks(them, ep_sq) & rest;
                    for from in capturers {
                        list.push(Move::en_passant(from, ep_sq));
                    }
                }
            }
        }

        // Promotions. The Captures category carries promotion captures and
        // the queen push-promotion; underpromotion pushes ride with the
        // quiets, and the combined categories emit everything.
        if rank7.any() {
            let promo_push = rank7.shift_forward(us) & empty;
            let push_targets = match gen {
                GenType::Captures => promo_push,
                _ => promo_push & push_mask,
            };
            for to in push_targets {
                let from = to.offset(-up);
                match gen {
                    GenType::Captures => {
                        list.push(Move::promotion(from, to, Piece::Queen));
                    }
                    GenType::Quiets => {
                        for &promo in &PROMOTION_PIECES[1..] {
                            list.push(Move::promotion(from, to, promo));
                        }
                    }
                    _ => {
                        for &promo in &PROMOTION_PIECES {
                            list.push(Move::promotion(from, to, promo));
                        }
                    }
                }
            }

            if capture_mask.any() {
                let west = rank7.shift_forward(us).shift_west() & enemies & capture_mask;
                let east = rank7.shift_forward(us).shift_east() & enemies & capture_mask;
                for to in west {
                    for &promo in &PROMOTION_PIECES {
                        list.push(Move::promotion_capture(to.offset(-up_west), to, promo));
                    }
                }
                for to in east {
                    for &promo in &PROMOTION_PIECES {
                        list.push(Move::promotion_capture(to.offset(-up_east), to, promo));
                    }
                }
            }
        }
    }

    // =========================================================================
    // Pieces
    // =========================================================================

    fn generate_piece_moves(&self, piece: Piece, target: Bitboard, list: &mut MoveList) {
        let us = self.side;
        let occupied = self.occupied();
        for from in self.pieces(us, piece) {
            let attacks = attacks::piece_attacks(piece, from, occupied) & target;
            for to in attacks {
                if self.is_empty_square(to) {
                    list.push(Move::quiet(from, to));
                } else {
                    list.push(Move::capture(from, to));
                }
            }
        }
    }

    fn generate_king_moves(&self, target: Bitboard, list: &mut MoveList) {
        let from = self.king_square(self.side);
        for to in attacks::king_attacks(from) & target {
            if self.is_empty_square(to) {
                list.push(Move::quiet(from, to));
            } else {
                list.push(Move::capture(from, to));
            }
        }
    }

    fn generate_castling(&self, list: &mut MoveList) {
        let us = self.side;
        if !self.castling_rights().has_any(us) || self.in_check() {
            return;
        }
        let king_from = self.king_square(us);
        for kingside in [true, false] {
            if let Some(rook_from) = self.castling_rook_square(us, kingside) {
                let m = Move::castle(king_from, rook_from, kingside);
                if self.castling_path_clear(m) {
                    list.push(m);
                }
            }
        }
    }

    // =========================================================================
    // Check evasions
    // =========================================================================

    fn generate_evasions(&self, list: &mut MoveList) {
        let us = self.side;
        let checkers = self.checkers();
        debug_assert!(checkers.any(), "evasions requested while not in check");

        // King steps (legality filter rejects stays on the checker's ray)
        let king_from = self.king_square(us);
        for to in attacks::king_attacks(king_from) & !self.color(us) {
            if self.is_empty_square(to) {
                list.push(Move::quiet(king_from, to));
            } else {
                list.push(Move::capture(king_from, to));
            }
        }

        // Double check: only the king can move
        if checkers.more_than_one() {
            return;
        }

        let checker = checkers.lsb();
        let capture_mask = checkers;
        let push_mask = attacks::between(king_from, checker);

        self.generate_pawn_moves(GenType::Evasions, capture_mask, push_mask, list);
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            self.generate_piece_moves(piece, capture_mask | push_mask, list);
        }
    }

    // =========================================================================
    // Quiet checks
    // =========================================================================

    /// Non-capturing moves that give check, both direct and discovered.
    /// Promotions are left to the `Captures`/`Quiets` categories.
    fn generate_quiet_checks(&self, list: &mut MoveList) {
        let us = self.side;
        let them = us.opponent();
        let their_king = self.king_square(them);
        let empty = !self.occupied();
        let dc_candidates = self.blockers_for_king(them) & self.color(us);

        // Discovered checks: every quiet move of a candidate leaves the ray
        // or keeps a direct check; either way it is worth trying
        for from in dc_candidates {
            let piece = self.piece_on(from).expect("candidate square occupied");
            if piece == Piece::Pawn {
                continue; // handled with the pawn pushes below
            }
            let mut targets = attacks::piece_attacks(piece, from, self.occupied()) & empty;
            if piece == Piece::King {
                // King moves check only by discovery, so it must leave the ray
                targets &= !attacks::line(from, their_king);
            }
            for to in targets {
                list.push(Move::quiet(from, to));
            }
        }

        // Direct checks by the remaining pieces
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            let check_squares = self.st().check_squares[piece.index()] & empty;
            if check_squares.is_empty() {
                continue;
            }
            for from in self.pieces(us, piece) & !dc_candidates {
                let targets =
                    attacks::piece_attacks(piece, from, self.occupied()) & check_squares;
                for to in targets {
                    list.push(Move::quiet(from, to));
                }
            }
        }

        // Pawn pushes: direct checks, plus discovered checks off the ray
        let pawns = self.pieces(us, Piece::Pawn)
            & !Bitboard::rank_mask(if us == Color::White { 6 } else { 1 });
        let up: i8 = if us == Color::White { 8 } else { -8 };
        let single = pawns.shift_forward(us) & empty;
        let third_rank = Bitboard::rank_mask(if us == Color::White { 2 } else { 5 });
        let double = (single & third_rank).shift_forward(us) & empty;

        let pawn_checks = self.st().check_squares[Piece::Pawn.index()];
        for to in single {
            let from = to.offset(-up);
            let discovered = dc_candidates.contains(from)
                && !attacks::aligned(from, to, their_king);
            if pawn_checks.contains(to) || discovered {
                list.push(Move::quiet(from, to));
            }
        }
        for to in double {
            let from = to.offset(-2 * up);
            let discovered = dc_candidates.contains(from)
                && !attacks::aligned(from, to, their_king);
            if pawn_checks.contains(to) || discovered {
                list.push(Move::double_pawn_push(from, to));
            }
        }
    }

    // =========================================================================
    // Perft
    // =========================================================================

    /// Count leaf nodes of the legal move tree to `depth`.
    #[must_use]
    pub fn perft(&mut self, depth: usize) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = self.legal_moves();
        if depth == 1 {
            return moves.len() as u64;
        }

        let mut nodes = 0;
        for &m in moves.iter() {
            let gives_check = self.gives_check(m);
            self.do_move(m, gives_check);
            nodes += self.perft(depth - 1);
            self.undo_move(m);
        }
        nodes
    }

    /// Per-move perft breakdown, handy for debugging against other engines.
    #[must_use]
    pub fn perft_divide(&mut self, depth: usize) -> Vec<(Move, u64)> {
        let moves = self.legal_moves();
        let mut results = Vec::with_capacity(moves.len());
        for &m in moves.iter() {
            let gives_check = self.gives_check(m);
            self.do_move(m, gives_check);
            let nodes = if depth > 1 { self.perft(depth - 1) } else { 1 };
            self.undo_move(m);
            results.push((m, nodes));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_20_moves() {
        let board = Board::new();
        assert_eq!(board.legal_moves().len(), 20);
    }

    #[test]
    fn test_captures_subset_of_nonevasions() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let mut captures = MoveList::new();
        let mut quiets = MoveList::new();
        let mut all = MoveList::new();
        board.generate(GenType::Captures, &mut captures);
        board.generate(GenType::Quiets, &mut quiets);
        board.generate(GenType::NonEvasions, &mut all);

        assert_eq!(captures.len() + quiets.len(), all.len());
        for &m in captures.iter() {
            assert!(all.contains(m));
            assert!(m.is_capture() || m.is_promotion());
        }
        for &m in quiets.iter() {
            assert!(all.contains(m));
            assert!(!m.is_capture());
        }
    }

    #[test]
    fn test_no_duplicate_moves() {
        let fens = [
            crate::board::state::STARTPOS_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let board = Board::from_fen(fen);
            let moves = board.legal_moves();
            for (i, a) in moves.iter().enumerate() {
                for b in moves.iter().skip(i + 1) {
                    assert_ne!(a, b, "duplicate move in {fen}");
                }
            }
        }
    }

    #[test]
    fn test_evasions_resolve_check() {
        let mut board = Board::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
        assert!(board.in_check());
        let moves = board.legal_moves();
        assert!(!moves.is_empty());
        for &m in moves.iter() {
            let gives_check = board.gives_check(m);
            board.do_move(m, gives_check);
            let us = board.side_to_move().opponent();
            let king = board.king_square(us);
            assert!(
                (board.attackers_to(king, board.occupied())
                    & board.color(board.side_to_move()))
                .is_empty(),
                "evasion {m} leaves king attacked"
            );
            board.undo_move(m);
        }
    }

    #[test]
    fn test_double_check_only_king_moves() {
        // Knight on f6 and rook on e1 both give check
        let board = Board::from_fen("4k3/8/5N2/8/8/8/8/4R1K1 b - - 0 1");
        assert_eq!(board.checkers().popcount(), 2);
        let moves = board.legal_moves();
        for &m in moves.iter() {
            assert_eq!(board.piece_on(m.from()), Some(Piece::King));
        }
    }

    #[test]
    fn test_quiet_checks_are_quiet_and_check() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let mut list = MoveList::new();
        board.generate(GenType::QuietChecks, &mut list);
        for &m in list.iter() {
            assert!(!m.is_capture(), "{m} is a capture");
        }
        // Discovered and direct checks must actually check when legal
        let mut board = board;
        for &m in list.iter() {
            if board.legal(m) && !board.blockers_for_king(board.side_to_move().opponent())
                .contains(m.from())
            {
                let pred = board.gives_check(m);
                assert!(pred, "direct quiet check {m} not predicted");
                board.do_move(m, pred);
                assert!(board.in_check());
                board.undo_move(m);
            }
        }
    }

    #[test]
    fn test_castling_generated_only_when_clear() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let moves = board.legal_moves();
        let castles: Vec<&Move> = moves.iter().filter(|m| m.is_castling()).collect();
        assert_eq!(castles.len(), 2);

        // Blocked path: no kingside castle
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3KB1R w KQkq - 0 1");
        let moves = board.legal_moves();
        assert!(!moves.iter().any(|m| m.is_castling() && m.is_castle_kingside()));

        // Attacked crossing square: no kingside castle through f1
        let board = Board::from_fen("r3k2r/8/8/8/8/5q2/8/R3K2R w KQkq - 0 1");
        let moves = board.legal_moves();
        assert!(!moves
            .iter()
            .any(|m| m.is_castling() && m.is_castle_kingside()));
    }

    #[test]
    fn test_pseudo_legal_superset_of_legal() {
        let board =
            Board::from_fen("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8");
        let mut pseudo = MoveList::new();
        board.generate(GenType::NonEvasions, &mut pseudo);
        let legal = board.legal_moves();
        for &m in legal.iter() {
            assert!(pseudo.contains(m));
        }
        // Every pseudo-legal move passes the pseudo_legal() validator
        for &m in pseudo.iter() {
            assert!(board.pseudo_legal(m), "{m:?} rejected by pseudo_legal");
        }
    }
}
