//! Move execution: do/undo, null moves, legality and check prediction.
//!
//! `do_move` pushes a new `StateInfo` and updates every incremental field
//! (bitboards, mailbox, three Zobrist keys, PSQ score, non-pawn material,
//! check info). `undo_move` reverses the piece movement and pops the state,
//! restoring the previous position exactly.

use super::attacks;
use super::pst;
use super::types::score::PIECE_VALUE_MG;
use super::types::{Bitboard, Color, Move, Piece, Square};
use super::zobrist::ZOBRIST;
use super::Board;

impl Board {
    /// Apply a legal move. `gives_check` is the caller's prediction from
    /// `gives_check(m)`; passing it avoids recomputing it here.
    pub fn do_move(&mut self, m: Move, gives_check: bool) {
        let us = self.side;
        let them = us.opponent();
        let from = m.from();
        let to = m.to();

        // New state starts as a copy of the current one
        let new_st = self.st().clone();
        self.states.push(new_st);

        let st = self.st_mut();
        st.key ^= ZOBRIST.side;
        st.plies_from_null += 1;
        st.halfmove_clock += 1;
        st.captured = None;
        if let Some(old_ep) = st.ep_square.take() {
            st.key ^= ZOBRIST.en_passant[old_ep.file()];
        }

        let piece = self
            .piece_on(from)
            .expect("do_move: origin square is empty");

        if m.is_castling() {
            self.do_castle(us, m, true);
        } else {
            // Capture, including the en-passant victim one push behind
            if m.is_capture() {
                let cap_sq = if m.is_en_passant() {
                    to.forward(them)
                } else {
                    to
                };
                let captured = self
                    .piece_on(cap_sq)
                    .expect("do_move: capture without victim");
                self.remove_piece(cap_sq, them, captured);

                let count = self.count(them, captured);
                let st = self.st_mut();
                st.key ^= ZOBRIST.piece(them, captured, cap_sq);
                st.material_key ^= ZOBRIST.material_delta(them, captured, count + 1, count);
                st.psq -= pst::psq(them, captured, cap_sq);
                if captured == Piece::Pawn {
                    st.pawn_key ^= ZOBRIST.piece(them, Piece::Pawn, cap_sq);
                } else {
                    st.non_pawn_material[them.index()] -=
                        PIECE_VALUE_MG[captured.index()];
                }
                st.captured = Some(captured);
                st.halfmove_clock = 0;
            }

            self.move_piece(from, to, us, piece);
            let st = self.st_mut();
            st.key ^= ZOBRIST.piece(us, piece, from) ^ ZOBRIST.piece(us, piece, to);
            st.psq += pst::psq(us, piece, to) - pst::psq(us, piece, from);

            if piece == Piece::Pawn {
                let st = self.st_mut();
                st.pawn_key ^=
                    ZOBRIST.piece(us, Piece::Pawn, from) ^ ZOBRIST.piece(us, Piece::Pawn, to);
                st.halfmove_clock = 0;

                if let Some(promo) = m.promotion_piece() {
                    self.remove_piece(to, us, Piece::Pawn);
                    self.put_piece(to, us, promo);

                    let pawn_count = self.count(us, Piece::Pawn);
                    let promo_count = self.count(us, promo);
                    let st = self.st_mut();
                    st.key ^=
                        ZOBRIST.piece(us, Piece::Pawn, to) ^ ZOBRIST.piece(us, promo, to);
                    st.pawn_key ^= ZOBRIST.piece(us, Piece::Pawn, to);
                    st.material_key ^=
                        ZOBRIST.material_delta(us, Piece::Pawn, pawn_count + 1, pawn_count)
                            ^ ZOBRIST.material_delta(us, promo, promo_count - 1, promo_count);
                    st.psq += pst::psq(us, promo, to) - pst::psq(us, Piece::Pawn, to);
                    st.non_pawn_material[us.index()] += PIECE_VALUE_MG[promo.index()];
                } else if m.is_double_pawn_push() {
                    let ep_sq = from.forward(us);
                    if self.ep_capture_possible_for(ep_sq, them) {
                        let st = self.st_mut();
                        st.ep_square = Some(ep_sq);
                        st.key ^= ZOBRIST.en_passant[ep_sq.file()];
                    }
                }
            }
        }

        // Clear castling rights invalidated by touching king or rook squares
        let mask = self.castling_masks[from.index()] | self.castling_masks[to.index()];
        if self.st().castling.as_u8() & mask != 0 {
            let st = self.st_mut();
            let old = st.castling.as_u8();
            st.castling.clear_mask(mask);
            st.key ^= ZOBRIST.castling[old as usize]
                ^ ZOBRIST.castling[st.castling.as_u8() as usize];
        }

        self.side = them;
        self.game_ply += 1;

        self.update_check_info();
        debug_assert_eq!(self.in_check(), gives_check, "gives_check mispredicted");
        let _ = gives_check;

        self.update_repetition();

        #[cfg(debug_assertions)]
        self.assert_consistent();
    }

    /// Take back a move made by `do_move`. The position is restored
    /// byte-identically and the state record popped.
    pub fn undo_move(&mut self, m: Move) {
        let them = self.side;
        let us = them.opponent();
        let from = m.from();
        let to = m.to();

        if m.is_castling() {
            self.do_castle(us, m, false);
        } else {
            let piece = self
                .piece_on(to)
                .expect("undo_move: destination square is empty");

            if m.is_promotion() {
                self.remove_piece(to, us, piece);
                self.put_piece(from, us, Piece::Pawn);
            } else {
                self.move_piece(to, from, us, piece);
            }

            if let Some(captured) = self.st().captured {
                let cap_sq = if m.is_en_passant() {
                    to.forward(them)
                } else {
                    to
                };
                self.put_piece(cap_sq, them, captured);
            }
        }

        self.side = us;
        self.game_ply -= 1;
        self.states.pop();
    }

    /// Move king and rook for castling (`apply` = true) or move them back.
    /// Both pieces are removed before either is placed, so Chess960
    /// source/destination overlaps are handled naturally.
    fn do_castle(&mut self, us: Color, m: Move, apply: bool) {
        let king_from = m.from();
        let rook_from = m.to();
        let king_to = m.castle_king_to();
        let rook_to = m.castle_rook_to();

        if apply {
            self.remove_piece(king_from, us, Piece::King);
            self.remove_piece(rook_from, us, Piece::Rook);
            self.put_piece(king_to, us, Piece::King);
            self.put_piece(rook_to, us, Piece::Rook);

            let st = self.st_mut();
            st.key ^= ZOBRIST.piece(us, Piece::King, king_from)
                ^ ZOBRIST.piece(us, Piece::King, king_to)
                ^ ZOBRIST.piece(us, Piece::Rook, rook_from)
                ^ ZOBRIST.piece(us, Piece::Rook, rook_to);
            st.psq += pst::psq(us, Piece::King, king_to) - pst::psq(us, Piece::King, king_from)
                + pst::psq(us, Piece::Rook, rook_to)
                - pst::psq(us, Piece::Rook, rook_from);
        } else {
            self.remove_piece(king_to, us, Piece::King);
            self.remove_piece(rook_to, us, Piece::Rook);
            self.put_piece(king_from, us, Piece::King);
            self.put_piece(rook_from, us, Piece::Rook);
        }
    }

    /// Flip the side to move without moving a piece (null-move search).
    pub fn do_null_move(&mut self) {
        debug_assert!(!self.in_check(), "null move while in check");

        let new_st = self.st().clone();
        self.states.push(new_st);

        let st = self.st_mut();
        st.key ^= ZOBRIST.side;
        if let Some(old_ep) = st.ep_square.take() {
            st.key ^= ZOBRIST.en_passant[old_ep.file()];
        }
        st.halfmove_clock += 1;
        st.plies_from_null = 0;
        st.captured = None;
        st.repetition = 0;

        self.side = self.side.opponent();
        self.update_check_info();
    }

    /// Take back a null move.
    pub fn undo_null_move(&mut self) {
        self.side = self.side.opponent();
        self.states.pop();
    }

    // =========================================================================
    // Move validation
    // =========================================================================

    /// Cheap structural validation of a move that may come from the
    /// transposition table or killer slots and be stale for this position.
    #[must_use]
    pub fn pseudo_legal(&self, m: Move) -> bool {
        let us = self.side;
        let them = us.opponent();
        let from = m.from();
        let to = m.to();

        let Some((color, piece)) = self.piece_at(from) else {
            return false;
        };
        if color != us {
            return false;
        }

        if m.is_castling() {
            return piece == Piece::King && self.castling_path_clear(m) && !self.in_check();
        }

        // Destination may not hold our own piece
        if let Some((to_color, _)) = self.piece_at(to) {
            if to_color == us || m.is_en_passant() || !m.is_capture() {
                return false;
            }
        } else if m.is_capture() && !m.is_en_passant() {
            return false;
        }

        if piece == Piece::Pawn {
            if !self.pawn_move_shape_ok(us, them, m) {
                return false;
            }
        } else {
            if m.is_promotion() || m.is_en_passant() || m.is_double_pawn_push() {
                return false;
            }
            if !attacks::piece_attacks(piece, from, self.occupied()).contains(to) {
                return false;
            }
        }

        // While in check only evasions are acceptable; membership in the
        // generated evasion set is the simplest complete test
        if self.in_check() {
            let mut evasions = super::types::MoveList::new();
            self.generate(super::movegen::GenType::Evasions, &mut evasions);
            return evasions.contains(m);
        }

        true
    }

    fn pawn_move_shape_ok(&self, us: Color, them: Color, m: Move) -> bool {
        let from = m.from();
        let to = m.to();

        // Promotions must be flagged, and only on the last rank
        if (to.relative_rank(us) == 7) != m.is_promotion() {
            return false;
        }

        if m.is_en_passant() {
            return self.ep_square() == Some(to)
                && attacks::pawn_attacks(us, from).contains(to)
                && self.piece_at(to.forward(them)) == Some((them, Piece::Pawn));
        }

        if m.is_capture() {
            return attacks::pawn_attacks(us, from).contains(to)
                && self.piece_at(to).map(|(c, _)| c) == Some(them);
        }

        if m.is_double_pawn_push() {
            return from.relative_rank(us) == 1
                && to == from.forward(us).forward(us)
                && self.is_empty_square(from.forward(us))
                && self.is_empty_square(to);
        }

        to == from.forward(us) && self.is_empty_square(to)
    }

    /// Rights exist, the named rook is in place, and the squares the king
    /// and rook cross are empty (not counting each other).
    pub(crate) fn castling_path_clear(&self, m: Move) -> bool {
        let us = self.side;
        let kingside = m.is_castle_kingside();
        if !self.castling_rights().has(us, kingside) {
            return false;
        }
        let Some(rook_from) = self.castling_rook_square(us, kingside) else {
            return false;
        };
        let king_from = m.from();
        if rook_from != m.to()
            || self.king_square(us) != king_from
            || self.piece_at(rook_from) != Some((us, Piece::Rook))
        {
            return false;
        }

        let king_to = m.castle_king_to();
        let rook_to = m.castle_rook_to();
        let crossing = (attacks::between(king_from, king_to)
            | attacks::between(rook_from, rook_to)
            | Bitboard::from_square(king_to)
            | Bitboard::from_square(rook_to))
            & !(Bitboard::from_square(king_from) | Bitboard::from_square(rook_from));

        (crossing & self.occupied()).is_empty()
    }

    /// Full legality for a pseudo-legal move: the own king may not be left
    /// (or moved) into attack, pins are respected and en passant is checked
    /// for the double-exposure case.
    #[must_use]
    pub fn legal(&self, m: Move) -> bool {
        let us = self.side;
        let them = us.opponent();
        let from = m.from();
        let to = m.to();
        let king_sq = self.king_square(us);

        if m.is_en_passant() {
            return self.ep_capture_is_legal_for(from, to, us);
        }

        if m.is_castling() {
            // The king's path (including the destination) may not be
            // attacked. The rook is lifted off the board first so it cannot
            // shield an attack along the rank.
            let king_to = m.castle_king_to();
            let occupied = self.occupied() ^ Bitboard::from_square(to);
            let path = attacks::between(from, king_to) | Bitboard::from_square(king_to);
            for sq in path {
                if (self.attackers_to(sq, occupied) & self.color(them)).any() {
                    return false;
                }
            }
            // Chess960: the castling rook itself may be pinned to the king
            return !self.chess960 || !self.blockers_for_king(us).contains(to);
        }

        if self.piece_on(from) == Some(Piece::King) {
            // Step off the ray of a checking slider as well
            let occupied = self.occupied() ^ Bitboard::from_square(from);
            return (self.attackers_to(to, occupied) & self.color(them)).is_empty();
        }

        // A non-king move is legal iff the piece is not pinned or stays on
        // the pin ray
        !self.blockers_for_king(us).contains(from) || attacks::aligned(from, to, king_sq)
    }

    /// Predict whether a move delivers check, without making it.
    #[must_use]
    pub fn gives_check(&self, m: Move) -> bool {
        let us = self.side;
        let them = us.opponent();
        let from = m.from();
        let to = m.to();
        let their_king = self.king_square(them);
        let piece = self.piece_on(from).expect("gives_check: empty origin");

        // Direct check from the destination square
        if piece != Piece::King && self.st().check_squares[piece.index()].contains(to) {
            return true;
        }

        // Discovered check: the mover was shielding their king and leaves
        // the shared ray
        if self.blockers_for_king(them).contains(from)
            && !attacks::aligned(from, to, their_king)
        {
            return true;
        }

        if m.is_promotion() {
            let promo = m.promotion_piece().expect("flagged promotion");
            let occupied = self.occupied() ^ Bitboard::from_square(from);
            return attacks::piece_attacks(promo, to, occupied).contains(their_king);
        }

        if m.is_en_passant() {
            // Removing both pawns can uncover a slider on the rank or
            // diagonal
            let cap_sq = to.forward(them);
            let occupied = (self.occupied()
                ^ Bitboard::from_square(from)
                ^ Bitboard::from_square(cap_sq))
                | Bitboard::from_square(to);
            return (attacks::rook_attacks(their_king, occupied)
                & self.straight_sliders(us))
                .any()
                || (attacks::bishop_attacks(their_king, occupied)
                    & self.diagonal_sliders(us))
                    .any();
        }

        if m.is_castling() {
            let king_to = m.castle_king_to();
            let rook_to = m.castle_rook_to();
            let occupied = (self.occupied()
                ^ Bitboard::from_square(from)
                ^ Bitboard::from_square(to))
                | Bitboard::from_square(king_to)
                | Bitboard::from_square(rook_to);
            return attacks::rook_attacks(rook_to, occupied).contains(their_king);
        }

        false
    }

    fn ep_capture_possible_for(&self, ep_sq: Square, capturer: Color) -> bool {
        let victim = capturer.opponent();
        let capturers = attacks::pawn_attacks(victim, ep_sq) & self.pieces(capturer, Piece::Pawn);
        capturers
            .iter()
            .any(|from| self.ep_capture_is_legal_for(from, ep_sq, capturer))
    }

    fn ep_capture_is_legal_for(&self, from: Square, ep_sq: Square, capturer: Color) -> bool {
        let victim_color = capturer.opponent();
        let king_sq = self.king_square(capturer);
        let victim_sq = ep_sq.forward(victim_color);

        let occupied = (self.occupied()
            ^ Bitboard::from_square(from)
            ^ Bitboard::from_square(victim_sq))
            | Bitboard::from_square(ep_sq);

        (attacks::rook_attacks(king_sq, occupied) & self.straight_sliders(victim_color))
            .is_empty()
            && (attacks::bishop_attacks(king_sq, occupied)
                & self.diagonal_sliders(victim_color))
                .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::MoveList;

    fn roundtrip(fen: &str, mv: Move) {
        let mut board = Board::from_fen(fen);
        let key = board.key();
        let pawn_key = board.pawn_key();
        let material_key = board.material_key();
        let fen_before = board.to_fen();

        let check = board.gives_check(mv);
        board.do_move(mv, check);
        board.undo_move(mv);

        assert_eq!(board.key(), key, "position key after undo ({fen})");
        assert_eq!(board.pawn_key(), pawn_key, "pawn key after undo");
        assert_eq!(board.material_key(), material_key, "material key after undo");
        assert_eq!(board.to_fen(), fen_before, "FEN after undo");
    }

    #[test]
    fn test_do_undo_quiet_and_capture() {
        roundtrip(
            Board::startpos_fen(),
            Move::double_pawn_push(Square::new(1, 4), Square::new(3, 4)),
        );
        roundtrip(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
            Move::capture(Square::new(3, 4), Square::new(4, 3)),
        );
    }

    #[test]
    fn test_do_undo_castle() {
        roundtrip(
            "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
            Move::castle(Square::E1, Square::H1, true),
        );
        roundtrip(
            "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
            Move::castle(Square::E1, Square::A1, false),
        );
    }

    #[test]
    fn test_do_undo_promotion() {
        roundtrip(
            "8/4P1k1/8/8/8/8/8/4K3 w - - 0 1",
            Move::promotion(Square::new(6, 4), Square::new(7, 4), Piece::Queen),
        );
    }

    #[test]
    fn test_do_undo_en_passant() {
        roundtrip(
            "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2",
            Move::en_passant(Square::new(3, 3), Square::new(2, 4)),
        );
    }

    #[test]
    fn test_castle_updates_rights() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        board.do_move(Move::castle(Square::E1, Square::H1, true), false);
        assert!(!board.castling_rights().has(Color::White, true));
        assert!(!board.castling_rights().has(Color::White, false));
        assert!(board.castling_rights().has(Color::Black, true));
        assert_eq!(board.piece_at(Square::G1), Some((Color::White, Piece::King)));
        assert_eq!(board.piece_at(Square::F1), Some((Color::White, Piece::Rook)));
    }

    #[test]
    fn test_rook_capture_clears_rights() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/6p1/R3K2R b KQkq - 0 1");
        board.do_move(
            Move::promotion_capture(Square::new(1, 6), Square::new(0, 7), Piece::Queen),
            false,
        );
        assert!(!board.castling_rights().has(Color::White, true));
        assert!(board.castling_rights().has(Color::White, false));
    }

    #[test]
    fn test_null_move_roundtrip() {
        let mut board = Board::from_fen("4k3/8/8/3p4/8/8/4P3/4K3 w - - 4 10");
        let key = board.key();
        board.do_null_move();
        assert_ne!(board.key(), key);
        assert_eq!(board.side_to_move(), Color::Black);
        board.undo_null_move();
        assert_eq!(board.key(), key);
        assert_eq!(board.side_to_move(), Color::White);
    }

    #[test]
    fn test_gives_check_direct_and_discovered() {
        // Rook lift gives direct check
        let board = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        let mv = Move::quiet(Square::A1, Square::A8);
        assert!(board.gives_check(mv));

        // Bishop retreat discovers the rook behind it
        let board = Board::from_fen("4k3/8/8/8/8/4B3/8/4RK2 w - - 0 1");
        let mv = Move::quiet(Square::new(2, 4), Square::new(3, 5));
        assert!(board.gives_check(mv));
        // Moving along the ray is not a discovered check
        let mv = Move::quiet(Square::new(2, 4), Square::new(4, 4));
        assert!(!board.gives_check(mv));
    }

    #[test]
    fn test_gives_check_matches_do_move() {
        let mut board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let mut moves = MoveList::new();
        board.generate(crate::board::movegen::GenType::Legal, &mut moves);
        for &m in moves.iter() {
            let predicted = board.gives_check(m);
            board.do_move(m, predicted);
            assert_eq!(board.in_check(), predicted, "prediction for {m}");
            board.undo_move(m);
        }
    }

    #[test]
    fn test_pseudo_legal_rejects_stale_moves() {
        let board = Board::new();
        // Moving from an empty square
        assert!(!board.pseudo_legal(Move::quiet(Square::new(3, 3), Square::new(4, 3))));
        // Moving an enemy piece
        assert!(!board.pseudo_legal(Move::quiet(Square::new(6, 0), Square::new(5, 0))));
        // Knight move to an unreachable square
        assert!(!board.pseudo_legal(Move::quiet(Square::B1, Square::new(3, 1))));
        // A real opening move passes
        assert!(board.pseudo_legal(Move::quiet(Square::B1, Square::new(2, 2))));
    }

    #[test]
    fn test_pinned_piece_is_illegal_to_move_away() {
        // Knight on e2 is pinned by the rook on e8
        let board = Board::from_fen("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1");
        let pinned = Move::quiet(Square::new(1, 4), Square::new(3, 5));
        assert!(board.pseudo_legal(pinned));
        assert!(!board.legal(pinned));
    }
}
