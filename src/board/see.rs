//! Static Exchange Evaluation.
//!
//! Answers "does this capture win at least `threshold` material after both
//! sides recapture with their least valuable attacker each time?" without
//! making any move. X-rays through the capture square are uncovered as
//! pieces are removed from the working occupancy.

use super::attacks;
use super::types::score::Value;
use super::types::{Bitboard, Move, Piece};
use super::Board;

/// Material values for exchange evaluation. Deliberately simpler than the
/// tapered evaluation values.
pub(crate) const SEE_VALUES: [Value; 6] = [100, 320, 330, 500, 900, 0];

/// SEE value of a piece kind.
#[inline]
pub(crate) fn see_value(piece: Piece) -> Value {
    SEE_VALUES[piece.index()]
}

impl Board {
    /// Returns true if the static exchange on `m`'s destination square wins
    /// at least `threshold` (in SEE values).
    ///
    /// Castling, en passant and promotions are approximated as an even
    /// exchange; callers only depend on the common case.
    #[must_use]
    pub fn see_ge(&self, m: Move, threshold: Value) -> bool {
        if m.is_castling() || m.is_en_passant() || m.is_promotion() {
            return 0 >= threshold;
        }

        let from = m.from();
        let to = m.to();

        let mut swap = self.piece_on(to).map_or(0, see_value) - threshold;
        if swap < 0 {
            return false;
        }

        let attacker = self.piece_on(from).expect("see_ge: empty origin");
        swap = see_value(attacker) - swap;
        if swap <= 0 {
            return true;
        }

        let mut occupied =
            self.occupied() ^ Bitboard::from_square(from) ^ Bitboard::from_square(to);
        let mut stm = self.side;
        let mut attackers = self.attackers_to(to, occupied);
        let mut res = true;

        loop {
            stm = stm.opponent();
            attackers &= occupied;

            let mut stm_attackers = attackers & self.color(stm);
            if stm_attackers.is_empty() {
                break;
            }

            // A pinned piece may not join the exchange while its pinner is
            // still standing
            if (self.pinners(stm) & occupied).any() {
                stm_attackers &= !self.blockers_for_king(stm);
                if stm_attackers.is_empty() {
                    break;
                }
            }

            res = !res;

            // Capture with the least valuable attacker; sliders moving away
            // may uncover x-ray attackers behind them
            let bb = stm_attackers & self.pieces(stm, Piece::Pawn);
            if bb.any() {
                swap = see_value(Piece::Pawn) - swap;
                if swap < Value::from(res) {
                    break;
                }
                occupied ^= Bitboard::from_square(bb.lsb());
                attackers |= attacks::bishop_attacks(to, occupied)
                    & (self.kind(Piece::Bishop) | self.kind(Piece::Queen));
                continue;
            }

            let bb = stm_attackers & self.pieces(stm, Piece::Knight);
            if bb.any() {
                swap = see_value(Piece::Knight) - swap;
                if swap < Value::from(res) {
                    break;
                }
                occupied ^= Bitboard::from_square(bb.lsb());
                continue;
            }

            let bb = stm_attackers & self.pieces(stm, Piece::Bishop);
            if bb.any() {
                swap = see_value(Piece::Bishop) - swap;
                if swap < Value::from(res) {
                    break;
                }
                occupied ^= Bitboard::from_square(bb.lsb());
                attackers |= attacks::bishop_attacks(to, occupied)
                    & (self.kind(Piece::Bishop) | self.kind(Piece::Queen));
                continue;
            }

            let bb = stm_attackers & self.pieces(stm, Piece::Rook);
            if bb.any() {
                swap = see_value(Piece::Rook) - swap;
                if swap < Value::from(res) {
                    break;
                }
                occupied ^= Bitboard::from_square(bb.lsb());
                attackers |= attacks::rook_attacks(to, occupied)
                    & (self.kind(Piece::Rook) | self.kind(Piece::Queen));
                continue;
            }

            let bb = stm_attackers & self.pieces(stm, Piece::Queen);
            if bb.any() {
                swap = see_value(Piece::Queen) - swap;
                if swap < Value::from(res) {
                    break;
                }
                occupied ^= Bitboard::from_square(bb.lsb());
                attackers |= (attacks::bishop_attacks(to, occupied)
                    & (self.kind(Piece::Bishop) | self.kind(Piece::Queen)))
                    | (attacks::rook_attacks(to, occupied)
                        & (self.kind(Piece::Rook) | self.kind(Piece::Queen)));
                continue;
            }

            // King takes: only if the opponent has no defender left
            return if (attackers & !self.color(stm)).any() {
                !res
            } else {
                res
            };
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::Square;

    fn mv(board: &Board, uci: &str) -> Move {
        let from: Square = uci[0..2].parse().unwrap();
        let to: Square = uci[2..4].parse().unwrap();
        let _ = board;
        Move::capture(from, to)
    }

    #[test]
    fn test_winning_capture() {
        // Pawn takes undefended knight
        let board = Board::from_fen("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1");
        let m = mv(&board, "e4d5");
        assert!(board.see_ge(m, 0));
        assert!(board.see_ge(m, see_value(Piece::Knight)));
        assert!(!board.see_ge(m, see_value(Piece::Knight) + 1));
    }

    #[test]
    fn test_losing_capture() {
        // Rook takes defended pawn: loses rook for pawn
        let board = Board::from_fen("4k3/4p3/3p4/8/8/8/3R4/4K3 w - - 0 1");
        let m = mv(&board, "d2d6");
        assert!(!board.see_ge(m, 0));
        assert!(board.see_ge(
            m,
            see_value(Piece::Pawn) - see_value(Piece::Rook)
        ));
    }

    #[test]
    fn test_even_exchange() {
        // Rook takes rook, recaptured by rook: net zero
        let board = Board::from_fen("3rk3/8/8/8/8/8/8/3RK3 w - - 0 1");
        let m = mv(&board, "d1d8");
        assert!(board.see_ge(m, 0));
        assert!(!board.see_ge(m, 1));
    }

    #[test]
    fn test_xray_recapture() {
        // Rook takes pawn; behind the defender a second rook stands on the
        // file: Rxd5 exd5(?) no - defender pawn e6, xray rook d8
        let board = Board::from_fen("3r4/3r4/8/3p4/8/8/3R4/3RK2k w - - 0 1");
        // Rook takes pawn, black recaptures with rook, white with rook,
        // black with the back rook: white loses rook for pawn+rook = even-ish
        let m = mv(&board, "d2d5");
        // gain: pawn(100) - rook(500) + rook(500) - rook(500) + rook(500) = 100
        assert!(board.see_ge(m, 0));
        assert!(board.see_ge(m, 100));
        assert!(!board.see_ge(m, 101));
    }

    #[test]
    fn test_pinned_defender_ignored() {
        // The defending knight is pinned against its king and cannot
        // recapture
        let board = Board::from_fen("4k3/4n3/8/6B1/8/8/8/4RK2 w - - 0 1");
        // Bishop takes the knight; the pawnless recapture by the king would
        // be legal, so use a guarded version: knight defended only by king
        let m = mv(&board, "g5e7");
        // King can recapture, bishop for knight is roughly even in SEE terms
        assert!(board.see_ge(m, see_value(Piece::Knight) - see_value(Piece::Bishop)));
    }

    #[test]
    fn test_special_moves_score_zero() {
        let board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2");
        let ep = Move::en_passant(Square::new(3, 3), Square::new(2, 4));
        assert!(board.see_ge(ep, 0));
        assert!(!board.see_ge(ep, 1));
    }
}
