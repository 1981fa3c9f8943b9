//! FEN parsing and formatting.
//!
//! Castling availability accepts the standard `KQkq` tokens, `-`, and
//! Shredder/X-FEN file letters (`HAha`) for Chess960 positions.

use std::str::FromStr;

use super::attacks;
use super::error::FenError;
use super::state::STARTPOS_FEN;
use super::types::{file_to_index, rank_to_index, right_index, Bitboard, Color, Move, Piece, Square};
use super::Board;

impl Board {
    /// Parse a board position from FEN notation.
    ///
    /// Returns an error if the FEN string is structurally invalid or
    /// violates basic position invariants (king counts, pawn ranks).
    pub fn try_from_fen(fen: &str) -> Result<Self, FenError> {
        let mut board = Board::empty();
        let parts: Vec<&str> = fen.split_whitespace().collect();

        if parts.len() < 4 {
            return Err(FenError::TooFewParts { found: parts.len() });
        }

        // Piece placement, ranks 8..1
        for (rank_idx, rank_str) in parts[0].split('/').enumerate() {
            if rank_idx >= 8 {
                return Err(FenError::InvalidRank { rank: rank_idx });
            }
            let mut file = 0;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                } else {
                    let color = if c.is_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    let piece = Piece::from_char(c).ok_or(FenError::InvalidPiece { char: c })?;
                    if file >= 8 {
                        return Err(FenError::TooManyFiles {
                            rank: rank_idx,
                            files: file + 1,
                        });
                    }
                    board.put_piece(Square::new(7 - rank_idx, file), color, piece);
                    file += 1;
                }
            }
        }

        for color in [Color::White, Color::Black] {
            let kings = board.count(color, Piece::King);
            if kings != 1 {
                return Err(FenError::BadKingCount {
                    color: if color == Color::White { "White" } else { "Black" },
                    count: kings,
                });
            }
        }
        if (board.kind(Piece::Pawn) & (Bitboard::RANK_1 | Bitboard::RANK_8)).any() {
            return Err(FenError::PawnOnBackRank);
        }

        // Side to move
        match parts[1] {
            "w" => board.side = Color::White,
            "b" => board.side = Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        }

        // Castling availability
        for c in parts[2].chars() {
            if c == '-' {
                continue;
            }
            let color = if c.is_uppercase() {
                Color::White
            } else {
                Color::Black
            };
            let back_rank = if color == Color::White { 0 } else { 7 };
            let king_sq = board.king_square(color);

            let rook_sq = match c.to_ascii_lowercase() {
                // Standard tokens: the outermost rook on the wing
                'k' => board.outermost_rook(color, back_rank, true),
                'q' => board.outermost_rook(color, back_rank, false),
                // Shredder/X-FEN: explicit rook file
                'a'..='h' => {
                    let sq = Square::new(back_rank, file_to_index(c.to_ascii_lowercase()));
                    (board.piece_at(sq) == Some((color, Piece::Rook))).then_some(sq)
                }
                _ => return Err(FenError::InvalidCastling { char: c }),
            };

            let rook_sq = rook_sq.ok_or(FenError::MissingCastlingRook { char: c })?;
            board.set_castling_right(color, king_sq, rook_sq);
        }

        // En passant target (kept only if a capture is actually possible)
        let ep = if parts[3] == "-" {
            None
        } else {
            let chars: Vec<char> = parts[3].chars().collect();
            if chars.len() == 2
                && ('a'..='h').contains(&chars[0])
                && ('1'..='8').contains(&chars[1])
            {
                Some(Square::new(rank_to_index(chars[1]), file_to_index(chars[0])))
            } else {
                return Err(FenError::InvalidEnPassant {
                    found: parts[3].to_string(),
                });
            }
        };

        // Halfmove clock and fullmove number (optional)
        let halfmove = parts.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        let fullmove: u32 = parts.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);
        board.game_ply =
            2 * fullmove.saturating_sub(1) + u32::from(board.side == Color::Black);

        board.st_mut().halfmove_clock = halfmove;
        board.finish_setup(ep);
        Ok(board)
    }

    /// Parse a board position from FEN notation.
    ///
    /// # Panics
    /// Panics if the FEN string is invalid. Use `try_from_fen` for fallible
    /// parsing.
    #[must_use]
    pub fn from_fen(fen: &str) -> Self {
        Self::try_from_fen(fen).expect("invalid FEN string")
    }

    fn outermost_rook(&self, color: Color, back_rank: usize, kingside: bool) -> Option<Square> {
        let rooks = self.pieces(color, Piece::Rook) & Bitboard::rank_mask(back_rank);
        let king_file = self.king_square(color).file();
        let candidates: Vec<Square> = rooks
            .iter()
            .filter(|sq| {
                if kingside {
                    sq.file() > king_file
                } else {
                    sq.file() < king_file
                }
            })
            .collect();
        if kingside {
            candidates.last().copied()
        } else {
            candidates.first().copied()
        }
    }

    /// Register a castling right and rebuild the per-square clearing masks.
    pub(crate) fn set_castling_right(&mut self, color: Color, king_sq: Square, rook_sq: Square) {
        let kingside = rook_sq.file() > king_sq.file();
        let idx = right_index(color, kingside);
        self.castle_rook_square[idx] = Some(rook_sq);
        self.st_mut().castling.set(color, kingside);

        let bit = 1u8 << idx;
        self.castling_masks[rook_sq.index()] |= bit;
        let both = (1u8 << right_index(color, true)) | (1u8 << right_index(color, false));
        self.castling_masks[king_sq.index()] |= both;
    }

    /// Compute all derived state after the placement fields are final.
    pub(crate) fn finish_setup(&mut self, ep: Option<Square>) {
        self.st_mut().ep_square = None;
        self.update_check_info();

        if let Some(ep_sq) = ep {
            if self.ep_capture_possible(ep_sq) {
                self.st_mut().ep_square = Some(ep_sq);
            }
        }

        let key = self.compute_key();
        let pawn_key = self.compute_pawn_key();
        let material_key = self.compute_material_key();
        let psq = self.compute_psq_score();
        let npm_w = self.compute_non_pawn_material(Color::White);
        let npm_b = self.compute_non_pawn_material(Color::Black);

        let st = self.st_mut();
        st.key = key;
        st.pawn_key = pawn_key;
        st.material_key = material_key;
        st.psq = psq;
        st.non_pawn_material = [npm_w, npm_b];
        st.repetition = 0;
        st.plies_from_null = 0;
    }

    /// True if some pawn of the side to move can legally capture en passant
    /// on `ep_sq`. Keeping the square only in that case makes the position
    /// key reflect the actually reachable position.
    pub(crate) fn ep_capture_possible(&self, ep_sq: Square) -> bool {
        let us = self.side;
        let them = us.opponent();
        if ep_sq.relative_rank(us) != 5 {
            return false;
        }
        let victim_sq = ep_sq.forward(them);
        if self.piece_at(victim_sq) != Some((them, Piece::Pawn)) || !self.is_empty_square(ep_sq) {
            return false;
        }

        let capturers = attacks::pawn_attacks(them, ep_sq) & self.pieces(us, Piece::Pawn);
        capturers
            .iter()
            .any(|from| self.ep_capture_is_legal(from, ep_sq))
    }

    /// Slider-exposure test for an en-passant capture: remove both pawns,
    /// place ours on the target, and check the king is not attacked.
    pub(crate) fn ep_capture_is_legal(&self, from: Square, ep_sq: Square) -> bool {
        let us = self.side;
        let them = us.opponent();
        let king_sq = self.king_square(us);
        let victim_sq = ep_sq.forward(them);

        let occupied = (self.occupied()
            ^ Bitboard::from_square(from)
            ^ Bitboard::from_square(victim_sq))
            | Bitboard::from_square(ep_sq);

        (attacks::rook_attacks(king_sq, occupied) & self.straight_sliders(them)).is_empty()
            && (attacks::bishop_attacks(king_sq, occupied) & self.diagonal_sliders(them))
                .is_empty()
    }

    /// Convert the board position to FEN notation.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut rows: Vec<String> = Vec::new();
        for rank in (0..8).rev() {
            let mut row = String::new();
            let mut empty = 0;
            for file in 0..8 {
                if let Some((color, piece)) = self.piece_at(Square::new(rank, file)) {
                    if empty > 0 {
                        row.push_str(&empty.to_string());
                        empty = 0;
                    }
                    row.push(piece.to_fen_char(color));
                } else {
                    empty += 1;
                }
            }
            if empty > 0 {
                row.push_str(&empty.to_string());
            }
            rows.push(row);
        }

        let active = if self.side == Color::White { "w" } else { "b" };

        let mut castling = String::new();
        for color in [Color::White, Color::Black] {
            for kingside in [true, false] {
                if !self.castling_rights().has(color, kingside) {
                    continue;
                }
                let token = if self.chess960 {
                    let rook = self.castling_rook_square(color, kingside);
                    let file = rook.map_or('?', |sq| (sq.file() as u8 + b'a') as char);
                    if color == Color::White {
                        file.to_ascii_uppercase()
                    } else {
                        file
                    }
                } else if kingside {
                    if color == Color::White {
                        'K'
                    } else {
                        'k'
                    }
                } else if color == Color::White {
                    'Q'
                } else {
                    'q'
                };
                castling.push(token);
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let ep = self
            .ep_square()
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {} {} {} {} {}",
            rows.join("/"),
            active,
            castling,
            ep,
            self.halfmove_clock(),
            self.game_ply / 2 + 1
        )
    }

    /// Debug-build consistency check: the incremental keys and scores must
    /// match a from-scratch recomputation.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistent(&self) {
        debug_assert_eq!(self.st().key, self.compute_key());
        debug_assert_eq!(self.st().pawn_key, self.compute_pawn_key());
        debug_assert_eq!(self.st().material_key, self.compute_material_key());
        debug_assert_eq!(self.st().psq, self.compute_psq_score());
        debug_assert_eq!(
            self.occupied(),
            Bitboard(self.by_color[0].0 | self.by_color[1].0)
        );
    }

    /// FEN used by `Board::new`.
    #[must_use]
    pub fn startpos_fen() -> &'static str {
        STARTPOS_FEN
    }

    /// Parse a move in UCI long algebraic notation (e.g. "e2e4", "e7e8q").
    /// Castling accepts both the standard king-destination form ("e1g1")
    /// and the Chess960 king-takes-rook form ("e1h1").
    ///
    /// Returns the matching legal move, or an error describing the failure.
    pub fn parse_move(&self, uci: &str) -> Result<Move, super::error::MoveParseError> {
        use super::error::MoveParseError;

        if uci.len() < 4 || uci.len() > 5 {
            return Err(MoveParseError::InvalidLength { len: uci.len() });
        }

        let from: Square = uci[0..2]
            .parse()
            .map_err(|_| MoveParseError::InvalidSquare {
                notation: uci.to_string(),
            })?;
        let to: Square = uci[2..4]
            .parse()
            .map_err(|_| MoveParseError::InvalidSquare {
                notation: uci.to_string(),
            })?;

        let promotion = if uci.len() == 5 {
            let c = uci.chars().nth(4).expect("length checked");
            let piece = Piece::from_char(c)
                .filter(|p| !matches!(p, Piece::Pawn | Piece::King))
                .ok_or(MoveParseError::InvalidPromotion { char: c })?;
            Some(piece)
        } else {
            None
        };

        for &m in self.legal_moves().iter() {
            let matches = if m.is_castling() {
                m.from() == from && (m.to() == to || m.castle_king_to() == to)
            } else {
                m.from() == from && m.to() == to && m.promotion_piece() == promotion
            };
            if matches {
                return Ok(m);
            }
        }

        Err(MoveParseError::IllegalMove {
            notation: uci.to_string(),
        })
    }
}

impl FromStr for Board {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::try_from_fen(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_roundtrip() {
        let board = Board::new();
        assert_eq!(board.to_fen(), STARTPOS_FEN);
    }

    #[test]
    fn test_fen_roundtrip_misc() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        ];
        for fen in fens {
            let board = Board::from_fen(fen);
            assert_eq!(board.to_fen(), fen, "roundtrip of {fen}");
        }
    }

    #[test]
    fn test_fen_rejects_garbage() {
        assert!(Board::try_from_fen("").is_err());
        assert!(Board::try_from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err()); // no kings
        assert!(Board::try_from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1").is_err());
        assert!(Board::try_from_fen("Pppk4/8/8/8/8/8/8/4K3 w - - 0 1").is_err()); // pawn on rank 8
    }

    #[test]
    fn test_unreachable_ep_square_dropped() {
        // EP square given but no pawn can capture: the key must not
        // include it
        let board = Board::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert_eq!(board.ep_square(), None);

        // With a black pawn on d4 the capture exists and the square stays
        let board = Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2");
        assert_eq!(board.ep_square(), Some(Square::new(2, 4)));
    }

    #[test]
    fn test_castling_rights_parse() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let rights = board.castling_rights();
        assert!(rights.has(Color::White, true));
        assert!(rights.has(Color::Black, false));
        assert_eq!(
            board.castling_rook_square(Color::White, true),
            Some(Square::H1)
        );
        assert_eq!(
            board.castling_rook_square(Color::Black, false),
            Some(Square::A8)
        );
    }

    #[test]
    fn test_shredder_fen_castling() {
        // Chess960-style position with explicit rook files
        let board = Board::from_fen("rk2r3/8/8/8/8/8/8/RK2R3 w EAea - 0 1");
        assert_eq!(
            board.castling_rook_square(Color::White, true),
            Some(Square::E1)
        );
        assert_eq!(
            board.castling_rook_square(Color::White, false),
            Some(Square::A1)
        );
    }

    #[test]
    fn test_halfmove_and_fullmove() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4P3/4K3 b - - 13 40");
        assert_eq!(board.halfmove_clock(), 13);
        assert_eq!(board.game_ply(), 79);
        assert!(board.to_fen().ends_with("13 40"));
    }
}
