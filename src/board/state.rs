//! Board representation and incremental state.
//!
//! `Board` keeps a mailbox square array and per-color/per-kind bitboards,
//! plus a stack of `StateInfo` records, one per ply. The newest record holds
//! the current castling rights, en-passant square, Zobrist keys, check
//! information and incremental evaluation state; undoing a move pops it.

use super::attacks;
use super::pst;
use super::types::score::Value;
use super::types::{right_index, Bitboard, CastlingRights, Color, Piece, Score, Square, ALL_PIECES};
use super::zobrist::ZOBRIST;

/// Per-ply state delta. Pushed by `do_move`, popped by `undo_move`.
#[derive(Clone, Debug, Default)]
pub struct StateInfo {
    pub(crate) castling: CastlingRights,
    pub(crate) ep_square: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) plies_from_null: u32,
    pub(crate) captured: Option<Piece>,
    pub(crate) key: u64,
    pub(crate) pawn_key: u64,
    pub(crate) material_key: u64,
    /// Opponent pieces giving check to the side to move
    pub(crate) checkers: Bitboard,
    /// Per color: pieces whose removal would expose that color's king
    pub(crate) blockers: [Bitboard; 2],
    /// Per color: enemy sliders pinning something against that color's king
    pub(crate) pinners: [Bitboard; 2],
    /// Per piece kind: squares from which it would check the enemy king
    pub(crate) check_squares: [Bitboard; 6],
    /// Incremental material + piece-square score, white's perspective
    pub(crate) psq: Score,
    /// Per color non-pawn material (midgame piece values)
    pub(crate) non_pawn_material: [Value; 2],
    /// Distance to the previous occurrence of this position, negative if
    /// that occurrence was itself a repetition (threefold)
    pub(crate) repetition: i32,
}

/// A chess position with incremental state.
#[derive(Clone, Debug)]
pub struct Board {
    pub(crate) squares: [Option<(Color, Piece)>; 64],
    pub(crate) by_kind: [Bitboard; 6],
    pub(crate) by_color: [Bitboard; 2],
    pub(crate) side: Color,
    pub(crate) game_ply: u32,
    pub(crate) chess960: bool,
    /// Rook origin square per castling right index (Chess960 support)
    pub(crate) castle_rook_square: [Option<Square>; 4],
    /// Rights bits cleared when a move touches this square
    pub(crate) castling_masks: [u8; 64],
    pub(crate) states: Vec<StateInfo>,
}

/// FEN of the standard starting position.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Board {
    /// The standard starting position.
    #[must_use]
    pub fn new() -> Self {
        Board::from_fen(STARTPOS_FEN)
    }

    pub(crate) fn empty() -> Self {
        Board {
            squares: [None; 64],
            by_kind: [Bitboard::EMPTY; 6],
            by_color: [Bitboard::EMPTY; 2],
            side: Color::White,
            game_ply: 0,
            chess960: false,
            castle_rook_square: [None; 4],
            castling_masks: [0; 64],
            states: vec![StateInfo::default()],
        }
    }

    // =========================================================================
    // State access
    // =========================================================================

    #[inline]
    pub(crate) fn st(&self) -> &StateInfo {
        self.states.last().expect("state stack is never empty")
    }

    #[inline]
    pub(crate) fn st_mut(&mut self) -> &mut StateInfo {
        self.states.last_mut().expect("state stack is never empty")
    }

    /// The side to move.
    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side
    }

    /// Position Zobrist key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> u64 {
        self.st().key
    }

    /// Pawn-structure Zobrist key.
    #[inline]
    #[must_use]
    pub fn pawn_key(&self) -> u64 {
        self.st().pawn_key
    }

    /// Material Zobrist key.
    #[inline]
    #[must_use]
    pub fn material_key(&self) -> u64 {
        self.st().material_key
    }

    /// All occupied squares.
    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        Bitboard(self.by_color[0].0 | self.by_color[1].0)
    }

    /// All pieces of one color.
    #[inline]
    #[must_use]
    pub fn color(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    /// All pieces of one kind, both colors.
    #[inline]
    #[must_use]
    pub fn kind(&self, piece: Piece) -> Bitboard {
        self.by_kind[piece.index()]
    }

    /// Pieces of one color and kind.
    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        Bitboard(self.by_color[color.index()].0 & self.by_kind[piece.index()].0)
    }

    /// Bishops and queens of `color`.
    #[inline]
    #[must_use]
    pub fn diagonal_sliders(&self, color: Color) -> Bitboard {
        Bitboard(
            self.by_color[color.index()].0
                & (self.by_kind[Piece::Bishop.index()].0 | self.by_kind[Piece::Queen.index()].0),
        )
    }

    /// Rooks and queens of `color`.
    #[inline]
    #[must_use]
    pub fn straight_sliders(&self, color: Color) -> Bitboard {
        Bitboard(
            self.by_color[color.index()].0
                & (self.by_kind[Piece::Rook.index()].0 | self.by_kind[Piece::Queen.index()].0),
        )
    }

    /// Number of pieces of one color and kind.
    #[inline]
    #[must_use]
    pub fn count(&self, color: Color, piece: Piece) -> u32 {
        self.pieces(color, piece).popcount()
    }

    /// The king square of `color`.
    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(color, Piece::King).lsb()
    }

    /// Piece and color on a square, if any.
    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.squares[sq.index()]
    }

    /// Just the piece kind on a square.
    #[inline]
    #[must_use]
    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()].map(|(_, p)| p)
    }

    #[inline]
    pub(crate) fn is_empty_square(&self, sq: Square) -> bool {
        self.squares[sq.index()].is_none()
    }

    /// Current en-passant target square, if any.
    #[inline]
    #[must_use]
    pub fn ep_square(&self) -> Option<Square> {
        self.st().ep_square
    }

    /// Current castling rights.
    #[inline]
    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.st().castling
    }

    /// Rook origin square for a castling right, if the right exists.
    #[inline]
    #[must_use]
    pub fn castling_rook_square(&self, color: Color, kingside: bool) -> Option<Square> {
        self.castle_rook_square[right_index(color, kingside)]
    }

    /// Halfmoves since the last pawn move or capture.
    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.st().halfmove_clock
    }

    /// Ply count from the start of the game.
    #[inline]
    #[must_use]
    pub fn game_ply(&self) -> u32 {
        self.game_ply
    }

    /// Whether Chess960 castling semantics are active.
    #[inline]
    #[must_use]
    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    /// Enable or disable Chess960 semantics (affects move notation only;
    /// the internal encoding is uniform).
    pub fn set_chess960(&mut self, chess960: bool) {
        self.chess960 = chess960;
    }

    /// Opponent pieces currently giving check.
    #[inline]
    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        self.st().checkers
    }

    /// Returns true if the side to move is in check.
    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.st().checkers.any()
    }

    /// Pieces (of either color) shielding `color`'s king from a slider.
    #[inline]
    #[must_use]
    pub fn blockers_for_king(&self, color: Color) -> Bitboard {
        self.st().blockers[color.index()]
    }

    /// Enemy sliders pinning something against `color`'s king.
    #[inline]
    #[must_use]
    pub fn pinners(&self, color: Color) -> Bitboard {
        self.st().pinners[color.index()]
    }

    /// Incremental material + piece-square score, white's perspective.
    #[inline]
    #[must_use]
    pub fn psq_score(&self) -> Score {
        self.st().psq
    }

    /// Non-pawn material of `color` in midgame piece values.
    #[inline]
    #[must_use]
    pub fn non_pawn_material(&self, color: Color) -> Value {
        self.st().non_pawn_material[color.index()]
    }

    // =========================================================================
    // Piece movement primitives (bitboards + mailbox only; callers keep the
    // Zobrist keys and PSQ score in sync)
    // =========================================================================

    pub(crate) fn put_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bb = Bitboard::from_square(sq);
        self.squares[sq.index()] = Some((color, piece));
        self.by_kind[piece.index()] |= bb;
        self.by_color[color.index()] |= bb;
    }

    pub(crate) fn remove_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bb = Bitboard::from_square(sq);
        self.squares[sq.index()] = None;
        self.by_kind[piece.index()] ^= bb;
        self.by_color[color.index()] ^= bb;
    }

    pub(crate) fn move_piece(&mut self, from: Square, to: Square, color: Color, piece: Piece) {
        let bb = Bitboard::from_square(from) | Bitboard::from_square(to);
        self.by_kind[piece.index()] ^= bb;
        self.by_color[color.index()] ^= bb;
        self.squares[from.index()] = None;
        self.squares[to.index()] = Some((color, piece));
    }

    // =========================================================================
    // Attack queries
    // =========================================================================

    /// All pieces of both colors attacking `sq` under the given occupancy.
    #[must_use]
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        (attacks::pawn_attacks(Color::Black, sq) & self.pieces(Color::White, Piece::Pawn))
            | (attacks::pawn_attacks(Color::White, sq) & self.pieces(Color::Black, Piece::Pawn))
            | (attacks::knight_attacks(sq) & self.kind(Piece::Knight))
            | (attacks::king_attacks(sq) & self.kind(Piece::King))
            | (attacks::bishop_attacks(sq, occupied)
                & (self.kind(Piece::Bishop) | self.kind(Piece::Queen)))
            | (attacks::rook_attacks(sq, occupied)
                & (self.kind(Piece::Rook) | self.kind(Piece::Queen)))
    }

    /// Returns true if any piece of `color` attacks `sq` under `occupied`.
    #[must_use]
    pub fn attacked_by(&self, color: Color, sq: Square, occupied: Bitboard) -> bool {
        (self.attackers_to(sq, occupied) & self.color(color)).any()
    }

    /// Sliders of the enemy of `king_color` that would attack `king_sq` if
    /// exactly one piece between them were removed. Returns (blockers,
    /// pinners): the in-between pieces and the sliders behind them.
    pub(crate) fn slider_blockers(
        &self,
        king_color: Color,
        king_sq: Square,
    ) -> (Bitboard, Bitboard) {
        let them = king_color.opponent();
        let mut blockers = Bitboard::EMPTY;
        let mut pinners = Bitboard::EMPTY;

        let snipers = (attacks::rook_attacks(king_sq, Bitboard::EMPTY)
            & self.straight_sliders(them))
            | (attacks::bishop_attacks(king_sq, Bitboard::EMPTY) & self.diagonal_sliders(them));
        let occupancy = self.occupied() ^ (snipers & self.occupied());

        for sniper in snipers {
            let b = attacks::between(king_sq, sniper) & occupancy;
            if b.any() && !b.more_than_one() {
                blockers |= b;
                if (b & self.color(king_color)).any() {
                    pinners |= Bitboard::from_square(sniper);
                }
            }
        }

        (blockers, pinners)
    }

    /// Recompute checkers, blockers, pinners and check squares for the
    /// current placement. Called at the end of every do/undo.
    pub(crate) fn update_check_info(&mut self) {
        let us = self.side;
        let them = us.opponent();
        let our_king = self.king_square(us);
        let their_king = self.king_square(them);
        let occupied = self.occupied();

        let checkers = self.attackers_to(our_king, occupied) & self.color(them);
        let (our_blockers, their_pinners) = self.slider_blockers(us, our_king);
        let (their_blockers, our_pinners) = self.slider_blockers(them, their_king);

        let st = self.st_mut();
        st.checkers = checkers;
        st.blockers[us.index()] = our_blockers;
        st.blockers[them.index()] = their_blockers;
        st.pinners[us.index()] = their_pinners;
        st.pinners[them.index()] = our_pinners;

        // Squares from which each of our piece kinds would check them
        let pawn = attacks::pawn_attacks(them, their_king);
        let knight = attacks::knight_attacks(their_king);
        let bishop = attacks::bishop_attacks(their_king, occupied);
        let rook = attacks::rook_attacks(their_king, occupied);
        let st = self.st_mut();
        st.check_squares[Piece::Pawn.index()] = pawn;
        st.check_squares[Piece::Knight.index()] = knight;
        st.check_squares[Piece::Bishop.index()] = bishop;
        st.check_squares[Piece::Rook.index()] = rook;
        st.check_squares[Piece::Queen.index()] = bishop | rook;
        st.check_squares[Piece::King.index()] = Bitboard::EMPTY;
    }

    // =========================================================================
    // Key and score recomputation (FEN load, debug validation)
    // =========================================================================

    pub(crate) fn compute_key(&self) -> u64 {
        let mut key = 0u64;
        for sq_idx in 0..64 {
            if let Some((color, piece)) = self.squares[sq_idx] {
                key ^= ZOBRIST.piece(color, piece, Square::from_index(sq_idx));
            }
        }
        if self.side == Color::Black {
            key ^= ZOBRIST.side;
        }
        key ^= ZOBRIST.castling[self.st().castling.as_u8() as usize];
        if let Some(ep) = self.st().ep_square {
            key ^= ZOBRIST.en_passant[ep.file()];
        }
        key
    }

    pub(crate) fn compute_pawn_key(&self) -> u64 {
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            for sq in self.pieces(color, Piece::Pawn) {
                key ^= ZOBRIST.piece(color, Piece::Pawn, sq);
            }
        }
        key
    }

    pub(crate) fn compute_material_key(&self) -> u64 {
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            for piece in ALL_PIECES {
                key ^= ZOBRIST.material_delta(color, piece, 0, self.count(color, piece));
            }
        }
        key
    }

    pub(crate) fn compute_psq_score(&self) -> Score {
        let mut score = Score::ZERO;
        for sq_idx in 0..64 {
            if let Some((color, piece)) = self.squares[sq_idx] {
                score += pst::psq(color, piece, Square::from_index(sq_idx));
            }
        }
        score
    }

    pub(crate) fn compute_non_pawn_material(&self, color: Color) -> Value {
        use super::types::score::PIECE_VALUE_MG;
        let mut total = 0;
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            total += PIECE_VALUE_MG[piece.index()] * self.count(color, piece) as Value;
        }
        total
    }

    // =========================================================================
    // Draw detection
    // =========================================================================

    /// Track whether the position just reached repeats an earlier one.
    /// Called from `do_move` after the new key is final.
    pub(crate) fn update_repetition(&mut self) {
        let len = self.states.len();
        let st = &self.states[len - 1];
        let span = st.halfmove_clock.min(st.plies_from_null) as usize;
        let key = st.key;

        let mut repetition = 0;
        let mut back = 4;
        while back <= span && back < len {
            let prev = &self.states[len - 1 - back];
            if prev.key == key {
                repetition = if prev.repetition != 0 {
                    -(back as i32)
                } else {
                    back as i32
                };
                break;
            }
            back += 2;
        }
        self.states[len - 1].repetition = repetition;
    }

    /// Draw by 50-move rule or repetition. `ply` is the distance from the
    /// search root: a single repetition inside the search path is already
    /// scored as a draw, while older repetitions need a true threefold.
    #[must_use]
    pub fn is_draw(&self, ply: i32) -> bool {
        let st = self.st();
        if st.halfmove_clock >= 100 && (st.checkers.is_empty() || self.has_legal_moves()) {
            return true;
        }
        st.repetition != 0 && st.repetition < ply
    }

    /// Insufficient mating material for both sides (KK, KNK, KBK, and
    /// same-colored-bishops only).
    #[must_use]
    pub fn insufficient_material(&self) -> bool {
        if (self.kind(Piece::Pawn) | self.kind(Piece::Rook) | self.kind(Piece::Queen)).any() {
            return false;
        }

        let knights = self.kind(Piece::Knight).popcount();
        let bishops = self.kind(Piece::Bishop);
        let minors = knights + bishops.popcount();

        if minors <= 1 {
            return true;
        }
        if knights == 0 {
            // Bishops only: drawn if they all share one square color
            return (bishops & Bitboard::LIGHT_SQUARES).is_empty()
                || (bishops & Bitboard::DARK_SQUARES).is_empty();
        }
        false
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_bitboards() {
        let board = Board::new();
        assert_eq!(board.occupied().popcount(), 32);
        assert_eq!(board.color(Color::White).popcount(), 16);
        assert_eq!(board.color(Color::Black).popcount(), 16);
        assert_eq!(board.count(Color::White, Piece::Pawn), 8);
        assert_eq!(board.count(Color::Black, Piece::King), 1);
        assert_eq!(board.king_square(Color::White), Square::E1);
        assert_eq!(board.king_square(Color::Black), Square::E8);
        assert!((board.color(Color::White) & board.color(Color::Black)).is_empty());
    }

    #[test]
    fn test_kind_union_is_occupied() {
        let board = Board::new();
        let mut union = Bitboard::EMPTY;
        for piece in ALL_PIECES {
            union |= board.kind(piece);
        }
        assert_eq!(union, board.occupied());
    }

    #[test]
    fn test_startpos_not_in_check() {
        let board = Board::new();
        assert!(!board.in_check());
        assert!(board.checkers().is_empty());
    }

    #[test]
    fn test_attackers_to() {
        let board = Board::new();
        // e4 is attacked by nothing at the start
        let e4 = Square::from_index(28);
        assert!((board.attackers_to(e4, board.occupied())).is_empty());
        // f3 is covered by the g1 knight and the e2/g2 pawns
        let f3 = Square::from_index(21);
        let attackers = board.attackers_to(f3, board.occupied()) & board.color(Color::White);
        assert_eq!(attackers.popcount(), 3);
    }

    #[test]
    fn test_insufficient_material() {
        assert!(Board::from_fen("8/8/4k3/8/8/3K4/8/8 w - - 0 1").insufficient_material());
        assert!(Board::from_fen("8/8/4k3/8/8/3KN3/8/8 w - - 0 1").insufficient_material());
        assert!(Board::from_fen("8/8/4k3/8/8/3KB3/8/8 w - - 0 1").insufficient_material());
        // Same-colored bishops
        assert!(Board::from_fen("8/8/2b1k3/8/8/3KB3/8/8 w - - 0 1").insufficient_material());
        assert!(!Board::from_fen("8/8/4k3/8/8/3KP3/8/8 w - - 0 1").insufficient_material());
        assert!(!Board::from_fen("8/8/4k3/8/8/3KR3/8/8 w - - 0 1").insufficient_material());
    }

    #[test]
    fn test_psq_matches_recompute() {
        let board = Board::new();
        assert_eq!(board.psq_score(), board.compute_psq_score());
        // Startpos is symmetric, so the PSQ score is zero
        assert_eq!(board.psq_score().mg(), 0);
        assert_eq!(board.psq_score().eg(), 0);
    }
}
