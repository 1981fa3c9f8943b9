//! Chess board representation and move execution.
//!
//! Bitboard-based position with incremental Zobrist keys, staged move
//! generation via magic attack tables, and full do/undo support including
//! Chess960 castling.
//!
//! # Example
//! ```
//! use sable::board::Board;
//!
//! let board = Board::new();
//! let moves = board.legal_moves();
//! assert_eq!(moves.len(), 20);
//! ```

pub mod attacks;
mod error;
mod fen;
mod make_unmake;
pub mod movegen;
mod pst;
mod see;
pub mod state;
mod types;
pub mod zobrist;

#[cfg(test)]
mod tests;

// Public API - types users need
pub use error::{FenError, MoveParseError, SquareError};
pub use movegen::GenType;
pub use state::{Board, StateInfo, STARTPOS_FEN};
pub use types::{
    score, Bitboard, BitboardIter, CastlingRights, Color, Move, MoveList, Piece, Score,
    ScoredMove, ScoredMoveList, Square, Value,
};

pub(crate) use see::see_value;
pub(crate) use types::MAX_PLY;
