//! Board test suite.
//!
//! Organized by category:
//! - `perft.rs` - move generation node counts against reference values
//! - `zobrist.rs` - incremental key consistency over do/undo sequences
//! - `draw.rs` - repetition, fifty-move and insufficient-material draws
//! - `proptest.rs` - property-based do/undo and FEN round-trips

mod perft;
mod proptest;
