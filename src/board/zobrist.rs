//! Zobrist hashing for chess positions.
//!
//! Three independent incrementally-updated 64-bit keys:
//! - the position key (piece placement, side to move, castling rights,
//!   en-passant file) used by the transposition table,
//! - the pawn key (pawn placement only) used by the pawn-structure cache,
//! - the material key (per-kind piece counts per color) used by the
//!   material cache. Count-indexed keys make it insensitive to which
//!   squares the pieces stand on.

use std::sync::LazyLock;

use rand::prelude::*;

use super::types::{Color, Piece, Square};

/// Maximum count of one piece kind per side (8 pawns, up to 10 of a
/// promoted kind).
const MAX_PIECE_COUNT: usize = 11;

pub(crate) struct ZobristKeys {
    // piece_square[color][piece][square]
    pub(crate) piece_square: [[[u64; 64]; 6]; 2],
    pub(crate) side: u64,
    // castling[rights_mask], indexed by the 4-bit rights mask
    pub(crate) castling: [u64; 16],
    // en_passant[file]; only the file matters for the EP target
    pub(crate) en_passant: [u64; 8],
    // material[color][piece][count], XORed for counts 1..=n
    pub(crate) material: [[[u64; MAX_PIECE_COUNT]; 6]; 2],
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed for reproducibility across runs and threads
        let mut rng = StdRng::seed_from_u64(0x71E5_2A2F_8E3C_9D04);

        let mut piece_square = [[[0u64; 64]; 6]; 2];
        for color in &mut piece_square {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let side = rng.gen();

        let mut castling = [0u64; 16];
        // Key for a rights mask is the XOR of its single-bit keys, so
        // incremental updates can use any old/new mask pair
        let mut single = [0u64; 4];
        for key in &mut single {
            *key = rng.gen();
        }
        for (mask, slot) in castling.iter_mut().enumerate() {
            for (bit, key) in single.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    *slot ^= key;
                }
            }
        }

        let mut en_passant = [0u64; 8];
        for key in &mut en_passant {
            *key = rng.gen();
        }

        let mut material = [[[0u64; MAX_PIECE_COUNT]; 6]; 2];
        for color in &mut material {
            for piece in color.iter_mut() {
                for key in piece.iter_mut().skip(1) {
                    *key = rng.gen();
                }
            }
        }

        ZobristKeys {
            piece_square,
            side,
            castling,
            en_passant,
            material,
        }
    }

    #[inline]
    pub(crate) fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.piece_square[color.index()][piece.index()][sq.index()]
    }

    /// Key delta for changing a piece-kind count from `from` to `to`.
    #[inline]
    pub(crate) fn material_delta(&self, color: Color, piece: Piece, from: u32, to: u32) -> u64 {
        let keys = &self.material[color.index()][piece.index()];
        let (lo, hi) = if from < to { (from, to) } else { (to, from) };
        let mut delta = 0;
        for count in (lo + 1)..=hi {
            delta ^= keys[count as usize];
        }
        delta
    }
}

pub(crate) static ZOBRIST: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct() {
        let z = &*ZOBRIST;
        assert_ne!(
            z.piece(Color::White, Piece::Pawn, Square::A1),
            z.piece(Color::Black, Piece::Pawn, Square::A1)
        );
        assert_ne!(
            z.piece(Color::White, Piece::Pawn, Square::A1),
            z.piece(Color::White, Piece::Knight, Square::A1)
        );
        assert_ne!(z.side, 0);
    }

    #[test]
    fn test_castling_mask_composition() {
        let z = &*ZOBRIST;
        assert_eq!(z.castling[0], 0);
        // Composite mask keys are the XOR of their bits
        assert_eq!(z.castling[0b0011], z.castling[0b0001] ^ z.castling[0b0010]);
        assert_eq!(
            z.castling[0b1111],
            z.castling[0b0001] ^ z.castling[0b0010] ^ z.castling[0b0100] ^ z.castling[0b1000]
        );
    }

    #[test]
    fn test_material_delta_symmetry() {
        let z = &*ZOBRIST;
        // Adding then removing a piece cancels out
        let add = z.material_delta(Color::White, Piece::Knight, 1, 2);
        let remove = z.material_delta(Color::White, Piece::Knight, 2, 1);
        assert_eq!(add, remove);
        assert_ne!(add, 0);
        // A two-step delta composes
        let two = z.material_delta(Color::White, Piece::Knight, 0, 2);
        let first = z.material_delta(Color::White, Piece::Knight, 0, 1);
        assert_eq!(two, first ^ add);
    }
}
