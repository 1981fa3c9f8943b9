//! Polyglot opening-book probing.
//!
//! A Polyglot book is a read-only binary file of 16-byte big-endian
//! records, sorted by 64-bit position key: key (8), packed move (2),
//! weight (2), learn (4). Lookup is a binary search for the first record
//! of the position followed by a linear scan over its entries.
//!
//! The hash uses the Polyglot key layout (768 piece-square keys indexed
//! `64 * (2*kind + is_white) + square`, 4 castling keys, 8 en-passant file
//! keys and one turn key), generated once from a fixed seed. Books must be
//! built with the same key table; the historical PolyGlot constants are
//! not tracked bit for bit.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rand::prelude::*;

use crate::board::{Board, Color, Move, Piece, Square};

const ENTRY_SIZE: u64 = 16;

struct PolyglotKeys {
    /// piece[64 * (2*kind + is_white) + square]
    piece: [u64; 768],
    /// White kingside, white queenside, black kingside, black queenside
    castle: [u64; 4],
    en_passant: [u64; 8],
    turn: u64,
}

static KEYS: LazyLock<PolyglotKeys> = LazyLock::new(|| {
    let mut rng = StdRng::seed_from_u64(0x70F6_7A11_B00C_2B5D);
    let mut piece = [0u64; 768];
    for key in &mut piece {
        *key = rng.gen();
    }
    let mut castle = [0u64; 4];
    for key in &mut castle {
        *key = rng.gen();
    }
    let mut en_passant = [0u64; 8];
    for key in &mut en_passant {
        *key = rng.gen();
    }
    PolyglotKeys {
        piece,
        castle,
        en_passant,
        turn: rng.gen(),
    }
});

/// Polyglot hash of a position.
#[must_use]
pub fn book_key(board: &Board) -> u64 {
    let keys = &*KEYS;
    let mut key = 0u64;

    for sq_idx in 0..64 {
        let sq = Square::from_index(sq_idx);
        if let Some((color, piece)) = board.piece_at(sq) {
            let kind_index = 2 * piece.index() + usize::from(color == Color::White);
            key ^= keys.piece[64 * kind_index + sq_idx];
        }
    }

    let rights = board.castling_rights();
    for (idx, (color, kingside)) in [
        (Color::White, true),
        (Color::White, false),
        (Color::Black, true),
        (Color::Black, false),
    ]
    .into_iter()
    .enumerate()
    {
        if rights.has(color, kingside) {
            key ^= keys.castle[idx];
        }
    }

    // Polyglot hashes the en-passant file only when a capture is actually
    // possible, which our board already guarantees
    if let Some(ep) = board.ep_square() {
        key ^= keys.en_passant[ep.file()];
    }

    if board.side_to_move() == Color::White {
        key ^= keys.turn;
    }

    key
}

/// One raw book record.
#[derive(Clone, Copy, Debug)]
struct BookEntry {
    key: u64,
    mv: u16,
    weight: u16,
}

/// An opened Polyglot book.
pub struct Book {
    path: PathBuf,
    entries: u64,
}

impl Book {
    /// Open a book file. A missing or malformed file is an error; the
    /// caller disables the book and carries on rather than failing the
    /// engine.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        if meta.len() % ENTRY_SIZE != 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "book size is not a multiple of the record size",
            ));
        }
        Ok(Book {
            path: path.to_path_buf(),
            entries: meta.len() / ENTRY_SIZE,
        })
    }

    fn read_entry(file: &mut File, index: u64) -> std::io::Result<BookEntry> {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        file.seek(SeekFrom::Start(index * ENTRY_SIZE))?;
        file.read_exact(&mut buf)?;
        Ok(BookEntry {
            key: u64::from_be_bytes(buf[0..8].try_into().expect("8 bytes")),
            mv: u16::from_be_bytes(buf[8..10].try_into().expect("2 bytes")),
            weight: u16::from_be_bytes(buf[10..12].try_into().expect("2 bytes")),
        })
    }

    /// Probe the book for the current position. With `pick_best` the
    /// heaviest entry wins, otherwise an entry is drawn with probability
    /// proportional to its weight.
    pub fn probe(&self, board: &Board, pick_best: bool) -> Option<Move> {
        let key = book_key(board);
        let mut file = File::open(&self.path).ok()?;

        // Binary search for the first record with this key
        let (mut lo, mut hi) = (0u64, self.entries);
        while lo < hi {
            let mid = (lo + hi) / 2;
            let entry = Self::read_entry(&mut file, mid).ok()?;
            if entry.key < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut candidates: Vec<BookEntry> = Vec::new();
        let mut index = lo;
        while index < self.entries {
            let entry = Self::read_entry(&mut file, index).ok()?;
            if entry.key != key {
                break;
            }
            candidates.push(entry);
            index += 1;
        }
        if candidates.is_empty() {
            #[cfg(feature = "logging")]
            log::debug!("book miss for key {key:016X}");
            return None;
        }

        let chosen = if pick_best {
            candidates
                .iter()
                .max_by_key(|e| e.weight)
                .copied()
                .expect("non-empty candidates")
        } else {
            let total: u32 = candidates.iter().map(|e| u32::from(e.weight)).sum();
            let mut rng = SmallRng::seed_from_u64(key);
            let mut ticket = if total > 0 { rng.gen_range(0..total) } else { 0 };
            let mut pick = candidates[0];
            for entry in &candidates {
                if u32::from(entry.weight) > ticket {
                    pick = *entry;
                    break;
                }
                ticket -= u32::from(entry.weight);
            }
            pick
        };

        decode_move(board, chosen.mv)
    }
}

/// Decode a packed Polyglot move against the current position's legal
/// moves. Packing: to-file 0-2, to-rank 3-5, from-file 6-8, from-rank
/// 9-11, promotion kind 12-14 (0 none, 1 knight .. 4 queen). Castling is
/// encoded as the king capturing its own rook.
fn decode_move(board: &Board, packed: u16) -> Option<Move> {
    let to = Square::new(((packed >> 3) & 7) as usize, (packed & 7) as usize);
    let from = Square::new(((packed >> 9) & 7) as usize, ((packed >> 6) & 7) as usize);
    let promo = match (packed >> 12) & 7 {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };

    board
        .legal_moves()
        .iter()
        .copied()
        .find(|m| {
            if m.is_castling() {
                // Book castling moves name the rook square, as we do
                m.from() == from && (m.to() == to || m.castle_king_to() == to)
            } else {
                m.from() == from && m.to() == to && m.promotion_piece() == promo
            }
        })
}

/// Encode a move in the Polyglot packing (used when writing test books).
#[must_use]
pub fn encode_move(m: Move) -> u16 {
    let promo = match m.promotion_piece() {
        Some(Piece::Knight) => 1u16,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        Some(Piece::Queen) => 4,
        None => 0,
        _ => 0,
    };
    (m.to().file() as u16)
        | ((m.to().rank() as u16) << 3)
        | ((m.from().file() as u16) << 6)
        | ((m.from().rank() as u16) << 9)
        | (promo << 12)
}
