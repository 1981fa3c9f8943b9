//! Precomputed attack tables.
//!
//! Leaper attacks (knight, king, pawn) are direct per-square lookups.
//! Slider attacks (bishop, rook, queen) use magic bitboards: the occupancy
//! of a square's relevance mask is multiplied by a magic constant and
//! shifted to index a per-square attack table. Magics are discovered at
//! startup by rejection sampling with a fixed-seed RNG, so every run builds
//! identical tables.
//!
//! All tables are built once behind `LazyLock` and shared read-only across
//! threads. Call `init()` during single-threaded startup to force them.

use std::sync::LazyLock;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::types::{Bitboard, Color, Piece, Square};

const KNIGHT_DELTAS: [(i32, i32); 8] = [
    (2, 1),
    (1, 2),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
    (1, -2),
    (2, -1),
];

const KING_DELTAS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Seed for magic discovery. Fixed so table construction is reproducible.
const MAGIC_SEED: u64 = 0x2C67_31D5_93B1_A6C9;

fn leaper_mask(sq: usize, deltas: &[(i32, i32)]) -> u64 {
    let r = (sq / 8) as i32;
    let f = (sq % 8) as i32;
    let mut mask = 0u64;
    for &(dr, df) in deltas {
        let (nr, nf) = (r + dr, f + df);
        if (0..8).contains(&nr) && (0..8).contains(&nf) {
            mask |= 1u64 << (nr * 8 + nf);
        }
    }
    mask
}

pub(crate) static KNIGHT_ATTACKS: LazyLock<[Bitboard; 64]> = LazyLock::new(|| {
    let mut attacks = [Bitboard::EMPTY; 64];
    for (sq, slot) in attacks.iter_mut().enumerate() {
        *slot = Bitboard(leaper_mask(sq, &KNIGHT_DELTAS));
    }
    attacks
});

pub(crate) static KING_ATTACKS: LazyLock<[Bitboard; 64]> = LazyLock::new(|| {
    let mut attacks = [Bitboard::EMPTY; 64];
    for (sq, slot) in attacks.iter_mut().enumerate() {
        *slot = Bitboard(leaper_mask(sq, &KING_DELTAS));
    }
    attacks
});

// PAWN_ATTACKS[color][square]
pub(crate) static PAWN_ATTACKS: LazyLock<[[Bitboard; 64]; 2]> = LazyLock::new(|| {
    let mut attacks = [[Bitboard::EMPTY; 64]; 2];
    for sq in 0..64 {
        let bb = Bitboard(1u64 << sq);
        attacks[0][sq] = bb.pawn_attacks(Color::White);
        attacks[1][sq] = bb.pawn_attacks(Color::Black);
    }
    attacks
});

/// Ray-traced slider attacks, used to seed the magic tables and to verify
/// candidate magics.
fn sliding_attacks(sq: usize, occupied: u64, dirs: &[(i32, i32)]) -> u64 {
    let r0 = (sq / 8) as i32;
    let f0 = (sq % 8) as i32;
    let mut attacks = 0u64;
    for &(dr, df) in dirs {
        let (mut r, mut f) = (r0 + dr, f0 + df);
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if occupied & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// Relevance mask: ray squares excluding board edges, whose occupancy can
/// change the attack set.
fn relevance_mask(sq: usize, dirs: &[(i32, i32)]) -> u64 {
    let r0 = (sq / 8) as i32;
    let f0 = (sq % 8) as i32;
    let mut mask = 0u64;
    for &(dr, df) in dirs {
        let (mut r, mut f) = (r0 + dr, f0 + df);
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

struct MagicEntry {
    mask: u64,
    magic: u64,
    shift: u32,
    offset: usize,
}

impl MagicEntry {
    #[inline]
    fn index(&self, occupied: u64) -> usize {
        self.offset + ((occupied & self.mask).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

pub(crate) struct SliderTable {
    entries: [MagicEntry; 64],
    table: Vec<u64>,
}

impl SliderTable {
    #[inline]
    pub(crate) fn attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        Bitboard(self.table[self.entries[sq.index()].index(occupied.0)])
    }

    /// Build the table for one slider type, finding a magic per square by
    /// rejection sampling.
    fn build(dirs: &[(i32, i32)], rng: &mut SmallRng) -> Self {
        let mut table = Vec::new();
        let mut entries = Vec::with_capacity(64);

        for sq in 0..64 {
            let mask = relevance_mask(sq, dirs);
            let bits = mask.count_ones();
            let size = 1usize << bits;
            let shift = 64 - bits;
            let offset = table.len();

            // Enumerate every occupancy subset of the mask (carry-rippler)
            // together with its ray-traced attack set.
            let mut occupancies = Vec::with_capacity(size);
            let mut subset = 0u64;
            loop {
                occupancies.push((subset, sliding_attacks(sq, subset, dirs)));
                subset = subset.wrapping_sub(mask) & mask;
                if subset == 0 {
                    break;
                }
            }

            let mut slots = vec![0u64; size];
            let mut epochs = vec![0u32; size];
            let mut epoch = 0u32;

            let magic = loop {
                // Sparse candidates converge much faster than uniform ones
                let candidate = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
                if (mask.wrapping_mul(candidate) >> 56).count_ones() < 6 {
                    continue;
                }

                epoch += 1;
                let mut good = true;
                for &(occ, att) in &occupancies {
                    let idx = (occ.wrapping_mul(candidate) >> shift) as usize;
                    if epochs[idx] != epoch {
                        epochs[idx] = epoch;
                        slots[idx] = att;
                    } else if slots[idx] != att {
                        good = false;
                        break;
                    }
                }
                if good {
                    break candidate;
                }
            };

            // Fill the shared table with this square's verified mapping
            table.resize(offset + size, 0);
            for &(occ, att) in &occupancies {
                let idx = (occ.wrapping_mul(magic) >> shift) as usize;
                table[offset + idx] = att;
            }

            entries.push(MagicEntry {
                mask,
                magic,
                shift,
                offset,
            });
        }

        let entries: [MagicEntry; 64] = entries
            .try_into()
            .unwrap_or_else(|_| unreachable!("exactly 64 squares"));
        SliderTable { entries, table }
    }
}

static BISHOP_TABLE: LazyLock<SliderTable> = LazyLock::new(|| {
    let mut rng = SmallRng::seed_from_u64(MAGIC_SEED);
    SliderTable::build(&BISHOP_DIRS, &mut rng)
});

static ROOK_TABLE: LazyLock<SliderTable> = LazyLock::new(|| {
    let mut rng = SmallRng::seed_from_u64(MAGIC_SEED ^ 0xF0F0_F0F0_F0F0_F0F0);
    SliderTable::build(&ROOK_DIRS, &mut rng)
});

// LINE[a][b]: the full ray through a and b (empty if not aligned).
// BETWEEN[a][b]: squares strictly between a and b on a shared ray.
static LINE: LazyLock<Box<[[Bitboard; 64]; 64]>> = LazyLock::new(|| {
    let mut line = Box::new([[Bitboard::EMPTY; 64]; 64]);
    for a in 0..64 {
        let sa = Square::from_index(a);
        for b in 0..64 {
            if a == b {
                continue;
            }
            let sb = Square::from_index(b);
            for table in [&*BISHOP_TABLE, &*ROOK_TABLE] {
                if table.attacks(sa, Bitboard::EMPTY).contains(sb) {
                    line[a][b] = (table.attacks(sa, Bitboard::EMPTY)
                        & table.attacks(sb, Bitboard::EMPTY))
                        | Bitboard::from_square(sa)
                        | Bitboard::from_square(sb);
                }
            }
        }
    }
    line
});

static BETWEEN: LazyLock<Box<[[Bitboard; 64]; 64]>> = LazyLock::new(|| {
    let mut between = Box::new([[Bitboard::EMPTY; 64]; 64]);
    for a in 0..64 {
        let sa = Square::from_index(a);
        for b in 0..64 {
            if a == b {
                continue;
            }
            let sb = Square::from_index(b);
            let occ = Bitboard::from_square(sa) | Bitboard::from_square(sb);
            for table in [&*BISHOP_TABLE, &*ROOK_TABLE] {
                if table.attacks(sa, Bitboard::EMPTY).contains(sb) {
                    between[a][b] = table.attacks(sa, occ) & table.attacks(sb, occ);
                }
            }
        }
    }
    between
});

/// Force all attack tables to build. Must be called once during
/// single-threaded startup; afterwards the tables are read-only.
pub fn init() {
    LazyLock::force(&KNIGHT_ATTACKS);
    LazyLock::force(&KING_ATTACKS);
    LazyLock::force(&PAWN_ATTACKS);
    LazyLock::force(&BISHOP_TABLE);
    LazyLock::force(&ROOK_TABLE);
    LazyLock::force(&LINE);
    LazyLock::force(&BETWEEN);
}

/// Knight attack set.
#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq.index()]
}

/// King attack set.
#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq.index()]
}

/// The two forward-diagonal squares a pawn of `color` attacks.
#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    PAWN_ATTACKS[color.index()][sq.index()]
}

/// Bishop attack set given blockers `occupied`.
#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    BISHOP_TABLE.attacks(sq, occupied)
}

/// Rook attack set given blockers `occupied`.
#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    ROOK_TABLE.attacks(sq, occupied)
}

/// Queen attack set given blockers `occupied`.
#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

/// Attack set of a non-pawn piece on `sq` given blockers `occupied`.
/// The source square is never part of the result.
#[inline]
#[must_use]
pub fn piece_attacks(piece: Piece, sq: Square, occupied: Bitboard) -> Bitboard {
    match piece {
        Piece::Knight => knight_attacks(sq),
        Piece::Bishop => bishop_attacks(sq, occupied),
        Piece::Rook => rook_attacks(sq, occupied),
        Piece::Queen => queen_attacks(sq, occupied),
        Piece::King => king_attacks(sq),
        Piece::Pawn => unreachable!("pawn attacks need a color"),
    }
}

/// Squares strictly between `a` and `b` on a shared rank, file or diagonal.
/// Empty if the squares are not aligned.
#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    BETWEEN[a.index()][b.index()]
}

/// The full ray through `a` and `b` including both squares, or empty if
/// they are not aligned.
#[inline]
#[must_use]
pub fn line(a: Square, b: Square) -> Bitboard {
    LINE[a.index()][b.index()]
}

/// Returns true iff `a`, `b` and `c` lie on a common rank, file or diagonal.
#[inline]
#[must_use]
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    line(a, b).contains(c)
}
