//! Evaluation constants.
//!
//! One coherent constant set for every term. Mobility tables are indexed by
//! the number of reachable safe squares; the king-danger coefficients feed
//! the quadratic danger transform in the king-safety term.

use crate::board::{Score, Value};

macro_rules! s {
    ($mg:expr, $eg:expr) => {
        Score::new($mg, $eg)
    };
}

/// Mobility bonus by piece (knight, bishop, rook, queen) and count of
/// attacked squares in the mobility area.
#[rustfmt::skip]
pub const MOBILITY_KNIGHT: [Score; 9] = [
    s!(-75, -76), s!(-57, -54), s!(-9, -28), s!(-2, -10), s!(6, 5),
    s!(14, 12), s!(22, 26), s!(29, 29), s!(36, 29),
];

#[rustfmt::skip]
pub const MOBILITY_BISHOP: [Score; 14] = [
    s!(-48, -59), s!(-20, -23), s!(16, -3), s!(26, 13), s!(38, 24),
    s!(51, 42), s!(55, 54), s!(63, 57), s!(63, 65), s!(68, 73),
    s!(81, 78), s!(81, 86), s!(91, 88), s!(98, 97),
];

#[rustfmt::skip]
pub const MOBILITY_ROOK: [Score; 15] = [
    s!(-58, -76), s!(-27, -18), s!(-15, 28), s!(-10, 55), s!(-5, 69),
    s!(-2, 82), s!(9, 112), s!(16, 118), s!(30, 132), s!(29, 142),
    s!(32, 155), s!(38, 165), s!(46, 166), s!(48, 169), s!(58, 171),
];

#[rustfmt::skip]
pub const MOBILITY_QUEEN: [Score; 28] = [
    s!(-39, -36), s!(-21, -15), s!(3, 8), s!(3, 18), s!(14, 34),
    s!(22, 54), s!(28, 61), s!(41, 73), s!(43, 79), s!(48, 92),
    s!(56, 94), s!(60, 104), s!(60, 113), s!(66, 120), s!(67, 123),
    s!(70, 126), s!(71, 133), s!(73, 136), s!(79, 140), s!(88, 143),
    s!(88, 148), s!(99, 166), s!(102, 170), s!(102, 175), s!(106, 184),
    s!(109, 191), s!(113, 206), s!(116, 212),
];

/// Outpost bonus for a knight or bishop on a pawn-defended hole, doubled
/// when the square cannot be attacked by an enemy pawn at all.
pub const OUTPOST_KNIGHT: Score = s!(22, 6);
pub const OUTPOST_BISHOP: Score = s!(9, 2);
/// Reachable outpost (the piece can jump there next move).
pub const REACHABLE_OUTPOST_KNIGHT: Score = s!(11, 3);
pub const REACHABLE_OUTPOST_BISHOP: Score = s!(4, 1);

/// Minor piece shielded by a friendly pawn directly in front.
pub const MINOR_BEHIND_PAWN: Score = s!(16, 0);

/// Penalty per pawn standing on the bishop's square color.
pub const BISHOP_PAWNS: Score = s!(8, 12);

/// Rook on an open or semi-open file.
pub const ROOK_ON_FILE: [Score; 2] = [s!(20, 7), s!(45, 20)];

/// Rook trapped by its own king (worse without castling rights).
pub const TRAPPED_ROOK: Score = s!(92, 0);

/// Queen pinned or attacked through by a slider.
pub const WEAK_QUEEN: Score = s!(50, 10);

/// King-danger attack weights per piece kind (knight, bishop, rook, queen).
pub const KING_ATTACK_WEIGHTS: [i32; 4] = [78, 56, 45, 11];

/// Safe-check danger bonuses per checking piece kind.
pub const SAFE_CHECK_KNIGHT: i32 = 790;
pub const SAFE_CHECK_BISHOP: i32 = 635;
pub const SAFE_CHECK_ROOK: i32 = 880;
pub const SAFE_CHECK_QUEEN: i32 = 780;

/// Threat bonuses: our minor attacking an enemy non-pawn, indexed by the
/// attacked piece kind.
#[rustfmt::skip]
pub const THREAT_BY_MINOR: [Score; 6] = [
    s!(0, 31), s!(39, 42), s!(57, 44), s!(68, 112), s!(47, 120), s!(0, 0),
];

/// Our rook attacking an enemy piece, indexed by the attacked piece kind.
#[rustfmt::skip]
pub const THREAT_BY_ROOK: [Score; 6] = [
    s!(0, 24), s!(38, 71), s!(38, 61), s!(0, 38), s!(36, 38), s!(0, 0),
];

/// Enemy piece attacked by our king.
pub const THREAT_BY_KING: Score = s!(22, 78);

/// Enemy piece with no defenders at all.
pub const HANGING: Score = s!(62, 36);

/// Safe pawn push that would attack an enemy piece.
pub const THREAT_BY_PAWN_PUSH: Score = s!(45, 35);

/// Safe threat against the enemy queen by a minor or rook.
pub const THREAT_BY_SAFE_PAWN: Score = s!(165, 133);
pub const KNIGHT_ON_QUEEN: Score = s!(21, 11);
pub const SLIDER_ON_QUEEN: Score = s!(42, 21);

/// Restricted mobility: enemy piece attacked on a square it defends.
pub const RESTRICTED_PIECE: Score = s!(7, 6);

/// Passed-pawn rank bonuses (rank 0 and 1 are never passed bonus ranks).
#[rustfmt::skip]
pub const PASSED_RANK: [Score; 8] = [
    s!(0, 0), s!(5, 7), s!(5, 13), s!(18, 23),
    s!(74, 58), s!(164, 166), s!(268, 243), s!(0, 0),
];

/// Passed-pawn file adjustment, center files worth less.
#[rustfmt::skip]
pub const PASSED_FILE: [Score; 8] = [
    s!(15, 7), s!(-5, 14), s!(1, -5), s!(-22, -11),
    s!(-22, -11), s!(1, -5), s!(-5, 14), s!(15, 7),
];

/// Space-term weight per safe central square.
pub const SPACE_WEIGHT_DIVISOR: i32 = 16;

/// Tempo bonus for the side to move.
pub const TEMPO: Value = 28;

/// Shelter strength by min(file distance from king, edge distance) and the
/// rank of our defending pawn (0 = no pawn).
#[rustfmt::skip]
pub const SHELTER_STRENGTH: [[i32; 8]; 4] = [
    [ -6,  81,  93,  58,  39,  18,   25, 0],
    [-43,  61,  35, -49, -29, -11,  -63, 0],
    [-10,  75,  23,  -2,  32,   3,  -45, 0],
    [-39, -13, -29, -52, -48, -67, -166, 0],
];

/// Storm penalty by file distance bucket and the rank of the advancing
/// enemy pawn (0 = no pawn).
#[rustfmt::skip]
pub const UNBLOCKED_STORM: [[i32; 8]; 4] = [
    [ 89, 107, 123, 93, 57, 45, 51, 0],
    [ 44, -18, 123, 46, 39, -7, 23, 0],
    [  4,  52, 162, 37,  7, -14, -2, 0],
    [-10, -14,  90, 15,  2,  -7, -16, 0],
];

/// Storm value when the enemy pawn is blocked by our own pawn.
pub const BLOCKED_STORM: [i32; 8] = [0, 0, 76, -10, -7, -4, -1, 0];

/// Base shelter value when the king file itself has no pawn cover at all.
pub const KING_ON_PAWNLESS_FLANK: Score = s!(17, 95);
