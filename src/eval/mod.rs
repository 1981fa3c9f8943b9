//! Static position evaluation.
//!
//! The classical pipeline: incremental material + piece-square score,
//! material imbalance, cached pawn structure, then per-piece mobility and
//! placement terms, king danger, threats, passed pawns, space and an
//! initiative correction, interpolated between midgame and endgame by the
//! material phase and scaled for drawish endings.
//!
//! Every term is computed as (ours − theirs), so the evaluation is color
//! symmetric up to the tempo bonus.

pub mod material;
pub mod pawns;
pub mod tables;

use crate::board::attacks;
use crate::board::score::{Value, LAZY_THRESHOLD, PHASE_MIDGAME};
use crate::board::{Bitboard, Board, Color, Piece, Score, Square};

use material::{MaterialTable, SCALE_NORMAL};
use pawns::{PawnEntry, PawnTable};
use tables::*;

/// Thread-local evaluation caches. The pawn and material tables are
/// per-thread; the transposition table is the only shared cache.
pub struct EvalCaches {
    pub pawns: PawnTable,
    pub material: MaterialTable,
}

impl EvalCaches {
    #[must_use]
    pub fn new() -> Self {
        EvalCaches {
            pawns: PawnTable::new(),
            material: MaterialTable::new(),
        }
    }
}

impl Default for EvalCaches {
    fn default() -> Self {
        EvalCaches::new()
    }
}

/// Evaluate the position from the side-to-move's perspective.
#[must_use]
pub fn evaluate(board: &Board, caches: &mut EvalCaches) -> Value {
    let material = caches.material.probe(board).clone();

    // Recognized endgames bypass the full pipeline. Static values must
    // stay clear of the mate-score band whatever the material count.
    if let Some(kind) = material.endgame() {
        use crate::board::score::VALUE_MATE_IN_MAX_PLY;
        let v = material::evaluate_endgame(board, kind);
        return (from_white(board, v) + TEMPO)
            .clamp(-VALUE_MATE_IN_MAX_PLY + 1, VALUE_MATE_IN_MAX_PLY - 1);
    }

    let pawn_entry = caches.pawns.probe(board).clone();

    let mut score = board.psq_score() + material.imbalance() + pawn_entry.structure_score();

    // Lazy exit: when the material gap is already overwhelming the
    // remaining positional detail cannot change the verdict
    let lazy = (score.mg() + score.eg()) / 2;
    if lazy.abs() > LAZY_THRESHOLD {
        return from_white(board, lazy) + TEMPO;
    }

    let mut info = EvalInfo::new(board, &pawn_entry);
    score += info.pieces(Color::White) - info.pieces(Color::Black);
    score += info.mobility[0] - info.mobility[1];
    score += info.king_safety(Color::White) - info.king_safety(Color::Black);
    score += info.threats(Color::White) - info.threats(Color::Black);
    score += info.passed_pawns(Color::White) - info.passed_pawns(Color::Black);
    score += info.space(Color::White) - info.space(Color::Black);
    score += info.initiative(score.eg());

    // Scale the endgame half for the side the endgame score favours
    let strong_side = if score.eg() > 0 {
        Color::White
    } else {
        Color::Black
    };
    let sf = material.scale_for(strong_side) as i32;

    let phase = material.phase();
    let v = (score.mg() * phase + score.eg() * (PHASE_MIDGAME - phase) * sf / SCALE_NORMAL as i32)
        / PHASE_MIDGAME;

    from_white(board, v) + TEMPO
}

#[inline]
fn from_white(board: &Board, v: Value) -> Value {
    if board.side_to_move() == Color::White {
        v
    } else {
        -v
    }
}

/// Attack maps and king-zone bookkeeping shared by the evaluation terms.
struct EvalInfo<'a> {
    board: &'a Board,
    pawn_entry: &'a PawnEntry,
    /// attacked_by[color][piece kind]
    attacked_by: [[Bitboard; 6]; 2],
    /// All squares attacked at least once / at least twice
    attacked_all: [Bitboard; 2],
    attacked2: [Bitboard; 2],
    /// Zone around each king used for the danger count
    king_ring: [Bitboard; 2],
    /// Enemy pieces attacking this color's king ring, and their weight
    king_attackers_count: [i32; 2],
    king_attackers_weight: [i32; 2],
    /// Attacks directly adjacent to this color's king
    king_attacks_count: [i32; 2],
    mobility_area: [Bitboard; 2],
    mobility: [Score; 2],
}

impl<'a> EvalInfo<'a> {
    fn new(board: &'a Board, pawn_entry: &'a PawnEntry) -> Self {
        let mut info = EvalInfo {
            board,
            pawn_entry,
            attacked_by: [[Bitboard::EMPTY; 6]; 2],
            attacked_all: [Bitboard::EMPTY; 2],
            attacked2: [Bitboard::EMPTY; 2],
            king_ring: [Bitboard::EMPTY; 2],
            king_attackers_count: [0; 2],
            king_attackers_weight: [0; 2],
            king_attacks_count: [0; 2],
            mobility_area: [Bitboard::EMPTY; 2],
            mobility: [Score::ZERO; 2],
        };

        for color in [Color::White, Color::Black] {
            let c = color.index();
            let them = color.opponent();
            let king_sq = board.king_square(color);
            let king_zone = attacks::king_attacks(king_sq);

            info.attacked_by[c][Piece::King.index()] = king_zone;
            info.attacked_by[c][Piece::Pawn.index()] = pawn_entry.attacks(color);
            info.attacked2[c] = king_zone & pawn_entry.attacks(color)
                | pawn_entry.double_attacks(color);
            info.attacked_all[c] = king_zone | pawn_entry.attacks(color);

            // King ring: the king zone, widened off the edge files so the
            // danger count is comparable for a corner king
            let mut ring = king_zone | Bitboard::from_square(king_sq);
            if king_sq.file() == 0 {
                ring |= ring.shift_east();
            } else if king_sq.file() == 7 {
                ring |= ring.shift_west();
            }
            info.king_ring[c] = ring;

            // Mobility area: squares not defended by enemy pawns and not
            // hosting our own blocked or starting pawns, queen or king
            let our_pawns = board.pieces(color, Piece::Pawn);
            let low_ranks = if color == Color::White {
                Bitboard::RANK_2 | Bitboard::RANK_3
            } else {
                Bitboard::RANK_7 | Bitboard::RANK_6
            };
            let blocked_pawns =
                our_pawns & (board.occupied().shift_backward(color) | low_ranks);
            info.mobility_area[c] = !(blocked_pawns
                | board.pieces(color, Piece::King)
                | board.pieces(color, Piece::Queen)
                | pawn_entry.attacks(them));
        }

        info
    }

    #[inline]
    fn attacked_by(&self, color: Color, piece: Piece) -> Bitboard {
        self.attacked_by[color.index()][piece.index()]
    }

    fn add_attacks(&mut self, color: Color, piece: Piece, attacks: Bitboard) {
        let c = color.index();
        self.attacked2[c] |= self.attacked_all[c] & attacks;
        self.attacked_all[c] |= attacks;
        self.attacked_by[c][piece.index()] |= attacks;
    }

    // =========================================================================
    // Per-piece terms
    // =========================================================================

    fn pieces(&mut self, color: Color) -> Score {
        let board = self.board;
        let us = color;
        let them = color.opponent();
        let c = us.index();
        let occupied = board.occupied();
        let our_pawns = board.pieces(us, Piece::Pawn);
        let their_pawns = board.pieces(them, Piece::Pawn);
        let king_sq = board.king_square(us);
        let mut score = Score::ZERO;

        // Squares an enemy pawn can never attack, on their side of the
        // board: candidate outposts
        let outpost_ranks = if us == Color::White {
            Bitboard::RANK_4 | Bitboard::RANK_5 | Bitboard::RANK_6
        } else {
            Bitboard::RANK_5 | Bitboard::RANK_4 | Bitboard::RANK_3
        };
        let holes = outpost_ranks & !their_pawns.pawn_attack_span(them);

        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            for sq in board.pieces(us, piece) {
                // X-ray through our own queen (and doubled rooks) so
                // batteries are counted at full strength
                let mut attacks = match piece {
                    Piece::Bishop => attacks::bishop_attacks(
                        sq,
                        occupied ^ board.pieces(us, Piece::Queen),
                    ),
                    Piece::Rook => attacks::rook_attacks(
                        sq,
                        occupied
                            ^ board.pieces(us, Piece::Queen)
                            ^ (board.pieces(us, Piece::Rook) ^ Bitboard::from_square(sq)),
                    ),
                    _ => attacks::piece_attacks(piece, sq, occupied),
                };

                // A pinned piece only moves along the pin ray
                if board.blockers_for_king(us).contains(sq) {
                    attacks &= attacks::line(king_sq, sq);
                }

                self.add_attacks(us, piece, attacks);

                if (attacks & self.king_ring[them.index()]).any() {
                    self.king_attackers_count[them.index()] += 1;
                    self.king_attackers_weight[them.index()] +=
                        KING_ATTACK_WEIGHTS[piece.index() - 1];
                    self.king_attacks_count[them.index()] += (attacks
                        & self.attacked_by(them, Piece::King))
                    .popcount() as i32;
                }

                let mobility = (attacks & self.mobility_area[c]).popcount() as usize;
                self.mobility[c] += match piece {
                    Piece::Knight => MOBILITY_KNIGHT[mobility.min(8)],
                    Piece::Bishop => MOBILITY_BISHOP[mobility.min(13)],
                    Piece::Rook => MOBILITY_ROOK[mobility.min(14)],
                    _ => MOBILITY_QUEEN[mobility.min(27)],
                };

                match piece {
                    Piece::Knight | Piece::Bishop => {
                        // Outpost: a hole defended by one of our pawns
                        let defended_holes = holes & self.attacked_by(us, Piece::Pawn);
                        if defended_holes.contains(sq) {
                            score += if piece == Piece::Knight {
                                OUTPOST_KNIGHT * 2
                            } else {
                                OUTPOST_BISHOP * 2
                            };
                        } else if piece == Piece::Knight
                            && (attacks & defended_holes & !board.color(us)).any()
                        {
                            score += REACHABLE_OUTPOST_KNIGHT;
                        } else if piece == Piece::Bishop
                            && (attacks & defended_holes & !board.color(us)).any()
                        {
                            score += REACHABLE_OUTPOST_BISHOP;
                        }

                        // Shielded by a pawn directly in front
                        if sq.relative_rank(us) < 5
                            && our_pawns.contains(sq.forward(us))
                        {
                            score += MINOR_BEHIND_PAWN;
                        }

                        if piece == Piece::Bishop {
                            // Pawns on the bishop's color hamper it
                            let same_color_pawns =
                                self.pawn_entry.pawns_on_square_color(us, sq.is_dark());
                            score -= BISHOP_PAWNS * same_color_pawns;
                        }
                    }
                    Piece::Rook => {
                        if self.pawn_entry.is_semiopen(us, sq.file()) {
                            let fully_open = self.pawn_entry.is_semiopen(them, sq.file());
                            score += ROOK_ON_FILE[usize::from(fully_open)];
                        } else if mobility <= 3 {
                            // A rook boxed in by its own uncastled king
                            let king_file = king_sq.file();
                            if (king_file < 4) == (sq.file() < king_file) {
                                let penalty = if board.castling_rights().has_any(us) {
                                    Score::new(TRAPPED_ROOK.mg() / 2, TRAPPED_ROOK.eg())
                                } else {
                                    TRAPPED_ROOK
                                };
                                score -= penalty;
                            }
                        }
                    }
                    Piece::Queen => {
                        // A queen pinned or attackable through a discovered
                        // slider is a tactical liability
                        let snipers = (board.pieces(them, Piece::Rook)
                            & attacks::rook_attacks(sq, Bitboard::EMPTY))
                            | (board.pieces(them, Piece::Bishop)
                                & attacks::bishop_attacks(sq, Bitboard::EMPTY));
                        for sniper in snipers {
                            let blocking = attacks::between(sq, sniper) & occupied;
                            if blocking.popcount() == 1 {
                                score -= WEAK_QUEEN;
                                break;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        score
    }

    // =========================================================================
    // King safety
    // =========================================================================

    fn king_safety(&mut self, color: Color) -> Score {
        let board = self.board;
        let us = color;
        let them = us.opponent();
        let c = us.index();
        let king_sq = board.king_square(us);
        let occupied = board.occupied();

        let mut score = self.pawn_entry.king_safety(board, us);

        if self.king_attackers_count[c] <= 1 - board.count(them, Piece::Queen) as i32 {
            return score;
        }

        // Squares the enemy can safely put a piece on: not defended, or
        // only by our king while doubly attacked
        let weak = self.attacked_all[them.index()]
            & !self.attacked2[c]
            & (!self.attacked_all[c]
                | self.attacked_by(us, Piece::King)
                | self.attacked_by(us, Piece::Queen));

        let safe = !board.color(them)
            & (!self.attacked_all[c] | (weak & self.attacked2[them.index()]));

        let rook_rays = attacks::rook_attacks(king_sq, occupied ^ board.pieces(us, Piece::Queen));
        let bishop_rays =
            attacks::bishop_attacks(king_sq, occupied ^ board.pieces(us, Piece::Queen));

        let mut danger = self.king_attackers_count[c] * self.king_attackers_weight[c] / 10
            + 69 * self.king_attacks_count[c]
            + 185 * (self.king_ring[c] & weak).popcount() as i32
            - 100 * i32::from((self.attacked_by(us, Piece::Knight)
                & self.attacked_by(us, Piece::King))
            .any())
            - 6 * score.mg() / 8
            - 30;

        // Safe checks, most valuable first so each square counts once
        if ((rook_rays & self.attacked_by(them, Piece::Rook)) & safe).any() {
            danger += SAFE_CHECK_ROOK;
        }
        if (((rook_rays | bishop_rays) & self.attacked_by(them, Piece::Queen))
            & safe
            & !self.attacked_by(us, Piece::Queen))
        .any()
        {
            danger += SAFE_CHECK_QUEEN;
        }
        if ((bishop_rays & self.attacked_by(them, Piece::Bishop)) & safe).any() {
            danger += SAFE_CHECK_BISHOP;
        }
        if ((attacks::knight_attacks(king_sq) & self.attacked_by(them, Piece::Knight)) & safe)
            .any()
        {
            danger += SAFE_CHECK_KNIGHT;
        }

        if danger > 0 {
            score -= Score::new(danger * danger / 4096, danger / 16);
        }

        // A king stranded on a flank with no pawns left is exposed in both
        // game phases
        let king_flank = if king_sq.file() < 4 {
            Bitboard::QUEEN_SIDE
        } else {
            Bitboard::KING_SIDE
        };
        if (board.kind(Piece::Pawn) & king_flank).is_empty() {
            score -= KING_ON_PAWNLESS_FLANK;
        }

        score
    }

    // =========================================================================
    // Threats
    // =========================================================================

    fn threats(&self, color: Color) -> Score {
        let board = self.board;
        let us = color;
        let them = us.opponent();
        let c = us.index();
        let t = them.index();
        let mut score = Score::ZERO;

        let enemies = board.color(them);
        let nonpawn_enemies = enemies & !board.pieces(them, Piece::Pawn);

        // Squares strongly protected by the enemy
        let strongly_protected =
            self.attacked_by(them, Piece::Pawn) | (self.attacked2[t] & !self.attacked2[c]);
        let defended = nonpawn_enemies & strongly_protected;
        let weak = enemies & !strongly_protected & self.attacked_all[c];

        if (defended | weak).any() {
            let minor_targets = (defended | weak)
                & (self.attacked_by(us, Piece::Knight) | self.attacked_by(us, Piece::Bishop));
            for sq in minor_targets {
                if let Some(piece) = board.piece_on(sq) {
                    score += THREAT_BY_MINOR[piece.index()];
                }
            }

            let rook_targets =
                (board.pieces(them, Piece::Queen) | weak) & self.attacked_by(us, Piece::Rook);
            for sq in rook_targets {
                if let Some(piece) = board.piece_on(sq) {
                    score += THREAT_BY_ROOK[piece.index()];
                }
            }

            if (weak & self.attacked_by(us, Piece::King)).any() {
                score += THREAT_BY_KING;
            }

            let hanging = weak & (!self.attacked_all[t] | (nonpawn_enemies & self.attacked2[c]));
            score += HANGING * hanging.popcount() as i32;
        }

        // Enemy pieces poked on squares they nominally control
        let restricted =
            self.attacked_all[t] & !strongly_protected & self.attacked_all[c];
        score += RESTRICTED_PIECE * restricted.popcount() as i32;

        // Threats by safe pawns and safe pawn pushes
        let safe = !self.attacked_all[t] | self.attacked_all[c];
        let safe_pawns = board.pieces(us, Piece::Pawn) & safe;
        score += THREAT_BY_SAFE_PAWN
            * (safe_pawns.pawn_attacks(us) & nonpawn_enemies).popcount() as i32;

        let empty = !board.occupied();
        let mut pushes = board.pieces(us, Piece::Pawn).shift_forward(us) & empty;
        let third = if us == Color::White {
            Bitboard::RANK_3
        } else {
            Bitboard::RANK_6
        };
        pushes |= (pushes & third).shift_forward(us) & empty;
        pushes &= !self.attacked_by(them, Piece::Pawn) & safe;
        score += THREAT_BY_PAWN_PUSH
            * (pushes.pawn_attacks(us) & nonpawn_enemies).popcount() as i32;

        // Harassment of the enemy queen
        if board.count(them, Piece::Queen) == 1 {
            let queen_sq = board.pieces(them, Piece::Queen).lsb();
            let safe_spots = self.mobility_area[c] & !strongly_protected;

            let knight_spots =
                self.attacked_by(us, Piece::Knight) & attacks::knight_attacks(queen_sq);
            score += KNIGHT_ON_QUEEN * (knight_spots & safe_spots).popcount() as i32;

            let slider_spots = ((self.attacked_by(us, Piece::Bishop)
                & attacks::bishop_attacks(queen_sq, board.occupied()))
                | (self.attacked_by(us, Piece::Rook)
                    & attacks::rook_attacks(queen_sq, board.occupied())))
                & safe_spots
                & self.attacked2[c];
            score += SLIDER_ON_QUEEN * slider_spots.popcount() as i32;
        }

        score
    }

    // =========================================================================
    // Passed pawns
    // =========================================================================

    fn passed_pawns(&self, color: Color) -> Score {
        let board = self.board;
        let us = color;
        let them = us.opponent();
        let our_king = board.king_square(us);
        let their_king = board.king_square(them);
        let mut score = Score::ZERO;

        for sq in self.pawn_entry.passed(us) {
            let rank = sq.relative_rank(us);
            let mut bonus = PASSED_RANK[rank] + PASSED_FILE[sq.file()];

            if rank > 2 {
                let w = 5 * rank as i32 - 13;
                let block_sq = sq.forward(us);

                // King proximity matters more the closer the pawn is to
                // promotion
                let king_term = (their_king.distance(block_sq).min(5) as i32 * 5
                    - our_king.distance(block_sq).min(5) as i32 * 2)
                    * w;
                bonus += Score::new(0, king_term);

                if board.is_empty_square(block_sq) {
                    // Is the path to promotion controlled?
                    let path = Bitboard::file_mask(sq.file())
                        & forward_span(us, sq);
                    let unsafe_path = path
                        & (self.attacked_all[them.index()] | board.color(them));
                    let k = if unsafe_path.is_empty() {
                        18
                    } else if unsafe_path.contains(block_sq) {
                        4
                    } else {
                        9
                    };
                    bonus += Score::new(k * w, k * w);
                }
            }

            score += bonus;
        }

        score
    }

    // =========================================================================
    // Space
    // =========================================================================

    fn space(&self, color: Color) -> Score {
        let board = self.board;
        let us = color;
        let them = us.opponent();

        // Space matters only while real forces remain
        if board.non_pawn_material(Color::White) + board.non_pawn_material(Color::Black) < 12222 {
            return Score::ZERO;
        }

        let our_side = if us == Color::White {
            Bitboard::RANK_2 | Bitboard::RANK_3 | Bitboard::RANK_4
        } else {
            Bitboard::RANK_7 | Bitboard::RANK_6 | Bitboard::RANK_5
        };
        let safe = Bitboard::CENTER_FILES
            & our_side
            & !board.pieces(us, Piece::Pawn)
            & !self.attacked_by(them, Piece::Pawn);

        // Squares behind our own pawns count double
        let mut behind = board.pieces(us, Piece::Pawn);
        behind |= behind.shift_backward(us);
        behind |= behind.shift_backward(us).shift_backward(us);

        let count = safe.popcount() as i32 + (behind & safe).popcount() as i32;
        let weight = board.color(us).popcount() as i32 - 1;

        Score::new(count * weight * weight / SPACE_WEIGHT_DIVISOR, 0)
    }

    // =========================================================================
    // Initiative
    // =========================================================================

    /// Complexity correction applied to the endgame half only; it never
    /// flips the sign of the score.
    fn initiative(&self, eg: Value) -> Score {
        let board = self.board;
        let white_king = board.king_square(Color::White);
        let black_king = board.king_square(Color::Black);

        let outflanking = white_king.file_distance(black_king) as i32
            - white_king.rank_distance(black_king) as i32;
        let pawns = board.kind(Piece::Pawn).popcount() as i32;
        let both_flanks = (board.kind(Piece::Pawn) & Bitboard::QUEEN_SIDE).any()
            && (board.kind(Piece::Pawn) & Bitboard::KING_SIDE).any();
        let pure_pawn = board.non_pawn_material(Color::White)
            + board.non_pawn_material(Color::Black)
            == 0;

        let complexity = 8 * self.pawn_entry.passed(Color::White).popcount() as i32
            + 8 * self.pawn_entry.passed(Color::Black).popcount() as i32
            + 12 * pawns
            + 9 * outflanking
            + 21 * i32::from(both_flanks)
            + 50 * i32::from(pure_pawn)
            - 110;

        let v = eg.signum() * complexity.max(-eg.abs());
        Score::new(0, v)
    }
}

/// Ranks strictly ahead of `sq` for `color` (free function shared with the
/// passed-pawn term).
#[inline]
fn forward_span(color: Color, sq: Square) -> Bitboard {
    Bitboard::from_square(sq).shift_forward(color).fill_forward(color)
}

trait PawnSpanExt {
    fn pawn_attack_span(self, color: Color) -> Bitboard;
}

impl PawnSpanExt for Bitboard {
    /// Every square some pawn of `color` could ever attack while advancing.
    fn pawn_attack_span(self, color: Color) -> Bitboard {
        self.pawn_attacks(color).fill_forward(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_fen(fen: &str) -> Value {
        let board = Board::from_fen(fen);
        let mut caches = EvalCaches::new();
        evaluate(&board, &mut caches)
    }

    fn flip_fen(fen: &str) -> String {
        // Mirror the board vertically and swap colors and the side to move
        let parts: Vec<&str> = fen.split_whitespace().collect();
        let flipped_board: Vec<String> = parts[0]
            .split('/')
            .rev()
            .map(|rank| {
                rank.chars()
                    .map(|c| {
                        if c.is_ascii_alphabetic() {
                            if c.is_uppercase() {
                                c.to_ascii_lowercase()
                            } else {
                                c.to_ascii_uppercase()
                            }
                        } else {
                            c
                        }
                    })
                    .collect()
            })
            .collect();
        let side = if parts[1] == "w" { "b" } else { "w" };
        let castling: String = if parts[2] == "-" {
            "-".to_string()
        } else {
            let mut s: Vec<char> = parts[2]
                .chars()
                .map(|c| {
                    if c.is_uppercase() {
                        c.to_ascii_lowercase()
                    } else {
                        c.to_ascii_uppercase()
                    }
                })
                .collect();
            s.sort_by_key(|c| (c.is_lowercase(), *c));
            s.into_iter().collect()
        };
        format!(
            "{} {} {} - {} {}",
            flipped_board.join("/"),
            side,
            castling,
            parts[4],
            parts[5]
        )
    }

    #[test]
    fn test_startpos_near_zero() {
        let v = eval_fen(Board::startpos_fen());
        assert!(v.abs() < 100, "startpos evaluation {v} too far from zero");
    }

    #[test]
    fn test_color_symmetry() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let direct = eval_fen(fen);
            let mirrored = eval_fen(&flip_fen(fen));
            assert!(
                (direct - mirrored).abs() <= 1,
                "asymmetric eval for {fen}: {direct} vs {mirrored}"
            );
        }
    }

    #[test]
    fn test_material_advantage_shows() {
        // White is up a rook
        let v = eval_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        assert!(v > 300, "rook-up evaluation {v} too small");
        // Same position from black's perspective
        let v = eval_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1");
        assert!(v < -300);
    }

    #[test]
    fn test_extra_pawn_is_positive() {
        let v = eval_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        assert!(v > 0, "pawn-up endgame evaluates to {v}");
    }

    #[test]
    fn test_lazy_path_monotone() {
        // Overwhelming material triggers the lazy exit and stays strongly
        // positive
        let v = eval_fen("4k3/8/8/8/8/8/QQQ5/R3K2R w KQ - 0 1");
        assert!(v > LAZY_THRESHOLD);
    }

    #[test]
    fn test_tempo_applied() {
        // An empty-ish symmetric position evaluated for both sides differs
        // by exactly twice the tempo
        let fen_w = "4k3/pppp4/8/8/8/8/PPPP4/4K3 w - - 0 1";
        let fen_b = "4k3/pppp4/8/8/8/8/PPPP4/4K3 b - - 0 1";
        let vw = eval_fen(fen_w);
        let vb = eval_fen(fen_b);
        assert_eq!(vw + vb, 2 * TEMPO);
    }
}
