//! Iterative-deepening alpha-beta with principal-variation search.
//!
//! Interior nodes apply, in order: draw detection, mate-distance pruning,
//! transposition cutoffs, razoring, reverse futility, null move (verified
//! from depth 12), ProbCut, internal iterative deepening, singular
//! extensions, then the move loop with late-move reductions, futility and
//! move-count pruning. Quiescence handles the forcing tail with stand-pat,
//! delta and SEE pruning.

use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::board::score::{
    mate_in, mated_in, Value, PAWN_VALUE_MG, VALUE_INFINITE, VALUE_MATE,
    VALUE_MATE_IN_MAX_PLY, VALUE_NONE, VALUE_ZERO,
};
use crate::board::{Move, Piece, MAX_PLY};
use crate::eval::evaluate;
use crate::tt::{value_from_tt, value_to_tt, Bound};

use super::history::{piece_to_key, stat_bonus};
use super::picker::MovePicker;
use super::{SearchInfo, Worker, WorkerResult};

// Tunables. One coherent set; the null-move verification threshold is
// fixed at depth 12.
const ASPIRATION_DELTA: Value = 18;
const RAZOR_MARGIN: Value = 590;
const RFP_MAX_DEPTH: i32 = 7;
const RFP_MARGIN: Value = 165;
const NULL_MIN_DEPTH: i32 = 3;
const NULL_VERIFICATION_DEPTH: i32 = 12;
const PROBCUT_MIN_DEPTH: i32 = 5;
const PROBCUT_MARGIN: Value = 190;
const IID_MIN_DEPTH: i32 = 7;
const SINGULAR_MIN_DEPTH: i32 = 8;
const MAX_CHECK_EXTENSIONS: i32 = 16;
const FUTILITY_MAX_DEPTH: i32 = 8;
const SEE_QUIET_MARGIN: Value = -25;
const SEE_CAPTURE_MARGIN: Value = -200;
const QS_FUTILITY_MARGIN: Value = 154;

/// Late-move reduction table, indexed by depth and move count.
fn lmr(depth: i32, move_count: i32) -> i32 {
    static TABLE: OnceLock<[[i32; 64]; 64]> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut t = [[0i32; 64]; 64];
        for (d, row) in t.iter_mut().enumerate().skip(1) {
            for (m, cell) in row.iter_mut().enumerate().skip(1) {
                *cell = (0.75 + (d as f64).ln() * (m as f64).ln() / 2.25) as i32;
            }
        }
        t
    });
    table[depth.min(63) as usize][move_count.min(63) as usize]
}

/// Futility margin: how far below alpha the static eval may sit before
/// quiet moves at shallow depth are hopeless.
#[inline]
fn futility_margin(depth: i32, improving: bool) -> Value {
    RFP_MARGIN * (depth - i32::from(improving))
}

/// Deliberate weakening for handicap play. The RNG is seeded from the root
/// position key so a given position always weakens the same way.
struct Skill {
    level: i32,
}

impl Skill {
    fn enabled(&self) -> bool {
        self.level < 20
    }

    /// Pick among the top MultiPV lines, preferring strong moves less the
    /// lower the level is.
    fn pick(&self, worker: &Worker, lines: usize) -> Move {
        let mut rng = SmallRng::seed_from_u64(worker.board.key());
        let top = worker.root_moves[0].score;
        let delta = (top - worker.root_moves[lines - 1].score).min(PAWN_VALUE_MG);
        let weakness = 120 - 2 * self.level;

        let mut best = worker.root_moves[0].mv;
        let mut best_value = -VALUE_INFINITE;
        for rm in &worker.root_moves[..lines] {
            let push = (weakness * (top - rm.score)
                + delta * rng.gen_range(0..weakness.max(1)))
                / 128;
            if rm.score + push > best_value {
                best_value = rm.score + push;
                best = rm.mv;
            }
        }
        best
    }
}

impl Worker {
    /// True once this worker should unwind. Only the main worker samples
    /// the clock; everyone observes the shared flag.
    #[inline]
    fn stopped(&self) -> bool {
        self.shared.stopped()
    }

    /// Periodic bookkeeping done every 1024 nodes: flush the node counter
    /// and let the main worker translate elapsed time into the stop flag.
    fn tick(&mut self) {
        self.check_count += 1;
        if self.check_count < 1024 {
            return;
        }
        self.check_count = 0;
        self.shared.nodes.fetch_add(1024, Ordering::Relaxed);

        if !self.is_main() {
            return;
        }

        let shared = &self.shared;
        if shared.pondering.load(Ordering::Acquire) {
            return;
        }
        let total_nodes = shared.nodes.load(Ordering::Relaxed);
        if let Some(limit) = shared.limits.nodes {
            if total_nodes >= limit {
                shared.request_stop();
                return;
            }
        }
        if shared.time.is_managed() && shared.time.elapsed(total_nodes) >= shared.time.maximum()
        {
            shared.request_stop();
        }
    }

    // =========================================================================
    // Iterative deepening
    // =========================================================================

    /// Drive the iterations for this worker and publish the result. The
    /// main worker also handles soft time termination and info output.
    pub fn iterative_deepening(&mut self) {
        // Mate or stalemate at the root: nothing to search
        if self.root_moves.is_empty() {
            self.shared.publish(WorkerResult {
                id: self.id,
                best: None,
                depth: 0,
                nodes: 0,
            });
            return;
        }

        let max_depth = self
            .shared
            .limits
            .depth
            .unwrap_or(MAX_PLY as i32 - 1)
            .clamp(1, MAX_PLY as i32 - 1);

        let skill = Skill {
            level: self.shared.options.skill_level,
        };
        let multipv = self
            .shared
            .options
            .multipv
            .max(if skill.enabled() { 4 } else { 1 })
            .min(self.root_moves.len().max(1));

        let mut last_best = Move::null();
        let mut stability = 0u32;

        while self.root_depth < max_depth {
            self.root_depth += 1;

            // Lazy SMP: helpers skip every other depth with an id-based
            // phase so the pool probes the table at diverging depths
            if !self.is_main()
                && self.root_depth > 1
                && (self.root_depth + self.id as i32) % 2 == 0
            {
                continue;
            }

            for rm in &mut self.root_moves {
                rm.prev_score = rm.score;
            }

            for pv_index in 0..multipv {
                self.pv_index = pv_index;
                self.sel_depth = 0;

                // Aspiration window around the previous score
                let prev = self.root_moves[pv_index].prev_score;
                let mut delta = ASPIRATION_DELTA;
                let (mut alpha, mut beta) =
                    if self.root_depth >= 5 && prev.abs() < VALUE_MATE_IN_MAX_PLY {
                        (
                            (prev - delta).max(-VALUE_INFINITE),
                            (prev + delta).min(VALUE_INFINITE),
                        )
                    } else {
                        (-VALUE_INFINITE, VALUE_INFINITE)
                    };

                loop {
                    let value = self.search(self.root_depth, alpha, beta, 0, false);
                    self.root_moves[pv_index..].sort_by(|a, b| b.score.cmp(&a.score));

                    if self.stopped() {
                        break;
                    }

                    if value <= alpha {
                        // Fail low: pull beta toward the mean, widen alpha
                        beta = (alpha + beta) / 2;
                        alpha = (value - delta).max(-VALUE_INFINITE);
                        if self.is_main() {
                            self.report(pv_index, false, true);
                        }
                    } else if value >= beta {
                        beta = (value + delta).min(VALUE_INFINITE);
                        if self.is_main() {
                            self.report(pv_index, true, false);
                        }
                    } else {
                        break;
                    }

                    delta += delta / 2;
                }

                self.root_moves[..=pv_index].sort_by(|a, b| b.score.cmp(&a.score));

                if self.is_main() && !self.stopped() {
                    self.refresh_pv(pv_index);
                    self.report(pv_index, false, false);
                }
            }

            if self.stopped() {
                break;
            }
            self.completed_depth = self.root_depth;

            if !self.is_main() {
                continue;
            }

            // Stop early once a forced mate within the requested distance
            // is proven
            if let Some(mate) = self.shared.limits.mate {
                let score = self.root_moves[0].score;
                if score >= VALUE_MATE_IN_MAX_PLY && VALUE_MATE - score <= 2 * mate {
                    self.shared.request_stop();
                    break;
                }
            }

            // Soft time: stop between iterations when the target is spent
            // and the best move looks stable
            if self.root_moves[0].mv == last_best {
                stability = stability.saturating_add(1);
            } else {
                stability = 0;
                last_best = self.root_moves[0].mv;
            }

            if self.shared.time.is_managed()
                && !self.shared.pondering.load(Ordering::Acquire)
                && self.root_depth >= 4
            {
                let total_nodes =
                    self.shared.nodes.load(Ordering::Relaxed) + u64::from(self.check_count);
                let elapsed = self.shared.time.elapsed(total_nodes);
                // Instability spends up to ~1.6x the optimum
                let factor = 160 - 10 * stability.min(6) as u64;
                if elapsed * 100 >= self.shared.time.optimum() * factor {
                    self.shared.request_stop();
                    break;
                }
            }
        }

        // Keep helpers and the bestmove output consistent: the final answer
        // comes from the deepest completed iteration
        let mut best = self.root_moves.first().cloned();
        if self.is_main() && skill.enabled() && !self.root_moves.is_empty() {
            let chosen = skill.pick(self, multipv);
            if let Some(rm) = self.root_moves.iter().find(|rm| rm.mv == chosen) {
                best = Some(rm.clone());
            }
        }

        self.shared.nodes.fetch_add(u64::from(self.check_count), Ordering::Relaxed);
        self.check_count = 0;
        self.shared.publish(WorkerResult {
            id: self.id,
            best,
            depth: self.completed_depth,
            nodes: self.nodes,
        });
    }

    /// Rebuild the stored PV for a root line by walking the transposition
    /// table, verifying every move before trusting it.
    fn refresh_pv(&mut self, pv_index: usize) {
        let tt = Arc::clone(&self.shared.tt);
        let first = self.root_moves[pv_index].mv;
        let mut pv = vec![first];

        let check = self.board.gives_check(first);
        self.board.do_move(first, check);
        let mut made = 1;

        while pv.len() < self.root_depth as usize {
            let (Some(data), _) = tt.probe(self.board.key()) else {
                break;
            };
            let mv = data.mv;
            if mv == Move::null()
                || !self.board.pseudo_legal(mv)
                || !self.board.legal(mv)
                || self.board.is_draw(made)
            {
                break;
            }
            pv.push(mv);
            let check = self.board.gives_check(mv);
            self.board.do_move(mv, check);
            made += 1;
        }

        for &mv in pv.iter().rev() {
            self.board.undo_move(mv);
        }
        self.root_moves[pv_index].pv = pv;
    }

    fn report(&self, pv_index: usize, lower_bound: bool, upper_bound: bool) {
        let total_nodes =
            self.shared.nodes.load(Ordering::Relaxed) + u64::from(self.check_count);
        let time_ms = self.shared.time.elapsed(total_nodes);
        let nps = if time_ms > 0 {
            total_nodes * 1000 / time_ms
        } else {
            0
        };

        let rm = &self.root_moves[pv_index];
        let score = if rm.score == -VALUE_INFINITE {
            rm.prev_score
        } else {
            rm.score
        };
        self.shared.sink.info(&SearchInfo {
            depth: self.root_depth,
            sel_depth: self.sel_depth.max(rm.sel_depth),
            multipv: pv_index + 1,
            score,
            score_lower_bound: lower_bound,
            score_upper_bound: upper_bound,
            nodes: total_nodes,
            nps,
            hashfull: self.shared.tt.hashfull(),
            time_ms,
            pv: rm.pv.clone(),
        });
    }

    // =========================================================================
    // Main search
    // =========================================================================

    #[allow(clippy::too_many_lines)]
    fn search(
        &mut self,
        depth: i32,
        mut alpha: Value,
        mut beta: Value,
        ply: i32,
        cut_node: bool,
    ) -> Value {
        let is_root = ply == 0;
        let is_pv = beta - alpha > 1;

        if depth <= 0 {
            return self.qsearch(alpha, beta, ply, 0);
        }

        self.nodes += 1;
        self.tick();
        self.sel_depth = self.sel_depth.max(ply + 1);

        let in_check = self.board.in_check();

        if !is_root {
            // Draw detection comes before any other work
            if self.board.is_draw(ply) || self.board.insufficient_material() {
                return self.draw_value(ply);
            }
            if ply >= MAX_PLY as i32 - 1 {
                return if in_check {
                    self.draw_value(ply)
                } else {
                    evaluate(&self.board, &mut self.caches)
                };
            }

            // Mate-distance pruning: even the fastest mate cannot improve
            // a window already tighter than it
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        if self.stopped() {
            return VALUE_ZERO;
        }

        let us = self.board.side_to_move();
        let excluded = self.frame(ply).excluded_move;
        self.frame_mut(ply + 2).killers = [Move::null(); 2];

        // Transposition probe. The entry reference stays valid for the
        // whole node: the table outlives the search and is never resized
        // while workers run.
        let tt = Arc::clone(&self.shared.tt);
        let key = self.board.key();
        let (tt_data, tt_slot) = tt.probe(key);
        let tt_move = if is_root {
            self.root_moves[self.pv_index].mv
        } else {
            tt_data.map_or(Move::null(), |d| d.mv)
        };
        let tt_value = tt_data.map_or(VALUE_NONE, |d| value_from_tt(d.value, ply));

        // Cutoff on a sufficiently deep stored bound; skipped near the
        // fifty-move horizon where stored values go stale
        if let Some(data) = tt_data {
            if !is_pv
                && excluded == Move::null()
                && data.depth >= depth
                && tt_value != VALUE_NONE
                && self.board.halfmove_clock() < 90
            {
                let cuts = match data.bound {
                    Bound::Exact => true,
                    Bound::Lower => tt_value >= beta,
                    Bound::Upper => tt_value <= alpha,
                    Bound::None => false,
                };
                if cuts {
                    // Reward a quiet table move that keeps causing cutoffs
                    if tt_move != Move::null() && tt_value >= beta && tt_move.is_quiet() {
                        self.hist
                            .butterfly
                            .update(us, tt_move, stat_bonus(depth));
                    }
                    return tt_value;
                }
            }
        }

        // Static evaluation of the node
        let eval;
        if in_check {
            eval = VALUE_NONE;
        } else if let Some(data) = tt_data {
            eval = if data.eval != VALUE_NONE {
                data.eval
            } else {
                evaluate(&self.board, &mut self.caches)
            };
        } else {
            eval = evaluate(&self.board, &mut self.caches);
        }
        self.frame_mut(ply).static_eval = eval;

        let improving = !in_check && {
            let prev = self.frame(ply - 2).static_eval;
            prev == VALUE_NONE || eval > prev
        };

        // Node-level pruning, skipped in PV nodes, in check, and in
        // singular verification searches
        if !is_pv && !in_check && excluded == Move::null() {
            // Razoring: drop into quiescence when even a large swing
            // cannot reach alpha
            if depth < 2 && eval + RAZOR_MARGIN < alpha {
                return self.qsearch(alpha, beta, ply, 0);
            }

            // Reverse futility: the static eval is already a safe margin
            // above beta
            if depth <= RFP_MAX_DEPTH
                && eval - futility_margin(depth, improving) >= beta
                && eval.abs() < VALUE_MATE_IN_MAX_PLY
            {
                return eval;
            }

            // Null move: hand over the move and expect to stay above beta.
            // Never two in a row, and not in the verification subtree.
            if eval >= beta
                && self.frame(ply - 1).current_move != Move::null()
                && self.board.non_pawn_material(us) > 0
                && depth >= NULL_MIN_DEPTH
                && ply >= self.nmp_min_ply
                && beta > -VALUE_MATE_IN_MAX_PLY
            {
                let r = 3 + depth / 4 + ((eval - beta) / PAWN_VALUE_MG).min(3);
                let null_depth = (depth - r).max(0);

                self.frame_mut(ply).current_move = Move::null();
                self.frame_mut(ply).cont_key = None;
                self.board.do_null_move();
                let value = -self.search(null_depth, -beta, -beta + 1, ply + 1, false);
                self.board.undo_null_move();

                if self.stopped() {
                    return VALUE_ZERO;
                }

                if value >= beta {
                    let value = if value >= VALUE_MATE_IN_MAX_PLY {
                        beta
                    } else {
                        value
                    };

                    if depth < NULL_VERIFICATION_DEPTH || self.nmp_min_ply > 0 {
                        return value;
                    }

                    // High-depth verification: search without null moves on
                    // the upper part of this subtree
                    self.nmp_min_ply = ply + 3 * (depth - r) / 4;
                    let verified = self.search(depth - r, beta - 1, beta, ply, false);
                    self.nmp_min_ply = 0;
                    if verified >= beta {
                        return value;
                    }
                }
            }

            // ProbCut: a good capture that beats beta by a margin at
            // reduced depth will usually beat it at full depth too
            if depth >= PROBCUT_MIN_DEPTH && beta.abs() < VALUE_MATE_IN_MAX_PLY {
                let pc_beta = beta + PROBCUT_MARGIN - 40 * i32::from(improving);
                let mut picker = MovePicker::new_probcut(tt_move, pc_beta - eval);
                let cont = self.cont_keys(ply);

                while let Some(m) = picker.next(&self.board, &self.hist, &cont) {
                    if m == excluded || !self.board.legal(m) {
                        continue;
                    }
                    let gives_check = self.board.gives_check(m);
                    self.make(ply, m);
                    self.board.do_move(m, gives_check);

                    // Cheap confirmation first, then the reduced search
                    let mut value = -self.qsearch(-pc_beta, -pc_beta + 1, ply + 1, 0);
                    if value >= pc_beta {
                        value = -self.search(
                            depth - PROBCUT_MIN_DEPTH + 1,
                            -pc_beta,
                            -pc_beta + 1,
                            ply + 1,
                            !cut_node,
                        );
                    }
                    self.board.undo_move(m);
                    if self.stopped() {
                        return VALUE_ZERO;
                    }
                    if value >= pc_beta {
                        return value;
                    }
                }
            }
        }

        // Internal iterative deepening: no table move at high depth means
        // the shallow search fills one in
        let mut tt_move = tt_move;
        if depth >= IID_MIN_DEPTH && tt_move == Move::null() && excluded == Move::null() {
            self.search(depth - IID_MIN_DEPTH + 1, alpha, beta, ply, cut_node);
            if let (Some(data), _) = tt.probe(key) {
                tt_move = data.mv;
            }
        }

        // Move loop
        let killers = self.frame(ply).killers;
        let counter = self
            .frame(ply - 1)
            .cont_key
            .map_or(Move::null(), |k| self.hist.counters.get(k));
        let cont = self.cont_keys(ply);
        let mut picker = MovePicker::new(&self.board, tt_move, killers, counter);

        let mut best_value = -VALUE_INFINITE;
        let mut best_move = Move::null();
        let mut move_count = 0;
        let mut quiets_tried: Vec<Move> = Vec::with_capacity(32);
        let mut captures_tried: Vec<Move> = Vec::with_capacity(16);

        loop {
            let Some(m) = picker.next(&self.board, &self.hist, &cont) else {
                break;
            };

            if m == excluded {
                continue;
            }
            if is_root
                && !self.root_moves[self.pv_index..]
                    .iter()
                    .any(|rm| rm.mv == m)
            {
                continue;
            }
            if !self.board.legal(m) {
                continue;
            }

            move_count += 1;
            self.frame_mut(ply).move_count = move_count;

            let is_quiet = m.is_quiet();
            let gives_check = self.board.gives_check(m);

            // Shallow-depth pruning of late or hopeless moves
            if !is_root
                && best_value > -VALUE_MATE_IN_MAX_PLY
                && self.board.non_pawn_material(us) > 0
            {
                if is_quiet {
                    // Move-count pruning
                    if move_count >= (3 + depth * depth) / (2 - i32::from(improving)) {
                        picker.skip_quiet_moves();
                    }
                    // Futility at frontier depths
                    if depth <= FUTILITY_MAX_DEPTH
                        && !in_check
                        && !gives_check
                        && eval != VALUE_NONE
                        && eval + futility_margin(depth, improving) + 100 <= alpha
                    {
                        picker.skip_quiet_moves();
                        continue;
                    }
                    if depth <= FUTILITY_MAX_DEPTH
                        && !self.board.see_ge(m, SEE_QUIET_MARGIN * depth * depth)
                    {
                        continue;
                    }
                } else if depth <= FUTILITY_MAX_DEPTH
                    && !self.board.see_ge(m, SEE_CAPTURE_MARGIN * depth)
                {
                    continue;
                }
            }

            // Extensions
            let mut extension = 0;
            if !is_root
                && depth >= SINGULAR_MIN_DEPTH
                && m == tt_move
                && excluded == Move::null()
                && tt_value.abs() < VALUE_MATE_IN_MAX_PLY
            {
                if let Some(data) = tt_data {
                    if matches!(data.bound, Bound::Lower | Bound::Exact)
                        && data.depth >= depth - 3
                    {
                        // Singular extension: is every alternative clearly
                        // worse than the table move?
                        let singular_beta = tt_value - 2 * depth;
                        let singular_depth = (depth - 1) / 2;

                        self.frame_mut(ply).excluded_move = m;
                        let value = self.search(
                            singular_depth,
                            singular_beta - 1,
                            singular_beta,
                            ply,
                            cut_node,
                        );
                        self.frame_mut(ply).excluded_move = Move::null();

                        if value < singular_beta {
                            extension = 1;
                        } else if singular_beta >= beta {
                            // Multi-cut: two moves beat beta already
                            return singular_beta;
                        }
                    }
                }
            } else if gives_check
                && self.frame(ply).extensions < MAX_CHECK_EXTENSIONS
                && self.board.see_ge(m, 0)
            {
                extension = 1;
            }

            if is_quiet && quiets_tried.len() < 32 {
                quiets_tried.push(m);
            } else if !is_quiet && captures_tried.len() < 16 {
                captures_tried.push(m);
            }

            let parent_extensions = self.frame(ply).extensions;
            self.make(ply, m);
            self.board.do_move(m, gives_check);
            self.frame_mut(ply + 1).extensions = parent_extensions + extension;

            let new_depth = depth - 1 + extension;
            let mut value = VALUE_ZERO;
            let mut needs_full = !is_pv || move_count > 1;

            // Late-move reductions for quiet, non-checking moves ordered
            // late in the list
            if depth >= 3
                && move_count > 1 + i32::from(is_root)
                && is_quiet
                && !in_check
                && !gives_check
            {
                let mut r = lmr(depth, move_count);
                if is_pv {
                    r -= 1;
                }
                if !improving {
                    r += 1;
                }
                if cut_node {
                    r += 1;
                }
                let reduced = (new_depth - r.max(0)).clamp(1, new_depth);
                if reduced < new_depth {
                    value = -self.search(reduced, -alpha - 1, -alpha, ply + 1, true);
                    needs_full = value > alpha;
                }
            }

            if needs_full {
                value = -self.search(new_depth, -alpha - 1, -alpha, ply + 1, !cut_node);
            }

            // Full window for the first PV move and for PV re-searches
            if is_pv && (move_count == 1 || (value > alpha && (is_root || value < beta))) {
                value = -self.search(new_depth, -beta, -alpha, ply + 1, false);
            }

            self.board.undo_move(m);

            if self.stopped() {
                return VALUE_ZERO;
            }

            if is_root {
                let rm = self
                    .root_moves
                    .iter_mut()
                    .find(|rm| rm.mv == m)
                    .expect("searched root move is registered");
                if move_count == 1 || value > alpha {
                    rm.score = value;
                    rm.sel_depth = self.sel_depth;
                } else {
                    // Unsearched-window scores are meaningless for sorting
                    rm.score = -VALUE_INFINITE;
                }
            }

            if value > best_value {
                best_value = value;
                if value > alpha {
                    best_move = m;
                    if value >= beta {
                        self.update_stats(ply, depth, m, &quiets_tried, &captures_tried);
                        break;
                    }
                    alpha = value;
                }
            }
        }

        if move_count == 0 {
            // Excluded-move searches report failure rather than mate
            return if excluded != Move::null() {
                alpha
            } else if in_check {
                mated_in(ply)
            } else {
                self.draw_value(ply)
            };
        }

        if excluded == Move::null() && !(is_root && self.pv_index > 0) {
            let bound = if best_value >= beta {
                Bound::Lower
            } else if is_pv && best_move != Move::null() {
                Bound::Exact
            } else {
                Bound::Upper
            };
            tt.store(
                tt_slot,
                key,
                best_move,
                value_to_tt(best_value, ply),
                self.frame(ply).static_eval,
                depth,
                bound,
            );
        }

        best_value
    }

    /// Record the move about to be made in this ply's frame.
    #[inline]
    fn make(&mut self, ply: i32, m: Move) {
        let piece = self.moved_piece(m);
        let frame = self.frame_mut(ply);
        frame.current_move = m;
        frame.cont_key = Some(piece_to_key(piece, m.to()));
    }

    /// Ordering statistics on a beta cutoff: killers, counter move,
    /// butterfly and continuation bonuses, penalties for the quiet moves
    /// that failed to cut.
    fn update_stats(
        &mut self,
        ply: i32,
        depth: i32,
        best: Move,
        quiets_tried: &[Move],
        captures_tried: &[Move],
    ) {
        let us = self.board.side_to_move();
        let bonus = stat_bonus(depth);

        if best.is_quiet() {
            let frame = self.frame_mut(ply);
            if frame.killers[0] != best {
                frame.killers[1] = frame.killers[0];
                frame.killers[0] = best;
            }

            let piece = self.moved_piece(best);
            self.hist.butterfly.update(us, best, bonus);
            for key in self.cont_keys(ply).into_iter().flatten() {
                self.hist.continuation.update(key, piece, best.to(), bonus);
            }
            if let Some(prev) = self.frame(ply - 1).cont_key {
                self.hist.counters.set(prev, best);
            }

            for &m in quiets_tried.iter().filter(|&&m| m != best) {
                let piece = self.moved_piece(m);
                self.hist.butterfly.update(us, m, -bonus);
                for key in self.cont_keys(ply).into_iter().flatten() {
                    self.hist.continuation.update(key, piece, m.to(), -bonus);
                }
            }
        } else {
            let piece = self.moved_piece(best);
            let victim = if best.is_en_passant() {
                Piece::Pawn
            } else {
                self.board.piece_on(best.to()).unwrap_or(Piece::Pawn)
            };
            self.hist.capture.update(piece, best.to(), victim, bonus);
        }

        for &m in captures_tried.iter().filter(|&&m| m != best) {
            let piece = self.moved_piece(m);
            let victim = if m.is_en_passant() {
                Piece::Pawn
            } else {
                self.board.piece_on(m.to()).unwrap_or(Piece::Pawn)
            };
            self.hist.capture.update(piece, m.to(), victim, -bonus);
        }
    }

    // =========================================================================
    // Quiescence
    // =========================================================================

    fn qsearch(&mut self, mut alpha: Value, beta: Value, ply: i32, qs_depth: i32) -> Value {
        let is_pv = beta - alpha > 1;

        self.nodes += 1;
        self.tick();
        self.sel_depth = self.sel_depth.max(ply + 1);

        if self.board.is_draw(ply) || self.board.insufficient_material() {
            return self.draw_value(ply);
        }
        if ply >= MAX_PLY as i32 - 1 {
            return if self.board.in_check() {
                self.draw_value(ply)
            } else {
                evaluate(&self.board, &mut self.caches)
            };
        }
        if self.stopped() {
            return VALUE_ZERO;
        }

        let in_check = self.board.in_check();
        let tt_depth = if in_check || qs_depth >= 0 { 0 } else { -1 };

        let tt = Arc::clone(&self.shared.tt);
        let key = self.board.key();
        let (tt_data, tt_slot) = tt.probe(key);
        let tt_move = tt_data.map_or(Move::null(), |d| d.mv);

        if let Some(data) = tt_data {
            let tt_value = value_from_tt(data.value, ply);
            if !is_pv && data.depth >= tt_depth && tt_value != VALUE_NONE {
                let cuts = match data.bound {
                    Bound::Exact => true,
                    Bound::Lower => tt_value >= beta,
                    Bound::Upper => tt_value <= alpha,
                    Bound::None => false,
                };
                if cuts {
                    return tt_value;
                }
            }
        }

        let mut best_value;
        let mut futility_base = -VALUE_INFINITE;

        if in_check {
            best_value = -VALUE_INFINITE;
            self.frame_mut(ply).static_eval = VALUE_NONE;
        } else {
            // Stand pat on the static evaluation
            let stand_pat = match tt_data {
                Some(data) if data.eval != VALUE_NONE => data.eval,
                _ => evaluate(&self.board, &mut self.caches),
            };
            self.frame_mut(ply).static_eval = stand_pat;

            if stand_pat >= beta {
                if tt_data.is_none() {
                    tt.store(
                        tt_slot,
                        key,
                        Move::null(),
                        value_to_tt(stand_pat, ply),
                        stand_pat,
                        tt_depth,
                        Bound::Lower,
                    );
                }
                return stand_pat;
            }
            if stand_pat > alpha {
                alpha = stand_pat;
            }
            best_value = stand_pat;
            futility_base = stand_pat + QS_FUTILITY_MARGIN;
        }

        let cont = self.cont_keys(ply);
        let mut picker = MovePicker::new_qsearch(&self.board, tt_move, qs_depth);
        let mut best_move = Move::null();
        let mut move_count = 0;

        loop {
            let Some(m) = picker.next(&self.board, &self.hist, &cont) else {
                break;
            };
            if !self.board.legal(m) {
                continue;
            }
            move_count += 1;

            let gives_check = self.board.gives_check(m);

            if !in_check && best_value > -VALUE_MATE_IN_MAX_PLY && !gives_check {
                // Delta pruning: even winning the piece plus a margin
                // cannot lift alpha
                if m.is_capture() && !m.is_promotion() {
                    let victim = if m.is_en_passant() {
                        Piece::Pawn
                    } else {
                        self.board.piece_on(m.to()).unwrap_or(Piece::Pawn)
                    };
                    if futility_base + crate::board::see_value(victim) <= alpha {
                        best_value = best_value.max(
                            futility_base + crate::board::see_value(victim),
                        );
                        continue;
                    }
                }
                // Losing exchanges are not worth chasing in quiescence
                if !self.board.see_ge(m, 0) {
                    continue;
                }
            }

            self.make(ply, m);
            self.board.do_move(m, gives_check);
            let value = -self.qsearch(-beta, -alpha, ply + 1, qs_depth - 1);
            self.board.undo_move(m);

            if self.stopped() {
                return VALUE_ZERO;
            }

            if value > best_value {
                best_value = value;
                if value > alpha {
                    best_move = m;
                    if value >= beta {
                        break;
                    }
                    alpha = value;
                }
            }
        }

        // Checkmate: evasions exist only while legal replies do
        if in_check && move_count == 0 {
            return mated_in(ply);
        }

        let bound = if best_value >= beta {
            Bound::Lower
        } else {
            Bound::Upper
        };
        tt.store(
            tt_slot,
            key,
            best_move,
            value_to_tt(best_value, ply),
            self.frame(ply).static_eval,
            tt_depth,
            bound,
        );

        best_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::search::time::TimeManager;
    use crate::search::{InfoSink, SearchLimits, SearchOptions, SharedSearch};
    use crate::tt::TranspositionTable;

    struct NullSink;
    impl InfoSink for NullSink {
        fn info(&self, _info: &SearchInfo) {}
        fn bestmove(&self, _best: Move, _ponder: Option<Move>) {}
    }

    fn search_position(fen: &str, depth: i32) -> (Option<Move>, Value) {
        let board = Board::from_fen(fen);
        let (tt, _) = TranspositionTable::new(16);
        let limits = SearchLimits {
            depth: Some(depth),
            ..Default::default()
        };
        let shared = Arc::new(SharedSearch::new(
            Arc::new(tt),
            limits,
            SearchOptions::default(),
            TimeManager::default(),
            Arc::new(NullSink),
            1,
        ));
        let mut worker = Worker::new(0, board, shared);
        worker.iterative_deepening();
        let best = worker.root_moves.first();
        (best.map(|rm| rm.mv), best.map_or(0, |rm| rm.score))
    }

    #[test]
    fn test_finds_mate_in_one() {
        let (best, score) = search_position("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 4);
        assert_eq!(best.unwrap().to_string(), "a1a8");
        assert_eq!(score, mate_in(1));
    }

    #[test]
    fn test_finds_back_rank_defense() {
        // Black must make luft or defend the back rank
        let (best, _) = search_position("r5k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 5);
        assert!(best.is_some());
    }

    #[test]
    fn test_captures_hanging_queen() {
        let (best, score) = search_position("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1", 5);
        assert_eq!(best.unwrap().to_string(), "e4d5");
        assert!(score > 700);
    }

    #[test]
    fn test_stalemate_is_draw() {
        // Black to move has no moves and is not in check
        let (best, score) = search_position("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3);
        assert!(best.is_none());
        assert_eq!(score, 0);
    }

    #[test]
    fn test_startpos_legal_best_move() {
        let (best, score) = search_position(Board::startpos_fen(), 4);
        let board = Board::new();
        let best = best.unwrap();
        assert!(board.legal_moves().contains(best));
        assert!(score.abs() < 100, "startpos score {score} implausible");
    }

    #[test]
    fn test_avoids_losing_the_pawn() {
        // From the KPK education position, pushing or protecting the pawn
        // must be preferred over dropping it
        let (best, score) = search_position("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", 6);
        assert!(score > 0, "white is better with the extra pawn");
        let best = best.unwrap().to_string();
        assert!(
            ["e2e4", "e2e3", "e1d2", "e1e2", "e1f2", "e1d1", "e1f1"].contains(&best.as_str()),
            "unexpected move {best}"
        );
    }
}
