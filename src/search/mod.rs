//! Search: iterative-deepening alpha-beta on a pool of worker threads.
//!
//! One worker per thread; each holds its own search stack, history tables
//! and evaluation caches, and a private copy of the root position. The
//! transposition table is the only shared cache (lock-free), and a single
//! atomic stop flag cancels every worker. Helper workers run staggered
//! depth schedules (Lazy SMP) and cooperate purely through the table.

pub mod alphabeta;
pub mod history;
pub mod picker;
pub mod smp;
pub mod time;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::board::score::{Value, VALUE_NONE, VALUE_ZERO};
use crate::board::{Board, Move, Piece, MAX_PLY};
use crate::eval::EvalCaches;
use crate::tt::TranspositionTable;

use history::{Histories, PieceToKey};
use time::TimeManager;

/// Search limits from the `go` command.
#[derive(Clone, Debug, Default)]
pub struct SearchLimits {
    pub depth: Option<i32>,
    pub movetime: Option<u64>,
    pub nodes: Option<u64>,
    pub mate: Option<i32>,
    pub infinite: bool,
    pub ponder: bool,
    /// Remaining clock per color, milliseconds
    pub time: [Option<u64>; 2],
    /// Increment per color, milliseconds
    pub inc: [u64; 2],
    pub movestogo: Option<u32>,
    /// Restrict the root to these moves (UCI `searchmoves`)
    pub searchmoves: Vec<Move>,
}

impl SearchLimits {
    /// True when the clock drives termination (as opposed to fixed depth,
    /// node count or movetime).
    #[must_use]
    pub fn use_time_management(&self) -> bool {
        self.time.iter().any(Option::is_some)
    }
}

/// Engine options that shape the search, set over UCI.
#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub threads: usize,
    pub multipv: usize,
    pub contempt: Value,
    pub skill_level: i32,
    pub move_overhead: u64,
    pub slow_mover: u64,
    /// "Nodes as time" ratio: nodes per reported millisecond (0 = off)
    pub nodes_time: u64,
    pub chess960: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            threads: 1,
            multipv: 1,
            contempt: 0,
            skill_level: 20,
            move_overhead: 10,
            slow_mover: 100,
            nodes_time: 0,
            chess960: false,
        }
    }
}

/// One root move with its running score and principal variation.
#[derive(Clone, Debug)]
pub struct RootMove {
    pub mv: Move,
    pub score: Value,
    pub prev_score: Value,
    pub sel_depth: i32,
    pub pv: Vec<Move>,
}

impl RootMove {
    fn new(mv: Move) -> Self {
        RootMove {
            mv,
            score: -crate::board::score::VALUE_INFINITE,
            prev_score: -crate::board::score::VALUE_INFINITE,
            sel_depth: 0,
            pv: vec![mv],
        }
    }
}

/// A completed worker's contribution, used to pick the final best move.
#[derive(Clone, Debug)]
pub struct WorkerResult {
    pub id: usize,
    pub best: Option<RootMove>,
    pub depth: i32,
    pub nodes: u64,
}

/// One line of search progress, handed to the front end for printing.
#[derive(Clone, Debug)]
pub struct SearchInfo {
    pub depth: i32,
    pub sel_depth: i32,
    pub multipv: usize,
    pub score: Value,
    pub score_lower_bound: bool,
    pub score_upper_bound: bool,
    pub nodes: u64,
    pub nps: u64,
    pub hashfull: u32,
    pub time_ms: u64,
    pub pv: Vec<Move>,
}

/// Sink for search output: periodic info lines and the final best move.
pub trait InfoSink: Send + Sync {
    fn info(&self, info: &SearchInfo);
    fn bestmove(&self, best: Move, ponder: Option<Move>);
}

/// State shared by every worker of one `go` invocation.
pub struct SharedSearch {
    pub tt: Arc<TranspositionTable>,
    pub stop: AtomicBool,
    /// While pondering, time-based termination is suspended
    pub pondering: AtomicBool,
    pub nodes: AtomicU64,
    pub limits: SearchLimits,
    pub options: SearchOptions,
    pub time: TimeManager,
    pub sink: Arc<dyn InfoSink>,
    results: Mutex<Vec<WorkerResult>>,
    running: Mutex<usize>,
    all_done: Condvar,
}

impl SharedSearch {
    #[must_use]
    pub fn new(
        tt: Arc<TranspositionTable>,
        limits: SearchLimits,
        options: SearchOptions,
        time: TimeManager,
        sink: Arc<dyn InfoSink>,
        workers: usize,
    ) -> Self {
        let pondering = limits.ponder;
        SharedSearch {
            tt,
            stop: AtomicBool::new(false),
            pondering: AtomicBool::new(pondering),
            nodes: AtomicU64::new(0),
            limits,
            options,
            time,
            sink,
            results: Mutex::new(Vec::with_capacity(workers)),
            running: Mutex::new(workers),
            all_done: Condvar::new(),
        }
    }

    #[inline]
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// UCI `ponderhit`: the predicted move was played, the clock is ours.
    pub fn ponderhit(&self) {
        self.pondering.store(false, Ordering::Release);
    }

    pub(crate) fn publish(&self, result: WorkerResult) {
        self.results.lock().push(result);
        let mut running = self.running.lock();
        *running -= 1;
        if *running == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until every worker has published its result.
    pub(crate) fn wait_helpers(&self) {
        let mut running = self.running.lock();
        while *running > 0 {
            self.all_done.wait(&mut running);
        }
    }

    pub(crate) fn results(&self) -> Vec<WorkerResult> {
        self.results.lock().clone()
    }
}

/// Per-ply search stack frame.
#[derive(Clone, Debug)]
pub struct Stack {
    pub killers: [Move; 2],
    pub current_move: Move,
    pub excluded_move: Move,
    pub static_eval: Value,
    pub move_count: i32,
    /// (piece, to) of the move made at this ply, for continuation history
    pub cont_key: Option<PieceToKey>,
    /// Plies of extension spent on this path, to bound check extensions
    pub extensions: i32,
}

impl Default for Stack {
    fn default() -> Self {
        Stack {
            killers: [Move::null(); 2],
            current_move: Move::null(),
            excluded_move: Move::null(),
            static_eval: VALUE_NONE,
            move_count: 0,
            cont_key: None,
            extensions: 0,
        }
    }
}

/// Extra headroom beyond `MAX_PLY` so lookbacks of up to 4 plies never
/// underflow.
pub(crate) const STACK_OFFSET: usize = 4;
pub(crate) const STACK_LEN: usize = MAX_PLY + STACK_OFFSET + 2;

/// One search worker: thread-local state plus a private root position.
pub struct Worker {
    pub id: usize,
    pub board: Board,
    pub root_moves: Vec<RootMove>,
    pub stack: Vec<Stack>,
    pub hist: Histories,
    pub caches: EvalCaches,
    pub nodes: u64,
    pub sel_depth: i32,
    pub root_depth: i32,
    pub completed_depth: i32,
    /// First PV line currently being searched (MultiPV index)
    pub pv_index: usize,
    /// Null-move verification is disabled below this ply
    pub nmp_min_ply: i32,
    pub shared: Arc<SharedSearch>,
    /// Counter for periodic time checks on the main worker
    pub(crate) check_count: u32,
}

impl Worker {
    #[must_use]
    pub fn new(id: usize, board: Board, shared: Arc<SharedSearch>) -> Self {
        let mut root_moves: Vec<RootMove> = board
            .legal_moves()
            .iter()
            .filter(|&m| {
                shared.limits.searchmoves.is_empty() || shared.limits.searchmoves.contains(m)
            })
            .map(|&m| RootMove::new(m))
            .collect();
        root_moves.shrink_to_fit();

        Worker {
            id,
            board,
            root_moves,
            stack: vec![Stack::default(); STACK_LEN],
            hist: Histories::new(),
            caches: EvalCaches::new(),
            nodes: 0,
            sel_depth: 0,
            root_depth: 0,
            completed_depth: 0,
            pv_index: 0,
            nmp_min_ply: 0,
            shared,
            check_count: 0,
        }
    }

    /// Reuse the worker for a new search with fresh per-search state; the
    /// histories and caches persist between searches on purpose.
    pub fn prepare(&mut self, board: Board, shared: Arc<SharedSearch>) {
        *self = Worker {
            hist: std::mem::take(&mut self.hist),
            caches: std::mem::replace(&mut self.caches, EvalCaches::new()),
            ..Worker::new(self.id, board, shared)
        };
    }

    #[inline]
    pub(crate) fn is_main(&self) -> bool {
        self.id == 0
    }

    /// Draw score from the side to move's perspective, honoring contempt:
    /// the engine (the root side on even plies) dislikes draws when
    /// contempt is positive.
    #[inline]
    pub(crate) fn draw_value(&self, ply: i32) -> Value {
        let contempt = self.shared.options.contempt;
        if ply % 2 == 0 {
            VALUE_ZERO - contempt
        } else {
            VALUE_ZERO + contempt
        }
    }

    /// Continuation-history keys for the moves 1, 2 and 4 plies back.
    #[inline]
    pub(crate) fn cont_keys(&self, ply: i32) -> picker::ContKeys {
        let at = |back: i32| -> Option<PieceToKey> {
            let idx = STACK_OFFSET as i32 + ply - back;
            self.stack[idx as usize].cont_key
        };
        [at(1), at(2), at(4)]
    }

    #[inline]
    pub(crate) fn frame(&self, ply: i32) -> &Stack {
        &self.stack[(STACK_OFFSET as i32 + ply) as usize]
    }

    #[inline]
    pub(crate) fn frame_mut(&mut self, ply: i32) -> &mut Stack {
        &mut self.stack[(STACK_OFFSET as i32 + ply) as usize]
    }

    /// The piece that makes move `m` in the current position.
    #[inline]
    pub(crate) fn moved_piece(&self, m: Move) -> Piece {
        self.board.piece_on(m.from()).expect("move origin occupied")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;
    impl InfoSink for NullSink {
        fn info(&self, _info: &SearchInfo) {}
        fn bestmove(&self, _best: Move, _ponder: Option<Move>) {}
    }

    fn make_shared(limits: SearchLimits) -> Arc<SharedSearch> {
        let (tt, _) = TranspositionTable::new(1);
        Arc::new(SharedSearch::new(
            Arc::new(tt),
            limits,
            SearchOptions::default(),
            TimeManager::default(),
            Arc::new(NullSink),
            1,
        ))
    }

    #[test]
    fn test_root_moves_from_position() {
        let shared = make_shared(SearchLimits::default());
        let worker = Worker::new(0, Board::new(), shared);
        assert_eq!(worker.root_moves.len(), 20);
    }

    #[test]
    fn test_searchmoves_restriction() {
        let board = Board::new();
        let only = board.parse_move("e2e4").unwrap();
        let limits = SearchLimits {
            searchmoves: vec![only],
            ..Default::default()
        };
        let shared = make_shared(limits);
        let worker = Worker::new(0, board, shared);
        assert_eq!(worker.root_moves.len(), 1);
        assert_eq!(worker.root_moves[0].mv, only);
    }

    #[test]
    fn test_draw_value_contempt_sign() {
        let (tt, _) = TranspositionTable::new(1);
        let options = SearchOptions {
            contempt: 20,
            ..Default::default()
        };
        let shared = Arc::new(SharedSearch::new(
            Arc::new(tt),
            SearchLimits::default(),
            options,
            TimeManager::default(),
            Arc::new(NullSink),
            1,
        ));
        let worker = Worker::new(0, Board::new(), shared);
        // The engine's own draws look worse, the opponent's better
        assert_eq!(worker.draw_value(0), -20);
        assert_eq!(worker.draw_value(1), 20);
    }

    #[test]
    fn test_publish_and_wait() {
        let shared = make_shared(SearchLimits::default());
        shared.publish(WorkerResult {
            id: 0,
            best: None,
            depth: 1,
            nodes: 42,
        });
        shared.wait_helpers();
        assert_eq!(shared.results().len(), 1);
    }
}
