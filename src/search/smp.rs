//! Worker pool for Lazy SMP search.
//!
//! A fixed set of OS threads created at startup (resized via the Threads
//! option). Workers idle on a condition variable between searches; `go`
//! hands every worker a private copy of the root position and wakes them.
//! Workers cooperate only through the shared transposition table and the
//! stop flag. The main worker (id 0) owns time management and, once every
//! helper has finished, aggregates the best line and emits `bestmove`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::board::{Board, Move};
use crate::tt::TranspositionTable;

use super::time::TimeManager;
use super::{InfoSink, SearchInfo, SearchLimits, SearchOptions, SharedSearch, Worker};

/// Stack size for search threads; the recursion is bounded by MAX_PLY but
/// each frame is large.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

enum Command {
    Search {
        board: Box<Board>,
        shared: Arc<SharedSearch>,
    },
    ClearState,
    Quit,
}

struct Slot {
    command: Mutex<Option<Command>>,
    wake: Condvar,
}

struct WorkerHandle {
    slot: Arc<Slot>,
    thread: Option<JoinHandle<()>>,
}

/// The engine's thread pool.
pub struct ThreadPool {
    workers: Vec<WorkerHandle>,
    tt: Arc<TranspositionTable>,
    current: Option<Arc<SharedSearch>>,
}

impl ThreadPool {
    /// Create a pool with `threads` workers and a `hash_mb` transposition
    /// table. Returns the pool and the hash size actually allocated.
    #[must_use]
    pub fn new(threads: usize, hash_mb: usize) -> (Self, usize) {
        let (tt, actual_mb) = TranspositionTable::new(hash_mb);
        let mut pool = ThreadPool {
            workers: Vec::new(),
            tt: Arc::new(tt),
            current: None,
        };
        pool.set_threads(threads);
        (pool, actual_mb)
    }

    /// Resize the pool. Must not be called while a search runs.
    pub fn set_threads(&mut self, threads: usize) {
        let threads = threads.max(1);
        self.shutdown_workers();

        for id in 0..threads {
            let slot = Arc::new(Slot {
                command: Mutex::new(None),
                wake: Condvar::new(),
            });
            let thread_slot = Arc::clone(&slot);
            let thread = std::thread::Builder::new()
                .name(format!("sable-worker-{id}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || worker_loop(id, &thread_slot))
                .expect("failed to spawn search worker");
            self.workers.push(WorkerHandle {
                slot,
                thread: Some(thread),
            });
        }
    }

    /// Replace the transposition table (UCI Hash option). Must not be
    /// called while a search runs. Returns the size actually allocated.
    pub fn set_hash(&mut self, hash_mb: usize) -> usize {
        let (tt, actual_mb) = TranspositionTable::new(hash_mb);
        self.tt = Arc::new(tt);
        actual_mb
    }

    /// Access the shared table (for persistence and tests).
    #[must_use]
    pub fn tt(&self) -> &Arc<TranspositionTable> {
        &self.tt
    }

    /// Clear the table and every worker's history state (`ucinewgame`).
    pub fn clear(&mut self) {
        self.wait_for_search();
        self.tt.clear();
        for worker in &self.workers {
            let mut cmd = worker.slot.command.lock();
            *cmd = Some(Command::ClearState);
            worker.slot.wake.notify_one();
        }
    }

    /// Launch a search on every worker. Returns immediately; `bestmove`
    /// arrives through the sink when the search ends.
    pub fn start_search(
        &mut self,
        board: &Board,
        limits: SearchLimits,
        options: SearchOptions,
        sink: Arc<dyn InfoSink>,
    ) {
        self.wait_for_search();

        // A position without moves is answered immediately
        if board.legal_moves().is_empty() {
            let score = if board.in_check() {
                crate::board::score::mated_in(0)
            } else {
                0
            };
            sink.info(&SearchInfo {
                depth: 0,
                sel_depth: 0,
                multipv: 1,
                score,
                score_lower_bound: false,
                score_upper_bound: false,
                nodes: 0,
                nps: 0,
                hashfull: 0,
                time_ms: 0,
                pv: Vec::new(),
            });
            sink.bestmove(Move::null(), None);
            return;
        }

        self.tt.new_search();
        #[cfg(feature = "logging")]
        log::debug!("search started: {}", board.to_fen());

        let us = board.side_to_move();
        let time = TimeManager::initialize(
            &limits,
            us,
            board.game_ply(),
            options.move_overhead,
            options.slow_mover,
            options.nodes_time,
        );

        let shared = Arc::new(SharedSearch::new(
            Arc::clone(&self.tt),
            limits,
            options,
            time,
            sink,
            self.workers.len(),
        ));
        self.current = Some(Arc::clone(&shared));

        for worker in &self.workers {
            let mut cmd = worker.slot.command.lock();
            *cmd = Some(Command::Search {
                board: Box::new(board.clone()),
                shared: Arc::clone(&shared),
            });
            worker.slot.wake.notify_one();
        }
    }

    /// Signal the running search (if any) to stop.
    pub fn stop(&self) {
        if let Some(shared) = &self.current {
            shared.request_stop();
        }
    }

    /// UCI `ponderhit`: switch the running search onto our own clock.
    pub fn ponderhit(&self) {
        if let Some(shared) = &self.current {
            shared.ponderhit();
        }
    }

    /// Block until the current search has fully finished.
    pub fn wait_for_search(&mut self) {
        if let Some(shared) = self.current.take() {
            shared.wait_helpers();
        }
    }

    fn shutdown_workers(&mut self) {
        for worker in &self.workers {
            let mut cmd = worker.slot.command.lock();
            *cmd = Some(Command::Quit);
            worker.slot.wake.notify_one();
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
        self.workers.clear();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait_for_search();
        self.shutdown_workers();
    }
}

/// Thread body: wait for a command, run it, go back to sleep. Histories
/// and evaluation caches live here and persist between searches.
fn worker_loop(id: usize, slot: &Slot) {
    let mut state: Option<Worker> = None;

    loop {
        let command = {
            let mut cmd = slot.command.lock();
            while cmd.is_none() {
                slot.wake.wait(&mut cmd);
            }
            cmd.take().expect("guarded by the wait loop")
        };

        match command {
            Command::Quit => return,
            Command::ClearState => {
                if let Some(worker) = &mut state {
                    worker.hist.clear();
                }
            }
            Command::Search { board, shared } => {
                match state.as_mut() {
                    Some(worker) => worker.prepare(*board, Arc::clone(&shared)),
                    None => state = Some(Worker::new(id, *board, Arc::clone(&shared))),
                }
                let worker = state.as_mut().expect("worker exists after dispatch");

                worker.iterative_deepening();

                if worker.is_main() {
                    finalize(worker, &shared);
                }
            }
        }
    }
}

/// Main-worker epilogue: wait out ponder/infinite mode, stop the helpers,
/// aggregate their results and emit `bestmove`.
fn finalize(worker: &mut Worker, shared: &SharedSearch) {
    // In infinite or ponder mode the protocol forbids moving before the
    // GUI says stop (or ponderhit flips us onto the clock)
    while !shared.stopped()
        && (shared.limits.infinite || shared.pondering.load(Ordering::Acquire))
    {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    shared.request_stop();

    // Wait for the helpers; the main worker has already published
    {
        let mut running = shared.running.lock();
        while *running > 0 {
            shared.all_done.wait(&mut running);
        }
    }

    // Aggregate across workers: start from the main worker's answer, let a
    // helper override only with a deeper iteration and a better score (or
    // a shorter proven mate)
    let results = shared.results();
    let mut best: Option<super::RootMove> = None;
    let mut best_depth = 0;
    for result in results.iter().filter(|r| r.id == 0) {
        best = result.best.clone();
        best_depth = result.depth;
    }
    for result in results.iter().filter(|r| r.id != 0) {
        let Some(candidate) = &result.best else {
            continue;
        };
        let better = match &best {
            None => true,
            Some(current) => {
                candidate.score > current.score
                    && (result.depth >= best_depth
                        || candidate.score >= crate::board::score::VALUE_MATE_IN_MAX_PLY)
            }
        };
        if better {
            best_depth = result.depth;
            best = Some(candidate.clone());
        }
    }

    #[cfg(feature = "logging")]
    log::debug!(
        "search finished at depth {} with {} nodes",
        best_depth,
        shared.nodes.load(Ordering::Relaxed)
    );

    match best {
        Some(rm) => {
            let ponder = rm.pv.get(1).copied().or_else(|| {
                // Try completing the line from the table
                ponder_from_tt(worker, shared, rm.mv)
            });
            shared.sink.bestmove(rm.mv, ponder);
        }
        None => shared.sink.bestmove(Move::null(), None),
    }
}

/// After the best move, ask the table what we expect the opponent to play.
fn ponder_from_tt(worker: &mut Worker, shared: &SharedSearch, best: Move) -> Option<Move> {
    let check = worker.board.gives_check(best);
    worker.board.do_move(best, check);
    let reply = shared
        .tt
        .probe(worker.board.key())
        .0
        .map(|data| data.mv)
        .filter(|&mv| {
            mv != Move::null() && worker.board.pseudo_legal(mv) && worker.board.legal(mv)
        });
    worker.board.undo_move(best);
    reply
}
