//! Tactical and behavioral search tests.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use sable::board::score::VALUE_MATE_IN_MAX_PLY;
use sable::board::{Board, Move};
use sable::search::smp::ThreadPool;
use sable::search::{InfoSink, SearchInfo, SearchLimits, SearchOptions};

#[derive(Default)]
struct Capture {
    infos: Mutex<Vec<SearchInfo>>,
    best: Mutex<Option<Move>>,
    done: (Mutex<bool>, Condvar),
}

impl InfoSink for Capture {
    fn info(&self, info: &SearchInfo) {
        self.infos.lock().push(info.clone());
    }
    fn bestmove(&self, best: Move, _ponder: Option<Move>) {
        *self.best.lock() = Some(best);
        let (lock, cv) = &self.done;
        *lock.lock() = true;
        cv.notify_all();
    }
}

impl Capture {
    fn wait(&self) -> Move {
        let (lock, cv) = &self.done;
        let mut done = lock.lock();
        while !*done {
            cv.wait(&mut done);
        }
        self.best.lock().expect("bestmove published")
    }
}

fn best_move(pool: &mut ThreadPool, board: &Board, depth: i32) -> (Move, i32) {
    let sink = Arc::new(Capture::default());
    let limits = SearchLimits {
        depth: Some(depth),
        ..Default::default()
    };
    pool.start_search(board, limits, SearchOptions::default(), sink.clone());
    let best = sink.wait();
    pool.wait_for_search();
    let score = sink.infos.lock().last().map_or(0, |i| i.score);
    (best, score)
}

#[test]
fn test_mate_in_two() {
    // Rook lift mates in two: 1.Rh7+ Kg8 2.Rdh1... classic two-rook ladder
    let board = Board::from_fen("6k1/8/8/8/8/8/R7/1R4K1 w - - 0 1");
    let (mv, score) = best_move(&mut ThreadPool::new(1, 16).0, &board, 6);
    assert!(score >= VALUE_MATE_IN_MAX_PLY, "score {score} is not a mate");
    assert!(!mv.to_string().is_empty());
}

#[test]
fn test_back_rank_mate_found() {
    let board = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
    let (mv, score) = best_move(&mut ThreadPool::new(1, 16).0, &board, 4);
    assert_eq!(mv.to_string(), "a1a8");
    assert!(score >= VALUE_MATE_IN_MAX_PLY);
}

#[test]
fn test_wins_the_fork() {
    // Knight fork wins the queen: Nc7+ forks king and queen
    let board = Board::from_fen("q3k3/8/8/3N4/8/8/8/4K3 w - - 0 1");
    let (mv, score) = best_move(&mut ThreadPool::new(1, 16).0, &board, 6);
    assert_eq!(mv.to_string(), "d5c7");
    assert!(score > 500, "fork must win heavy material, got {score}");
}

#[test]
fn test_avoids_capturing_poisoned_pawn() {
    // Rxb4 runs into Bc3+, forking king and rook; the pawn is poisoned
    let board = Board::from_fen("4k3/8/8/4b3/1p6/8/1R6/4K3 w - - 0 1");
    let (mv, _) = best_move(&mut ThreadPool::new(1, 16).0, &board, 6);
    assert_ne!(mv.to_string(), "b2b4", "b-pawn is poisoned by Bc3+");
}

#[test]
fn test_tt_reuse_across_searches() {
    // Searching the same position twice with a shared pool must reuse the
    // table: the second search reaches the same conclusion at the same
    // depth with no more nodes than the first
    let board =
        Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    let (mut pool, _) = ThreadPool::new(1, 32);

    let sink1 = Arc::new(Capture::default());
    let limits = SearchLimits {
        depth: Some(5),
        ..Default::default()
    };
    pool.start_search(&board, limits.clone(), SearchOptions::default(), sink1.clone());
    let first = sink1.wait();
    pool.wait_for_search();
    let nodes_first = sink1.infos.lock().last().map_or(0, |i| i.nodes);

    let sink2 = Arc::new(Capture::default());
    pool.start_search(&board, limits, SearchOptions::default(), sink2.clone());
    let second = sink2.wait();
    pool.wait_for_search();
    let nodes_second = sink2.infos.lock().last().map_or(0, |i| i.nodes);

    assert_eq!(first, second, "cached search changed its mind");
    assert!(
        nodes_second <= nodes_first,
        "warm table searched more nodes ({nodes_second} > {nodes_first})"
    );
}

#[test]
fn test_depth_grows_monotonically_in_infos() {
    let board = Board::new();
    let sink = Arc::new(Capture::default());
    let (mut pool, _) = ThreadPool::new(1, 16);
    let limits = SearchLimits {
        depth: Some(7),
        ..Default::default()
    };
    pool.start_search(&board, limits, SearchOptions::default(), sink.clone());
    sink.wait();
    pool.wait_for_search();

    let infos = sink.infos.lock();
    let depths: Vec<i32> = infos.iter().map(|i| i.depth).collect();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*depths.last().unwrap(), 7);
    // Node counts and pv lines are populated
    assert!(infos.last().unwrap().nodes > 0);
    assert!(!infos.last().unwrap().pv.is_empty());
}

#[test]
fn test_nodes_limit_respected_loosely() {
    let board = Board::new();
    let sink = Arc::new(Capture::default());
    let (mut pool, _) = ThreadPool::new(1, 16);
    let limits = SearchLimits {
        nodes: Some(20_000),
        ..Default::default()
    };
    pool.start_search(&board, limits, SearchOptions::default(), sink.clone());
    let best = sink.wait();
    pool.wait_for_search();
    assert!(Board::new().legal_moves().contains(best));
    // The limit is checked in blocks, so allow generous slack
    let nodes = sink.infos.lock().last().map_or(0, |i| i.nodes);
    assert!(nodes < 200_000, "node limit wildly exceeded: {nodes}");
}
