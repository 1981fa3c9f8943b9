//! End-to-end engine scenarios driven through the search pool.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use sable::board::score::{VALUE_MATE, VALUE_MATE_IN_MAX_PLY};
use sable::board::{Board, Move};
use sable::search::smp::ThreadPool;
use sable::search::{InfoSink, SearchInfo, SearchLimits, SearchOptions};

#[derive(Default)]
struct Capture {
    infos: Mutex<Vec<SearchInfo>>,
    best: Mutex<Option<(Move, Option<Move>)>>,
    done: (Mutex<bool>, Condvar),
}

impl InfoSink for Capture {
    fn info(&self, info: &SearchInfo) {
        self.infos.lock().push(info.clone());
    }
    fn bestmove(&self, best: Move, ponder: Option<Move>) {
        *self.best.lock() = Some((best, ponder));
        let (lock, cv) = &self.done;
        *lock.lock() = true;
        cv.notify_all();
    }
}

impl Capture {
    fn wait_bestmove(&self) -> Move {
        let (lock, cv) = &self.done;
        let mut done = lock.lock();
        while !*done {
            cv.wait(&mut done);
        }
        self.best.lock().expect("bestmove published").0
    }
}

fn search(fen: &str, limits: SearchLimits) -> (Move, Vec<SearchInfo>) {
    search_with(fen, limits, SearchOptions::default())
}

fn search_with(fen: &str, limits: SearchLimits, options: SearchOptions) -> (Move, Vec<SearchInfo>) {
    let board = Board::from_fen(fen);
    let (mut pool, _) = ThreadPool::new(options.threads, 16);
    let sink = Arc::new(Capture::default());
    pool.start_search(&board, limits, options, sink.clone());
    let best = sink.wait_bestmove();
    pool.wait_for_search();
    let infos = sink.infos.lock().clone();
    (best, infos)
}

fn depth(d: i32) -> SearchLimits {
    SearchLimits {
        depth: Some(d),
        ..Default::default()
    }
}

#[test]
fn test_go_depth_1_returns_legal_move_and_sane_score() {
    let (best, infos) = search(Board::startpos_fen(), depth(1));
    assert!(Board::new().legal_moves().contains(best));
    let info = infos.last().expect("at least one info line");
    assert!(info.score.abs() <= 100, "depth-1 score {} out of band", info.score);
}

#[test]
fn test_pawn_endgame_keeps_the_pawn() {
    let (best, infos) = search("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", depth(8));
    let info = infos.last().unwrap();
    assert!(info.score > 0, "the pawn-up side must stand better");
    let board = Board::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
    assert!(board.legal_moves().contains(best));
}

#[test]
fn test_movetime_startpos_first_move() {
    let limits = SearchLimits {
        movetime: Some(100),
        ..Default::default()
    };
    let (best, _) = search(Board::startpos_fen(), limits);
    let legal: Vec<String> = Board::new()
        .legal_moves()
        .iter()
        .map(|m| m.to_string())
        .collect();
    assert!(legal.contains(&best.to_string()));
}

#[test]
fn test_mate_in_one_score_and_move() {
    let (best, infos) = search("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", depth(2));
    assert_eq!(best.to_string(), "a1a8");
    let info = infos.last().unwrap();
    assert!(info.score >= VALUE_MATE_IN_MAX_PLY);
    assert_eq!((VALUE_MATE - info.score + 1) / 2, 1, "reported mate in 1");
}

#[test]
fn test_stalemate_scores_zero() {
    let (best, infos) = search("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", depth(2));
    assert_eq!(best, Move::null());
    assert_eq!(infos.last().unwrap().score, 0);
}

#[test]
fn test_threefold_repetition_draw_at_root() {
    let mut board = Board::new();
    for uci in ["b1c3", "b8c6", "c3b1", "c6b8", "b1c3", "b8c6", "c3b1", "c6b8"] {
        let mv = board.parse_move(uci).unwrap();
        let check = board.gives_check(mv);
        board.do_move(mv, check);
    }
    let (mut pool, _) = ThreadPool::new(1, 16);
    let sink = Arc::new(Capture::default());
    pool.start_search(&board, depth(6), SearchOptions::default(), sink.clone());
    sink.wait_bestmove();
    pool.wait_for_search();
    let infos = sink.infos.lock();
    assert_eq!(infos.last().unwrap().score, 0);
}

#[test]
fn test_multipv_reports_distinct_lines() {
    let options = SearchOptions {
        multipv: 3,
        ..Default::default()
    };
    let (_, infos) = search_with(Board::startpos_fen(), depth(5), options);
    let finals: Vec<&SearchInfo> = infos
        .iter()
        .filter(|i| i.depth == 5)
        .collect();
    let mut seen = std::collections::HashSet::new();
    let mut indices = std::collections::HashSet::new();
    for info in finals {
        indices.insert(info.multipv);
        if let Some(first) = info.pv.first() {
            seen.insert(first.to_string());
        }
    }
    assert!(indices.contains(&1) && indices.contains(&2) && indices.contains(&3));
    assert!(seen.len() >= 3, "MultiPV lines must start with distinct moves");
}

#[test]
fn test_searchmoves_restricts_the_answer() {
    let board = Board::new();
    let only = board.parse_move("a2a3").unwrap();
    let limits = SearchLimits {
        depth: Some(4),
        searchmoves: vec![only],
        ..Default::default()
    };
    let (best, _) = search(Board::startpos_fen(), limits);
    assert_eq!(best, only);
}

#[test]
fn test_skill_level_still_plays_legal_moves() {
    let options = SearchOptions {
        skill_level: 3,
        ..Default::default()
    };
    let (best, _) = search_with(Board::startpos_fen(), depth(4), options);
    assert!(Board::new().legal_moves().contains(best));
}

#[test]
fn test_infinite_search_stops_on_demand() {
    let board = Board::new();
    let (mut pool, _) = ThreadPool::new(2, 16);
    let sink = Arc::new(Capture::default());
    let limits = SearchLimits {
        infinite: true,
        ..Default::default()
    };
    pool.start_search(&board, limits, SearchOptions::default(), sink.clone());

    // The search must keep running until told to stop
    std::thread::sleep(std::time::Duration::from_millis(150));
    assert!(sink.best.lock().is_none(), "bestmove before stop");

    pool.stop();
    let best = sink.wait_bestmove();
    pool.wait_for_search();
    assert!(Board::new().legal_moves().contains(best));
}
