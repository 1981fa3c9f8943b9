//! UCI protocol loop.
//!
//! The stdin thread owns the engine state (position, options, book, worker
//! pool) and hands searches to the pool; search output flows back through
//! an `InfoSink` that prints `info` and `bestmove` lines. Malformed input
//! never stops the engine: it is reported as `info string` and the
//! previous state stays in effect.

mod command;
mod options;

pub use command::{parse, GoParams, UciCommand};
pub use options::{OptionAction, UciOptions};

use std::io::BufRead;
use std::sync::Arc;

use crate::board::score::{VALUE_MATE, VALUE_MATE_IN_MAX_PLY};
use crate::board::{Board, Move};
use crate::book::Book;
use crate::search::smp::ThreadPool;
use crate::search::{InfoSink, SearchInfo, SearchLimits};

/// Printing sink for the standard output.
struct StdoutSink {
    chess960: bool,
}

impl InfoSink for StdoutSink {
    fn info(&self, info: &SearchInfo) {
        let score = if info.score.abs() >= VALUE_MATE_IN_MAX_PLY {
            let plies = VALUE_MATE - info.score.abs();
            let moves = (plies + 1) / 2;
            if info.score > 0 {
                format!("mate {moves}")
            } else {
                format!("mate -{moves}")
            }
        } else {
            format!("cp {}", info.score)
        };
        let bound = if info.score_lower_bound {
            " lowerbound"
        } else if info.score_upper_bound {
            " upperbound"
        } else {
            ""
        };
        let pv: Vec<String> = info.pv.iter().map(|m| m.to_uci(self.chess960)).collect();

        println!(
            "info depth {} seldepth {} multipv {} score {}{} nodes {} nps {} hashfull {} time {} pv {}",
            info.depth,
            info.sel_depth,
            info.multipv,
            score,
            bound,
            info.nodes,
            info.nps,
            info.hashfull,
            info.time_ms,
            pv.join(" ")
        );
    }

    fn bestmove(&self, best: Move, ponder: Option<Move>) {
        if best == Move::null() {
            println!("bestmove (none)");
        } else if let Some(ponder) = ponder {
            println!(
                "bestmove {} ponder {}",
                best.to_uci(self.chess960),
                ponder.to_uci(self.chess960)
            );
        } else {
            println!("bestmove {}", best.to_uci(self.chess960));
        }
    }
}

/// Engine state owned by the UCI loop.
struct Engine {
    board: Board,
    options: UciOptions,
    pool: ThreadPool,
    book: Option<Book>,
}

impl Engine {
    fn new() -> Self {
        let options = UciOptions::default();
        let (pool, actual_mb) = ThreadPool::new(options.threads, options.hash_mb);
        let mut options = options;
        options.hash_mb = actual_mb;
        Engine {
            board: Board::new(),
            options,
            pool,
            book: None,
        }
    }

    fn set_position(&mut self, fen: Option<&str>, moves: &[String]) {
        let mut board = match fen {
            Some(fen) => match Board::try_from_fen(fen) {
                Ok(board) => board,
                Err(err) => {
                    println!("info string invalid fen: {err}");
                    return;
                }
            },
            None => Board::new(),
        };
        board.set_chess960(self.options.chess960);

        for token in moves {
            match board.parse_move(token) {
                Ok(mv) => {
                    let gives_check = board.gives_check(mv);
                    board.do_move(mv, gives_check);
                }
                Err(err) => {
                    println!("info string invalid move '{token}': {err}");
                    return;
                }
            }
        }

        self.board = board;
    }

    fn go(&mut self, params: &GoParams) {
        // A book hit answers without searching
        if self.options.own_book && !params.infinite {
            if let Some(book) = &self.book {
                if let Some(mv) = book.probe(&self.board, false) {
                    println!("bestmove {}", mv.to_uci(self.options.chess960));
                    return;
                }
            }
        }

        let searchmoves = params
            .searchmoves
            .iter()
            .filter_map(|token| self.board.parse_move(token).ok())
            .collect();

        let to_ms = |d: Option<std::time::Duration>| d.map(|d| d.as_millis() as u64);
        let limits = SearchLimits {
            depth: params.depth,
            movetime: to_ms(params.movetime),
            nodes: params.nodes,
            mate: params.mate,
            infinite: params.infinite,
            ponder: params.ponder,
            time: [to_ms(params.wtime), to_ms(params.btime)],
            inc: [
                to_ms(params.winc).unwrap_or(0),
                to_ms(params.binc).unwrap_or(0),
            ],
            movestogo: params.movestogo,
            searchmoves,
        };

        let sink = Arc::new(StdoutSink {
            chess960: self.options.chess960,
        });
        self.pool
            .start_search(&self.board, limits, self.options.search_options(), sink);
    }

    fn setoption(&mut self, name: &str, value: Option<&str>) {
        match self.options.apply(name, value) {
            OptionAction::None => {}
            OptionAction::ResizeHash(mb) => {
                self.pool.wait_for_search();
                let actual = self.pool.set_hash(mb);
                if actual != mb {
                    println!("info string Hash reduced to {actual} MB after allocation failure");
                    self.options.hash_mb = actual;
                }
            }
            OptionAction::SetThreads(threads) => {
                self.pool.wait_for_search();
                self.pool.set_threads(threads);
            }
            OptionAction::ClearHash => {
                self.pool.clear();
            }
            OptionAction::WriteHashFile => {
                self.pool.wait_for_search();
                match self.pool.tt().dump(&self.options.hash_file) {
                    Ok(()) => println!("info string hash saved"),
                    Err(err) => println!("info string hash save failed: {err}"),
                }
            }
            OptionAction::ReadHashFile => {
                self.pool.wait_for_search();
                match self.pool.tt().load(&self.options.hash_file) {
                    Ok(()) => println!("info string hash loaded"),
                    Err(err) => println!("info string hash load failed: {err}"),
                }
            }
            OptionAction::Clamped(message) => {
                println!("info string {message}");
            }
            OptionAction::Unknown(name) => {
                println!("info string unknown option '{name}'");
            }
        }

        // Book and tablebase paths are validated eagerly; a missing file
        // silently disables the feature
        if name.eq_ignore_ascii_case("book file") || name.eq_ignore_ascii_case("ownbook") {
            self.book = self
                .options
                .book_file
                .as_deref()
                .and_then(|path| Book::open(path).ok());
            if self.options.own_book && self.options.book_file.is_some() && self.book.is_none() {
                println!("info string opening book unavailable, playing without it");
            }
        }
        if name.eq_ignore_ascii_case("syzygypath") {
            if let Some(path) = &self.options.syzygy_path {
                if !path.is_dir() {
                    println!("info string SyzygyPath not found, tablebases disabled");
                    self.options.syzygy_path = None;
                }
            }
        }
    }

    fn display(&self) {
        let board = &self.board;
        for rank in (0..8).rev() {
            let mut line = String::new();
            for file in 0..8 {
                let c = board
                    .piece_at(crate::board::Square::new(rank, file))
                    .map_or('.', |(color, piece)| piece.to_fen_char(color));
                line.push(c);
                line.push(' ');
            }
            println!("{line}");
        }
        println!("fen: {}", board.to_fen());
        println!("key: {:016X}", board.key());
        println!(
            "checkers:{}",
            board
                .checkers()
                .iter()
                .map(|sq| format!(" {sq}"))
                .collect::<String>()
        );
    }

    fn perft(&mut self, depth: usize) {
        let start = std::time::Instant::now();
        let mut total = 0u64;
        for (mv, nodes) in self.board.perft_divide(depth) {
            println!("{}: {nodes}", mv.to_uci(self.options.chess960));
            total += nodes;
        }
        let elapsed = start.elapsed();
        println!("Nodes searched: {total} in {}ms", elapsed.as_millis());
    }
}

/// Run the UCI loop until `quit`. Returns the process exit code.
pub fn run() -> i32 {
    crate::board::attacks::init();

    let mut engine = Engine::new();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let Some(cmd) = parse(&line) else {
            if !line.trim().is_empty() {
                println!("info string unknown command '{}'", line.trim());
            }
            continue;
        };

        match cmd {
            UciCommand::Uci => engine.options.print(),
            UciCommand::IsReady => println!("readyok"),
            UciCommand::UciNewGame => {
                engine.pool.clear();
                engine.board = Board::new();
            }
            UciCommand::SetOption { name, value } => {
                engine.setoption(&name, value.as_deref());
            }
            UciCommand::Position { fen, moves } => {
                engine.pool.wait_for_search();
                engine.set_position(fen.as_deref(), &moves);
            }
            UciCommand::Go(params) => engine.go(&params),
            UciCommand::Stop => {
                engine.pool.stop();
                engine.pool.wait_for_search();
            }
            UciCommand::PonderHit => engine.pool.ponderhit(),
            UciCommand::Display => engine.display(),
            UciCommand::Perft(depth) => engine.perft(depth),
            UciCommand::Quit => {
                engine.pool.stop();
                engine.pool.wait_for_search();
                return 0;
            }
        }
    }

    0
}
