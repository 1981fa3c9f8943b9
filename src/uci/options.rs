//! UCI option registry.
//!
//! Out-of-range values are clamped to the nearest valid value and the
//! clamp is announced with an `info string` by the caller; unknown option
//! names are reported the same way. Configuration mistakes never stop the
//! engine.

use std::path::PathBuf;

use crate::search::SearchOptions;
use crate::tt::{MAX_HASH_MB, MIN_HASH_MB};

pub const MAX_THREADS: usize = 256;
pub const MAX_MULTIPV: usize = 256;

/// Effects the caller must apply after a `setoption`.
#[derive(Debug, PartialEq, Eq)]
pub enum OptionAction {
    None,
    ResizeHash(usize),
    SetThreads(usize),
    ClearHash,
    /// Dump the table to the configured hash file
    WriteHashFile,
    /// Restore the table from the configured hash file
    ReadHashFile,
    /// The value was clamped; announce the value actually used
    Clamped(String),
    Unknown(String),
}

/// All engine options with their current values.
#[derive(Clone, Debug)]
pub struct UciOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub multipv: usize,
    pub chess960: bool,
    pub ponder: bool,
    pub move_overhead: u64,
    pub slow_mover: u64,
    pub contempt: i32,
    pub skill_level: i32,
    pub skill_max_error: i32,
    pub skill_probability: i32,
    pub nodes_time: u64,
    pub hash_file: PathBuf,
    pub own_book: bool,
    pub book_file: Option<PathBuf>,
    pub syzygy_path: Option<PathBuf>,
    pub syzygy_probe_depth: i32,
    pub syzygy_probe_limit: i32,
    pub syzygy_50_move_rule: bool,
}

impl Default for UciOptions {
    fn default() -> Self {
        UciOptions {
            hash_mb: 16,
            threads: 1,
            multipv: 1,
            chess960: false,
            ponder: false,
            move_overhead: 10,
            slow_mover: 100,
            contempt: 0,
            skill_level: 20,
            skill_max_error: 0,
            skill_probability: 128,
            nodes_time: 0,
            hash_file: PathBuf::from("hash.bin"),
            own_book: false,
            book_file: None,
            syzygy_path: None,
            syzygy_probe_depth: 1,
            syzygy_probe_limit: 6,
            syzygy_50_move_rule: true,
        }
    }
}

fn print_spin(name: &str, default: impl std::fmt::Display, min: impl std::fmt::Display, max: impl std::fmt::Display) {
    println!("option name {name} type spin default {default} min {min} max {max}");
}

fn print_check(name: &str, default: bool) {
    println!("option name {name} type check default {default}");
}

fn print_string(name: &str, default: &str) {
    println!("option name {name} type string default {default}");
}

impl UciOptions {
    /// Print the `id` and `option` declarations for the `uci` handshake.
    pub fn print(&self) {
        println!("id name Sable 0.1.0");
        println!("id author the Sable developers");

        print_spin("Hash", self.hash_mb, MIN_HASH_MB, MAX_HASH_MB);
        print_spin("Threads", self.threads, 1, MAX_THREADS);
        print_spin("MultiPV", self.multipv, 1, MAX_MULTIPV);
        print_check("UCI_Chess960", self.chess960);
        print_check("Ponder", self.ponder);
        print_spin("Move Overhead", self.move_overhead, 0, 5000);
        print_spin("Slow Mover", self.slow_mover, 10, 1000);
        print_spin("Contempt", self.contempt, -100, 100);
        print_spin("Skill Level", self.skill_level, 0, 20);
        print_spin("Skill Level Maximum Error", self.skill_max_error, 0, 5000);
        print_spin("Skill Level Probability", self.skill_probability, 1, 1000);
        print_spin("nodestime", self.nodes_time, 0, 10000);
        print_check("OwnBook", self.own_book);
        print_string("Book File", "");
        print_string("SyzygyPath", "");
        print_spin("SyzygyProbeDepth", self.syzygy_probe_depth, 1, 100);
        print_spin("SyzygyProbeLimit", self.syzygy_probe_limit, 0, 7);
        print_check("Syzygy50MoveRule", self.syzygy_50_move_rule);
        print_string("Hash File", "hash.bin");
        println!("option name Write Hash File type button");
        println!("option name Read Hash File type button");
        println!("option name Clear Hash type button");

        println!("uciok");
    }

    /// Apply one `setoption`. Returns the follow-up action for the caller.
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> OptionAction {
        let normalized = name.trim().to_ascii_lowercase();
        let parse_int = |bounds: (i64, i64)| -> (i64, bool) {
            let raw = value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(bounds.0);
            let clamped = raw.clamp(bounds.0, bounds.1);
            (clamped, clamped != raw)
        };
        let parse_bool = || value.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);

        match normalized.as_str() {
            "hash" => {
                let (mb, clamped) = parse_int((MIN_HASH_MB as i64, MAX_HASH_MB as i64));
                self.hash_mb = mb as usize;
                if clamped {
                    OptionAction::Clamped(format!("Hash clamped to {mb} MB"))
                } else {
                    OptionAction::ResizeHash(self.hash_mb)
                }
            }
            "threads" => {
                let (threads, clamped) = parse_int((1, MAX_THREADS as i64));
                self.threads = threads as usize;
                if clamped {
                    OptionAction::Clamped(format!("Threads clamped to {threads}"))
                } else {
                    OptionAction::SetThreads(self.threads)
                }
            }
            "multipv" => {
                let (v, clamped) = parse_int((1, MAX_MULTIPV as i64));
                self.multipv = v as usize;
                if clamped {
                    OptionAction::Clamped(format!("MultiPV clamped to {v}"))
                } else {
                    OptionAction::None
                }
            }
            "uci_chess960" => {
                self.chess960 = parse_bool();
                OptionAction::None
            }
            "ponder" => {
                self.ponder = parse_bool();
                OptionAction::None
            }
            "move overhead" => {
                let (v, _) = parse_int((0, 5000));
                self.move_overhead = v as u64;
                OptionAction::None
            }
            "slow mover" => {
                let (v, _) = parse_int((10, 1000));
                self.slow_mover = v as u64;
                OptionAction::None
            }
            "contempt" => {
                let (v, _) = parse_int((-100, 100));
                self.contempt = v as i32;
                OptionAction::None
            }
            "skill level" => {
                let (v, _) = parse_int((0, 20));
                self.skill_level = v as i32;
                OptionAction::None
            }
            "skill level maximum error" => {
                let (v, _) = parse_int((0, 5000));
                self.skill_max_error = v as i32;
                OptionAction::None
            }
            "skill level probability" => {
                let (v, _) = parse_int((1, 1000));
                self.skill_probability = v as i32;
                OptionAction::None
            }
            "nodestime" => {
                let (v, _) = parse_int((0, 10000));
                self.nodes_time = v as u64;
                OptionAction::None
            }
            "ownbook" => {
                self.own_book = parse_bool();
                OptionAction::None
            }
            "book file" => {
                self.book_file = value
                    .filter(|v| !v.is_empty() && *v != "<empty>")
                    .map(PathBuf::from);
                OptionAction::None
            }
            "syzygypath" => {
                self.syzygy_path = value
                    .filter(|v| !v.is_empty() && *v != "<empty>")
                    .map(PathBuf::from);
                OptionAction::None
            }
            "syzygyprobedepth" => {
                let (v, _) = parse_int((1, 100));
                self.syzygy_probe_depth = v as i32;
                OptionAction::None
            }
            "syzygyprobelimit" => {
                let (v, _) = parse_int((0, 7));
                self.syzygy_probe_limit = v as i32;
                OptionAction::None
            }
            "syzygy50moverule" => {
                self.syzygy_50_move_rule = parse_bool();
                OptionAction::None
            }
            "hash file" => {
                if let Some(path) = value.filter(|v| !v.is_empty()) {
                    self.hash_file = PathBuf::from(path);
                }
                OptionAction::None
            }
            "write hash file" => OptionAction::WriteHashFile,
            "read hash file" => OptionAction::ReadHashFile,
            "clear hash" => OptionAction::ClearHash,
            _ => OptionAction::Unknown(name.to_string()),
        }
    }

    /// The search-facing subset of the options.
    #[must_use]
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            threads: self.threads,
            multipv: self.multipv,
            contempt: self.contempt,
            skill_level: self.skill_level,
            move_overhead: self.move_overhead,
            slow_mover: self.slow_mover,
            nodes_time: self.nodes_time,
            chess960: self.chess960,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_resize_action() {
        let mut options = UciOptions::default();
        assert_eq!(options.apply("Hash", Some("64")), OptionAction::ResizeHash(64));
        assert_eq!(options.hash_mb, 64);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let mut options = UciOptions::default();
        let action = options.apply("Threads", Some("100000"));
        assert!(matches!(action, OptionAction::Clamped(_)));
        assert_eq!(options.threads, MAX_THREADS);
    }

    #[test]
    fn test_case_insensitive_names() {
        let mut options = UciOptions::default();
        options.apply("uci_chess960", Some("true"));
        assert!(options.chess960);
        options.apply("MOVE OVERHEAD", Some("123"));
        assert_eq!(options.move_overhead, 123);
    }

    #[test]
    fn test_unknown_option_reported() {
        let mut options = UciOptions::default();
        let action = options.apply("Fingers", Some("10"));
        assert_eq!(action, OptionAction::Unknown("Fingers".to_string()));
    }

    #[test]
    fn test_search_options_mapping() {
        let mut options = UciOptions::default();
        options.apply("MultiPV", Some("3"));
        options.apply("Contempt", Some("12"));
        options.apply("Skill Level", Some("5"));
        let search = options.search_options();
        assert_eq!(search.multipv, 3);
        assert_eq!(search.contempt, 12);
        assert_eq!(search.skill_level, 5);
    }
}
