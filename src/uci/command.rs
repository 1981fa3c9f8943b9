//! UCI command parsing.

use std::time::Duration;

/// `go` parameters as sent by the GUI, before move-token resolution.
#[derive(Clone, Debug, Default)]
pub struct GoParams {
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub mate: Option<i32>,
    pub movetime: Option<Duration>,
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Option<Duration>,
    pub binc: Option<Duration>,
    pub movestogo: Option<u32>,
    pub infinite: bool,
    pub ponder: bool,
    pub searchmoves: Vec<String>,
}

/// Parsed UCI commands.
#[derive(Clone, Debug)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    SetOption { name: String, value: Option<String> },
    Position { fen: Option<String>, moves: Vec<String> },
    Go(GoParams),
    Stop,
    PonderHit,
    Quit,
    Display,
    Perft(usize),
}

/// Parse one line of input. Returns `None` for empty or unknown commands;
/// the caller reports unknown input as an `info string` and carries on.
#[must_use]
pub fn parse(line: &str) -> Option<UciCommand> {
    let mut tokens = line.split_whitespace();
    let head = tokens.next()?;

    match head {
        "uci" => Some(UciCommand::Uci),
        "isready" => Some(UciCommand::IsReady),
        "ucinewgame" => Some(UciCommand::UciNewGame),
        "stop" => Some(UciCommand::Stop),
        "ponderhit" => Some(UciCommand::PonderHit),
        "quit" => Some(UciCommand::Quit),
        "d" | "display" => Some(UciCommand::Display),
        "perft" => {
            let depth = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(1);
            Some(UciCommand::Perft(depth))
        }
        "setoption" => parse_setoption(&mut tokens),
        "position" => parse_position(&mut tokens),
        "go" => Some(UciCommand::Go(parse_go(&mut tokens))),
        _ => None,
    }
}

fn parse_setoption<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<UciCommand> {
    // setoption name <N...> [value <V...>] -- names may contain spaces
    if tokens.next() != Some("name") {
        return None;
    }

    let mut name_parts: Vec<&str> = Vec::new();
    let mut value_parts: Vec<&str> = Vec::new();
    let mut in_value = false;
    for token in tokens {
        if !in_value && token == "value" {
            in_value = true;
        } else if in_value {
            value_parts.push(token);
        } else {
            name_parts.push(token);
        }
    }

    if name_parts.is_empty() {
        return None;
    }
    Some(UciCommand::SetOption {
        name: name_parts.join(" "),
        value: if in_value {
            Some(value_parts.join(" "))
        } else {
            None
        },
    })
}

fn parse_position<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<UciCommand> {
    match tokens.next()? {
        "startpos" => {
            let moves = match tokens.next() {
                Some("moves") => tokens.map(str::to_string).collect(),
                _ => Vec::new(),
            };
            Some(UciCommand::Position { fen: None, moves })
        }
        "fen" => {
            let mut parts: Vec<&str> = Vec::new();
            let mut moves: Vec<String> = Vec::new();
            let mut in_moves = false;
            while let Some(token) = tokens.next() {
                if in_moves {
                    moves.push(token.to_string());
                } else if token == "moves" {
                    in_moves = true;
                } else {
                    parts.push(token);
                }
            }
            Some(UciCommand::Position {
                fen: Some(parts.join(" ")),
                moves,
            })
        }
        _ => None,
    }
}

fn parse_go<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> GoParams {
    let mut params = GoParams::default();
    let tokens: Vec<&str> = tokens.collect();
    let mut i = 0;

    let ms = |s: Option<&&str>| s.and_then(|v| v.parse::<u64>().ok()).map(Duration::from_millis);

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                params.depth = tokens.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "nodes" => {
                params.nodes = tokens.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "mate" => {
                params.mate = tokens.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "movetime" => {
                params.movetime = ms(tokens.get(i + 1));
                i += 2;
            }
            "wtime" => {
                params.wtime = ms(tokens.get(i + 1));
                i += 2;
            }
            "btime" => {
                params.btime = ms(tokens.get(i + 1));
                i += 2;
            }
            "winc" => {
                params.winc = ms(tokens.get(i + 1));
                i += 2;
            }
            "binc" => {
                params.binc = ms(tokens.get(i + 1));
                i += 2;
            }
            "movestogo" => {
                params.movestogo = tokens.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            "searchmoves" => {
                i += 1;
                while i < tokens.len() && !is_go_keyword(tokens[i]) {
                    params.searchmoves.push(tokens[i].to_string());
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    params
}

fn is_go_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "nodes"
            | "mate"
            | "movetime"
            | "wtime"
            | "btime"
            | "winc"
            | "binc"
            | "movestogo"
            | "infinite"
            | "ponder"
            | "searchmoves"
    )
}
