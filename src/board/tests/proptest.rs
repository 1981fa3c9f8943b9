//! Property-based tests for do/undo and FEN round-trips.

use proptest::prelude::*;

use crate::board::{Board, GenType, MoveList};

/// Play a pseudo-random legal game of up to `plies` moves, driven by the
/// proptest byte stream, and return the board with its move history.
fn random_game(seed: &[u8], plies: usize) -> Board {
    let mut board = Board::new();
    for byte in seed.iter().take(plies) {
        let moves = board.legal_moves();
        if moves.is_empty() {
            break;
        }
        let m = moves[(*byte as usize) % moves.len()];
        let check = board.gives_check(m);
        board.do_move(m, check);
    }
    board
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fen_roundtrip_on_random_positions(seed in proptest::collection::vec(any::<u8>(), 24)) {
        let board = random_game(&seed, 24);
        let fen = board.to_fen();
        let reparsed = Board::from_fen(&fen);
        prop_assert_eq!(reparsed.to_fen(), fen);
        prop_assert_eq!(reparsed.key(), board.key());
    }

    #[test]
    fn prop_do_undo_restores_everything(seed in proptest::collection::vec(any::<u8>(), 16)) {
        let mut board = random_game(&seed, 12);
        let fen = board.to_fen();
        let key = board.key();
        let pawn_key = board.pawn_key();
        let material_key = board.material_key();

        let moves = board.legal_moves();
        for &m in moves.iter() {
            let check = board.gives_check(m);
            board.do_move(m, check);
            board.undo_move(m);
            prop_assert_eq!(board.to_fen(), fen.clone());
            prop_assert_eq!(board.key(), key);
            prop_assert_eq!(board.pawn_key(), pawn_key);
            prop_assert_eq!(board.material_key(), material_key);
        }
    }

    #[test]
    fn prop_legal_subset_of_pseudo_legal(seed in proptest::collection::vec(any::<u8>(), 16)) {
        let board = random_game(&seed, 16);
        let mut pseudo = MoveList::new();
        if board.in_check() {
            board.generate(GenType::Evasions, &mut pseudo);
        } else {
            board.generate(GenType::NonEvasions, &mut pseudo);
        }
        let legal = board.legal_moves();
        for &m in legal.iter() {
            prop_assert!(pseudo.contains(m));
        }
        // Moves filtered out would leave the own king attacked: simulate
        // the occupancy change without making the move
        use crate::board::{Bitboard, Piece};
        let us = board.side_to_move();
        let them = us.opponent();
        for &m in pseudo.iter() {
            if legal.contains(m) || m.is_castling() {
                continue;
            }
            let mut occupied =
                board.occupied() ^ Bitboard::from_square(m.from()) | Bitboard::from_square(m.to());
            let mut enemies = board.color(them) & !Bitboard::from_square(m.to());
            if m.is_en_passant() {
                let victim = m.to().forward(them);
                occupied ^= Bitboard::from_square(victim);
                enemies &= !Bitboard::from_square(victim);
            }
            let king = if board.piece_on(m.from()) == Some(Piece::King) {
                m.to()
            } else {
                board.king_square(us)
            };
            let attacked = (board.attackers_to(king, occupied) & enemies).any();
            prop_assert!(attacked, "illegal move {} would not expose the king", m);
        }
    }

    #[test]
    fn prop_invariants_hold(seed in proptest::collection::vec(any::<u8>(), 20)) {
        use crate::board::{Bitboard, Color, Piece};
        let board = random_game(&seed, 20);

        // Color occupancy partitions the board
        let white = board.color(Color::White);
        let black = board.color(Color::Black);
        prop_assert!((white & black).is_empty());
        prop_assert_eq!(white | black, board.occupied());

        // Kind bitboards are pairwise disjoint and union to occupied
        let mut union = Bitboard::EMPTY;
        for a in 0..6 {
            for b in (a + 1)..6 {
                let x = board.kind(Piece::from_index(a));
                let y = board.kind(Piece::from_index(b));
                prop_assert!((x & y).is_empty());
            }
            union |= board.kind(Piece::from_index(a));
        }
        prop_assert_eq!(union, board.occupied());

        // Exactly one king per color, no pawns on the back ranks
        prop_assert_eq!(board.count(Color::White, Piece::King), 1);
        prop_assert_eq!(board.count(Color::Black, Piece::King), 1);
        prop_assert!((board.kind(Piece::Pawn)
            & (Bitboard::RANK_1 | Bitboard::RANK_8))
            .is_empty());
    }
}
