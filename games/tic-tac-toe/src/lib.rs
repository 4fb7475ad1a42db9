//! The one concrete [`game_core::Game`] this server hosts: standard 3x3
//! tic-tac-toe, no variants.
//!
//! Cells are numbered 1-9, row-major, top-left origin:
//!
//! ```text
//! 1 2 3
//! 4 5 6
//! 7 8 9
//! ```

use game_core::{Game, GameError, Move, Role, Winner};

/// A parsed `MOVE` payload: the target cell and an optional assertion of
/// the mover's own mark, e.g. `"5<-X"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicTacToeMove {
    /// Board index, `0..9`, already converted from the wire's `1..=9`.
    cell: usize,
    asserted_mark: Option<Role>,
}

impl Move for TicTacToeMove {}

/// Board state for one match. `board[row][col]` is `None` for an empty
/// cell or `Some(role)` for the side whose mark occupies it.
pub struct TicTacToe {
    board: [[Option<Role>; 3]; 3],
    turn: Role,
    winner: Option<Winner>,
}

impl TicTacToe {
    fn check_for(&self, role: Role) -> bool {
        let is = |r: usize, c: usize| self.board[r][c] == Some(role);
        (0..3).any(|row| (0..3).all(|col| is(row, col)))
            || (0..3).any(|col| (0..3).all(|row| is(row, col)))
            || (0..3).all(|i| is(i, i))
            || (0..3).all(|i| is(i, 2 - i))
    }

    fn compute_winner(&self) -> Option<Winner> {
        if self.check_for(Role::First) {
            return Some(Winner::Role(Role::First));
        }
        if self.check_for(Role::Second) {
            return Some(Winner::Role(Role::Second));
        }
        if self.board.iter().flatten().all(|cell| cell.is_some()) {
            return Some(Winner::Draw);
        }
        None
    }
}

impl Game for TicTacToe {
    type Move = TicTacToeMove;

    fn new() -> Self {
        TicTacToe {
            board: [[None; 3]; 3],
            turn: Role::First,
            winner: None,
        }
    }

    fn parse_move(&self, role: Role, text: &str) -> Result<Self::Move, GameError> {
        let (cell_part, mark_part) = match text.split_once("<-") {
            Some((cell, mark)) => (cell, Some(mark)),
            None => (text, None),
        };

        let cell_number: u32 = cell_part
            .trim()
            .parse()
            .map_err(|_| GameError::new(format!("not a cell number: {cell_part:?}")))?;
        if !(1..=9).contains(&cell_number) {
            return Err(GameError::new(format!(
                "cell number out of range 1-9: {cell_number}"
            )));
        }

        let asserted_mark = match mark_part {
            None => None,
            Some("X") => Some(Role::First),
            Some("O") => Some(Role::Second),
            Some(other) => return Err(GameError::new(format!("unknown mark assertion: {other:?}"))),
        };
        if let Some(asserted) = asserted_mark {
            if asserted != role {
                return Err(GameError::new("asserted mark does not match mover's role"));
            }
        }

        Ok(TicTacToeMove {
            cell: (cell_number - 1) as usize,
            asserted_mark,
        })
    }

    fn apply_move(&mut self, role: Role, mv: &Self::Move) -> Result<(), GameError> {
        if self.winner.is_some() {
            return Err(GameError::new("game is already over"));
        }
        if role != self.turn {
            return Err(GameError::new("not this player's turn"));
        }
        let row = mv.cell / 3;
        let col = mv.cell % 3;
        if self.board[row][col].is_some() {
            return Err(GameError::new("cell already occupied"));
        }

        self.board[row][col] = Some(role);
        self.winner = self.compute_winner();
        self.turn = role.opponent();
        Ok(())
    }

    fn resign(&mut self, role: Role) {
        self.winner = Some(Winner::Role(role.opponent()));
    }

    fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    fn winner(&self) -> Winner {
        self.winner.expect("winner() called before is_over()")
    }

    fn render_state(&self) -> String {
        let mark = |cell: Option<Role>| match cell {
            None => '.',
            Some(Role::First) => 'X',
            Some(Role::Second) => 'O',
        };
        self.board
            .iter()
            .map(|row| row.iter().map(|cell| mark(*cell)).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_cell_number() {
        let game = TicTacToe::new();
        let mv = game.parse_move(Role::First, "5").unwrap();
        assert_eq!(mv.cell, 4);
        assert_eq!(mv.asserted_mark, None);
    }

    #[test]
    fn parses_mark_assertion_matching_role() {
        let game = TicTacToe::new();
        let mv = game.parse_move(Role::First, "1<-X").unwrap();
        assert_eq!(mv.cell, 0);
        assert_eq!(mv.asserted_mark, Some(Role::First));
    }

    #[test]
    fn rejects_mismatched_mark_assertion() {
        let game = TicTacToe::new();
        assert!(game.parse_move(Role::First, "1<-O").is_err());
    }

    #[test]
    fn rejects_out_of_range_cell() {
        let game = TicTacToe::new();
        assert!(game.parse_move(Role::First, "0").is_err());
        assert!(game.parse_move(Role::First, "10").is_err());
    }

    #[test]
    fn enforces_turn_order() {
        let mut game = TicTacToe::new();
        let mv = game.parse_move(Role::Second, "1").unwrap();
        assert!(game.apply_move(Role::Second, &mv).is_err());
    }

    #[test]
    fn detects_row_win_for_first_player() {
        let mut game = TicTacToe::new();
        let moves = [
            (Role::First, "1"),
            (Role::Second, "4"),
            (Role::First, "2"),
            (Role::Second, "5"),
            (Role::First, "3"),
        ];
        for (role, text) in moves {
            let mv = game.parse_move(role, text).unwrap();
            game.apply_move(role, &mv).unwrap();
        }
        assert!(game.is_over());
        assert_eq!(game.winner(), Winner::Role(Role::First));
    }

    #[test]
    fn detects_draw() {
        let mut game = TicTacToe::new();
        // X O X / X O O / O X X -> no three in a row, board full.
        let moves = [
            (Role::First, "1"),
            (Role::Second, "2"),
            (Role::First, "3"),
            (Role::Second, "5"),
            (Role::First, "4"),
            (Role::Second, "6"),
            (Role::First, "8"),
            (Role::Second, "7"),
            (Role::First, "9"),
        ];
        for (role, text) in moves {
            let mv = game.parse_move(role, text).unwrap();
            game.apply_move(role, &mv).unwrap();
        }
        assert!(game.is_over());
        assert_eq!(game.winner(), Winner::Draw);
    }

    #[test]
    fn resign_declares_opponent_winner() {
        let mut game = TicTacToe::new();
        game.resign(Role::First);
        assert!(game.is_over());
        assert_eq!(game.winner(), Winner::Role(Role::Second));
    }
}
