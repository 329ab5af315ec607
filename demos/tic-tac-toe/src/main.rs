//! A minimal two-player game built on the `Game` trait: the reference
//! implementation every other Arcforge game author starts from.

use arcforge::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Cell {
    Empty,
    X,
    O,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum Outcome {
    Won { winner: PlayerId },
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    board: [[Cell; 3]; 3],
    turn: usize, // 0 = X's seat, 1 = O's seat
    outcome: Option<Outcome>,
}

/// Both seats and observers see the same thing — there's no hidden
/// information in tic-tac-toe — so `PlayerState` and `PublicState` are
/// both this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct BoardView {
    board: [[Cell; 3]; 3],
    turn: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Move {
    row: usize,
    col: usize,
}

#[derive(Debug)]
struct TicTacToe;

impl Game for TicTacToe {
    type Config = ();
    type State = State;
    type Move = Move;
    type Loadout = ();
    type PlayerState = BoardView;
    type PublicState = BoardView;
    type Outcome = Outcome;

    fn queues() -> Vec<QueueDef<Self::Config>> {
        vec![QueueDef {
            queue_id: QueueId::new("quickplay"),
            num_players: 2,
            config: (),
        }]
    }

    fn setup(_config: &(), _num_players: usize, _loadouts: &[()], _created_at_ms: u64) -> State {
        State {
            board: [[Cell::Empty; 3]; 3],
            turn: 0,
            outcome: None,
        }
    }

    fn is_valid_move(state: &State, ctx: &MoveContext<Self>) -> bool {
        state.outcome.is_none()
            && ctx.player_id.0 as usize == state.turn
            && ctx.mv.row < 3
            && ctx.mv.col < 3
            && state.board[ctx.mv.row][ctx.mv.col] == Cell::Empty
    }

    fn process_move(state: &State, ctx: &MoveContext<Self>) -> State {
        let mut next = state.clone();
        let mark = if state.turn == 0 { Cell::X } else { Cell::O };
        next.board[ctx.mv.row][ctx.mv.col] = mark;

        next.outcome = if check_winner(&next.board, mark) {
            Some(Outcome::Won { winner: ctx.player_id })
        } else if board_full(&next.board) {
            Some(Outcome::Draw)
        } else {
            None
        };

        if next.outcome.is_none() {
            next.turn = 1 - state.turn;
        }
        next
    }

    fn outcome(state: &State, _ctx: &OutcomeContext<Self>) -> Option<Outcome> {
        state.outcome.clone()
    }

    fn player_state(state: &State, _ctx: &ProjectionContext<Self>) -> BoardView {
        public_view(state)
    }

    fn public_state(state: &State, _ctx: &ProjectionContext<Self>) -> BoardView {
        public_view(state)
    }

    fn is_valid_room(_config: &(), num_players: usize) -> bool {
        num_players == 2
    }
}

fn public_view(state: &State) -> BoardView {
    BoardView {
        board: state.board,
        turn: PlayerId(state.turn as u64),
    }
}

fn check_winner(b: &[[Cell; 3]; 3], m: Cell) -> bool {
    (0..3).any(|i| (0..3).all(|j| b[i][j] == m)) // rows
        || (0..3).any(|j| (0..3).all(|i| b[i][j] == m)) // cols
        || (0..3).all(|i| b[i][i] == m) // diagonal
        || (0..3).all(|i| b[i][2 - i] == m) // anti-diagonal
}

fn board_full(b: &[[Cell; 3]; 3]) -> bool {
    b.iter().all(|row| row.iter().all(|c| *c != Cell::Empty))
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    tracing::info!("starting tic-tac-toe server on 0.0.0.0:8080");

    let server = ArcforgeServer::builder()
        .bind("0.0.0.0:8080")
        .build::<TicTacToe>()
        .await?;

    server.run().await?;
    Ok(())
}
