use std::collections::VecDeque;

use chrono::prelude::*;
use ndarray::{Array2, ArrayView1, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::generator;
use crate::{
    Cell, CellCount, Coord, Coord2, FlagOutcome, GameConfig, GameError, GameVerdict, Level,
    MoveOutcome, NeighborIterExt, Result, ToNdIndex,
};

/// Valid transitions: Playing -> Won and Playing -> Lost. Once the game has
/// left Playing it accepts no further mutating move.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameStatus {
    Playing,
    Won,
    Lost,
}

impl GameStatus {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for GameStatus {
    fn default() -> Self {
        Self::Playing
    }
}

/// Represents one game from first click to win or loss.
///
/// Mines are not placed at construction: the first reveal of the game picks
/// the layout with the clicked cell as a guaranteed-safe origin. Given the
/// same seed, config, and click sequence, every game plays out identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GamePlay {
    config: GameConfig,
    board: Array2<Cell>,
    mine_generated: bool,
    status: GameStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    seed: u64,
}

impl GamePlay {
    pub fn new(config: GameConfig) -> Result<Self> {
        Self::with_seed(config, rand::rng().random())
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            board: Self::blank_board(config),
            mine_generated: false,
            status: GameStatus::Playing,
            started_at: Utc::now(),
            ended_at: None,
            seed,
        })
    }

    /// Builds a game over an explicit, already-generated mine layout, with
    /// adjacency counts filled in. Meant for tests and for replaying a known
    /// board; duplicate coordinates collapse into one mine.
    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(GameError::InvalidConfig {
                width,
                height,
                mines: mine_coords.len() as CellCount,
            });
        }

        let mut board = Self::blank_board(GameConfig::new_unchecked(size, 0));
        for &coords in mine_coords {
            if coords.0 >= width || coords.1 >= height {
                return Err(GameError::InvalidCoords);
            }
            board[coords.to_nd_index()].mine = true;
        }
        let mines = board.iter().filter(|cell| cell.mine).count() as CellCount;
        generator::update_numbers(&mut board);

        Ok(Self {
            config: GameConfig::new_unchecked(size, mines),
            board,
            mine_generated: true,
            status: GameStatus::Playing,
            started_at: Utc::now(),
            ended_at: None,
            seed: 0,
        })
    }

    fn blank_board(config: GameConfig) -> Array2<Cell> {
        Array2::from_shape_fn(
            (config.height() as usize, config.width() as usize),
            |(y, x)| Cell::new(x as Coord, y as Coord),
        )
    }

    /// Rebuilds the whole game in place: fresh grid, fresh seed, status back
    /// to Playing. Safe to call mid-game; the old board is abandoned.
    pub fn reset(&mut self) {
        self.reset_seeded(rand::rng().random());
    }

    pub fn reset_seeded(&mut self, seed: u64) {
        self.board = Self::blank_board(self.config);
        self.mine_generated = false;
        self.status = GameStatus::Playing;
        self.started_at = Utc::now();
        self.ended_at = None;
        self.seed = seed;
        log::debug!(
            "reset to {}x{} with {} mines",
            self.config.width(),
            self.config.height(),
            self.config.mines
        );
    }

    /// Like `reset` but with new dimensions and mine count.
    pub fn reset_with(&mut self, config: GameConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.reset();
        Ok(())
    }

    pub fn new_game(&mut self, level: Level) {
        self.reset_with(level.config())
            .expect("level presets are valid configs");
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn size(&self) -> Coord2 {
        self.config.size
    }

    pub fn total_mines(&self) -> CellCount {
        self.config.mines
    }

    pub fn mine_generated(&self) -> bool {
        self.mine_generated
    }

    pub fn board(&self) -> &Array2<Cell> {
        &self.board
    }

    /// Rows from top to bottom, each a view of `width` cells.
    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, Cell>> {
        self.board.axis_iter(Axis(0))
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.board.iter()
    }

    /// Panics when `coords` lie outside the board.
    pub fn cell_at(&self, coords: Coord2) -> Cell {
        self.board[coords.to_nd_index()]
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// How many seconds this game has been running, frozen once it ends.
    pub fn elapsed_secs(&self) -> u32 {
        (self.ended_at.unwrap_or_else(Utc::now) - self.started_at)
            .num_seconds()
            .max(0) as u32
    }

    /// How many mines have not been flagged yet; negative when over-flagged.
    pub fn mines_left(&self) -> isize {
        let flagged = self.board.iter().filter(|cell| cell.flagged).count();
        self.config.mines as isize - flagged as isize
    }

    /// Reveals a cell. The first reveal of a game places the mines with the
    /// clicked cell as safe origin, so the first click can never explode.
    pub fn on_click(&mut self, coords: Coord2) -> Result<MoveOutcome> {
        let coords = self.validate_coords(coords)?;

        if self.status.is_finished() {
            return Ok(MoveOutcome::NoChange);
        }
        let cell = self.board[coords.to_nd_index()];
        if cell.revealed || cell.flagged {
            return Ok(MoveOutcome::NoChange);
        }

        if !self.mine_generated {
            generator::place_mines(&mut self.board, self.config.mines, coords, self.seed);
            self.mine_generated = true;
        }

        Ok(self.reveal_cell(coords))
    }

    /// Toggles a flag. Disabled until the first click has generated mines
    /// and once the game is over.
    pub fn on_right_click(&mut self, coords: Coord2) -> Result<FlagOutcome> {
        let coords = self.validate_coords(coords)?;

        if self.status.is_finished() || !self.mine_generated {
            return Ok(FlagOutcome::NoChange);
        }
        let cell = &mut self.board[coords.to_nd_index()];
        if cell.revealed {
            return Ok(FlagOutcome::NoChange);
        }
        cell.flagged = !cell.flagged;
        Ok(FlagOutcome::Toggled)
    }

    /// Chord on a revealed cell. When the neighboring flag count matches the
    /// cell's number, the remaining neighbors are opened; when the hidden
    /// neighbors are exactly the missing mines, they are all flagged. Both
    /// branches are judged against the same snapshot of the neighborhood.
    pub fn expand_flags(&mut self, coords: Coord2) -> Result<MoveOutcome> {
        let coords = self.validate_coords(coords)?;

        if self.status.is_finished() {
            return Ok(MoveOutcome::NoChange);
        }
        let cell = self.board[coords.to_nd_index()];
        if !cell.revealed {
            return Ok(MoveOutcome::NoChange);
        }

        let mut flagged: u8 = 0;
        let mut hidden: u8 = 0;
        for pos in self.board.iter_neighbors(coords) {
            let neighbor = self.board[pos.to_nd_index()];
            if neighbor.flagged {
                flagged += 1;
            } else if !neighbor.revealed {
                hidden += 1;
            }
        }

        let mut outcome = MoveOutcome::NoChange;

        if flagged == cell.adjacent_mines {
            for pos in self.board.iter_neighbors(coords) {
                outcome = outcome | self.reveal_cell(pos);
            }
        }

        if cell.adjacent_mines.checked_sub(flagged) == Some(hidden) {
            for pos in self.board.iter_neighbors(coords) {
                let neighbor = &mut self.board[pos.to_nd_index()];
                if neighbor.is_untouched() {
                    neighbor.flagged = true;
                    outcome = outcome | MoveOutcome::Updated;
                }
            }
        }

        Ok(outcome)
    }

    /// Scans the board and settles the outcome. The owner calls this after
    /// every move; the verdict carries what to present to the player.
    pub fn check_gamestate(&mut self) -> GameVerdict {
        match self.status {
            GameStatus::Won => return GameVerdict::Won,
            GameStatus::Lost => return GameVerdict::Lost,
            GameStatus::Playing => {}
        }
        if !self.mine_generated {
            return GameVerdict::Ongoing;
        }

        if self.board.iter().all(|cell| cell.flagged) {
            log::warn!("every cell flagged, forcing a loss");
            self.on_game_over(GameStatus::Lost);
            return GameVerdict::Cheated;
        }

        // a covered safe cell or a flag on a non-mine both block the win
        let blocked = self
            .board
            .iter()
            .any(|cell| (!cell.revealed && !cell.mine) || (cell.flagged && !cell.mine));
        if blocked {
            GameVerdict::Ongoing
        } else {
            self.on_game_over(GameStatus::Won);
            GameVerdict::Won
        }
    }

    /// Opens a single cell: ends the game on a mine, cascades on a zero.
    /// No-op on revealed or flagged cells, which also makes it safe to call
    /// for every neighbor during a chord.
    fn reveal_cell(&mut self, coords: Coord2) -> MoveOutcome {
        let cell = &mut self.board[coords.to_nd_index()];
        if cell.revealed || cell.flagged {
            return MoveOutcome::NoChange;
        }
        cell.revealed = true;
        let exploded = cell.mine;
        let count = cell.adjacent_mines;

        if exploded {
            log::debug!("mine hit at {:?}", coords);
            self.on_game_over(GameStatus::Lost);
            MoveOutcome::Exploded
        } else {
            log::debug!("opened {:?}, adjacent mines: {}", coords, count);
            self.expand_zero(coords);
            MoveOutcome::Updated
        }
    }

    /// Flood fill over the zero-adjacency region: reveals the connected zero
    /// cells plus their immediate numbered border, skipping flags. Iterative
    /// on purpose; the `revealed` flag doubles as the visited marker, so the
    /// work list never loops.
    fn expand_zero(&mut self, start: Coord2) {
        let cell = self.board[start.to_nd_index()];
        if cell.mine || cell.adjacent_mines != 0 {
            return;
        }

        let mut to_visit = VecDeque::from([start]);
        while let Some(coords) = to_visit.pop_front() {
            for pos in self.board.iter_neighbors(coords) {
                let neighbor = &mut self.board[pos.to_nd_index()];
                if neighbor.revealed || neighbor.flagged {
                    continue;
                }
                neighbor.revealed = true;
                log::trace!("flood opened {:?}, adjacent mines: {}", pos, neighbor.adjacent_mines);
                if neighbor.adjacent_mines == 0 {
                    to_visit.push_back(pos);
                }
            }
        }
    }

    /// Single transition point out of Playing: stamps the end time exactly
    /// once and, on a loss, uncovers every mine.
    fn on_game_over(&mut self, status: GameStatus) {
        if self.status.is_finished() {
            return;
        }
        self.status = status;
        let now = Utc::now();
        self.ended_at.replace(now);
        log::debug!("game over: {:?} at {}", status, now);
        if matches!(status, GameStatus::Lost) {
            self.show_all_mines();
        }
    }

    /// A revealed mine never keeps its flag.
    fn show_all_mines(&mut self) {
        for cell in self.board.iter_mut() {
            if cell.mine {
                cell.revealed = true;
                cell.flagged = false;
            }
        }
    }

    fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        if coords.0 < self.config.width() && coords.1 < self.config.height() {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(size: Coord2, mines: &[Coord2]) -> GamePlay {
        GamePlay::from_mine_coords(size, mines).unwrap()
    }

    #[test]
    fn first_click_is_never_a_mine_nor_next_to_one() {
        let config = GameConfig::new((4, 4), 7).unwrap();
        for seed in 0..32 {
            let mut play = GamePlay::with_seed(config, seed).unwrap();

            assert_eq!(play.on_click((0, 0)).unwrap(), MoveOutcome::Updated);

            assert!(play.mine_generated());
            let clicked = play.cell_at((0, 0));
            assert!(!clicked.mine);
            assert_eq!(clicked.adjacent_mines, 0);
            for pos in play.board().iter_neighbors((0, 0)) {
                assert!(!play.cell_at(pos).mine, "seed {} mined the safe zone", seed);
            }
            assert_eq!(play.cells().filter(|cell| cell.mine).count(), 7);
        }
    }

    #[test]
    fn clicking_a_mine_loses_and_uncovers_every_mine() {
        let mut play = game((2, 2), &[(0, 0), (1, 0)]);
        play.on_click((0, 1)).unwrap();
        play.on_right_click((0, 0)).unwrap();

        assert_eq!(play.on_click((1, 0)).unwrap(), MoveOutcome::Exploded);

        assert_eq!(play.status(), GameStatus::Lost);
        assert!(play.ended_at().is_some());
        for cell in play.cells().filter(|cell| cell.mine) {
            assert!(cell.revealed);
            assert!(!cell.flagged, "a flag survived on a revealed mine");
        }
    }

    #[test]
    fn no_move_is_accepted_after_a_loss() {
        let mut play = game((2, 2), &[(0, 0)]);
        play.on_click((0, 0)).unwrap();
        assert_eq!(play.status(), GameStatus::Lost);
        let ended_at = play.ended_at();

        assert_eq!(play.on_click((1, 1)).unwrap(), MoveOutcome::NoChange);
        assert_eq!(play.on_right_click((1, 1)).unwrap(), FlagOutcome::NoChange);
        assert_eq!(play.expand_flags((1, 1)).unwrap(), MoveOutcome::NoChange);
        assert_eq!(play.status(), GameStatus::Lost);
        assert_eq!(play.ended_at(), ended_at);
    }

    #[test]
    fn clicking_a_flagged_or_revealed_cell_is_a_no_op() {
        let mut play = game((3, 3), &[(0, 0)]);
        play.on_click((2, 2)).unwrap();
        play.on_right_click((0, 0)).unwrap();

        assert_eq!(play.on_click((0, 0)).unwrap(), MoveOutcome::NoChange);
        assert_eq!(play.on_click((2, 2)).unwrap(), MoveOutcome::NoChange);
    }

    #[test]
    fn flagging_before_the_first_click_is_disabled() {
        let config = GameConfig::new((2, 2), 0).unwrap();
        let mut play = GamePlay::with_seed(config, 1).unwrap();

        for coords in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(play.on_right_click(coords).unwrap(), FlagOutcome::NoChange);
        }
        assert!(play.cells().all(|cell| !cell.flagged));
    }

    #[test]
    fn flags_toggle_and_block_reveals() {
        let mut play = game((3, 3), &[(0, 0)]);
        play.on_click((1, 1)).unwrap();

        assert_eq!(play.on_right_click((0, 1)).unwrap(), FlagOutcome::Toggled);
        assert!(play.cell_at((0, 1)).flagged);
        assert_eq!(play.on_click((0, 1)).unwrap(), MoveOutcome::NoChange);
        assert_eq!(play.on_right_click((0, 1)).unwrap(), FlagOutcome::Toggled);
        assert!(!play.cell_at((0, 1)).flagged);
    }

    #[test]
    fn flood_fill_opens_the_zero_region_and_its_border() {
        let mut play = game((4, 4), &[(3, 3)]);

        play.on_click((0, 0)).unwrap();

        for cell in play.cells() {
            if cell.mine {
                assert!(!cell.revealed);
            } else {
                assert!(cell.revealed, "({}, {}) stayed covered", cell.x, cell.y);
            }
        }
    }

    #[test]
    fn flood_fill_never_opens_a_flagged_cell() {
        let mut play = game((4, 4), &[(3, 3)]);
        play.on_click((2, 2)).unwrap();
        play.on_right_click((0, 1)).unwrap();

        play.on_click((0, 3)).unwrap();

        let flagged = play.cell_at((0, 1));
        assert!(!flagged.revealed);
        assert!(flagged.flagged);
        assert!(play.cell_at((0, 0)).revealed);
    }

    #[test]
    fn revealed_cells_stay_revealed() {
        let mut play = game((3, 3), &[(2, 2)]);
        play.on_click((0, 0)).unwrap();
        let revealed: Vec<Coord2> = play
            .cells()
            .filter(|cell| cell.revealed)
            .map(|cell| (cell.x, cell.y))
            .collect();

        play.on_click((2, 2)).unwrap();

        for coords in revealed {
            assert!(play.cell_at(coords).revealed);
        }
    }

    #[test]
    fn chord_reveal_opens_neighbors_when_flags_match() {
        let mut play = game((3, 3), &[(0, 1), (2, 1)]);
        play.on_click((1, 1)).unwrap();
        play.on_right_click((0, 1)).unwrap();
        play.on_right_click((2, 1)).unwrap();

        assert_eq!(play.expand_flags((1, 1)).unwrap(), MoveOutcome::Updated);

        assert!(play.cell_at((1, 0)).revealed);
        assert!(play.cell_at((1, 2)).revealed);
        assert!(!play.cell_at((0, 1)).revealed);
        assert!(!play.cell_at((2, 1)).revealed);
    }

    #[test]
    fn chord_reveal_through_a_wrong_flag_is_a_losing_move() {
        let mut play = game((3, 3), &[(0, 0)]);
        play.on_click((1, 1)).unwrap();
        play.on_right_click((0, 1)).unwrap();

        assert_eq!(play.expand_flags((1, 1)).unwrap(), MoveOutcome::Exploded);
        assert_eq!(play.status(), GameStatus::Lost);
    }

    #[test]
    fn chord_flags_neighbors_when_only_mines_remain() {
        let mut play = game((4, 1), &[(0, 0), (2, 0)]);

        assert_eq!(play.on_click((1, 0)).unwrap(), MoveOutcome::Updated);
        assert_eq!(play.expand_flags((1, 0)).unwrap(), MoveOutcome::Updated);

        assert!(play.cell_at((0, 0)).flagged);
        assert!(play.cell_at((2, 0)).flagged);
        assert!(!play.cell_at((3, 0)).flagged);
    }

    #[test]
    fn chord_on_a_covered_cell_is_a_no_op() {
        let mut play = game((3, 3), &[(0, 0)]);
        play.on_click((1, 1)).unwrap();

        assert_eq!(play.expand_flags((0, 1)).unwrap(), MoveOutcome::NoChange);
    }

    #[test]
    fn win_requires_every_safe_cell_revealed() {
        let mut play = game((2, 2), &[(0, 0)]);
        play.on_click((1, 0)).unwrap();
        play.on_click((0, 1)).unwrap();
        assert_eq!(play.check_gamestate(), GameVerdict::Ongoing);

        play.on_click((1, 1)).unwrap();
        assert_eq!(play.check_gamestate(), GameVerdict::Won);
        assert_eq!(play.status(), GameStatus::Won);
        assert!(play.ended_at().is_some());
        assert!(!play.cell_at((0, 0)).revealed);
    }

    #[test]
    fn a_false_flag_blocks_the_win() {
        let mut play = game((2, 2), &[(0, 0)]);
        play.on_click((1, 0)).unwrap();
        play.on_click((0, 1)).unwrap();
        play.on_right_click((1, 1)).unwrap();

        assert_eq!(play.check_gamestate(), GameVerdict::Ongoing);
        assert_eq!(play.status(), GameStatus::Playing);
    }

    #[test]
    fn flagging_every_cell_counts_as_cheating() {
        let mut play = game((2, 2), &[(0, 0)]);
        for coords in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            play.on_right_click(coords).unwrap();
        }

        assert_eq!(play.check_gamestate(), GameVerdict::Cheated);
        assert_eq!(play.status(), GameStatus::Lost);
        let mine = play.cell_at((0, 0));
        assert!(mine.revealed);
        assert!(!mine.flagged);
    }

    #[test]
    fn verdict_is_stable_once_the_game_ended() {
        let mut play = game((2, 2), &[(0, 0)]);
        play.on_click((0, 0)).unwrap();

        assert_eq!(play.check_gamestate(), GameVerdict::Lost);
        assert_eq!(play.check_gamestate(), GameVerdict::Lost);
    }

    #[test]
    fn check_before_any_click_reports_ongoing() {
        let config = GameConfig::new((4, 4), 3).unwrap();
        let mut play = GamePlay::with_seed(config, 5).unwrap();

        assert_eq!(play.check_gamestate(), GameVerdict::Ongoing);
        assert!(!play.mine_generated());
    }

    #[test]
    fn reset_rebuilds_a_fresh_board() {
        let mut play = game((3, 3), &[(0, 0)]);
        play.on_click((2, 2)).unwrap();
        play.on_right_click((0, 1)).unwrap();

        play.reset_seeded(11);

        assert_eq!(play.status(), GameStatus::Playing);
        assert!(!play.mine_generated());
        assert!(play.ended_at().is_none());
        assert!(play.cells().all(|cell| cell.is_untouched() && !cell.mine));
    }

    #[test]
    fn new_game_applies_the_preset() {
        let mut play = game((2, 2), &[(0, 0)]);
        play.new_game(Level::Hard);

        assert_eq!(play.size(), (10, 10));
        assert_eq!(play.total_mines(), 30);
        assert_eq!(play.status(), GameStatus::Playing);
    }

    #[test]
    fn same_seed_replays_the_same_board() {
        let config = GameConfig::new((10, 10), 20).unwrap();
        let mut first = GamePlay::with_seed(config, 1234).unwrap();
        let mut second = GamePlay::with_seed(config, 1234).unwrap();

        first.on_click((5, 5)).unwrap();
        second.on_click((5, 5)).unwrap();

        assert_eq!(first.board(), second.board());
    }

    #[test]
    fn out_of_bounds_coordinates_are_rejected() {
        let mut play = game((2, 2), &[(0, 0)]);

        assert_eq!(play.on_click((2, 0)), Err(GameError::InvalidCoords));
        assert_eq!(play.on_right_click((0, 9)), Err(GameError::InvalidCoords));
        assert_eq!(play.expand_flags((9, 9)), Err(GameError::InvalidCoords));
    }

    #[test]
    fn mines_left_follows_flags_and_can_go_negative() {
        let mut play = game((3, 3), &[(0, 0)]);
        assert_eq!(play.mines_left(), 1);

        play.on_right_click((0, 1)).unwrap();
        play.on_right_click((1, 0)).unwrap();

        assert_eq!(play.mines_left(), -1);
    }

    #[test]
    fn cells_report_their_own_coordinates() {
        let play = game((3, 2), &[]);
        for cell in play.cells() {
            assert_eq!(play.cell_at((cell.x, cell.y)), *cell);
        }
    }

    #[test]
    fn a_game_snapshot_survives_serialization() {
        let mut play = game((3, 3), &[(2, 2)]);
        play.on_click((0, 0)).unwrap();

        let json = serde_json::to_string(&play).unwrap();
        let restored: GamePlay = serde_json::from_str(&json).unwrap();

        assert_eq!(play, restored);
    }
}
