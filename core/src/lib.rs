use core::ops::BitOr;
use serde::{Deserialize, Serialize};

pub use cell::*;
pub use engine::*;
pub use error::*;
pub use types::*;

mod cell;
mod engine;
mod error;
mod generator;
mod types;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub size: Coord2,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    pub fn new(size: Coord2, mines: CellCount) -> Result<Self> {
        let config = Self::new_unchecked(size, mines);
        config.validate()?;
        Ok(config)
    }

    /// Rejects degenerate boards and mine counts that leave no room for the
    /// 3x3 first-click safe zone; such a count would make placement spin
    /// forever.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.size;
        if width == 0 || height == 0 || self.mines > self.max_mines() {
            return Err(GameError::InvalidConfig {
                width,
                height,
                mines: self.mines,
            });
        }
        Ok(())
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }

    /// Most mines a board can hold while keeping a full safe zone free.
    pub const fn max_mines(&self) -> CellCount {
        self.total_cells().saturating_sub(9)
    }

    pub const fn width(&self) -> Coord {
        self.size.0
    }

    pub const fn height(&self) -> Coord {
        self.size.1
    }
}

/// Named presets, all on the classic 10x10 board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Easy,
    Normal,
    Hard,
}

impl Level {
    pub const fn config(self) -> GameConfig {
        let mines = match self {
            Self::Easy => 5,
            Self::Normal => 20,
            Self::Hard => 30,
        };
        GameConfig::new_unchecked((10, 10), mines)
    }
}

/// Outcome of a reveal-style move (click or chord)
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    NoChange,
    Updated,
    Exploded,
}

impl MoveOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        use MoveOutcome::*;
        match self {
            NoChange => false,
            Updated => true,
            Exploded => true,
        }
    }
}

/// Used to merge outcomes when a chord opens several cells
impl BitOr for MoveOutcome {
    type Output = MoveOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use MoveOutcome::*;
        match (self, rhs) {
            // an explosion outranks everything
            (Exploded, _) => Exploded,
            (_, Exploded) => Exploded,
            (Updated, _) => Updated,
            (_, Updated) => Updated,
            (NoChange, NoChange) => NoChange,
        }
    }
}

/// Outcome of a flag toggle
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlagOutcome {
    NoChange,
    Toggled,
}

impl FlagOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Toggled => true,
        }
    }
}

/// What a state check observed; the caller presents it to the player.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GameVerdict {
    Ongoing,
    Won,
    Lost,
    /// Every single cell was flagged, which honest play never produces.
    Cheated,
}
