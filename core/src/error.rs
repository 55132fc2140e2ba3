use thiserror::Error;

use crate::types::{CellCount, Coord};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("{mines} mines do not fit a {width}x{height} board and its safe zone")]
    InvalidConfig {
        width: Coord,
        height: Coord,
        mines: CellCount,
    },
}

pub type Result<T> = core::result::Result<T, GameError>;
