use ndarray::Array2;
use rand::prelude::*;

use crate::{Cell, CellCount, Coord, Coord2, NeighborIterExt, ToNdIndex};

/// Places exactly `mines` mines by rejection sampling: draw a uniform cell,
/// retry while it sits in the safe zone or already holds a mine. The caller
/// has validated the count against `GameConfig::max_mines`, which is what
/// guarantees the loop terminates. Recomputes every adjacency count
/// afterwards.
pub(crate) fn place_mines(board: &mut Array2<Cell>, mines: CellCount, origin: Coord2, seed: u64) {
    let (rows, cols) = board.dim();
    let (width, height) = (cols as Coord, rows as Coord);

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut placed: CellCount = 0;
    while placed < mines {
        let candidate = (rng.random_range(0..width), rng.random_range(0..height));
        if in_safe_zone(candidate, origin) {
            continue;
        }
        let cell = &mut board[candidate.to_nd_index()];
        if cell.mine {
            continue;
        }
        cell.mine = true;
        placed += 1;
    }

    log::debug!("placed {} mines around safe origin {:?}", placed, origin);
    update_numbers(board);
}

/// The clicked cell and its 8 neighbors never receive a mine.
fn in_safe_zone(candidate: Coord2, origin: Coord2) -> bool {
    candidate.0.abs_diff(origin.0) <= 1 && candidate.1.abs_diff(origin.1) <= 1
}

/// Recomputes `adjacent_mines` for every non-mine cell from scratch.
pub(crate) fn update_numbers(board: &mut Array2<Cell>) {
    let (rows, cols) = board.dim();
    for y in 0..rows {
        for x in 0..cols {
            let coords = (x as Coord, y as Coord);
            if board[coords.to_nd_index()].mine {
                continue;
            }
            let count = board
                .iter_neighbors(coords)
                .filter(|&pos| board[pos.to_nd_index()].mine)
                .count() as u8;
            board[coords.to_nd_index()].adjacent_mines = count;
        }
    }
}
