//! One participant's board: ship placement, per-cell state and lock status

use rand::Rng;

use crate::ws::protocol::{CellState, ShipStatus};

use super::layout::{Layout, LayoutError, Placement, ShipSet};

/// Grid errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Grid is locked")]
    Locked,

    #[error("Layout generation failed: {0}")]
    Layout(#[from] LayoutError),
}

/// A ship placed on a grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ship {
    pub id: usize,
    pub length: usize,
    pub cells: Vec<usize>,
    pub destroyed: bool,
}

/// Result of a shot that struck a ship segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Segment hit, ship still afloat
    Hit,
    /// Last segment hit, whole ship destroyed
    Sunk { ship_id: usize, length: usize },
}

/// A participant's grid
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<CellState>,
    ships: Vec<Ship>,
    /// Ship id occupying each cell
    owners: Vec<Option<usize>>,
    locked: bool,
}

impl Grid {
    /// Create an empty, unlocked grid sized for the ship set
    pub fn new(ship_set: &ShipSet) -> Self {
        let size = ship_set.cell_count();
        Self {
            width: ship_set.width(),
            height: ship_set.height(),
            cells: vec![CellState::Water; size],
            ships: Vec::new(),
            owners: vec![None; size],
            locked: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Full view of every cell, ships included
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Repopulate ships and cells from the layout. Refused once locked.
    pub fn generate<R: Rng>(&mut self, layout: &Layout, rng: &mut R) -> Result<(), GridError> {
        if self.locked {
            return Err(GridError::Locked);
        }
        let placement = layout.generate(rng)?;
        self.apply_placement(placement);
        Ok(())
    }

    fn apply_placement(&mut self, placement: Placement) {
        self.cells.fill(CellState::Water);
        self.owners.fill(None);
        self.ships.clear();

        for (id, cells) in placement.ships.into_iter().enumerate() {
            for &cell in &cells {
                self.cells[cell] = CellState::IntactShip;
                self.owners[cell] = Some(id);
            }
            self.ships.push(Ship {
                id,
                length: cells.len(),
                cells,
                destroyed: false,
            });
        }
    }

    /// Freeze the placement for the rest of the match
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// A cell may be targeted while it has not been resolved yet
    pub fn is_clickable(&self, index: usize) -> bool {
        self.cells
            .get(index)
            .map_or(false, |cell| matches!(cell, CellState::Water | CellState::IntactShip))
    }

    pub fn is_intact_ship(&self, index: usize) -> bool {
        self.cells.get(index) == Some(&CellState::IntactShip)
    }

    /// Strike an intact ship segment. Returns `None` when the cell holds no intact segment.
    pub fn apply_hit(&mut self, index: usize) -> Option<HitOutcome> {
        if !self.is_intact_ship(index) {
            return None;
        }
        let ship_id = self.owners[index]?;
        self.cells[index] = CellState::Hit;

        let ship = &mut self.ships[ship_id];
        let cells = &mut self.cells;
        if ship.cells.iter().any(|&c| cells[c] == CellState::IntactShip) {
            return Some(HitOutcome::Hit);
        }

        for &c in &ship.cells {
            cells[c] = CellState::Destroyed;
        }
        ship.destroyed = true;
        Some(HitOutcome::Sunk {
            ship_id,
            length: ship.length,
        })
    }

    /// Mark open water as missed. Returns `false` when the cell is not open water.
    pub fn apply_miss(&mut self, index: usize) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) if *cell == CellState::Water => {
                *cell = CellState::Missed;
                true
            }
            _ => false,
        }
    }

    /// Whether any ship segment is still unhit
    pub fn has_surviving_ship_parts(&self) -> bool {
        self.cells.contains(&CellState::IntactShip)
    }

    /// Copy safe to show the opponent: unhit ship segments look like water
    pub fn exposed_view(&self) -> Vec<CellState> {
        self.cells
            .iter()
            .map(|&cell| match cell {
                CellState::IntactShip => CellState::Water,
                other => other,
            })
            .collect()
    }

    /// Fleet legend in ship-id order
    pub fn ship_summary(&self) -> Vec<ShipStatus> {
        self.ships
            .iter()
            .map(|ship| ShipStatus {
                length: ship.length,
                destroyed: ship.destroyed,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::DEFAULT_FIXED_LAYOUT;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fixed_grid() -> Grid {
        let layout = Layout::fixed(ShipSet::default(), DEFAULT_FIXED_LAYOUT).unwrap();
        let mut grid = Grid::new(layout.ship_set());
        grid.generate(&layout, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        grid
    }

    #[test]
    fn new_grid_is_open_water() {
        let grid = Grid::new(&ShipSet::default());
        assert_eq!(grid.len(), 36);
        assert!(grid.cells().iter().all(|&c| c == CellState::Water));
        assert!(!grid.has_surviving_ship_parts());
        assert!(grid.ship_summary().is_empty());
    }

    #[test]
    fn generate_places_the_fleet() {
        let grid = fixed_grid();
        let intact = grid
            .cells()
            .iter()
            .filter(|&&c| c == CellState::IntactShip)
            .count();
        assert_eq!(intact, 17);
        assert_eq!(grid.ships().len(), 5);
        assert!(grid.is_intact_ship(0));
        assert!(!grid.is_intact_ship(5));
    }

    #[test]
    fn locked_grid_refuses_generation() {
        let layout = Layout::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut grid = Grid::new(layout.ship_set());
        grid.generate(&layout, &mut rng).unwrap();
        let before = grid.cells().to_vec();

        grid.lock();
        assert_eq!(grid.generate(&layout, &mut rng), Err(GridError::Locked));
        assert_eq!(grid.cells(), before.as_slice());
    }

    #[test]
    fn hitting_every_segment_sinks_the_ship() {
        let mut grid = fixed_grid();
        // ship 4 occupies cells 34 and 35
        assert_eq!(grid.apply_hit(34), Some(HitOutcome::Hit));
        assert_eq!(grid.cells()[34], CellState::Hit);
        assert!(!grid.ship_summary()[4].destroyed);

        assert_eq!(
            grid.apply_hit(35),
            Some(HitOutcome::Sunk {
                ship_id: 4,
                length: 2
            })
        );
        assert_eq!(grid.cells()[34], CellState::Destroyed);
        assert_eq!(grid.cells()[35], CellState::Destroyed);
        assert!(grid.ship_summary()[4].destroyed);
    }

    #[test]
    fn resolved_and_out_of_range_cells_are_rejected() {
        let mut grid = fixed_grid();
        assert!(!grid.is_clickable(36));
        assert_eq!(grid.apply_hit(36), None);
        assert!(!grid.apply_miss(36));

        assert!(grid.apply_miss(5));
        assert!(!grid.is_clickable(5));
        assert!(!grid.apply_miss(5));

        grid.apply_hit(0);
        assert!(!grid.is_clickable(0));
        assert_eq!(grid.apply_hit(0), None);

        // water is not a ship, ship is not water
        assert_eq!(grid.apply_hit(6), None);
        assert!(!grid.apply_miss(1));
    }

    #[test]
    fn exposed_view_hides_only_intact_segments() {
        let mut grid = fixed_grid();
        grid.apply_hit(0);
        grid.apply_miss(5);
        grid.apply_hit(34);
        grid.apply_hit(35);

        let view = grid.exposed_view();
        assert!(!view.contains(&CellState::IntactShip));
        assert_eq!(view[0], CellState::Hit);
        assert_eq!(view[1], CellState::Water);
        assert_eq!(view[5], CellState::Missed);
        assert_eq!(view[34], CellState::Destroyed);
        // the owner still sees the intact segment
        assert_eq!(grid.cells()[1], CellState::IntactShip);
    }

    #[test]
    fn sinking_everything_leaves_no_surviving_parts() {
        let mut grid = fixed_grid();
        let targets: Vec<usize> = grid.ships().iter().flat_map(|s| s.cells.clone()).collect();
        for index in targets {
            assert!(grid.has_surviving_ship_parts());
            grid.apply_hit(index);
        }
        assert!(!grid.has_surviving_ship_parts());
        assert!(grid.ship_summary().iter().all(|s| s.destroyed));
    }
}
