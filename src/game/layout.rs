//! Ship sets, fixed layouts and randomized ship placement

use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Default grid width
pub const DEFAULT_GRID_WIDTH: usize = 6;
/// Default grid height
pub const DEFAULT_GRID_HEIGHT: usize = 6;
/// Default fleet: one 5, one 4, two 3s and one 2
pub const DEFAULT_SHIP_LENGTHS: [usize; 5] = [5, 4, 3, 3, 2];

/// Built-in layout for the default 6x6 fleet. Digits are ship ids, `.` is water.
pub const DEFAULT_FIXED_LAYOUT: &str = "\
    00000.
    .....2
    1111.2
    .....2
    333...
    ....44";

/// Independent whole-fleet draws tried before falling back to sequential placement
const MAX_REJECTION_DRAWS: usize = 4096;

/// Sequential placement gives up after this many full restarts
const MAX_PLACEMENT_ATTEMPTS: usize = 64;

/// Layout errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Invalid grid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Ship set is empty")]
    EmptyShipSet,

    #[error("Ship of length {length} does not fit a {width}x{height} grid")]
    ShipTooLong {
        length: usize,
        width: usize,
        height: usize,
    },

    #[error("Ships need {cells} cells but the grid only has {capacity}")]
    TooManyShipCells { cells: usize, capacity: usize },

    #[error("Fixed layout has {found} cells, expected {expected}")]
    CellCount { expected: usize, found: usize },

    #[error("Unexpected character {0:?} in fixed layout")]
    UnexpectedChar(char),

    #[error("Ship {0:?} is not a straight contiguous run")]
    NotStraight(char),

    #[error("Fixed layout ship lengths {found:?} do not match the ship set {expected:?}")]
    ShipSetMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("No non-overlapping placement found after {0} attempts")]
    PlacementExhausted(usize),
}

/// Ship orientation on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Grid dimensions plus the multiset of ship lengths every grid must carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipSet {
    width: usize,
    height: usize,
    lengths: Vec<usize>,
}

impl ShipSet {
    pub fn new(width: usize, height: usize, lengths: Vec<usize>) -> Result<Self, LayoutError> {
        let capacity = match width.checked_mul(height) {
            Some(capacity) if capacity > 0 => capacity,
            _ => return Err(LayoutError::InvalidDimensions { width, height }),
        };
        if lengths.is_empty() {
            return Err(LayoutError::EmptyShipSet);
        }
        for &length in &lengths {
            if length == 0 || length > width.max(height) {
                return Err(LayoutError::ShipTooLong {
                    length,
                    width,
                    height,
                });
            }
        }

        let cells: usize = lengths.iter().sum();
        if cells > capacity {
            return Err(LayoutError::TooManyShipCells { cells, capacity });
        }

        Ok(Self {
            width,
            height,
            lengths,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Ship lengths in ship-id order
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Total number of cells on a grid
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Total number of cells covered by ships
    pub fn ship_cell_count(&self) -> usize {
        self.lengths.iter().sum()
    }

    /// Cells covered by a ship of `length` starting at (`row`, `col`), if it stays on the grid
    fn run_cells(
        &self,
        row: usize,
        col: usize,
        length: usize,
        orientation: Orientation,
    ) -> Option<Vec<usize>> {
        match orientation {
            Orientation::Horizontal if col + length <= self.width && row < self.height => {
                Some((0..length).map(|i| row * self.width + col + i).collect())
            }
            Orientation::Vertical if row + length <= self.height && col < self.width => {
                Some((0..length).map(|i| (row + i) * self.width + col).collect())
            }
            _ => None,
        }
    }
}

impl Default for ShipSet {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
            lengths: DEFAULT_SHIP_LENGTHS.to_vec(),
        }
    }
}

/// Concrete ship positions: cell indices per ship, in ship-id order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub ships: Vec<Vec<usize>>,
}

/// A pre-validated, hand-drawn layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLayout {
    placement: Placement,
}

impl FixedLayout {
    /// Parse a text grid: one character per cell, `.` for water, `0`-`9` for ship ids.
    /// Whitespace is ignored so rows may be laid out on separate lines.
    pub fn parse(ship_set: &ShipSet, text: &str) -> Result<Self, LayoutError> {
        let symbols: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if symbols.len() != ship_set.cell_count() {
            return Err(LayoutError::CellCount {
                expected: ship_set.cell_count(),
                found: symbols.len(),
            });
        }

        // BTreeMap keeps ships in id order
        let mut ships: BTreeMap<char, Vec<usize>> = BTreeMap::new();
        for (index, symbol) in symbols.into_iter().enumerate() {
            match symbol {
                '.' => {}
                '0'..='9' => ships.entry(symbol).or_default().push(index),
                other => return Err(LayoutError::UnexpectedChar(other)),
            }
        }

        for (&id, cells) in &ships {
            if !is_straight_run(cells, ship_set.width()) {
                return Err(LayoutError::NotStraight(id));
            }
        }

        let mut expected = ship_set.lengths().to_vec();
        let mut found: Vec<usize> = ships.values().map(Vec::len).collect();
        expected.sort_unstable();
        found.sort_unstable();
        if expected != found {
            return Err(LayoutError::ShipSetMismatch { expected, found });
        }

        Ok(Self {
            placement: Placement {
                ships: ships.into_values().collect(),
            },
        })
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }
}

/// Sorted cells form one row segment or one column segment without gaps
fn is_straight_run(cells: &[usize], width: usize) -> bool {
    if cells.len() < 2 {
        return true;
    }
    let same_row = cells.iter().all(|c| c / width == cells[0] / width);
    if same_row {
        return cells.windows(2).all(|w| w[1] == w[0] + 1);
    }
    cells.windows(2).all(|w| w[1] == w[0] + width)
}

/// Where grid placements come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutMode {
    /// Fresh non-overlapping placement on every generation
    Random,
    /// The same hand-drawn placement every time
    Fixed(FixedLayout),
}

/// The configured layout every grid in the process is generated from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    ship_set: ShipSet,
    mode: LayoutMode,
}

impl Layout {
    pub fn random(ship_set: ShipSet) -> Self {
        Self {
            ship_set,
            mode: LayoutMode::Random,
        }
    }

    pub fn fixed(ship_set: ShipSet, text: &str) -> Result<Self, LayoutError> {
        let fixed = FixedLayout::parse(&ship_set, text)?;
        Ok(Self {
            ship_set,
            mode: LayoutMode::Fixed(fixed),
        })
    }

    pub fn ship_set(&self) -> &ShipSet {
        &self.ship_set
    }

    pub fn mode(&self) -> &LayoutMode {
        &self.mode
    }

    /// Produce a placement satisfying the ship set
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Result<Placement, LayoutError> {
        match &self.mode {
            LayoutMode::Fixed(fixed) => Ok(fixed.placement().clone()),
            LayoutMode::Random => random_placement(&self.ship_set, rng),
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::random(ShipSet::default())
    }
}

/// Draw a placement uniformly from every valid placement of the ship set.
///
/// Each ship is drawn independently from all of its on-grid runs and the whole
/// draw is thrown away on any overlap, so every non-overlapping placement is
/// equally likely. Fleets packed too tightly for that fall back to sequential
/// placement.
pub fn random_placement<R: Rng>(
    ship_set: &ShipSet,
    rng: &mut R,
) -> Result<Placement, LayoutError> {
    if let Some(placement) = rejection_placement(ship_set, rng) {
        return Ok(placement);
    }

    debug!(
        draws = MAX_REJECTION_DRAWS,
        "Rejection sampling exhausted, placing ships sequentially"
    );
    sequential_placement(ship_set, rng)
}

fn rejection_placement<R: Rng>(ship_set: &ShipSet, rng: &mut R) -> Option<Placement> {
    let lengths = ship_set.lengths();
    let empty = vec![false; ship_set.cell_count()];
    let runs: Vec<Vec<Vec<usize>>> = lengths
        .iter()
        .map(|&length| candidate_runs(ship_set, length, &empty))
        .collect();
    if runs.iter().any(Vec::is_empty) {
        return None;
    }

    // longest ships first so most overlaps are caught early
    let order = longest_first(lengths);
    let mut occupied = vec![false; ship_set.cell_count()];

    'draw: for _ in 0..MAX_REJECTION_DRAWS {
        occupied.fill(false);
        let mut ships = vec![Vec::new(); lengths.len()];

        for &ship_id in &order {
            let options = &runs[ship_id];
            let cells = &options[rng.gen_range(0..options.len())];
            if cells.iter().any(|&c| occupied[c]) {
                continue 'draw;
            }
            for &cell in cells {
                occupied[cell] = true;
            }
            ships[ship_id] = cells.clone();
        }

        return Some(Placement { ships });
    }

    None
}

/// Place ships longest-first, each drawn from the positions still free.
/// Restarts from an empty grid when a ship has nowhere to go.
fn sequential_placement<R: Rng>(
    ship_set: &ShipSet,
    rng: &mut R,
) -> Result<Placement, LayoutError> {
    let lengths = ship_set.lengths();
    let order = longest_first(lengths);

    'attempt: for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let mut occupied = vec![false; ship_set.cell_count()];
        let mut ships = vec![Vec::new(); lengths.len()];

        for &ship_id in &order {
            let mut candidates = candidate_runs(ship_set, lengths[ship_id], &occupied);
            if candidates.is_empty() {
                continue 'attempt;
            }
            let cells = candidates.swap_remove(rng.gen_range(0..candidates.len()));
            for &cell in &cells {
                occupied[cell] = true;
            }
            ships[ship_id] = cells;
        }

        return Ok(Placement { ships });
    }

    Err(LayoutError::PlacementExhausted(MAX_PLACEMENT_ATTEMPTS))
}

fn longest_first(lengths: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by(|a, b| lengths[*b].cmp(&lengths[*a]));
    order
}

/// Every on-grid run of `length` cells that avoids occupied cells
fn candidate_runs(ship_set: &ShipSet, length: usize, occupied: &[bool]) -> Vec<Vec<usize>> {
    // A single cell is the same run in both orientations
    let orientations: &[Orientation] = if length == 1 {
        &[Orientation::Horizontal]
    } else {
        &[Orientation::Horizontal, Orientation::Vertical]
    };

    let mut runs = Vec::new();
    for &orientation in orientations {
        for row in 0..ship_set.height() {
            for col in 0..ship_set.width() {
                if let Some(cells) = ship_set.run_cells(row, col, length, orientation) {
                    if cells.iter().all(|&c| !occupied[c]) {
                        runs.push(cells);
                    }
                }
            }
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn default_fixed_layout_matches_default_ship_set() {
        let layout = Layout::fixed(ShipSet::default(), DEFAULT_FIXED_LAYOUT).unwrap();
        let placement = layout.generate(&mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        let lengths: Vec<usize> = placement.ships.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![5, 4, 3, 3, 2]);
        assert_eq!(placement.ships[2], vec![11, 17, 23]);
    }

    #[test]
    fn bent_ship_is_rejected() {
        let text = "00000.
                    ....02
                    1111.2
                    .....2
                    333...
                    ....44";
        // ship 0 now has six cells and is bent
        let err = FixedLayout::parse(&ShipSet::default(), text).unwrap_err();
        assert_eq!(err, LayoutError::NotStraight('0'));
    }

    #[test]
    fn row_wrap_is_not_a_straight_run() {
        let ship_set = ShipSet::new(3, 2, vec![2]).unwrap();
        let err = FixedLayout::parse(&ship_set, "..0 0..").unwrap_err();
        assert_eq!(err, LayoutError::NotStraight('0'));
    }

    #[test]
    fn fixed_layout_must_match_fleet() {
        let ship_set = ShipSet::new(3, 3, vec![2, 2]).unwrap();
        let err = FixedLayout::parse(&ship_set, "00. ... 111").unwrap_err();
        assert_eq!(
            err,
            LayoutError::ShipSetMismatch {
                expected: vec![2, 2],
                found: vec![2, 3],
            }
        );
    }

    #[test]
    fn fixed_layout_cell_count_checked() {
        let err = FixedLayout::parse(&ShipSet::default(), "00000").unwrap_err();
        assert_eq!(err, LayoutError::CellCount { expected: 36, found: 5 });
    }

    #[test]
    fn fixed_layout_rejects_unknown_symbols() {
        let ship_set = ShipSet::new(2, 1, vec![1]).unwrap();
        let err = FixedLayout::parse(&ship_set, "0x").unwrap_err();
        assert_eq!(err, LayoutError::UnexpectedChar('x'));
    }

    #[test]
    fn ship_set_validation() {
        assert_eq!(
            ShipSet::new(0, 6, vec![2]).unwrap_err(),
            LayoutError::InvalidDimensions { width: 0, height: 6 }
        );
        assert_eq!(ShipSet::new(6, 6, vec![]).unwrap_err(), LayoutError::EmptyShipSet);
        assert!(matches!(
            ShipSet::new(4, 4, vec![5]),
            Err(LayoutError::ShipTooLong { length: 5, .. })
        ));
        assert_eq!(
            ShipSet::new(2, 2, vec![2, 2, 1]).unwrap_err(),
            LayoutError::TooManyShipCells { cells: 5, capacity: 4 }
        );
    }

    #[test]
    fn random_placement_has_no_overlaps() {
        let ship_set = ShipSet::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let placement = random_placement(&ship_set, &mut rng).unwrap();
            let mut seen = HashSet::new();
            for (id, cells) in placement.ships.iter().enumerate() {
                assert_eq!(cells.len(), ship_set.lengths()[id]);
                assert!(is_straight_run(cells, ship_set.width()));
                for &cell in cells {
                    assert!(cell < ship_set.cell_count());
                    assert!(seen.insert(cell), "cell {cell} used twice");
                }
            }
        }
    }

    #[test]
    fn placement_is_reproducible_from_seed() {
        let ship_set = ShipSet::default();
        let a = random_placement(&ship_set, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = random_placement(&ship_set, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fully_packed_grid_is_placeable() {
        let ship_set = ShipSet::new(2, 2, vec![2, 2]).unwrap();
        let placement = random_placement(&ship_set, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let mut cells: Vec<usize> = placement.ships.concat();
        cells.sort_unstable();
        assert_eq!(cells, vec![0, 1, 2, 3]);
    }

    #[test]
    fn random_layouts_vary_between_draws() {
        let layout = Layout::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let distinct: HashSet<Vec<Vec<usize>>> = (0..20)
            .map(|_| layout.generate(&mut rng).unwrap().ships)
            .collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn every_valid_placement_is_equally_likely() {
        // 6 runs for the 3 and 12 for the 2 give 36 non-overlapping placements
        let ship_set = ShipSet::new(3, 3, vec![3, 2]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut counts: HashMap<Vec<Vec<usize>>, usize> = HashMap::new();
        for _ in 0..36_000 {
            let placement = random_placement(&ship_set, &mut rng).unwrap();
            *counts.entry(placement.ships).or_default() += 1;
        }

        assert_eq!(counts.len(), 36);
        let min = counts.values().copied().min().unwrap();
        let max = counts.values().copied().max().unwrap();
        assert!(min > 850 && max < 1150, "min {min}, max {max}");
    }

    #[test]
    fn sequential_fallback_fills_packed_grid() {
        let ship_set = ShipSet::new(4, 4, vec![4, 4, 4, 4]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            let placement = sequential_placement(&ship_set, &mut rng).unwrap();
            let mut cells: Vec<usize> = placement.ships.concat();
            cells.sort_unstable();
            assert_eq!(cells, (0..16).collect::<Vec<_>>());
        }
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        assert_eq!(
            ShipSet::new(usize::MAX, 2, vec![2]).unwrap_err(),
            LayoutError::InvalidDimensions {
                width: usize::MAX,
                height: 2
            }
        );
    }

    #[test]
    fn single_cell_ships_are_placed_once_per_cell() {
        let ship_set = ShipSet::new(2, 1, vec![1]).unwrap();
        let runs = candidate_runs(&ship_set, 1, &[false, false]);
        assert_eq!(runs, vec![vec![0], vec![1]]);
    }
}
