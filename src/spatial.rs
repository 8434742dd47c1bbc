//! Proximity queries over people's positions.
//!
//! [`ProximityIndex`] is the seam the transmission model queries through.
//! [`GridIndex`] buckets positions into square cells whose side is the
//! exposure distance, so a query at that radius touches at most nine cells.
use crate::error::ModelError;
use crate::geometry::Point;
use crate::hashing::{HashMap, HashMapExt};
use crate::people::PersonId;

pub trait ProximityIndex {
    /// Registers a person at `position`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person is already registered.
    fn insert(&mut self, person_id: PersonId, position: Point) -> Result<(), ModelError>;

    /// Moves a registered person.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person is not registered.
    fn update(&mut self, person_id: PersonId, position: Point) -> Result<(), ModelError>;

    /// Everyone within `radius` of `position` (inclusive), except `exclude`.
    /// Repeated queries over the same index state return the same order.
    fn neighbors_within(
        &self,
        position: Point,
        radius: f64,
        exclude: Option<PersonId>,
    ) -> Vec<PersonId>;

    fn position(&self, person_id: PersonId) -> Option<Point>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Cell = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct Slot {
    position: Point,
    cell: Cell,
    index: usize,
}

#[derive(Debug)]
pub struct GridIndex {
    cell_size: f64,
    cells: HashMap<Cell, Vec<PersonId>>,
    slots: Vec<Option<Slot>>,
    len: usize,
}

impl GridIndex {
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if `cell_size` is not a
    /// positive finite number.
    pub fn new(cell_size: f64) -> Result<GridIndex, ModelError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ModelError::InvariantViolation(format!(
                "grid cell size must be positive, got {cell_size}"
            )));
        }
        Ok(GridIndex {
            cell_size,
            cells: HashMap::new(),
            slots: Vec::new(),
            len: 0,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_coordinate(&self, value: f64) -> i64 {
        (value / self.cell_size).floor() as i64
    }

    fn cell_of(&self, position: Point) -> Cell {
        (
            self.cell_coordinate(position.x),
            self.cell_coordinate(position.y),
        )
    }

    // Keeps the remaining members in the order they entered the cell.
    fn remove_from_cell(&mut self, slot: Slot) {
        let mut emptied = false;
        if let Some(members) = self.cells.get_mut(&slot.cell) {
            members.remove(slot.index);
            for &shifted in &members[slot.index..] {
                if let Some(Some(shifted_slot)) = self.slots.get_mut(shifted.0) {
                    shifted_slot.index -= 1;
                }
            }
            emptied = members.is_empty();
        }
        if emptied {
            self.cells.remove(&slot.cell);
        }
    }

    fn add_to_cell(&mut self, person_id: PersonId, position: Point) -> Slot {
        let cell = self.cell_of(position);
        let members = self.cells.entry(cell).or_default();
        members.push(person_id);
        Slot {
            position,
            cell,
            index: members.len() - 1,
        }
    }

    fn cells_in_range(&self, position: Point, radius: f64) -> Vec<Cell> {
        let (x0, y0) = self.cell_of(Point::new(position.x - radius, position.y - radius));
        let (x1, y1) = self.cell_of(Point::new(position.x + radius, position.y + radius));
        let span = x1
            .saturating_sub(x0)
            .saturating_add(1)
            .saturating_mul(y1.saturating_sub(y0).saturating_add(1));
        if usize::try_from(span).map_or(true, |span| span > self.cells.len()) {
            // Wide queries scan the occupied cells instead of the whole range.
            let mut occupied: Vec<Cell> = self
                .cells
                .keys()
                .filter(|(x, y)| (x0..=x1).contains(x) && (y0..=y1).contains(y))
                .copied()
                .collect();
            occupied.sort_unstable();
            return occupied;
        }
        (x0..=x1)
            .flat_map(|x| (y0..=y1).map(move |y| (x, y)))
            .collect()
    }
}

impl ProximityIndex for GridIndex {
    fn insert(&mut self, person_id: PersonId, position: Point) -> Result<(), ModelError> {
        if self.position(person_id).is_some() {
            return Err(ModelError::InvariantViolation(format!(
                "{person_id} is already in the spatial index"
            )));
        }
        if self.slots.len() <= person_id.0 {
            self.slots.resize(person_id.0 + 1, None);
        }
        let slot = self.add_to_cell(person_id, position);
        self.slots[person_id.0] = Some(slot);
        self.len += 1;
        Ok(())
    }

    fn update(&mut self, person_id: PersonId, position: Point) -> Result<(), ModelError> {
        let Some(Some(slot)) = self.slots.get(person_id.0).copied() else {
            return Err(ModelError::InvariantViolation(format!(
                "{person_id} is not in the spatial index"
            )));
        };
        if self.cell_of(position) == slot.cell {
            if let Some(Some(current)) = self.slots.get_mut(person_id.0) {
                current.position = position;
            }
            return Ok(());
        }
        self.remove_from_cell(slot);
        let new_slot = self.add_to_cell(person_id, position);
        self.slots[person_id.0] = Some(new_slot);
        Ok(())
    }

    fn neighbors_within(
        &self,
        position: Point,
        radius: f64,
        exclude: Option<PersonId>,
    ) -> Vec<PersonId> {
        let radius_squared = radius * radius;
        let mut neighbors = Vec::new();
        for cell in self.cells_in_range(position, radius) {
            let Some(members) = self.cells.get(&cell) else {
                continue;
            };
            for &person_id in members {
                if Some(person_id) == exclude {
                    continue;
                }
                let within = self.slots[person_id.0]
                    .is_some_and(|slot| slot.position.distance_squared(&position) <= radius_squared);
                if within {
                    neighbors.push(person_id);
                }
            }
        }
        neighbors
    }

    fn position(&self, person_id: PersonId) -> Option<Point> {
        self.slots
            .get(person_id.0)
            .copied()
            .flatten()
            .map(|slot| slot.position)
    }

    fn len(&self) -> usize {
        self.len
    }
}
