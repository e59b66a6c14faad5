use crate::cell::Cell;
use crate::error::{StoreError, StoreResult};
use crate::geometry::Geometry;
use crate::style::Style;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Produces `[prefix-]N[-postfix]` candidates from a counter that only ever
/// moves forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGenerator {
    prefix: String,
    postfix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            postfix: postfix.into(),
            next: 0,
        }
    }

    fn advance(&mut self) -> String {
        let n = self.next;
        self.next += 1;

        let mut id = String::new();
        if !self.prefix.is_empty() {
            id.push_str(&self.prefix);
            id.push('-');
        }
        id.push_str(&n.to_string());
        if !self.postfix.is_empty() {
            id.push('-');
            id.push_str(&self.postfix);
        }
        id
    }
}

/// Owner of every cell of one diagram, keyed by id in insertion order.
///
/// Cells refer to each other by id only; [`CellStore::parent_of`],
/// [`CellStore::source_of`] and [`CellStore::target_of`] resolve those ids on
/// each call, so a reference may name a cell that is added later.
#[derive(Debug, Clone, Default)]
pub struct CellStore {
    cells: IndexMap<String, Cell>,
    ids: IdGenerator,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_affixes(prefix: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            cells: IndexMap::new(),
            ids: IdGenerator::new(prefix, postfix),
        }
    }

    /// Next generated id not present in the store.
    pub fn new_id(&mut self) -> String {
        loop {
            let candidate = self.ids.advance();
            if !self.cells.contains_key(&candidate) {
                return candidate;
            }
            tracing::trace!(id = %candidate, "generated id already taken, skipping");
        }
    }

    /// Adds `cell`; on a duplicate id the store is left untouched.
    pub fn add(&mut self, cell: Cell) -> StoreResult<&mut Cell> {
        match self.cells.entry(cell.id().to_string()) {
            Entry::Occupied(e) => Err(StoreError::DuplicateId(e.key().clone())),
            Entry::Vacant(e) => Ok(e.insert(cell)),
        }
    }

    pub fn get(&self, id: &str) -> StoreResult<&Cell> {
        self.cells
            .get(id)
            .ok_or_else(|| StoreError::CellNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> StoreResult<&mut Cell> {
        self.cells
            .get_mut(id)
            .ok_or_else(|| StoreError::CellNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    /// Removes a cell keeping the order of the others. References to it from
    /// other cells are left as they are and fail on resolution.
    pub fn remove(&mut self, id: &str) -> Option<Cell> {
        self.cells.shift_remove(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn create_group(&mut self, parent: Option<&str>) -> &mut Cell {
        let id = self.new_id();
        self.insert_new(Cell::group(id).with_parent(parent))
    }

    pub fn create_vertex(
        &mut self,
        parent: Option<&str>,
        style: Style,
        geometry: Option<Geometry>,
    ) -> &mut Cell {
        let id = self.new_id();
        self.insert_new(Cell::vertex(id, style, geometry).with_parent(parent))
    }

    pub fn create_edge(
        &mut self,
        parent: Option<&str>,
        source: Option<&str>,
        target: Option<&str>,
        style: Style,
        geometry: Option<Geometry>,
    ) -> &mut Cell {
        let id = self.new_id();
        self.insert_new(Cell::edge(id, source, target, style, geometry).with_parent(parent))
    }

    // only called with ids from `new_id`, which are never present
    fn insert_new(&mut self, cell: Cell) -> &mut Cell {
        self.cells.entry(cell.id().to_string()).or_insert(cell)
    }

    fn resolve(&self, id: Option<&str>) -> StoreResult<Option<&Cell>> {
        id.map(|id| self.get(id)).transpose()
    }

    /// `Ok(None)` for a root cell.
    pub fn parent_of(&self, cell: &Cell) -> StoreResult<Option<&Cell>> {
        self.resolve(cell.parent_id())
    }

    /// `Ok(None)` for non-edges and for edges whose source is a free point.
    pub fn source_of(&self, cell: &Cell) -> StoreResult<Option<&Cell>> {
        self.resolve(cell.source_id())
    }

    pub fn target_of(&self, cell: &Cell) -> StoreResult<Option<&Cell>> {
        self.resolve(cell.target_id())
    }

    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells
            .values()
            .filter(move |c| c.parent_id() == Some(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values().filter(|c| c.parent_id().is_none())
    }

    /// Resolves every reference and reports the first one that fails.
    pub fn validate(&self) -> StoreResult<()> {
        for cell in self.cells.values() {
            self.parent_of(cell)?;
            self.source_of(cell)?;
            self.target_of(cell)?;
        }
        Ok(())
    }
}

/// Stores are equal when they hold the same cells in the same order; the id
/// counter is not compared.
impl PartialEq for CellStore {
    fn eq(&self, other: &Self) -> bool {
        self.cells.len() == other.cells.len()
            && self.cells.iter().zip(&other.cells).all(|(a, b)| a == b)
    }
}

impl Eq for CellStore {}

impl Serialize for CellStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.cells.values())
    }
}

/// Reads the cell list written by `Serialize`; a repeated id is an error.
impl<'de> Deserialize<'de> for CellStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut store = CellStore::new();
        for cell in Vec::<Cell>::deserialize(deserializer)? {
            store.add(cell).map_err(D::Error::custom)?;
        }
        Ok(store)
    }
}
