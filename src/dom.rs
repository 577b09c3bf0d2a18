//! CIF Document Object Model.
//!
//! A [`Document`] maps lower-cased block names to [`DataBlock`]s. Every
//! block-like section shares the [`Block`] shape: scalar items plus tables,
//! both keyed by lower-cased tag (stored without the leading `_`). A table
//! is bound under every one of its tags to the same [`Arc<Table>`], so it can
//! be reached through any of them.
//!
//! All maps preserve insertion order, which the writer follows.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::{Column, Value};

/// A parsed CIF document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Version from a leading `#\#CIF_1.1` line, e.g. `CIF_1.1`.
    pub version: Option<String>,
    pub blocks: IndexMap<String, DataBlock>,
}

/// Items and tables of a data block or save frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub name: String,
    pub items: IndexMap<String, Value>,
    /// Every tag of a table maps to the same shared table.
    pub tables: IndexMap<String, Arc<Table>>,
}

/// A save frame. Frames cannot nest, so a frame is a plain [`Block`].
pub type SaveFrame = Block;

/// A data block (`data_NAME`): a [`Block`] plus its save frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBlock {
    pub block: Block,
    pub frames: IndexMap<String, SaveFrame>,
}

/// A `loop_` table: tags bound to column positions, one [`Column`] each.
///
/// Every column has the same, non-zero length.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: IndexMap<String, usize>,
    values: Vec<Column>,
}

/// Errors from building a [`Table`] by hand.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("a table needs at least one column")]
    NoColumns,
    #[error("empty tag name in table")]
    EmptyTag,
    #[error("tag '{0}' appears twice in table")]
    DuplicateTag(String),
    #[error("column '{0}' has no rows")]
    NoRows(String),
    #[error("column '{tag}' has {found} rows, expected {expected}")]
    Ragged {
        tag: String,
        expected: usize,
        found: usize,
    },
}

/// Lower-case a block or frame name.
pub(crate) fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Lower-case a tag and drop its leading `_`, if any.
pub(crate) fn normalize_tag(tag: &str) -> String {
    tag.strip_prefix('_').unwrap_or(tag).to_ascii_lowercase()
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a data block by name (case-insensitive).
    pub fn block(&self, name: &str) -> Option<&DataBlock> {
        self.blocks.get(&normalize_name(name))
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut DataBlock> {
        self.blocks.get_mut(&normalize_name(name))
    }

    /// Add a data block, replacing (and returning) any block with the same
    /// name.
    pub fn insert_block(&mut self, block: DataBlock) -> Option<DataBlock> {
        self.blocks.insert(normalize_name(&block.name), block)
    }
}

impl Block {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            ..Self::default()
        }
    }

    /// Get a scalar item by tag (case-insensitive, `_` optional).
    pub fn item(&self, tag: &str) -> Option<&Value> {
        self.items.get(&normalize_tag(tag))
    }

    /// Find the table containing a given tag.
    pub fn table(&self, tag: &str) -> Option<&Table> {
        self.tables.get(&normalize_tag(tag)).map(|t| t.as_ref())
    }

    /// Get a single column from whatever table contains it.
    pub fn column(&self, tag: &str) -> Option<&Column> {
        self.table(tag)?.get(tag)
    }

    /// Returns `true` if the tag names an item or a table column.
    pub fn contains_tag(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        self.items.contains_key(&tag) || self.tables.contains_key(&tag)
    }

    /// Get multiple columns from the same table, for row-wise access.
    ///
    /// Returns `None` if any tag is missing or if the tags span different
    /// tables.
    pub fn columns(&self, tags: &[&str]) -> Option<Columns<'_>> {
        let first = tags.first()?;
        let table = self.tables.get(&normalize_tag(first))?;
        let mut col_indices = Vec::with_capacity(tags.len());
        for tag in tags {
            if !Arc::ptr_eq(table, self.tables.get(&normalize_tag(tag))?) {
                return None;
            }
            col_indices.push(table.index(tag)?);
        }
        Some(Columns {
            table: table.as_ref(),
            col_indices,
        })
    }

    /// Set a scalar item, returning the previous value for the tag.
    pub fn insert_item(&mut self, tag: &str, value: impl Into<Value>) -> Option<Value> {
        self.items.insert(normalize_tag(tag), value.into())
    }

    /// Install a table under every one of its tags.
    pub fn insert_table(&mut self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        for tag in table.columns.keys() {
            self.tables.insert(tag.clone(), Arc::clone(&table));
        }
        table
    }

    /// Each table once, in first-bound order.
    ///
    /// Aliases are recognized by identity or, for tables assembled by hand,
    /// by sharing any tag.
    pub fn distinct_tables(&self) -> Vec<&Arc<Table>> {
        let mut seen: Vec<&Arc<Table>> = Vec::new();
        for table in self.tables.values() {
            if seen
                .iter()
                .any(|t| Arc::ptr_eq(t, table) || t.shares_tag(table))
            {
                continue;
            }
            seen.push(table);
        }
        seen
    }
}

impl DataBlock {
    pub fn new(name: &str) -> Self {
        Self {
            block: Block::new(name),
            frames: IndexMap::new(),
        }
    }

    /// Look up a save frame by name (case-insensitive).
    pub fn frame(&self, name: &str) -> Option<&SaveFrame> {
        self.frames.get(&normalize_name(name))
    }

    /// Add a save frame, replacing (and returning) any frame with the same
    /// name.
    pub fn insert_frame(&mut self, frame: SaveFrame) -> Option<SaveFrame> {
        self.frames.insert(normalize_name(&frame.name), frame)
    }
}

impl Deref for DataBlock {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.block
    }
}

impl DerefMut for DataBlock {
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.block
    }
}

impl Table {
    /// Build a table from `(tag, column)` pairs in column order.
    pub fn new<S: AsRef<str>>(columns: Vec<(S, Column)>) -> Result<Table, TableError> {
        let mut index = IndexMap::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        let mut nrows = None;
        for (i, (tag, column)) in columns.into_iter().enumerate() {
            let tag = normalize_tag(tag.as_ref());
            if tag.is_empty() {
                return Err(TableError::EmptyTag);
            }
            if column.is_empty() {
                return Err(TableError::NoRows(tag));
            }
            match nrows {
                None => nrows = Some(column.len()),
                Some(expected) if expected != column.len() => {
                    return Err(TableError::Ragged {
                        tag,
                        expected,
                        found: column.len(),
                    })
                }
                Some(_) => {}
            }
            if index.insert(tag.clone(), i).is_some() {
                return Err(TableError::DuplicateTag(tag));
            }
            values.push(column);
        }
        if values.is_empty() {
            return Err(TableError::NoColumns);
        }
        Ok(Table {
            columns: index,
            values,
        })
    }

    /// Assemble a table whose shape the caller has already checked.
    pub(crate) fn from_checked(columns: IndexMap<String, usize>, values: Vec<Column>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Table { columns, values }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.values.first().map_or(0, Column::len)
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.values.len()
    }

    /// Tags in column order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Column position of a tag.
    pub fn index(&self, tag: &str) -> Option<usize> {
        self.columns.get(&normalize_tag(tag)).copied()
    }

    /// The column for a tag.
    pub fn get(&self, tag: &str) -> Option<&Column> {
        self.values.get(self.index(tag)?)
    }

    /// All columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.values
    }

    /// One row across every column.
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        self.values.iter().map(|c| c.get(row)).collect()
    }

    /// Returns `true` if the two tables have any tag in common.
    pub fn shares_tag(&self, other: &Table) -> bool {
        self.columns.keys().any(|t| other.columns.contains_key(t))
    }
}

/// Multi-column accessor for row-wise access to one table.
pub struct Columns<'a> {
    table: &'a Table,
    col_indices: Vec<usize>,
}

impl<'a> Columns<'a> {
    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.table.nrows()
    }

    /// Number of selected columns.
    pub fn ncols(&self) -> usize {
        self.col_indices.len()
    }

    /// The value at `(row, col)`, where `col` indexes into the requested tags.
    pub fn get(&self, row: usize, col: usize) -> Option<Value> {
        self.table.values[*self.col_indices.get(col)?].get(row)
    }

    /// Iterate over rows, yielding the selected cells of each.
    pub fn iter(&self) -> RowIter<'a> {
        RowIter {
            table: self.table,
            col_indices: self.col_indices.clone(),
            row: 0,
        }
    }
}

/// Row-wise iterator over selected columns of a table.
pub struct RowIter<'a> {
    table: &'a Table,
    col_indices: Vec<usize>,
    row: usize,
}

impl Iterator for RowIter<'_> {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.table.nrows() {
            return None;
        }
        let row = self
            .col_indices
            .iter()
            .filter_map(|&ci| self.table.values[ci].get(self.row))
            .collect();
        self.row += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.nrows() - self.row;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowIter<'_> {}
