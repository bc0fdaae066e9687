//! Dense row-major 2D tables.
//!
//! Every entity×timestamp table in the kernel (sessions, orders, heights)
//! is a `Grid`. Rows are entities (or slots), columns are timestamps.

use serde::{Deserialize, Serialize};

/// Dense 2D table addressed by `(row, column)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid<T>")]
pub struct Grid<T> {
    rows: usize,
    columns: usize,
    cells: Vec<T>,
}

/// Serialized cells do not fill the declared shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Grid declares {rows}x{columns} but holds {cells} cells")]
pub struct GridShapeError {
    /// Declared rows.
    pub rows: usize,
    /// Declared columns.
    pub columns: usize,
    /// Cells found.
    pub cells: usize,
}

#[derive(Deserialize)]
struct RawGrid<T> {
    rows: usize,
    columns: usize,
    cells: Vec<T>,
}

impl<T> TryFrom<RawGrid<T>> for Grid<T> {
    type Error = GridShapeError;

    fn try_from(raw: RawGrid<T>) -> Result<Self, Self::Error> {
        let expected = raw.rows.checked_mul(raw.columns);
        if expected != Some(raw.cells.len()) {
            return Err(GridShapeError {
                rows: raw.rows,
                columns: raw.columns,
                cells: raw.cells.len(),
            });
        }
        Ok(Self {
            rows: raw.rows,
            columns: raw.columns,
            cells: raw.cells,
        })
    }
}

impl<T: Clone> Grid<T> {
    /// Create a grid filled with `value`.
    pub fn filled(rows: usize, columns: usize, value: T) -> Self {
        Self {
            rows,
            columns,
            cells: vec![value; rows * columns],
        }
    }

    /// Build a grid from row vectors. Returns `None` when rows are ragged.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != columns) {
            return None;
        }
        let num_rows = rows.len();
        Some(Self {
            rows: num_rows,
            columns,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    /// Copy out one column.
    pub fn column(&self, column: usize) -> Vec<T> {
        (0..self.rows)
            .map(|row| self.cells[row * self.columns + column].clone())
            .collect()
    }

    /// Keep only the given columns, in the given order.
    pub fn select_columns(&self, keep: &[usize]) -> Self {
        let mut cells = Vec::with_capacity(self.rows * keep.len());
        for row in 0..self.rows {
            for &column in keep {
                cells.push(self.cells[row * self.columns + column].clone());
            }
        }
        Self {
            rows: self.rows,
            columns: keep.len(),
            cells,
        }
    }
}

impl<T> Grid<T> {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Borrow a cell.
    pub fn get(&self, row: usize, column: usize) -> &T {
        &self.cells[row * self.columns + column]
    }

    /// Overwrite a cell.
    pub fn set(&mut self, row: usize, column: usize, value: T) {
        self.cells[row * self.columns + column] = value;
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[T] {
        &self.cells[row * self.columns..(row + 1) * self.columns]
    }

    /// Map every cell into a new grid of the same shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            columns: self.columns,
            cells: self.cells.iter().map(f).collect(),
        }
    }
}
