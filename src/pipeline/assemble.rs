//! Column-to-row alignment.
//!
//! Columns are extracted independently and may differ in length. An [`AlignmentPolicy`]
//! decides how they become rows; [`PadByIndex`] pairs cells purely by extraction position.

use crate::types::{Column, Matrix, Row};

pub trait AlignmentPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Combines ordered columns into a matrix exactly `columns.len()` cells wide.
    fn align(&self, columns: &[Column]) -> Matrix;
}

/// Row `i` takes the `i`th cell of every column; short columns are padded with absent cells.
///
/// Nothing correlates rows across columns by content. If selectors match different
/// element counts, the tail rows carry absent cells in the shorter columns.
#[derive(Debug, Default, Clone, Copy)]
pub struct PadByIndex;

impl AlignmentPolicy for PadByIndex {
    fn name(&self) -> &'static str {
        "pad_by_index"
    }

    fn align(&self, columns: &[Column]) -> Matrix {
        let width = columns.len();
        let height = columns.iter().map(|c| c.cells.len()).max().unwrap_or(0);
        if height == 0 {
            return Matrix::empty(width);
        }

        let rows: Vec<Row> = (0..height)
            .map(|i| columns.iter().map(|c| c.cells.get(i).cloned()).collect())
            .collect();
        Matrix::from_rows(width, rows).unwrap_or_else(|| Matrix::empty(width))
    }
}

/// Assembles with the default positional policy.
pub fn assemble(columns: &[Column]) -> Matrix {
    PadByIndex.align(columns)
}
