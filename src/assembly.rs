//! Global sparse assembly and essential-dof elimination.
//!
//! Element matrices are scattered into a CSR matrix whose sparsity pattern is
//! built up front from the dof maps. Elimination follows the keep-diagonal
//! convention: constrained rows and columns are zeroed in place, the
//! constrained diagonal is set to one, and everything removed is returned as
//! a separate matrix so that `modified + eliminated == original`.

use itertools::izip;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::collections::BTreeSet;

/// Builds the union sparsity pattern of blocks coupling `row_dofs[b]` with
/// `col_dofs[b]`.
pub fn assemble_pattern(
    nrows: usize,
    ncols: usize,
    row_dofs: &[Vec<usize>],
    col_dofs: &[Vec<usize>],
) -> SparsityPattern {
    let mut row_sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nrows];
    for (rows, cols) in izip!(row_dofs, col_dofs) {
        for &row in rows {
            row_sets[row].extend(cols.iter().copied());
        }
    }
    let mut offsets = Vec::with_capacity(nrows + 1);
    let mut indices = Vec::new();
    offsets.push(0);
    for set in &row_sets {
        indices.extend(set.iter().copied());
        offsets.push(indices.len());
    }
    SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, indices)
        .expect("Pattern data must be valid by definition")
}

/// Scatter-adds per-block dense matrices into a CSR matrix.
///
/// Block `b` couples global rows `row_dofs[b]` with global columns
/// `col_dofs[b]`, in the index order of `matrices[b]`.
pub fn assemble_csr(
    nrows: usize,
    ncols: usize,
    row_dofs: &[Vec<usize>],
    col_dofs: &[Vec<usize>],
    matrices: &[DMatrix<f64>],
) -> CsrMatrix<f64> {
    let pattern = assemble_pattern(nrows, ncols, row_dofs, col_dofs);
    let nnz = pattern.nnz();
    let mut csr = CsrMatrix::try_from_pattern_and_values(pattern, vec![0.0; nnz])
        .expect("CSR data must be valid by definition");
    let (offsets, indices, values) = csr.csr_data_mut();
    for (rows, cols, matrix) in izip!(row_dofs, col_dofs, matrices) {
        for (i, &row) in rows.iter().enumerate() {
            let row_indices = &indices[offsets[row]..offsets[row + 1]];
            for (j, &col) in cols.iter().enumerate() {
                let position = offsets[row]
                    + row_indices
                        .binary_search(&col)
                        .expect("Pattern must contain every element entry");
                values[position] += matrix[(i, j)];
            }
        }
    }
    csr
}

/// Zeroes the rows and columns of the given dofs in place, setting ones on
/// the constrained diagonal, and returns the eliminated entries.
///
/// The sum of the modified matrix and the returned matrix equals the input.
pub fn eliminate_rows_cols(matrix: &mut CsrMatrix<f64>, dofs: &[usize]) -> CsrMatrix<f64> {
    let nrows = matrix.nrows();
    let ncols = matrix.ncols();
    let mut constrained = vec![false; nrows.max(ncols)];
    for &dof in dofs {
        constrained[dof] = true;
    }
    let mut eliminated = CooMatrix::new(nrows, ncols);
    let (offsets, indices, values) = matrix.csr_data_mut();
    for row in 0..nrows {
        for position in offsets[row]..offsets[row + 1] {
            let col = indices[position];
            let value = &mut values[position];
            if constrained[row] && row == col {
                if *value != 1.0 {
                    eliminated.push(row, col, *value - 1.0);
                }
                *value = 1.0;
            } else if constrained[row] || constrained[col] {
                if *value != 0.0 {
                    eliminated.push(row, col, *value);
                }
                *value = 0.0;
            }
        }
    }
    CsrMatrix::from(&eliminated)
}

/// Folds eliminated matrix entries into the right-hand side:
/// `rhs -= eliminated * bc_values`, then `rhs[dof] = bc_values[dof]` on the
/// constrained dofs.
pub fn eliminate_from_rhs(
    eliminated: &CsrMatrix<f64>,
    bc_values: &DVector<f64>,
    rhs: &mut DVector<f64>,
    dofs: &[usize],
) {
    let correction = eliminated * bc_values;
    *rhs -= correction;
    for &dof in dofs {
        rhs[dof] = bc_values[dof];
    }
}

/// Overwrites the constrained entries of a right-hand side, the homogeneous
/// special case of [`eliminate_from_rhs`].
pub fn set_dirichlet_values(rhs: &mut DVector<f64>, dofs: &[usize], value: f64) {
    for &dof in dofs {
        rhs[dof] = value;
    }
}
