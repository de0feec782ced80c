//! Small dense 3x3 helpers for real-space and reciprocal-space cells.
//!
//! Cells are stored with lattice vectors as rows.

pub type Matrix3 = [[f64; 3]; 3];
pub type Vector3 = [f64; 3];

const SINGULAR_DETERMINANT_EPSILON: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum LatticeError {
    #[error("cell matrix is singular, determinant {determinant:.3e}")]
    SingularCell { determinant: f64 },
    #[error("cell matrix entry ({row}, {col}) must be finite, got {value}")]
    NonFiniteEntry { row: usize, col: usize, value: f64 },
}

pub fn determinant3(matrix: &Matrix3) -> f64 {
    matrix[0][0] * (matrix[1][1] * matrix[2][2] - matrix[1][2] * matrix[2][1])
        - matrix[0][1] * (matrix[1][0] * matrix[2][2] - matrix[1][2] * matrix[2][0])
        + matrix[0][2] * (matrix[1][0] * matrix[2][1] - matrix[1][1] * matrix[2][0])
}

pub fn invert3(matrix: &Matrix3) -> Result<Matrix3, LatticeError> {
    for (row, values) in matrix.iter().enumerate() {
        for (col, value) in values.iter().copied().enumerate() {
            if !value.is_finite() {
                return Err(LatticeError::NonFiniteEntry { row, col, value });
            }
        }
    }

    let determinant = determinant3(matrix);
    let scale = matrix
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, value| acc.max(value.abs()))
        .max(1.0);
    if determinant.abs() <= SINGULAR_DETERMINANT_EPSILON * scale.powi(3) {
        return Err(LatticeError::SingularCell { determinant });
    }

    let mut inverse = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            // adjugate = transposed cofactor matrix
            let (r1, r2) = ((col + 1) % 3, (col + 2) % 3);
            let (c1, c2) = ((row + 1) % 3, (row + 2) % 3);
            let cofactor = matrix[r1][c1] * matrix[r2][c2] - matrix[r1][c2] * matrix[r2][c1];
            inverse[row][col] = cofactor / determinant;
        }
    }
    Ok(inverse)
}

/// `matrix . vector`
pub fn mat_vec(matrix: &Matrix3, vector: &Vector3) -> Vector3 {
    let mut out = [0.0; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = (0..3).map(|col| matrix[row][col] * vector[col]).sum();
    }
    out
}

/// `vector . matrix`
pub fn vec_mat(vector: &Vector3, matrix: &Matrix3) -> Vector3 {
    let mut out = [0.0; 3];
    for (col, value) in out.iter_mut().enumerate() {
        *value = (0..3).map(|row| vector[row] * matrix[row][col]).sum();
    }
    out
}

pub fn dot3(a: &Vector3, b: &Vector3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Each lattice row scaled by the matching replication count.
pub fn replicate_cell(cell: &Matrix3, supercell: [usize; 3]) -> Matrix3 {
    let mut out = *cell;
    for (row, count) in out.iter_mut().zip(supercell) {
        for value in row.iter_mut() {
            *value *= count as f64;
        }
    }
    out
}

/// Minimum-image wrap of a cartesian displacement into `cell`.
pub fn wrap_minimum_image(position: &Vector3, cell: &Matrix3, cell_inverse: &Matrix3) -> Vector3 {
    let mut fractional = vec_mat(position, cell_inverse);
    for value in fractional.iter_mut() {
        *value -= value.round();
    }
    vec_mat(&fractional, cell)
}

#[cfg(test)]
mod tests {
    use super::{
        LatticeError, determinant3, invert3, mat_vec, replicate_cell, vec_mat,
        wrap_minimum_image,
    };

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let cell = [[0.0, 2.715, 2.715], [2.715, 0.0, 2.715], [2.715, 2.715, 0.0]];
        let inverse = invert3(&cell).expect("fcc cell is invertible");

        for row in 0..3 {
            for col in 0..3 {
                let value: f64 = (0..3).map(|k| cell[row][k] * inverse[k][col]).sum();
                assert_close(value, if row == col { 1.0 } else { 0.0 }, 1.0e-12);
            }
        }
        assert_close(determinant3(&cell), 2.0 * 2.715_f64.powi(3), 1.0e-9);
    }

    #[test]
    fn singular_cells_are_rejected() {
        let cell = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let error = invert3(&cell).expect_err("collinear rows are singular");
        assert!(matches!(error, LatticeError::SingularCell { .. }));
    }

    #[test]
    fn products_follow_row_and_column_conventions() {
        let matrix = [[1.0, 2.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 3.0]];
        assert_eq!(mat_vec(&matrix, &[1.0, 1.0, 1.0]), [3.0, 1.0, 3.0]);
        assert_eq!(vec_mat(&[1.0, 1.0, 1.0], &matrix), [1.0, 3.0, 3.0]);
    }

    #[test]
    fn minimum_image_wrap_returns_nearest_copy() {
        let cell = replicate_cell(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], [3, 3, 3]);
        let inverse = invert3(&cell).expect("cubic supercell");

        let wrapped = wrap_minimum_image(&[2.0, 1.0, 0.0], &cell, &inverse);
        assert_close(wrapped[0], -1.0, 1.0e-12);
        assert_close(wrapped[1], 1.0, 1.0e-12);
        assert_close(wrapped[2], 0.0, 1.0e-12);
    }
}
