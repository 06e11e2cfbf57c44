use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Pivots smaller than this are treated as a singular system.
const SINGULAR_PIVOT: f64 = 1e-300;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Solves `a · x = b` by Gaussian elimination with partial pivoting.
    ///
    /// Returns `None` when the system is singular or the result is not finite.
    pub fn solve(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Option<Array1<f64>> {
        let n = a.nrows();
        if a.ncols() != n || b.len() != n {
            return None;
        }
        let mut m = a.to_owned();
        let mut rhs = b.to_owned();

        for col in 0..n {
            let pivot_row = (col..n).max_by(|&x, &y| {
                m[[x, col]]
                    .abs()
                    .partial_cmp(&m[[y, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            let pivot = m[[pivot_row, col]];
            if !pivot.is_finite() || pivot.abs() < SINGULAR_PIVOT {
                return None;
            }
            if pivot_row != col {
                for k in 0..n {
                    m.swap([col, k], [pivot_row, k]);
                }
                rhs.swap(col, pivot_row);
            }
            for row in (col + 1)..n {
                let factor = m[[row, col]] / m[[col, col]];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    m[[row, k]] -= factor * m[[col, k]];
                }
                rhs[row] -= factor * rhs[col];
            }
        }

        let mut x = Array1::zeros(n);
        for row in (0..n).rev() {
            let tail: f64 = ((row + 1)..n).map(|k| m[[row, k]] * x[k]).sum();
            x[row] = (rhs[row] - tail) / m[[row, row]];
        }
        x.iter().all(|v| v.is_finite()).then_some(x)
    }

    /// Inverts a square matrix column by column.
    pub fn invert(a: ArrayView2<f64>) -> Option<Array2<f64>> {
        let n = a.nrows();
        let mut inverse = Array2::zeros((n, n));
        for col in 0..n {
            let mut unit = Array1::zeros(n);
            unit[col] = 1.0;
            let column = Self::solve(a, unit.view())?;
            inverse.column_mut(col).assign(&column);
        }
        Some(inverse)
    }
}
