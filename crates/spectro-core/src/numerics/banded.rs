use faer::Mat;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BandedSolveError {
    #[error("banded factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("entry ({row}, {col}) lies outside a band of half-width {bandwidth}")]
    OutsideBand {
        row: usize,
        col: usize,
        bandwidth: usize,
    },
    #[error("matrix is not positive definite at pivot index {pivot_index} (pivot {pivot})")]
    NotPositiveDefinite { pivot_index: usize, pivot: f64 },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Symmetric matrix with `bandwidth` non-zero diagonals on each side of the
/// main one. Only the upper band is stored: `bands[(i, k)] = A[i, i + k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricBandMatrix {
    bandwidth: usize,
    bands: Mat<f64>,
}

impl SymmetricBandMatrix {
    pub fn zeros(dimension: usize, bandwidth: usize) -> Self {
        Self {
            bandwidth,
            bands: Mat::zeros(dimension, bandwidth + 1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.bands.nrows()
    }

    pub const fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (upper, lower) = ordered(row, col);
        let offset = lower - upper;
        if offset > self.bandwidth || lower >= self.dimension() {
            return 0.0;
        }
        self.bands[(upper, offset)]
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) -> Result<(), BandedSolveError> {
        let (upper, offset) = self.slot(row, col)?;
        self.bands[(upper, offset)] += value;
        Ok(())
    }

    pub fn add_to_diagonal(&mut self, values: &[f64]) -> Result<(), BandedSolveError> {
        if values.len() != self.dimension() {
            return Err(BandedSolveError::RhsLengthMismatch {
                expected: self.dimension(),
                actual: values.len(),
            });
        }
        for (index, value) in values.iter().enumerate() {
            self.bands[(index, 0)] += value;
        }
        Ok(())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut scaled = self.clone();
        for row in 0..scaled.dimension() {
            for offset in 0..=scaled.bandwidth {
                scaled.bands[(row, offset)] *= factor;
            }
        }
        scaled
    }

    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>, BandedSolveError> {
        let dimension = self.dimension();
        if x.len() != dimension {
            return Err(BandedSolveError::RhsLengthMismatch {
                expected: dimension,
                actual: x.len(),
            });
        }
        let mut product = vec![0.0; dimension];
        for row in 0..dimension {
            let first = row.saturating_sub(self.bandwidth);
            let last = (row + self.bandwidth).min(dimension - 1);
            product[row] = (first..=last).map(|col| self.get(row, col) * x[col]).sum();
        }
        Ok(product)
    }

    fn slot(&self, row: usize, col: usize) -> Result<(usize, usize), BandedSolveError> {
        let (upper, lower) = ordered(row, col);
        let offset = lower - upper;
        if offset > self.bandwidth || lower >= self.dimension() {
            return Err(BandedSolveError::OutsideBand {
                row,
                col,
                bandwidth: self.bandwidth,
            });
        }
        Ok((upper, offset))
    }
}

fn ordered(row: usize, col: usize) -> (usize, usize) {
    if row <= col { (row, col) } else { (col, row) }
}

/// Lower Cholesky factor kept in band form: `factor[(i, k)] = L[i, i - k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandCholesky {
    bandwidth: usize,
    factor: Mat<f64>,
}

impl BandCholesky {
    pub fn dimension(&self) -> usize {
        self.factor.nrows()
    }

    fn lower(&self, row: usize, col: usize) -> f64 {
        self.factor[(row, row - col)]
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, BandedSolveError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(BandedSolveError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = rhs[row];
            for col in row.saturating_sub(self.bandwidth)..row {
                value -= self.lower(row, col) * forward[col];
            }
            forward[row] = value / self.lower(row, row);
        }

        let mut solution = vec![0.0; dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            let last = (row + self.bandwidth).min(dimension - 1);
            for col in (row + 1)..=last {
                value -= self.lower(col, row) * solution[col];
            }
            solution[row] = value / self.lower(row, row);
        }

        Ok(solution)
    }
}

/// Band-limited Cholesky factorization, `O(n * bandwidth^2)`.
pub fn band_cholesky_factorize(
    matrix: &SymmetricBandMatrix,
) -> Result<BandCholesky, BandedSolveError> {
    let dimension = matrix.dimension();
    if dimension == 0 {
        return Err(BandedSolveError::EmptyMatrix);
    }
    let bandwidth = matrix.bandwidth();
    let mut factor = Mat::<f64>::zeros(dimension, bandwidth + 1);

    for row in 0..dimension {
        let first = row.saturating_sub(bandwidth);
        for col in first..=row {
            let mut sum = matrix.get(row, col);
            for k in first..col {
                sum -= factor[(row, row - k)] * factor[(col, col - k)];
            }

            if col == row {
                if !(sum > 0.0) || !sum.is_finite() {
                    return Err(BandedSolveError::NotPositiveDefinite {
                        pivot_index: row,
                        pivot: sum,
                    });
                }
                factor[(row, 0)] = sum.sqrt();
            } else {
                factor[(row, row - col)] = sum / factor[(col, 0)];
            }
        }
    }

    Ok(BandCholesky { bandwidth, factor })
}

pub fn solve_symmetric_banded(
    matrix: &SymmetricBandMatrix,
    rhs: &[f64],
) -> Result<Vec<f64>, BandedSolveError> {
    band_cholesky_factorize(matrix)?.solve(rhs)
}
