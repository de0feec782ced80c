use crate::domain::{ComputeResult, GammaError, ProcessKind};

/// Regular `nx x ny x nz` wavevector grid with row-major indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mesh {
    k_size: [usize; 3],
}

impl Mesh {
    pub fn new(k_size: [usize; 3]) -> ComputeResult<Self> {
        if k_size.iter().any(|count| *count == 0) {
            return Err(GammaError::input_validation(
                "INPUT.MESH_SIZE",
                format!(
                    "mesh dimensions must be positive, got {}x{}x{}",
                    k_size[0], k_size[1], k_size[2]
                ),
            ));
        }
        Ok(Self { k_size })
    }

    pub fn k_size(&self) -> [usize; 3] {
        self.k_size
    }

    pub fn nptk(&self) -> usize {
        self.k_size.iter().product()
    }

    /// A single-point mesh, the amorphous / molecular case.
    pub fn is_gamma_only(&self) -> bool {
        self.k_size == [1, 1, 1]
    }

    pub fn unravel(&self, index: usize) -> [usize; 3] {
        let [_, ny, nz] = self.k_size;
        [index / (ny * nz), (index / nz) % ny, index % nz]
    }

    /// Row-major ravel with periodic wrapping of every component.
    pub fn ravel(&self, triple: [i64; 3]) -> usize {
        let [nx, ny, nz] = self.k_size.map(|count| count as i64);
        let i = triple[0].rem_euclid(nx);
        let j = triple[1].rem_euclid(ny);
        let k = triple[2].rem_euclid(nz);
        ((i * ny + j) * nz + k) as usize
    }

    /// `wrap(index_k + sign * index_p)` componentwise.
    pub fn wrap_combine(&self, index_k: usize, process: ProcessKind, index_p: usize) -> usize {
        let k = self.unravel(index_k);
        let p = self.unravel(index_p);
        let sign = process.sign();
        self.ravel([
            k[0] as i64 + sign * p[0] as i64,
            k[1] as i64 + sign * p[1] as i64,
            k[2] as i64 + sign * p[2] as i64,
        ])
    }

    /// Conjugate index `pp` for every candidate `p`, in mesh order.
    pub fn conjugate_indices(&self, index_k: usize, process: ProcessKind) -> Vec<usize> {
        (0..self.nptk())
            .map(|index_p| self.wrap_combine(index_k, process, index_p))
            .collect()
    }

    /// Reduced coordinates `i / k_size`.
    pub fn fractional(&self, index: usize) -> [f64; 3] {
        let triple = self.unravel(index);
        [
            triple[0] as f64 / self.k_size[0] as f64,
            triple[1] as f64 / self.k_size[1] as f64,
            triple[2] as f64 / self.k_size[2] as f64,
        ]
    }
}
