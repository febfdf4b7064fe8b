//! Payload types carried by the built-in modules.
//!
//! ```text
//! Dataset
//! ├── ScalarField
//! └── FiberBundle
//! ```

use crate::kernel::data_type::{DataType, Transferable};

pub static DATASET: DataType = DataType::root("Dataset");
pub static SCALAR_FIELD: DataType = DataType::derived("ScalarField", &DATASET);
pub static FIBER_BUNDLE: DataType = DataType::derived("FiberBundle", &DATASET);

/// Scalar samples on a regular grid, x-fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    dims: [usize; 3],
    values: Vec<f64>,
}

impl ScalarField {
    /// `None` if `values` does not match the grid size.
    pub fn new(dims: [usize; 3], values: Vec<f64>) -> Option<Self> {
        (dims.iter().product::<usize>() == values.len()).then_some(Self { dims, values })
    }

    /// A cube of `n` samples per axis holding the distance to its centre.
    pub fn synthetic(n: usize) -> Self {
        let centre = (n as f64 - 1.0) / 2.0;
        let mut values = Vec::with_capacity(n * n * n);
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let d = [x, y, z].map(|c| c as f64 - centre);
                    values.push((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt());
                }
            }
        }
        Self {
            dims: [n; 3],
            values,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        let [nx, ny, nz] = self.dims;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        self.values.get(x + nx * (y + ny * z)).copied()
    }

    /// Smallest and largest sample.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

impl Transferable for ScalarField {
    fn data_type() -> &'static DataType {
        &SCALAR_FIELD
    }
}

/// A set of polylines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FiberBundle {
    fibers: Vec<Vec<[f64; 3]>>,
}

impl FiberBundle {
    pub fn new(fibers: Vec<Vec<[f64; 3]>>) -> Self {
        Self { fibers }
    }

    /// `count` helices of `points` points each, spread around the z axis.
    pub fn helices(count: usize, points: usize) -> Self {
        let fibers = (0..count)
            .map(|i| {
                let phase = i as f64 * std::f64::consts::TAU / count.max(1) as f64;
                (0..points)
                    .map(|j| {
                        let t = j as f64 * 0.25;
                        [(t + phase).cos(), (t + phase).sin(), t]
                    })
                    .collect()
            })
            .collect();
        Self { fibers }
    }

    pub fn fibers(&self) -> &[Vec<[f64; 3]>] {
        &self.fibers
    }

    pub fn fiber_count(&self) -> usize {
        self.fibers.len()
    }

    pub fn point_count(&self) -> usize {
        self.fibers.iter().map(Vec::len).sum()
    }
}

impl Transferable for FiberBundle {
    fn data_type() -> &'static DataType {
        &FIBER_BUNDLE
    }
}
