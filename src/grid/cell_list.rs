//! Spatial hashing of receptor atoms for cutoff-limited neighbor queries

use nalgebra::Vector3;

#[derive(Debug, Clone)]
pub struct CellList {
    origin: Vector3<f64>,
    cell_size: f64,
    dims: [usize; 3],
    cells: Vec<Vec<usize>>,
    positions: Vec<Vector3<f64>>,
}

impl CellList {
    /// Bin `positions` into cubic cells of edge `cell_size`
    pub fn new(positions: Vec<Vector3<f64>>, cell_size: f64) -> Self {
        let cell_size = cell_size.max(1.0);
        let (origin, dims) = if positions.is_empty() {
            (Vector3::zeros(), [1, 1, 1])
        } else {
            let mut min = Vector3::repeat(f64::MAX);
            let mut max = Vector3::repeat(f64::MIN);
            for p in &positions {
                min = min.inf(p);
                max = max.sup(p);
            }
            let span = max - min;
            let dims = [0, 1, 2].map(|k| (span[k] / cell_size).floor() as usize + 1);
            (min, dims)
        };

        let mut cells = vec![Vec::new(); dims[0] * dims[1] * dims[2]];
        let mut list = Self {
            origin,
            cell_size,
            dims,
            cells: Vec::new(),
            positions,
        };
        for (i, p) in list.positions.iter().enumerate() {
            let c = list.cell_of(p);
            cells[list.flat(c)].push(i);
        }
        list.cells = cells;
        list
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn cell_coord(&self, value: f64, k: usize) -> isize {
        ((value - self.origin[k]) / self.cell_size).floor() as isize
    }

    fn cell_of(&self, p: &Vector3<f64>) -> [usize; 3] {
        [0, 1, 2].map(|k| self.cell_coord(p[k], k).clamp(0, self.dims[k] as isize - 1) as usize)
    }

    fn flat(&self, c: [usize; 3]) -> usize {
        c[0] + self.dims[0] * (c[1] + self.dims[1] * c[2])
    }

    /// Call `visit(index, distance)` for every stored point within `radius` of `point`
    pub fn for_each_within<F>(&self, point: &Vector3<f64>, radius: f64, mut visit: F)
    where
        F: FnMut(usize, f64),
    {
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for k in 0..3 {
            let a = self.cell_coord(point[k] - radius, k);
            let b = self.cell_coord(point[k] + radius, k);
            let last = self.dims[k] as isize - 1;
            if b < 0 || a > last {
                return;
            }
            lo[k] = a.max(0) as usize;
            hi[k] = b.min(last) as usize;
        }

        let r2 = radius * radius;
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    for &i in &self.cells[self.flat([x, y, z])] {
                        let d2 = (self.positions[i] - point).norm_squared();
                        if d2 < r2 {
                            visit(i, d2.sqrt());
                        }
                    }
                }
            }
        }
    }
}
