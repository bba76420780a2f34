use ndarray::{Array2, s};
use thiserror::Error;

use crate::types::Point2;

const PIVOT_EPSILON: f64 = 1e-12;
const COLLINEAR_EPSILON: f64 = 1e-9;
const W_EPSILON: f64 = 1e-10;

const CANVAS_CORNERS: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum HomographyError {
    #[error("calibration points {0}, {1} and {2} are collinear")]
    Collinear(usize, usize, usize),
    #[error("singular system at column {column} (pivot {pivot:e})")]
    Singular { column: usize, pivot: f64 },
    #[error("solution is not finite")]
    NonFinite,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    h: [f64; 9],
}

impl Homography {
    pub fn from_quad(quad: &[Point2; 4]) -> Result<Self, HomographyError> {
        check_collinear(quad)?;

        // Each correspondence contributes two rows of [A | b] with h8 fixed to 1.
        let mut system = Array2::<f64>::zeros((8, 9));
        for (i, (src, &(u, v))) in quad.iter().zip(CANVAS_CORNERS.iter()).enumerate() {
            let x = src.x as f64;
            let y = src.y as f64;
            let r = 2 * i;
            system
                .row_mut(r)
                .assign(&ndarray::arr1(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u]));
            system
                .row_mut(r + 1)
                .assign(&ndarray::arr1(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v]));
        }

        let solution = solve_augmented(system)?;
        let mut h = [0.0; 9];
        h[..8].copy_from_slice(&solution);
        h[8] = 1.0;

        if h.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::NonFinite);
        }
        Ok(Self { h })
    }

    pub fn matrix(&self) -> [f64; 9] {
        self.h
    }

    pub fn project(&self, p: Point2) -> Option<Point2> {
        let h = &self.h;
        let x = p.x as f64;
        let y = p.y as f64;
        let w = h[6] * x + h[7] * y + h[8];
        if w.abs() < W_EPSILON {
            return None;
        }
        let nx = (h[0] * x + h[1] * y + h[2]) / w;
        let ny = (h[3] * x + h[4] * y + h[5]) / w;
        Some(Point2::new(nx as f32, ny as f32))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasPoint {
    pub point: Point2,
    pub inside: bool,
}

/// Map a camera-space point to mirrored canvas space. Without a homography
/// the camera point is taken as already normalized and is always inside.
pub fn map_to_canvas(homography: Option<&Homography>, p: Point2, margin: f32) -> CanvasPoint {
    let (raw, inside) = match homography {
        Some(h) => match h.project(p) {
            Some(n) => {
                let range = -margin..=1.0 + margin;
                (n, range.contains(&n.x) && range.contains(&n.y))
            }
            None => (p, false),
        },
        None => (p, true),
    };

    let x = raw.x.clamp(0.0, 1.0);
    let y = raw.y.clamp(0.0, 1.0);
    CanvasPoint {
        point: Point2::new(1.0 - x, y),
        inside,
    }
}

fn check_collinear(quad: &[Point2; 4]) -> Result<(), HomographyError> {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    for (a, b, c) in TRIPLES {
        let (pa, pb, pc) = (quad[a], quad[b], quad[c]);
        let cross = (pb.x as f64 - pa.x as f64) * (pc.y as f64 - pa.y as f64)
            - (pb.y as f64 - pa.y as f64) * (pc.x as f64 - pa.x as f64);
        if cross.abs() < COLLINEAR_EPSILON {
            return Err(HomographyError::Collinear(a, b, c));
        }
    }
    Ok(())
}

fn solve_augmented(mut m: Array2<f64>) -> Result<Vec<f64>, HomographyError> {
    let n = m.nrows();

    for col in 0..n {
        let (pivot_row, pivot) = (col..n)
            .map(|r| (r, m[[r, col]]))
            .fold((col, 0.0f64), |best, cur| {
                if cur.1.abs() > best.1.abs() { cur } else { best }
            });
        if pivot.abs() < PIVOT_EPSILON {
            return Err(HomographyError::Singular { column: col, pivot });
        }

        if pivot_row != col {
            for k in 0..=n {
                m.swap([col, k], [pivot_row, k]);
            }
        }

        let pivot_tail = m.slice(s![col, col..]).to_owned();
        for r in (col + 1)..n {
            let factor = m[[r, col]] / pivot;
            if factor != 0.0 {
                let mut row = m.slice_mut(s![r, col..]);
                row.scaled_add(-factor, &pivot_tail);
            }
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let mut acc = m[[r, n]];
        for k in (r + 1)..n {
            acc -= m[[r, k]] * x[k];
        }
        x[r] = acc / m[[r, r]];
    }
    Ok(x)
}
