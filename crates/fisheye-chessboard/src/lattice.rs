//! Lattice matching: organize corner candidates into a complete
//! `cols x rows` grid.
//!
//! Edges come from a mutual k-NN graph gated by spacing and angular
//! separation. Integer grid coordinates are assigned by BFS; each node
//! carries its own pair of grid axes, re-estimated from the traversed
//! edge, so the assignment follows the smooth bending a fisheye lens
//! imposes on the physical lattice.

use std::collections::{HashMap, VecDeque};

use fisheye_core::CheckerboardSpec;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point2, Vector2};

use crate::params::LatticeParams;

const MIN_PARTIAL_NODES: usize = 6;

pub(crate) enum LatticeOutcome {
    /// Row-major, canonically oriented corner positions.
    Complete(Vec<Point2<f64>>),
    /// A lattice was found but its size does not match the spec.
    Partial(usize),
    NotFound,
}

type Edges = Vec<Vec<(usize, Vector2<f64>)>>;

pub(crate) fn match_lattice(
    points: &[Point2<f64>],
    spec: &CheckerboardSpec,
    params: &LatticeParams,
) -> LatticeOutcome {
    if points.len() < 4 || spec.cols < 2 || spec.rows < 2 {
        return LatticeOutcome::NotFound;
    }

    let edges = build_edges(points, params);
    let mut best_partial = 0usize;

    for seed in 0..points.len().min(params.max_seed_trials) {
        let Some(assignment) = grow_from_seed(&edges, seed, params) else {
            continue;
        };
        match evaluate(points, assignment, spec) {
            Evaluation::Complete(ordered) => return LatticeOutcome::Complete(ordered),
            Evaluation::Partial(count) => best_partial = best_partial.max(count),
        }
    }

    if best_partial >= MIN_PARTIAL_NODES {
        LatticeOutcome::Partial(best_partial)
    } else {
        LatticeOutcome::NotFound
    }
}

/// Mutual k-NN edges, at most four per node with angular separation.
fn build_edges(points: &[Point2<f64>], params: &LatticeParams) -> Edges {
    let n = points.len();
    let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
    let tree: KdTree<f64, 2> = (&coords).into();

    let mut knn: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
    for (i, coord) in coords.iter().enumerate() {
        let found = tree.nearest_n::<SquaredEuclidean>(coord, params.k_neighbors + 1);
        knn.push(
            found
                .into_iter()
                .filter(|nn| nn.item as usize != i)
                .map(|nn| (nn.item as usize, nn.distance.sqrt()))
                .collect(),
        );
    }

    // median nearest-neighbor distance fixes the expected grid pitch
    let mut nearest: Vec<f64> = knn
        .iter()
        .filter_map(|list| list.first().map(|&(_, d)| d))
        .collect();
    if nearest.is_empty() {
        return vec![Vec::new(); n];
    }
    nearest.sort_unstable_by(f64::total_cmp);
    let pitch = nearest[nearest.len() / 2];
    if pitch <= f64::EPSILON {
        return vec![Vec::new(); n];
    }

    let d_min = params.min_spacing_rel * pitch;
    let d_max = params.max_spacing_rel * pitch;
    let min_sep = params.min_axis_separation_deg.to_radians();

    let mut edges: Edges = Vec::with_capacity(n);
    for i in 0..n {
        let mut kept: Vec<(usize, Vector2<f64>)> = Vec::with_capacity(4);
        // kiddo returns neighbors nearest-first, so axis neighbors win
        // the four slots over diagonals
        for &(j, d) in &knn[i] {
            if d < d_min || d > d_max {
                continue;
            }
            if !knn[j].iter().any(|&(back, _)| back == i) {
                continue;
            }
            let e = points[j] - points[i];
            let separated = kept.iter().all(|(_, kept_e)| {
                let cos = (e.dot(kept_e) / (e.norm() * kept_e.norm())).clamp(-1.0, 1.0);
                cos.acos() >= min_sep
            });
            if !separated {
                continue;
            }
            kept.push((j, e));
            if kept.len() == 4 {
                break;
            }
        }
        edges.push(kept);
    }
    edges
}

struct Assignment {
    /// (node, i, j) in BFS order.
    nodes: Vec<(usize, i32, i32)>,
}

/// BFS from one seed, assigning integer grid coordinates.
fn grow_from_seed(edges: &Edges, seed: usize, params: &LatticeParams) -> Option<Assignment> {
    let seed_edges = &edges[seed];
    if seed_edges.len() < 2 {
        return None;
    }

    // Seed axes: shortest edge plus the first edge at >= 60 degrees to it.
    let u0 = seed_edges[0].1.normalize();
    let v0 = seed_edges[1..]
        .iter()
        .map(|(_, e)| e.normalize())
        .find(|dir| dir.dot(&u0).abs() <= 0.5)?;

    let dir_tol_cos = params.direction_tolerance_deg.to_radians().cos();

    let n = edges.len();
    let mut coord_of: Vec<Option<(i32, i32)>> = vec![None; n];
    let mut axes: Vec<Option<(Vector2<f64>, Vector2<f64>)>> = vec![None; n];
    let mut occupied: HashMap<(i32, i32), usize> = HashMap::new();
    let mut nodes: Vec<(usize, i32, i32)> = Vec::new();
    let mut queue = VecDeque::new();

    coord_of[seed] = Some((0, 0));
    axes[seed] = Some((u0, v0));
    occupied.insert((0, 0), seed);
    nodes.push((seed, 0, 0));
    queue.push_back(seed);

    while let Some(node) = queue.pop_front() {
        let (gi, gj) = coord_of[node].unwrap_or((0, 0));
        let Some((u, v)) = axes[node] else { continue };

        for (next, e) in &edges[node] {
            if coord_of[*next].is_some() {
                continue;
            }
            let len = e.norm();
            if len <= f64::EPSILON {
                continue;
            }
            let dir = e / len;
            let du = dir.dot(&u);
            let dv = dir.dot(&v);

            // classify against the dominant axis; skip ambiguous
            // (diagonal-ish) edges
            if du.abs().max(dv.abs()) < dir_tol_cos {
                continue;
            }
            let along_u = du.abs() >= dv.abs();
            let target = if along_u {
                (gi + du.signum() as i32, gj)
            } else {
                (gi, gj + dv.signum() as i32)
            };
            if occupied.contains_key(&target) {
                continue;
            }

            // propagate axes: the traversed axis snaps to the edge, the
            // other is re-orthogonalized against it
            let (nu, nv) = if along_u {
                let nu = dir * du.signum();
                let raw = v - nu * v.dot(&nu);
                let nv = if raw.norm() > f64::EPSILON {
                    raw.normalize()
                } else {
                    v
                };
                (nu, nv)
            } else {
                let nv = dir * dv.signum();
                let raw = u - nv * u.dot(&nv);
                let nu = if raw.norm() > f64::EPSILON {
                    raw.normalize()
                } else {
                    u
                };
                (nu, nv)
            };

            coord_of[*next] = Some(target);
            axes[*next] = Some((nu, nv));
            occupied.insert(target, *next);
            nodes.push((*next, target.0, target.1));
            queue.push_back(*next);
        }
    }

    (nodes.len() >= 4).then_some(Assignment { nodes })
}

enum Evaluation {
    Complete(Vec<Point2<f64>>),
    Partial(usize),
}

/// Check the assignment against the expected box and order it row-major.
fn evaluate(points: &[Point2<f64>], assignment: Assignment, spec: &CheckerboardSpec) -> Evaluation {
    let count = assignment.nodes.len();
    let expected = spec.corner_count();

    let min_i = assignment.nodes.iter().map(|&(_, i, _)| i).min().unwrap_or(0);
    let min_j = assignment.nodes.iter().map(|&(_, _, j)| j).min().unwrap_or(0);
    let max_i = assignment.nodes.iter().map(|&(_, i, _)| i).max().unwrap_or(0);
    let max_j = assignment.nodes.iter().map(|&(_, _, j)| j).max().unwrap_or(0);

    let w = (max_i - min_i + 1) as usize;
    let h = (max_j - min_j + 1) as usize;
    let (cols, rows) = (spec.cols as usize, spec.rows as usize);

    let transposed = if (w, h) == (cols, rows) {
        false
    } else if (w, h) == (rows, cols) {
        true
    } else {
        return Evaluation::Partial(count);
    };
    if count != expected {
        return Evaluation::Partial(count);
    }

    // occupancy in spec orientation
    let mut grid: Vec<Option<usize>> = vec![None; expected];
    for &(node, i, j) in &assignment.nodes {
        let (mut ci, mut cj) = ((i - min_i) as usize, (j - min_j) as usize);
        if transposed {
            std::mem::swap(&mut ci, &mut cj);
        }
        let cell = cj * cols + ci;
        if grid[cell].is_some() {
            return Evaluation::Partial(count);
        }
        grid[cell] = Some(node);
    }
    if grid.iter().any(Option::is_none) {
        return Evaluation::Partial(count);
    }
    let grid: Vec<usize> = grid.into_iter().flatten().collect();
    let at = |ci: usize, cj: usize| points[grid[cj * cols + ci]];

    // mean image-space steps along the two grid axes
    let mut step_col = Vector2::zeros();
    let mut step_row = Vector2::zeros();
    for cj in 0..rows {
        for ci in 0..cols {
            if ci + 1 < cols {
                step_col += at(ci + 1, cj) - at(ci, cj);
            }
            if cj + 1 < rows {
                step_row += at(ci, cj + 1) - at(ci, cj);
            }
        }
    }

    // canonical orientation: columns run along their dominant image
    // direction positively, and (col, row) keeps image handedness so the
    // labeling stays a rigid motion of the physical board
    let flip_cols = if step_col.x.abs() >= step_col.y.abs() {
        step_col.x < 0.0
    } else {
        step_col.y < 0.0
    };
    if flip_cols {
        step_col = -step_col;
    }
    let flip_rows = step_col.x * step_row.y - step_col.y * step_row.x <= 0.0;

    let mut ordered = Vec::with_capacity(expected);
    for cj in 0..rows {
        for ci in 0..cols {
            let ci = if flip_cols { cols - 1 - ci } else { ci };
            let cj = if flip_rows { rows - 1 - cj } else { cj };
            ordered.push(at(ci, cj));
        }
    }
    Evaluation::Complete(ordered)
}
