use serde::{Deserialize, Serialize};

/// Corner-response and candidate-selection tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseParams {
    /// Threshold relative to the strongest response in the image.
    pub threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: usize,
    /// Upper bound on candidates handed to lattice matching,
    /// strongest first.
    pub max_candidates: usize,
}

impl Default for ResponseParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            max_candidates: 2000,
        }
    }
}

/// Lattice-matching tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatticeParams {
    /// Neighbors fetched per candidate from the kd-tree.
    pub k_neighbors: usize,
    /// Accepted edge length, relative to the median nearest-neighbor
    /// spacing.
    pub min_spacing_rel: f64,
    pub max_spacing_rel: f64,
    /// Minimal angle between two edges kept at one node (degrees).
    pub min_axis_separation_deg: f64,
    /// Maximal angle between an edge and the propagated grid axis it is
    /// classified to (degrees).
    pub direction_tolerance_deg: f64,
    /// How many of the strongest candidates are tried as BFS seeds.
    pub max_seed_trials: usize,
}

impl Default for LatticeParams {
    fn default() -> Self {
        Self {
            k_neighbors: 8,
            min_spacing_rel: 0.4,
            max_spacing_rel: 2.2,
            min_axis_separation_deg: 35.0,
            direction_tolerance_deg: 35.0,
            max_seed_trials: 8,
        }
    }
}

/// Sub-pixel refinement tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefineParams {
    /// Half-width of the refinement window; the window is
    /// `(2*half_window + 1)^2` pixels.
    pub half_window: usize,
    pub max_iters: usize,
    /// Stop once the corner moves less than this many pixels per
    /// iteration.
    pub epsilon: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            half_window: 3,
            max_iters: 30,
            epsilon: 0.1,
        }
    }
}

/// All detector tuning in one serializable bundle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectorParams {
    pub response: ResponseParams,
    pub lattice: LatticeParams,
    pub refine: RefineParams,
}
