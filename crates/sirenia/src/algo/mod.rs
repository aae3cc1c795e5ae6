pub mod cose;

use serde::{Deserialize, Serialize};

/// Speed/quality trade-off. Controls how fast the cooling schedule decays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Draft,
    #[default]
    Default,
    Proof,
}

/// Knobs of the compound spring embedder.
///
/// Defaults are the layout-base / CoSE-Bilkent defaults; the renderer typically hands these over
/// as a camelCase JSON block with only a few fields set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoseOptions {
    pub quality: Quality,
    /// Base ideal edge length. Also scales the repulsion range, the minimum repulsion distance,
    /// the overlap separation buffer and the convergence threshold.
    pub ideal_edge_length: f64,
    pub edge_elasticity: f64,
    pub node_repulsion: f64,
    /// Extra ideal length per nesting level crossed by an inter-graph edge, as a fraction of the
    /// base length.
    pub nesting_factor: f64,
    pub gravity: f64,
    pub gravity_range: f64,
    pub gravity_compound: f64,
    pub gravity_range_compound: f64,
    pub num_iter: usize,
    /// Start from the caller's positions instead of a random scatter, with a cooler schedule.
    pub incremental: bool,
    /// Treat every leaf as the same size: springs and repulsion use centre distances.
    pub uniform_node_dimensions: bool,
    /// Pack zero-degree members and edge-less compounds into rows before the simulation.
    pub tile: bool,
    pub tiling_padding_vertical: f64,
    pub tiling_padding_horizontal: f64,
    /// Prune pendant trees before the simulation and grow them back afterwards.
    pub tree_reduction: bool,
    pub smart_ideal_edge_length: bool,
    /// Grid-accelerated repulsion. Pairwise repulsion is used when disabled.
    pub grid_repulsion: bool,
    /// Gap between the trees of a radially placed forest.
    pub component_separation: f64,
    /// Continue with the spring embedder after radial placement of a flat forest.
    pub refine_forest: bool,
    /// Seed for the scatter and regrowth tie-breaks. Every value, 0 included, gives its own run.
    pub random_seed: u64,
}

impl Default for CoseOptions {
    fn default() -> Self {
        Self {
            quality: Quality::Default,
            ideal_edge_length: 50.0,
            edge_elasticity: 0.45,
            node_repulsion: 4500.0,
            nesting_factor: 0.1,
            gravity: 0.25,
            gravity_range: 3.8,
            gravity_compound: 1.0,
            gravity_range_compound: 1.5,
            num_iter: 2500,
            incremental: false,
            uniform_node_dimensions: false,
            tile: true,
            tiling_padding_vertical: 10.0,
            tiling_padding_horizontal: 10.0,
            tree_reduction: true,
            smart_ideal_edge_length: true,
            grid_repulsion: true,
            component_separation: 60.0,
            refine_forest: false,
            random_seed: 0,
        }
    }
}
