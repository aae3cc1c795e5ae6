#![forbid(unsafe_code)]

//! Headless compound spring-embedder graph layout (CoSE family).
//!
//! `sirenia` takes node sizes, an optional nesting hierarchy and an edge list, and returns node
//! centres, compound bounds and edge routes. It does no rendering; the caller draws the result.

pub mod algo;
pub mod error;
pub mod geom;
pub mod graph;
pub mod model;
mod rng;

pub use algo::cose::{LayoutRun, Phase, StopHandle};
pub use algo::{CoseOptions, Quality};
pub use error::{Error, Result};
pub use graph::{Edge, EdgeRoute, Graph, LayoutResult, Node, NodeLayout, Point};

/// Headless layout entry point.
pub fn layout(graph: &Graph, opts: &CoseOptions) -> Result<LayoutResult> {
    algo::cose::layout(graph, opts)
}

/// Like [`layout`], calling `on_frame` with intermediate positions every `ticks_per_frame`
/// simulation ticks.
pub fn layout_with_frames<F>(
    graph: &Graph,
    opts: &CoseOptions,
    ticks_per_frame: usize,
    on_frame: F,
) -> Result<LayoutResult>
where
    F: FnMut(Phase, &LayoutResult),
{
    algo::cose::layout_with_frames(graph, opts, ticks_per_frame, on_frame)
}
