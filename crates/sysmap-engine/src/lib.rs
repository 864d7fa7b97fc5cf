//! Diagram engine for system catalogs.
//!
//! A diagram request flows through the closure resolver, the interface
//! resolver, the canonical graph merge, the layout adapter and finally the
//! presenter. [`DiagramSession`] runs that pipeline once per request and
//! drops results that arrive after a newer request was issued.

pub mod canonical;
pub mod closure;
pub mod error;
pub mod interfaces;
pub mod layered;
pub mod layout;
pub mod pipeline;
pub mod present;

#[cfg(test)]
mod test_support;

pub use canonical::{CanonicalGraph, EdgeKind, GraphEdge};
pub use closure::ClosureResolver;
pub use error::{LayoutError, PipelineError};
pub use interfaces::InterfaceResolver;
pub use layered::{LayeredLayout, LayoutGraph, NodeOrigin, Point, RankDir, Size, Sugiyama};
pub use layout::{Anchor, LayoutAdapter, Orientation, PositionedGraph};
pub use pipeline::{DiagramRequest, DiagramSession, Pipeline};
pub use present::{
    DiagramEvent, DiagramEvents, EventLog, Palette, Presenter, RenderEdge, RenderGraph, RenderNode,
};
