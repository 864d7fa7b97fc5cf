use thiserror::Error;

use sysmap_core::SystemId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("malformed layout geometry: {0}")]
    MalformedGeometry(String),

    #[error("edge references unknown node {0}")]
    UnknownEndpoint(SystemId),

    #[error("layout input still cyclic after feedback arc removal")]
    Cyclic,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),

    /// A newer request was issued while this one was in flight.
    #[error("diagram generation {generation} superseded by {latest}")]
    Superseded { generation: u64, latest: u64 },
}
