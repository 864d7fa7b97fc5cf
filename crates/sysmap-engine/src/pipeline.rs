use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use sysmap_core::{DiagramSettings, Direction, GraphStore, SystemId};

use crate::closure::ClosureResolver;
use crate::interfaces::InterfaceResolver;
use crate::layout::LayoutAdapter;
use crate::present::{Presenter, RenderGraph};
use crate::{CanonicalGraph, LayoutError, PipelineError};

/// Everything a diagram depends on. Two equal requests yield the same
/// diagram as long as the store has not changed, which `chart_version`
/// tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DiagramRequest {
    pub focal: Option<SystemId>,
    pub direction: Direction,
    pub chart_version: u64,
}

/// Closure → interfaces → canonical graph → layout → presentation.
pub struct Pipeline<S: ?Sized> {
    store: Arc<S>,
    closure_depth: usize,
    layout: LayoutAdapter,
    presenter: Presenter,
}

impl<S: GraphStore + ?Sized> Pipeline<S> {
    pub fn new(store: Arc<S>, settings: &DiagramSettings) -> Self {
        Self {
            store,
            closure_depth: settings.closure_depth,
            layout: LayoutAdapter::from_settings(settings),
            presenter: Presenter::from_settings(settings),
        }
    }

    pub fn with_layout(mut self, layout: LayoutAdapter) -> Self {
        self.layout = layout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve the nodes and edges shown for `focal`. Read failures shrink
    /// the graph instead of failing it.
    pub async fn canonical_graph(&self, focal: Option<SystemId>) -> CanonicalGraph {
        let closure = ClosureResolver::new(self.store.as_ref())
            .with_depth(self.closure_depth)
            .resolve(focal)
            .await;
        let records = InterfaceResolver::new(self.store.as_ref())
            .resolve(&closure)
            .await;
        let graph = CanonicalGraph::from_resolution(closure, records);
        tracing::debug!(
            ?focal,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built canonical graph"
        );
        graph
    }

    pub async fn run(&self, request: &DiagramRequest) -> Result<RenderGraph, LayoutError> {
        let graph = self.canonical_graph(request.focal).await;
        let positioned = self.layout.layout(&graph, request.direction)?;
        self.presenter.present(&graph, &positioned)
    }
}

struct Applied {
    request: DiagramRequest,
    graph: Arc<RenderGraph>,
}

/// Holds the displayed diagram and serializes updates to it.
///
/// Every request takes a generation number. A result that arrives after a
/// newer request was issued is dropped, so a slow lookup for an old focal
/// system can never overwrite a newer diagram.
pub struct DiagramSession<S: ?Sized> {
    pipeline: Pipeline<S>,
    latest: AtomicU64,
    applied: Mutex<Option<Applied>>,
}

impl<S: GraphStore + ?Sized> DiagramSession<S> {
    pub fn new(pipeline: Pipeline<S>) -> Self {
        Self {
            pipeline,
            latest: AtomicU64::new(0),
            applied: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Pipeline<S> {
        &self.pipeline
    }

    fn applied(&self) -> MutexGuard<'_, Option<Applied>> {
        self.applied.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The diagram currently displayed, if any.
    pub fn current(&self) -> Option<Arc<RenderGraph>> {
        self.applied().as_ref().map(|a| a.graph.clone())
    }

    pub fn current_request(&self) -> Option<DiagramRequest> {
        self.applied().as_ref().map(|a| a.request)
    }

    /// Show the diagram for `request`.
    ///
    /// Returns the displayed graph unchanged when `request` equals the one
    /// it was built for. Otherwise the pipeline runs in full. On a layout
    /// failure the previous diagram stays displayed.
    pub async fn request(&self, request: DiagramRequest) -> Result<Arc<RenderGraph>, PipelineError> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let cached = self
            .applied()
            .as_ref()
            .filter(|a| a.request == request)
            .map(|a| a.graph.clone());
        if let Some(graph) = cached {
            tracing::debug!(generation, "diagram unchanged, reusing layout");
            return Ok(graph);
        }

        let result = self.pipeline.run(&request).await;

        let mut applied = self.applied();
        let latest = self.latest.load(Ordering::SeqCst);
        if generation != latest {
            tracing::debug!(generation, latest, "discarding superseded diagram");
            return Err(PipelineError::Superseded { generation, latest });
        }
        match result {
            Ok(graph) => {
                let graph = Arc::new(graph);
                *applied = Some(Applied {
                    request,
                    graph: graph.clone(),
                });
                tracing::debug!(
                    generation,
                    focal = ?request.focal,
                    nodes = graph.nodes.len(),
                    "diagram applied"
                );
                Ok(graph)
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "layout failed, keeping previous diagram");
                Err(e.into())
            }
        }
    }
}
