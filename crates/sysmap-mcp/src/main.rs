use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use sysmap_core::{
    watch_catalog, ChartVersion, DiagramSettings, Direction, Directional, FileStore, GraphStore,
    InterfaceUpdate, NewSystem, SystemId, SystemInterface, SystemUpdate,
};
use sysmap_engine::{
    DiagramEvents, DiagramRequest, DiagramSession, Pipeline, PipelineError, RenderGraph,
};
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListSystemsRequest {
    /// Only list the direct children of this system. Omit to list every system.
    #[serde(default)]
    parent_id: Option<SystemId>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SystemIdRequest {
    /// ID of the system
    id: SystemId,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddSystemRequest {
    /// Display name, 3 to 50 characters
    name: String,
    /// Free-form category such as "Service" or "Database", 3 to 50 characters
    category: String,
    /// Parent system. Omit for a top-level system.
    #[serde(default)]
    parent_id: Option<SystemId>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateSystemRequest {
    /// ID of the system to update
    id: SystemId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListInterfacesRequest {
    /// Only list interfaces with this system as source or target.
    #[serde(default)]
    system_id: Option<SystemId>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddInterfaceRequest {
    source_id: SystemId,
    target_id: SystemId,
    /// Protocol or mechanism, e.g. "REST", "gRPC", "AMQP"
    connection_type: String,
    /// 1 = one-way (source to target), 2 = both ways. Defaults to 1.
    #[serde(default)]
    directional: Option<u8>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateInterfaceRequest {
    source_id: SystemId,
    target_id: SystemId,
    #[serde(default)]
    connection_type: Option<String>,
    /// 1 = one-way, 2 = both ways
    #[serde(default)]
    directional: Option<u8>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct InterfaceKeyRequest {
    source_id: SystemId,
    target_id: SystemId,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
struct GetDiagramRequest {
    /// Drill into this system. Omit to keep the current focus.
    #[serde(default)]
    focal_id: Option<SystemId>,
    /// Return to the top-level view. Ignored when focal_id is given.
    #[serde(default)]
    top_level: Option<bool>,
    /// "vertical" or "horizontal". Omit to keep the current direction.
    #[serde(default)]
    direction: Option<Direction>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct FocusSystemRequest {
    /// Node of the current diagram to drill into. Omit to return to the top-level view.
    #[serde(default)]
    node_id: Option<SystemId>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ConnectSystemsRequest {
    source_id: SystemId,
    target_id: SystemId,
}

// --- View state ---

#[derive(Debug, Clone, Copy, Default)]
struct ViewState {
    focal: Option<SystemId>,
    direction: Direction,
}

/// What the diagram currently shows. Receives the diagram's navigation events.
#[derive(Debug, Default)]
struct View {
    state: Mutex<ViewState>,
}

impl View {
    fn new(direction: Direction) -> Self {
        Self {
            state: Mutex::new(ViewState {
                focal: None,
                direction,
            }),
        }
    }

    fn get(&self) -> ViewState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut ViewState)) {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

impl DiagramEvents for View {
    fn focal_system_changed(&self, id: Option<SystemId>) {
        tracing::debug!(?id, "focal system changed");
        self.update(|s| s.focal = id);
    }

    fn edge_creation_requested(&self, source: SystemId, target: SystemId) {
        tracing::info!(source, target, "edge creation requested; not persisted");
    }
}

// --- Server ---

#[derive(Clone)]
pub struct SysmapServer {
    store: Arc<FileStore>,
    session: Arc<DiagramSession<FileStore>>,
    version: ChartVersion,
    view: Arc<View>,
    tool_router: ToolRouter<Self>,
}

fn json_text<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

fn ok_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(json_text(value))]))
}

fn fail(message: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(message.into())]))
}

fn directional(code: Option<u8>) -> Result<Option<Directional>, String> {
    code.map(Directional::try_from).transpose()
}

#[tool_router]
impl SysmapServer {
    pub fn new(store: Arc<FileStore>, settings: &DiagramSettings, version: ChartVersion) -> Self {
        let session = DiagramSession::new(Pipeline::new(store.clone(), settings));
        Self {
            store,
            session: Arc::new(session),
            version,
            view: Arc::new(View::new(settings.direction)),
            tool_router: Self::tool_router(),
        }
    }

    /// Diagram for the current view at the current chart version.
    async fn diagram(&self) -> Result<Arc<RenderGraph>, String> {
        let view = self.view.get();
        let request = DiagramRequest {
            focal: view.focal,
            direction: view.direction,
            chart_version: self.version.get(),
        };
        self.session.request(request).await.map_err(|e| match e {
            PipelineError::Superseded { .. } => {
                "A newer diagram request replaced this one. Call get_diagram again.".to_string()
            }
            PipelineError::Layout(e) => format!("Layout failed, previous diagram kept: {}", e),
        })
    }

    async fn diagram_result(&self) -> Result<CallToolResult, McpError> {
        match self.diagram().await {
            Ok(graph) => ok_json(graph.as_ref()),
            Err(e) => fail(e),
        }
    }

    /// Report a mutation, bumping the chart version when it succeeded.
    fn mutated<T: Serialize>(&self, what: &str, result: sysmap_core::Result<T>) -> Result<CallToolResult, McpError> {
        match result {
            Ok(value) => {
                let v = self.version.bump();
                tracing::info!(chart_version = v, "{}", what);
                ok_json(&value)
            }
            Err(e) => fail(format!("Failed to {}: {}", what, e)),
        }
    }

    #[tool(description = "List systems in the catalog. Returns [{id, name, category, parent_id}] ordered by descending id.")]
    async fn list_systems(
        &self,
        Parameters(req): Parameters<ListSystemsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let systems = match req.parent_id {
            Some(parent) => self.store.get_systems_by_parent_id(parent).await,
            None => self.store.get_all_systems().await,
        };
        match systems {
            Ok(systems) if systems.is_empty() => Ok(CallToolResult::success(vec![Content::text(
                "No systems found. Use add_system to create one.",
            )])),
            Ok(systems) => ok_json(&systems),
            Err(e) => fail(format!("Failed to read systems: {}", e)),
        }
    }

    #[tool(description = "Get one system with its direct children and every interface it takes part in. Returns {system, children, interfaces}.")]
    async fn get_system(
        &self,
        Parameters(req): Parameters<SystemIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        let system = match self.store.get_system_by_id(req.id).await {
            Ok(Some(system)) => system,
            Ok(None) => return fail(format!("System {} not found", req.id)),
            Err(e) => return fail(format!("Failed to read system {}: {}", req.id, e)),
        };
        let children = self.store.get_systems_by_parent_id(req.id).await;
        let interfaces = self.store.get_all_interfaces_involving(&[req.id]).await;
        match (children, interfaces) {
            (Ok(children), Ok(interfaces)) => ok_json(&serde_json::json!({
                "system": system,
                "children": children,
                "interfaces": interfaces,
            })),
            (Err(e), _) | (_, Err(e)) => fail(format!("Failed to read system {}: {}", req.id, e)),
        }
    }

    #[tool(description = "Add a system. Returns the stored system with its new id.")]
    async fn add_system(
        &self,
        Parameters(req): Parameters<AddSystemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .store
            .create_system(NewSystem {
                name: req.name,
                category: req.category,
                parent_id: req.parent_id,
            })
            .await;
        self.mutated("add system", result)
    }

    #[tool(description = "Rename or recategorize a system. The parent cannot be changed.")]
    async fn update_system(
        &self,
        Parameters(req): Parameters<UpdateSystemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let update = SystemUpdate {
            name: req.name,
            category: req.category,
        };
        let result = self.store.update_system(req.id, update).await;
        self.mutated("update system", result)
    }

    #[tool(description = "Delete a system that has no children. Its interfaces are deleted with it.")]
    async fn delete_system(
        &self,
        Parameters(req): Parameters<SystemIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.store.delete_system(req.id).await;
        if result.is_ok() && self.view.get().focal == Some(req.id) {
            self.view.update(|s| s.focal = None);
        }
        self.mutated("delete system", result.map(|()| format!("Deleted system {}", req.id)))
    }

    #[tool(description = "List interfaces. Returns [{source_system_id, target_system_id, connection_type, directional}]; with system_id, each row also carries full source and target systems.")]
    async fn list_interfaces(
        &self,
        Parameters(req): Parameters<ListInterfacesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = match req.system_id {
            Some(id) => self
                .store
                .get_all_interfaces_involving(&[id])
                .await
                .map(|records| json_text(&records)),
            None => self
                .store
                .get_all_interfaces()
                .await
                .map(|interfaces| json_text(&interfaces)),
        };
        match result {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => fail(format!("Failed to read interfaces: {}", e)),
        }
    }

    #[tool(description = "Add an interface between two existing systems. Only one interface may exist per (source, target) pair.")]
    async fn add_interface(
        &self,
        Parameters(req): Parameters<AddInterfaceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let directional = match directional(req.directional) {
            Ok(d) => d.unwrap_or(Directional::Directed),
            Err(e) => return fail(e),
        };
        let result = self
            .store
            .create_interface(SystemInterface {
                source_system_id: req.source_id,
                target_system_id: req.target_id,
                connection_type: req.connection_type,
                directional,
            })
            .await;
        self.mutated("add interface", result)
    }

    #[tool(description = "Change the connection type or directionality of an interface.")]
    async fn update_interface(
        &self,
        Parameters(req): Parameters<UpdateInterfaceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let directional = match directional(req.directional) {
            Ok(d) => d,
            Err(e) => return fail(e),
        };
        let update = InterfaceUpdate {
            connection_type: req.connection_type,
            directional,
        };
        let result = self
            .store
            .update_interface(req.source_id, req.target_id, update)
            .await;
        self.mutated("update interface", result)
    }

    #[tool(description = "Delete the interface from source_id to target_id.")]
    async fn delete_interface(
        &self,
        Parameters(req): Parameters<InterfaceKeyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .store
            .delete_interface(req.source_id, req.target_id)
            .await
            .map(|()| format!("Deleted interface {} -> {}", req.source_id, req.target_id));
        self.mutated("delete interface", result)
    }

    #[tool(
        description = "Get the laid-out diagram for the current view: the focal system with two levels of descendants (or the top-level systems and their children), every interface touching them, and parent-child containment edges. Returns {direction, rankDir, nodes: [{id, systemId, label, category, position: {x, y}, sourceAnchor, targetAnchor, color, width, height}], edges: [{id, source, target, label, animated, directed, stroke, strokeWidth, containment}]}."
    )]
    async fn get_diagram(
        &self,
        Parameters(req): Parameters<GetDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.view.update(|s| {
            if let Some(id) = req.focal_id {
                s.focal = Some(id);
            } else if req.top_level == Some(true) {
                s.focal = None;
            }
            if let Some(direction) = req.direction {
                s.direction = direction;
            }
        });
        self.diagram_result().await
    }

    #[tool(description = "Drill into a node of the current diagram, or back to the top-level view when node_id is omitted. Returns the new diagram.")]
    async fn focus_system(
        &self,
        Parameters(req): Parameters<FocusSystemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let current = match self.diagram().await {
            Ok(graph) => graph,
            Err(e) => return fail(e),
        };
        match req.node_id {
            Some(id) => {
                if !current.activate_node(id, self.view.as_ref()) {
                    return fail(format!("System {} is not part of the current diagram", id));
                }
            }
            None => current.show_top_level(self.view.as_ref()),
        }
        self.diagram_result().await
    }

    #[tool(description = "Draw a connection between two nodes of the current diagram. The connection is NOT saved; use add_interface to store it. Returns the provisional edge.")]
    async fn connect_systems(
        &self,
        Parameters(req): Parameters<ConnectSystemsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let current = match self.diagram().await {
            Ok(graph) => graph,
            Err(e) => return fail(e),
        };
        match current.connect(req.source_id, req.target_id, self.view.as_ref()) {
            Some(edge) => ok_json(&serde_json::json!({
                "persisted": false,
                "edge": edge,
            })),
            None => fail(format!(
                "Both {} and {} must be part of the current diagram",
                req.source_id, req.target_id
            )),
        }
    }
}

#[tool_handler]
impl ServerHandler for SysmapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"Sysmap keeps a catalog of systems (a hierarchy via parent_id) and the interfaces between them.

Browse with list_systems, get_system and list_interfaces. Edit with add_system, update_system, delete_system, add_interface, update_interface and delete_interface.

get_diagram lays out the current view. With no focus it shows the top-level systems and their children; focus_system drills into a node and shows it with two levels of descendants. Interfaces reaching outside that set pull their far endpoint into the diagram. connect_systems only draws a provisional edge; call add_interface to keep it."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let settings = sysmap_core::read_settings();
    let store = Arc::new(FileStore::open_default());
    let version = ChartVersion::new();
    let _watcher = match watch_catalog(store.path(), version.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "not watching catalog for external changes");
            None
        }
    };
    tracing::info!(catalog = %store.path().display(), "starting sysmap MCP server");

    let service = SysmapServer::new(store, &settings, version)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(dir: &tempfile::TempDir) -> SysmapServer {
        let store = Arc::new(FileStore::open(dir.path().join("catalog.json")));
        SysmapServer::new(store, &DiagramSettings::default(), ChartVersion::new())
    }

    fn failed(result: &CallToolResult) -> bool {
        result.is_error == Some(true)
    }

    async fn add(server: &SysmapServer, name: &str, parent_id: Option<SystemId>) {
        let result = server
            .add_system(Parameters(AddSystemRequest {
                name: name.to_string(),
                category: "Service".to_string(),
                parent_id,
            }))
            .await
            .unwrap();
        assert!(!failed(&result));
    }

    #[tokio::test]
    async fn mutations_bump_the_chart_version() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);

        add(&server, "Storefront", None).await;
        add(&server, "Checkout", Some(1)).await;
        assert_eq!(server.version.get(), 2);

        let rejected = server
            .add_system(Parameters(AddSystemRequest {
                name: "X".to_string(),
                category: "Service".to_string(),
                parent_id: None,
            }))
            .await
            .unwrap();
        assert!(failed(&rejected));
        assert_eq!(server.version.get(), 2);

        let refused = server
            .delete_system(Parameters(SystemIdRequest { id: 1 }))
            .await
            .unwrap();
        assert!(failed(&refused));
    }

    #[tokio::test]
    async fn bad_directional_codes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        add(&server, "Storefront", None).await;
        add(&server, "Inventory", None).await;

        let result = server
            .add_interface(Parameters(AddInterfaceRequest {
                source_id: 1,
                target_id: 2,
                connection_type: "REST".to_string(),
                directional: Some(7),
            }))
            .await
            .unwrap();
        assert!(failed(&result));

        let result = server
            .add_interface(Parameters(AddInterfaceRequest {
                source_id: 1,
                target_id: 2,
                connection_type: "REST".to_string(),
                directional: None,
            }))
            .await
            .unwrap();
        assert!(!failed(&result));
    }

    #[tokio::test]
    async fn focus_follows_diagram_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        add(&server, "Storefront", None).await;
        add(&server, "Checkout", Some(1)).await;

        let top = server.diagram().await.unwrap();
        assert_eq!(top.nodes.len(), 2);

        let focused = server
            .focus_system(Parameters(FocusSystemRequest { node_id: Some(2) }))
            .await
            .unwrap();
        assert!(!failed(&focused));
        assert_eq!(server.view.get().focal, Some(2));

        let missing = server
            .focus_system(Parameters(FocusSystemRequest { node_id: Some(1) }))
            .await
            .unwrap();
        assert!(failed(&missing));

        server
            .focus_system(Parameters(FocusSystemRequest { node_id: None }))
            .await
            .unwrap();
        assert_eq!(server.view.get().focal, None);
    }

    #[tokio::test]
    async fn connect_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        add(&server, "Storefront", None).await;
        add(&server, "Inventory", None).await;

        let result = server
            .connect_systems(Parameters(ConnectSystemsRequest {
                source_id: 1,
                target_id: 2,
            }))
            .await
            .unwrap();
        assert!(!failed(&result));
        assert!(server.store.get_all_interfaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn direction_and_focus_persist_between_diagrams() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        add(&server, "Storefront", None).await;

        server
            .get_diagram(Parameters(GetDiagramRequest {
                direction: Some(Direction::Horizontal),
                ..Default::default()
            }))
            .await
            .unwrap();
        let graph = server.diagram().await.unwrap();
        assert_eq!(graph.direction, Direction::Horizontal);
    }
}
