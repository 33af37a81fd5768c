use rmcp::{model::*, ServiceExt};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::tools::{self, ToolError};
use crate::AppState;

#[derive(Clone)]
pub struct McpService {
    pub state: Arc<AppState>,
}

impl McpService {
    pub fn new() -> anyhow::Result<Self> {
        // Initialize tracing
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let config = Config::from_env()?;
        info!("Starting Activity MCP Service");
        info!("Upstream API base: {}", config.api_base);

        let state = Arc::new(AppState::new(config)?);
        Ok(Self { state })
    }
}

impl rmcp::ServerHandler for McpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "activity-mcp".to_string(),
                version: "0.1.0".to_string(),
            },
            instructions: Some(
                "Search recreational activities and events through the upstream activities API, \
                 with session preferences, result caching and search history analytics."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _page: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = tools::tool_descriptors()
            .into_iter()
            .map(|t| Tool {
                name: Cow::Borrowed(t.name),
                description: Some(Cow::Borrowed(t.description)),
                input_schema: match t.input_schema {
                    serde_json::Value::Object(map) => Arc::new(map),
                    _ => Arc::new(serde_json::Map::new()),
                },
                output_schema: None,
                annotations: None,
            })
            .collect();

        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        info!("MCP tool call: {} with args: {:?}", request.name, request.arguments);

        match tools::dispatch(&self.state, request.name.as_ref(), request.arguments.as_ref()).await
        {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(ToolError::UnknownTool(name)) => Err(ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Unknown tool: {name}"),
                None,
            )),
            Err(ToolError::InvalidArguments(msg)) => {
                Err(ErrorData::new(ErrorCode::INVALID_PARAMS, msg, None))
            }
            Err(ToolError::Api(e)) => {
                error!("Tool error: {}", e);
                let body = serde_json::to_string_pretty(&e.to_json())
                    .unwrap_or_else(|_| e.to_string());
                Ok(CallToolResult::success(vec![Content::text(body)]))
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let service = McpService::new()?;
    // Use the stdio transport from rmcp
    let server = service.serve(rmcp::transport::stdio()).await?;
    info!("MCP stdio server running");
    let _quit_reason = server.waiting().await?;
    Ok(())
}
