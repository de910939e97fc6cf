//! One-call launchers for MCP servers.

use crate::client::{McpProcess, McpServerConfig};
use crate::error::Result;

/// Spawn an MCP server via `/bin/sh -c command`.
///
/// Returns the spawned, not-yet-initialized process. The first protocol
/// operation runs the initialize handshake implicitly.
///
/// ```no_run
/// # async fn demo() -> mcp_rig::Result<()> {
/// let server = mcp_rig::mcp_shell("npx -y @modelcontextprotocol/server-everything")?;
/// let tools = server.get_tools().await?;
/// # Ok(())
/// # }
/// ```
pub fn mcp_shell(command: impl Into<String>) -> Result<McpProcess> {
    mcp_shell_with(McpServerConfig::shell(command))
}

/// Spawn an MCP server from an explicit config.
pub fn mcp_shell_with(config: McpServerConfig) -> Result<McpProcess> {
    let process = McpProcess::new(config);
    process.spawn()?;
    Ok(process)
}
