use handbook_cli::App;
use handbook_mcp::McpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    handbook_cli::init_tracing();
    let app = App::load().map_err(|e| {
        tracing::error!(error = %e, "failed to start handbook MCP server");
        e
    })?;
    McpServer::new(app.tools()?).serve_stdio().await?;
    Ok(())
}
