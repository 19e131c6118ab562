//! Listing the remote service's tools, optionally narrowed to a query.

use toolflow_types::{RemoteTools, ToolDescriptor, ToolError};

use crate::bm25::{Bm25Filter, FilterOptions};

/// List the service's tools. With `filter`, keep only those relevant to
/// `query`; an irrelevant query may leave none.
pub async fn remote_descriptors(
    service: &dyn RemoteTools,
    filter: Option<&FilterOptions>,
    query: &str,
) -> Result<Vec<ToolDescriptor>, ToolError> {
    let tools = service.list_tools().await?;
    let Some(options) = filter else {
        return Ok(tools);
    };

    let available = tools.len();
    let selected = Bm25Filter::new(tools).filter(query, options);
    tracing::info!("Filtered remote tools: {} of {available} offered", selected.len());
    Ok(selected)
}
