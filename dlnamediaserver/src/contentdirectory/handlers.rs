//! Handlers des actions ContentDirectory.
//!
//! Le dispatcher a déjà validé les arguments IN (nombre, types `ui4`,
//! valeurs autorisées de `BrowseFlag`) ; les handlers se contentent de les
//! convertir en requêtes pour le [`QueryEngine`].

use async_trait::async_trait;
use dlnaupnp::UpnpError;
use dlnaupnp::dispatch::{ActionArgs, ActionContext, ActionHandler};
use tracing::{debug, error};

use crate::engine::{BrowseFlag, BrowseRequest, QueryEngine, QueryResult, SearchRequest};

fn result_args(result: QueryResult) -> Result<ActionArgs, UpnpError> {
    let didl = result.to_didl().map_err(|e| {
        error!("❌ DIDL-Lite serialization failed: {}", e);
        UpnpError::action_failed(e.to_string())
    })?;

    Ok(ActionArgs::new()
        .with("Result", didl)
        .with("NumberReturned", result.number_returned())
        .with("TotalMatches", result.total_matches)
        .with("UpdateID", result.update_id))
}

pub struct BrowseHandler {
    engine: QueryEngine,
}

impl BrowseHandler {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ActionHandler for BrowseHandler {
    async fn invoke(&self, _ctx: ActionContext, args: ActionArgs) -> Result<ActionArgs, UpnpError> {
        let request = BrowseRequest {
            object_id: args.required("ObjectID")?.to_string(),
            flag: args.required("BrowseFlag")?.parse::<BrowseFlag>()?,
            filter: args.required("Filter")?.to_string(),
            starting_index: args.parse("StartingIndex")?,
            requested_count: args.parse("RequestedCount")?,
            sort_criteria: args.required("SortCriteria")?.to_string(),
        };
        debug!(
            "📂 Browse {} {} [{}+{}]",
            request.object_id,
            request.flag.as_str(),
            request.starting_index,
            request.requested_count
        );

        result_args(self.engine.browse(&request).await?)
    }
}

pub struct SearchHandler {
    engine: QueryEngine,
}

impl SearchHandler {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ActionHandler for SearchHandler {
    async fn invoke(&self, _ctx: ActionContext, args: ActionArgs) -> Result<ActionArgs, UpnpError> {
        let request = SearchRequest {
            container_id: args.required("ContainerID")?.to_string(),
            criteria: args.required("SearchCriteria")?.to_string(),
            filter: args.required("Filter")?.to_string(),
            starting_index: args.parse("StartingIndex")?,
            requested_count: args.parse("RequestedCount")?,
            sort_criteria: args.required("SortCriteria")?.to_string(),
        };
        debug!("🔍 Search {} [{}]", request.container_id, request.criteria);

        result_args(self.engine.search(&request).await?)
    }
}

/// `GetSearchCapabilities` et `GetSortCapabilities` : renvoie la valeur de
/// la variable d'état associée.
pub struct CapabilitiesHandler {
    output: &'static str,
    variable: &'static str,
}

impl CapabilitiesHandler {
    pub fn search() -> Self {
        Self {
            output: "SearchCaps",
            variable: "SearchCapabilities",
        }
    }

    pub fn sort() -> Self {
        Self {
            output: "SortCaps",
            variable: "SortCapabilities",
        }
    }
}

#[async_trait]
impl ActionHandler for CapabilitiesHandler {
    async fn invoke(&self, ctx: ActionContext, _args: ActionArgs) -> Result<ActionArgs, UpnpError> {
        let value = ctx
            .tree
            .get_value(&ctx.key, self.variable)
            .map_err(|e| UpnpError::action_failed(e.to_string()))?;
        Ok(ActionArgs::new().with(self.output, value))
    }
}

pub struct SystemUpdateIdHandler {
    engine: QueryEngine,
}

impl SystemUpdateIdHandler {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ActionHandler for SystemUpdateIdHandler {
    async fn invoke(&self, _ctx: ActionContext, _args: ActionArgs) -> Result<ActionArgs, UpnpError> {
        Ok(ActionArgs::new().with("Id", self.engine.catalog().system_update_id()))
    }
}
