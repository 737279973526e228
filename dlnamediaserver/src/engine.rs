//! Moteur de requêtes `Browse` / `Search`.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use dlnadidl::{DidlError, DidlLite, DidlObject, Filter, property};
use dlnaupnp::UpnpError;
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::catalog::Catalog;
use crate::search::SearchExpr;
use crate::sort::SortCriteria;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    Metadata,
    DirectChildren,
}

impl BrowseFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseFlag::Metadata => "BrowseMetadata",
            BrowseFlag::DirectChildren => "BrowseDirectChildren",
        }
    }
}

impl FromStr for BrowseFlag {
    type Err = UpnpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BrowseMetadata" => Ok(BrowseFlag::Metadata),
            "BrowseDirectChildren" => Ok(BrowseFlag::DirectChildren),
            other => Err(UpnpError::InvalidArgs(format!("invalid BrowseFlag '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowseRequest {
    pub object_id: String,
    pub flag: BrowseFlag,
    pub filter: String,
    pub starting_index: u32,
    /// 0 : tous les enfants restants
    pub requested_count: u32,
    pub sort_criteria: String,
}

impl BrowseRequest {
    /// Tous les enfants, sans tri ni filtre.
    pub fn children(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            flag: BrowseFlag::DirectChildren,
            filter: "*".to_string(),
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
        }
    }

    pub fn metadata(object_id: impl Into<String>) -> Self {
        Self {
            flag: BrowseFlag::Metadata,
            ..Self::children(object_id)
        }
    }

    pub fn page(mut self, starting_index: u32, requested_count: u32) -> Self {
        self.starting_index = starting_index;
        self.requested_count = requested_count;
        self
    }

    pub fn sorted_by(mut self, sort_criteria: impl Into<String>) -> Self {
        self.sort_criteria = sort_criteria.into();
        self
    }

    pub fn filtered(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub container_id: String,
    pub criteria: String,
    pub filter: String,
    pub starting_index: u32,
    pub requested_count: u32,
    pub sort_criteria: String,
}

impl SearchRequest {
    pub fn new(container_id: impl Into<String>, criteria: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            criteria: criteria.into(),
            filter: "*".to_string(),
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
        }
    }

    pub fn page(mut self, starting_index: u32, requested_count: u32) -> Self {
        self.starting_index = starting_index;
        self.requested_count = requested_count;
        self
    }

    pub fn sorted_by(mut self, sort_criteria: impl Into<String>) -> Self {
        self.sort_criteria = sort_criteria.into();
        self
    }
}

/// Résultat d'une requête, avant sérialisation DIDL-Lite.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub objects: Vec<DidlObject>,
    pub total_matches: u32,
    pub update_id: u32,
}

impl QueryResult {
    pub fn number_returned(&self) -> u32 {
        self.objects.len() as u32
    }

    pub fn to_didl(&self) -> Result<String, DidlError> {
        DidlLite::new(self.objects.clone()).to_xml()
    }
}

/// Exécute `Browse` et `Search` sur un [`Catalog`].
#[derive(Debug, Clone)]
pub struct QueryEngine {
    catalog: Arc<dyn Catalog>,
}

impl QueryEngine {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    fn update_id(&self, id: &str) -> u32 {
        self.catalog
            .container_update_id(id)
            .unwrap_or_else(|| self.catalog.system_update_id())
    }

    pub async fn browse(&self, request: &BrowseRequest) -> Result<QueryResult, UpnpError> {
        let filter = Filter::parse(&request.filter);

        match request.flag {
            BrowseFlag::Metadata => {
                let entry = self.catalog.entry(&request.object_id).await?;
                Ok(QueryResult {
                    objects: vec![filter.apply(&entry)],
                    total_matches: 1,
                    update_id: self.update_id(&request.object_id),
                })
            }
            BrowseFlag::DirectChildren => {
                let sort = SortCriteria::parse(&request.sort_criteria)?;
                let mut children = self.catalog.children(&request.object_id).await?;
                sort.sort(&mut children);

                let total_matches = children.len() as u32;
                let objects = paginate(children, request.starting_index, request.requested_count)
                    .iter()
                    .map(|o| filter.apply(o))
                    .collect::<Vec<_>>();

                debug!(
                    "Browse {} -> {}/{} objects",
                    request.object_id,
                    objects.len(),
                    total_matches
                );
                Ok(QueryResult {
                    objects,
                    total_matches,
                    update_id: self.update_id(&request.object_id),
                })
            }
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<QueryResult, UpnpError> {
        let expr = SearchExpr::parse(&request.criteria)
            .map_err(|e| UpnpError::InvalidArgs(e.to_string()))?;
        if let Some(unknown) = expr.properties().into_iter().find(|p| !property::is_known(p)) {
            return Err(UpnpError::InvalidSearchCriteria(format!(
                "unsupported property '{}'",
                unknown
            )));
        }
        let sort = SortCriteria::parse(&request.sort_criteria)?;
        let filter = Filter::parse(&request.filter);

        // Vérifie l'existence du container avant le parcours
        self.catalog.entry(&request.container_id).await?;

        let mut matches = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(request.container_id.clone());
        self.collect(&request.container_id, &expr, &mut visited, &mut matches)
            .await?;
        sort.sort(&mut matches);

        let total_matches = matches.len() as u32;
        let objects = paginate(matches, request.starting_index, request.requested_count)
            .iter()
            .map(|o| filter.apply(o))
            .collect::<Vec<_>>();

        debug!(
            "Search {} [{}] -> {}/{} objects",
            request.container_id,
            expr,
            objects.len(),
            total_matches
        );
        Ok(QueryResult {
            objects,
            total_matches,
            update_id: self.update_id(&request.container_id),
        })
    }

    /// Parcours en profondeur : chaque container et sa descendance, puis les
    /// items, dans l'ordre du catalogue. `visited` protège des cycles.
    fn collect<'a>(
        &'a self,
        id: &'a str,
        expr: &'a SearchExpr,
        visited: &'a mut HashSet<String>,
        out: &'a mut Vec<DidlObject>,
    ) -> BoxFuture<'a, Result<(), UpnpError>> {
        async move {
            let (containers, items): (Vec<_>, Vec<_>) = self
                .catalog
                .children(id)
                .await?
                .into_iter()
                .partition(|c| c.is_container());

            for container in containers {
                if !visited.insert(container.id().to_string()) {
                    continue;
                }
                let child_id = container.id().to_string();
                if self.catalog.matches(&container, expr) {
                    out.push(container);
                }
                self.collect(&child_id, expr, visited, out).await?;
            }

            out.extend(
                items
                    .into_iter()
                    .filter(|item| self.catalog.matches(item, expr)),
            );
            Ok(())
        }
        .boxed()
    }
}

fn paginate(objects: Vec<DidlObject>, starting_index: u32, requested_count: u32) -> Vec<DidlObject> {
    let count = if requested_count == 0 {
        usize::MAX
    } else {
        requested_count as usize
    };
    objects
        .into_iter()
        .skip(starting_index as usize)
        .take(count)
        .collect()
}
