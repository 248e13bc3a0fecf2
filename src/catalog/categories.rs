use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;

use super::identity::IdentityCache;
use super::types::AttributeTypes;
use crate::db::{Direction, EdgeKind, GraphTx, NodeId};
use crate::error::{CatalogError, Result};
use crate::models::{AttributeDescriptor, Category};

/// Identity-cached category representations.
pub(crate) struct CategoryRegistry {
    cache: IdentityCache<Category>,
}

impl CategoryRegistry {
    pub(crate) fn new() -> Self {
        Self {
            cache: IdentityCache::new(),
        }
    }

    /// The canonical category for `node`, built from its edges on first use.
    ///
    /// Building reads the node's name, turns every outgoing attribute edge into
    /// a descriptor and resolves the parent (the start of the single incoming
    /// subcategory edge). A node with no parent is the root.
    pub(crate) fn resolve(
        &self,
        tx: &GraphTx<'_>,
        types: &AttributeTypes,
        node: NodeId,
    ) -> Result<Arc<Category>> {
        self.cache.resolve(node, || {
            let name = tx
                .property(node, "name")?
                .as_ref()
                .and_then(Json::as_str)
                .map(str::to_string)
                .ok_or_else(|| CatalogError::Integrity(format!("category {node} has no name")))?;

            let mut attributes = BTreeMap::new();
            for edge in tx.edges(node, EdgeKind::Attribute, Direction::Outgoing)? {
                let attr_type = types.resolve(tx, edge.end)?;
                let descriptor = AttributeDescriptor::from_edge_properties(&edge.properties, attr_type)?;
                attributes.insert(descriptor.key().to_string(), descriptor);
            }

            let parent = match tx.single_edge(node, EdgeKind::Subcategory, Direction::Incoming)? {
                Some(edge) => Some(self.resolve(tx, types, edge.start)?),
                None => None,
            };

            tracing::debug!(category = %name, node = %node, "Built category");
            Ok(Category::new(node, name, parent, attributes))
        })
    }

    pub(crate) fn cached(&self) -> usize {
        self.cache.count()
    }
}
