use std::sync::Arc;

use serde_json::Value as Json;

use super::identity::IdentityCache;
use crate::db::{Direction, EdgeKind, GraphDb, GraphTx, NodeId, Properties};
use crate::error::{CatalogError, Result};
use crate::models::{AttributeType, TypeDefinition};

/// Name of the subreference node all attribute types hang off.
pub(crate) const ATTRIBUTE_ROOT: &str = "ATTRIBUTE_ROOT";

/// Registry of attribute types.
///
/// Type names are unique per store. Uniqueness is checked inside the creating
/// transaction against everything already committed, so it holds across
/// connections and processes, not just within this registry.
pub struct AttributeTypes {
    db: GraphDb,
    root: NodeId,
    cache: IdentityCache<AttributeType>,
}

impl AttributeTypes {
    pub(crate) fn open(db: GraphDb) -> Result<Self> {
        let root = db.transaction(|tx| tx.subreference(ATTRIBUTE_ROOT, Properties::new()))?;
        Ok(Self {
            db,
            root,
            cache: IdentityCache::new(),
        })
    }

    /// Look a type up by name.
    pub fn get(&self, name: &str) -> Result<Arc<AttributeType>> {
        self.db.transaction(|tx| self.find(tx, name))
    }

    /// Create a new type. Fails with `Conflict` when the name is taken, even
    /// if the other type was committed by a concurrent creator.
    pub fn create(&self, name: &str, definition: TypeDefinition) -> Result<Arc<AttributeType>> {
        let id = self.db.transaction(|tx| {
            let node = tx.create_node(definition.to_properties(name))?;
            tx.create_edge(EdgeKind::AttributeType, self.root, node, Properties::new())?;

            for edge in tx.edges(self.root, EdgeKind::AttributeType, Direction::Outgoing)? {
                if edge.end != node && type_name(tx, edge.end)?.as_deref() == Some(name) {
                    tracing::warn!(name, "Attribute type already exists, aborting create");
                    return Err(CatalogError::Conflict(format!(
                        "attribute type '{name}' already exists"
                    )));
                }
            }
            Ok(node)
        })?;

        tracing::info!(name, node = %id, "Created attribute type");
        self.db.transaction(|tx| self.resolve(tx, id))
    }

    /// Return the type named `name`, creating it with `definition` if absent.
    ///
    /// When a concurrent creator wins the race, its type is returned.
    pub fn get_or_create(
        &self,
        name: &str,
        definition: TypeDefinition,
    ) -> Result<Arc<AttributeType>> {
        match self.get(name) {
            Err(CatalogError::NotFound(_)) => match self.create(name, definition) {
                Err(CatalogError::Conflict(_)) => {
                    tracing::debug!(name, "Lost attribute type creation race, reading winner");
                    self.get(name)
                }
                other => other,
            },
            other => other,
        }
    }

    /// Every registered type, in creation order.
    pub fn all(&self) -> Result<Vec<Arc<AttributeType>>> {
        self.db.transaction(|tx| {
            tx.edges(self.root, EdgeKind::AttributeType, Direction::Outgoing)?
                .into_iter()
                .map(|edge| self.resolve(tx, edge.end))
                .collect()
        })
    }

    pub(crate) fn find(&self, tx: &GraphTx<'_>, name: &str) -> Result<Arc<AttributeType>> {
        for edge in tx.edges(self.root, EdgeKind::AttributeType, Direction::Outgoing)? {
            let attr_type = self.resolve(tx, edge.end)?;
            if attr_type.name() == name {
                return Ok(attr_type);
            }
        }
        Err(CatalogError::NotFound(format!("no such attribute type: '{name}'")))
    }

    /// The canonical representation of the type stored at `node`.
    pub(crate) fn resolve(&self, tx: &GraphTx<'_>, node: NodeId) -> Result<Arc<AttributeType>> {
        self.cache.resolve(node, || {
            let props = tx.properties(node)?;
            let name = props
                .get("name")
                .and_then(Json::as_str)
                .ok_or_else(|| CatalogError::Integrity(format!("attribute type {node} has no name")))?
                .to_string();
            let definition = TypeDefinition::from_properties(&props)?;
            Ok(AttributeType::new(node, name, definition))
        })
    }
}

fn type_name(tx: &GraphTx<'_>, node: NodeId) -> Result<Option<String>> {
    Ok(tx
        .property(node, "name")?
        .and_then(|name| name.as_str().map(str::to_string)))
}
