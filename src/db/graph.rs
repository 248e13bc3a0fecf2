use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rusqlite::{OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::error::{CatalogError, Result};

/// Key/value properties of a node or edge. Values are stored primitives.
pub type Properties = serde_json::Map<String, Json>;

/// Identity of a persisted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CatalogError::Integrity(format!("invalid node id {s:?}: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(Uuid);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The relationship types of the catalog graph.
///
/// - `Subcategory`: category → child category
/// - `Product`: category → product placed in it
/// - `Attribute`: category → attribute type, carrying `key`, `default`, `required`
/// - `AttributeType`: attribute type registry root → attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Subcategory,
    Product,
    Attribute,
    AttributeType,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subcategory => "SUBCATEGORY",
            Self::Product => "PRODUCT",
            Self::Attribute => "ATTRIBUTE",
            Self::AttributeType => "ATTRIBUTE_TYPE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SUBCATEGORY" => Some(Self::Subcategory),
            "PRODUCT" => Some(Self::Product),
            "ATTRIBUTE" => Some(Self::Attribute),
            "ATTRIBUTE_TYPE" => Some(Self::AttributeType),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub start: NodeId,
    pub end: NodeId,
    pub properties: Properties,
}

impl Edge {
    /// The node at the far end of this edge as seen from `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }

    pub fn property(&self, key: &str) -> Option<&Json> {
        self.properties.get(key)
    }
}

/// Graph operations available inside one storage transaction.
pub struct GraphTx<'c> {
    tx: Transaction<'c>,
}

impl<'c> GraphTx<'c> {
    pub(super) fn new(tx: Transaction<'c>) -> Self {
        Self { tx }
    }

    pub(super) fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub(super) fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }

    // ============================================================
    // Nodes
    // ============================================================

    pub fn create_node(&self, properties: Properties) -> Result<NodeId> {
        let id = NodeId::generate();
        self.tx.execute(
            "INSERT INTO nodes (id, created_at) VALUES (?, ?)",
            (id.to_string(), Utc::now().to_rfc3339()),
        )?;
        for (key, value) in &properties {
            self.set_property(id, key, value)?;
        }
        Ok(id)
    }

    pub fn node_count(&self) -> Result<usize> {
        let count: i64 = self
            .tx
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ============================================================
    // Properties
    // ============================================================

    pub fn property(&self, node: NodeId, key: &str) -> Result<Option<Json>> {
        let raw: Option<String> = self
            .tx
            .query_row(
                "SELECT value FROM node_properties WHERE node_id = ? AND key = ?",
                (node.to_string(), key),
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(CatalogError::from))
            .transpose()
    }

    pub fn properties(&self, node: NodeId) -> Result<Properties> {
        let mut stmt = self
            .tx
            .prepare("SELECT key, value FROM node_properties WHERE node_id = ? ORDER BY key")?;
        let rows = stmt
            .query_map([node.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut properties = Properties::new();
        for (key, raw) in rows {
            properties.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(properties)
    }

    pub fn set_property(&self, node: NodeId, key: &str, value: &Json) -> Result<()> {
        self.tx.execute(
            "INSERT INTO node_properties (node_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT (node_id, key) DO UPDATE SET value = excluded.value",
            (node.to_string(), key, serde_json::to_string(value)?),
        )?;
        Ok(())
    }

    /// Remove a property. Returns whether it was present.
    pub fn remove_property(&self, node: NodeId, key: &str) -> Result<bool> {
        let rows = self.tx.execute(
            "DELETE FROM node_properties WHERE node_id = ? AND key = ?",
            (node.to_string(), key),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Edges
    // ============================================================

    pub fn create_edge(
        &self,
        kind: EdgeKind,
        start: NodeId,
        end: NodeId,
        properties: Properties,
    ) -> Result<Edge> {
        let id = EdgeId(Uuid::new_v4());
        self.tx.execute(
            "INSERT INTO edges (id, kind, start_node, end_node, properties, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                kind.as_str(),
                start.to_string(),
                end.to_string(),
                serde_json::to_string(&properties)?,
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(Edge {
            id,
            kind,
            start,
            end,
            properties,
        })
    }

    /// Edges of `kind` touching `node` in `direction`, in creation order.
    pub fn edges(&self, node: NodeId, kind: EdgeKind, direction: Direction) -> Result<Vec<Edge>> {
        let sql = match direction {
            Direction::Outgoing => {
                "SELECT id, start_node, end_node, properties FROM edges
                 WHERE start_node = ? AND kind = ? ORDER BY rowid"
            }
            Direction::Incoming => {
                "SELECT id, start_node, end_node, properties FROM edges
                 WHERE end_node = ? AND kind = ? ORDER BY rowid"
            }
        };

        let mut stmt = self.tx.prepare(sql)?;
        let rows = stmt
            .query_map((node.to_string(), kind.as_str()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, start, end, properties)| -> Result<Edge> {
                let id = Uuid::parse_str(&id)
                    .map_err(|e| CatalogError::Integrity(format!("invalid edge id {id:?}: {e}")))?;
                Ok(Edge {
                    id: EdgeId(id),
                    kind,
                    start: start.parse()?,
                    end: end.parse()?,
                    properties: serde_json::from_str(&properties)?,
                })
            })
            .collect()
    }

    /// The only edge of `kind` in `direction`, if any. More than one is an
    /// integrity violation.
    pub fn single_edge(
        &self,
        node: NodeId,
        kind: EdgeKind,
        direction: Direction,
    ) -> Result<Option<Edge>> {
        let mut edges = self.edges(node, kind, direction)?;
        match edges.len() {
            0 => Ok(None),
            1 => Ok(edges.pop()),
            n => Err(CatalogError::Integrity(format!(
                "node {node} has {n} {direction:?} {} edges, expected at most one",
                kind.as_str()
            ))),
        }
    }

    // ============================================================
    // Subreferences
    // ============================================================

    /// Get or create the well-known node registered under `name`.
    ///
    /// `properties` only apply when the node is created.
    pub fn subreference(&self, name: &str, properties: Properties) -> Result<NodeId> {
        let existing: Option<String> = self
            .tx
            .query_row(
                "SELECT node_id FROM subreferences WHERE name = ?",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return id.parse();
        }

        let id = self.create_node(properties)?;
        self.tx.execute(
            "INSERT INTO subreferences (name, node_id) VALUES (?, ?)",
            (name, id.to_string()),
        )?;
        tracing::debug!(name, node = %id, "Created subreference node");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GraphDb;
    use serde_json::json;

    fn open() -> GraphDb {
        let db = GraphDb::open_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_edge_kind_round_trips_through_str() {
        for kind in [
            EdgeKind::Subcategory,
            EdgeKind::Product,
            EdgeKind::Attribute,
            EdgeKind::AttributeType,
        ] {
            assert_eq!(EdgeKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EdgeKind::from_str("CATEGORY"), None);
    }

    #[test]
    fn test_property_set_overwrite_and_remove() {
        let db = open();
        db.transaction(|tx| {
            let node = tx.create_node(Properties::new())?;
            assert_eq!(tx.property(node, "weight")?, None);

            tx.set_property(node, "weight", &json!(3))?;
            tx.set_property(node, "weight", &json!(4))?;
            assert_eq!(tx.property(node, "weight")?, Some(json!(4)));

            assert!(tx.remove_property(node, "weight")?);
            assert!(!tx.remove_property(node, "weight")?);
            assert_eq!(tx.property(node, "weight")?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_edges_by_direction() {
        let db = open();
        db.transaction(|tx| {
            let a = tx.create_node(Properties::new())?;
            let b = tx.create_node(Properties::new())?;
            let mut props = Properties::new();
            props.insert("key".into(), json!("colour"));
            tx.create_edge(EdgeKind::Attribute, a, b, props)?;

            let out = tx.edges(a, EdgeKind::Attribute, Direction::Outgoing)?;
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].end, b);
            assert_eq!(out[0].other(a), b);
            assert_eq!(out[0].property("key"), Some(&json!("colour")));

            assert!(tx.edges(a, EdgeKind::Attribute, Direction::Incoming)?.is_empty());
            assert!(tx.edges(a, EdgeKind::Product, Direction::Outgoing)?.is_empty());
            assert_eq!(
                tx.single_edge(b, EdgeKind::Attribute, Direction::Incoming)?
                    .map(|e| e.start),
                Some(a)
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_single_edge_rejects_duplicates() {
        let db = open();
        let result = db.transaction(|tx| {
            let a = tx.create_node(Properties::new())?;
            let b = tx.create_node(Properties::new())?;
            let c = tx.create_node(Properties::new())?;
            tx.create_edge(EdgeKind::Product, a, c, Properties::new())?;
            tx.create_edge(EdgeKind::Product, b, c, Properties::new())?;
            tx.single_edge(c, EdgeKind::Product, Direction::Incoming)
        });
        assert!(matches!(result, Err(CatalogError::Integrity(_))));
    }

    #[test]
    fn test_subreference_is_created_once() {
        let db = open();
        let first = db
            .transaction(|tx| tx.subreference("CATEGORY_ROOT", Properties::new()))
            .unwrap();
        let second = db
            .transaction(|tx| tx.subreference("CATEGORY_ROOT", Properties::new()))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(db.node_count().unwrap(), 1);
    }
}
