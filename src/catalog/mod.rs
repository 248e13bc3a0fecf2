//! The catalog: categories, attribute types and products over a graph store.
//!
//! [`Store`] is the entry point. It owns the storage handle and the two
//! identity-cached registries, and exposes every category and product
//! operation. All reads and writes go through storage transactions; every
//! mutating operation is one transaction spanning its read-decide-write steps.

mod categories;
mod identity;
mod policies;
mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::db::{Direction, EdgeKind, GraphDb, GraphTx, NodeId, Properties};
use crate::error::{CatalogError, Result};
use crate::models::*;

use categories::CategoryRegistry;

pub use identity::IdentityCache;
pub use policies::{Subcategories, SubcategoryProducts};
pub use types::AttributeTypes;

/// Name of the subreference node the category tree hangs off.
const CATEGORY_ROOT: &str = "CATEGORY_ROOT";

const PRODUCT_NAME: &str = "name";

#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    db: GraphDb,
    name: String,
    root: NodeId,
    categories: CategoryRegistry,
    types: AttributeTypes,
}

impl Store {
    /// Open the catalog stored in `db`, creating the category and attribute
    /// type roots on first use. A new root category is named `name`.
    pub fn open(db: GraphDb, name: &str) -> Result<Self> {
        let root = db.transaction(|tx| {
            let mut props = Properties::new();
            props.insert("name".into(), Json::from(name));
            tx.subreference(CATEGORY_ROOT, props)
        })?;
        let types = AttributeTypes::open(db.clone())?;

        tracing::info!(store = name, root = %root, "Opened catalog");
        Ok(Self {
            inner: Arc::new(StoreInner {
                db,
                name: name.to_string(),
                root,
                categories: CategoryRegistry::new(),
                types,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn db(&self) -> &GraphDb {
        &self.inner.db
    }

    pub fn attribute_types(&self) -> &AttributeTypes {
        &self.inner.types
    }

    /// Number of categories currently held by the identity cache.
    pub fn cached_categories(&self) -> usize {
        self.inner.categories.cached()
    }

    // ============================================================
    // Category resolution
    // ============================================================

    pub fn root(&self) -> Result<Arc<Category>> {
        self.resolve_category(self.inner.root)
    }

    /// The canonical category for `node`. Repeated calls return the same `Arc`.
    pub fn resolve_category(&self, node: NodeId) -> Result<Arc<Category>> {
        self.inner.db.transaction(|tx| self.resolve(tx, node))
    }

    fn resolve(&self, tx: &GraphTx<'_>, node: NodeId) -> Result<Arc<Category>> {
        self.inner.categories.resolve(tx, &self.inner.types, node)
    }

    /// Every category below the root, at any depth.
    pub fn categories(&self) -> Result<Vec<Arc<Category>>> {
        self.inner.db.transaction(|tx| {
            tx.traverse(self.inner.root, Subcategories)
                .map(|node| self.resolve(tx, node?))
                .collect()
        })
    }

    /// The first category below the root named `name`.
    pub fn category(&self, name: &str) -> Result<Arc<Category>> {
        self.inner.db.transaction(|tx| {
            for node in tx.traverse(self.inner.root, Subcategories) {
                let category = self.resolve(tx, node?)?;
                if category.name() == name {
                    return Ok(category);
                }
            }
            Err(CatalogError::NotFound(format!("no such category: '{name}'")))
        })
    }

    /// The parent of `category`. The root is its own parent.
    pub fn parent(&self, category: &Arc<Category>) -> Arc<Category> {
        category.parent().unwrap_or(category).clone()
    }

    /// Direct children of `category`.
    pub fn children(&self, category: &Category) -> Result<Vec<Arc<Category>>> {
        self.inner
            .db
            .transaction(|tx| self.child_categories(tx, category.id()))
    }

    fn child_categories(&self, tx: &GraphTx<'_>, node: NodeId) -> Result<Vec<Arc<Category>>> {
        tx.edges(node, EdgeKind::Subcategory, Direction::Outgoing)?
            .into_iter()
            .map(|edge| self.resolve(tx, edge.end))
            .collect()
    }

    /// The direct child of `category` named `name`.
    pub fn child(&self, category: &Category, name: &str) -> Result<Arc<Category>> {
        self.children(category)?
            .into_iter()
            .find(|child| child.name() == name)
            .ok_or_else(|| {
                CatalogError::NotFound(format!("no category '{name}' in '{}'", category.name()))
            })
    }

    /// `category` and all its descendants as a tree.
    pub fn category_tree(&self, category: &Arc<Category>) -> Result<CategoryTreeNode> {
        self.inner.db.transaction(|tx| self.build_tree(tx, category))
    }

    fn build_tree(&self, tx: &GraphTx<'_>, category: &Arc<Category>) -> Result<CategoryTreeNode> {
        let children = self
            .child_categories(tx, category.id())?
            .iter()
            .map(|child| self.build_tree(tx, child))
            .collect::<Result<Vec<_>>>()?;
        Ok(CategoryTreeNode {
            id: category.id(),
            name: category.name().to_string(),
            attributes: category.own_attributes().keys().cloned().collect(),
            children,
        })
    }

    // ============================================================
    // Category creation
    // ============================================================

    /// Create a category directly below the root.
    pub fn create_category(
        &self,
        name: &str,
        attributes: Vec<AttributeDescriptor>,
    ) -> Result<Arc<Category>> {
        let root = self.root()?;
        self.new_subcategory(&root, name, attributes)
    }

    /// Create a child category of `parent` declaring `attributes`.
    pub fn new_subcategory(
        &self,
        parent: &Category,
        name: &str,
        attributes: Vec<AttributeDescriptor>,
    ) -> Result<Arc<Category>> {
        let node = self.inner.db.transaction(|tx| {
            let mut props = Properties::new();
            props.insert("name".into(), Json::from(name));
            let node = tx.create_node(props)?;
            tx.create_edge(EdgeKind::Subcategory, parent.id(), node, Properties::new())?;

            for descriptor in &attributes {
                tx.create_edge(
                    EdgeKind::Attribute,
                    node,
                    descriptor.attr_type().id(),
                    descriptor.to_edge_properties()?,
                )?;
            }
            Ok(node)
        })?;

        tracing::info!(
            category = name,
            parent = parent.name(),
            attributes = attributes.len(),
            "Created category"
        );
        self.resolve_category(node)
    }

    // ============================================================
    // Products
    // ============================================================

    /// Create a product named `name` in `category` with the given attribute
    /// values.
    ///
    /// Values are written through their descriptors, then every required
    /// attribute in the category's effective set is verified. Any failure
    /// aborts the whole transaction, so no partially written product remains.
    pub fn new_product(
        &self,
        category: &Arc<Category>,
        name: &str,
        values: BTreeMap<String, Value>,
    ) -> Result<Product> {
        let result = self.inner.db.transaction(|tx| {
            let mut props = Properties::new();
            props.insert(PRODUCT_NAME.into(), Json::from(name));
            let node = tx.create_node(props)?;
            tx.create_edge(EdgeKind::Product, category.id(), node, Properties::new())?;

            for (key, value) in &values {
                let descriptor = category.attribute(key).ok_or_else(|| {
                    CatalogError::Validation(format!(
                        "category '{}' has no attribute '{key}'",
                        category.name()
                    ))
                })?;
                descriptor.set(tx, node, value)?;
            }

            for descriptor in category.effective_attributes().values() {
                descriptor.verify(tx, node)?;
            }
            Ok(node)
        });

        match result {
            Ok(node) => {
                tracing::info!(category = category.name(), product = name, node = %node, "Created product");
                Ok(Product::new(node, name.to_string(), category.clone()))
            }
            Err(e) => {
                tracing::warn!(category = category.name(), error = %e, "Product creation aborted");
                Err(e)
            }
        }
    }

    /// The product stored at `node`, with its category resolved over the
    /// incoming product edge.
    pub fn product(&self, node: NodeId) -> Result<Product> {
        self.inner.db.transaction(|tx| self.load_product(tx, node))
    }

    fn load_product(&self, tx: &GraphTx<'_>, node: NodeId) -> Result<Product> {
        let edge = tx
            .single_edge(node, EdgeKind::Product, Direction::Incoming)?
            .ok_or_else(|| CatalogError::NotFound(format!("no product {node}")))?;
        let name = tx
            .property(node, PRODUCT_NAME)?
            .as_ref()
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or_else(|| CatalogError::Integrity(format!("product {node} has no name")))?;
        Ok(Product::new(node, name, self.resolve(tx, edge.start)?))
    }

    /// Every product in `category` or any of its descendants.
    pub fn products(&self, category: &Category) -> Result<Vec<Product>> {
        self.inner.db.transaction(|tx| {
            tx.traverse(category.id(), SubcategoryProducts)
                .map(|node| self.load_product(tx, node?))
                .collect()
        })
    }

    // ============================================================
    // Product attribute access
    // ============================================================

    fn descriptor<'p>(product: &'p Product, key: &str) -> Result<&'p AttributeDescriptor> {
        product.attribute(key).ok_or_else(|| {
            CatalogError::NotFound(format!(
                "category '{}' has no attribute '{key}'",
                product.category().name()
            ))
        })
    }

    /// The value of `key` on `product`, falling back to the default.
    pub fn value(&self, product: &Product, key: &str) -> Result<Option<Value>> {
        let descriptor = Self::descriptor(product, key)?;
        self.inner
            .db
            .transaction(|tx| descriptor.get(tx, product.id()))
    }

    pub fn set_value(&self, product: &Product, key: &str, value: &Value) -> Result<()> {
        let descriptor = Self::descriptor(product, key)?;
        self.inner
            .db
            .transaction(|tx| descriptor.set(tx, product.id(), value))
    }

    pub fn delete_value(&self, product: &Product, key: &str) -> Result<()> {
        let descriptor = Self::descriptor(product, key)?;
        self.inner
            .db
            .transaction(|tx| descriptor.delete(tx, product.id()))
    }

    /// All effective attribute values of `product`. Absent values without a
    /// default are omitted.
    pub fn values(&self, product: &Product) -> Result<BTreeMap<String, Value>> {
        self.inner.db.transaction(|tx| {
            let mut values = BTreeMap::new();
            for (key, descriptor) in product.category().effective_attributes() {
                if let Some(value) = descriptor.get(tx, product.id())? {
                    values.insert(key.to_string(), value);
                }
            }
            Ok(values)
        })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}
