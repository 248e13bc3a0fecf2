use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::attribute::AttributeDescriptor;
use crate::db::NodeId;

/// One node of the category tree.
///
/// A category declares attribute descriptors; every product placed in it, or
/// in any descendant, exposes them. The effective attribute set is the union
/// of the category's own descriptors and those inherited along the parent
/// chain, with own descriptors shadowing inherited ones of the same key.
///
/// Categories are owned by the store's category registry for the life of the
/// process and handed out as `Arc<Category>`; two handles for the same node
/// are always the same allocation.
#[derive(Debug)]
pub struct Category {
    id: NodeId,
    name: String,
    parent: Option<Arc<Category>>,
    attributes: BTreeMap<String, AttributeDescriptor>,
}

impl Category {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        parent: Option<Arc<Category>>,
        attributes: BTreeMap<String, AttributeDescriptor>,
    ) -> Self {
        Self {
            id,
            name,
            parent,
            attributes,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent category, `None` for the root.
    pub fn parent(&self) -> Option<&Arc<Category>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Descriptors declared on this category itself.
    pub fn own_attributes(&self) -> &BTreeMap<String, AttributeDescriptor> {
        &self.attributes
    }

    /// Resolve `key` on this category, then on each ancestor in turn.
    pub fn attribute(&self, key: &str) -> Option<&AttributeDescriptor> {
        self.lineage()
            .find_map(|category| category.attributes.get(key))
    }

    /// Own and inherited descriptors by key, nearest declaration winning.
    pub fn effective_attributes(&self) -> BTreeMap<&str, &AttributeDescriptor> {
        let mut attributes = BTreeMap::new();
        for category in self.lineage() {
            for (key, descriptor) in &category.attributes {
                attributes.entry(key.as_str()).or_insert(descriptor);
            }
        }
        attributes
    }

    /// This category followed by its ancestors up to the root.
    pub fn lineage(&self) -> impl Iterator<Item = &Category> {
        std::iter::successors(Some(self), |category| category.parent.as_deref())
    }

    /// Names from the root down to this category, joined with `/`.
    pub fn path(&self) -> String {
        let mut names: Vec<&str> = self.lineage().map(Category::name).collect();
        names.reverse();
        names.join("/")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A named product placed in exactly one category.
#[derive(Debug, Clone)]
pub struct Product {
    id: NodeId,
    name: String,
    category: Arc<Category>,
}

impl Product {
    pub(crate) fn new(id: NodeId, name: String, category: Arc<Category>) -> Self {
        Self { id, name, category }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &Arc<Category> {
        &self.category
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeDescriptor> {
        self.category.attribute(key)
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Product {}

/// A category with its nested children, used for tree rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTreeNode {
    pub id: NodeId,
    pub name: String,
    /// Keys of the attributes declared on this category itself.
    pub attributes: Vec<String>,
    pub children: Vec<CategoryTreeNode>,
}
