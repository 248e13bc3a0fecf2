//! Traversal policies over the category tree.

use crate::db::{Direction, EdgeKind, Position, TraversalPolicy};

/// Every category below the start category, at any depth.
pub struct Subcategories;

impl TraversalPolicy for Subcategories {
    fn expand(&self) -> &[(EdgeKind, Direction)] {
        &[(EdgeKind::Subcategory, Direction::Outgoing)]
    }

    fn include(&self, _position: &Position) -> bool {
        true
    }
}

/// Every product placed in the start category or any of its descendants.
///
/// Subcategory edges only carry the walk through intermediate categories; a
/// node is yielded only when it was reached over a product edge.
pub struct SubcategoryProducts;

impl TraversalPolicy for SubcategoryProducts {
    fn expand(&self) -> &[(EdgeKind, Direction)] {
        &[
            (EdgeKind::Subcategory, Direction::Outgoing),
            (EdgeKind::Product, Direction::Outgoing),
        ]
    }

    fn include(&self, position: &Position) -> bool {
        position.reached_via(EdgeKind::Product)
    }
}
