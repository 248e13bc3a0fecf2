use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use shop::db::{GraphDb, NodeId};
use shop::models::*;
use shop::{CatalogError, Store};
use speculate2::speculate;

fn open_store() -> Store {
    let db = GraphDb::open_memory().expect("Failed to create in-memory database");
    db.migrate().expect("Failed to run migrations");
    Store::open(db, "Products").expect("Failed to open store")
}

fn text_type(store: &Store, name: &str) -> Arc<AttributeType> {
    store
        .attribute_types()
        .get_or_create(name, TypeDefinition::new(None))
        .expect("Failed to create attribute type")
}

fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn ids(products: &[Product]) -> HashSet<NodeId> {
    products.iter().map(Product::id).collect()
}

speculate! {
    before {
        let store = open_store();
    }

    describe "root category" {
        it "is named after the store" {
            let root = store.root().expect("Failed to resolve root");
            assert_eq!(root.name(), "Products");
            assert!(root.is_root());
            assert!(root.parent().is_none());
        }

        it "is its own parent" {
            let root = store.root().expect("Failed to resolve root");
            assert!(Arc::ptr_eq(&store.parent(&root), &root));
        }

        it "is the parent of top level categories" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            let root = store.root().expect("Failed to resolve root");
            assert!(Arc::ptr_eq(&store.parent(&books), &root));
        }
    }

    describe "identity" {
        it "resolves the same node to the same instance" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");

            let again = store.resolve_category(books.id()).expect("Failed to resolve");
            let by_name = store.category("Books").expect("Failed to find");
            let root = store.root().expect("Failed to resolve root");
            let by_child = store.child(&root, "Books").expect("Failed to find child");

            assert!(Arc::ptr_eq(&books, &again));
            assert!(Arc::ptr_eq(&books, &by_name));
            assert!(Arc::ptr_eq(&books, &by_child));
        }

        it "shares the resolved parent between siblings" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            let scifi = store.new_subcategory(&books, "SciFi", vec![]).expect("Failed to create");
            let poetry = store.new_subcategory(&books, "Poetry", vec![]).expect("Failed to create");

            assert!(Arc::ptr_eq(scifi.parent().unwrap(), poetry.parent().unwrap()));
            assert!(Arc::ptr_eq(scifi.parent().unwrap(), &books));
        }

        it "builds a new node once under concurrent first resolution" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            // A second store over the same database has a cold cache.
            let cold = Store::open(store.db().clone(), "Products").expect("Failed to open");

            let resolved: Vec<Arc<Category>> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..8)
                    .map(|_| s.spawn(|| cold.resolve_category(books.id()).expect("Failed to resolve")))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert!(resolved.iter().all(|c| Arc::ptr_eq(c, &resolved[0])));
            // Books and its parent, the root.
            assert_eq!(cold.cached_categories(), 2);
        }
    }

    describe "new_subcategory" {
        it "links the new category under its parent" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            store.new_subcategory(&books, "SciFi", vec![]).expect("Failed to create");
            store.new_subcategory(&books, "Poetry", vec![]).expect("Failed to create");

            let names: Vec<String> = store
                .children(&books)
                .expect("Failed to list")
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            assert_eq!(names, vec!["SciFi", "Poetry"]);

            let scifi = store.child(&books, "SciFi").expect("Failed to find");
            assert_eq!(scifi.path(), "Products/Books/SciFi");
        }

        it "lists every category below the root" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            store.new_subcategory(&books, "SciFi", vec![]).expect("Failed to create");
            store.create_category("Paint", vec![]).expect("Failed to create");

            let names: HashSet<String> = store
                .categories()
                .expect("Failed to list")
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            assert_eq!(names, HashSet::from(["Books".into(), "SciFi".into(), "Paint".into()]));
        }

        it "declares the given attributes" {
            let isbn = AttributeDescriptor::new("isbn", text_type(&store, "code")).required(true);
            let books = store.create_category("Books", vec![isbn]).expect("Failed to create");

            let descriptor = books.attribute("isbn").expect("Missing attribute");
            assert!(descriptor.is_required());
            assert_eq!(descriptor.attr_type().name(), "code");
        }

        it "fails with NotFound for an unknown child" {
            let root = store.root().expect("Failed to resolve root");
            let err = store.child(&root, "Nothing").unwrap_err();
            assert!(matches!(err, CatalogError::NotFound(_)));

            let err = store.category("Nothing").unwrap_err();
            assert!(matches!(err, CatalogError::NotFound(_)));
        }
    }

    describe "attribute inheritance" {
        it "makes the child's attribute set a superset of its parent's" {
            let title = AttributeDescriptor::new("title", text_type(&store, "text"));
            let books = store.create_category("Books", vec![title]).expect("Failed to create");
            let isbn = AttributeDescriptor::new("isbn", text_type(&store, "code"));
            let scifi = store.new_subcategory(&books, "SciFi", vec![isbn]).expect("Failed to create");

            let parent_keys: HashSet<&str> = books.effective_attributes().into_keys().collect();
            let child_keys: HashSet<&str> = scifi.effective_attributes().into_keys().collect();
            assert!(child_keys.is_superset(&parent_keys));
            assert!(child_keys.contains("isbn"));
        }

        it "lets a redeclared key shadow the parent's descriptor" {
            let text = text_type(&store, "text");
            let paint = store
                .create_category("Paint", vec![AttributeDescriptor::new("colour", text.clone()).with_default("red")])
                .expect("Failed to create");
            let plain = store.new_product(&paint, "Primer", BTreeMap::new()).expect("Failed to create");
            let blue_paint = store
                .new_subcategory(&paint, "Blue", vec![AttributeDescriptor::new("colour", text).with_default("blue")])
                .expect("Failed to create");

            let blue = store.new_product(&blue_paint, "Ocean", BTreeMap::new()).expect("Failed to create");

            assert_eq!(store.value(&blue, "colour").unwrap(), Some(Value::from("blue")));
            assert_eq!(store.value(&plain, "colour").unwrap(), Some(Value::from("red")));

            let reloaded = store.product(plain.id()).expect("Failed to load");
            assert!(Arc::ptr_eq(reloaded.category(), &paint));
            assert_eq!(store.value(&reloaded, "colour").unwrap(), Some(Value::from("red")));
        }
    }

    describe "products" {
        it "iterates every product nested under a category" {
            let root = store.root().expect("Failed to resolve root");
            let a = store.create_category("A", vec![]).expect("Failed to create");
            let b = store.create_category("B", vec![]).expect("Failed to create");

            let p1 = store.new_product(&root, "Gift card", BTreeMap::new()).expect("Failed to create");
            let p2 = store.new_product(&a, "Widget", BTreeMap::new()).expect("Failed to create");
            let p3 = store.new_product(&b, "Gadget", BTreeMap::new()).expect("Failed to create");

            let under_root = store.products(&root).expect("Failed to list");
            assert_eq!(under_root.len(), 3);
            assert_eq!(ids(&under_root), HashSet::from([p1.id(), p2.id(), p3.id()]));

            let under_a = store.products(&a).expect("Failed to list");
            assert_eq!(ids(&under_a), HashSet::from([p2.id()]));
        }

        it "resolves a product's category over its product edge" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            let created = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");

            let loaded = store.product(created.id()).expect("Failed to load");
            assert_eq!(loaded, created);
            assert!(Arc::ptr_eq(loaded.category(), &books));
        }

        it "rejects a missing required attribute without leaving a node behind" {
            let isbn = AttributeDescriptor::new("isbn", text_type(&store, "code")).required(true);
            let books = store.create_category("Books", vec![isbn]).expect("Failed to create");
            let nodes_before = store.db().node_count().expect("Failed to count");

            let err = store.new_product(&books, "Dune", BTreeMap::new()).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)));

            assert!(store.products(&books).expect("Failed to list").is_empty());
            assert_eq!(store.db().node_count().expect("Failed to count"), nodes_before);
        }

        it "verifies required attributes inherited from ancestors" {
            let title = AttributeDescriptor::new("title", text_type(&store, "text")).required(true);
            let books = store.create_category("Books", vec![title]).expect("Failed to create");
            let scifi = store.new_subcategory(&books, "SciFi", vec![]).expect("Failed to create");

            let err = store.new_product(&scifi, "Hyperion", BTreeMap::new()).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)));

            store
                .new_product(&scifi, "Hyperion", values(&[("title", Value::from("Dune"))]))
                .expect("Failed to create");
        }

        it "rejects values violating the type's constraints" {
            let pages = store
                .attribute_types()
                .create("pages", TypeDefinition::new(None).kind(ValueKind::Integer).range(Some(1.0), None))
                .expect("Failed to create type");
            let books = store
                .create_category("Books", vec![AttributeDescriptor::new("pages", pages).required(true)])
                .expect("Failed to create");

            let err = store.new_product(&books, "Dune", values(&[("pages", Value::Integer(0))])).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)));
            assert!(store.products(&books).expect("Failed to list").is_empty());

            store
                .new_product(&books, "Dune", values(&[("pages", Value::Integer(412))]))
                .expect("Failed to create");
        }

        it "does not check constraints of optional attributes" {
            let pages = store
                .attribute_types()
                .create("pages", TypeDefinition::new(None).kind(ValueKind::Integer).range(Some(1.0), None))
                .expect("Failed to create type");
            let books = store
                .create_category("Books", vec![AttributeDescriptor::new("pages", pages)])
                .expect("Failed to create");

            let product = store
                .new_product(&books, "Dune", values(&[("pages", Value::Integer(0))]))
                .expect("Optional attribute was verified");
            assert_eq!(store.value(&product, "pages").unwrap(), Some(Value::Integer(0)));
        }

        it "keeps the product name" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            let created = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");
            assert_eq!(created.name(), "Dune");

            let loaded = store.product(created.id()).expect("Failed to load");
            assert_eq!(loaded.name(), "Dune");
            assert_eq!(store.products(&books).unwrap()[0].name(), "Dune");
        }

        it "rejects values for undeclared attributes" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            let err = store
                .new_product(&books, "Dune", values(&[("colour", Value::from("red"))]))
                .unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)));
        }
    }

    describe "attribute values" {
        it "falls back to the default until a value is set" {
            let stock = store
                .attribute_types()
                .create("count", TypeDefinition::new(Some("pcs")).kind(ValueKind::Integer))
                .expect("Failed to create type");
            let books = store
                .create_category("Books", vec![AttributeDescriptor::new("stock", stock).with_default(Value::Integer(0))])
                .expect("Failed to create");
            let product = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");

            assert_eq!(store.value(&product, "stock").unwrap(), Some(Value::Integer(0)));

            store.set_value(&product, "stock", &Value::Integer(12)).expect("Failed to set");
            assert_eq!(store.value(&product, "stock").unwrap(), Some(Value::Integer(12)));

            store.delete_value(&product, "stock").expect("Failed to delete");
            assert_eq!(store.value(&product, "stock").unwrap(), Some(Value::Integer(0)));
        }

        it "round trips values through a converting type" {
            let date = store
                .attribute_types()
                .create("date", TypeDefinition::new(None).kind(ValueKind::Timestamp))
                .expect("Failed to create type");
            let books = store
                .create_category("Books", vec![AttributeDescriptor::new("published", date)])
                .expect("Failed to create");
            let product = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");

            let published = Value::Timestamp(Utc.with_ymd_and_hms(1965, 8, 1, 9, 30, 15).unwrap());
            store.set_value(&product, "published", &published).expect("Failed to set");
            assert_eq!(store.value(&product, "published").unwrap(), Some(published));
        }

        it "returns None for an absent value without default" {
            let title = AttributeDescriptor::new("title", text_type(&store, "text"));
            let books = store.create_category("Books", vec![title]).expect("Failed to create");
            let product = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");

            assert_eq!(store.value(&product, "title").unwrap(), None);
            assert!(store.values(&product).unwrap().is_empty());
        }

        it "fails with NotFound for an undeclared key" {
            let books = store.create_category("Books", vec![]).expect("Failed to create");
            let product = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");

            let err = store.value(&product, "colour").unwrap_err();
            assert!(matches!(err, CatalogError::NotFound(_)));
        }

        it "rejects a value of the wrong kind" {
            let title = AttributeDescriptor::new("title", text_type(&store, "text"));
            let books = store.create_category("Books", vec![title]).expect("Failed to create");
            let product = store.new_product(&books, "Dune", BTreeMap::new()).expect("Failed to create");

            let err = store.set_value(&product, "title", &Value::Integer(3)).unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)));
        }
    }

    describe "persistence" {
        it "rebuilds categories and products from a reopened store" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("store.db");

            let product_id = {
                let db = GraphDb::open(path.clone()).expect("Failed to open");
                db.migrate().expect("Failed to migrate");
                let store = Store::open(db, "Shop").expect("Failed to open store");
                let title = AttributeDescriptor::new("title", text_type(&store, "text"));
                let books = store.create_category("Books", vec![title]).expect("Failed to create");
                let product = store
                    .new_product(&books, "Dune", values(&[("title", Value::from("Dune"))]))
                    .expect("Failed to create");
                product.id()
            };

            let db = GraphDb::open(path).expect("Failed to reopen");
            db.migrate().expect("Failed to migrate");
            let reopened = Store::open(db, "Ignored").expect("Failed to open store");

            assert_eq!(reopened.root().unwrap().name(), "Shop");
            let product = reopened.product(product_id).expect("Failed to load");
            assert_eq!(product.category().name(), "Books");
            assert_eq!(reopened.value(&product, "title").unwrap(), Some(Value::from("Dune")));
        }
    }
}
