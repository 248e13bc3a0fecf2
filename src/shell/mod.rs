//! Interactive command shell over a [`Store`].
//!
//! The shell keeps a current category and understands:
//!
//! - `list`: products in the current category and its descendants
//! - `cat`, `cat <name>`, `cat ..`: show, descend into, or leave a category
//! - `make category|product|type <key>:<value> ...`: create things
//! - `types`, `tree`, `help`, `exit`
//!
//! Catalog errors are reported on the output and the session carries on.

pub mod tree_render;

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;

use crate::catalog::Store;
use crate::error::CatalogError;
use crate::models::*;

const MAKE_USAGE: &str = "USAGE: make {} [<key>:<value> ...]";

/// Whether the session continues after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell<W: Write> {
    store: Store,
    category: Arc<Category>,
    out: W,
}

impl<W: Write> Shell<W> {
    pub fn new(store: Store, out: W) -> Result<Self> {
        let category = store.root()?;
        Ok(Self {
            store,
            category,
            out,
        })
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.store.name())
    }

    /// The category commands currently operate on.
    pub fn category(&self) -> &Arc<Category> {
        &self.category
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read and execute commands until `exit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        let mut lines = input.lines();
        loop {
            write!(self.out, "{}", self.prompt())?;
            self.out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(self.out)?;
                writeln!(self.out, "bye.")?;
                return Ok(());
            };

            if self.execute(&line?)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Execute one command line.
    pub fn execute(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        let (command, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args = args.trim();

        tracing::debug!(command, args, "Shell command");
        match command {
            "" => {}
            "exit" | "quit" => {
                writeln!(self.out, "bye.")?;
                return Ok(Flow::Exit);
            }
            "help" => self.help()?,
            "list" => self.list()?,
            "cat" => self.cat(args)?,
            "make" => self.make(args)?,
            "types" => self.types()?,
            "tree" => self.tree()?,
            other => writeln!(self.out, "unknown command: {other}")?,
        }
        Ok(Flow::Continue)
    }

    fn help(&mut self) -> Result<()> {
        writeln!(self.out, "Commands:")?;
        writeln!(self.out, "  list                      list products in this category")?;
        writeln!(self.out, "  cat [<name>|..]           show or change the current category")?;
        writeln!(self.out, "  make category name:<n> [<key>:<type>[!] ...]")?;
        writeln!(self.out, "  make product name:<n> [<key>:<value> ...]")?;
        writeln!(self.out, "  make type name:<n> [unit:..] [kind:..] [min:..] [max:..] [max_length:..]")?;
        writeln!(self.out, "  types                     list attribute types")?;
        writeln!(self.out, "  tree                      show the category tree")?;
        writeln!(self.out, "  exit")?;
        Ok(())
    }

    /// Print a catalog error and carry on.
    fn report(&mut self, e: CatalogError) -> Result<()> {
        match e {
            CatalogError::Storage(_) | CatalogError::Integrity(_) => {
                tracing::error!(error = %e, "Shell command failed")
            }
            _ => tracing::debug!(error = %e, "Shell command rejected"),
        }
        writeln!(self.out, "ERROR: {e}")?;
        Ok(())
    }

    fn list(&mut self) -> Result<()> {
        let products = match self.store.products(&self.category) {
            Ok(products) => products,
            Err(e) => return self.report(e),
        };

        for product in products {
            let values = match self.store.values(&product) {
                Ok(values) => values,
                Err(e) => return self.report(e),
            };
            let rendered: Vec<String> = values
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            let line = format!(
                "{} ({}) {}",
                product.name(),
                product.category().path(),
                rendered.join(" ")
            );
            writeln!(self.out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn cat(&mut self, args: &str) -> Result<()> {
        match args {
            "" => {
                writeln!(self.out, "Current category: {}", self.category.path())?;
                let children = match self.store.children(&self.category) {
                    Ok(children) => children,
                    Err(e) => return self.report(e),
                };
                let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
                if !names.is_empty() {
                    writeln!(self.out, "{}", names.join("  "))?;
                }
            }
            ".." => self.category = self.store.parent(&self.category),
            name => match self.store.child(&self.category, name) {
                Ok(child) => self.category = child,
                Err(CatalogError::NotFound(_)) => {
                    writeln!(self.out, "No such category {name:?}")?
                }
                Err(e) => return self.report(e),
            },
        }
        Ok(())
    }

    fn make(&mut self, args: &str) -> Result<()> {
        let (what, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
        if !matches!(what, "category" | "product" | "type") {
            if what.is_empty() {
                writeln!(self.out, "{}", MAKE_USAGE.replace("{}", "category|product|type"))?;
            } else {
                writeln!(self.out, "Cannot make {what}")?;
            }
            return Ok(());
        }

        let Some(arguments) = parse_arguments(rest) else {
            writeln!(self.out, "{}", MAKE_USAGE.replace("{}", what))?;
            return Ok(());
        };

        match what {
            "category" => self.make_category(arguments),
            "product" => self.make_product(arguments),
            _ => self.make_type(arguments),
        }
    }

    fn make_category(&mut self, mut arguments: BTreeMap<String, String>) -> Result<()> {
        let Some(name) = take_required(&mut arguments, &["name", "Name"]) else {
            writeln!(self.out, "ERROR: missing required attribute 'name'")?;
            return Ok(());
        };

        let mut descriptors = Vec::new();
        for (key, type_name) in arguments {
            let (type_name, required) = match type_name.strip_suffix('!') {
                Some(stripped) => (stripped.to_string(), true),
                None => (type_name, false),
            };
            match self.store.attribute_types().get(&type_name) {
                Ok(attr_type) => {
                    descriptors.push(AttributeDescriptor::new(key, attr_type).required(required))
                }
                Err(CatalogError::NotFound(_)) => {
                    writeln!(
                        self.out,
                        "ERROR: the attribute type {type_name:?} is not defined.\n       Use 'make type' to define it."
                    )?;
                    return Ok(());
                }
                Err(e) => return self.report(e),
            }
        }

        match self
            .store
            .new_subcategory(&self.category, &name, descriptors)
        {
            Ok(category) => {
                self.category = category;
                self.cat("")
            }
            Err(e) => self.report(e),
        }
    }

    fn make_product(&mut self, mut arguments: BTreeMap<String, String>) -> Result<()> {
        let Some(name) = take_required(&mut arguments, &["name", "Name"]) else {
            writeln!(self.out, "ERROR: missing required attribute 'name'")?;
            return Ok(());
        };

        let mut values = BTreeMap::new();
        for (key, raw) in arguments {
            let Some(descriptor) = self.category.attribute(&key) else {
                writeln!(
                    self.out,
                    "ERROR: category '{}' has no attribute '{key}'",
                    self.category.name()
                )?;
                return Ok(());
            };
            match descriptor.attr_type().kind().parse(&raw) {
                Ok(value) => values.insert(key, value),
                Err(e) => return self.report(e),
            };
        }

        match self.store.new_product(&self.category, &name, values) {
            Ok(product) => writeln!(self.out, "Created product {}", product.name())?,
            Err(e) => self.report(e)?,
        }
        Ok(())
    }

    fn make_type(&mut self, mut arguments: BTreeMap<String, String>) -> Result<()> {
        let Some(name) = take_required(&mut arguments, &["name", "Name"]) else {
            writeln!(self.out, "ERROR: missing required attribute 'name'")?;
            return Ok(());
        };

        let created = TypeDefinition::from_options(&arguments)
            .and_then(|definition| self.store.attribute_types().create(&name, definition));
        match created {
            Ok(attr_type) => writeln!(self.out, "Created attribute type {attr_type}")?,
            Err(e) => self.report(e)?,
        }
        Ok(())
    }

    fn types(&mut self) -> Result<()> {
        match self.store.attribute_types().all() {
            Ok(types) => {
                for attr_type in types {
                    writeln!(self.out, "{attr_type}")?;
                }
                Ok(())
            }
            Err(e) => self.report(e),
        }
    }

    fn tree(&mut self) -> Result<()> {
        match self.store.category_tree(&self.category) {
            Ok(tree) => {
                write!(self.out, "{}", tree_render::render_tree(&tree))?;
                Ok(())
            }
            Err(e) => self.report(e),
        }
    }
}

/// Remove and return the first of `keys` present in `arguments`.
fn take_required(arguments: &mut BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| arguments.remove(*key))
}

/// One `key:value` argument. A value is either a double-quoted string, in
/// which `\"` stands for a quote, or a bare run of non-space characters.
static ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+):(?:"((?:[^"\\]|\\.)*)"|([^\s"]\S*))"#).unwrap()
});

/// Parse `key:value` arguments separated by whitespace. Returns `None` when
/// any part of the line is not a well-formed argument.
pub fn parse_arguments(line: &str) -> Option<BTreeMap<String, String>> {
    let mut arguments = BTreeMap::new();
    let mut end = 0;

    for captures in ARGUMENT.captures_iter(line) {
        let whole = captures.get(0)?;
        let gap = &line[end..whole.start()];
        if !gap.trim().is_empty() || (end > 0 && gap.is_empty()) {
            return None;
        }
        end = whole.end();

        let value = match (captures.get(2), captures.get(3)) {
            (Some(quoted), _) => quoted.as_str().replace("\\\"", "\""),
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return None,
        };
        arguments.insert(captures[1].to_string(), value);
    }

    if line[end..].trim().is_empty() {
        Some(arguments)
    } else {
        None
    }
}
