//! Arrow reference resolution.
//!
//! An arrow reference navigates foreign keys: `org_id~>name` follows the
//! `org_id` foreign key out of the base table to `orgs.name`, and
//! `user_id<~posts` collects the `posts` rows whose `user_id` points back at
//! the base table. Resolution produces a [`PathBinding`]: the owning side `a`
//! and the target side `b`, each with the key the join matches on.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use skein_core::schema::SchemaCatalog;
use skein_core::{Error, Result, SchemaError};

/// Outgoing marker: follow a foreign key to the table it references.
pub const OUTGOING: &str = "~>";

/// Incoming marker: follow a foreign key back to the table holding it.
pub const INCOMING: &str = "<~";

/// The owning side of a binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingSide {
    pub table: String,
    pub acting_key: String,
}

/// The target side of a binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetSide {
    pub table: String,
    pub acting_key: String,
    /// A column, a further path resolved against `table`, or `*`.
    pub select: String,
}

/// A resolved arrow reference: `b.table.b.acting_key = a.table.a.acting_key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathBinding {
    pub a: BindingSide,
    pub b: TargetSide,
}

impl PathBinding {
    /// Returns true if the target side selects every column.
    pub fn selects_all(&self) -> bool {
        self.b.select == "*"
    }

    /// Returns true if the target side selects a further path.
    pub fn is_nested(&self) -> bool {
        is_path(&self.b.select)
    }
}

/// Returns true if `text` contains an arrow marker.
pub fn is_path(text: &str) -> bool {
    text.contains(OUTGOING) || text.contains(INCOMING)
}

/// Resolves arrow references against a schema catalog.
pub struct PathResolver<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> PathResolver<'a> {
    /// Creates a resolver.
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Returns true if the first `~>` precedes any `<~`.
    pub fn is_outgoing(reference: &str) -> bool {
        match (reference.find(OUTGOING), reference.find(INCOMING)) {
            (Some(out), Some(inc)) => out < inc,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Returns true if the first `<~` precedes any `~>`.
    pub fn is_incoming(reference: &str) -> bool {
        match (reference.find(OUTGOING), reference.find(INCOMING)) {
            (Some(out), Some(inc)) => inc < out,
            (None, Some(_)) => true,
            _ => false,
        }
    }

    /// Reverses the token order of a path and swaps every marker.
    pub fn reverse(reference: &str) -> String {
        let mut tokens = tokenize(reference);
        tokens.reverse();
        tokens
            .into_iter()
            .map(|token| match token {
                OUTGOING => INCOMING,
                INCOMING => OUTGOING,
                other => other,
            })
            .collect()
    }

    /// Resolves `reference` starting from `base` in `database`.
    pub fn resolve(
        &self,
        database: &str,
        base: Option<&str>,
        reference: &str,
    ) -> Result<PathBinding> {
        if Self::is_outgoing(reference) {
            self.resolve_outgoing(database, base, reference)
        } else if Self::is_incoming(reference) {
            self.resolve_incoming(database, base, reference)
        } else {
            Err(Error::validation(alloc::format!(
                "{} is not an arrow reference",
                reference
            )))
        }
    }

    fn resolve_outgoing(
        &self,
        database: &str,
        base: Option<&str>,
        reference: &str,
    ) -> Result<PathBinding> {
        let base = base.ok_or_else(|| {
            Error::validation(alloc::format!(
                "outgoing reference {} needs a base table",
                reference
            ))
        })?;
        let (fk, rest) = split_first(reference, OUTGOING);
        let base_schema = self.catalog.lookup(database, base)?;
        let target = base_schema.foreign_key(fk)?;
        let target_schema = self.catalog.lookup(database, target)?;
        let pk = target_schema.single_primary_key()?;
        Ok(PathBinding {
            a: BindingSide {
                table: base.to_string(),
                acting_key: fk.to_string(),
            },
            b: TargetSide {
                table: target.to_string(),
                acting_key: pk.to_string(),
                select: rest.to_string(),
            },
        })
    }

    fn resolve_incoming(
        &self,
        database: &str,
        base: Option<&str>,
        reference: &str,
    ) -> Result<PathBinding> {
        let (key, rest) = split_first(reference, INCOMING);
        let (source, select) = if Self::is_incoming(rest) {
            let inner = self.resolve(database, None, rest)?;
            (inner.a.table, rest.to_string())
        } else if Self::is_outgoing(rest) {
            let (table, select) = split_first(rest, OUTGOING);
            (table.to_string(), select.to_string())
        } else {
            (rest.to_string(), String::from("*"))
        };

        let source_schema = self.catalog.lookup(database, &source)?;
        let referenced = source_schema.foreign_key(key)?;
        let owner = match base {
            Some(base) if base != referenced => {
                return Err(SchemaError::UnrelatedTables {
                    table: source,
                    field: key.to_string(),
                    expected: base.to_string(),
                }
                .into())
            }
            Some(base) => base,
            None => referenced,
        };
        let owner_schema = self.catalog.lookup(database, owner)?;
        let pk = owner_schema.single_primary_key()?;
        Ok(PathBinding {
            a: BindingSide {
                table: owner.to_string(),
                acting_key: pk.to_string(),
            },
            b: TargetSide {
                table: source,
                acting_key: key.to_string(),
                select,
            },
        })
    }
}

fn split_first<'r>(reference: &'r str, marker: &str) -> (&'r str, &'r str) {
    match reference.find(marker) {
        Some(at) => (&reference[..at], &reference[at + marker.len()..]),
        None => (reference, ""),
    }
}

/// Splits a path into names and markers, keeping the markers.
fn tokenize(reference: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = reference;
    loop {
        let next = [rest.find(OUTGOING), rest.find(INCOMING)]
            .into_iter()
            .flatten()
            .min();
        match next {
            Some(at) => {
                tokens.push(&rest[..at]);
                tokens.push(&rest[at..at + 2]);
                rest = &rest[at + 2..];
            }
            None => {
                tokens.push(rest);
                return tokens;
            }
        }
    }
}
