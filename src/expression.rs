//! Resolves logical field names to column expressions, joining through
//! relationships on the way.
//!
//! Every distinct join-path prefix is joined exactly once per resolver: the
//! first request for `("email",)` materialises an aliased join and caches the
//! alias, later requests for `("email",)` or `("email", "domain")` reuse it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use sea_query::{Expr, Iden, JoinType, SelectStatement, SimpleExpr};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BindingError, Result};
use crate::schema::{Attribute, Entity, Schema, SqlType};

/// Table or alias identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIden(pub String);

impl Iden for TableIden {
    fn unquoted(&self, s: &mut dyn fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnIden(pub String);

impl Iden for ColumnIden {
    fn unquoted(&self, s: &mut dyn fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// A column qualified by the table or alias it is read from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpression {
    pub table: String,
    pub column: String,
    pub sql_type: SqlType,
    pub expr: SimpleExpr,
}

impl FieldExpression {
    pub fn new(table: &str, column: &str, sql_type: SqlType) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            sql_type,
            expr: Expr::col((TableIden(table.to_string()), ColumnIden(column.to_string()))).into(),
        }
    }
}

impl fmt::Display for FieldExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// How a logical field name maps onto the schema.
///
/// Deserializes from either a bare column name or
/// `{"param": "<column>", "join": "<rel>" | ["<rel>", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindingEntry {
    Simple(String),
    Joined {
        param: String,
        #[serde(default, deserialize_with = "one_or_many")]
        join: Vec<String>,
    },
}

impl BindingEntry {
    pub fn simple(column: &str) -> Self {
        BindingEntry::Simple(column.to_string())
    }

    pub fn joined<I, S>(param: &str, join: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BindingEntry::Joined {
            param: param.to_string(),
            join: join.into_iter().map(Into::into).collect(),
        }
    }

    pub fn param(&self) -> &str {
        match self {
            BindingEntry::Simple(column) => column,
            BindingEntry::Joined { param, .. } => param,
        }
    }

    pub fn join_path(&self) -> &[String] {
        match self {
            BindingEntry::Simple(_) => &[],
            BindingEntry::Joined { join, .. } => join,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(segment)) => vec![segment],
        Some(OneOrMany::Many(segments)) => segments,
    })
}

/// Logical field name -> binding.
pub type Bindings = BTreeMap<String, BindingEntry>;

/// A join already emitted into the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedAlias {
    pub alias: String,
    pub entity: String,
}

/// Join-path prefix -> alias of the entity it reaches.
#[derive(Debug, Default)]
pub struct JoinCache {
    aliases: HashMap<Vec<String>, JoinedAlias>,
}

impl JoinCache {
    pub fn get(&self, path: &[String]) -> Option<&JoinedAlias> {
        self.aliases.get(path)
    }

    fn insert(&mut self, path: Vec<String>, alias: JoinedAlias) {
        self.aliases.insert(path, alias);
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// A join a resolution needs that the query does not have yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJoin {
    pub path: Vec<String>,
    pub base: String,
    pub local_column: String,
    pub target_entity: String,
    pub target_table: String,
    pub alias: String,
    pub remote_column: String,
}

/// Outcome of resolving a logical name without touching a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub field: FieldExpression,
    /// The declared relationship path, empty for root columns.
    pub join_path: Vec<String>,
    /// Joins from `join_path` not present in the cache yet, outermost first.
    pub pending: Vec<PendingJoin>,
}

/// Resolves names for one query. Owns its join cache, so a resolver must
/// not outlive the query it has joined into.
#[derive(Debug)]
pub struct ExpressionResolver<'a> {
    schema: &'a Schema,
    model: &'a Entity,
    bindings: &'a Bindings,
    join_cache: JoinCache,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(schema: &'a Schema, model: &'a Entity, bindings: &'a Bindings) -> Self {
        Self {
            schema,
            model,
            bindings,
            join_cache: JoinCache::default(),
        }
    }

    pub fn model(&self) -> &'a Entity {
        self.model
    }

    pub fn join_cache(&self) -> &JoinCache {
        &self.join_cache
    }

    fn entry(&self, name: &str) -> Result<&'a BindingEntry> {
        self.bindings
            .get(name)
            .ok_or_else(|| BindingError::UnknownField(name.to_string()).into())
    }

    pub fn path_to(&self, name: &str) -> Result<&'a [String]> {
        Ok(self.entry(name)?.join_path())
    }

    /// Validates the whole path and plans the joins it needs.
    pub fn resolve(&self, name: &str) -> Result<Resolution> {
        let entry = self.entry(name)?;
        let path = entry.join_path();

        let mut entity = self.model;
        let mut qualifier = self.model.table.clone();
        let mut pending: Vec<PendingJoin> = Vec::new();

        for (idx, segment) in path.iter().enumerate() {
            let prefix = &path[..=idx];
            if let Some(cached) = self.join_cache.get(prefix) {
                tracing::trace!(path = ?prefix, alias = %cached.alias, "join cache hit");
                entity = self
                    .schema
                    .get(&cached.entity)
                    .ok_or_else(|| BindingError::UnknownEntity(cached.entity.clone()))?;
                qualifier = cached.alias.clone();
                continue;
            }

            let not_a_relationship = || BindingError::NotARelationship {
                segment: segment.clone(),
                entity: entity.name.clone(),
            };
            let relationship = match entity.attribute(segment) {
                Some(Attribute::Relationship(relationship)) => relationship,
                _ => return Err(not_a_relationship().into()),
            };
            let target = self
                .schema
                .get(&relationship.target)
                .ok_or_else(not_a_relationship)?;

            let alias = format!(
                "{}_{}",
                target.table,
                self.join_cache.len() + pending.len() + 1
            );
            pending.push(PendingJoin {
                path: prefix.to_vec(),
                base: qualifier,
                local_column: relationship.local_column.clone(),
                target_entity: target.name.clone(),
                target_table: target.table.clone(),
                alias: alias.clone(),
                remote_column: relationship.remote_column.clone(),
            });
            entity = target;
            qualifier = alias;
        }

        let column = entity
            .get_column(entry.param())
            .ok_or_else(|| BindingError::UnknownAttribute {
                attribute: entry.param().to_string(),
                entity: entity.name.clone(),
            })?;

        Ok(Resolution {
            field: FieldExpression::new(&qualifier, &column.name, column.sql_type.clone()),
            join_path: path.to_vec(),
            pending,
        })
    }

    /// Resolves `name` and adds any joins it needs to `query`.
    ///
    /// The query is left untouched if resolution fails.
    pub fn apply(&mut self, query: &mut SelectStatement, name: &str) -> Result<FieldExpression> {
        let resolution = self.resolve(name)?;
        Ok(self.commit(query, resolution))
    }

    /// Emits the pending joins of `resolution` and records their aliases.
    ///
    /// `resolution` must come from [`resolve`](Self::resolve) on this
    /// resolver with no other commit in between.
    pub fn commit(&mut self, query: &mut SelectStatement, resolution: Resolution) -> FieldExpression {
        let Resolution { field, pending, .. } = resolution;

        for join in pending {
            tracing::debug!(
                path = ?join.path,
                table = %join.target_table,
                alias = %join.alias,
                "materializing join"
            );
            query.join_as(
                JoinType::InnerJoin,
                TableIden(join.target_table),
                TableIden(join.alias.clone()),
                Expr::col((TableIden(join.base), ColumnIden(join.local_column)))
                    .equals((TableIden(join.alias.clone()), ColumnIden(join.remote_column))),
            );
            self.join_cache.insert(
                join.path,
                JoinedAlias {
                    alias: join.alias,
                    entity: join.target_entity,
                },
            );
        }

        field
    }
}
