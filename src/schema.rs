//! Relational model the bindings resolve against.
//!
//! An [`Entity`] maps to one table and exposes two kinds of attributes:
//! plain columns and relationships to other entities. Column types form a
//! small hierarchy (see [`SqlType::parent`]) so converters and type guards
//! registered for a general type also cover its specialisations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Integer,
    SmallInteger,
    BigInteger,
    Numeric,
    Decimal,
    Float,
    Double,
    String,
    Text,
    Unicode,
    UnicodeText,
    Enum,
    Date,
    DateTime,
    Time,
    Boolean,
    Json,
    /// Host-defined type, only ever matches itself.
    Custom(String),
}

impl SqlType {
    /// The more general type this one specialises, if any.
    pub fn parent(&self) -> Option<SqlType> {
        match self {
            SqlType::SmallInteger | SqlType::BigInteger => Some(SqlType::Integer),
            SqlType::Decimal | SqlType::Float => Some(SqlType::Numeric),
            SqlType::Double => Some(SqlType::Float),
            SqlType::Text | SqlType::Unicode | SqlType::Enum => Some(SqlType::String),
            SqlType::UnicodeText => Some(SqlType::Text),
            _ => None,
        }
    }

    /// True if `self` is `other` or one of its specialisations.
    pub fn is_a(&self, other: &SqlType) -> bool {
        let mut current = Some(self.clone());
        while let Some(ty) = current {
            if &ty == other {
                return true;
            }
            current = ty.parent();
        }
        false
    }

    pub fn is_string_like(&self) -> bool {
        self.is_a(&SqlType::String)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Custom(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ManyToOne,
    OneToMany,
    OneToOne,
}

/// A navigable link from one entity to another.
///
/// Joining through it emits `<base>.<local_column> = <target>.<remote_column>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    pub kind: RelationshipKind,
    pub local_column: String,
    pub remote_column: String,
}

impl Relationship {
    /// Foreign key on the owning side, e.g. `users.email_id -> email.id`.
    pub fn many_to_one(name: &str, target: &str, foreign_key: &str, target_key: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationshipKind::ManyToOne,
            local_column: foreign_key.to_string(),
            remote_column: target_key.to_string(),
        }
    }

    /// Foreign key on the target side, e.g. `users.id <- posts.author_id`.
    pub fn one_to_many(name: &str, target: &str, local_key: &str, foreign_key: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationshipKind::OneToMany,
            local_column: local_key.to_string(),
            remote_column: foreign_key.to_string(),
        }
    }
}

/// Anything reachable by name on an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribute<'a> {
    Column(&'a Column),
    Relationship(&'a Relationship),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, sql_type: SqlType) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            sql_type,
        });
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Columns shadow relationships of the same name.
    pub fn attribute(&self, name: &str) -> Option<Attribute<'_>> {
        if let Some(column) = self.columns.iter().find(|c| c.name == name) {
            return Some(Attribute::Column(column));
        }
        self.relationships
            .iter()
            .find(|r| r.name == name)
            .map(Attribute::Relationship)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        match self.attribute(name) {
            Some(Attribute::Column(column)) => Some(column),
            _ => None,
        }
    }
}

/// All entities known to a binding, keyed by entity name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut schema = Self::new();
        for entity in entities {
            schema.add(entity);
        }
        schema
    }

    pub fn with(mut self, entity: Entity) -> Self {
        self.add(entity);
        self
    }

    pub fn add(&mut self, entity: Entity) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}
