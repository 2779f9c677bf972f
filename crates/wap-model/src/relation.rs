//! Named relations across the three WAP layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The schema a relation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Freshly ingested raw records, rewritten each run.
    Staging,
    /// Transformed, not yet validated rows for one destination table.
    Audit,
    /// The externally visible table.
    Production,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Staging, Layer::Audit, Layer::Production];

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Staging => "staging",
            Layer::Audit => "audit",
            Layer::Production => "prod",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation addressed as `<layer>.<table>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationRef {
    pub layer: Layer,
    pub table: String,
}

impl RelationRef {
    pub fn new(layer: Layer, table: impl Into<String>) -> Self {
        Self {
            layer,
            table: table.into(),
        }
    }

    pub fn staging(table: impl Into<String>) -> Self {
        Self::new(Layer::Staging, table)
    }

    pub fn audit(table: impl Into<String>) -> Self {
        Self::new(Layer::Audit, table)
    }

    pub fn production(table: impl Into<String>) -> Self {
        Self::new(Layer::Production, table)
    }
}

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.layer, self.table)
    }
}
