use mvu_path::{get, parse_path, PathError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{infer_schema_with, strip_meta, SchemaNode};

/// Stat data of one scope together with its schema and revision.
///
/// Bundles bound to a node are shared as `Arc<Bundle>` and never mutated;
/// every executed batch produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub stat_data: Value,
    pub schema: SchemaNode,
    /// Number of batches applied since the scope was initialized.
    pub revision: u64,
}

impl Default for Bundle {
    fn default() -> Self {
        Self {
            stat_data: Value::Object(Map::new()),
            schema: SchemaNode::default(),
            revision: 0,
        }
    }
}

impl Bundle {
    /// Build a bundle from initial stat data, reading and stripping `$meta`
    /// annotations.
    pub fn from_stat_data(mut stat_data: Value, default_extensible: bool) -> Self {
        let schema = infer_schema_with(&stat_data, None, default_extensible);
        strip_meta(&mut stat_data);
        Self {
            stat_data,
            schema,
            revision: 0,
        }
    }

    /// Look up a variable by raw path.
    pub fn get(&self, path: &str) -> Result<Option<&Value>, PathError> {
        let steps = parse_path(path)?;
        Ok(get(&self.stat_data, &steps))
    }
}
