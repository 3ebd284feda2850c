//! The named transform pipeline.
//!
//! `TransformPipeline` implements the `Transformer` trait from
//! `veritas-core`. Transforms are plain functions looked up by name; the
//! built-ins are registered by `new()` and applications may register more
//! with `register`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use veritas_contracts::error::{VeritasError, VeritasResult};
use veritas_core::{planner::IPADDRESS_TO_DEVICE, traits::Transformer};

use crate::builtins;

/// A named transform: consumes the record collection and returns the next one.
pub type TransformFn = Box<dyn Fn(Vec<Value>) -> VeritasResult<Vec<Value>> + Send + Sync>;

pub struct TransformPipeline {
    transforms: HashMap<String, TransformFn>,
}

impl TransformPipeline {
    /// A pipeline with the built-in transforms: `remove_id`, `to_pandas`
    /// (also as `to_table`), `values_only`, `ipaddress_to_device`.
    pub fn new() -> Self {
        let mut pipeline = Self::empty();
        pipeline.register("remove_id", Box::new(builtins::remove_id));
        pipeline.register("to_pandas", Box::new(builtins::to_pandas));
        pipeline.register("to_table", Box::new(builtins::to_pandas));
        pipeline.register("values_only", Box::new(builtins::values_only));
        pipeline.register(IPADDRESS_TO_DEVICE, Box::new(builtins::ipaddress_to_device));
        pipeline
    }

    /// A pipeline with nothing registered.
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Register `f` under `name`. Registering the same name twice replaces
    /// the previous function.
    pub fn register(&mut self, name: impl Into<String>, f: TransformFn) {
        self.transforms.insert(name.into(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn get(&self, name: &str) -> VeritasResult<&TransformFn> {
        self.transforms
            .get(name)
            .ok_or_else(|| VeritasError::UnknownTransform {
                name: name.to_string(),
            })
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for TransformPipeline {
    fn validate(&self, names: &[String]) -> VeritasResult<()> {
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }

    fn apply(&self, names: &[String], mut records: Vec<Value>) -> VeritasResult<Vec<Value>> {
        for name in names {
            let f = self.get(name)?;
            let before = records.len();
            records = f(records)?;
            debug!(transform = %name, before, after = records.len(), "transform applied");
        }
        Ok(records)
    }
}
