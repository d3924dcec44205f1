use serde::Serialize;

use crate::backend::Value;

/// Collects bound values and hands out their `$n` placeholders, numbered
/// from 1 in the order values are pushed.
#[derive(Debug, Default)]
pub(crate) struct ParamBuilder {
    values: Vec<Value>,
}

impl ParamBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    pub(crate) fn push_all(&mut self, values: impl IntoIterator<Item = Value>) -> Vec<String> {
        values.into_iter().map(|v| self.push(v)).collect()
    }

    pub(crate) fn finish(self) -> Vec<Value> {
        self.values
    }
}

/// A compiled statement: SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}
