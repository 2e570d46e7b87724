use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HANDLE_KEY: &str = "operation.handle";
pub const REMOTE_STATUS_KEY: &str = "operation.status";
pub const CLOUD_PROVIDER_KEY: &str = "cloudProvider";

/// Reference to a remote operation created by an action task.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OperationHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutable record threaded through the tasks of one stage execution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationContext {
    values: Map<String, Value>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Later outputs overwrite earlier values under the same key.
    pub fn merge(&mut self, outputs: Map<String, Value>) {
        self.values.extend(outputs);
    }

    pub fn handle(&self) -> Option<OperationHandle> {
        self.get_str(HANDLE_KEY).map(OperationHandle::new)
    }

    pub fn set_handle(&mut self, handle: &OperationHandle) {
        self.insert(HANDLE_KEY, handle.as_str());
    }

    pub fn remote_status(&self) -> Option<&str> {
        self.get_str(REMOTE_STATUS_KEY)
    }

    pub fn cloud_provider(&self) -> Option<&str> {
        self.get_str(CLOUD_PROVIDER_KEY)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}
