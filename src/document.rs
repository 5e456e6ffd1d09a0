use serde_json::{Map, Value};

/// A read-only document as handed over by the storage layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    data: Value,
}

impl Document {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data: Value::Object(data),
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn get(
        &self,
        path: &str,
    ) -> Option<&Value> {
        crate::path::resolve(&self.data, path)
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    /// Only mappings are documents; anything else is handed back unchanged.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(data) => Ok(Self::new(data)),
            other => Err(other),
        }
    }
}
