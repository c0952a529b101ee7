use serde::{Deserialize, Serialize};
use std::path::Path;

use super::field::Field;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub fields: Vec<Field>,
}

impl ColumnSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

impl FromIterator<Field> for ColumnSchema {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BqLiteError;
    use crate::schema::{FieldMode, LogicalType};
    use std::io::Write;

    const SCHEMA_YAML: &str = r#"
fields:
  - name: user_id
    type: INTEGER
  - name: email
    type: string
  - name: tags
    type: STRING
    mode: REPEATED
"#;

    #[test]
    fn test_from_yaml() {
        let schema = ColumnSchema::from_yaml(SCHEMA_YAML).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.fields[0].logical_type, LogicalType::Integer);
        assert_eq!(schema.fields[1].logical_type, LogicalType::String);
        assert_eq!(schema.fields[1].mode, FieldMode::Nullable);
        assert_eq!(schema.get("tags").unwrap().mode, FieldMode::Repeated);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_type() {
        let yaml = "fields:\n  - name: area\n    type: GEOGRAPHY\n";
        let err = ColumnSchema::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, BqLiteError::Yaml(_)));
        assert!(err.to_string().contains("GEOGRAPHY"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCHEMA_YAML.as_bytes()).unwrap();

        let schema = ColumnSchema::load(file.path()).unwrap();
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ColumnSchema::load("/nonexistent/schema.yaml").unwrap_err();
        assert!(matches!(err, BqLiteError::Io(_)));
    }
}
