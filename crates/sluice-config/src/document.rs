//! TOML configuration documents shared by the key-file and remote sources.

use std::fs;

use camino::Utf8Path;
use toml::{Table, Value};

use crate::error::KeyFileError;
use crate::options::{OptionKind, OptionRegistry, OptionSource, OptionValue, split_list};

/// Table holding the daemon's settings inside a document.
pub const SERVICE_TABLE: &str = "sluice";

/// A parsed configuration document.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    origin: String,
    values: Table,
}

impl ConfigDocument {
    /// Reads and parses a key-file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a valid document.
    pub fn load(path: &Utf8Path) -> Result<Self, KeyFileError> {
        let text = fs::read_to_string(path).map_err(|source| KeyFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path.as_str())
    }

    /// Parses document text. `origin` names the document in errors.
    ///
    /// # Errors
    ///
    /// Fails on TOML syntax errors and when the service table is missing.
    pub fn parse(text: &str, origin: &str) -> Result<Self, KeyFileError> {
        let mut root: Table = text.parse().map_err(|source| KeyFileError::Parse {
            origin: origin.to_owned(),
            source,
        })?;
        let Some(Value::Table(values)) = root.remove(SERVICE_TABLE) else {
            return Err(KeyFileError::MissingTable {
                origin: origin.to_owned(),
                table: SERVICE_TABLE,
            });
        };
        Ok(Self {
            origin: origin.to_owned(),
            values,
        })
    }

    /// Where the document came from.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Keys that match no option in `registry`.
    #[must_use]
    pub fn unknown_keys(&self, registry: &OptionRegistry) -> Vec<String> {
        self.values
            .keys()
            .filter(|key| !registry.contains(key))
            .cloned()
            .collect()
    }

    /// Writes every known key into `registry` at `source` priority.
    ///
    /// Unknown keys are skipped. Returns the number of slots written.
    ///
    /// # Errors
    ///
    /// Fails when a key holds a value of the wrong type.
    pub fn apply_to(
        &self,
        registry: &mut OptionRegistry,
        source: OptionSource,
    ) -> Result<usize, KeyFileError> {
        let mut written = 0;
        for (key, raw) in &self.values {
            let Some(kind) = registry.descriptor(key).map(|descriptor| descriptor.kind()) else {
                continue;
            };
            let value = self.convert(key, raw, kind)?;
            match registry.apply(key, value, source) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(_) => return Err(self.type_error(key, kind)),
            }
        }
        Ok(written)
    }

    fn convert(&self, key: &str, raw: &Value, kind: OptionKind) -> Result<OptionValue, KeyFileError> {
        let value = match (kind, raw) {
            (OptionKind::Flag, Value::Boolean(flag)) => OptionValue::Flag(*flag),
            (OptionKind::Int, Value::Integer(number)) => OptionValue::Int(*number),
            (OptionKind::Double, Value::Float(number)) => OptionValue::Double(*number),
            (OptionKind::Double, Value::Integer(number)) => OptionValue::Double(*number as f64),
            (OptionKind::String, Value::String(text)) => OptionValue::String(text.clone()),
            (OptionKind::StringList, Value::String(text)) => {
                OptionValue::StringList(split_list(text))
            }
            (OptionKind::StringList, Value::Array(items)) => OptionValue::StringList(
                items
                    .iter()
                    .map(|item| item.as_str().map(ToOwned::to_owned))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| self.type_error(key, kind))?,
            ),
            _ => return Err(self.type_error(key, kind)),
        };
        Ok(value)
    }

    fn type_error(&self, key: &str, expected: OptionKind) -> KeyFileError {
        KeyFileError::Type {
            origin: self.origin.clone(),
            key: key.to_owned(),
            expected,
        }
    }
}
