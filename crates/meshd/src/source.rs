//! JSON-file backed loader standing in for the slow source of truth

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use meshcache::{BoxError, Loader};
use serde_json::Value;
use tracing::info;

/// Loader serving values from a JSON object of `key -> value`
///
/// String values are served as their raw bytes; any other JSON value is
/// served as its compact JSON encoding.
#[derive(Debug, Default)]
pub struct JsonSource {
    entries: HashMap<String, Vec<u8>>,
}

impl JsonSource {
    /// Read a source file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let object: HashMap<String, Value> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("{} is not a JSON object", path.display()))?;

        let entries = object
            .into_iter()
            .map(|(key, value)| {
                let bytes = match value {
                    Value::String(s) => s.into_bytes(),
                    other => other.to_string().into_bytes(),
                };
                (key, bytes)
            })
            .collect();

        Ok(Self { entries })
    }

    /// Build a source from in-memory pairs
    #[cfg(test)]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Number of keys in the source
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Loader for JsonSource {
    fn load(&self, key: &str) -> std::result::Result<Vec<u8>, BoxError> {
        info!(key, "searching source");
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| format!("{} not exist", key).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"Tom": "630", "Jack": 589, "tags": ["a", "b"]}}"#).unwrap();

        let source = JsonSource::open(file.path()).unwrap();

        assert_eq!(source.len(), 3);
        assert_eq!(source.load("Tom").unwrap(), b"630");
        assert_eq!(source.load("Jack").unwrap(), b"589");
        assert_eq!(source.load("tags").unwrap(), br#"["a","b"]"#);
    }

    #[test]
    fn test_missing_key() {
        let source = JsonSource::from_pairs([("Tom", "630")]);

        let err = source.load("Sam").unwrap_err();
        assert_eq!(err.to_string(), "Sam not exist");
    }

    #[test]
    fn test_rejects_non_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        assert!(JsonSource::open(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(JsonSource::open(dir.path().join("nope.json")).is_err());
    }
}
