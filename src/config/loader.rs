//! Input document loading.
//!
//! Documents are JSON or YAML; YAML supports an `!include <path>` tag for
//! composing fragments, resolved relative to the including file. Multiple
//! `-f` documents overlay each other in order, later files winning.

use crate::{Error, Result};
use serde_json::{Map, Value};
use serde_yaml::value::Value as YamlValue;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load and overlay all input documents, in order.
pub async fn load_documents(paths: &[PathBuf]) -> Result<Value> {
    if paths.is_empty() {
        return Err(Error::Config("no input documents given".to_string()));
    }
    let mut merged = Value::Object(Map::new());
    for path in paths {
        let document = load_document(path).await?;
        overlay(&mut merged, document);
    }
    Ok(merged)
}

/// Load one document, resolving YAML `!include` directives.
pub async fn load_document(path: &Path) -> Result<Value> {
    debug!(path = %path.display(), "loading document");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{} is not valid JSON: {e}", path.display()))),
        _ => {
            let parsed: YamlValue = serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{} is not valid YAML: {e}", path.display())))?;
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let resolved = resolve_includes(parsed, base)?;
            serde_json::to_value(resolved).map_err(Error::from)
        }
    }
}

fn resolve_includes(value: YamlValue, base: &Path) -> Result<YamlValue> {
    match value {
        YamlValue::Tagged(tagged) if tagged.tag == "!include" => {
            let rel = tagged.value.as_str().ok_or_else(|| {
                Error::Config("!include expects a relative path string".to_string())
            })?;
            let target = base.join(rel);
            debug!(path = %target.display(), "resolving include");
            let content = std::fs::read_to_string(&target).map_err(|e| {
                Error::Config(format!("cannot read include {}: {e}", target.display()))
            })?;
            let nested: YamlValue = serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{} is not valid YAML: {e}", target.display())))?;
            let nested_base = target
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            resolve_includes(nested, &nested_base)
        }
        YamlValue::Sequence(items) => Ok(YamlValue::Sequence(
            items
                .into_iter()
                .map(|item| resolve_includes(item, base))
                .collect::<Result<Vec<_>>>()?,
        )),
        YamlValue::Mapping(mapping) => {
            let mut out = serde_yaml::Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                out.insert(key, resolve_includes(value, base)?);
            }
            Ok(YamlValue::Mapping(out))
        }
        other => Ok(other),
    }
}

/// Overlay `incoming` onto `base`: mappings merge key-by-key, everything
/// else (sequences included) is replaced wholesale.
pub fn overlay(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
