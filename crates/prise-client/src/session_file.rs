use std::path::Path;

use prise_protocol::wire_types::PtyId;
use serde_json::Value;

use crate::errors::ClientError;

/// Persisted session document (§4.8): an opaque JSON tree produced by the
/// external UI, read-only to the core beyond extracting `pty_id`s. The core
/// only requires each pane-typed object to carry an integer `pty_id`; it
/// never inspects or reshapes the rest of the tree.
#[derive(Debug, Clone)]
pub struct SessionDocument {
    name: String,
    tree: Value,
}

impl SessionDocument {
    pub fn new(name: impl Into<String>, tree: Value) -> Self {
        Self { name: name.into(), tree }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Saves the document to `<state_dir>/prise/sessions/<name>.json`
    /// (§4.8 "On `detach`... the client serializes its widget tree").
    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.tree).map_err(|e| ClientError::RenderFailed { message: e.to_string() })?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Loads and parses a session file, failing with `no_session` if absent
    /// and `corrupt_session` if the contents aren't valid JSON (§7 "Client
    /// local errors").
    pub fn load(name: &str, path: &Path) -> Result<Self, ClientError> {
        let bytes = std::fs::read(path).map_err(|_| ClientError::NoSession { name: name.to_string() })?;
        let tree: Value = serde_json::from_slice(&bytes).map_err(|e| ClientError::CorruptSession { name: name.to_string(), message: e.to_string() })?;
        Ok(Self { name: name.to_string(), tree })
    }

    /// Walks the tree collecting every `"type": "pane"` object's `pty_id`,
    /// in document order (§4.8 "extracts PTY IDs by walking the JSON for
    /// objects with `"type": "pane"`").
    pub fn pane_pty_ids(&self) -> Vec<PtyId> {
        let mut out = Vec::new();
        collect_pane_ids(&self.tree, &mut out);
        out
    }
}

fn collect_pane_ids(value: &Value, out: &mut Vec<PtyId>) {
    if let Value::Object(map) = value {
        if map.get("type").and_then(Value::as_str) == Some("pane") {
            if let Some(id) = map.get("pty_id").and_then(Value::as_u64) {
                out.push(PtyId(id));
            }
        }
        for v in map.values() {
            collect_pane_ids(v, out);
        }
    } else if let Value::Array(items) = value {
        for v in items {
            collect_pane_ids(v, out);
        }
    }
}
