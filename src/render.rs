//! Render pipeline: evaluate → split into documents → convert each → join.
//!
//! ```text
//! app.jsonnet ──evaluator──▶ JSON ──split──▶ [doc, doc, ...]
//!                                               │
//!                              converter (stdin) per document
//!                                               ▼
//!                                   "a: 1\n---\na: 2"
//! ```
//!
//! # Document splitting
//!
//! | Evaluator output             | Documents        |
//! |------------------------------|------------------|
//! | `[x, y]`                     | `x`, `y`         |
//! | `{"items": [x, y], ...}`     | `x`, `y`         |
//! | anything else                | the value itself |

use crate::{
    config::RenderConfig,
    error::{RenderError, Result},
    exec,
};
use serde_json::Value;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Line placed between consecutive documents. Never trails the last one.
pub const SEPARATOR: &str = "\n---\n";

/// Split one evaluation result into its logical documents, order preserved.
pub fn split_documents(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) if map.get("items").is_some_and(Value::is_array) => {
            match map.get_mut("items").map(Value::take) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

/// Runs the evaluator and converter configured for a workspace.
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Evaluator program and its configured arguments.
    evaluator: Vec<String>,
    /// Library search directories, absolute.
    jpath: Vec<PathBuf>,
    converter: Vec<String>,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            evaluator: config.tools.evaluator_cmd(),
            jpath: config.render.jpath.clone(),
            converter: config.tools.converter_cmd(),
        }
    }

    /// Same tools, with every library directory under `from` moved to the
    /// same place under `to`. Directories outside `from` are kept.
    ///
    /// Used to render a checkout of the workspace against the checkout's
    /// own libraries.
    pub fn rebased(&self, from: &Path, to: &Path) -> Self {
        let jpath = self
            .jpath
            .iter()
            .map(|dir| dir.strip_prefix(from).map_or_else(|_| dir.clone(), |rel| to.join(rel)))
            .collect();
        Self {
            jpath,
            ..self.clone()
        }
    }

    /// `<evaluator> <args...> [-J dir]...`; the source file goes last.
    pub fn evaluator_cmd(&self) -> Vec<OsString> {
        let mut cmd: Vec<OsString> = self.evaluator.iter().map(OsString::from).collect();
        for dir in &self.jpath {
            cmd.push("-J".into());
            cmd.push(dir.as_os_str().to_owned());
        }
        cmd
    }

    /// Evaluate `file` and parse the output as JSON.
    pub async fn evaluate(&self, file: &Path) -> Result<Value> {
        let json = exec!(&self.evaluator_cmd(); file).await?;
        serde_json::from_str(&json).map_err(RenderError::Parse)
    }

    /// Serialize one document through the converter.
    pub async fn convert(&self, document: &Value) -> Result<String> {
        let json = document.to_string();
        exec!(input = json.as_bytes(); &self.converter;).await
    }

    /// Render `file` into its converted documents, one entry per document.
    pub async fn render_documents(&self, file: &Path) -> Result<Vec<String>> {
        let documents = split_documents(self.evaluate(file).await?);

        let mut rendered = Vec::with_capacity(documents.len());
        for document in &documents {
            rendered.push(self.convert(document).await?);
        }
        Ok(rendered)
    }

    /// Render `file` into one text, documents joined by [`SEPARATOR`].
    pub async fn render(&self, file: &Path) -> Result<String> {
        Ok(self.render_documents(file).await?.join(SEPARATOR))
    }
}
