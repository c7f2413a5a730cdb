//! Document-change events emitted by the host application.

use serde::{Deserialize, Serialize};

/// A create or modify notification for a document.
///
/// The engine treats both variants as an upsert of the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentEvent {
    Created { path: String, content: String },
    Modified { path: String, content: String },
}

impl DocumentEvent {
    /// Path of the document the event refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::Created { path, .. } | Self::Modified { path, .. } => path,
        }
    }

    /// Full text content carried by the event.
    pub fn content(&self) -> &str {
        match self {
            Self::Created { content, .. } | Self::Modified { content, .. } => content,
        }
    }
}
