use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Document, Editor};
use crate::html::{CodecError, from_html, to_html};

/// The canonical markup a host stores for a document.
///
/// An empty document is `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlledValue(String);

impl ControlledValue {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn from_document(doc: &Document) -> Result<Self, CodecError> {
        to_html(doc).map(Self)
    }

    pub fn to_document(&self) -> Result<Document, CodecError> {
        from_html(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ControlledValue {
    fn from(markup: String) -> Self {
        Self(markup)
    }
}

impl From<&str> for ControlledValue {
    fn from(markup: &str) -> Self {
        Self(markup.to_string())
    }
}

impl AsRef<str> for ControlledValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Editor {
    /// Serializes the live document.
    pub fn value(&self) -> Result<ControlledValue, CodecError> {
        ControlledValue::from_document(self.doc())
    }
}
