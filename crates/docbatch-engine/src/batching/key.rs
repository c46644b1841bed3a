//! Grouping and matching keys.
//!
//! The textual form of a group key is the field list joined with no separator
//! followed by the index name, and a document key is index followed by id.
//! Both are kept structurally so that distinct inputs whose concatenations
//! happen to coincide (`["ab"] + "c"` vs `["a"] + "bc"`) never share a key.

use std::fmt;

use super::types::GetRequest;

/// Identifies the requests that can share one multi-get body: same index and
/// same field filter, order included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    fields: Vec<String>,
    index: String,
}

impl GroupKey {
    pub fn of(request: &GetRequest) -> Self {
        Self {
            fields: request.fields.clone(),
            index: request.index.clone(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            f.write_str(field)?;
        }
        f.write_str(&self.index)
    }
}

/// Matches a reply document back to its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocKey {
    index: String,
    document_id: String,
}

impl DocKey {
    pub fn new(index: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            document_id: document_id.into(),
        }
    }

    pub fn of(request: &GetRequest) -> Self {
        Self::new(request.index.clone(), request.document_id.clone())
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.index, self.document_id)
    }
}
