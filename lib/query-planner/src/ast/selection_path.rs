use serde::{Serialize, Serializer};
use std::{
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    sync::Arc,
};

/// Address of a location in the response tree, made of response names (aliases win over
/// field names). Two paths are equal when their name sequences are equal, no matter which
/// selection tree they were built from. List levels are implicit: they are flattened when
/// the path is walked against response data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)] // Clone is cheap with Arc inside
pub struct SelectionPath {
    inner: Arc<[String]>,
}

impl SelectionPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(segments: Vec<String>) -> Self {
        Self {
            inner: segments.into(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(segments.into_iter().map(Into::into).collect())
    }

    /// Inserts a response name at the end of the path
    pub fn push(&self, response_name: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.inner.len() + 1);
        segments.extend_from_slice(&self.inner);
        segments.push(response_name.into());
        Self::new(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.inner.is_empty() {
            return None;
        }

        Some(Self {
            inner: Arc::from(&self.inner[..self.inner.len() - 1]),
        })
    }

    pub fn last(&self) -> Option<&str> {
        self.inner.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn starts_with(&self, other: &SelectionPath) -> bool {
        self.inner.starts_with(&other.inner)
    }
}

impl Display for SelectionPath {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if self.inner.is_empty() {
            return write!(f, "$");
        }

        write!(f, "{}", self.inner.join("."))
    }
}

impl Serialize for SelectionPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.inner.iter())
    }
}
