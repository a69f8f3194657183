use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Classification of a stored package, and filter for which classifications
/// an operation accepts.
///
/// The `Stdlib*` and `User*` variants describe a concrete package. The
/// `Any*` variants only make sense as a filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemPackageType {
    StdlibAll,
    StdlibProd,
    StdlibTest,
    UserAll,
    UserProd,
    UserTest,
    AnyAll,
    AnyProd,
    AnyTest,
}

impl MemPackageType {
    pub fn is_stdlib(&self) -> bool {
        matches!(self, Self::StdlibAll | Self::StdlibProd | Self::StdlibTest)
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::UserAll | Self::UserProd | Self::UserTest)
    }

    /// `true` for the filter-only `Any*` variants.
    pub fn is_filter_only(&self) -> bool {
        matches!(self, Self::AnyAll | Self::AnyProd | Self::AnyTest)
    }

    /// Whether a package of type `other` passes this filter.
    pub fn accepts(&self, other: MemPackageType) -> bool {
        match self {
            Self::AnyAll => !other.is_filter_only(),
            Self::AnyProd => matches!(other, Self::StdlibProd | Self::UserProd),
            Self::AnyTest => matches!(other, Self::StdlibTest | Self::UserTest),
            Self::StdlibAll => other.is_stdlib(),
            Self::UserAll => other.is_user(),
            concrete => *concrete == other,
        }
    }
}

impl fmt::Display for MemPackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StdlibAll => "stdlib-all",
            Self::StdlibProd => "stdlib-prod",
            Self::StdlibTest => "stdlib-test",
            Self::UserAll => "user-all",
            Self::UserProd => "user-prod",
            Self::UserTest => "user-test",
            Self::AnyAll => "any-all",
            Self::AnyProd => "any-prod",
            Self::AnyTest => "any-test",
        };
        f.write_str(name)
    }
}

/// A single named source file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemFile {
    pub name: String,
    pub body: String,
}

impl MemFile {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// A path-identified bundle of source files: the unit of package storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemPackage {
    #[serde(rename = "type")]
    pub kind: MemPackageType,
    pub name: String,
    pub path: String,
    pub files: Vec<MemFile>,
}

impl MemPackage {
    pub fn new(
        kind: MemPackageType,
        name: impl Into<String>,
        path: impl Into<String>,
        files: Vec<MemFile>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
            files,
        }
    }

    pub fn is_stdlib(&self) -> bool {
        self.kind.is_stdlib()
    }

    pub fn file(&self, name: &str) -> Option<&MemFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Total source bytes across all files.
    pub fn source_len(&self) -> usize {
        self.files.iter().map(|f| f.name.len() + f.body.len()).sum()
    }

    /// Check structural well-formedness.
    ///
    /// Paths beginning with `_` are rejected: that prefix is reserved for
    /// the standard-library key namespace.
    pub fn validate(&self) -> Result<(), TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPackage {
            path: self.path.clone(),
            reason: reason.to_string(),
        };

        if self.kind.is_filter_only() {
            return Err(invalid("package type must be concrete"));
        }
        if !is_identifier(&self.name) {
            return Err(invalid("package name is not an identifier"));
        }
        if self.path.is_empty() {
            return Err(invalid("empty path"));
        }
        if self.path.starts_with('_') {
            return Err(invalid("path uses the reserved '_' prefix"));
        }
        if self.path.starts_with('/') || self.path.ends_with('/') || self.path.contains("//") {
            return Err(invalid("malformed path separators"));
        }
        if self.files.is_empty() {
            return Err(invalid("package has no files"));
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            if file.name.is_empty() || file.name.contains('/') {
                return Err(invalid(&format!("invalid file name {:?}", file.name)));
            }
            if !seen.insert(file.name.as_str()) {
                return Err(invalid(&format!("duplicate file {:?}", file.name)));
            }
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
