//! Fixture sources.
//!
//! Resolves named fixture files into payload bytes when the stub registry
//! is built. Fixtures are either compiled into the binary or read from a
//! directory on disk.

use crate::error::FixtureError;
use bytes::Bytes;
use regex::Regex;
use std::path::PathBuf;

/// Something that can resolve a fixture name into payload bytes.
pub trait FixtureSource: Send + Sync {
    /// Load the fixture with the given name.
    fn load(&self, name: &str) -> Result<Bytes, FixtureError>;

    /// Human readable description, used in logs.
    fn describe(&self) -> String;
}

/// Fixtures compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledFixtures;

const BUNDLED: &[(&str, &[u8])] = &[
    ("itunes-kr.json", include_bytes!("../fixtures/itunes-kr.json")),
    ("itunes-uk.json", include_bytes!("../fixtures/itunes-uk.json")),
];

impl BundledFixtures {
    /// Names of every bundled fixture.
    pub fn names() -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(name, _)| *name)
    }
}

impl FixtureSource for BundledFixtures {
    fn load(&self, name: &str) -> Result<Bytes, FixtureError> {
        BUNDLED
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .map(|(_, data)| Bytes::from_static(data))
            .ok_or_else(|| FixtureError::NotFound(name.to_string()))
    }

    fn describe(&self) -> String {
        "bundled".to_string()
    }
}

/// Fixtures read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryFixtures {
    root: PathBuf,
    valid_name: Regex,
}

impl DirectoryFixtures {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            // Plain file names only, nothing that walks out of `root`.
            valid_name: Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$")
                .expect("fixture name pattern is valid"),
        }
    }
}

impl FixtureSource for DirectoryFixtures {
    fn load(&self, name: &str) -> Result<Bytes, FixtureError> {
        if !self.valid_name.is_match(name) || name.contains("..") {
            return Err(FixtureError::InvalidName(name.to_string()));
        }

        let path = self.root.join(name);
        match std::fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FixtureError::NotFound(name.to_string()))
            }
            Err(source) => Err(FixtureError::Read {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}
