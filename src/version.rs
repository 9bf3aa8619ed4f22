//! Module version parsing and the Bazel version ordering algebra.
//!
//! The grammar and comparison rules below are Bazel's own (see the module
//! doc of the resolution engine): deliberately not SemVer. Parsing follows
//! the same shape as `pep440`-style version parsers — a single anchored
//! regex pulling out release/prerelease/build groups, then per-segment
//! identifier comparison — adapted to Bazel's "empty is the highest
//! version" and "extra release segments are additional identifiers" rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ResolveError, Result};

/// `RELEASE[-PRERELEASE][+BUILD]`, with an optional leading `v` and a
/// 40-hex commit SHA accepted as an opaque release.
static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?x)^v?(?P<release>[0-9A-Za-z]+(?:\.[0-9A-Za-z]+)*)(?:-(?P<pre>[0-9A-Za-z.]+))?(?:\+(?P<build>[0-9A-Za-z.-]+))?$").unwrap()
});

static RELEASE_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+){0,3}(\.[0-9A-Za-z]+)*$").unwrap());

static COMMIT_SHA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{40}$").unwrap());

/// A single dot-separated identifier within a release or prerelease
/// segment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Identifier {
    fn parse(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = segment.parse::<u64>() {
                return Self::Numeric(n);
            }
        }
        Self::Alpha(segment.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Alpha(s) => write!(f, "{s}"),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            // exactly one all-digits: the all-digits one is less.
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.as_bytes().cmp(b.as_bytes()),
        }
    }
}

/// A parsed module version, ordered per the resolution engine's MVS
/// comparison algebra rather than SemVer.
///
/// The empty string is a distinguished value that compares greater than
/// every other version; it is used to represent the effective version of
/// non-registry overrides (`git_override`, `local_path_override`,
/// `archive_override`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    raw: String,
    release: Vec<Identifier>,
    prerelease: Option<Vec<Identifier>>,
    // build metadata is retained only for Display; it never participates
    // in comparison.
    build: Option<String>,
}

impl Version {
    /// Parse a version string. The empty string is valid and represents
    /// the distinguished "highest" value.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self {
                raw: String::new(),
                release: Vec::new(),
                prerelease: None,
                build: None,
            });
        }

        if COMMIT_SHA_RE.is_match(input) {
            return Ok(Self {
                raw: input.to_string(),
                release: vec![Identifier::Alpha(input.to_lowercase())],
                prerelease: None,
                build: None,
            });
        }

        let caps = VERSION_RE.captures(input).ok_or_else(|| ResolveError::InvalidVersion {
            version: input.to_string(),
            message: "does not match RELEASE[-PRERELEASE][+BUILD]".to_string(),
        })?;

        let release_str = &caps["release"];
        if !RELEASE_SHAPE_RE.is_match(release_str) {
            return Err(ResolveError::InvalidVersion {
                version: input.to_string(),
                message: "release must be 1-4 numeric segments followed by zero or more identifier segments".to_string(),
            });
        }

        let release = release_str.split('.').map(Identifier::parse).collect();
        let prerelease = caps
            .name("pre")
            .map(|m| m.as_str().split('.').map(Identifier::parse).collect());
        let build = caps.name("build").map(|m| m.as_str().to_string());

        Ok(Self {
            raw: input.to_string(),
            release,
            prerelease,
            build,
        })
    }

    /// The distinguished empty/highest version.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            raw: String::new(),
            release: Vec::new(),
            prerelease: None,
            build: None,
        }
    }

    /// Whether this is the distinguished empty/highest version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The original string this version was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        match self.release.cmp(&other.release) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Comparison ignores build metadata, so the hash must too.
        self.is_empty().hash(state);
        self.release.hash(state);
        self.prerelease.hash(state);
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Numeric(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Self::Alpha(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}
