//! Repository identifier grammar.
//!
//! Identifiers are accepted on the command line and from directory
//! enumeration in four forms: `name`, `name:tag`, `user/name` and
//! `user/name:tag`.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Matches `[user/]name[:tag]`.
static REPO_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<user>[a-z0-9][a-z0-9._-]*)/)?(?P<name>[a-z0-9][a-z0-9._-]*)(?::(?P<tag>[A-Za-z0-9_][A-Za-z0-9._-]{0,127}))?$",
    )
    .expect("REPO_NAME_REGEX must compile")
});

/// A parsed repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoName {
    pub user: Option<String>,
    pub name: String,
    pub tag: Option<String>,
}

impl RepoName {
    /// Parse an identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRepoName` if the identifier does not match the grammar.
    pub fn parse(input: &str) -> Result<Self> {
        let caps = REPO_NAME_REGEX
            .captures(input.trim())
            .ok_or_else(|| Error::InvalidRepoName {
                name: input.to_string(),
            })?;

        Ok(Self {
            user: caps.name("user").map(|m| m.as_str().to_string()),
            name: caps["name"].to_string(),
            tag: caps.name("tag").map(|m| m.as_str().to_string()),
        })
    }

    /// Check whether a single name segment is valid.
    pub fn is_valid_segment(segment: &str) -> bool {
        !segment.contains('/')
            && !segment.contains(':')
            && REPO_NAME_REGEX.is_match(segment)
    }

    /// Check whether a tag is valid.
    pub fn is_valid_tag(tag: &str) -> bool {
        REPO_NAME_REGEX.is_match(&format!("x:{}", tag))
    }
}

impl FromStr for RepoName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}/", user)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        Ok(())
    }
}
