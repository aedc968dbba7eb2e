use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// A compiled `*` glob over URLs.
///
/// `*` matches any run of characters (including none). Everything else is
/// literal. The match is anchored at both ends and case-insensitive.
#[derive(Debug, Clone)]
pub struct UrlPattern {
  pattern: String,
  regex: Regex,
}

impl UrlPattern {
  pub fn new(pattern: &str) -> Result<Self, regex::Error> {
    let body = pattern
      .split('*')
      .map(regex::escape)
      .collect::<Vec<_>>()
      .join(".*");

    let regex = RegexBuilder::new(&format!("^{}$", body))
      .case_insensitive(true)
      .build()?;

    Ok(Self {
      pattern: pattern.to_string(),
      regex,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.pattern
  }

  pub fn matches(&self, url: &str) -> bool {
    self.regex.is_match(url)
  }
}

impl PartialEq for UrlPattern {
  fn eq(&self, other: &Self) -> bool {
    self.pattern == other.pattern
  }
}

impl fmt::Display for UrlPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.pattern)
  }
}

impl FromStr for UrlPattern {
  type Err = regex::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

impl<'de> Deserialize<'de> for UrlPattern {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let pattern = String::deserialize(deserializer)?;
    Self::new(&pattern).map_err(serde::de::Error::custom)
  }
}

/// One-off match of `url` against a `*` glob. An invalid pattern matches nothing.
pub fn matches_url_pattern(url: &str, pattern: &str) -> bool {
  match UrlPattern::new(pattern) {
    Ok(compiled) => compiled.matches(url),
    Err(e) => {
      warn!(pattern = %pattern, error = %e, "invalid_url_pattern");
      false
    }
  }
}
