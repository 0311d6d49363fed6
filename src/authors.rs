//! Author metadata supplementation.
//!
//! Static site generators build one author object per author name found in
//! content front matter. Those objects only know the name. This module fills
//! in the rest (bio, avatar, social handles) from the `AUTHORS` table in the
//! settings, keyed by the lower-cased author name.
//!
//! ## Supplement, never override
//!
//! A configured value is only applied when the author does not already have
//! that attribute. Anything set by the content itself, or by an earlier
//! plugin, wins. [`merge`] is the whole rule: `base` wins on every key
//! collision, `overlay` only fills gaps.
//!
//! ## Fields
//!
//! The commonly used attributes are typed fields on [`AuthorMetadata`]. Any
//! other key lands in [`AuthorMetadata::extra`] with its TOML value as
//! written (numbers, lists and tables included), so themes can use arbitrary
//! attributes without a code change. Non-string values are shown in TOML
//! notation by [`AuthorMetadata::get`] and [`AuthorMetadata::iter`].

use crate::config::{ConfigError, Settings};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

/// Optional author attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Attributes without a typed field.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl AuthorMetadata {
    /// Look up an attribute by name, typed fields first.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        let typed = match key {
            "bio" => &self.bio,
            "avatar" => &self.avatar,
            "url" => &self.url,
            "email" => &self.email,
            "twitter" => &self.twitter,
            "github" => &self.github,
            "location" => &self.location,
            _ => return self.extra.get(key).map(display_value),
        };
        typed.as_deref().map(Cow::Borrowed)
    }

    /// All present attributes as `(name, value)` pairs, typed fields first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        let typed = [
            ("bio", &self.bio),
            ("avatar", &self.avatar),
            ("url", &self.url),
            ("email", &self.email),
            ("twitter", &self.twitter),
            ("github", &self.github),
            ("location", &self.location),
        ];
        typed
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, Cow::Borrowed(v))))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), display_value(v))))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Strings as written, anything else in TOML notation (`12`, `["a", "b"]`).
fn display_value(value: &toml::Value) -> Cow<'_, str> {
    match value {
        toml::Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Merge two attribute sets, preferring `base` on every collision.
pub fn merge(base: &AuthorMetadata, overlay: &AuthorMetadata) -> AuthorMetadata {
    fn pick(base: &Option<String>, overlay: &Option<String>) -> Option<String> {
        base.clone().or_else(|| overlay.clone())
    }

    let mut extra = base.extra.clone();
    for (key, value) in &overlay.extra {
        extra.entry(key.clone()).or_insert_with(|| value.clone());
    }

    AuthorMetadata {
        bio: pick(&base.bio, &overlay.bio),
        avatar: pick(&base.avatar, &overlay.avatar),
        url: pick(&base.url, &overlay.url),
        email: pick(&base.email, &overlay.email),
        twitter: pick(&base.twitter, &overlay.twitter),
        github: pick(&base.github, &overlay.github),
        location: pick(&base.location, &overlay.location),
        extra,
    }
}

/// An author as constructed by the host: a name plus whatever attributes the
/// content already supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(flatten)]
    pub metadata: AuthorMetadata,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: AuthorMetadata::default(),
        }
    }

    /// Look up an attribute by name, including `name` itself.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "name" => Some(Cow::Borrowed(self.name.as_str())),
            _ => self.metadata.get(key),
        }
    }

    /// Fill attributes the author does not have yet from `overlay`.
    ///
    /// `name` is always present, so an overlay `name` entry is ignored.
    pub fn supplement(&mut self, overlay: &AuthorMetadata) {
        let mut overlay = overlay.clone();
        overlay.extra.remove("name");
        self.metadata = merge(&self.metadata, &overlay);
    }
}

/// Supplement `author` with its `AUTHORS` entry from `settings`.
///
/// Fails with [`ConfigError::UnknownAuthor`] when the lower-cased name has no
/// entry; an author without configuration is treated as a settings mistake.
pub fn patch(author: &mut Author, settings: &Settings) -> Result<(), ConfigError> {
    let key = author.name.to_lowercase();
    let info = settings
        .authors
        .get(&key)
        .ok_or_else(|| ConfigError::UnknownAuthor(key.clone()))?;
    debug!(author = %author.name, key = %key, "supplementing author metadata");
    author.supplement(info);
    Ok(())
}
