//! Host integration points.
//!
//! A static site generator drives both plugins through two hooks:
//!
//! - **Tag expansion**: while preprocessing a document, every
//!   `{% name markup %}` occurrence is handed to the [`TagHandler`]
//!   registered under `name`, and replaced by the returned HTML.
//! - **Author initialization**: each time the host constructs an author
//!   object it calls [`AuthorInitHook::on_author_init`] with a
//!   [`GeneratorContext`] holding the settings and the new author.
//!
//! The host owns discovery and ordering. This module only defines the
//! interfaces and a [`TagRegistry`] that dispatches by tag name, plus
//! [`TagRegistry::expand`] for hosts (and the CLI) that want tag
//! preprocessing over a whole document.

use crate::authors::{self, Author};
use crate::config::{ConfigError, ConfigLookup, Settings};
use crate::gallery::{GalleryError, GalleryTag};
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

/// `{% name markup %}`. The markup may span lines.
const TAG_PATTERN: &str =
    r"\{%\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?:\s+(?P<markup>(?s:.*?)))?\s*%\}";

#[derive(Error, Debug)]
pub enum HookError {
    #[error("no handler registered for tag {0:?}")]
    UnknownTag(String),
    #[error("{{% {tag} %}} failed: {source}")]
    Tag {
        tag: String,
        #[source]
        source: Box<HookError>,
    },
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A template tag plugin.
pub trait TagHandler {
    /// Tag name as written in documents (`gallery` for `{% gallery ... %}`).
    fn name(&self) -> &str;

    /// Render one occurrence. `markup` is the text after the tag name.
    fn render(&self, markup: &str, config: &dyn ConfigLookup) -> Result<String, HookError>;
}

impl TagHandler for GalleryTag {
    fn name(&self) -> &str {
        "gallery"
    }

    fn render(&self, markup: &str, config: &dyn ConfigLookup) -> Result<String, HookError> {
        Ok(self.expand(markup, config)?)
    }
}

/// What the host hands to author hooks.
pub struct GeneratorContext<'a> {
    pub settings: &'a Settings,
    pub author: &'a mut Author,
}

/// Called once per constructed author object.
pub trait AuthorInitHook {
    fn on_author_init(&self, context: &mut GeneratorContext<'_>) -> Result<(), HookError>;
}

/// Supplements authors from the `AUTHORS` setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorPatcher;

impl AuthorInitHook for AuthorPatcher {
    fn on_author_init(&self, context: &mut GeneratorContext<'_>) -> Result<(), HookError> {
        authors::patch(context.author, context.settings)?;
        Ok(())
    }
}

/// Result of expanding the tags in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    /// Number of tags replaced.
    pub expanded: usize,
}

/// Tag handlers by name.
pub struct TagRegistry {
    handlers: BTreeMap<String, Box<dyn TagHandler>>,
    tag: Regex,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            tag: Regex::new(TAG_PATTERN).expect("tag pattern must compile"),
        }
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Box<dyn TagHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Dispatch one tag occurrence.
    pub fn on_tag(
        &self,
        name: &str,
        markup: &str,
        config: &dyn ConfigLookup,
    ) -> Result<String, HookError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| HookError::UnknownTag(name.to_string()))?;
        handler.render(markup, config)
    }

    /// Replace every registered `{% name markup %}` in `text`.
    ///
    /// Tags with no registered handler are left as written. The first failing
    /// tag aborts the whole document.
    pub fn expand(&self, text: &str, config: &dyn ConfigLookup) -> Result<Expansion, HookError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut expanded = 0;

        for caps in self.tag.captures_iter(text) {
            let whole = caps.get_match();
            let name = &caps["name"];
            if !self.contains(name) {
                continue;
            }
            let markup = caps.name("markup").map_or("", |m| m.as_str());
            let html = self.on_tag(name, markup, config).map_err(|e| HookError::Tag {
                tag: format!("{name} {markup}").trim_end().to_string(),
                source: Box::new(e),
            })?;

            out.push_str(&text[last..whole.start()]);
            out.push_str(&html);
            last = whole.end();
            expanded += 1;
        }
        out.push_str(&text[last..]);

        Ok(Expansion {
            text: out,
            expanded,
        })
    }
}
