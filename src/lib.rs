//! # liquid-flickr
//!
//! Two small plugins for static site generators:
//!
//! - a `{% gallery "photoset" %}` tag that turns a Flickr photoset into a
//!   justified-gallery HTML block, and
//! - an author hook that supplements author objects with extra attributes
//!   (bio, avatar, links) from the `AUTHORS` setting.
//!
//! # Architecture
//!
//! Both plugins are pure functions behind a narrow host interface:
//!
//! ```text
//! host preprocessor ── {% gallery … %} ──▶ TagRegistry ──▶ GalleryTag ──▶ PhotoService (Flickr)
//!                                                              │
//!                                                              ▼
//!                                                  <div class="justified-gallery">…</div>
//!
//! host author init ── GeneratorContext ──▶ AuthorPatcher ──▶ authors::patch (supplement, never override)
//! ```
//!
//! Neither keeps state between calls. Every failure propagates to the host,
//! which is expected to fail the build: a gallery is either rendered whole or
//! not at all.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`invocation`] | Gallery markup grammar and the string-list reader |
//! | [`gallery`] | Photoset resolution, photo filtering, HTML rendering, [`gallery::GalleryTag`] |
//! | [`flickr`] | [`flickr::PhotoService`] seam and the blocking REST client |
//! | [`cache`] | Content-addressed on-disk cache of API responses |
//! | [`authors`] | Author attributes and the supplement-only merge |
//! | [`hooks`] | Host interfaces: tag handlers, author hooks, document expansion |
//! | [`expand`] | Tag expansion over markdown files on disk (used by the CLI) |
//! | [`config`] | `settings.toml` loading, defaults, env overrides, key lookup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Maud for the gallery block
//!
//! The gallery HTML is produced with [Maud](https://maud.lambda.xyz/).
//! Photo titles come from a third-party service and end up in attributes;
//! maud escapes every interpolation, so a title containing quotes or markup
//! cannot break out of the `alt`/`title` attributes.
//!
//! ## No evaluation of tag markup
//!
//! The optional photo list in a gallery tag looks like a list literal. It is
//! read by a dedicated string-list parser that accepts quoted strings, commas
//! and whitespace, and nothing else.
//!
//! ## Shortest photoset title wins
//!
//! The tag's title is a case-insensitive regex searched in every photoset
//! title. When several match, the shortest title is chosen, so
//! `"winter"` picks "Winter" over "Winter 2020". This is a heuristic kept for
//! compatibility with existing content; see [`gallery::find_photoset`].

pub mod authors;
pub mod cache;
pub mod config;
pub mod expand;
pub mod flickr;
pub mod gallery;
pub mod hooks;
pub mod invocation;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
