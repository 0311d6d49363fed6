//! The `gallery` tag: a Flickr photoset rendered as a justified gallery.
//!
//! ```text
//! {% gallery "christmas market" %}
//! {% gallery "christmas market" ["Mulled wine", "Carousel"] %}
//! ```
//!
//! ## Pipeline
//!
//! 1. Parse the markup ([`crate::invocation`]).
//! 2. Read `FLICKR_API_KEY`, `FLICKR_API_SECRET` and `FLICKR_USERNAME`.
//! 3. Resolve the username to an account id.
//! 4. Pick the photoset whose title matches ([`find_photoset`]).
//! 5. List its photos, optionally keeping only the named ones ([`filter_photos`]).
//! 6. Render the photos ([`render_gallery`]).
//!
//! Every failure aborts the tag. There is no partial output: a page with a
//! broken gallery fails the build rather than shipping half a gallery.
//!
//! ## Photoset matching
//!
//! The quoted title is a case-insensitive regular expression searched
//! anywhere in each photoset title, so `"winter"` matches both "Winter" and
//! "Winter 2020". When several photosets match, the one with the shortest
//! title wins; on equal length the first in service order wins. Titles with
//! regex metacharacters must be escaped in the tag to match literally.
//!
//! ## Output
//!
//! ```html
//! <div class="justified-gallery"><a href="…_b.jpg" title="Dusk" target="_blank"><img alt="Dusk" src="….jpg"></a>
//! <a …>…</a></div>
//! ```
//!
//! Anchors are separated by a newline and keep the photoset's order. All
//! attribute values are escaped by maud.

use crate::config::{self, ConfigError, ConfigLookup};
use crate::flickr::{Credentials, FlickrSession, Photo, PhotoService, Photoset, ServiceError};
use crate::invocation::{Grammar, Invocation, ParseError};
use maud::{Markup, html};
use regex::RegexBuilder;
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Thumbnail image, linked from the gallery grid.
pub const THUMBNAIL_URL: &str = "https://farm{farm}.staticflickr.com/{server}/{id}_{secret}.jpg";

/// Large image, opened when a thumbnail is clicked.
pub const LARGE_URL: &str = "https://farm{farm}.staticflickr.com/{server}/{id}_{secret}_b.jpg";

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Can not find photoset with title {0:?}")]
    PhotosetNotFound(String),
    #[error("Can not find any photos with titles: {0:?}")]
    PhotosNotFound(Vec<String>),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GalleryError {
    /// True for both "no such photoset" and "no such photos".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GalleryError::PhotosetNotFound(_) | GalleryError::PhotosNotFound(_)
        )
    }
}

/// URL templates for the two image sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplates {
    pub thumbnail: String,
    pub large: String,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            thumbnail: THUMBNAIL_URL.to_string(),
            large: LARGE_URL.to_string(),
        }
    }
}

/// Pick the photoset whose title matches `pattern`, preferring the shortest.
pub fn find_photoset<'a>(
    photosets: &'a [Photoset],
    pattern: &str,
) -> Result<&'a Photoset, GalleryError> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ParseError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

    photosets
        .iter()
        .filter(|set| re.is_match(&set.title))
        .min_by_key(|set| set.title.chars().count())
        .ok_or_else(|| GalleryError::PhotosetNotFound(pattern.to_string()))
}

/// Keep only photos whose title is in `wanted`.
///
/// Both sides are trimmed and lower-cased before comparing. Order follows
/// `photos`, not `wanted`.
pub fn filter_photos(photos: Vec<Photo>, wanted: &[String]) -> Result<Vec<Photo>, GalleryError> {
    let names: HashSet<String> = wanted.iter().map(|w| normalize_title(w)).collect();
    let kept: Vec<Photo> = photos
        .into_iter()
        .filter(|p| names.contains(&normalize_title(&p.title)))
        .collect();
    if kept.is_empty() {
        return Err(GalleryError::PhotosNotFound(wanted.to_vec()));
    }
    Ok(kept)
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Render photos as linked thumbnails inside a `justified-gallery` container.
pub fn render_gallery(photos: &[Photo], urls: &UrlTemplates) -> Markup {
    html! {
        div class="justified-gallery" {
            @for (idx, photo) in photos.iter().enumerate() {
                @if idx > 0 {
                    "\n"
                }
                a href=(photo.url(&urls.large)) title=(photo.title) target="_blank" {
                    img alt=(photo.title) src=(photo.url(&urls.thumbnail));
                }
            }
        }
    }
}

/// Resolve, filter and render one parsed invocation against `service`.
pub fn render_with<S: PhotoService + ?Sized>(
    invocation: &Invocation,
    service: &S,
    username: &str,
    urls: &UrlTemplates,
) -> Result<String, GalleryError> {
    let user_id = service.find_user_id(username)?;
    let photosets = service.list_photosets(&user_id)?;
    let photoset = find_photoset(&photosets, &invocation.title)?;
    debug!(pattern = %invocation.title, id = %photoset.id, title = %photoset.title, "resolved photoset");

    let mut photos = service.list_photos(&user_id, &photoset.id)?;
    if let Some(wanted) = &invocation.photos {
        photos = filter_photos(photos, wanted)?;
    }
    debug!(count = photos.len(), "rendering gallery");
    Ok(render_gallery(&photos, urls).into_string())
}

/// Supplies a [`PhotoService`] for the credentials of one tag expansion.
pub type Connector = Box<dyn Fn(&Credentials) -> Result<Box<dyn PhotoService>, ServiceError>>;

/// The `gallery` tag handler.
///
/// Owns the compiled markup grammar and URL templates; credentials are read
/// from the host's configuration on every expansion.
pub struct GalleryTag {
    grammar: Grammar,
    urls: UrlTemplates,
    connect: Connector,
}

impl GalleryTag {
    pub fn new(
        connect: impl Fn(&Credentials) -> Result<Box<dyn PhotoService>, ServiceError> + 'static,
    ) -> Self {
        Self {
            grammar: Grammar::new(),
            urls: UrlTemplates::default(),
            connect: Box::new(connect),
        }
    }

    /// A tag backed by the Flickr REST API, sharing `session`'s client
    /// across expansions.
    pub fn flickr(session: Rc<FlickrSession>) -> Self {
        Self::new(move |credentials| {
            let client = session.connect(credentials)?;
            Ok(Box::new(client) as Box<dyn PhotoService>)
        })
    }

    /// Expand one tag occurrence into HTML.
    pub fn expand(&self, markup: &str, config: &dyn ConfigLookup) -> Result<String, GalleryError> {
        let invocation = self.grammar.parse(markup)?;
        debug!(title = %invocation.title, photos = ?invocation.photos, "gallery tag");

        let credentials = credentials(config)?;
        let service = (self.connect)(&credentials)?;
        render_with(&invocation, &service, &credentials.username, &self.urls)
    }
}

/// Read the Flickr credentials a gallery tag needs.
pub fn credentials(config: &dyn ConfigLookup) -> Result<Credentials, ConfigError> {
    Ok(Credentials {
        api_key: config::require(config, config::FLICKR_API_KEY)?,
        api_secret: config::require(config, config::FLICKR_API_SECRET)?,
        username: config::require(config, config::FLICKR_USERNAME)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ResponseCache, request_key};
    use crate::flickr::ClientOptions;
    use crate::test_helpers::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn titles(photos: &[Photo]) -> Vec<&str> {
        photos.iter().map(|p| p.title.as_str()).collect()
    }

    // =========================================================================
    // find_photoset
    // =========================================================================

    #[test]
    fn shortest_matching_title_wins() {
        let sets = vec![photoset("1", "Winter 2020"), photoset("2", "Winter")];
        assert_eq!(find_photoset(&sets, "Winter").unwrap().id, "2");
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let sets = vec![photoset("1", "Christmas Market Vienna")];
        assert_eq!(find_photoset(&sets, "christmas market").unwrap().id, "1");
    }

    #[test]
    fn pattern_is_a_regex() {
        let sets = vec![photoset("1", "Winter 2019"), photoset("2", "Winter 2020")];
        assert_eq!(find_photoset(&sets, r"20$").unwrap().id, "2");
    }

    #[test]
    fn equal_length_tie_keeps_service_order() {
        let sets = vec![photoset("1", "Paris A"), photoset("2", "Paris B")];
        assert_eq!(find_photoset(&sets, "paris").unwrap().id, "1");
    }

    #[test]
    fn resolution_is_repeatable() {
        let sets = vec![
            photoset("1", "Trip to Rome"),
            photoset("2", "Rome"),
            photoset("3", "Rome 2"),
        ];
        let first = find_photoset(&sets, "rome").unwrap().id.clone();
        for _ in 0..5 {
            assert_eq!(find_photoset(&sets, "rome").unwrap().id, first);
        }
    }

    #[test]
    fn no_match_is_not_found() {
        let sets = vec![photoset("1", "Summer")];
        let err = find_photoset(&sets, "Winter").unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, GalleryError::PhotosetNotFound(p) if p == "Winter"));
    }

    #[test]
    fn invalid_pattern_is_parse_error() {
        let sets = vec![photoset("1", "Summer")];
        let err = find_photoset(&sets, "(unclosed").unwrap_err();
        assert!(matches!(err, GalleryError::Parse(ParseError::Pattern { .. })));
    }

    // =========================================================================
    // filter_photos
    // =========================================================================

    #[test]
    fn filter_ignores_case_and_whitespace() {
        let photos = vec![photo("1", " sunset "), photo("2", "Dawn")];
        let kept = filter_photos(photos, &["Sunset".to_string()]).unwrap();
        assert_eq!(titles(&kept), vec![" sunset "]);
    }

    #[test]
    fn filter_keeps_listing_order() {
        let photos = vec![photo("1", "a"), photo("2", "b"), photo("3", "c")];
        let kept = filter_photos(photos, &["c".into(), "a".into()]).unwrap();
        assert_eq!(titles(&kept), vec!["a", "c"]);
    }

    #[test]
    fn filter_with_padded_wanted_names() {
        let photos = vec![photo("1", "Dawn")];
        let kept = filter_photos(photos, &["  DAWN ".into()]).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn filter_without_matches_is_not_found() {
        let photos = vec![photo("1", "Dawn")];
        let err = filter_photos(photos, &["Dusk".into()]).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Dusk"));
    }

    // =========================================================================
    // render_gallery
    // =========================================================================

    #[test]
    fn render_single_photo() {
        let p = Photo {
            id: "1".into(),
            title: "X".into(),
            farm: "2".into(),
            server: "3".into(),
            secret: "abc".into(),
        };
        let html = render_gallery(&[p], &UrlTemplates::default()).into_string();
        assert_eq!(
            html,
            concat!(
                r#"<div class="justified-gallery">"#,
                r#"<a href="https://farm2.staticflickr.com/3/1_abc_b.jpg" title="X" target="_blank">"#,
                r#"<img alt="X" src="https://farm2.staticflickr.com/3/1_abc.jpg">"#,
                r#"</a></div>"#
            )
        );
    }

    #[test]
    fn render_joins_anchors_with_newline() {
        let html = render_gallery(&[photo("1", "a"), photo("2", "b")], &UrlTemplates::default())
            .into_string();
        assert!(html.contains("</a>\n<a "));
        assert_eq!(html.matches("<a ").count(), 2);
        assert!(html.find("1_").unwrap() < html.find("2_").unwrap());
    }

    #[test]
    fn render_empty_is_empty_container() {
        let html = render_gallery(&[], &UrlTemplates::default()).into_string();
        assert_eq!(html, r#"<div class="justified-gallery"></div>"#);
    }

    #[test]
    fn render_escapes_titles() {
        let html = render_gallery(
            &[photo("1", r#"<script>"quoted"</script>"#)],
            &UrlTemplates::default(),
        )
        .into_string();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&quot;quoted&quot;"));
    }

    // =========================================================================
    // render_with / GalleryTag
    // =========================================================================

    #[test]
    fn render_with_uses_service_in_order() {
        let service = FakeService::new("someone", "u1")
            .with_set(photoset("s1", "Winter"), vec![photo("1", "a"), photo("2", "b")])
            .with_set(photoset("s2", "Winter 2020"), vec![photo("9", "z")]);
        let inv = Invocation {
            title: "winter".into(),
            photos: None,
        };
        let html = render_with(&inv, &service, "someone", &UrlTemplates::default()).unwrap();
        assert!(html.contains("/1_"));
        assert!(html.contains("/2_"));
        assert!(!html.contains("/9_"));
    }

    #[test]
    fn render_with_empty_set_without_filter() {
        let service = FakeService::new("someone", "u1").with_set(photoset("s1", "Empty"), vec![]);
        let inv = Invocation {
            title: "Empty".into(),
            photos: None,
        };
        let html = render_with(&inv, &service, "someone", &UrlTemplates::default()).unwrap();
        assert_eq!(html, r#"<div class="justified-gallery"></div>"#);
    }

    #[test]
    fn render_with_empty_set_and_filter_is_not_found() {
        let service = FakeService::new("someone", "u1").with_set(photoset("s1", "Empty"), vec![]);
        let inv = Invocation {
            title: "Empty".into(),
            photos: Some(vec!["a".into()]),
        };
        let err = render_with(&inv, &service, "someone", &UrlTemplates::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn render_with_unknown_user_is_service_error() {
        let service = FakeService::new("someone", "u1");
        let inv = Invocation {
            title: "x".into(),
            photos: None,
        };
        let err = render_with(&inv, &service, "nobody", &UrlTemplates::default()).unwrap_err();
        assert!(matches!(err, GalleryError::Service(ServiceError::Api { code: 1, .. })));
    }

    #[test]
    fn tag_expands_with_credentials_from_config() {
        let tag = fake_gallery_tag(
            FakeService::new("someone", "u1")
                .with_set(photoset("s1", "Trip"), vec![photo("1", "Dawn"), photo("2", "Dusk")]),
        );
        let html = tag.expand(r#""trip" ["dusk"]"#, &flickr_config()).unwrap();
        assert!(html.contains(r#"title="Dusk""#));
        assert!(!html.contains(r#"title="Dawn""#));
    }

    #[test]
    fn tag_parse_error_precedes_config_check() {
        let tag = fake_gallery_tag(FakeService::new("someone", "u1"));
        let err = tag.expand("no quotes", &HashMap::<String, String>::new()).unwrap_err();
        assert!(matches!(err, GalleryError::Parse(ParseError::Syntax)));
    }

    #[test]
    fn tag_missing_credentials_is_config_error() {
        let tag = fake_gallery_tag(FakeService::new("someone", "u1"));
        let mut config = flickr_config();
        config.remove("FLICKR_API_SECRET");
        let err = tag.expand(r#""Trip""#, &config).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::Config(ConfigError::MissingKey(k)) if k == "FLICKR_API_SECRET"
        ));
    }

    #[test]
    fn tag_missing_photoset_emits_nothing() {
        let tag = fake_gallery_tag(
            FakeService::new("someone", "u1").with_set(photoset("s1", "Summer"), vec![]),
        );
        let result = tag.expand(r#""Winter""#, &flickr_config());
        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    // =========================================================================
    // GalleryTag::flickr (served from a preloaded response cache)
    // =========================================================================

    fn put(cache: &ResponseCache, args: &[(&str, &str)], body: &str) {
        let mut params = vec![("api_key", "key"), ("format", "json"), ("nojsoncallback", "1")];
        params.extend_from_slice(args);
        cache.put(&request_key(&params), body).unwrap();
    }

    #[test]
    fn flickr_tag_shares_one_client_across_expansions() {
        let tmp = TempDir::new().unwrap();
        let cache = ResponseCache::open(tmp.path()).unwrap();
        put(
            &cache,
            &[("method", "flickr.people.findByUsername"), ("username", "someone")],
            r#"{"user":{"id":"u1"},"stat":"ok"}"#,
        );
        put(
            &cache,
            &[
                ("method", "flickr.photosets.getList"),
                ("user_id", "u1"),
                ("per_page", "500"),
                ("page", "1"),
            ],
            r#"{"photosets":{"pages":1,"photoset":[{"id":"s1","title":{"_content":"Trip"}}]},"stat":"ok"}"#,
        );
        put(
            &cache,
            &[
                ("method", "flickr.photosets.getPhotos"),
                ("user_id", "u1"),
                ("photoset_id", "s1"),
                ("per_page", "500"),
                ("page", "1"),
            ],
            r#"{"photoset":{"pages":1,"photo":[{"id":"1","secret":"a","server":"1","farm":1,"title":"Dawn"}]},"stat":"ok"}"#,
        );

        let session = Rc::new(FlickrSession::new(ClientOptions {
            endpoint: "http://127.0.0.1:9/services/rest/".into(),
            timeout: Duration::from_secs(2),
            per_page: 500,
            cache_dir: Some(tmp.path().to_path_buf()),
        }));
        let tag = GalleryTag::flickr(Rc::clone(&session));
        let first = tag.expand(r#""trip""#, &flickr_config()).unwrap();
        let second = tag.expand(r#""trip" ["dawn"]"#, &flickr_config()).unwrap();

        assert_eq!(first, second);
        assert!(first.contains(r#"title="Dawn""#));
        assert_eq!(
            session.cache_summary().as_deref(),
            Some("6 cached, 0 fetched (6 total)")
        );
    }
}
