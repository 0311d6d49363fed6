//! Flickr photo service client.
//!
//! The gallery tag needs exactly three things from Flickr: resolve a username
//! to an account id, list that account's photosets, and list the photos in one
//! photoset. [`PhotoService`] is that seam; the gallery core only ever talks
//! to the trait, and tests substitute an in-memory implementation.
//!
//! [`FlickrClient`] implements it against the public REST API
//! (`https://api.flickr.com/services/rest/`) with a blocking `reqwest` client.
//!
//! ## Response quirks
//!
//! - Every response is wrapped in an envelope with a `stat` field. Failures
//!   still come back as HTTP 200 with `{"stat": "fail", "code": N, "message": M}`.
//! - Titles of photosets are nested as `{"_content": "..."}`; photo titles are
//!   plain strings.
//! - Numeric fields (`farm`, `page`, `pages`) are sometimes numbers and
//!   sometimes strings, depending on the method. Both are accepted.
//! - List methods paginate (at most 500 items per page). The client follows
//!   `page`/`pages` until every page has been read.
//!
//! ## Authentication
//!
//! The three methods used here are public reads and only need the API key.
//! The secret is carried in [`Credentials`] so signed calls can be added
//! without changing how credentials flow in.

use crate::cache::{self, ResponseCache};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.flickr.com/services/rest/";

/// Flickr's hard upper bound for `per_page`.
pub const MAX_PER_PAGE: u32 = 500;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Flickr API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("unexpected Flickr response: {0}")]
    Decode(String),
    #[error("response cache error: {0}")]
    Cache(#[from] std::io::Error),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Decode(err.to_string())
    }
}

/// A named group of photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Photoset {
    pub id: String,
    pub title: String,
}

/// Photo metadata: identity plus the routing fields needed to build URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "loose_string")]
    pub farm: String,
    pub server: String,
    pub secret: String,
}

impl Photo {
    /// Substitute `{farm}`, `{server}`, `{id}` and `{secret}` into `template`.
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{farm}", &self.farm)
            .replace("{server}", &self.server)
            .replace("{id}", &self.id)
            .replace("{secret}", &self.secret)
    }
}

/// API credentials plus the account whose photosets are searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub username: String,
}

/// The remote operations the gallery tag depends on.
pub trait PhotoService {
    /// Resolve a username to the account's NSID.
    fn find_user_id(&self, username: &str) -> Result<String, ServiceError>;

    /// List every photoset owned by `user_id`, in service order.
    fn list_photosets(&self, user_id: &str) -> Result<Vec<Photoset>, ServiceError>;

    /// List every photo in a photoset, in service order.
    fn list_photos(&self, user_id: &str, photoset_id: &str) -> Result<Vec<Photo>, ServiceError>;
}

impl<S: PhotoService + ?Sized> PhotoService for Box<S> {
    fn find_user_id(&self, username: &str) -> Result<String, ServiceError> {
        (**self).find_user_id(username)
    }

    fn list_photosets(&self, user_id: &str) -> Result<Vec<Photoset>, ServiceError> {
        (**self).list_photosets(user_id)
    }

    fn list_photos(&self, user_id: &str, photoset_id: &str) -> Result<Vec<Photo>, ServiceError> {
        (**self).list_photos(user_id, photoset_id)
    }
}

impl<S: PhotoService + ?Sized> PhotoService for Rc<S> {
    fn find_user_id(&self, username: &str) -> Result<String, ServiceError> {
        (**self).find_user_id(username)
    }

    fn list_photosets(&self, user_id: &str) -> Result<Vec<Photoset>, ServiceError> {
        (**self).list_photosets(user_id)
    }

    fn list_photos(&self, user_id: &str, photoset_id: &str) -> Result<Vec<Photo>, ServiceError> {
        (**self).list_photos(user_id, photoset_id)
    }
}

/// Transport settings for [`FlickrClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub endpoint: String,
    pub timeout: Duration,
    pub per_page: u32,
    /// Response cache directory. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            per_page: MAX_PER_PAGE,
            cache_dir: None,
        }
    }
}

/// Blocking Flickr REST client.
pub struct FlickrClient {
    http: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    per_page: String,
    cache: Option<ResponseCache>,
}

impl FlickrClient {
    pub fn new(credentials: &Credentials, options: &ClientOptions) -> Result<Self, ServiceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("liquid-flickr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let cache = match &options.cache_dir {
            Some(dir) => Some(ResponseCache::open(dir)?),
            None => None,
        };
        Ok(Self {
            http,
            api_key: credentials.api_key.clone(),
            endpoint: options.endpoint.clone(),
            per_page: options.per_page.clamp(1, MAX_PER_PAGE).to_string(),
            cache,
        })
    }

    /// Cache counters, when caching is enabled.
    pub fn cache_stats(&self) -> Option<&cache::CacheStats> {
        self.cache.as_ref().map(ResponseCache::stats)
    }

    /// Call a REST method and return the unwrapped, `stat: ok` response.
    fn call<T: DeserializeOwned>(&self, method: &str, args: &[(&str, &str)]) -> Result<T, ServiceError> {
        let mut params = vec![
            ("method", method),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("nojsoncallback", "1"),
        ];
        params.extend_from_slice(args);
        let key = cache::request_key(&params);

        if let Some(body) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(method, key = %key, "cache hit");
            return decode(parse_envelope(&body)?);
        }

        debug!(method, "GET {}", self.endpoint);
        let body = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()?
            .error_for_status()?
            .text()?;
        let value = parse_envelope(&body)?;

        if let Some(cache) = &self.cache
            && let Err(err) = cache.put(&key, &body)
        {
            debug!(method, error = %err, "failed to write cache entry");
        }
        decode(value)
    }

    /// Call a paginated list method, concatenating every page in order.
    fn call_paged<R, T>(
        &self,
        method: &str,
        args: &[(&str, &str)],
        split: impl Fn(R) -> Page<T>,
    ) -> Result<Vec<T>, ServiceError>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let page_str = page.to_string();
            let mut paged_args = args.to_vec();
            paged_args.push(("per_page", self.per_page.as_str()));
            paged_args.push(("page", page_str.as_str()));

            let response: R = self.call(method, &paged_args)?;
            let Page {
                items: mut batch,
                pages,
            } = split(response);
            let empty = batch.is_empty();
            items.append(&mut batch);

            if page >= pages || empty {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

impl PhotoService for FlickrClient {
    fn find_user_id(&self, username: &str) -> Result<String, ServiceError> {
        let response: UserResponse =
            self.call("flickr.people.findByUsername", &[("username", username)])?;
        Ok(response.user.id)
    }

    fn list_photosets(&self, user_id: &str) -> Result<Vec<Photoset>, ServiceError> {
        self.call_paged(
            "flickr.photosets.getList",
            &[("user_id", user_id)],
            |r: PhotosetsResponse| Page {
                items: r
                    .photosets
                    .photoset
                    .into_iter()
                    .map(|p| Photoset {
                        id: p.id,
                        title: p.title.content,
                    })
                    .collect(),
                pages: r.photosets.pages,
            },
        )
    }

    fn list_photos(&self, user_id: &str, photoset_id: &str) -> Result<Vec<Photo>, ServiceError> {
        self.call_paged(
            "flickr.photosets.getPhotos",
            &[("user_id", user_id), ("photoset_id", photoset_id)],
            |r: PhotosResponse| Page {
                items: r.photoset.photo,
                pages: r.photoset.pages,
            },
        )
    }
}

/// One [`FlickrClient`] shared by every gallery tag in a run.
///
/// The client is built on first use, so runs that never expand a gallery
/// need no credentials. Cache counters accumulate across tags. Different
/// credentials replace the client and start fresh counters.
pub struct FlickrSession {
    options: ClientOptions,
    client: RefCell<Option<(Credentials, Rc<FlickrClient>)>>,
}

impl FlickrSession {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            client: RefCell::new(None),
        }
    }

    /// The client for `credentials`, built once and reused.
    pub fn connect(&self, credentials: &Credentials) -> Result<Rc<FlickrClient>, ServiceError> {
        let mut slot = self.client.borrow_mut();
        if let Some((current, client)) = slot.as_ref()
            && current == credentials
        {
            return Ok(Rc::clone(client));
        }
        let client = Rc::new(FlickrClient::new(credentials, &self.options)?);
        debug!(username = %credentials.username, endpoint = %self.options.endpoint, "flickr client ready");
        *slot = Some((credentials.clone(), Rc::clone(&client)));
        Ok(client)
    }

    /// One-line cache summary, once a client exists and caching is enabled.
    pub fn cache_summary(&self) -> Option<String> {
        let slot = self.client.borrow();
        let (_, client) = slot.as_ref()?;
        client.cache_stats().map(ToString::to_string)
    }
}

struct Page<T> {
    items: Vec<T>,
    pages: u32,
}

/// Check the `stat` envelope and return the parsed body.
pub fn parse_envelope(body: &str) -> Result<serde_json::Value, ServiceError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value.get("stat").and_then(|s| s.as_str()) {
        Some("ok") => Ok(value),
        Some("fail") => Err(ServiceError::Api {
            code: value.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
            message: value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string(),
        }),
        _ => Err(ServiceError::Decode("response has no stat field".into())),
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ServiceError> {
    Ok(serde_json::from_value(value)?)
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct UserResponse {
    user: User,
}

#[derive(Deserialize)]
struct User {
    id: String,
}

#[derive(Deserialize)]
struct Content {
    #[serde(rename = "_content")]
    content: String,
}

#[derive(Deserialize)]
struct PhotosetsResponse {
    photosets: PhotosetsPage,
}

#[derive(Deserialize)]
struct PhotosetsPage {
    #[serde(default = "one", deserialize_with = "loose_u32")]
    pages: u32,
    #[serde(default)]
    photoset: Vec<WirePhotoset>,
}

#[derive(Deserialize)]
struct WirePhotoset {
    id: String,
    title: Content,
}

#[derive(Deserialize)]
struct PhotosResponse {
    photoset: PhotosPage,
}

#[derive(Deserialize)]
struct PhotosPage {
    #[serde(default = "one", deserialize_with = "loose_u32")]
    pages: u32,
    #[serde(default)]
    photo: Vec<Photo>,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(u64),
    Text(String),
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Number(n) => n.to_string(),
        Loose::Text(s) => s,
    })
}

fn loose_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match Loose::deserialize(deserializer)? {
        Loose::Number(n) => u32::try_from(n).map_err(de::Error::custom),
        Loose::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
