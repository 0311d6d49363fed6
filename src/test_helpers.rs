//! Shared test utilities for the liquid-flickr test suite.
//!
//! Provides an in-memory [`FakeService`] standing in for Flickr, builders for
//! photos and photosets, and a ready-made configuration carrying credentials.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tag = fake_gallery_tag(
//!     FakeService::new("someone", "u1")
//!         .with_set(photoset("s1", "Winter"), vec![photo("1", "Dawn")]),
//! );
//! let html = tag.expand(r#""winter""#, &flickr_config()).unwrap();
//! ```

use std::collections::HashMap;

use crate::flickr::{Photo, PhotoService, Photoset, ServiceError};
use crate::gallery::GalleryTag;

// =========================================================================
// Builders
// =========================================================================

/// A photo with predictable routing fields: farm 1, server 100, secret `s{id}`.
pub fn photo(id: &str, title: &str) -> Photo {
    Photo {
        id: id.to_string(),
        title: title.to_string(),
        farm: "1".to_string(),
        server: "100".to_string(),
        secret: format!("s{id}"),
    }
}

pub fn photoset(id: &str, title: &str) -> Photoset {
    Photoset {
        id: id.to_string(),
        title: title.to_string(),
    }
}

/// Configuration with all three Flickr credentials set.
pub fn flickr_config() -> HashMap<String, String> {
    [
        ("FLICKR_API_KEY", "key"),
        ("FLICKR_API_SECRET", "secret"),
        ("FLICKR_USERNAME", "someone"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A gallery tag wired to a clone of `service` on every expansion.
pub fn fake_gallery_tag(service: FakeService) -> GalleryTag {
    GalleryTag::new(move |_credentials| Ok(Box::new(service.clone()) as Box<dyn PhotoService>))
}

// =========================================================================
// Fake service
// =========================================================================

/// In-memory photo service with a single account.
///
/// Errors mirror Flickr's: unknown users and photosets come back as
/// [`ServiceError::Api`] with code 1.
#[derive(Debug, Clone)]
pub struct FakeService {
    username: String,
    user_id: String,
    sets: Vec<(Photoset, Vec<Photo>)>,
}

impl FakeService {
    pub fn new(username: &str, user_id: &str) -> Self {
        Self {
            username: username.to_string(),
            user_id: user_id.to_string(),
            sets: Vec::new(),
        }
    }

    /// Add a photoset (listed in insertion order) with its photos.
    pub fn with_set(mut self, set: Photoset, photos: Vec<Photo>) -> Self {
        self.sets.push((set, photos));
        self
    }

    fn check_user(&self, user_id: &str) -> Result<(), ServiceError> {
        if user_id == self.user_id {
            Ok(())
        } else {
            Err(not_found("Unknown user"))
        }
    }
}

fn not_found(message: &str) -> ServiceError {
    ServiceError::Api {
        code: 1,
        message: message.to_string(),
    }
}

impl PhotoService for FakeService {
    fn find_user_id(&self, username: &str) -> Result<String, ServiceError> {
        if username == self.username {
            Ok(self.user_id.clone())
        } else {
            Err(not_found("User not found"))
        }
    }

    fn list_photosets(&self, user_id: &str) -> Result<Vec<Photoset>, ServiceError> {
        self.check_user(user_id)?;
        Ok(self.sets.iter().map(|(set, _)| set.clone()).collect())
    }

    fn list_photos(&self, user_id: &str, photoset_id: &str) -> Result<Vec<Photo>, ServiceError> {
        self.check_user(user_id)?;
        self.sets
            .iter()
            .find(|(set, _)| set.id == photoset_id)
            .map(|(_, photos)| photos.clone())
            .ok_or_else(|| not_found("Photoset not found"))
    }
}
