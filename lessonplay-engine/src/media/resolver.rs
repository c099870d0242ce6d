//! Media Resolver
//!
//! Finds the asset to show for a question, exercise or queue item through
//! an ordered fallback chain that always ends at the placeholder:
//!
//! 1. direct media field
//! 2. metadata image, then metadata video
//! 3. nested content image
//! 4. nested data image (`image_url`, then `imageUrl`)
//! 5. lesson title/media image
//! 6. placeholder asset
//!
//! Every resolved URL gets a strictly increasing `_t` parameter so that
//! repeated resolutions of the same source are fetched fresh.

use lessonplay_common::config::MediaConfig;
use lessonplay_common::content::ContentItem;
use lessonplay_common::lesson::{non_empty, Lesson, MediaFields, SourcedExercise};
use lessonplay_common::media::{with_cache_bust, DisplayRequest, MediaDescriptor, MediaKind, MediaUrl};
use lessonplay_common::time::now_millis;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// One link of the fallback chain, tagged by the legacy field it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource<'a> {
    Direct(&'a str),
    MetadataImage(&'a str),
    MetadataVideo(&'a str),
    ContentImage(&'a str),
    DataImage(&'a str),
    DataImageCamel(&'a str),
    LessonImage(&'a str),
    Placeholder(&'a str),
}

impl<'a> MediaSource<'a> {
    pub fn url(&self) -> &'a str {
        match *self {
            Self::Direct(url)
            | Self::MetadataImage(url)
            | Self::MetadataVideo(url)
            | Self::ContentImage(url)
            | Self::DataImage(url)
            | Self::DataImageCamel(url)
            | Self::LessonImage(url)
            | Self::Placeholder(url) => url,
        }
    }

    /// Kind implied by the field itself, if any
    ///
    /// Video metadata is tagged video unless the file is a gif.
    pub fn explicit_kind(&self) -> Option<MediaKind> {
        match self {
            Self::MetadataVideo(url) if MediaKind::from_url(url) != MediaKind::Gif => {
                Some(MediaKind::Video)
            }
            Self::Placeholder(_) => Some(MediaKind::Image),
            _ => None,
        }
    }
}

/// Strictly increasing millisecond stamps for cache busting
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock milliseconds, bumped past the previous stamp when needed
    pub fn next(&self) -> u64 {
        let now = now_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

/// Media Resolver
pub struct MediaResolver {
    placeholder_url: String,
    external_domains: Vec<String>,
    cache_buster: CacheBuster,
}

impl MediaResolver {
    pub fn new(placeholder_url: impl Into<String>, external_domains: Vec<String>) -> Self {
        Self {
            placeholder_url: placeholder_url.into(),
            external_domains: external_domains
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            cache_buster: CacheBuster::new(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.placeholder_url.clone(), config.external_domains.clone())
    }

    pub fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }

    /// URL served from one of the known external domains
    pub fn is_external_domain(&self, url: &str) -> bool {
        let Some(host) = MediaUrl::parse(url).and_then(|u| u.host().map(str::to_ascii_lowercase)) else {
            return false;
        };
        self.external_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }

    /// Ordered candidates for `owner`, ending with the placeholder
    pub fn chain<'a>(&'a self, owner: &'a dyn MediaFields, lesson: &'a Lesson) -> Vec<MediaSource<'a>> {
        let metadata = owner.metadata();
        let mut chain = Vec::with_capacity(8);
        chain.extend(owner.direct_media().map(MediaSource::Direct));
        chain.extend(non_empty(&metadata.image_url).map(MediaSource::MetadataImage));
        chain.extend(non_empty(&metadata.video_url).map(MediaSource::MetadataVideo));
        chain.extend(owner.content_image().map(MediaSource::ContentImage));
        chain.extend(owner.data_image().map(MediaSource::DataImage));
        chain.extend(owner.data_image_camel().map(MediaSource::DataImageCamel));
        chain.extend(lesson.lesson_image().map(MediaSource::LessonImage));
        chain.push(MediaSource::Placeholder(&self.placeholder_url));
        chain
    }

    /// First match of the chain for `owner`
    pub fn resolve(&self, owner: &dyn MediaFields, lesson: &Lesson, title: &str) -> MediaDescriptor {
        let chain = self.chain(owner, lesson);
        // The chain always ends with the placeholder
        let source = chain[0];
        trace!(source_id = owner.source_id(), ?source, "Resolved media source");
        self.describe(source.url(), owner.source_id(), title, source.explicit_kind())
    }

    /// Resolve by question or exercise id; `None` when the id is unknown
    pub fn resolve_source(&self, lesson: &Lesson, source_id: &str) -> Option<MediaDescriptor> {
        if let Some(question) = lesson.find_question(source_id) {
            let title = non_empty(&question.title)
                .or_else(|| non_empty(&question.data.prompt))
                .unwrap_or_default();
            return Some(self.resolve(question, lesson, title));
        }

        let (id, exercise) = lesson.find_exercise(source_id)?;
        let owner = SourcedExercise {
            source_id: &id,
            exercise,
        };
        let title = non_empty(&exercise.text).unwrap_or_default();
        Some(self.resolve(&owner, lesson, title))
    }

    /// Media for a queue item
    ///
    /// Items of known questions or exercises resolve through the chain; other
    /// items use their media hint, then the lesson image, then the placeholder.
    pub fn resolve_item(&self, lesson: &Lesson, item: &ContentItem) -> MediaDescriptor {
        if let Some(descriptor) = self.resolve_source(lesson, &item.source_id) {
            return descriptor;
        }

        let title = non_empty(&lesson.title).unwrap_or_default();
        let url = non_empty(&item.media_url)
            .or_else(|| lesson.lesson_image())
            .unwrap_or(self.placeholder_url.as_str());
        self.describe(url, &item.source_id, title, None)
    }

    /// Normalize a display request from the event bus
    pub fn from_request(&self, request: &DisplayRequest) -> MediaDescriptor {
        let url = if request.url.trim().is_empty() {
            self.placeholder_url.as_str()
        } else {
            request.url.as_str()
        };
        let mut descriptor = self.describe(
            url,
            &request.source_id,
            request.title.as_deref().unwrap_or_default(),
            request.kind,
        );
        descriptor.is_permanent = request.is_permanent;
        descriptor
    }

    /// Placeholder descriptor for `source_id`
    pub fn placeholder(&self, source_id: &str) -> MediaDescriptor {
        self.describe(&self.placeholder_url, source_id, "", Some(MediaKind::Image))
    }

    /// Build a descriptor: infer kind, flag external domains, bust caches
    pub fn describe(
        &self,
        url: &str,
        source_id: &str,
        title: &str,
        explicit_kind: Option<MediaKind>,
    ) -> MediaDescriptor {
        MediaDescriptor {
            url: with_cache_bust(url, self.cache_buster.next()),
            kind: explicit_kind.unwrap_or_else(|| MediaKind::from_url(url)),
            title: title.to_string(),
            source_id: source_id.to_string(),
            is_external_domain: self.is_external_domain(url),
            is_permanent: false,
        }
    }
}
