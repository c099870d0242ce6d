//! Media descriptors shown by the media panel

use serde::{Deserialize, Serialize};
use url::{ParseError, Url};

/// Query parameter used to defeat stale caches
pub const CACHE_BUST_PARAM: &str = "_t";

/// Media bucket inferred from tags or file extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    /// Animated image rendered like a video
    Gif,
}

impl MediaKind {
    /// Infer the bucket from a URL's file extension; unknown extensions are images
    pub fn from_url(url: &str) -> Self {
        match extension(url).as_deref() {
            Some("gif") => Self::Gif,
            Some("mp4" | "webm" | "mov" | "m4v" | "ogv" | "avi" | "mkv") => Self::Video,
            _ => Self::Image,
        }
    }

    pub fn is_video_like(self) -> bool {
        matches!(self, Self::Video | Self::Gif)
    }
}

/// Lowercased extension of the last path segment
fn extension(url: &str) -> Option<String> {
    let parsed = MediaUrl::parse(url)?;
    let segment = parsed.url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Base that relative lesson paths are parsed against
const RELATIVE_BASE: &str = "http://lesson.invalid/";

/// How the URL was written in the lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlForm {
    Absolute,
    /// `//host/path`
    SchemeRelative,
    /// `path` or `/path`
    PathRelative { rooted: bool },
}

/// Media URL parsed with the `url` crate
///
/// Relative lesson paths are joined onto a fixed base for parsing and
/// written back without it. Dot segments are resolved in the process.
#[derive(Debug, Clone)]
pub struct MediaUrl {
    url: Url,
    form: UrlForm,
}

impl MediaUrl {
    /// `None` when `raw` is not a URL even relative to a base
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match Url::parse(raw) {
            Ok(url) => Some(Self {
                url,
                form: UrlForm::Absolute,
            }),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let url = Url::parse(RELATIVE_BASE).ok()?.join(raw).ok()?;
                let form = if raw.starts_with("//") {
                    UrlForm::SchemeRelative
                } else {
                    UrlForm::PathRelative {
                        rooted: raw.starts_with('/'),
                    }
                };
                Some(Self { url, form })
            }
            Err(_) => None,
        }
    }

    /// Host of an absolute or scheme-relative URL
    pub fn host(&self) -> Option<&str> {
        match self.form {
            UrlForm::PathRelative { .. } => None,
            _ => self.url.host_str(),
        }
    }

    /// Replace the cache-busting parameter; `None` removes it
    pub fn set_cache_bust(&mut self, stamp: Option<u64>) {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != CACHE_BUST_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() && stamp.is_none() {
            self.url.set_query(None);
            return;
        }

        let mut pairs = self.url.query_pairs_mut();
        pairs.clear().extend_pairs(kept);
        if let Some(stamp) = stamp {
            pairs.append_pair(CACHE_BUST_PARAM, &stamp.to_string());
        }
    }

    /// Serialize in the form the URL was written in
    pub fn into_string(self) -> String {
        match self.form {
            UrlForm::Absolute => self.url.into(),
            UrlForm::SchemeRelative => {
                let full: String = self.url.into();
                match full.strip_prefix("http:") {
                    Some(rest) => rest.to_string(),
                    None => full,
                }
            }
            UrlForm::PathRelative { rooted } => {
                let path = self.url.path();
                let mut out = if rooted {
                    path.to_string()
                } else {
                    path.trim_start_matches('/').to_string()
                };
                if let Some(query) = self.url.query() {
                    out.push('?');
                    out.push_str(query);
                }
                if let Some(fragment) = self.url.fragment() {
                    out.push('#');
                    out.push_str(fragment);
                }
                out
            }
        }
    }
}

/// Set `_t=<stamp>` on a URL, replacing any previous stamp
///
/// Unparseable input is returned unchanged.
pub fn with_cache_bust(url: &str, stamp: u64) -> String {
    match MediaUrl::parse(url) {
        Some(mut parsed) => {
            parsed.set_cache_bust(Some(stamp));
            parsed.into_string()
        }
        None => url.to_string(),
    }
}

/// What the media panel currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub url: String,
    pub kind: MediaKind,
    pub title: String,
    /// Originating question or exercise id
    pub source_id: String,
    /// Must render unoptimized (no proxied image loading)
    pub is_external_domain: bool,
    pub is_permanent: bool,
}

impl MediaDescriptor {
    /// URL with the cache-busting parameter removed
    pub fn canonical_url(&self) -> String {
        canonical_url(&self.url)
    }

    /// Same asset, ignoring cache busting
    pub fn same_asset(&self, other: &MediaDescriptor) -> bool {
        self.canonical_url() == other.canonical_url()
    }

    /// Copy of this descriptor pinned as permanent
    pub fn pinned(mut self) -> Self {
        self.is_permanent = true;
        self
    }
}

/// Strip the cache-busting parameter from a URL
pub fn canonical_url(url: &str) -> String {
    match MediaUrl::parse(url) {
        Some(mut parsed) => {
            parsed.set_cache_bust(None);
            parsed.into_string()
        }
        None => url.to_string(),
    }
}

/// Descriptor-like payload carried by display-request events
///
/// Kind and title are optional; the resolver fills them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRequest {
    pub url: String,
    #[serde(default)]
    pub kind: Option<MediaKind>,
    #[serde(default)]
    pub title: Option<String>,
    pub source_id: String,
    #[serde(default)]
    pub is_permanent: bool,
}
