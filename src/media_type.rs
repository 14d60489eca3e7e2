//! Media-type registry.
//!
//! Maps file extensions to a [`MediaType`], which in turn fixes the
//! text/binary/image classification and the [`ResourceKind`] used to build
//! the resource's native format. The registry is an ordinary immutable value:
//! construct it once (usually [`MediaTypeRegistry::standard`]) and share it
//! behind an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::resource::Resource;

/// Coarse classification of a media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    Text,
    Binary,
    Image,
}

/// Selects how a resource's bytes are turned into a native format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Well-formed XHTML content document.
    Xhtml,
    /// Other XML (package document, NCX, SVG).
    Xml,
    /// CSS stylesheet.
    Css,
    /// Plain decoded text.
    Text,
    /// Raster image.
    Image,
    /// Opaque bytes.
    Binary,
}

/// Media types known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Xhtml,
    Css,
    Xml,
    Opf,
    Ncx,
    Svg,
    JavaScript,
    PlainText,
    Jpeg,
    Png,
    Gif,
    WebP,
    Ttf,
    Otf,
    Woff,
    Woff2,
    Mp3,
    Mp4,
    /// Fallback for unknown extensions.
    Binary,
}

impl MediaType {
    const ALL: [MediaType; 19] = [
        MediaType::Xhtml,
        MediaType::Css,
        MediaType::Xml,
        MediaType::Opf,
        MediaType::Ncx,
        MediaType::Svg,
        MediaType::JavaScript,
        MediaType::PlainText,
        MediaType::Jpeg,
        MediaType::Png,
        MediaType::Gif,
        MediaType::WebP,
        MediaType::Ttf,
        MediaType::Otf,
        MediaType::Woff,
        MediaType::Woff2,
        MediaType::Mp3,
        MediaType::Mp4,
        MediaType::Binary,
    ];

    /// Get the MIME type string for this media type.
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Xhtml => "application/xhtml+xml",
            MediaType::Css => "text/css",
            MediaType::Xml => "application/xml",
            MediaType::Opf => "application/oebps-package+xml",
            MediaType::Ncx => "application/x-dtbncx+xml",
            MediaType::Svg => "image/svg+xml",
            MediaType::JavaScript => "application/javascript",
            MediaType::PlainText => "text/plain",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::WebP => "image/webp",
            MediaType::Ttf => "font/ttf",
            MediaType::Otf => "font/otf",
            MediaType::Woff => "font/woff",
            MediaType::Woff2 => "font/woff2",
            MediaType::Mp3 => "audio/mpeg",
            MediaType::Mp4 => "video/mp4",
            MediaType::Binary => "application/octet-stream",
        }
    }

    pub fn class(self) -> MediaClass {
        match self {
            MediaType::Xhtml
            | MediaType::Css
            | MediaType::Xml
            | MediaType::Opf
            | MediaType::Ncx
            | MediaType::JavaScript
            | MediaType::PlainText => MediaClass::Text,
            MediaType::Svg
            | MediaType::Jpeg
            | MediaType::Png
            | MediaType::Gif
            | MediaType::WebP => MediaClass::Image,
            MediaType::Ttf
            | MediaType::Otf
            | MediaType::Woff
            | MediaType::Woff2
            | MediaType::Mp3
            | MediaType::Mp4
            | MediaType::Binary => MediaClass::Binary,
        }
    }

    pub fn kind(self) -> ResourceKind {
        match self {
            MediaType::Xhtml => ResourceKind::Xhtml,
            MediaType::Xml | MediaType::Opf | MediaType::Ncx | MediaType::Svg => ResourceKind::Xml,
            MediaType::Css => ResourceKind::Css,
            MediaType::JavaScript | MediaType::PlainText => ResourceKind::Text,
            MediaType::Jpeg | MediaType::Png | MediaType::Gif | MediaType::WebP => {
                ResourceKind::Image
            }
            _ => ResourceKind::Binary,
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaType::Xhtml => &["xhtml", "html", "htm", "xht"],
            MediaType::Css => &["css"],
            MediaType::Xml => &["xml"],
            MediaType::Opf => &["opf"],
            MediaType::Ncx => &["ncx"],
            MediaType::Svg => &["svg"],
            MediaType::JavaScript => &["js"],
            MediaType::PlainText => &["txt"],
            MediaType::Jpeg => &["jpg", "jpeg"],
            MediaType::Png => &["png"],
            MediaType::Gif => &["gif"],
            MediaType::WebP => &["webp"],
            MediaType::Ttf => &["ttf"],
            MediaType::Otf => &["otf"],
            MediaType::Woff => &["woff"],
            MediaType::Woff2 => &["woff2"],
            MediaType::Mp3 => &["mp3"],
            MediaType::Mp4 => &["mp4", "m4v"],
            MediaType::Binary => &[],
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

/// Immutable extension → media type mapping plus the resource factory.
#[derive(Debug, Clone)]
pub struct MediaTypeRegistry {
    by_extension: HashMap<&'static str, MediaType>,
    by_mime: HashMap<&'static str, MediaType>,
}

impl MediaTypeRegistry {
    /// Build a registry with every known media type.
    pub fn new() -> Self {
        let mut by_extension = HashMap::new();
        let mut by_mime = HashMap::new();
        for media_type in MediaType::ALL {
            for ext in media_type.extensions() {
                by_extension.insert(*ext, media_type);
            }
            by_mime.insert(media_type.mime(), media_type);
        }
        // Common aliases seen in older packages
        by_mime.insert("text/html", MediaType::Xhtml);
        by_mime.insert("text/xml", MediaType::Xml);
        by_mime.insert("text/javascript", MediaType::JavaScript);
        by_mime.insert("application/x-font-ttf", MediaType::Ttf);
        by_mime.insert("application/vnd.ms-opentype", MediaType::Otf);
        by_mime.insert("application/font-woff", MediaType::Woff);

        Self {
            by_extension,
            by_mime,
        }
    }

    /// Process-wide shared standard registry.
    ///
    /// The registry never changes after construction, so handing out clones of
    /// one `Arc` is safe from any thread.
    pub fn standard() -> Arc<MediaTypeRegistry> {
        static STANDARD: OnceLock<Arc<MediaTypeRegistry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Arc::new(MediaTypeRegistry::new()))
            .clone()
    }

    /// Look up a bare extension (without the dot), case-insensitively.
    pub fn lookup_extension(&self, ext: &str) -> Option<MediaType> {
        self.by_extension.get(ext.to_ascii_lowercase().as_str()).copied()
    }

    /// Media type for a package-relative href. Unknown extensions are `Binary`.
    pub fn media_type_for(&self, href: &str) -> MediaType {
        extension(href)
            .and_then(|ext| self.lookup_extension(ext))
            .unwrap_or(MediaType::Binary)
    }

    /// Look up a MIME string from a manifest.
    pub fn from_mime(&self, mime: &str) -> Option<MediaType> {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        self.by_mime.get(mime.to_ascii_lowercase().as_str()).copied()
    }

    /// Create a resource, dispatching on the href's extension.
    ///
    /// Unknown extensions produce a generic binary resource.
    pub fn create_resource(&self, data: Vec<u8>, href: impl Into<String>) -> Resource {
        let href = href.into();
        let media_type = self.media_type_for(&href);
        Resource::new(href, data, media_type)
    }
}

impl Default for MediaTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension of the last path segment, ignoring any fragment or query.
fn extension(href: &str) -> Option<&str> {
    let path = href.split(['#', '?']).next().unwrap_or(href);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
