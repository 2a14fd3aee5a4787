//! Static classification of file extensions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Archive,
    Audio,
    Image,
    #[serde(rename = "lang")]
    Language,
    Text,
    Video,
    #[default]
    Unsupported,
}

/// How a browser can preview the file. Serialized as a plain string (`""` when unsupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreviewType {
    #[default]
    #[serde(rename = "")]
    Unsupported,
    #[serde(rename = "audio/mpeg")]
    AudioMp3,
    #[serde(rename = "audio/ogg")]
    AudioOgg,
    #[serde(rename = "audio/wav")]
    AudioWav,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video/mp4")]
    VideoMp4,
    #[serde(rename = "video/webm")]
    VideoWebm,
    #[serde(rename = "text")]
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ext {
    pub ext: String,
    #[serde(rename = "fileType")]
    pub file_type: FileCategory,
    pub supported: bool,
    #[serde(rename = "previewType")]
    pub preview_type: PreviewType,
}

/// Extension, category, previewable, preview type, Content-Type.
type Entry = (&'static str, FileCategory, bool, PreviewType, &'static str);

const OCTET_STREAM: &str = "application/octet-stream";
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

use FileCategory::{Archive, Audio, Image, Language, Video};
use PreviewType as P;

const KNOWN: &[Entry] = &[
    (".7z", Archive, false, P::Unsupported, OCTET_STREAM),
    (".pkg", Archive, false, P::Unsupported, OCTET_STREAM),
    (".rar", Archive, false, P::Unsupported, OCTET_STREAM),
    (".zip", Archive, false, P::Unsupported, "application/zip"),
    (".tar.gz", Archive, false, P::Unsupported, OCTET_STREAM),
    (".aif", Audio, false, P::Unsupported, OCTET_STREAM),
    (".mpa", Audio, false, P::Unsupported, OCTET_STREAM),
    (".wma", Audio, false, P::Unsupported, OCTET_STREAM),
    (".wpl", Audio, false, P::Unsupported, OCTET_STREAM),
    (".ogg", Audio, true, P::AudioOgg, "audio/ogg"),
    (".wav", Audio, true, P::AudioWav, "audio/wav"),
    (".mp3", Audio, true, P::AudioMp3, "audio/mpeg"),
    (".bmp", Image, true, P::Image, "image/bmp"),
    (".gif", Image, true, P::Image, "image/gif"),
    (".ico", Image, true, P::Image, "image/x-icon"),
    (".jpg", Image, true, P::Image, "image/jpeg"),
    (".png", Image, true, P::Image, "image/png"),
    (".svg", Image, true, P::Image, "image/svg+xml"),
    (".jpeg", Image, true, P::Image, "image/jpeg"),
    (".avi", Video, false, P::Unsupported, OCTET_STREAM),
    (".mkv", Video, false, P::Unsupported, OCTET_STREAM),
    (".mov", Video, false, P::Unsupported, OCTET_STREAM),
    (".mpg", Video, false, P::Unsupported, OCTET_STREAM),
    (".mpeg", Video, false, P::Unsupported, OCTET_STREAM),
    (".mp4", Video, true, P::VideoMp4, "video/mp4"),
    (".webm", Video, true, P::VideoWebm, "video/webm"),
];

/// Source and plain-text formats previewed as text.
const TEXT_LIKE: &[&str] = &[
    ".asm", ".bash", ".bat", ".c", ".cc", ".cfg", ".clj", ".cmake", ".coffee", ".conf", ".cpp",
    ".cs", ".css", ".csv", ".d", ".dart", ".el", ".erl", ".ex", ".exs", ".fs", ".go", ".gradle",
    ".graphql", ".h", ".hpp", ".hs", ".htm", ".html", ".ini", ".java", ".jl", ".js", ".json",
    ".jsx", ".kt", ".less", ".lisp", ".litcoffee", ".log", ".lua", ".m", ".markdown", ".md",
    ".mk", ".ml", ".mm", ".nim", ".pas", ".php", ".pl", ".properties", ".proto", ".ps1", ".py",
    ".r", ".rb", ".rkt", ".rs", ".s", ".sass", ".scala", ".scss", ".sh", ".sql", ".svelte",
    ".swift", ".tex", ".toml", ".ts", ".tsx", ".txt", ".vim", ".vue", ".xml", ".yaml", ".yml",
    ".zig", ".zsh",
];

static TABLE: LazyLock<HashMap<&'static str, (Ext, &'static str)>> = LazyLock::new(|| {
    let mut table = HashMap::with_capacity(KNOWN.len() + TEXT_LIKE.len());
    for &(ext, file_type, supported, preview_type, content_type) in KNOWN {
        table.insert(
            ext,
            (
                Ext {
                    ext: ext.to_string(),
                    file_type,
                    supported,
                    preview_type,
                },
                content_type,
            ),
        );
    }
    for &ext in TEXT_LIKE {
        table.insert(
            ext,
            (
                Ext {
                    ext: ext.to_string(),
                    file_type: Language,
                    supported: true,
                    preview_type: P::Text,
                },
                PLAIN_TEXT,
            ),
        );
    }
    table
});

impl Ext {
    /// Looks up an extension with or without the leading dot, case-insensitively.
    /// Unknown extensions are unsupported but keep the normalized extension string.
    pub fn from_extension(ext: &str) -> Ext {
        if ext.is_empty() {
            return Ext::default();
        }

        let mut normalized = ext.to_lowercase();
        if !normalized.starts_with('.') {
            normalized.insert(0, '.');
        }

        match TABLE.get(normalized.as_str()) {
            Some((known, _)) => known.clone(),
            None => Ext {
                ext: normalized,
                ..Ext::default()
            },
        }
    }

    pub fn from_filename(filename: &str) -> Ext {
        if filename.to_lowercase().ends_with(".tar.gz") {
            return Ext::from_extension(".tar.gz");
        }
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Ext::from_extension(ext)
    }

    /// `Content-Type` used when serving the raw bytes.
    pub fn content_type(&self) -> &'static str {
        TABLE
            .get(self.ext.as_str())
            .map(|(_, content_type)| *content_type)
            .unwrap_or(OCTET_STREAM)
    }
}
