use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Which images a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    FullPage,
    ContentRegion,
    #[default]
    Both,
}

impl CaptureMode {
    pub fn wants_full_page(&self) -> bool {
        matches!(self, Self::FullPage | Self::Both)
    }

    pub fn wants_content(&self) -> bool {
        matches!(self, Self::ContentRegion | Self::Both)
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "fullpage" | "full-page" | "full_page" => Ok(Self::FullPage),
            "content" | "region" | "content-region" | "content_region" => Ok(Self::ContentRegion),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown capture mode '{}' (expected full-page, content or both)",
                other
            )),
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FullPage => "full-page",
            Self::ContentRegion => "content",
            Self::Both => "both",
        })
    }
}

/// Encoded image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(format!(
                "unknown image format '{}' (expected png, jpeg or webp)",
                other
            )),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        })
    }
}

/// One page to capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    /// Identifier used for output file names
    pub id: String,
    pub url: Url,
    /// Grouping label; outputs of a group share a directory
    pub group: String,
}

impl CaptureJob {
    pub fn new(id: impl Into<String>, url: Url, group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url,
            group: group.into(),
        }
    }

    /// Host the page is served from, used for domain-specific detection
    pub fn domain(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}
