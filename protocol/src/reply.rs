use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

/// Where an image segment can be fetched from by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    File(PathBuf),
    Url(String),
}

/// One segment of a reply message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Text { text: String },
    Image { source: ImageSource },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text { text: text.into() }
    }

    pub fn image(source: ImageSource) -> Self {
        Reply::Image { source }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Reply::image(ImageSource::File(path.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text { text } => Some(text),
            Reply::Image { .. } => None,
        }
    }
}
