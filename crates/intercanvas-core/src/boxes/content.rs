//! Typed per-content-type payloads for boxes.

use crate::geometry::Alignment;
use serde::{Deserialize, Serialize};

/// Content kind tag, as persisted under `contentType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    None,
    Text,
    Image,
    Chart,
    Animation,
    Dune,
    Link,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::None => "none",
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Chart => "chart",
            ContentType::Animation => "animation",
            ContentType::Dune => "dune",
            ContentType::Link => "link",
        }
    }

    /// Empty content of this kind, with every field at its default.
    pub fn empty_content(self) -> BoxContent {
        match self {
            ContentType::None => BoxContent::None,
            ContentType::Text => BoxContent::Text(TextContent::default()),
            ContentType::Image => BoxContent::Image(ImageContent::default()),
            ContentType::Chart => BoxContent::Chart(ChartContent::default()),
            ContentType::Animation => BoxContent::Animation(AnimationContent::default()),
            ContentType::Dune => BoxContent::Dune(DuneContent::default()),
            ContentType::Link => BoxContent::Link(LinkContent::default()),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every top-level key any content variant can persist, `contentType` included.
pub const CONTENT_KEYS: &[&str] = &[
    "contentType",
    "text",
    "fontSize",
    "color",
    "bold",
    "italic",
    "underline",
    "align",
    "background",
    "src",
    "gallery",
    "fit",
    "proposalId",
    "chartType",
    "options",
    "loop",
    "autoplay",
    "embedUrl",
    "url",
    "openInNewTab",
];

/// What a box displays. Each variant only carries the fields it uses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "contentType", rename_all = "lowercase")]
pub enum BoxContent {
    #[default]
    None,
    Text(TextContent),
    Image(ImageContent),
    Chart(ChartContent),
    Animation(AnimationContent),
    Dune(DuneContent),
    Link(LinkContent),
}

impl BoxContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            BoxContent::None => ContentType::None,
            BoxContent::Text(_) => ContentType::Text,
            BoxContent::Image(_) => ContentType::Image,
            BoxContent::Chart(_) => ContentType::Chart,
            BoxContent::Animation(_) => ContentType::Animation,
            BoxContent::Dune(_) => ContentType::Dune,
            BoxContent::Link(_) => ContentType::Link,
        }
    }

    /// Convenience constructor for a plain text box.
    pub fn text(text: impl Into<String>) -> Self {
        BoxContent::Text(TextContent {
            text: text.into(),
            ..TextContent::default()
        })
    }

    /// Convenience constructor for a single-image box.
    pub fn image(src: impl Into<String>) -> Self {
        BoxContent::Image(ImageContent {
            src: Some(src.into()),
            ..ImageContent::default()
        })
    }

    /// Convenience constructor for a link hit-region.
    pub fn link(url: impl Into<String>, open_in_new_tab: bool) -> Self {
        BoxContent::Link(LinkContent {
            url: url.into(),
            open_in_new_tab,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    pub font_size: u32,
    /// CSS color string.
    pub color: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub align: Alignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl TextContent {
    pub const DEFAULT_FONT_SIZE: u32 = 16;
}

impl Default for TextContent {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: Self::DEFAULT_FONT_SIZE,
            color: "#000000".to_string(),
            bold: false,
            italic: false,
            underline: false,
            align: Alignment::Left,
            background: None,
        }
    }
}

/// How an image is fitted into its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    #[default]
    Contain,
    Cover,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Additional sources shown as a carousel.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<String>,
    pub fit: ImageFit,
}

impl ImageContent {
    /// All image URLs, primary first.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.src.iter().chain(self.gallery.iter()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartContent {
    /// Governance proposal the chart visualises.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
    pub chart_type: ChartKind,
    /// Renderer-specific options, passed through untouched.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub autoplay: bool,
}

impl Default for AnimationContent {
    fn default() -> Self {
        Self {
            src: None,
            looping: true,
            autoplay: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DuneContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkContent {
    pub url: String,
    pub open_in_new_tab: bool,
}

impl Default for LinkContent {
    fn default() -> Self {
        Self {
            url: String::new(),
            open_in_new_tab: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_tag_serialization() {
        let value = serde_json::to_value(BoxContent::text("hello")).unwrap();
        assert_eq!(value["contentType"], "text");
        assert_eq!(value["text"], "hello");
        assert_eq!(value["fontSize"], 16);
    }

    #[test]
    fn test_none_content_is_bare_tag() {
        let value = serde_json::to_value(BoxContent::None).unwrap();
        assert_eq!(value, json!({ "contentType": "none" }));
    }

    #[test]
    fn test_animation_uses_loop_key() {
        let content: BoxContent = serde_json::from_value(json!({
            "contentType": "animation",
            "src": "https://example.com/a.json",
            "loop": false,
        }))
        .unwrap();
        match content {
            BoxContent::Animation(anim) => {
                assert!(!anim.looping);
                assert!(anim.autoplay);
                assert_eq!(anim.src.as_deref(), Some("https://example.com/a.json"));
            }
            other => panic!("Wrong content: {other:?}"),
        }
    }

    #[test]
    fn test_empty_content_matches_type() {
        for kind in [
            ContentType::None,
            ContentType::Text,
            ContentType::Image,
            ContentType::Chart,
            ContentType::Animation,
            ContentType::Dune,
            ContentType::Link,
        ] {
            assert_eq!(kind.empty_content().content_type(), kind);
        }
    }

    #[test]
    fn test_content_keys_cover_every_variant() {
        let populated = [
            BoxContent::Text(TextContent {
                background: Some("#eee".into()),
                ..TextContent::default()
            }),
            BoxContent::Image(ImageContent {
                src: Some("a.png".into()),
                gallery: vec!["b.png".into()],
                fit: ImageFit::Fill,
            }),
            BoxContent::Chart(ChartContent {
                proposal_id: Some("42".into()),
                chart_type: ChartKind::Pie,
                options: json!({ "legend": true }),
            }),
            BoxContent::Animation(AnimationContent {
                src: Some("a.json".into()),
                ..AnimationContent::default()
            }),
            BoxContent::Dune(DuneContent {
                embed_url: Some("https://dune.com/embeds/1".into()),
            }),
            BoxContent::link("https://x.org", false),
        ];
        for content in populated {
            let value = serde_json::to_value(&content).unwrap();
            for key in value.as_object().unwrap().keys() {
                assert!(CONTENT_KEYS.contains(&key.as_str()), "missing {key}");
            }
        }
    }

    #[test]
    fn test_image_sources_order() {
        let image = ImageContent {
            src: Some("a.png".into()),
            gallery: vec!["b.png".into(), "c.png".into()],
            fit: ImageFit::Cover,
        };
        let sources: Vec<&str> = image.sources().collect();
        assert_eq!(sources, vec!["a.png", "b.png", "c.png"]);
    }
}
