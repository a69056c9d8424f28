//! Record JSON for rich-text facets and external link embeds

use serde::Serialize;
use skypost_domain::{AnnotationSpan, BlobRef, PreviewCard, SpanKind};

#[derive(Debug, Serialize)]
pub(crate) struct Facet {
    index: ByteSlice,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ByteSlice {
    #[serde(rename = "byteStart")]
    byte_start: usize,
    #[serde(rename = "byteEnd")]
    byte_end: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "$type")]
enum Feature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

#[derive(Debug, Serialize)]
pub(crate) struct ExternalEmbed {
    #[serde(rename = "$type")]
    kind: &'static str,
    external: External,
}

#[derive(Debug, Serialize)]
struct External {
    uri: String,
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb: Option<BlobRef>,
}

pub(crate) fn facets(spans: &[AnnotationSpan]) -> Vec<Facet> {
    spans
        .iter()
        .map(|span| Facet {
            index: ByteSlice {
                byte_start: span.byte_start,
                byte_end: span.byte_end,
            },
            features: vec![match span.kind {
                SpanKind::Link => Feature::Link {
                    uri: span.payload.clone(),
                },
                SpanKind::Hashtag => Feature::Tag {
                    tag: span.payload.clone(),
                },
            }],
        })
        .collect()
}

pub(crate) fn external_embed(card: &PreviewCard) -> ExternalEmbed {
    ExternalEmbed {
        kind: "app.bsky.embed.external",
        external: External {
            uri: card.uri.clone(),
            title: card.title.clone(),
            description: card.description.clone(),
            thumb: card.thumb.clone(),
        },
    }
}
