use crate::codec::DiagramCodec;
use crate::error::{CodecError, CodecResult, ParseError, ParseResult};
use crate::graph::{GRAPH_MODEL_TAG, GraphModel};
use crate::xml::{Attributes, Element};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::mem;

pub const FILE_TAG: &str = "mxfile";
pub const DIAGRAM_TAG: &str = "diagram";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiagramContent {
    /// `<diagram/>` with no body.
    #[default]
    Empty,
    /// Compressed payload text exactly as read, not decoded yet.
    Encoded(String),
    /// Model behind a compressed payload; written back compressed.
    Decoded(GraphModel),
    /// `<mxGraphModel>` stored uncompressed inside `<diagram>`; written back
    /// inline.
    Inline(GraphModel),
}

/// One page of a file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,

    #[serde(default)]
    pub content: DiagramContent,
}

impl Diagram {
    /// New page holding `model`, written as a compressed payload.
    pub fn new(id: impl Into<String>, name: impl Into<String>, model: GraphModel) -> Self {
        let mut attrs = Attributes::new();
        attrs.insert("id".into(), id.into());
        attrs.insert("name".into(), name.into());
        Self {
            attrs,
            content: DiagramContent::Decoded(model),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attrs.get("id").map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.attrs.get("name").map(String::as_str)
    }

    /// Model if it is already materialized (decoded or inline).
    pub fn model(&self) -> Option<&GraphModel> {
        match &self.content {
            DiagramContent::Decoded(m) | DiagramContent::Inline(m) => Some(m),
            DiagramContent::Empty | DiagramContent::Encoded(_) => None,
        }
    }

    /// Decodes a raw payload in place and returns the model for editing.
    /// On failure the raw payload is kept.
    pub fn decode(&mut self, codec: &DiagramCodec) -> CodecResult<Option<&mut GraphModel>> {
        if let DiagramContent::Encoded(payload) = &self.content {
            let model = codec.decode_model(payload)?;
            self.content = DiagramContent::Decoded(model);
        }
        Ok(match &mut self.content {
            DiagramContent::Decoded(m) | DiagramContent::Inline(m) => Some(m),
            DiagramContent::Empty | DiagramContent::Encoded(_) => None,
        })
    }

    /// Owned copy of the model without changing how the page is stored.
    pub fn to_graph_model(&self, codec: &DiagramCodec) -> CodecResult<Option<GraphModel>> {
        match &self.content {
            DiagramContent::Empty => Ok(None),
            DiagramContent::Encoded(payload) => codec.decode_model(payload).map(Some),
            DiagramContent::Decoded(m) | DiagramContent::Inline(m) => Ok(Some(m.clone())),
        }
    }

    /// Replaces the page content. An inline page stays inline, anything else
    /// becomes a compressed payload.
    pub fn set_graph_model(&mut self, model: GraphModel) -> DiagramContent {
        let content = match self.content {
            DiagramContent::Inline(_) => DiagramContent::Inline(model),
            _ => DiagramContent::Decoded(model),
        };
        mem::replace(&mut self.content, content)
    }

    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        if element.name != DIAGRAM_TAG {
            return Err(ParseError::Structure(format!(
                "expected <{DIAGRAM_TAG}>, found <{}>",
                element.name
            )));
        }

        let content = if let Some(inline) = element.child(GRAPH_MODEL_TAG) {
            DiagramContent::Inline(GraphModel::from_xml(inline)?)
        } else if let Some(text) = &element.text {
            DiagramContent::Encoded(text.clone())
        } else {
            DiagramContent::Empty
        };

        Ok(Self {
            attrs: element.attrs.clone(),
            content,
        })
    }

    pub fn to_xml(&self, codec: &DiagramCodec) -> CodecResult<Element> {
        let mut el = Element::new(DIAGRAM_TAG);
        el.attrs = self.attrs.clone();
        match &self.content {
            DiagramContent::Empty => {}
            DiagramContent::Encoded(payload) => el.text = Some(payload.clone()),
            DiagramContent::Decoded(model) => el.text = Some(codec.encode_model(model)?),
            DiagramContent::Inline(model) => {
                let inline = model.to_xml().map_err(|e| CodecError::Model(e.into()))?;
                el.children.push(inline);
            }
        }
        Ok(el)
    }
}

/// The outer `<mxfile>` envelope: file attributes and its pages.
/// Serializes to JSON and back without the codec; a loaded file uses the
/// default codec until [`MxFile::with_codec`] is called.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MxFile {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,

    #[serde(default)]
    pub diagrams: Vec<Diagram>,

    #[serde(skip)]
    codec: DiagramCodec,
}

impl MxFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(mut self, codec: DiagramCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &DiagramCodec {
        &self.codec
    }

    /// Reads the envelope. Compressed payloads are kept as text until
    /// [`MxFile::decode_all`] or [`Diagram::decode`] is called; inline models
    /// are read right away.
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        Self::from_xml(&Element::parse_bytes(bytes)?)
    }

    pub fn parse_str(xml: &str) -> ParseResult<Self> {
        Self::from_xml(&Element::parse(xml)?)
    }

    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        if element.name != FILE_TAG {
            return Err(ParseError::Structure(format!(
                "no <{FILE_TAG}> root element found (got <{}>)",
                element.name
            )));
        }

        let mut diagrams = Vec::new();
        for child in &element.children {
            if child.name != DIAGRAM_TAG {
                tracing::warn!(element = %child.name, "skipping unknown element under <mxfile>");
                continue;
            }
            diagrams.push(Diagram::from_xml(child)?);
        }
        tracing::debug!(diagrams = diagrams.len(), "mxfile read");

        Ok(Self {
            attrs: element.attrs.clone(),
            diagrams,
            codec: DiagramCodec::default(),
        })
    }

    /// Decodes every compressed page. Stops at the first failure; pages
    /// decoded before it stay decoded and the failing one keeps its payload.
    pub fn decode_all(&mut self) -> CodecResult<()> {
        for (index, diagram) in self.diagrams.iter_mut().enumerate() {
            if let Err(err) = diagram.decode(&self.codec).map(|_| ()) {
                tracing::debug!(index, id = diagram.id(), error = %err, "diagram payload rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn push(&mut self, diagram: Diagram) {
        self.diagrams.push(diagram);
    }

    pub fn to_xml(&self) -> CodecResult<Element> {
        let mut el = Element::new(FILE_TAG);
        el.attrs = self.attrs.clone();
        for diagram in &self.diagrams {
            el.children.push(diagram.to_xml(&self.codec)?);
        }
        Ok(el)
    }

    pub fn to_xml_string(&self) -> CodecResult<String> {
        self.to_xml()?.to_xml_string().map_err(CodecError::Xml)
    }

    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        self.to_xml_string().map(String::into_bytes)
    }
}

impl PartialEq for MxFile {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs && self.diagrams == other.diagrams
    }
}
