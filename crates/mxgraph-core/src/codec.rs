// Embedded diagram payload: base64(raw_deflate(percent_encode(utf8(xml)))).
//
// "Raw" deflate means no zlib or gzip framing. The percent-encoding set is the
// one of JavaScript's encodeURIComponent. Both must match draw.io exactly or
// the tool will not open the file.

use crate::error::{CodecError, CodecResult};
use crate::graph::GraphModel;
use crate::xml::Element;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Deserializer};
use std::io::{Read, Write};
use std::str;

const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MAX_COMPRESSION_LEVEL: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodecConfig {
    /// Deflate level, 0-9.
    #[serde(deserialize_with = "compression_level")]
    pub compression_level: u32,
}

fn compression_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let level = u32::deserialize(deserializer)?;
    if level > MAX_COMPRESSION_LEVEL {
        return Err(serde::de::Error::custom(format!(
            "compressionLevel must be 0-{MAX_COMPRESSION_LEVEL}, got {level}"
        )));
    }
    Ok(level)
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression_level: Compression::default().level(),
        }
    }
}

impl CodecConfig {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The configured level, rejected when it is outside 0-9.
    pub fn compression(&self) -> CodecResult<Compression> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(CodecError::CompressionLevel(self.compression_level));
        }
        Ok(Compression::new(self.compression_level))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagramCodec {
    config: CodecConfig,
}

impl DiagramCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Payload text to XML element. Whitespace inside the payload (line
    /// wrapping in hand-edited files) is ignored.
    pub fn decode(&self, payload: &str) -> CodecResult<Element> {
        let xml = self.decode_text(payload)?;
        Element::parse(&xml).map_err(CodecError::Xml)
    }

    pub fn decode_text(&self, payload: &str) -> CodecResult<String> {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let compressed = STANDARD.decode(compact)?;

        let mut inflated = Vec::new();
        DeflateDecoder::new(&compressed[..])
            .read_to_end(&mut inflated)
            .map_err(CodecError::Inflate)?;

        let escaped = str::from_utf8(&inflated)?;
        let xml = percent_decode_str(escaped)
            .decode_utf8()
            .map_err(CodecError::PercentDecode)?;

        tracing::debug!(
            payload_len = payload.len(),
            inflated_len = inflated.len(),
            xml_len = xml.len(),
            "decoded diagram payload"
        );
        Ok(xml.into_owned())
    }

    pub fn encode(&self, element: &Element) -> CodecResult<String> {
        let xml = element.to_xml_string().map_err(CodecError::Xml)?;
        self.encode_text(&xml)
    }

    pub fn encode_text(&self, xml: &str) -> CodecResult<String> {
        let escaped = utf8_percent_encode(xml, ENCODE_SET).to_string();

        let level = self.config.compression()?;
        let mut encoder = DeflateEncoder::new(Vec::new(), level);
        encoder
            .write_all(escaped.as_bytes())
            .map_err(CodecError::Deflate)?;
        let compressed = encoder.finish().map_err(CodecError::Deflate)?;

        let payload = STANDARD.encode(&compressed);
        tracing::debug!(
            xml_len = xml.len(),
            deflated_len = compressed.len(),
            payload_len = payload.len(),
            "encoded diagram payload"
        );
        Ok(payload)
    }

    pub fn decode_model(&self, payload: &str) -> CodecResult<GraphModel> {
        let element = self.decode(payload)?;
        GraphModel::from_xml(&element).map_err(CodecError::Model)
    }

    pub fn encode_model(&self, model: &GraphModel) -> CodecResult<String> {
        let element = model.to_xml().map_err(|e| CodecError::Model(e.into()))?;
        self.encode(&element)
    }
}
