// Tile-grid payload codec for the `<data>` element.
//
// Three encodings (inline <tile> children, CSV text, base64 text) crossed
// with three compression schemes (none, zlib, gzip; base64 only). Byte
// order in the binary form is fixed little-endian 4-byte groups regardless
// of host endianness.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io::{Read, Write};

use crate::model::{Map, Tile};

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("TMX encoding type is not supported: {0}")]
    UnsupportedEncoding(String),

    #[error("TMX compression type is not supported: {0}")]
    UnsupportedCompression(String),

    #[error("malformed tile data payload: {0}")]
    MalformedPayload(String),
}

pub type DataResult<T> = Result<T, DataError>;

/// Encoding of a `<data>` payload. `Xml` is the attribute-absent form where
/// tiles are individual `<tile gid="..">` child elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Xml,
    Csv,
    Base64,
}

impl Encoding {
    pub fn from_attr(value: Option<&str>) -> DataResult<Encoding> {
        match value {
            None | Some("xml") => Ok(Encoding::Xml),
            Some("csv") => Ok(Encoding::Csv),
            Some("base64") => Ok(Encoding::Base64),
            Some(other) => Err(DataError::UnsupportedEncoding(other.to_string())),
        }
    }

    /// Attribute form; `None` when the attribute is omitted from output.
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            Encoding::Xml => None,
            Encoding::Csv => Some("csv"),
            Encoding::Base64 => Some("base64"),
        }
    }
}

/// Compression of a base64 `<data>` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Zlib,
    Gzip,
}

impl Compression {
    pub fn from_attr(value: Option<&str>) -> DataResult<Compression> {
        match value {
            None => Ok(Compression::None),
            Some("zlib") => Ok(Compression::Zlib),
            Some("gzip") => Ok(Compression::Gzip),
            Some(other) => Err(DataError::UnsupportedCompression(other.to_string())),
        }
    }

    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Zlib => Some("zlib"),
            Compression::Gzip => Some("gzip"),
        }
    }
}

/// Payload as read from the XML: element text for csv/base64, ordered child
/// gids for the inline-XML form.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Text(String),
    Tiles(Vec<u32>),
}

/// Payload produced by [`encode`]; mirrors [`RawPayload`].
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedPayload {
    Text(String),
    Tiles(Vec<u32>),
}

/// Decode a raw payload into the flat row-major GID sequence of length
/// `width * height`. Pure; fails atomically.
pub fn decode(
    raw: &RawPayload,
    encoding: Encoding,
    compression: Compression,
    width: u32,
    height: u32,
) -> DataResult<Vec<u32>> {
    let tiles = match (encoding, raw) {
        (Encoding::Xml, RawPayload::Tiles(gids)) => {
            require_uncompressed(compression)?;
            gids.clone()
        }
        (Encoding::Csv, RawPayload::Text(text)) => {
            require_uncompressed(compression)?;
            decode_csv(text)?
        }
        (Encoding::Base64, RawPayload::Text(text)) => decode_base64(text, compression)?,
        _ => {
            return Err(DataError::MalformedPayload(
                "payload form does not match the declared encoding".to_string(),
            ))
        }
    };
    let expected = (width as usize) * (height as usize);
    if tiles.len() != expected {
        return Err(DataError::MalformedPayload(format!(
            "expected {expected} tile ids for a {width}x{height} grid, found {}",
            tiles.len()
        )));
    }
    Ok(tiles)
}

/// Encode a flat row-major GID sequence; exact inverse of [`decode`].
pub fn encode(
    tiles: &[u32],
    width: u32,
    height: u32,
    encoding: Encoding,
    compression: Compression,
) -> DataResult<EncodedPayload> {
    let expected = (width as usize) * (height as usize);
    if tiles.len() != expected {
        return Err(DataError::MalformedPayload(format!(
            "expected {expected} tile ids for a {width}x{height} grid, found {}",
            tiles.len()
        )));
    }
    match encoding {
        Encoding::Xml => {
            require_uncompressed(compression)?;
            Ok(EncodedPayload::Tiles(tiles.to_vec()))
        }
        Encoding::Csv => {
            require_uncompressed(compression)?;
            let mut text = String::new();
            if width > 0 {
                for row in tiles.chunks(width as usize) {
                    text.push('\n');
                    let line: Vec<String> = row.iter().map(u32::to_string).collect();
                    text.push_str(&line.join(","));
                }
            }
            text.push('\n');
            Ok(EncodedPayload::Text(text))
        }
        Encoding::Base64 => {
            let mut bytes = Vec::with_capacity(tiles.len() * 4);
            for gid in tiles {
                bytes.extend_from_slice(&gid.to_le_bytes());
            }
            let bytes = compress(bytes, compression)?;
            Ok(EncodedPayload::Text(STANDARD.encode(bytes)))
        }
    }
}

fn require_uncompressed(compression: Compression) -> DataResult<()> {
    match compression.as_attr() {
        None => Ok(()),
        Some(name) => Err(DataError::UnsupportedCompression(name.to_string())),
    }
}

// Rows are newline-separated and may carry a trailing comma per row, so
// whitespace separates fields just like commas do.
fn decode_csv(text: &str) -> DataResult<Vec<u32>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<u32>()
                .map_err(|_| DataError::MalformedPayload(format!("invalid CSV tile id: {field:?}")))
        })
        .collect()
}

fn decode_base64(text: &str, compression: Compression) -> DataResult<Vec<u32>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| DataError::MalformedPayload(format!("base64 decode failed: {e}")))?;
    let bytes = decompress(bytes, compression)?;
    if bytes.len() % 4 != 0 {
        return Err(DataError::MalformedPayload(format!(
            "decoded byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn decompress(bytes: Vec<u8>, compression: Compression) -> DataResult<Vec<u8>> {
    let mut out = Vec::new();
    match compression {
        Compression::None => return Ok(bytes),
        Compression::Zlib => ZlibDecoder::new(&bytes[..]).read_to_end(&mut out),
        Compression::Gzip => GzDecoder::new(&bytes[..]).read_to_end(&mut out),
    }
    .map_err(|e| DataError::MalformedPayload(format!("decompression failed: {e}")))?;
    Ok(out)
}

fn compress(bytes: Vec<u8>, compression: Compression) -> DataResult<Vec<u8>> {
    let result = match compression {
        Compression::None => return Ok(bytes),
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&bytes).and_then(|_| encoder.finish())
        }
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&bytes).and_then(|_| encoder.finish())
        }
    };
    result.map_err(|e| DataError::MalformedPayload(format!("compression failed: {e}")))
}

/// The `<data>` node of a tile layer: declared encoding/compression, the
/// raw payload as read (for lossless passthrough), and the decoded flat
/// grid. Grid dimensions come from the parent layer and are captured here
/// at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub encoding: Encoding,
    pub compression: Compression,
    pub src: RawPayload,
    pub tiles: Vec<u32>,
    pub width: u32,
    pub height: u32,
}

impl Data {
    /// Build a node by decoding the raw payload. Fails without constructing
    /// anything when the payload is invalid.
    pub fn from_raw(
        src: RawPayload,
        encoding: Encoding,
        compression: Compression,
        width: u32,
        height: u32,
    ) -> DataResult<Data> {
        let tiles = decode(&src, encoding, compression, width, height)?;
        Ok(Data {
            encoding,
            compression,
            src,
            tiles,
            width,
            height,
        })
    }

    /// Row-major cell access: `(row, col)` maps to `tiles[row * width + col]`.
    pub fn get(&self, row: u32, col: u32) -> Option<u32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        // Index in usize; the product can exceed u32 on large grids.
        self.tiles
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    /// Iterate the grid as rows of `width` cells.
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.tiles.chunks(self.width.max(1) as usize)
    }

    /// Resolve the tile at a cell through the document's tileset table.
    /// Empty cells (GID 0) yield `None`.
    pub fn tile_at<'a>(&self, map: &'a Map, row: u32, col: u32) -> Option<&'a Tile> {
        let gid = self.get(row, col)?;
        map.resolve_gid(gid).and_then(|r| map.tile(r))
    }

    /// Encode for output. When the target encoding/compression (after
    /// applying overrides) equals what was read, the stored raw payload is
    /// re-emitted verbatim, guaranteeing byte-for-byte round trips of
    /// untouched maps.
    pub fn encode_with(
        &self,
        encoding: Option<Encoding>,
        compression: Option<Compression>,
    ) -> DataResult<EncodedPayload> {
        let target_encoding = encoding.unwrap_or(self.encoding);
        let target_compression = compression.unwrap_or(self.compression);
        if target_encoding == self.encoding && target_compression == self.compression {
            return Ok(match &self.src {
                RawPayload::Text(text) => EncodedPayload::Text(text.clone()),
                RawPayload::Tiles(gids) => EncodedPayload::Tiles(gids.clone()),
            });
        }
        encode(&self.tiles, self.width, self.height, target_encoding, target_compression)
    }
}
