pub mod data;
pub mod json;
pub mod model;
pub mod parse;
pub mod write;

pub use data::{
    decode, encode, Compression, Data, DataError, DataResult, EncodedPayload, Encoding, RawPayload,
};
pub use json::map_to_json;
pub use model::{Layer, Map, Object, Shape, Tile, TileRef, Tileset};
pub use parse::{load_map, parse_map, parse_tileset_document, ParseError, ParseResult};
pub use write::{write_map, WriteError, WriteOptions, WriteResult};
