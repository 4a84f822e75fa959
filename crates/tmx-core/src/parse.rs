// quick-xml 0.38 compatible parser for TMX map documents.
// - Parses <map> with tilesets, layers, image layers and object groups
// - Delegates <data> payloads to the tile-data codec, preserving the raw
//   text / child records for lossless passthrough on write
// - Resolves external .tsx tilesets relative to the map file's directory,
//   flattening them into the in-memory tileset once at load time
//
// Trimming policy:
// - DO NOT globally trim text events; <data> payload text is preserved
//   exactly as read so a matching-encoding write is byte-identical
// - Whitespace handling for csv/base64 happens inside the codec

use crate::data::{Compression, Data, DataError, Encoding, RawPayload};
use crate::model::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),

    #[error("invalid number for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unexpected structure: {0}")]
    Structure(String),

    #[error("tile data error: {0}")]
    Data(#[from] DataError),

    #[error("cannot resolve external tileset {path}: {source}")]
    UnresolvedReference {
        path: String,
        source: std::io::Error,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a TMX document from a string. External `.tsx` tileset references
/// are left unresolved (there is no directory to resolve them against);
/// use [`load_map`] when the map comes from a file.
pub fn parse_map(xml: &str) -> ParseResult<Map> {
    parse_document(xml, None)
}

/// Read and parse a `.tmx` file, resolving external tilesets relative to
/// the file's directory.
pub fn load_map<P: AsRef<Path>>(path: P) -> ParseResult<Map> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|err| ParseError::UnresolvedReference {
        path: path.display().to_string(),
        source: err,
    })?;
    parse_document(&xml, path.parent())
}

/// Parse a standalone `.tsx` tileset document. The returned tileset has no
/// `firstgid` of its own (it defaults to 0 until merged into a map).
pub fn parse_tileset_document(xml: &str) -> ParseResult<Tileset> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name_start(&e)?;
                if name != "tileset" {
                    return Err(ParseError::Structure(format!(
                        "expected <tileset> root element, found <{name}>"
                    )));
                }
                let mut tileset = tileset_from_attrs(&e)?;
                fill_tileset(&mut reader, &mut tileset)?;
                return Ok(tileset);
            }
            Event::Empty(e) => {
                let name = local_name_start(&e)?;
                if name != "tileset" {
                    return Err(ParseError::Structure(format!(
                        "expected <tileset> root element, found <{name}>"
                    )));
                }
                return tileset_from_attrs(&e);
            }
            Event::Eof => {
                return Err(ParseError::Structure(
                    "no <tileset> root element found".to_string(),
                ))
            }
            _ => {}
        }
    }
}

fn parse_document(xml: &str, base: Option<&Path>) -> ParseResult<Map> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name_start(&e)?;
                if name != "map" {
                    return Err(ParseError::Structure(format!(
                        "expected <map> root element, found <{name}>"
                    )));
                }
                return parse_map_element(&mut reader, &e, base);
            }
            Event::Eof => {
                return Err(ParseError::Structure(
                    "no <map> root element found".to_string(),
                ))
            }
            _ => {}
        }
    }
}

fn parse_map_element<'a>(
    reader: &mut Reader<&'a [u8]>,
    e: &BytesStart<'a>,
    base: Option<&Path>,
) -> ParseResult<Map> {
    let attrs = attrs_to_map(e)?;
    let mut map = Map {
        version: attrs.get("version").cloned(),
        orientation: attrs.get("orientation").cloned(),
        renderorder: attrs.get("renderorder").cloned(),
        width: req_u32(&attrs, "width", "map@width")?,
        height: req_u32(&attrs, "height", "map@height")?,
        tilewidth: parse_u32_opt(attrs.get("tilewidth"), "tilewidth")?,
        tileheight: parse_u32_opt(attrs.get("tileheight"), "tileheight")?,
        hexsidelength: parse_u32_opt(attrs.get("hexsidelength"), "hexsidelength")?,
        staggeraxis: attrs.get("staggeraxis").cloned(),
        staggerindex: attrs.get("staggerindex").cloned(),
        backgroundcolor: attrs.get("backgroundcolor").cloned(),
        nextobjectid: parse_u32_opt(attrs.get("nextobjectid"), "nextobjectid")?,
        properties: None,
        tilesets: Vec::new(),
        layers: Vec::new(),
    };

    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "properties" => map.properties = Some(parse_properties(reader)?),
                    "tileset" => {
                        let mut tileset = tileset_from_attrs(&child)?;
                        fill_tileset(reader, &mut tileset)?;
                        resolve_external_tileset(&mut tileset, base)?;
                        map.tilesets.push(tileset);
                    }
                    "layer" => {
                        let layer = parse_tile_layer(reader, &child, map.width, map.height)?;
                        map.layers.push(Layer::Tiles(layer));
                    }
                    "imagelayer" => {
                        let layer = parse_imagelayer(reader, &child)?;
                        map.layers.push(Layer::Image(layer));
                    }
                    "objectgroup" => {
                        let group = parse_objectgroup(reader, &child, &map.tilesets)?;
                        map.layers.push(Layer::Objects(group));
                    }
                    _ => skip_element(reader, &child)?,
                }
            }
            Event::Empty(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "tileset" => {
                        let mut tileset = tileset_from_attrs(&child)?;
                        resolve_external_tileset(&mut tileset, base)?;
                        map.tilesets.push(tileset);
                    }
                    "layer" => {
                        return Err(ParseError::Structure(
                            "<layer> is missing its <data> element".into(),
                        ))
                    }
                    "imagelayer" => map.layers.push(Layer::Image(imagelayer_from_attrs(&child)?)),
                    "objectgroup" => {
                        map.layers.push(Layer::Objects(objectgroup_from_attrs(&child)?))
                    }
                    _ => {}
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("map")),
            _ => {}
        }
    }
    Ok(map)
}

fn parse_properties(reader: &mut Reader<&[u8]>) -> ParseResult<Properties> {
    let mut properties = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(child) => {
                if local_name_start(&child)? == "property" {
                    properties.push(property_from_attrs(&child)?);
                }
            }
            Event::Start(child) => {
                if local_name_start(&child)? == "property" {
                    properties.push(property_from_attrs(&child)?);
                }
                skip_element(reader, &child)?;
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("properties")),
            _ => {}
        }
    }
    Ok(Properties { properties })
}

fn property_from_attrs(e: &BytesStart<'_>) -> ParseResult<Property> {
    let attrs = attrs_to_map(e)?;
    Ok(Property {
        name: attrs
            .get("name")
            .cloned()
            .ok_or(ParseError::MissingAttr("property@name"))?,
        kind: PropertyKind::from_attr(attrs.get("type").map(String::as_str)),
        value: attrs.get("value").cloned().unwrap_or_default(),
    })
}

fn tileset_from_attrs(e: &BytesStart<'_>) -> ParseResult<Tileset> {
    let attrs = attrs_to_map(e)?;
    Ok(Tileset {
        firstgid: parse_u32_opt(attrs.get("firstgid"), "firstgid")?.unwrap_or(0),
        source: attrs.get("source").cloned(),
        name: attrs.get("name").cloned(),
        tilewidth: parse_u32_opt(attrs.get("tilewidth"), "tilewidth")?,
        tileheight: parse_u32_opt(attrs.get("tileheight"), "tileheight")?,
        spacing: parse_u32_opt(attrs.get("spacing"), "spacing")?,
        margin: parse_u32_opt(attrs.get("margin"), "margin")?,
        tilecount: parse_u32_opt(attrs.get("tilecount"), "tilecount")?,
        columns: parse_u32_opt(attrs.get("columns"), "columns")?,
        ..Tileset::default()
    })
}

fn fill_tileset(reader: &mut Reader<&[u8]>, tileset: &mut Tileset) -> ParseResult<()> {
    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "tileoffset" => {
                        tileset.tileoffset = Some(tileoffset_from_attrs(&child)?);
                        skip_element(reader, &child)?;
                    }
                    "properties" => tileset.properties = Some(parse_properties(reader)?),
                    "terraintypes" => tileset.terraintypes = Some(parse_terraintypes(reader)?),
                    "image" => {
                        tileset.image = Some(image_from_attrs(&child)?);
                        skip_element(reader, &child)?;
                    }
                    "tile" => tileset.tiles.push(parse_tile(reader, &child)?),
                    _ => skip_element(reader, &child)?,
                }
            }
            Event::Empty(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "tileoffset" => tileset.tileoffset = Some(tileoffset_from_attrs(&child)?),
                    "image" => tileset.image = Some(image_from_attrs(&child)?),
                    "tile" => tileset.tiles.push(tile_from_attrs(&child)?),
                    _ => {}
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("tileset")),
            _ => {}
        }
    }
    Ok(())
}

fn tileoffset_from_attrs(e: &BytesStart<'_>) -> ParseResult<Tileoffset> {
    let attrs = attrs_to_map(e)?;
    Ok(Tileoffset {
        x: parse_i32_opt(attrs.get("x"), "x")?.unwrap_or(0),
        y: parse_i32_opt(attrs.get("y"), "y")?.unwrap_or(0),
    })
}

fn parse_terraintypes(reader: &mut Reader<&[u8]>) -> ParseResult<Terraintypes> {
    let mut terrains = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(child) => {
                if local_name_start(&child)? == "terrain" {
                    terrains.push(terrain_from_attrs(&child)?);
                }
            }
            Event::Start(child) => {
                if local_name_start(&child)? == "terrain" {
                    terrains.push(parse_terrain(reader, &child)?);
                } else {
                    skip_element(reader, &child)?;
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("terraintypes")),
            _ => {}
        }
    }
    Ok(Terraintypes { terrains })
}

fn terrain_from_attrs(e: &BytesStart<'_>) -> ParseResult<Terrain> {
    let attrs = attrs_to_map(e)?;
    Ok(Terrain {
        name: attrs.get("name").cloned(),
        tile: parse_u32_opt(attrs.get("tile"), "tile")?,
        properties: None,
    })
}

fn parse_terrain<'a>(reader: &mut Reader<&'a [u8]>, e: &BytesStart<'a>) -> ParseResult<Terrain> {
    let mut terrain = terrain_from_attrs(e)?;
    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                if local_name_start(&child)? == "properties" {
                    terrain.properties = Some(parse_properties(reader)?);
                } else {
                    skip_element(reader, &child)?;
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("terrain")),
            _ => {}
        }
    }
    Ok(terrain)
}

fn tile_from_attrs(e: &BytesStart<'_>) -> ParseResult<Tile> {
    let attrs = attrs_to_map(e)?;
    Ok(Tile {
        id: req_u32(&attrs, "id", "tile@id")?,
        terrain: attrs.get("terrain").cloned(),
        probability: parse_f64_opt(attrs.get("probability"), "probability")?,
        properties: None,
        image: None,
        animation: None,
    })
}

fn parse_tile<'a>(reader: &mut Reader<&'a [u8]>, e: &BytesStart<'a>) -> ParseResult<Tile> {
    let mut tile = tile_from_attrs(e)?;
    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "properties" => tile.properties = Some(parse_properties(reader)?),
                    "image" => {
                        tile.image = Some(image_from_attrs(&child)?);
                        skip_element(reader, &child)?;
                    }
                    "animation" => tile.animation = Some(parse_animation(reader)?),
                    _ => skip_element(reader, &child)?,
                }
            }
            Event::Empty(child) => {
                if local_name_start(&child)? == "image" {
                    tile.image = Some(image_from_attrs(&child)?);
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("tile")),
            _ => {}
        }
    }
    Ok(tile)
}

fn image_from_attrs(e: &BytesStart<'_>) -> ParseResult<Image> {
    let attrs = attrs_to_map(e)?;
    Ok(Image {
        format: attrs.get("format").cloned(),
        source: attrs.get("source").cloned(),
        trans: attrs.get("trans").cloned(),
        width: parse_u32_opt(attrs.get("width"), "width")?,
        height: parse_u32_opt(attrs.get("height"), "height")?,
    })
}

fn parse_animation(reader: &mut Reader<&[u8]>) -> ParseResult<Animation> {
    let mut frames = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(child) => {
                if local_name_start(&child)? == "frame" {
                    frames.push(frame_from_attrs(&child)?);
                }
            }
            Event::Start(child) => {
                if local_name_start(&child)? == "frame" {
                    frames.push(frame_from_attrs(&child)?);
                }
                skip_element(reader, &child)?;
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("animation")),
            _ => {}
        }
    }
    Ok(Animation { frames })
}

fn frame_from_attrs(e: &BytesStart<'_>) -> ParseResult<Frame> {
    let attrs = attrs_to_map(e)?;
    Ok(Frame {
        tileid: req_u32(&attrs, "tileid", "frame@tileid")?,
        duration: req_u32(&attrs, "duration", "frame@duration")?,
    })
}

fn parse_tile_layer<'a>(
    reader: &mut Reader<&'a [u8]>,
    e: &BytesStart<'a>,
    map_width: u32,
    map_height: u32,
) -> ParseResult<TileLayer> {
    let attrs = attrs_to_map(e)?;
    let width = parse_u32_opt(attrs.get("width"), "width")?;
    let height = parse_u32_opt(attrs.get("height"), "height")?;
    // Grid dimensions inherit from the map when the layer omits them.
    let grid_width = width.unwrap_or(map_width);
    let grid_height = height.unwrap_or(map_height);

    let mut properties = None;
    let mut data = None;
    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "properties" => properties = Some(parse_properties(reader)?),
                    "data" => data = Some(parse_data(reader, &child, grid_width, grid_height)?),
                    _ => skip_element(reader, &child)?,
                }
            }
            Event::Empty(child) => {
                if local_name_start(&child)? == "data" {
                    data = Some(data_from_attrs(&child, grid_width, grid_height)?);
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("layer")),
            _ => {}
        }
    }
    let data =
        data.ok_or_else(|| ParseError::Structure("<layer> is missing its <data> element".into()))?;

    Ok(TileLayer {
        name: attrs.get("name").cloned(),
        x: parse_i32_opt(attrs.get("x"), "x")?,
        y: parse_i32_opt(attrs.get("y"), "y")?,
        width,
        height,
        opacity: parse_f64_opt(attrs.get("opacity"), "opacity")?,
        visible: parse_bool_opt(attrs.get("visible")),
        offsetx: parse_f64_opt(attrs.get("offsetx"), "offsetx")?,
        offsety: parse_f64_opt(attrs.get("offsety"), "offsety")?,
        properties,
        data,
    })
}

fn data_declared(e: &BytesStart<'_>) -> ParseResult<(Encoding, Compression)> {
    let attrs = attrs_to_map(e)?;
    let encoding = Encoding::from_attr(attrs.get("encoding").map(String::as_str))?;
    let compression = Compression::from_attr(attrs.get("compression").map(String::as_str))?;
    Ok((encoding, compression))
}

fn data_from_attrs(e: &BytesStart<'_>, width: u32, height: u32) -> ParseResult<Data> {
    let (encoding, compression) = data_declared(e)?;
    let src = match encoding {
        Encoding::Xml => RawPayload::Tiles(Vec::new()),
        _ => RawPayload::Text(String::new()),
    };
    Ok(Data::from_raw(src, encoding, compression, width, height)?)
}

fn parse_data<'a>(
    reader: &mut Reader<&'a [u8]>,
    e: &BytesStart<'a>,
    width: u32,
    height: u32,
) -> ParseResult<Data> {
    let (encoding, compression) = data_declared(e)?;

    // Text is preserved exactly as read (no trimming) so that a write with
    // matching settings can re-emit it verbatim.
    let mut text = String::new();
    let mut gids = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.decode()?),
            Event::CData(c) => text.push_str(&c.decode()?),
            Event::Empty(child) => {
                if local_name_start(&child)? == "tile" {
                    gids.push(gid_from_attrs(&child)?);
                }
            }
            Event::Start(child) => {
                if local_name_start(&child)? == "tile" {
                    gids.push(gid_from_attrs(&child)?);
                }
                skip_element(reader, &child)?;
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("data")),
            _ => {}
        }
    }

    let src = match encoding {
        Encoding::Xml => RawPayload::Tiles(gids),
        _ => RawPayload::Text(text),
    };
    Ok(Data::from_raw(src, encoding, compression, width, height)?)
}

fn gid_from_attrs(e: &BytesStart<'_>) -> ParseResult<u32> {
    let attrs = attrs_to_map(e)?;
    req_u32(&attrs, "gid", "tile@gid")
}

fn imagelayer_from_attrs(e: &BytesStart<'_>) -> ParseResult<ImageLayer> {
    let attrs = attrs_to_map(e)?;
    Ok(ImageLayer {
        name: attrs.get("name").cloned(),
        offsetx: parse_f64_opt(attrs.get("offsetx"), "offsetx")?,
        offsety: parse_f64_opt(attrs.get("offsety"), "offsety")?,
        x: parse_i32_opt(attrs.get("x"), "x")?,
        y: parse_i32_opt(attrs.get("y"), "y")?,
        width: parse_u32_opt(attrs.get("width"), "width")?,
        height: parse_u32_opt(attrs.get("height"), "height")?,
        opacity: parse_f64_opt(attrs.get("opacity"), "opacity")?,
        visible: parse_bool_opt(attrs.get("visible")),
        properties: None,
        image: None,
    })
}

fn parse_imagelayer<'a>(
    reader: &mut Reader<&'a [u8]>,
    e: &BytesStart<'a>,
) -> ParseResult<ImageLayer> {
    let mut layer = imagelayer_from_attrs(e)?;
    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "properties" => layer.properties = Some(parse_properties(reader)?),
                    "image" => {
                        layer.image = Some(image_from_attrs(&child)?);
                        skip_element(reader, &child)?;
                    }
                    _ => skip_element(reader, &child)?,
                }
            }
            Event::Empty(child) => {
                if local_name_start(&child)? == "image" {
                    layer.image = Some(image_from_attrs(&child)?);
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("imagelayer")),
            _ => {}
        }
    }
    Ok(layer)
}

fn objectgroup_from_attrs(e: &BytesStart<'_>) -> ParseResult<ObjectGroup> {
    let attrs = attrs_to_map(e)?;
    Ok(ObjectGroup {
        name: attrs.get("name").cloned(),
        color: attrs.get("color").cloned(),
        x: parse_i32_opt(attrs.get("x"), "x")?,
        y: parse_i32_opt(attrs.get("y"), "y")?,
        width: parse_u32_opt(attrs.get("width"), "width")?,
        height: parse_u32_opt(attrs.get("height"), "height")?,
        opacity: parse_f64_opt(attrs.get("opacity"), "opacity")?,
        visible: parse_bool_opt(attrs.get("visible")),
        offsetx: parse_f64_opt(attrs.get("offsetx"), "offsetx")?,
        offsety: parse_f64_opt(attrs.get("offsety"), "offsety")?,
        draworder: attrs
            .get("draworder")
            .cloned()
            .unwrap_or_else(|| DRAWORDER_DEFAULT.to_string()),
        properties: None,
        objects: Vec::new(),
    })
}

fn parse_objectgroup<'a>(
    reader: &mut Reader<&'a [u8]>,
    e: &BytesStart<'a>,
    tilesets: &[Tileset],
) -> ParseResult<ObjectGroup> {
    let mut group = objectgroup_from_attrs(e)?;
    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "properties" => group.properties = Some(parse_properties(reader)?),
                    "object" => group.objects.push(parse_object(reader, &child, tilesets)?),
                    _ => skip_element(reader, &child)?,
                }
            }
            Event::Empty(child) => {
                if local_name_start(&child)? == "object" {
                    let mut object = object_from_attrs(&child)?;
                    object.shape = decide_shape(false, None, None, object.gid, tilesets);
                    group.objects.push(object);
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("objectgroup")),
            _ => {}
        }
    }
    Ok(group)
}

fn object_from_attrs(e: &BytesStart<'_>) -> ParseResult<Object> {
    let attrs = attrs_to_map(e)?;
    Ok(Object {
        id: parse_u32_opt(attrs.get("id"), "id")?,
        name: attrs.get("name").cloned(),
        kind: attrs.get("type").cloned(),
        x: parse_i32_opt(attrs.get("x"), "x")?,
        y: parse_i32_opt(attrs.get("y"), "y")?,
        width: parse_u32_opt(attrs.get("width"), "width")?,
        height: parse_u32_opt(attrs.get("height"), "height")?,
        rotation: parse_f64_opt(attrs.get("rotation"), "rotation")?,
        gid: parse_u32_opt(attrs.get("gid"), "gid")?,
        visible: parse_bool_opt(attrs.get("visible")),
        properties: None,
        shape: Shape::None,
    })
}

fn parse_object<'a>(
    reader: &mut Reader<&'a [u8]>,
    e: &BytesStart<'a>,
    tilesets: &[Tileset],
) -> ParseResult<Object> {
    let mut object = object_from_attrs(e)?;
    let mut ellipse = false;
    let mut polygon = None;
    let mut polyline = None;
    loop {
        match reader.read_event()? {
            Event::Empty(child) => match local_name_start(&child)?.as_str() {
                "ellipse" => ellipse = true,
                "polygon" => polygon = Some(points_from_attrs(&child)?),
                "polyline" => polyline = Some(points_from_attrs(&child)?),
                _ => {}
            },
            Event::Start(child) => {
                let name = local_name_start(&child)?;
                match name.as_str() {
                    "properties" => {
                        object.properties = Some(parse_properties(reader)?);
                        continue;
                    }
                    "ellipse" => ellipse = true,
                    "polygon" => polygon = Some(points_from_attrs(&child)?),
                    "polyline" => polyline = Some(points_from_attrs(&child)?),
                    _ => {}
                }
                skip_element(reader, &child)?;
            }
            Event::End(_) => break,
            Event::Eof => return Err(eof_in("object")),
            _ => {}
        }
    }
    object.shape = decide_shape(ellipse, polygon, polyline, object.gid, tilesets);
    Ok(object)
}

fn decide_shape(
    ellipse: bool,
    polygon: Option<Points>,
    polyline: Option<Points>,
    gid: Option<u32>,
    tilesets: &[Tileset],
) -> Shape {
    if ellipse {
        Shape::Ellipse
    } else if let Some(points) = polygon {
        Shape::Polygon(points)
    } else if let Some(points) = polyline {
        Shape::Polyline(points)
    } else if let Some(gid) = gid {
        match resolve_gid_in(tilesets, gid) {
            Some(tile_ref) => Shape::Tile(tile_ref),
            None => Shape::None,
        }
    } else {
        Shape::Rectangle
    }
}

fn points_from_attrs(e: &BytesStart<'_>) -> ParseResult<Points> {
    let attrs = attrs_to_map(e)?;
    let raw = attrs.get("points").cloned().unwrap_or_default();
    let mut positions = Vec::new();
    for pair in raw.split_whitespace() {
        let (x, y) = pair
            .split_once(',')
            .ok_or_else(|| ParseError::InvalidNumber {
                field: "points",
                value: pair.to_string(),
            })?;
        let x = x.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
            field: "points",
            value: pair.to_string(),
        })?;
        let y = y.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
            field: "points",
            value: pair.to_string(),
        })?;
        positions.push((x, y));
    }
    Ok(Points { raw, positions })
}

fn resolve_external_tileset(tileset: &mut Tileset, base: Option<&Path>) -> ParseResult<()> {
    let Some(source) = tileset.source.clone() else {
        return Ok(());
    };
    if !source.to_ascii_lowercase().ends_with(".tsx") {
        return Ok(());
    }
    let Some(base) = base else {
        // No file context; the reference stays unresolved.
        return Ok(());
    };
    let path = base.join(&source);
    let xml = fs::read_to_string(&path).map_err(|err| ParseError::UnresolvedReference {
        path: path.display().to_string(),
        source: err,
    })?;
    let external = parse_tileset_document(&xml)?;
    merge_external(tileset, external);
    Ok(())
}

// Flatten an external tileset's attributes and children over the local
// reference; firstgid and source stay with the map's element.
fn merge_external(tileset: &mut Tileset, external: Tileset) {
    if external.name.is_some() {
        tileset.name = external.name;
    }
    if external.tilewidth.is_some() {
        tileset.tilewidth = external.tilewidth;
    }
    if external.tileheight.is_some() {
        tileset.tileheight = external.tileheight;
    }
    if external.spacing.is_some() {
        tileset.spacing = external.spacing;
    }
    if external.margin.is_some() {
        tileset.margin = external.margin;
    }
    if external.tilecount.is_some() {
        tileset.tilecount = external.tilecount;
    }
    if external.columns.is_some() {
        tileset.columns = external.columns;
    }
    if external.tileoffset.is_some() {
        tileset.tileoffset = external.tileoffset;
    }
    if external.properties.is_some() {
        tileset.properties = external.properties;
    }
    if external.terraintypes.is_some() {
        tileset.terraintypes = external.terraintypes;
    }
    if external.image.is_some() {
        tileset.image = external.image;
    }
    if !external.tiles.is_empty() {
        tileset.tiles = external.tiles;
    }
}

fn skip_element<'a>(reader: &mut Reader<&'a [u8]>, e: &BytesStart<'a>) -> ParseResult<()> {
    reader.read_to_end(e.name())?;
    Ok(())
}

fn eof_in(tag: &str) -> ParseError {
    ParseError::Structure(format!("unexpected end of document inside <{tag}>"))
}

fn attrs_to_map(e: &BytesStart<'_>) -> ParseResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for a in e.attributes() {
        let a = a?; // AttrError -> ParseError via #[from]
        let key = str::from_utf8(a.key.as_ref())?.to_string();
        let val = a.unescape_value()?.to_string();
        out.insert(key, val);
    }
    Ok(out)
}

fn local_name_start(e: &BytesStart<'_>) -> ParseResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}

fn parse_bool_opt(v: Option<&String>) -> Option<bool> {
    let s = v?;
    match s.as_str() {
        "1" | "true" | "TRUE" | "True" => Some(true),
        "0" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn req_u32(
    attrs: &BTreeMap<String, String>,
    key: &str,
    field: &'static str,
) -> ParseResult<u32> {
    let value = attrs.get(key).ok_or(ParseError::MissingAttr(field))?;
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidNumber {
            field,
            value: value.clone(),
        })
}

fn parse_u32_opt(v: Option<&String>, field: &'static str) -> ParseResult<Option<u32>> {
    let Some(s) = v else { return Ok(None) };
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = trimmed
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidNumber {
            field,
            value: s.clone(),
        })?;
    Ok(Some(parsed))
}

fn parse_i32_opt(v: Option<&String>, field: &'static str) -> ParseResult<Option<i32>> {
    let Some(s) = v else { return Ok(None) };
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = trimmed
        .parse::<i32>()
        .map_err(|_| ParseError::InvalidNumber {
            field,
            value: s.clone(),
        })?;
    Ok(Some(parsed))
}

fn parse_f64_opt(v: Option<&String>, field: &'static str) -> ParseResult<Option<f64>> {
    let Some(s) = v else { return Ok(None) };
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = trimmed
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber {
            field,
            value: s.clone(),
        })?;
    Ok(Some(parsed))
}
