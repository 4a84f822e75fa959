// XML writer for TMX documents.
//
// Attribute ordering is fixed per node kind and attributes equal to their
// documented default are omitted. The <data> payload goes through
// Data::encode_with, so an unchanged node with matching target settings is
// re-emitted byte-for-byte.

use crate::data::{Compression, Data, DataError, EncodedPayload, Encoding};
use crate::model::*;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("tile data error: {0}")]
    Data(#[from] DataError),
}

pub type WriteResult<T> = Result<T, WriteError>;

/// Output settings for the write path. `None` for encoding/compression
/// means "preserve what each data node was read with".
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub encoding: Option<Encoding>,
    pub compression: Option<Compression>,
    /// When set, external tilesets are written with their flattened content
    /// instead of a `source` reference.
    pub inline_external: bool,
}

type XmlWriter = Writer<Vec<u8>>;

pub fn write_map(map: &Map, options: &WriteOptions) -> WriteResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_map_element(&mut writer, map, options)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| WriteError::Utf8(e.utf8_error()))
}

fn write_map_element(writer: &mut XmlWriter, map: &Map, options: &WriteOptions) -> WriteResult<()> {
    let mut e = BytesStart::new("map");
    push_opt(&mut e, "version", map.version.clone());
    push_opt(&mut e, "orientation", map.orientation.clone());
    push_opt(&mut e, "renderorder", map.renderorder.clone());
    e.push_attribute(("width", map.width.to_string().as_str()));
    e.push_attribute(("height", map.height.to_string().as_str()));
    push_opt(&mut e, "tilewidth", fmt_u32(map.tilewidth));
    push_opt(&mut e, "tileheight", fmt_u32(map.tileheight));
    push_opt(&mut e, "hexsidelength", fmt_u32(map.hexsidelength));
    push_opt(&mut e, "staggeraxis", map.staggeraxis.clone());
    push_opt(&mut e, "staggerindex", map.staggerindex.clone());
    push_opt(&mut e, "backgroundcolor", map.backgroundcolor.clone());
    push_opt(&mut e, "nextobjectid", fmt_u32(map.nextobjectid));
    writer.write_event(Event::Start(e))?;

    if let Some(properties) = &map.properties {
        write_properties(writer, properties)?;
    }
    for tileset in &map.tilesets {
        write_tileset(writer, tileset, options)?;
    }
    for layer in &map.layers {
        match layer {
            Layer::Tiles(l) => write_tile_layer(writer, l, options)?,
            Layer::Image(l) => write_imagelayer(writer, l)?,
            Layer::Objects(g) => write_objectgroup(writer, g)?,
        }
    }

    writer.write_event(Event::End(BytesEnd::new("map")))?;
    Ok(())
}

fn write_properties(writer: &mut XmlWriter, properties: &Properties) -> WriteResult<()> {
    writer.write_event(Event::Start(BytesStart::new("properties")))?;
    for property in &properties.properties {
        let mut e = BytesStart::new("property");
        e.push_attribute(("name", property.name.as_str()));
        if let Some(kind) = property.kind.as_attr() {
            e.push_attribute(("type", kind));
        }
        e.push_attribute(("value", property.value.as_str()));
        writer.write_event(Event::Empty(e))?;
    }
    writer.write_event(Event::End(BytesEnd::new("properties")))?;
    Ok(())
}

fn write_tileset(
    writer: &mut XmlWriter,
    tileset: &Tileset,
    options: &WriteOptions,
) -> WriteResult<()> {
    // An external tileset keeps its source reference unless inlining was
    // requested; the reference form carries only firstgid and source.
    if let (Some(source), false) = (&tileset.source, options.inline_external) {
        let mut e = BytesStart::new("tileset");
        e.push_attribute(("firstgid", tileset.firstgid.to_string().as_str()));
        e.push_attribute(("source", source.as_str()));
        writer.write_event(Event::Empty(e))?;
        return Ok(());
    }

    let mut e = BytesStart::new("tileset");
    e.push_attribute(("firstgid", tileset.firstgid.to_string().as_str()));
    push_opt(&mut e, "name", tileset.name.clone());
    push_opt(&mut e, "tilewidth", fmt_u32(tileset.tilewidth));
    push_opt(&mut e, "tileheight", fmt_u32(tileset.tileheight));
    push_opt(&mut e, "spacing", fmt_u32(tileset.spacing));
    push_opt(&mut e, "margin", fmt_u32(tileset.margin));
    push_opt(&mut e, "tilecount", fmt_u32(tileset.tilecount));
    push_opt(&mut e, "columns", fmt_u32(tileset.columns));
    writer.write_event(Event::Start(e))?;

    if let Some(tileoffset) = &tileset.tileoffset {
        let mut e = BytesStart::new("tileoffset");
        e.push_attribute(("x", tileoffset.x.to_string().as_str()));
        e.push_attribute(("y", tileoffset.y.to_string().as_str()));
        writer.write_event(Event::Empty(e))?;
    }
    if let Some(properties) = &tileset.properties {
        write_properties(writer, properties)?;
    }
    if let Some(terraintypes) = &tileset.terraintypes {
        write_terraintypes(writer, terraintypes)?;
    }
    if let Some(image) = &tileset.image {
        write_image(writer, image)?;
    }
    for tile in &tileset.tiles {
        write_tile(writer, tile)?;
    }

    writer.write_event(Event::End(BytesEnd::new("tileset")))?;
    Ok(())
}

fn write_terraintypes(writer: &mut XmlWriter, terraintypes: &Terraintypes) -> WriteResult<()> {
    writer.write_event(Event::Start(BytesStart::new("terraintypes")))?;
    for terrain in &terraintypes.terrains {
        let mut e = BytesStart::new("terrain");
        push_opt(&mut e, "name", terrain.name.clone());
        push_opt(&mut e, "tile", fmt_u32(terrain.tile));
        match &terrain.properties {
            Some(properties) => {
                writer.write_event(Event::Start(e))?;
                write_properties(writer, properties)?;
                writer.write_event(Event::End(BytesEnd::new("terrain")))?;
            }
            None => writer.write_event(Event::Empty(e))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new("terraintypes")))?;
    Ok(())
}

fn write_image(writer: &mut XmlWriter, image: &Image) -> WriteResult<()> {
    let mut e = BytesStart::new("image");
    push_opt(&mut e, "format", image.format.clone());
    push_opt(&mut e, "source", image.source.clone());
    push_opt(&mut e, "trans", image.trans.clone());
    push_opt(&mut e, "width", fmt_u32(image.width));
    push_opt(&mut e, "height", fmt_u32(image.height));
    writer.write_event(Event::Empty(e))?;
    Ok(())
}

fn write_tile(writer: &mut XmlWriter, tile: &Tile) -> WriteResult<()> {
    let mut e = BytesStart::new("tile");
    e.push_attribute(("id", tile.id.to_string().as_str()));
    push_opt(&mut e, "terrain", tile.terrain.clone());
    push_opt(&mut e, "probability", fmt_f64(tile.probability));

    let has_children =
        tile.properties.is_some() || tile.image.is_some() || tile.animation.is_some();
    if !has_children {
        writer.write_event(Event::Empty(e))?;
        return Ok(());
    }

    writer.write_event(Event::Start(e))?;
    if let Some(properties) = &tile.properties {
        write_properties(writer, properties)?;
    }
    if let Some(image) = &tile.image {
        write_image(writer, image)?;
    }
    if let Some(animation) = &tile.animation {
        writer.write_event(Event::Start(BytesStart::new("animation")))?;
        for frame in &animation.frames {
            let mut e = BytesStart::new("frame");
            e.push_attribute(("tileid", frame.tileid.to_string().as_str()));
            e.push_attribute(("duration", frame.duration.to_string().as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        writer.write_event(Event::End(BytesEnd::new("animation")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("tile")))?;
    Ok(())
}

fn write_tile_layer(
    writer: &mut XmlWriter,
    layer: &TileLayer,
    options: &WriteOptions,
) -> WriteResult<()> {
    let mut e = BytesStart::new("layer");
    push_opt(&mut e, "name", layer.name.clone());
    push_opt(&mut e, "x", fmt_i32(layer.x));
    push_opt(&mut e, "y", fmt_i32(layer.y));
    push_opt(&mut e, "width", fmt_u32(layer.width));
    push_opt(&mut e, "height", fmt_u32(layer.height));
    push_opt(&mut e, "opacity", fmt_f64(layer.opacity));
    push_opt(&mut e, "visible", fmt_bool(layer.visible));
    push_opt(&mut e, "offsetx", fmt_f64(layer.offsetx));
    push_opt(&mut e, "offsety", fmt_f64(layer.offsety));
    writer.write_event(Event::Start(e))?;

    if let Some(properties) = &layer.properties {
        write_properties(writer, properties)?;
    }
    write_data(writer, &layer.data, options)?;

    writer.write_event(Event::End(BytesEnd::new("layer")))?;
    Ok(())
}

fn write_data(writer: &mut XmlWriter, data: &Data, options: &WriteOptions) -> WriteResult<()> {
    let target_encoding = options.encoding.unwrap_or(data.encoding);
    let target_compression = options.compression.unwrap_or(data.compression);
    let payload = data.encode_with(options.encoding, options.compression)?;

    let mut e = BytesStart::new("data");
    if let Some(name) = target_encoding.as_attr() {
        e.push_attribute(("encoding", name));
    }
    if let Some(name) = target_compression.as_attr() {
        e.push_attribute(("compression", name));
    }

    match payload {
        EncodedPayload::Text(text) => {
            writer.write_event(Event::Start(e))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new("data")))?;
        }
        EncodedPayload::Tiles(gids) => {
            writer.write_event(Event::Start(e))?;
            for gid in gids {
                let mut tile = BytesStart::new("tile");
                tile.push_attribute(("gid", gid.to_string().as_str()));
                writer.write_event(Event::Empty(tile))?;
            }
            writer.write_event(Event::End(BytesEnd::new("data")))?;
        }
    }
    Ok(())
}

fn write_imagelayer(writer: &mut XmlWriter, layer: &ImageLayer) -> WriteResult<()> {
    let mut e = BytesStart::new("imagelayer");
    push_opt(&mut e, "name", layer.name.clone());
    push_opt(&mut e, "offsetx", fmt_f64(layer.offsetx));
    push_opt(&mut e, "offsety", fmt_f64(layer.offsety));
    push_opt(&mut e, "x", fmt_i32(layer.x));
    push_opt(&mut e, "y", fmt_i32(layer.y));
    push_opt(&mut e, "width", fmt_u32(layer.width));
    push_opt(&mut e, "height", fmt_u32(layer.height));
    push_opt(&mut e, "opacity", fmt_f64(layer.opacity));
    push_opt(&mut e, "visible", fmt_bool(layer.visible));

    if layer.properties.is_none() && layer.image.is_none() {
        writer.write_event(Event::Empty(e))?;
        return Ok(());
    }
    writer.write_event(Event::Start(e))?;
    if let Some(properties) = &layer.properties {
        write_properties(writer, properties)?;
    }
    if let Some(image) = &layer.image {
        write_image(writer, image)?;
    }
    writer.write_event(Event::End(BytesEnd::new("imagelayer")))?;
    Ok(())
}

fn write_objectgroup(writer: &mut XmlWriter, group: &ObjectGroup) -> WriteResult<()> {
    let mut e = BytesStart::new("objectgroup");
    push_opt(&mut e, "name", group.name.clone());
    push_opt(&mut e, "color", group.color.clone());
    push_opt(&mut e, "x", fmt_i32(group.x));
    push_opt(&mut e, "y", fmt_i32(group.y));
    push_opt(&mut e, "width", fmt_u32(group.width));
    push_opt(&mut e, "height", fmt_u32(group.height));
    push_opt(&mut e, "opacity", fmt_f64(group.opacity));
    push_opt(&mut e, "visible", fmt_bool(group.visible));
    push_opt(&mut e, "offsetx", fmt_f64(group.offsetx));
    push_opt(&mut e, "offsety", fmt_f64(group.offsety));
    if group.draworder != DRAWORDER_DEFAULT {
        e.push_attribute(("draworder", group.draworder.as_str()));
    }
    if group.properties.is_none() && group.objects.is_empty() {
        writer.write_event(Event::Empty(e))?;
        return Ok(());
    }
    writer.write_event(Event::Start(e))?;

    if let Some(properties) = &group.properties {
        write_properties(writer, properties)?;
    }
    for object in &group.objects {
        write_object(writer, object)?;
    }

    writer.write_event(Event::End(BytesEnd::new("objectgroup")))?;
    Ok(())
}

fn write_object(writer: &mut XmlWriter, object: &Object) -> WriteResult<()> {
    let mut e = BytesStart::new("object");
    push_opt(&mut e, "id", fmt_u32(object.id));
    push_opt(&mut e, "name", object.name.clone());
    push_opt(&mut e, "type", object.kind.clone());
    push_opt(&mut e, "x", fmt_i32(object.x));
    push_opt(&mut e, "y", fmt_i32(object.y));
    push_opt(&mut e, "width", fmt_u32(object.width));
    push_opt(&mut e, "height", fmt_u32(object.height));
    push_opt(&mut e, "rotation", fmt_f64(object.rotation));
    push_opt(&mut e, "gid", fmt_u32(object.gid));
    push_opt(&mut e, "visible", fmt_bool(object.visible));

    let shape_child = matches!(
        object.shape,
        Shape::Ellipse | Shape::Polygon(_) | Shape::Polyline(_)
    );
    if object.properties.is_none() && !shape_child {
        writer.write_event(Event::Empty(e))?;
        return Ok(());
    }

    writer.write_event(Event::Start(e))?;
    if let Some(properties) = &object.properties {
        write_properties(writer, properties)?;
    }
    match &object.shape {
        Shape::Ellipse => writer.write_event(Event::Empty(BytesStart::new("ellipse")))?,
        Shape::Polygon(points) => {
            let mut e = BytesStart::new("polygon");
            e.push_attribute(("points", points.raw.as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        Shape::Polyline(points) => {
            let mut e = BytesStart::new("polyline");
            e.push_attribute(("points", points.raw.as_str()));
            writer.write_event(Event::Empty(e))?;
        }
        _ => {}
    }
    writer.write_event(Event::End(BytesEnd::new("object")))?;
    Ok(())
}

fn push_opt(e: &mut BytesStart<'_>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        e.push_attribute((key, value.as_str()));
    }
}

fn fmt_u32(v: Option<u32>) -> Option<String> {
    v.map(|x| x.to_string())
}

fn fmt_i32(v: Option<i32>) -> Option<String> {
    v.map(|x| x.to_string())
}

fn fmt_bool(v: Option<bool>) -> Option<String> {
    v.map(|b| if b { "1" } else { "0" }.to_string())
}

// Integral floats print without a fractional part, matching Tiled output.
fn fmt_f64(v: Option<f64>) -> Option<String> {
    v.map(|x| {
        if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
            format!("{}", x as i64)
        } else {
            x.to_string()
        }
    })
}
