// JSON projection of a TMX document: the alternate schema used by
// map-consuming engines. Booleans are normalized, property values are
// coerced per their declared type, and tile metadata is flattened into
// id-keyed maps (`tiles` / `tileproperties` / `tilepropertytypes`).

use crate::data::{encode, Data, EncodedPayload, Encoding};
use crate::model::*;
use crate::write::{WriteOptions, WriteResult};
use serde_json::{Map as JsonMap, Value};

pub fn map_to_json(map: &Map, options: &WriteOptions) -> WriteResult<Value> {
    let mut out = JsonMap::new();
    insert_str(&mut out, "version", &map.version);
    insert_str(&mut out, "orientation", &map.orientation);
    insert_str(&mut out, "renderorder", &map.renderorder);
    out.insert("width".to_string(), Value::from(map.width));
    out.insert("height".to_string(), Value::from(map.height));
    insert_u32(&mut out, "tilewidth", map.tilewidth);
    insert_u32(&mut out, "tileheight", map.tileheight);
    insert_u32(&mut out, "hexsidelength", map.hexsidelength);
    insert_str(&mut out, "staggeraxis", &map.staggeraxis);
    insert_str(&mut out, "staggerindex", &map.staggerindex);
    insert_str(&mut out, "backgroundcolor", &map.backgroundcolor);
    insert_u32(&mut out, "nextobjectid", map.nextobjectid);
    insert_properties(&mut out, "properties", "propertytypes", map.properties.as_ref());

    let mut tilesets = Vec::new();
    for tileset in &map.tilesets {
        tilesets.push(tileset_to_json(tileset));
    }
    out.insert("tilesets".to_string(), Value::Array(tilesets));

    let mut layers = Vec::new();
    for layer in &map.layers {
        layers.push(layer_to_json(layer, map, options)?);
    }
    out.insert("layers".to_string(), Value::Array(layers));

    Ok(Value::Object(out))
}

fn tileset_to_json(tileset: &Tileset) -> Value {
    let mut out = JsonMap::new();
    out.insert("firstgid".to_string(), Value::from(tileset.firstgid));
    insert_str(&mut out, "source", &tileset.source);
    insert_str(&mut out, "name", &tileset.name);
    insert_u32(&mut out, "tilewidth", tileset.tilewidth);
    insert_u32(&mut out, "tileheight", tileset.tileheight);
    insert_u32(&mut out, "spacing", tileset.spacing);
    insert_u32(&mut out, "margin", tileset.margin);
    insert_u32(&mut out, "tilecount", tileset.tilecount);
    insert_u32(&mut out, "columns", tileset.columns);

    if let Some(tileoffset) = &tileset.tileoffset {
        let mut off = JsonMap::new();
        off.insert("x".to_string(), Value::from(tileoffset.x));
        off.insert("y".to_string(), Value::from(tileoffset.y));
        out.insert("tileoffset".to_string(), Value::Object(off));
    }
    if let Some(image) = &tileset.image {
        insert_str(&mut out, "image", &image.source);
        insert_u32(&mut out, "imagewidth", image.width);
        insert_u32(&mut out, "imageheight", image.height);
        insert_str(&mut out, "transparentcolor", &image.trans);
    }
    insert_properties(&mut out, "properties", "propertytypes", tileset.properties.as_ref());

    if let Some(terraintypes) = &tileset.terraintypes {
        let terrains: Vec<Value> = terraintypes
            .terrains
            .iter()
            .map(|t| {
                let mut obj = JsonMap::new();
                insert_str(&mut obj, "name", &t.name);
                insert_u32(&mut obj, "tile", t.tile);
                Value::Object(obj)
            })
            .collect();
        out.insert("terrains".to_string(), Value::Array(terrains));
    }

    // Tile metadata splits three ways: non-property metadata under `tiles`,
    // custom properties under `tileproperties`, declared types under
    // `tilepropertytypes`; all keyed by the local tile id.
    let mut tiles = JsonMap::new();
    let mut tileproperties = JsonMap::new();
    let mut tilepropertytypes = JsonMap::new();
    for tile in &tileset.tiles {
        let key = tile.id.to_string();
        let mut meta = JsonMap::new();
        if let Some(terrain) = &tile.terrain {
            let corners: Vec<Value> = terrain
                .split(',')
                .map(|f| Value::from(f.trim().parse::<i64>().unwrap_or(-1)))
                .collect();
            meta.insert("terrain".to_string(), Value::Array(corners));
        }
        if let Some(probability) = tile.probability {
            meta.insert("probability".to_string(), json_f64(probability));
        }
        if let Some(image) = &tile.image {
            insert_str(&mut meta, "image", &image.source);
            insert_u32(&mut meta, "imagewidth", image.width);
            insert_u32(&mut meta, "imageheight", image.height);
        }
        if let Some(animation) = &tile.animation {
            let frames: Vec<Value> = animation
                .frames
                .iter()
                .map(|f| {
                    let mut obj = JsonMap::new();
                    obj.insert("tileid".to_string(), Value::from(f.tileid));
                    obj.insert("duration".to_string(), Value::from(f.duration));
                    Value::Object(obj)
                })
                .collect();
            meta.insert("animation".to_string(), Value::Array(frames));
        }
        if !meta.is_empty() {
            tiles.insert(key.clone(), Value::Object(meta));
        }
        if let Some(properties) = &tile.properties {
            let (values, types) = properties_json(properties);
            tileproperties.insert(key.clone(), values);
            tilepropertytypes.insert(key, types);
        }
    }
    if !tiles.is_empty() {
        out.insert("tiles".to_string(), Value::Object(tiles));
    }
    if !tileproperties.is_empty() {
        out.insert("tileproperties".to_string(), Value::Object(tileproperties));
        out.insert(
            "tilepropertytypes".to_string(),
            Value::Object(tilepropertytypes),
        );
    }

    Value::Object(out)
}

fn layer_to_json(layer: &Layer, map: &Map, options: &WriteOptions) -> WriteResult<Value> {
    let mut out = JsonMap::new();
    match layer {
        Layer::Tiles(l) => {
            out.insert("type".to_string(), Value::from("tilelayer"));
            out.insert(
                "name".to_string(),
                Value::from(l.name.clone().unwrap_or_default()),
            );
            out.insert("x".to_string(), Value::from(l.x.unwrap_or(0)));
            out.insert("y".to_string(), Value::from(l.y.unwrap_or(0)));
            out.insert(
                "width".to_string(),
                Value::from(l.width.unwrap_or(map.width)),
            );
            out.insert(
                "height".to_string(),
                Value::from(l.height.unwrap_or(map.height)),
            );
            out.insert("opacity".to_string(), json_f64(l.opacity.unwrap_or(1.0)));
            out.insert("visible".to_string(), Value::Bool(l.visible.unwrap_or(true)));
            insert_f64(&mut out, "offsetx", l.offsetx);
            insert_f64(&mut out, "offsety", l.offsety);
            insert_properties(&mut out, "properties", "propertytypes", l.properties.as_ref());
            insert_layer_data(&mut out, &l.data, options)?;
        }
        Layer::Image(l) => {
            out.insert("type".to_string(), Value::from("imagelayer"));
            out.insert(
                "name".to_string(),
                Value::from(l.name.clone().unwrap_or_default()),
            );
            out.insert("x".to_string(), Value::from(l.x.unwrap_or(0)));
            out.insert("y".to_string(), Value::from(l.y.unwrap_or(0)));
            out.insert("opacity".to_string(), json_f64(l.opacity.unwrap_or(1.0)));
            out.insert("visible".to_string(), Value::Bool(l.visible.unwrap_or(true)));
            insert_f64(&mut out, "offsetx", l.offsetx);
            insert_f64(&mut out, "offsety", l.offsety);
            if let Some(image) = &l.image {
                insert_str(&mut out, "image", &image.source);
            }
            insert_properties(&mut out, "properties", "propertytypes", l.properties.as_ref());
        }
        Layer::Objects(g) => {
            out.insert("type".to_string(), Value::from("objectgroup"));
            out.insert(
                "name".to_string(),
                Value::from(g.name.clone().unwrap_or_default()),
            );
            insert_str(&mut out, "color", &g.color);
            out.insert("x".to_string(), Value::from(g.x.unwrap_or(0)));
            out.insert("y".to_string(), Value::from(g.y.unwrap_or(0)));
            out.insert("opacity".to_string(), json_f64(g.opacity.unwrap_or(1.0)));
            out.insert("visible".to_string(), Value::Bool(g.visible.unwrap_or(true)));
            insert_f64(&mut out, "offsetx", g.offsetx);
            insert_f64(&mut out, "offsety", g.offsety);
            out.insert("draworder".to_string(), Value::from(g.draworder.clone()));
            insert_properties(&mut out, "properties", "propertytypes", g.properties.as_ref());
            let objects: Vec<Value> = g.objects.iter().map(object_to_json).collect();
            out.insert("objects".to_string(), Value::Array(objects));
        }
    }
    Ok(Value::Object(out))
}

fn insert_layer_data(
    out: &mut JsonMap<String, Value>,
    data: &Data,
    options: &WriteOptions,
) -> WriteResult<()> {
    let encoding = options.encoding.unwrap_or(data.encoding);
    let compression = options.compression.unwrap_or(data.compression);
    if encoding == Encoding::Base64 {
        // A fresh encode, not the stored raw text: the JSON field must be
        // the bare base64 string without surrounding whitespace.
        let payload = encode(&data.tiles, data.width, data.height, encoding, compression)?;
        if let EncodedPayload::Text(text) = payload {
            out.insert("data".to_string(), Value::from(text));
            out.insert("encoding".to_string(), Value::from("base64"));
            if let Some(name) = compression.as_attr() {
                out.insert("compression".to_string(), Value::from(name));
            }
            return Ok(());
        }
    }
    let gids: Vec<Value> = data.tiles.iter().map(|&gid| Value::from(gid)).collect();
    out.insert("data".to_string(), Value::Array(gids));
    Ok(())
}

fn object_to_json(object: &Object) -> Value {
    let mut out = JsonMap::new();
    insert_u32(&mut out, "id", object.id);
    out.insert(
        "name".to_string(),
        Value::from(object.name.clone().unwrap_or_default()),
    );
    out.insert(
        "type".to_string(),
        Value::from(object.kind.clone().unwrap_or_default()),
    );
    out.insert("x".to_string(), Value::from(object.x.unwrap_or(0)));
    out.insert("y".to_string(), Value::from(object.y.unwrap_or(0)));
    out.insert("width".to_string(), Value::from(object.width.unwrap_or(0)));
    out.insert("height".to_string(), Value::from(object.height.unwrap_or(0)));
    out.insert("rotation".to_string(), json_f64(object.rotation.unwrap_or(0.0)));
    insert_u32(&mut out, "gid", object.gid);
    out.insert(
        "visible".to_string(),
        Value::Bool(object.visible.unwrap_or(true)),
    );
    match &object.shape {
        Shape::Ellipse => {
            out.insert("ellipse".to_string(), Value::Bool(true));
        }
        Shape::Polygon(points) => {
            out.insert("polygon".to_string(), points_json(points));
        }
        Shape::Polyline(points) => {
            out.insert("polyline".to_string(), points_json(points));
        }
        _ => {}
    }
    insert_properties(&mut out, "properties", "propertytypes", object.properties.as_ref());
    Value::Object(out)
}

fn points_json(points: &Points) -> Value {
    Value::Array(
        points
            .positions
            .iter()
            .map(|&(x, y)| {
                let mut obj = JsonMap::new();
                obj.insert("x".to_string(), json_f64(x));
                obj.insert("y".to_string(), json_f64(y));
                Value::Object(obj)
            })
            .collect(),
    )
}

fn properties_json(properties: &Properties) -> (Value, Value) {
    let mut values = JsonMap::new();
    let mut types = JsonMap::new();
    for property in &properties.properties {
        values.insert(property.name.clone(), property_value(property));
        types.insert(property.name.clone(), Value::from(kind_name(property.kind)));
    }
    (Value::Object(values), Value::Object(types))
}

fn insert_properties(
    out: &mut JsonMap<String, Value>,
    values_key: &str,
    types_key: &str,
    properties: Option<&Properties>,
) {
    if let Some(properties) = properties {
        let (values, types) = properties_json(properties);
        out.insert(values_key.to_string(), values);
        out.insert(types_key.to_string(), types);
    }
}

/// Coerce a property's literal string per its declared type. Values that
/// fail to parse stay strings rather than aborting the projection.
fn property_value(property: &Property) -> Value {
    match property.kind {
        PropertyKind::String => Value::from(property.value.clone()),
        PropertyKind::Bool => Value::Bool(matches!(
            property.value.as_str(),
            "1" | "true" | "TRUE" | "True"
        )),
        PropertyKind::Int => property
            .value
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(property.value.clone())),
        PropertyKind::Float => property
            .value
            .trim()
            .parse::<f64>()
            .map(json_f64)
            .unwrap_or_else(|_| Value::from(property.value.clone())),
    }
}

fn kind_name(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::String => "string",
        PropertyKind::Bool => "bool",
        PropertyKind::Int => "int",
        PropertyKind::Float => "float",
    }
}

fn insert_str(out: &mut JsonMap<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        out.insert(key.to_string(), Value::from(value.clone()));
    }
}

fn insert_u32(out: &mut JsonMap<String, Value>, key: &str, value: Option<u32>) {
    if let Some(value) = value {
        out.insert(key.to_string(), Value::from(value));
    }
}

fn insert_f64(out: &mut JsonMap<String, Value>, key: &str, value: Option<f64>) {
    if let Some(value) = value {
        out.insert(key.to_string(), json_f64(value));
    }
}

// Integral floats become integer JSON numbers (no ".0").
fn json_f64(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::from(v as i64)
    } else {
        Value::from(v)
    }
}
