use std::path::Path;

use tmx_core::data::{Compression, Encoding, RawPayload};
use tmx_core::model::{ObjectGroup, PropertyKind, Tile, Tileset};
use tmx_core::{load_map, parse_map, parse_tileset_document, Layer, Map, ParseError, Shape};

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.0" orientation="orthogonal" renderorder="right-down" width="3" height="2" tilewidth="8" tileheight="8" nextobjectid="4">
 <properties>
  <property name="title" value="demo"/>
  <property name="gravity" type="float" value="9.8"/>
  <property name="wrap" type="bool" value="1"/>
 </properties>
 <tileset firstgid="1" name="base" tilewidth="8" tileheight="8" tilecount="8" columns="4">
  <image source="base.png" width="32" height="16"/>
  <tile id="0" terrain="0,0,1,1"/>
  <tile id="3">
   <animation>
    <frame tileid="3" duration="100"/>
    <frame tileid="4" duration="100"/>
   </animation>
  </tile>
 </tileset>
 <layer name="ground">
  <data encoding="csv">
1,2,0,
0,4,1
</data>
 </layer>
 <imagelayer name="backdrop" offsetx="4" offsety="-2">
  <image source="sky.png" width="128" height="64"/>
 </imagelayer>
 <objectgroup name="things" draworder="index">
  <object id="1" name="spawn" x="8" y="8" width="8" height="8"/>
  <object id="2" x="0" y="16">
   <ellipse/>
  </object>
  <object id="3" x="4" y="4">
   <polygon points="0,0 8,0 8,8"/>
  </object>
 </objectgroup>
</map>
"#;

#[test]
fn parses_map_attributes() {
    let map = parse_map(SAMPLE).unwrap();
    assert_eq!(map.version.as_deref(), Some("1.0"));
    assert_eq!(map.orientation.as_deref(), Some("orthogonal"));
    assert_eq!(map.width, 3);
    assert_eq!(map.height, 2);
    assert_eq!(map.tilewidth, Some(8));
    assert_eq!(map.nextobjectid, Some(4));
}

#[test]
fn parses_typed_properties() {
    let map = parse_map(SAMPLE).unwrap();
    let properties = map.properties.as_ref().unwrap();
    assert_eq!(properties.properties.len(), 3);
    let gravity = &properties.properties[1];
    assert_eq!(gravity.name, "gravity");
    assert_eq!(gravity.kind, PropertyKind::Float);
    assert_eq!(gravity.value, "9.8");
}

#[test]
fn parses_tileset_with_animation() {
    let map = parse_map(SAMPLE).unwrap();
    let tileset = &map.tilesets[0];
    assert_eq!(tileset.firstgid, 1);
    assert_eq!(tileset.name.as_deref(), Some("base"));
    assert_eq!(tileset.tiles.len(), 2);
    assert_eq!(tileset.tiles[0].terrain.as_deref(), Some("0,0,1,1"));

    let animated = tileset.tile_by_id(3).unwrap();
    let frames = &animated.animation.as_ref().unwrap().frames;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].tileid, 3);
    assert_eq!(frames[1].duration, 100);
}

#[test]
fn tile_layer_inherits_map_dimensions() {
    let map = parse_map(SAMPLE).unwrap();
    let Layer::Tiles(layer) = &map.layers[0] else {
        panic!("first layer must be a tile layer");
    };
    assert_eq!(layer.width, None);
    assert_eq!(layer.data.width, 3);
    assert_eq!(layer.data.height, 2);
    assert_eq!(layer.data.tiles, vec![1, 2, 0, 0, 4, 1]);
    assert_eq!(layer.data.encoding, Encoding::Csv);
    assert_eq!(layer.data.compression, Compression::None);
}

#[test]
fn parses_all_three_layer_kinds_in_order() {
    let map = parse_map(SAMPLE).unwrap();
    assert_eq!(map.layers.len(), 3);
    assert!(matches!(map.layers[0], Layer::Tiles(_)));
    let Layer::Image(imagelayer) = &map.layers[1] else {
        panic!("second layer must be an image layer");
    };
    assert_eq!(imagelayer.offsety, Some(-2.0));
    assert_eq!(
        imagelayer.image.as_ref().unwrap().source.as_deref(),
        Some("sky.png")
    );
    assert!(matches!(map.layers[2], Layer::Objects(_)));
}

#[test]
fn object_shapes_are_decided_at_parse_time() {
    let map = parse_map(SAMPLE).unwrap();
    let Layer::Objects(group) = &map.layers[2] else {
        panic!("third layer must be an object group");
    };
    assert_eq!(group.draworder, "index");
    assert_eq!(group.objects.len(), 3);
    assert_eq!(group.objects[0].shape, Shape::Rectangle);
    assert_eq!(group.objects[1].shape, Shape::Ellipse);
    let Shape::Polygon(points) = &group.objects[2].shape else {
        panic!("third object must be a polygon");
    };
    assert_eq!(points.raw, "0,0 8,0 8,8");
    assert_eq!(points.positions, vec![(0.0, 0.0), (8.0, 0.0), (8.0, 8.0)]);
    assert_eq!(points.width(), 8.0);
    assert_eq!(points.height(), 8.0);
}

#[test]
fn draworder_defaults_to_topdown() {
    let group = ObjectGroup::default();
    assert_eq!(group.draworder, "topdown");
}

#[test]
fn tile_object_resolves_through_tileset_table() {
    let xml = r#"<map width="1" height="1">
 <tileset firstgid="1" name="t">
  <tile id="2"/>
 </tileset>
 <objectgroup>
  <object id="1" gid="3" x="0" y="0"/>
  <object id="2" gid="99" x="0" y="0"/>
 </objectgroup>
</map>"#;
    let map = parse_map(xml).unwrap();
    let Layer::Objects(group) = &map.layers[0] else {
        panic!("expected an object group");
    };
    let Shape::Tile(tile_ref) = &group.objects[0].shape else {
        panic!("gid object must resolve to a tile shape");
    };
    assert_eq!(tile_ref.tileset, 0);
    assert_eq!(tile_ref.local_id, 2);
    assert_eq!(map.tile(*tile_ref).unwrap().id, 2);
    // A gid with no tile record falls back to no shape.
    assert_eq!(group.objects[1].shape, Shape::None);
}

fn partitioned_tilesets() -> Vec<Tileset> {
    let second_tiles = vec![Tile {
        id: 69,
        ..Tile::default()
    }];
    let third_tiles: Vec<Tile> = (0..30)
        .map(|id| Tile {
            id,
            ..Tile::default()
        })
        .collect();
    vec![
        Tileset {
            firstgid: 1,
            ..Tileset::default()
        },
        Tileset {
            firstgid: 50,
            tiles: second_tiles,
            ..Tileset::default()
        },
        Tileset {
            firstgid: 120,
            tiles: third_tiles,
            ..Tileset::default()
        },
    ]
}

#[test]
fn gid_resolution_partitions_the_tileset_table() {
    let map = Map {
        width: 1,
        height: 1,
        tilesets: partitioned_tilesets(),
        ..Map::default()
    };

    let hit = map.resolve_gid(119).unwrap();
    assert_eq!((hit.tileset, hit.local_id), (1, 69));

    let hit = map.resolve_gid(120).unwrap();
    assert_eq!((hit.tileset, hit.local_id), (2, 0));

    let hit = map.resolve_gid(149).unwrap();
    assert_eq!((hit.tileset, hit.local_id), (2, 29));

    // GID 0 is the empty cell.
    assert!(map.resolve_gid(0).is_none());
    // Open-ended last range, but no tile record with local id 30.
    assert!(map.resolve_gid(150).is_none());
    // First tileset has no tile records at all.
    assert!(map.resolve_gid(1).is_none());
}

#[test]
fn parses_standalone_tileset_document() {
    let xml = r#"<tileset name="solo" tilewidth="16" tileheight="16" tilecount="2" columns="2">
 <image source="solo.png" width="32" height="16"/>
 <tile id="0"/>
 <tile id="1"/>
</tileset>"#;
    let tileset = parse_tileset_document(xml).unwrap();
    assert_eq!(tileset.firstgid, 0);
    assert_eq!(tileset.name.as_deref(), Some("solo"));
    assert_eq!(tileset.tiles.len(), 2);
    assert_eq!(
        tileset.image.as_ref().unwrap().source.as_deref(),
        Some("solo.png")
    );
}

#[test]
fn load_map_flattens_external_tileset() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/level.tmx");
    let map = load_map(&path).unwrap();

    let tileset = &map.tilesets[0];
    assert_eq!(tileset.firstgid, 1);
    // The source reference is kept for the writer.
    assert_eq!(tileset.source.as_deref(), Some("tiles.tsx"));
    // Content comes from the external document.
    assert_eq!(tileset.name.as_deref(), Some("ground-tiles"));
    assert_eq!(tileset.tilecount, Some(4));
    assert_eq!(tileset.tiles.len(), 2);

    let walkable = tileset.tile_by_id(0).unwrap();
    let properties = walkable.properties.as_ref().unwrap();
    assert_eq!(properties.properties[0].name, "walkable");
    assert_eq!(properties.properties[0].kind, PropertyKind::Bool);

    // GID 1 resolves into the flattened tileset.
    let hit = map.resolve_gid(1).unwrap();
    assert_eq!((hit.tileset, hit.local_id), (0, 0));
}

#[test]
fn load_map_reports_missing_file() {
    let err = load_map("does/not/exist.tmx").unwrap_err();
    assert!(matches!(err, ParseError::UnresolvedReference { .. }));
}

#[test]
fn missing_map_width_is_an_error() {
    let err = parse_map(r#"<map height="2"></map>"#).unwrap_err();
    assert!(matches!(err, ParseError::MissingAttr("map@width")));
}

#[test]
fn layer_without_data_is_an_error() {
    let xml = r#"<map width="2" height="2">
 <layer name="empty"></layer>
</map>"#;
    let err = parse_map(xml).unwrap_err();
    assert!(matches!(err, ParseError::Structure(_)));
}

#[test]
fn self_closed_layer_is_an_error() {
    let xml = r#"<map width="2" height="2">
 <layer name="empty"/>
</map>"#;
    let err = parse_map(xml).unwrap_err();
    assert!(matches!(err, ParseError::Structure(_)));
}

#[test]
fn unknown_data_encoding_is_an_error() {
    let xml = r#"<map width="2" height="2">
 <layer><data encoding="hex">00</data></layer>
</map>"#;
    let err = parse_map(xml).unwrap_err();
    assert!(matches!(err, ParseError::Data(_)));
}

#[test]
fn inline_data_with_wrong_child_count_is_an_error() {
    let xml = r#"<map width="2" height="2">
 <layer>
  <data>
   <tile gid="1"/>
   <tile gid="2"/>
   <tile gid="3"/>
  </data>
 </layer>
</map>"#;
    let err = parse_map(xml).unwrap_err();
    assert!(matches!(err, ParseError::Data(_)));
}

#[test]
fn unknown_elements_are_skipped() {
    let xml = r#"<map width="1" height="1">
 <wangsets><wangset name="w"/></wangsets>
 <layer><data encoding="csv">7</data></layer>
</map>"#;
    let map = parse_map(xml).unwrap();
    assert_eq!(map.layers.len(), 1);
    let Layer::Tiles(layer) = &map.layers[0] else {
        panic!("expected a tile layer");
    };
    assert_eq!(layer.data.tiles, vec![7]);
    assert!(matches!(layer.data.src, RawPayload::Text(_)));
}
