use tmx_core::data::{Compression, Encoding};
use tmx_core::{parse_map, write_map, WriteOptions};

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.0" orientation="orthogonal" renderorder="right-down" width="3" height="2" tilewidth="8" tileheight="8" nextobjectid="2">
 <tileset firstgid="1" name="base" tilewidth="8" tileheight="8" tilecount="8" columns="4">
  <image source="base.png" width="32" height="16"/>
 </tileset>
 <layer name="ground" width="3" height="2">
  <data encoding="csv">
1,2,0,
0,4,1
</data>
 </layer>
 <objectgroup name="things">
  <object id="1" name="spawn" x="8" y="8" width="8" height="8"/>
 </objectgroup>
</map>
"#;

#[test]
fn unchanged_data_is_reemitted_verbatim() {
    let map = parse_map(SAMPLE).unwrap();
    let out = write_map(&map, &WriteOptions::default()).unwrap();
    // The payload text survives byte-for-byte, whitespace included.
    assert!(out.contains("<data encoding=\"csv\">\n1,2,0,\n0,4,1\n</data>"));
}

#[test]
fn write_is_a_fixed_point() {
    let map = parse_map(SAMPLE).unwrap();
    let first = write_map(&map, &WriteOptions::default()).unwrap();
    let reparsed = parse_map(&first).unwrap();
    let second = write_map(&reparsed, &WriteOptions::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(map, reparsed);
}

#[test]
fn reencoding_to_base64_changes_the_payload() {
    let map = parse_map(SAMPLE).unwrap();
    let options = WriteOptions {
        encoding: Some(Encoding::Base64),
        ..WriteOptions::default()
    };
    let out = write_map(&map, &options).unwrap();
    assert!(out.contains("<data encoding=\"base64\">"));
    assert!(!out.contains("1,2,0,"));

    // The re-encoded document decodes to the same grid.
    let reparsed = parse_map(&out).unwrap();
    let tmx_core::Layer::Tiles(layer) = &reparsed.layers[0] else {
        panic!("expected a tile layer");
    };
    assert_eq!(layer.data.tiles, vec![1, 2, 0, 0, 4, 1]);
}

#[test]
fn compressed_output_round_trips_through_parse() {
    for compression in [Compression::Zlib, Compression::Gzip] {
        let map = parse_map(SAMPLE).unwrap();
        let options = WriteOptions {
            encoding: Some(Encoding::Base64),
            compression: Some(compression),
            ..WriteOptions::default()
        };
        let out = write_map(&map, &options).unwrap();
        assert!(out.contains(&format!(
            "compression=\"{}\"",
            compression.as_attr().unwrap()
        )));
        let reparsed = parse_map(&out).unwrap();
        let tmx_core::Layer::Tiles(layer) = &reparsed.layers[0] else {
            panic!("expected a tile layer");
        };
        assert_eq!(layer.data.tiles, vec![1, 2, 0, 0, 4, 1]);
    }
}

#[test]
fn inline_xml_data_writes_tile_children() {
    let xml = r#"<map width="2" height="1">
 <layer>
  <data>
   <tile gid="3"/>
   <tile gid="0"/>
  </data>
 </layer>
</map>"#;
    let map = parse_map(xml).unwrap();
    let out = write_map(&map, &WriteOptions::default()).unwrap();
    assert!(out.contains("<tile gid=\"3\"/>"));
    assert!(out.contains("<tile gid=\"0\"/>"));
    assert!(out.contains("<data>"));
}

#[test]
fn external_tileset_keeps_its_reference() {
    let xml = r#"<map width="1" height="1">
 <tileset firstgid="1" source="tiles.tsx"/>
 <layer><data encoding="csv">0</data></layer>
</map>"#;
    let map = parse_map(xml).unwrap();
    let out = write_map(&map, &WriteOptions::default()).unwrap();
    assert!(out.contains("<tileset firstgid=\"1\" source=\"tiles.tsx\"/>"));
}

#[test]
fn default_draworder_is_suppressed() {
    let xml = r#"<map width="1" height="1">
 <objectgroup name="a" draworder="topdown"/>
 <objectgroup name="b" draworder="index"/>
</map>"#;
    let map = parse_map(xml).unwrap();
    let out = write_map(&map, &WriteOptions::default()).unwrap();
    assert!(out.contains("<objectgroup name=\"a\"/>"));
    assert!(out.contains("<objectgroup name=\"b\" draworder=\"index\"/>"));
}

#[test]
fn shape_children_are_written_back() {
    let xml = r#"<map width="1" height="1">
 <objectgroup>
  <object id="1" x="0" y="0">
   <polyline points="0,0 -4,2 8,8"/>
  </object>
 </objectgroup>
</map>"#;
    let map = parse_map(xml).unwrap();
    let out = write_map(&map, &WriteOptions::default()).unwrap();
    assert!(out.contains("<polyline points=\"0,0 -4,2 8,8\"/>"));
}

#[test]
fn output_starts_with_declaration_and_ends_with_newline() {
    let map = parse_map(SAMPLE).unwrap();
    let out = write_map(&map, &WriteOptions::default()).unwrap();
    assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(out.ends_with("</map>\n"));
}
