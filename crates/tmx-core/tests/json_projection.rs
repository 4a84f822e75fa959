use serde_json::{json, Value};
use tmx_core::data::{Compression, Encoding};
use tmx_core::{map_to_json, parse_map, WriteOptions};

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.0" orientation="orthogonal" renderorder="right-down" width="3" height="2" tilewidth="8" tileheight="8" nextobjectid="4">
 <properties>
  <property name="title" value="demo"/>
  <property name="gravity" type="float" value="9.8"/>
  <property name="wrap" type="bool" value="1"/>
  <property name="lives" type="int" value="3"/>
 </properties>
 <tileset firstgid="1" name="base" tilewidth="8" tileheight="8" tilecount="8" columns="4">
  <image source="base.png" width="32" height="16"/>
  <tile id="0" terrain="0,0,1,1"/>
  <tile id="3">
   <properties>
    <property name="solid" type="bool" value="true"/>
   </properties>
   <animation>
    <frame tileid="3" duration="100"/>
    <frame tileid="4" duration="150"/>
   </animation>
  </tile>
 </tileset>
 <layer name="ground">
  <data encoding="csv">
1,2,0,
0,4,1
</data>
 </layer>
 <objectgroup name="things">
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

fn sample_json(options: &WriteOptions) -> Value {
    let map = parse_map(SAMPLE).unwrap();
    map_to_json(&map, options).unwrap()
}

#[test]
fn map_level_fields() {
    let value = sample_json(&WriteOptions::default());
    assert_eq!(value["version"], json!("1.0"));
    assert_eq!(value["orientation"], json!("orthogonal"));
    assert_eq!(value["width"], json!(3));
    assert_eq!(value["height"], json!(2));
    assert_eq!(value["tilewidth"], json!(8));
    assert_eq!(value["nextobjectid"], json!(4));
}

#[test]
fn properties_are_coerced_per_declared_type() {
    let value = sample_json(&WriteOptions::default());
    let properties = &value["properties"];
    assert_eq!(properties["title"], json!("demo"));
    assert_eq!(properties["gravity"], json!(9.8));
    assert_eq!(properties["wrap"], json!(true));
    assert_eq!(properties["lives"], json!(3));

    let types = &value["propertytypes"];
    assert_eq!(types["title"], json!("string"));
    assert_eq!(types["gravity"], json!("float"));
    assert_eq!(types["wrap"], json!("bool"));
    assert_eq!(types["lives"], json!("int"));
}

#[test]
fn tileset_projection() {
    let value = sample_json(&WriteOptions::default());
    let tileset = &value["tilesets"][0];
    assert_eq!(tileset["firstgid"], json!(1));
    assert_eq!(tileset["name"], json!("base"));
    assert_eq!(tileset["image"], json!("base.png"));
    assert_eq!(tileset["imagewidth"], json!(32));
    assert_eq!(tileset["imageheight"], json!(16));

    // Tile metadata is keyed by local id.
    let tiles = &tileset["tiles"];
    assert_eq!(tiles["0"]["terrain"], json!([0, 0, 1, 1]));
    assert_eq!(
        tiles["3"]["animation"],
        json!([
            { "tileid": 3, "duration": 100 },
            { "tileid": 4, "duration": 150 }
        ])
    );

    assert_eq!(tileset["tileproperties"]["3"]["solid"], json!(true));
    assert_eq!(tileset["tilepropertytypes"]["3"]["solid"], json!("bool"));
}

#[test]
fn tile_layer_defaults_to_flat_gid_array() {
    let value = sample_json(&WriteOptions::default());
    let layer = &value["layers"][0];
    assert_eq!(layer["type"], json!("tilelayer"));
    assert_eq!(layer["name"], json!("ground"));
    assert_eq!(layer["width"], json!(3));
    assert_eq!(layer["height"], json!(2));
    assert_eq!(layer["opacity"], json!(1));
    assert_eq!(layer["visible"], json!(true));
    assert_eq!(layer["data"], json!([1, 2, 0, 0, 4, 1]));
    assert!(layer.get("encoding").is_none());
}

#[test]
fn base64_target_projects_as_string() {
    let options = WriteOptions {
        encoding: Some(Encoding::Base64),
        compression: Some(Compression::Zlib),
        ..WriteOptions::default()
    };
    let value = sample_json(&options);
    let layer = &value["layers"][0];
    assert!(layer["data"].is_string());
    assert_eq!(layer["encoding"], json!("base64"));
    assert_eq!(layer["compression"], json!("zlib"));
}

#[test]
fn object_group_projection() {
    let value = sample_json(&WriteOptions::default());
    let group = &value["layers"][1];
    assert_eq!(group["type"], json!("objectgroup"));
    assert_eq!(group["draworder"], json!("topdown"));

    let objects = group["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 3);

    let spawn = &objects[0];
    assert_eq!(spawn["id"], json!(1));
    assert_eq!(spawn["name"], json!("spawn"));
    assert_eq!(spawn["type"], json!(""));
    assert_eq!(spawn["x"], json!(8));
    assert_eq!(spawn["width"], json!(8));
    assert_eq!(spawn["rotation"], json!(0));
    assert_eq!(spawn["visible"], json!(true));
    assert!(spawn.get("ellipse").is_none());

    assert_eq!(objects[1]["ellipse"], json!(true));
    // Missing width/height fall back to zero.
    assert_eq!(objects[1]["width"], json!(0));

    assert_eq!(
        objects[2]["polygon"],
        json!([
            { "x": 0, "y": 0 },
            { "x": 8, "y": 0 },
            { "x": 8, "y": 8 }
        ])
    );
}

#[test]
fn image_layer_projection() {
    let xml = r#"<map width="1" height="1">
 <imagelayer name="backdrop" offsetx="4" offsety="-2.5">
  <image source="sky.png" width="128" height="64"/>
 </imagelayer>
</map>"#;
    let map = parse_map(xml).unwrap();
    let value = map_to_json(&map, &WriteOptions::default()).unwrap();
    let layer = &value["layers"][0];
    assert_eq!(layer["type"], json!("imagelayer"));
    assert_eq!(layer["image"], json!("sky.png"));
    assert_eq!(layer["offsetx"], json!(4));
    assert_eq!(layer["offsety"], json!(-2.5));
}
