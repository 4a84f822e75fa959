use crate::data::Data;

/// Root of a parsed TMX document.
///
/// Owns the tileset list (ascending `firstgid`, non-overlapping ranges) and
/// the layer list in document order. Every other node is reached through the
/// map; child nodes never hold owning back-pointers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map {
    pub version: Option<String>,
    pub orientation: Option<String>,
    pub renderorder: Option<String>,
    pub width: u32,
    pub height: u32,
    pub tilewidth: Option<u32>,
    pub tileheight: Option<u32>,
    pub hexsidelength: Option<u32>,
    pub staggeraxis: Option<String>,
    pub staggerindex: Option<String>,
    pub backgroundcolor: Option<String>,
    pub nextobjectid: Option<u32>,
    pub properties: Option<Properties>,
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
}

impl Map {
    /// Resolve a global tile ID to the tile record owning it.
    ///
    /// Tileset `i` owns GIDs `[firstgid_i, firstgid_{i+1})`; the last
    /// tileset's range is open-ended. GID 0 means "no tile" and always
    /// resolves to `None`, as does a GID whose owning tileset has no tile
    /// record with the matching local id.
    pub fn resolve_gid(&self, gid: u32) -> Option<TileRef> {
        resolve_gid_in(&self.tilesets, gid)
    }

    /// Fetch the tile record a [`TileRef`] points at.
    pub fn tile(&self, tile_ref: TileRef) -> Option<&Tile> {
        self.tilesets
            .get(tile_ref.tileset)
            .and_then(|ts| ts.tiles.get(tile_ref.tile))
    }
}

pub(crate) fn resolve_gid_in(tilesets: &[Tileset], gid: u32) -> Option<TileRef> {
    if gid == 0 {
        return None;
    }
    let count = tilesets.len();
    for (i, tileset) in tilesets.iter().enumerate() {
        if gid < tileset.firstgid {
            continue;
        }
        let covered = if i + 1 < count {
            gid < tilesets[i + 1].firstgid
        } else {
            true
        };
        if covered {
            let local_id = gid - tileset.firstgid;
            let tile = tileset.tiles.iter().position(|t| t.id == local_id)?;
            return Some(TileRef {
                tileset: i,
                tile,
                local_id,
            });
        }
    }
    None
}

/// Index-based reference to a tile record, resolved through the owning
/// [`Map`]. Stays valid as long as the tileset list is not reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRef {
    /// Index into `Map::tilesets`.
    pub tileset: usize,
    /// Index into `Tileset::tiles`.
    pub tile: usize,
    /// GID minus the owning tileset's `firstgid`.
    pub local_id: u32,
}

/// A `<tileset>` element, either inline or resolved from an external `.tsx`
/// file. External tilesets are flattened into this structure once at load
/// time; `source` is kept so the writer can re-emit the reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tileset {
    pub firstgid: u32,
    pub source: Option<String>,
    pub name: Option<String>,
    pub tilewidth: Option<u32>,
    pub tileheight: Option<u32>,
    pub spacing: Option<u32>,
    pub margin: Option<u32>,
    pub tilecount: Option<u32>,
    pub columns: Option<u32>,
    pub tileoffset: Option<Tileoffset>,
    pub properties: Option<Properties>,
    pub terraintypes: Option<Terraintypes>,
    pub image: Option<Image>,
    pub tiles: Vec<Tile>,
}

impl Tileset {
    pub fn tile_by_id(&self, local_id: u32) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.id == local_id)
    }
}

/// Pixel offset applied when drawing tiles from a tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tileoffset {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Terraintypes {
    pub terrains: Vec<Terrain>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Terrain {
    pub name: Option<String>,
    pub tile: Option<u32>,
    pub properties: Option<Properties>,
}

/// A `<tile>` record, keyed by local id within its tileset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tile {
    pub id: u32,
    /// Comma-separated terrain corner indices, stored literally.
    pub terrain: Option<String>,
    pub probability: Option<f64>,
    pub properties: Option<Properties>,
    pub image: Option<Image>,
    pub animation: Option<Animation>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    pub format: Option<String>,
    pub source: Option<String>,
    pub trans: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub tileid: u32,
    pub duration: u32,
}

/// Union of the three layer kinds, decided once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Tiles(TileLayer),
    Image(ImageLayer),
    Objects(ObjectGroup),
}

/// A `<layer>` element holding the tile grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    /// Grid dimensions; when absent the map's dimensions apply.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub offsetx: Option<f64>,
    pub offsety: Option<f64>,
    pub properties: Option<Properties>,
    pub data: Data,
}

pub const DRAWORDER_DEFAULT: &str = "topdown";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageLayer {
    pub name: Option<String>,
    pub offsetx: Option<f64>,
    pub offsety: Option<f64>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub properties: Option<Properties>,
    pub image: Option<Image>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub name: Option<String>,
    pub color: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub offsetx: Option<f64>,
    pub offsety: Option<f64>,
    /// Defaults to `"topdown"`; suppressed on write when equal to it.
    pub draworder: String,
    pub properties: Option<Properties>,
    pub objects: Vec<Object>,
}

impl Default for ObjectGroup {
    fn default() -> Self {
        ObjectGroup {
            name: None,
            color: None,
            x: None,
            y: None,
            width: None,
            height: None,
            opacity: None,
            visible: None,
            offsetx: None,
            offsety: None,
            draworder: DRAWORDER_DEFAULT.to_string(),
            properties: None,
            objects: Vec::new(),
        }
    }
}

/// An `<object>` in an object group. The shape variant is decided once at
/// parse time from child elements and the `gid` attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub id: Option<u32>,
    pub name: Option<String>,
    /// The `type` attribute (freeform classification string).
    pub kind: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotation: Option<f64>,
    pub gid: Option<u32>,
    pub visible: Option<bool>,
    pub properties: Option<Properties>,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Shape {
    /// No shape could be determined (e.g. a `gid` that resolves nowhere).
    #[default]
    None,
    Rectangle,
    Ellipse,
    Polygon(Points),
    Polyline(Points),
    /// Tile object; the reference is resolved against the document's
    /// tileset table and cached here.
    Tile(TileRef),
}

/// Space-delimited list of `x,y` float pairs from a `points` attribute.
/// The literal attribute text is kept for verbatim re-emission.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Points {
    pub raw: String,
    pub positions: Vec<(f64, f64)>,
}

impl Points {
    /// Bounding-box width. The box always includes the object origin (0,0),
    /// matching how Tiled anchors polygon points.
    pub fn width(&self) -> f64 {
        let (min, max) = self
            .positions
            .iter()
            .fold((0.0f64, 0.0f64), |(lo, hi), &(x, _)| (lo.min(x), hi.max(x)));
        max - min
    }

    /// Bounding-box height, origin included.
    pub fn height(&self) -> f64 {
        let (min, max) = self
            .positions
            .iter()
            .fold((0.0f64, 0.0f64), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
        max - min
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties {
    pub properties: Vec<Property>,
}

/// A `(name, declared-type, value)` triple. XML always stores the literal
/// string form; the declared type only drives coercion during the JSON
/// projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyKind {
    #[default]
    String,
    Bool,
    Int,
    Float,
}

impl PropertyKind {
    /// Unknown declared types fall back to string.
    pub fn from_attr(value: Option<&str>) -> PropertyKind {
        match value {
            Some("bool") => PropertyKind::Bool,
            Some("int") => PropertyKind::Int,
            Some("float") => PropertyKind::Float,
            _ => PropertyKind::String,
        }
    }

    /// Attribute form; `None` for the default string type, which is omitted
    /// from output.
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            PropertyKind::String => None,
            PropertyKind::Bool => Some("bool"),
            PropertyKind::Int => Some("int"),
            PropertyKind::Float => Some("float"),
        }
    }
}
