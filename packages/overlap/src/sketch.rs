//! Sketch input and its geometry-free echo.

use geo::{BoundingRect, MultiPolygon};
use serde::Serialize;

/// `[min_x, min_y, max_x, max_y]`
pub type BBox = [f64; 4];

/// One user-drawn candidate protected area.
#[derive(Debug, Clone, PartialEq)]
pub struct Sketch {
    /// Sketch id.
    pub id: String,
    /// Sketch name.
    pub name: String,
    /// Polygon geometry.
    pub geometry: MultiPolygon<f64>,
    /// Precomputed bounding box.
    pub bbox: Option<BBox>,
}

impl Sketch {
    /// A sketch without a precomputed bounding box.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            geometry,
            bbox: None,
        }
    }

    /// The supplied bounding box, or one computed from the geometry.
    /// Empty geometry yields `None`.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        self.bbox.or_else(|| {
            self.geometry
                .bounding_rect()
                .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y])
        })
    }
}

/// A named group of sketches evaluated together.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchCollection {
    /// Collection id.
    pub id: String,
    /// Collection name.
    pub name: String,
    /// Child sketches.
    pub sketches: Vec<Sketch>,
    /// Precomputed bounding box.
    pub bbox: Option<BBox>,
}

impl SketchCollection {
    /// The supplied bounding box, or the union of the children's.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        self.bbox.or_else(|| {
            self.sketches
                .iter()
                .filter_map(Sketch::bbox)
                .reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])])
        })
    }
}

/// What an overlap function is run against.
#[derive(Debug, Clone, PartialEq)]
pub enum SketchInput {
    /// A single sketch.
    Sketch(Sketch),
    /// A collection of sketches.
    Collection(SketchCollection),
}

impl SketchInput {
    /// Id of the sketch or collection.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Sketch(s) => &s.id,
            Self::Collection(c) => &c.id,
        }
    }

    /// Bounding box used as the fetch window.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Self::Sketch(s) => s.bbox(),
            Self::Collection(c) => c.bbox(),
        }
    }

    /// The same ids and names without geometry.
    #[must_use]
    pub fn to_null_sketch(&self) -> NullSketch {
        match self {
            Self::Sketch(s) => NullSketch::from(s),
            Self::Collection(c) => NullSketch {
                id: c.id.clone(),
                name: c.name.clone(),
                sketches: c.sketches.iter().map(NullSketch::from).collect(),
            },
        }
    }
}

impl From<Sketch> for SketchInput {
    fn from(sketch: Sketch) -> Self {
        Self::Sketch(sketch)
    }
}

impl From<SketchCollection> for SketchInput {
    fn from(collection: SketchCollection) -> Self {
        Self::Collection(collection)
    }
}

/// A sketch or collection reduced to its ids and names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NullSketch {
    /// Sketch or collection id.
    pub id: String,
    /// Sketch or collection name.
    pub name: String,
    /// Children of a collection.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sketches: Vec<NullSketch>,
}

impl From<&Sketch> for NullSketch {
    fn from(sketch: &Sketch) -> Self {
        Self {
            id: sketch.id.clone(),
            name: sketch.name.clone(),
            sketches: Vec::new(),
        }
    }
}
