//! Crop geometry: turns editor crop/rotation metadata into canvas coordinates.
//!
//! Lightroom-style editors store a crop as four edge fractions plus a
//! leveling angle. Those numbers describe the *final* cropped and leveled
//! image, not the stored pixels, so recovering the full frame means running
//! the edit backwards:
//!
//! ```text
//! remap edges for orientation
//!   → invert the crop to get the uncropped frame size
//!   → place frame + crop at full scale
//!   → rotate both by -angle about the frame centre (leveling)
//!   → translate to min x/y = 0
//!   → scale so the longer side equals `max_wh`
//!   → centre the shorter side in the square canvas
//! ```
//!
//! Everything here is pure `f64` math with no I/O.

use serde::{Deserialize, Serialize};

/// Display rotation applied on top of the stored pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Parse a rotation in degrees. Only the four right angles are valid.
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Number of 90° steps in the cyclic edge remap.
    fn quarter_turns(self) -> usize {
        (self.degrees() / 90) as usize
    }
}

/// Crop edges as fractions of the original, unrotated image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropEdges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl CropEdges {
    /// The uncropped frame.
    pub fn full() -> Self {
        Self {
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
            left: 0.0,
        }
    }

    /// Remap stored edges to displayed edges.
    ///
    /// One quarter turn: displayed top ← stored right, right ← bottom,
    /// bottom ← left, left ← top. 180 and 270 apply the same step twice and
    /// three times.
    pub fn oriented(self, orientation: Orientation) -> Self {
        let mut edges = self;
        for _ in 0..orientation.quarter_turns() {
            edges = Self {
                top: edges.right,
                right: edges.bottom,
                bottom: edges.left,
                left: edges.top,
            };
        }
        edges
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn scaled(self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy)
    }

    fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Rotate about `origin` by `radians` (positive = toward +y in raster space).
    fn rotated(self, origin: Point, radians: f64) -> Self {
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        let radius = dx.hypot(dy);
        let azimuth = dy.atan2(dx) + radians;
        Self::new(
            origin.x + radius * azimuth.cos(),
            origin.y + radius * azimuth.sin(),
        )
    }
}

/// A four-vertex quadrilateral, vertices in tl → tr → br → bl order.
///
/// After rotation the vertices keep their names even though the shape is
/// no longer axis-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub tl: Point,
    pub tr: Point,
    pub br: Point,
    pub bl: Point,
}

impl Quad {
    /// Axis-aligned rectangle from two opposite corners.
    pub fn from_corners(tl: Point, br: Point) -> Self {
        Self {
            tl,
            tr: Point::new(br.x, tl.y),
            br,
            bl: Point::new(tl.x, br.y),
        }
    }

    pub fn vertices(&self) -> [Point; 4] {
        [self.tl, self.tr, self.br, self.bl]
    }

    fn map(self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            tl: f(self.tl),
            tr: f(self.tr),
            br: f(self.br),
            bl: f(self.bl),
        }
    }

    pub fn center(&self) -> Point {
        let [a, b, c, d] = self.vertices();
        Point::new((a.x + b.x + c.x + d.x) / 4.0, (a.y + b.y + c.y + d.y) / 4.0)
    }

    pub fn min_x(&self) -> f64 {
        self.vertices().iter().map(|p| p.x).fold(f64::INFINITY, f64::min)
    }

    pub fn max_x(&self) -> f64 {
        self.vertices().iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_y(&self) -> f64 {
        self.vertices().iter().map(|p| p.y).fold(f64::INFINITY, f64::min)
    }

    pub fn max_y(&self) -> f64 {
        self.vertices().iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Width of the bounding box.
    pub fn bounding_width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    /// Height of the bounding box.
    pub fn bounding_height(&self) -> f64 {
        self.max_y() - self.min_y()
    }
}

/// Position and size of the cropped image inside the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub src: String,
    pub pos: Point,
    pub width: f64,
    pub height: f64,
}

/// Crop preview data handed to the rendering sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRenderInfo {
    /// The leveled, uncropped frame.
    pub original: Quad,
    /// Where the cropped image sits within that frame.
    pub img: Placement,
}

/// Inputs for one crop computation.
#[derive(Debug, Clone)]
pub struct CropRequest {
    pub image_width: u32,
    pub image_height: u32,
    pub edges: CropEdges,
    /// Leveling angle in degrees, positive = counter-clockwise in the editor.
    pub angle: f64,
    pub orientation: Orientation,
    pub src: String,
}

/// Compute the crop render info normalized into a `max_wh` × `max_wh` canvas.
///
/// A zero-width or zero-height crop has no defined geometry; callers must
/// not pass one (the extractor never does).
pub fn crop_render_info(request: &CropRequest, max_wh: f64) -> CropRenderInfo {
    let radians = request.angle.to_radians();
    let edges = request.edges.oriented(request.orientation);
    debug_assert!(edges.right != edges.left && edges.bottom != edges.top);

    let (uncropped_w, uncropped_h) = uncropped_size(
        request.image_width as f64,
        request.image_height as f64,
        &edges,
        radians,
    );

    let original = Quad::from_corners(Point::new(0.0, 0.0), Point::new(1.0, 1.0))
        .map(|p| p.scaled(uncropped_w, uncropped_h));
    let cropped = Quad::from_corners(
        Point::new(edges.left, edges.top),
        Point::new(edges.right, edges.bottom),
    )
    .map(|p| p.scaled(uncropped_w, uncropped_h));

    // Leveling: undo the editor's tilt.
    let pivot = original.center();
    let original = original.map(|p| p.rotated(pivot, -radians));
    let cropped = cropped.map(|p| p.rotated(pivot, -radians));
    let cropped = Quad::from_corners(cropped.tl, cropped.br);

    let (dx, dy) = (-original.min_x(), -original.min_y());
    let original = original.map(|p| p.translated(dx, dy));
    let cropped = cropped.map(|p| p.translated(dx, dy));

    let scale = max_wh / original.bounding_width().max(original.bounding_height());
    let original = original.map(|p| p.scaled(scale, scale));
    let cropped = cropped.map(|p| p.scaled(scale, scale));

    let (w, h) = (original.bounding_width(), original.bounding_height());
    let (dx, dy) = if w > h {
        (0.0, (max_wh - h) / 2.0)
    } else {
        ((max_wh - w) / 2.0, 0.0)
    };
    let original = original.map(|p| p.translated(dx, dy));
    let cropped = cropped.map(|p| p.translated(dx, dy));

    CropRenderInfo {
        original,
        img: Placement {
            src: request.src.clone(),
            pos: cropped.tl,
            width: cropped.br.x - cropped.tl.x,
            height: cropped.br.y - cropped.tl.y,
        },
    }
}

/// Recover the pre-crop frame size from the final image and crop fractions.
///
/// The final image rotated about the origin spans `br - tl`; dividing by the
/// crop fraction gives the full frame. With some orientations both the span
/// and the fraction are negative, and the quotient is still the positive size.
fn uncropped_size(width: f64, height: f64, edges: &CropEdges, radians: f64) -> (f64, f64) {
    let origin = Point::new(0.0, 0.0);
    let rotated = Quad::from_corners(origin, Point::new(width, height))
        .map(|p| p.rotated(origin, radians));
    (
        (rotated.br.x - rotated.tl.x) / (edges.right - edges.left),
        (rotated.br.y - rotated.tl.y) / (edges.bottom - edges.top),
    )
}
