use serde::{Deserialize, Serialize};

/// Canvas position in scene units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn right(&self) -> i32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> i32 {
        self.origin.y + self.size.height
    }

    /// Open intersection: rectangles sharing only an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.origin.x < other.right()
            && other.origin.x < self.right()
            && self.origin.y < other.bottom()
            && other.origin.y < self.bottom()
    }

    /// Rectangle grown by `margin` on every side.
    pub fn inflate(&self, margin: i32) -> Rect {
        Rect::new(
            self.origin.offset(-margin, -margin),
            Size::new(self.size.width + 2 * margin, self.size.height + 2 * margin),
        )
    }
}

/// Geometry settings shared by every arrangement mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConstraints {
    /// Positions snap to multiples of this
    pub grid: i32,
    /// Vertical gap between stacked boxes
    pub box_spacing: i32,
    /// Horizontal gap between signal-chain columns
    pub column_spacing: i32,
    /// Minimum width of a column
    pub column_width: i32,
    /// Gap between the two facing columns
    pub facing_gap: i32,
    /// Width after which the band of unconnected boxes wraps
    pub band_width: i32,
    pub port_height: i32,
    pub header_height: i32,
    /// Average glyph width used to estimate text widths
    pub char_width: i32,
    pub max_port_width: i32,
    pub prevent_overlap: bool,
    /// Top-left corner of automatic layouts
    pub origin: Point,
}

impl Default for CanvasConstraints {
    fn default() -> Self {
        Self {
            grid: 10,
            box_spacing: 20,
            column_spacing: 80,
            column_width: 200,
            facing_gap: 160,
            band_width: 1200,
            port_height: 20,
            header_height: 30,
            char_width: 7,
            max_port_width: 170,
            prevent_overlap: true,
            origin: Point::new(0, 0),
        }
    }
}

impl CanvasConstraints {
    /// Round `v` up to the next grid line.
    pub fn snap(&self, v: i32) -> i32 {
        if self.grid <= 1 {
            return v;
        }
        v.div_euclid(self.grid) * self.grid + if v.rem_euclid(self.grid) == 0 { 0 } else { self.grid }
    }

    pub fn snap_point(&self, p: Point) -> Point {
        Point::new(self.snap(p.x), self.snap(p.y))
    }
}
