use std::collections::BTreeMap;

use super::geometry::{CanvasConstraints, Point, Rect, Size};
use crate::graph::GroupKey;

/// Nudge boxes down one grid step at a time until none intersect.
///
/// Boxes are visited left to right, then top to bottom (then by key), and
/// each is only moved against the boxes visited before it.
pub fn resolve_overlaps(rects: &mut BTreeMap<GroupKey, Rect>, c: &CanvasConstraints) {
    let step = c.grid.max(1);

    let mut keys: Vec<(Point, GroupKey)> = rects
        .iter()
        .map(|(k, r)| (r.origin, k.clone()))
        .collect();
    keys.sort_by(|a, b| (a.0.x, a.0.y, &a.1).cmp(&(b.0.x, b.0.y, &b.1)));

    let mut placed: Vec<Rect> = Vec::with_capacity(keys.len());
    for (_, key) in keys {
        let Some(rect) = rects.get_mut(&key) else {
            continue;
        };
        while placed.iter().any(|p| p.intersects(rect)) {
            rect.origin.y += step;
        }
        placed.push(*rect);
    }
}

/// Top-left free grid slot for a box of `size`, scanning rows top to
/// bottom and each row left to right within the band width.
pub fn free_slot(occupied: &[Rect], size: Size, c: &CanvasConstraints) -> Point {
    let step = c.grid.max(1);
    let start = c.snap_point(c.origin);
    let lowest = occupied
        .iter()
        .map(|r| r.bottom() + c.box_spacing)
        .max()
        .unwrap_or(start.y);
    let right_edge = start.x + c.band_width.max(size.width);

    let mut y = start.y;
    while y <= lowest {
        let mut x = start.x;
        while x + size.width <= right_edge {
            let candidate = Rect::new(Point::new(x, y), size);
            if !occupied
                .iter()
                .any(|r| r.inflate(c.box_spacing).intersects(&candidate))
            {
                return candidate.origin;
            }
            x += step;
        }
        y += step;
    }

    Point::new(start.x, c.snap(lowest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_boxes_are_pushed_down() {
        let c = CanvasConstraints::default();
        let size = Size::new(100, 50);
        let mut rects = BTreeMap::new();
        rects.insert("a".to_string(), Rect::new(Point::new(0, 0), size));
        rects.insert("b".to_string(), Rect::new(Point::new(0, 0), size));
        rects.insert("c".to_string(), Rect::new(Point::new(50, 20), size));

        resolve_overlaps(&mut rects, &c);

        assert_eq!(rects["a"].origin, Point::new(0, 0));
        assert_eq!(rects["b"].origin, Point::new(0, 50));
        assert_eq!(rects["c"].origin, Point::new(50, 100));
    }

    #[test]
    fn test_free_slot() {
        let c = CanvasConstraints::default();
        let size = Size::new(100, 50);
        assert_eq!(free_slot(&[], size, &c), Point::new(0, 0));

        let taken = [Rect::new(Point::new(0, 0), size)];
        let slot = free_slot(&taken, size, &c);
        assert_eq!(slot, Point::new(120, 0));
    }
}
