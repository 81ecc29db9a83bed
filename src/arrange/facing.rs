use std::collections::BTreeMap;

use super::geometry::{CanvasConstraints, Point, Rect};
use super::{ArrangeGroup, arrival_order, connected_keys, tie_order};
use crate::graph::GroupKey;

/// Facing-columns arrangement.
///
/// Output-heavy groups stack in a left column whose boxes are right-aligned
/// on the column width, input-heavy groups in a right column after the
/// gap. Balanced groups join the shorter column, left on a tie.
///
/// Connected groups are stacked first, then unconnected ones in arrival
/// order.
pub(super) fn place(groups: &[ArrangeGroup], c: &CanvasConstraints) -> BTreeMap<GroupKey, Rect> {
    let connected = connected_keys(groups);
    let (mut order, mut loose): (Vec<&ArrangeGroup>, Vec<&ArrangeGroup>) = groups
        .iter()
        .partition(|g| connected.contains(g.key.as_str()));
    order.sort_by(|a, b| tie_order(a, b));
    loose.sort_by(|a, b| arrival_order(a, b));
    order.extend(loose);

    let right_x = c.origin.x + c.column_width + c.facing_gap;
    let mut left_y = c.origin.y;
    let mut right_y = c.origin.y;
    let mut rects = BTreeMap::new();

    for g in order {
        let size = g.size(c);
        let (n_in, n_out) = (g.inputs.len(), g.outputs.len());
        let go_left = match n_out.cmp(&n_in) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => left_y <= right_y,
        };

        let origin = if go_left {
            let origin = c.snap_point(Point::new(c.origin.x + c.column_width - size.width, left_y));
            left_y = origin.y + size.height + c.box_spacing;
            origin
        } else {
            let origin = c.snap_point(Point::new(right_x, right_y));
            right_y = origin.y + size.height + c.box_spacing;
            origin
        };

        rects.insert(g.key.clone(), Rect::new(origin, size));
    }

    rects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sides() {
        let c = CanvasConstraints::default();
        let groups = vec![
            ArrangeGroup::new("capture", vec![], vec![4, 4]),
            ArrangeGroup::new("playback", vec![4, 4], vec![]),
            ArrangeGroup::new("duplex1", vec![4], vec![4]),
            ArrangeGroup::new("duplex2", vec![4], vec![4]),
        ];
        let rects = place(&groups, &c);

        let right_x = c.column_width + c.facing_gap;
        assert!(rects["capture"].right() <= c.column_width + c.grid);
        assert_eq!(rects["playback"].origin.x, right_x);
        // the left column is taller once capture is in, so duplex1 goes
        // right and duplex2 ties back to the left
        assert_eq!(rects["duplex1"].origin.x, right_x);
        assert!(rects["duplex2"].right() <= c.column_width + c.grid);
        assert!(rects["capture"].origin.y < rects["duplex2"].origin.y);
    }

    #[test]
    fn test_connected_groups_stack_first() {
        let c = CanvasConstraints::default();
        let mut synth = ArrangeGroup::new("Synth", vec![], vec![4, 4]);
        synth.feeds.insert("Mixer".to_string());
        let mixer = ArrangeGroup::new("Mixer", vec![4, 4], vec![]);
        let mut amp = ArrangeGroup::new("Amp", vec![], vec![4, 4]);
        amp.arrival = 1;

        let rects = place(&[synth, mixer, amp], &c);
        assert_eq!(rects["Synth"].origin.y, c.origin.y);
        assert!(rects["Amp"].origin.y > rects["Synth"].origin.y);
    }
}
