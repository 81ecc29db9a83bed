//! Signal-chain arrangement.
//!
//! Connected groups are laid out in columns following the signal: sources
//! first, sinks last, everything else by its longest path from a group
//! nothing feeds. Unconnected groups go to a band below the columns, in
//! arrival order.

use std::collections::{BTreeMap, HashMap};

use super::geometry::{CanvasConstraints, Point, Rect};
use super::{ArrangeGroup, arrival_order, tie_order};
use crate::graph::GroupKey;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

/// Depth-first walk keeping only edges that do not close a cycle.
fn visit(
    node: usize,
    succ: &[Vec<usize>],
    state: &mut [Visit],
    dag: &mut [Vec<usize>],
    post: &mut Vec<usize>,
) {
    state[node] = Visit::Active;
    for &next in &succ[node] {
        match state[next] {
            Visit::New => {
                dag[node].push(next);
                visit(next, succ, state, dag, post);
            }
            Visit::Done => dag[node].push(next),
            // back edge
            Visit::Active => {}
        }
    }
    state[node] = Visit::Done;
    post.push(node);
}

/// Column index of every group, in tie order. `None` for unconnected groups.
pub(super) fn columns(order: &[&ArrangeGroup]) -> Vec<Option<usize>> {
    let n = order.len();
    let index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, g)| (g.key.as_str(), i))
        .collect();

    let mut succ = vec![Vec::new(); n];
    let mut has_pred = vec![false; n];
    let mut connected = vec![false; n];

    for (i, g) in order.iter().enumerate() {
        for target in &g.feeds {
            if let Some(&j) = index.get(target.as_str())
                && j != i
            {
                succ[i].push(j);
                has_pred[j] = true;
                connected[i] = true;
                connected[j] = true;
            }
        }
    }
    for list in &mut succ {
        list.sort_unstable();
        list.dedup();
    }

    let mut state = vec![Visit::New; n];
    let mut dag = vec![Vec::new(); n];
    let mut post = Vec::with_capacity(n);

    let roots = (0..n).filter(|i| !has_pred[*i]);
    let rest = (0..n).filter(|i| has_pred[*i]);
    for node in roots.chain(rest) {
        if connected[node] && state[node] == Visit::New {
            visit(node, &succ, &mut state, &mut dag, &mut post);
        }
    }

    let mut layer = vec![0usize; n];
    for &u in post.iter().rev() {
        for &v in &dag[u] {
            layer[v] = layer[v].max(layer[u] + 1);
        }
    }

    let is_sink = |i: usize| order[i].is_sink();
    let last = (0..n)
        .filter(|&i| connected[i] && !is_sink(i))
        .map(|i| if order[i].is_source() { 0 } else { layer[i] })
        .max()
        .map_or(1, |m| (m + 1).max(1));

    (0..n)
        .map(|i| {
            if !connected[i] {
                None
            } else if order[i].is_source() {
                Some(0)
            } else if is_sink(i) {
                Some(last)
            } else {
                Some(layer[i])
            }
        })
        .collect()
}

pub(super) fn place(groups: &[ArrangeGroup], c: &CanvasConstraints) -> BTreeMap<GroupKey, Rect> {
    let mut order: Vec<&ArrangeGroup> = groups.iter().collect();
    order.sort_by(|a, b| tie_order(a, b));

    let column_of = columns(&order);
    let n_columns = column_of.iter().flatten().max().map_or(0, |m| m + 1);

    let mut stacks: Vec<Vec<&ArrangeGroup>> = vec![Vec::new(); n_columns];
    let mut band = Vec::new();
    for (g, col) in order.iter().zip(&column_of) {
        match col {
            Some(col) => stacks[*col].push(*g),
            None => band.push(*g),
        }
    }

    let mut rects = BTreeMap::new();
    let mut x = c.origin.x;
    let mut bottom = c.origin.y;

    for stack in &stacks {
        let col_width = stack
            .iter()
            .map(|g| g.size(c).width)
            .max()
            .unwrap_or(0)
            .max(c.column_width);

        let mut y = c.origin.y;
        for g in stack {
            let size = g.size(c);
            let origin = c.snap_point(Point::new(x, y));
            rects.insert(g.key.clone(), Rect::new(origin, size));
            y = origin.y + size.height + c.box_spacing;
            bottom = bottom.max(origin.y + size.height);
        }
        x = c.snap(x + col_width + c.column_spacing);
    }

    band.sort_by(|a, b| arrival_order(a, b));
    let band_top = if n_columns > 0 {
        c.snap(bottom + c.column_spacing)
    } else {
        c.origin.y
    };
    place_band(&band, band_top, c, &mut rects);

    rects
}

/// Left to right, wrapping at the band width.
fn place_band(
    band: &[&ArrangeGroup],
    top: i32,
    c: &CanvasConstraints,
    rects: &mut BTreeMap<GroupKey, Rect>,
) {
    let mut x = c.origin.x;
    let mut y = top;
    let mut row_height = 0;

    for g in band {
        let size = g.size(c);
        if x > c.origin.x && x + size.width > c.origin.x + c.band_width {
            x = c.origin.x;
            y = c.snap(y + row_height + c.box_spacing);
            row_height = 0;
        }
        let origin = c.snap_point(Point::new(x, y));
        rects.insert(g.key.clone(), Rect::new(origin, size));
        x = origin.x + size.width + c.box_spacing;
        row_height = row_height.max(size.height);
    }
}
