//! Box sizing.
//!
//! A box lays its ports out either in one column (inputs above outputs) or
//! side by side (inputs left, outputs right). The automatic modes pick the
//! side-by-side layout while its area stays within a ratio of the
//! single-column area.

use serde::{Deserialize, Serialize};

use super::geometry::{CanvasConstraints, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortLayout {
    /// Single column
    High,
    /// Inputs and outputs side by side
    Large,
}

/// Per-box layout policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutMode {
    #[default]
    AutoSmallArea,
    PreferLarge,
    MostlyLarge,
    ForceLarge,
    Manual(PortLayout),
}

impl LayoutMode {
    /// Largest accepted ratio of side-by-side area to single-column area.
    fn large_ratio(&self) -> Option<f64> {
        match self {
            Self::AutoSmallArea => Some(1.0),
            Self::PreferLarge => Some(1.1),
            Self::MostlyLarge => Some(1.4),
            Self::ForceLarge | Self::Manual(_) => None,
        }
    }
}

/// What sizing needs to know about one box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxContent<'a> {
    /// Title length in characters
    pub title_len: usize,
    /// Display-name lengths of the input ports, in characters
    pub inputs: &'a [usize],
    pub outputs: &'a [usize],
    pub layout: LayoutMode,
    pub wrapped: bool,
}

const TITLE_PADDING: i32 = 16;
const PORT_PADDING: i32 = 12;
const COLUMN_GAP: i32 = 20;
const MIN_WIDTH: i32 = 60;

fn port_width(len: usize, c: &CanvasConstraints) -> i32 {
    (len as i32 * c.char_width + PORT_PADDING).min(c.max_port_width)
}

fn widest(lens: &[usize], c: &CanvasConstraints) -> i32 {
    lens.iter().map(|l| port_width(*l, c)).max().unwrap_or(0)
}

/// Resolve the layout actually used for a box.
pub fn effective_layout(content: &BoxContent<'_>, c: &CanvasConstraints) -> PortLayout {
    match content.layout {
        LayoutMode::Manual(layout) => return layout,
        LayoutMode::ForceLarge => return PortLayout::Large,
        _ => {}
    }

    // one-sided boxes look the same either way
    if content.inputs.is_empty() || content.outputs.is_empty() {
        return PortLayout::High;
    }

    let high = measure(content, PortLayout::High, c);
    let large = measure(content, PortLayout::Large, c);
    let ratio = content.layout.large_ratio().unwrap_or(1.0);

    if large.area() as f64 <= high.area() as f64 * ratio {
        PortLayout::Large
    } else {
        PortLayout::High
    }
}

fn measure(content: &BoxContent<'_>, layout: PortLayout, c: &CanvasConstraints) -> Size {
    let title = content.title_len as i32 * c.char_width + TITLE_PADDING;
    let (w_in, w_out) = (widest(content.inputs, c), widest(content.outputs, c));
    let (n_in, n_out) = (content.inputs.len() as i32, content.outputs.len() as i32);

    let (ports_width, rows) = match layout {
        PortLayout::High => (w_in.max(w_out), n_in + n_out),
        PortLayout::Large => {
            let gap = if n_in > 0 && n_out > 0 { COLUMN_GAP } else { 0 };
            (w_in + w_out + gap, n_in.max(n_out))
        }
    };

    Size::new(
        title.max(ports_width).max(MIN_WIDTH),
        c.header_height + rows * c.port_height,
    )
}

/// Size of a box on the canvas. Identical in every arrangement mode.
pub fn box_size(content: &BoxContent<'_>, c: &CanvasConstraints) -> Size {
    let size = measure(content, effective_layout(content, c), c);
    if content.wrapped {
        Size::new(size.width, c.header_height)
    } else {
        size
    }
}
