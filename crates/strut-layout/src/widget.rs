//! Widget descriptions: anchors, dimensions and bias.

use smallvec::SmallVec;
use strut_core::{Axis, Edge, WidgetId};

/// How a widget's size along one axis is decided.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimension {
    /// Exact size in layout units.
    Fixed(f64),
    /// Fraction of the parent's size on the same axis.
    Percent(f64),
    /// Intrinsic size, or for containers the extent of the children.
    #[default]
    WrapContent,
    /// Stretch between both anchors. Without two anchors this behaves like
    /// [`Dimension::WrapContent`].
    MatchConstraint,
}

/// Connection from one of a widget's edges to an edge of its parent or a
/// sibling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Anchor {
    pub target: WidgetId,
    pub edge: Edge,
    /// Gap kept between the two edges, measured into the widget.
    pub margin: f64,
}

/// One box in a [`WidgetTree`](crate::WidgetTree).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Widget {
    /// Optional name for debugging
    pub name: Option<String>,
    pub width: Dimension,
    pub height: Dimension,
    /// Size reported by the content (text, image) for wrap-content axes
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
    pub horizontal_bias: f64,
    pub vertical_bias: f64,
    pub(crate) parent: Option<WidgetId>,
    pub(crate) children: SmallVec<[WidgetId; 4]>,
    /// Indexed by [`edge_index`].
    pub(crate) anchors: [Option<Anchor>; 4],
}

impl Default for Widget {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget {
    /// A wrap-content widget with no content and centered bias.
    pub fn new() -> Self {
        Self {
            name: None,
            width: Dimension::WrapContent,
            height: Dimension::WrapContent,
            intrinsic_width: 0.0,
            intrinsic_height: 0.0,
            horizontal_bias: 0.5,
            vertical_bias: 0.5,
            parent: None,
            children: SmallVec::new(),
            anchors: [None; 4],
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, width: Dimension, height: Dimension) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_intrinsic(mut self, width: f64, height: f64) -> Self {
        self.intrinsic_width = width;
        self.intrinsic_height = height;
        self
    }

    /// Bias along `axis`, clamped to `[0, 1]` at solve time.
    pub fn with_bias(mut self, axis: Axis, bias: f64) -> Self {
        match axis {
            Axis::Horizontal => self.horizontal_bias = bias,
            Axis::Vertical => self.vertical_bias = bias,
        }
        self
    }

    pub fn parent(&self) -> Option<WidgetId> {
        self.parent
    }

    pub fn children(&self) -> &[WidgetId] {
        &self.children
    }

    pub fn anchor(&self, edge: Edge) -> Option<&Anchor> {
        self.anchors[edge_index(edge)].as_ref()
    }

    pub fn dimension(&self, axis: Axis) -> Dimension {
        match axis {
            Axis::Horizontal => self.width,
            Axis::Vertical => self.height,
        }
    }

    pub fn intrinsic(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.intrinsic_width,
            Axis::Vertical => self.intrinsic_height,
        }
    }

    pub fn bias(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.horizontal_bias,
            Axis::Vertical => self.vertical_bias,
        }
    }
}

/// Slot of an edge in per-widget edge arrays.
pub(crate) fn edge_index(edge: Edge) -> usize {
    match edge {
        Edge::Left => 0,
        Edge::Top => 1,
        Edge::Right => 2,
        Edge::Bottom => 3,
    }
}

/// Leading and trailing edge of an axis.
pub(crate) fn axis_edges(axis: Axis) -> (Edge, Edge) {
    match axis {
        Axis::Horizontal => (Edge::Left, Edge::Right),
        Axis::Vertical => (Edge::Top, Edge::Bottom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let widget = Widget::new()
            .with_name("title")
            .with_size(Dimension::Fixed(10.0), Dimension::Percent(0.5))
            .with_intrinsic(3.0, 4.0)
            .with_bias(Axis::Vertical, 0.2);
        assert_eq!(widget.name.as_deref(), Some("title"));
        assert_eq!(widget.dimension(Axis::Horizontal), Dimension::Fixed(10.0));
        assert_eq!(widget.dimension(Axis::Vertical), Dimension::Percent(0.5));
        assert_eq!(widget.intrinsic(Axis::Vertical), 4.0);
        assert_eq!(widget.bias(Axis::Horizontal), 0.5);
        assert_eq!(widget.bias(Axis::Vertical), 0.2);
        assert!(widget.anchor(Edge::Left).is_none());
    }

    #[test]
    fn test_axis_edges_match_edge_axis() {
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let (start, end) = axis_edges(axis);
            assert_eq!(start.axis(), axis);
            assert_eq!(end.axis(), axis);
            assert!(start.is_start());
            assert_eq!(start.opposite(), end);
        }
    }
}
