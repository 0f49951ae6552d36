//! Widget tree and computed bounds.
//!
//! Widgets live in an arena indexed by [`WidgetId`]. The root is created
//! with the tree and every other widget hangs below it.

use glam::Vec2;
use strut_core::{Edge, LayoutError, WidgetId};

use crate::widget::{edge_index, Anchor, Dimension, Widget};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Position in root coordinates
    pub x: f64,
    pub y: f64,
    /// Size of the widget
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Create bounds with position and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create bounds from position and size vectors.
    pub fn from_vecs(position: Vec2, size: Vec2) -> Self {
        Self::new(
            position.x as f64,
            position.y as f64,
            size.x as f64,
            size.y as f64,
        )
    }

    /// Get position as Vec2.
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Get size as Vec2.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Coordinate of an edge.
    pub fn edge(&self, edge: Edge) -> f64 {
        match edge {
            Edge::Left => self.x,
            Edge::Top => self.y,
            Edge::Right => self.right(),
            Edge::Bottom => self.bottom(),
        }
    }

    /// Check if a point is inside the bounds.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// Arena of widgets rooted at a fixed-size container.
#[derive(Debug, Clone)]
pub struct WidgetTree {
    widgets: Vec<Widget>,
}

impl WidgetTree {
    /// Create a tree whose root container has the given size.
    pub fn new(width: f64, height: f64) -> Self {
        let root = Widget::new()
            .with_name("root")
            .with_size(Dimension::Fixed(width), Dimension::Fixed(height));
        Self::with_root(root)
    }

    /// Create a tree from a custom root widget. Root anchors are ignored.
    pub fn with_root(mut root: Widget) -> Self {
        root.parent = None;
        root.children.clear();
        root.anchors = [None; 4];
        Self {
            widgets: vec![root],
        }
    }

    pub fn root(&self) -> WidgetId {
        WidgetId(0)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// A tree always holds its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(id.index())
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(id.index())
    }

    /// Like [`WidgetTree::get`], as an error for unknown ids.
    pub fn widget(&self, id: WidgetId) -> Result<&Widget, LayoutError> {
        self.get(id).ok_or(LayoutError::UnknownWidget { id })
    }

    /// All widgets, parents before their children.
    pub fn iter(&self) -> impl Iterator<Item = (WidgetId, &Widget)> {
        self.widgets
            .iter()
            .enumerate()
            .map(|(index, widget)| (WidgetId(index as u32), widget))
    }

    /// Insert `widget` as the last child of `parent`.
    pub fn add_child(&mut self, parent: WidgetId, mut widget: Widget) -> Result<WidgetId, LayoutError> {
        self.widget(parent)?;
        let id = WidgetId(self.widgets.len() as u32);
        widget.parent = Some(parent);
        widget.children.clear();
        widget.anchors = [None; 4];
        self.widgets.push(widget);
        self.widgets[parent.index()].children.push(id);
        Ok(id)
    }

    /// Anchor `edge` of `widget` to `target_edge` of `target`.
    ///
    /// The target must be the widget's parent or a sibling, and both edges
    /// must lie on the same axis. Replaces an earlier anchor on `edge`.
    pub fn anchor(
        &mut self,
        widget: WidgetId,
        edge: Edge,
        target: WidgetId,
        target_edge: Edge,
        margin: f64,
    ) -> Result<(), LayoutError> {
        let parent = self.widget(widget)?.parent;
        let target_parent = self.widget(target)?.parent;
        let invalid = |reason| LayoutError::InvalidAnchor {
            widget,
            edge,
            reason,
        };

        let Some(parent) = parent else {
            return Err(invalid("root widget cannot be anchored"));
        };
        if target == widget {
            return Err(invalid("widget cannot anchor to itself"));
        }
        if edge.axis() != target_edge.axis() {
            return Err(invalid("edges lie on different axes"));
        }
        if target != parent && target_parent != Some(parent) {
            return Err(invalid("target is neither parent nor sibling"));
        }

        self.widgets[widget.index()].anchors[edge_index(edge)] = Some(Anchor {
            target,
            edge: target_edge,
            margin,
        });
        Ok(())
    }

    /// Remove the anchor on `edge`, if any.
    pub fn clear_anchor(&mut self, widget: WidgetId, edge: Edge) -> Result<(), LayoutError> {
        let record = self
            .get_mut(widget)
            .ok_or(LayoutError::UnknownWidget { id: widget })?;
        record.anchors[edge_index(edge)] = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_edges() {
        let bounds = Bounds::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(bounds.edge(Edge::Left), 10.0);
        assert_eq!(bounds.edge(Edge::Right), 40.0);
        assert_eq!(bounds.edge(Edge::Bottom), 60.0);
        assert!(bounds.contains(15.0, 25.0));
        assert!(!bounds.contains(45.0, 25.0));
        assert_eq!(bounds.size(), Vec2::new(30.0, 40.0));
        assert_eq!(Bounds::from_vecs(bounds.position(), bounds.size()), bounds);
    }

    #[test]
    fn test_add_child_links_parent() {
        let mut tree = WidgetTree::new(100.0, 100.0);
        let root = tree.root();
        let a = tree.add_child(root, Widget::new()).unwrap();
        let b = tree.add_child(a, Widget::new()).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.widget(root).unwrap().children(), &[a]);
        assert_eq!(tree.widget(b).unwrap().parent(), Some(a));
        assert!(matches!(
            tree.add_child(WidgetId(9), Widget::new()),
            Err(LayoutError::UnknownWidget { id: WidgetId(9) })
        ));
    }

    #[test]
    fn test_anchor_validation() {
        let mut tree = WidgetTree::new(100.0, 100.0);
        let root = tree.root();
        let a = tree.add_child(root, Widget::new()).unwrap();
        let b = tree.add_child(root, Widget::new()).unwrap();
        let nested = tree.add_child(a, Widget::new()).unwrap();

        tree.anchor(a, Edge::Left, root, Edge::Left, 8.0).unwrap();
        tree.anchor(b, Edge::Left, a, Edge::Right, 4.0).unwrap();
        assert_eq!(
            tree.widget(b).unwrap().anchor(Edge::Left).map(|a| a.margin),
            Some(4.0)
        );

        let reason = |result: Result<(), LayoutError>| match result {
            Err(LayoutError::InvalidAnchor { reason, .. }) => reason,
            other => panic!("expected invalid anchor, got {other:?}"),
        };
        assert_eq!(
            reason(tree.anchor(a, Edge::Left, root, Edge::Top, 0.0)),
            "edges lie on different axes"
        );
        assert_eq!(
            reason(tree.anchor(a, Edge::Left, a, Edge::Right, 0.0)),
            "widget cannot anchor to itself"
        );
        assert_eq!(
            reason(tree.anchor(b, Edge::Left, nested, Edge::Right, 0.0)),
            "target is neither parent nor sibling"
        );
        assert_eq!(
            reason(tree.anchor(root, Edge::Left, a, Edge::Left, 0.0)),
            "root widget cannot be anchored"
        );

        tree.clear_anchor(b, Edge::Left).unwrap();
        assert!(tree.widget(b).unwrap().anchor(Edge::Left).is_none());
    }
}
