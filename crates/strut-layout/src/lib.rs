//! Widget layout for strut.
//!
//! This crate turns a tree of anchored boxes into tableau rows, solves them
//! and copies the geometry back.
//!
//! # Architecture
//!
//! 1. **Tree**: widgets with anchors, dimensions and bias
//! 2. **Build**: one row set per pass, from edges and dimensions
//! 3. **Measure**: wrap-content containers grow to their children and the
//!    pass is re-solved, up to a fixed number of passes
//!
//! # Example
//!
//! ```
//! use strut_core::Edge;
//! use strut_layout::{compute_layout, Dimension, LayoutOptions, Widget, WidgetTree};
//!
//! let mut tree = WidgetTree::new(400.0, 300.0);
//! let root = tree.root();
//! let button = tree
//!     .add_child(root, Widget::new().with_size(Dimension::Fixed(120.0), Dimension::Fixed(40.0)))
//!     .unwrap();
//! tree.anchor(button, Edge::Left, root, Edge::Left, 16.0).unwrap();
//! tree.anchor(button, Edge::Top, root, Edge::Top, 16.0).unwrap();
//!
//! let layout = compute_layout(&tree, &LayoutOptions::default()).unwrap();
//! assert_eq!(layout.get(button).map(|b| b.x), Some(16.0));
//! ```

mod compute;
mod tree;
mod widget;

pub use compute::{compute_layout, LayoutEngine, LayoutOptions, LayoutSolution, LayoutStatus};
pub use tree::{Bounds, WidgetTree};
pub use widget::{Anchor, Dimension, Widget};
