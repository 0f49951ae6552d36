//! Layout computation: build rows, solve, measure, repeat.
//!
//! Each pass resets the tableau, writes one set of rows for the whole tree
//! and reads every edge back. Wrap-content containers start at their
//! intrinsic size; when a pass shows the children reaching further, the
//! container grows and the pass is re-solved.

use std::collections::HashMap;

use indexmap::IndexMap;
use strut_core::{Axis, LayoutError, SolverError, WidgetId};
use strut_solver::{SolverConfig, Strength, Tableau, Variable, VariableKind, EPSILON};
use tracing::{debug, warn};

use crate::tree::{Bounds, WidgetTree};
use crate::widget::{axis_edges, edge_index, Dimension, Widget};

const AXES: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];

/// Options for layout computation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutOptions {
    /// Solves allowed per layout before wrap-content sizes must settle
    pub max_measure_passes: usize,
    /// Options for the tableau
    pub solver: SolverConfig,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            max_measure_passes: 8,
            solver: SolverConfig::default(),
        }
    }
}

/// How a layout result was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayoutStatus {
    /// Every wrap-content size settled.
    Converged,
    /// The pass cap was hit while containers were still growing. Bounds
    /// come from the last solve.
    PassLimitReached,
    /// Solving failed and the previous geometry was reused.
    Fallback,
}

/// Computed bounds for every widget, in tree order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutSolution {
    bounds: IndexMap<WidgetId, Bounds>,
    status: LayoutStatus,
    passes: usize,
    pivots: usize,
}

impl LayoutSolution {
    pub fn get(&self, id: WidgetId) -> Option<Bounds> {
        self.bounds.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WidgetId, Bounds)> + '_ {
        self.bounds.iter().map(|(id, bounds)| (*id, *bounds))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn status(&self) -> LayoutStatus {
        self.status
    }

    /// Solves run to produce this result.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Pivots summed over all passes.
    pub fn pivots(&self) -> usize {
        self.pivots
    }
}

/// Measured wrap-content sizes, keyed by widget and axis.
type Measured = HashMap<(WidgetId, Axis), f64>;

/// Reusable layout driver. Keeps the last good result so a failed solve can
/// fall back to it.
#[derive(Debug)]
pub struct LayoutEngine {
    tableau: Tableau,
    options: LayoutOptions,
    previous: Option<LayoutSolution>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutOptions::default())
    }
}

impl LayoutEngine {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            tableau: Tableau::with_config(options.solver.clone()),
            options,
            previous: None,
        }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    /// Last result that did not come from a fallback.
    pub fn previous(&self) -> Option<&LayoutSolution> {
        self.previous.as_ref()
    }

    /// Lay out `tree`.
    ///
    /// A solver failure is reported as an error only when there is no earlier
    /// result to fall back to.
    pub fn compute(&mut self, tree: &WidgetTree) -> Result<LayoutSolution, LayoutError> {
        match self.solve(tree) {
            Ok(solution) => {
                self.previous = Some(solution.clone());
                Ok(solution)
            }
            Err(error) => match &self.previous {
                Some(previous) => {
                    warn!(%error, "layout solve failed, reusing previous geometry");
                    Ok(LayoutSolution {
                        status: LayoutStatus::Fallback,
                        ..previous.clone()
                    })
                }
                None => Err(error.into()),
            },
        }
    }

    fn solve(&mut self, tree: &WidgetTree) -> Result<LayoutSolution, SolverError> {
        let limit = self.options.max_measure_passes.max(1);
        let mut measured = Measured::new();
        let mut pivots = 0;
        let mut passes = 0;
        loop {
            passes += 1;
            let bounds = self.solve_pass(tree, &measured, &mut pivots)?;
            let grown = grow_containers(tree, &bounds, &mut measured);
            debug!(pass = passes, widgets = bounds.len(), grown, "layout pass");

            let status = if !grown {
                LayoutStatus::Converged
            } else if passes >= limit {
                warn!(passes, "wrap-content sizes still growing at pass limit");
                LayoutStatus::PassLimitReached
            } else {
                continue;
            };
            return Ok(LayoutSolution {
                bounds,
                status,
                passes,
                pivots,
            });
        }
    }

    fn solve_pass(
        &mut self,
        tree: &WidgetTree,
        measured: &Measured,
        pivots: &mut usize,
    ) -> Result<IndexMap<WidgetId, Bounds>, SolverError> {
        self.tableau.reset();
        let mut edges = Vec::with_capacity(tree.len());
        for _ in 0..tree.len() {
            let quad: [Variable; 4] = [(); 4].map(|()| {
                self.tableau
                    .allocate_variable(VariableKind::Unrestricted, Strength::NONE)
            });
            edges.push(quad);
        }

        for (id, widget) in tree.iter() {
            for axis in AXES {
                self.constrain_axis(&edges, id, widget, axis, measured)?;
            }
        }

        let report = self.tableau.minimize()?;
        *pivots += report.pivots;

        let mut bounds = IndexMap::with_capacity(tree.len());
        for (id, _) in tree.iter() {
            let [left, top, right, bottom] = edges[id.index()];
            let left = self.tableau.read_value(left)?;
            let top = self.tableau.read_value(top)?;
            let right = self.tableau.read_value(right)?;
            let bottom = self.tableau.read_value(bottom)?;
            bounds.insert(id, Bounds::new(left, top, right - left, bottom - top));
        }
        Ok(bounds)
    }

    fn constrain_axis(
        &mut self,
        edges: &[[Variable; 4]],
        id: WidgetId,
        widget: &Widget,
        axis: Axis,
        measured: &Measured,
    ) -> Result<(), SolverError> {
        let (start, end) = axis_edges(axis);
        let own = edges[id.index()];
        let (begin, finish) = (own[edge_index(start)], own[edge_index(end)]);
        let tableau = &mut self.tableau;

        let Some(parent) = widget.parent() else {
            let size = match widget.dimension(axis) {
                Dimension::Fixed(size) => size,
                _ => content_size(widget, id, axis, measured),
            };
            tableau.add_equality_constant(begin, 0.0, Strength::FIXED)?;
            tableau.add_equality(finish, begin, size, Strength::FIXED)?;
            return Ok(());
        };
        let parent_edges = edges[parent.index()];
        let (parent_begin, parent_end) = (
            parent_edges[edge_index(start)],
            parent_edges[edge_index(end)],
        );
        let target = |edge| {
            widget
                .anchor(edge)
                .map(|anchor| (edges[anchor.target.index()][edge_index(anchor.edge)], anchor.margin))
        };
        let (leading, trailing) = (target(start), target(end));
        let stretch = is_stretched(widget, axis);

        match widget.dimension(axis) {
            Dimension::Fixed(size) => {
                tableau.add_equality(finish, begin, size, Strength::FIXED)?;
            }
            Dimension::Percent(fraction) => {
                tableau.add_proportion(finish, begin, parent_begin, parent_end, fraction)?;
            }
            _ if stretch => {}
            _ => {
                let size = content_size(widget, id, axis, measured);
                tableau.add_equality(finish, begin, size, Strength::FIXED)?;
            }
        }

        match (leading, trailing) {
            (Some((begin_target, begin_margin)), Some((end_target, end_margin))) if stretch => {
                tableau.add_equality(begin, begin_target, begin_margin, Strength::FIXED)?;
                tableau.add_equality(finish, end_target, -end_margin, Strength::FIXED)?;
            }
            (Some((begin_target, begin_margin)), Some((end_target, end_margin))) => {
                tableau.add_centering(
                    begin,
                    begin_target,
                    begin_margin,
                    widget.bias(axis).clamp(0.0, 1.0),
                    end_target,
                    finish,
                    end_margin,
                    Strength::CENTERING,
                )?;
            }
            (Some((begin_target, margin)), None) => {
                tableau.add_equality(begin, begin_target, margin, Strength::FIXED)?;
            }
            (None, Some((end_target, margin))) => {
                tableau.add_equality(finish, end_target, -margin, Strength::FIXED)?;
            }
            (None, None) => {
                tableau.add_equality(begin, parent_begin, 0.0, Strength::FIXED)?;
            }
        }
        Ok(())
    }
}

/// Lay out `tree` once, without a previous result to fall back to.
pub fn compute_layout(
    tree: &WidgetTree,
    options: &LayoutOptions,
) -> Result<LayoutSolution, LayoutError> {
    LayoutEngine::new(options.clone()).compute(tree)
}

/// Match-constraint with both anchors: the anchors decide the size.
fn is_stretched(widget: &Widget, axis: Axis) -> bool {
    let (start, end) = axis_edges(axis);
    widget.dimension(axis) == Dimension::MatchConstraint
        && widget.anchor(start).is_some()
        && widget.anchor(end).is_some()
}

fn content_size(widget: &Widget, id: WidgetId, axis: Axis, measured: &Measured) -> f64 {
    measured
        .get(&(id, axis))
        .copied()
        .unwrap_or_else(|| widget.intrinsic(axis))
}

/// Grow wrap-content containers to their children's extent. Returns whether
/// any size changed.
fn grow_containers(
    tree: &WidgetTree,
    bounds: &IndexMap<WidgetId, Bounds>,
    measured: &mut Measured,
) -> bool {
    let mut grown = false;
    for (id, widget) in tree.iter() {
        if widget.children().is_empty() {
            continue;
        }
        let Some(own) = bounds.get(&id) else {
            continue;
        };
        for axis in AXES {
            let wraps = match widget.dimension(axis) {
                Dimension::WrapContent => true,
                Dimension::MatchConstraint => !is_stretched(widget, axis),
                Dimension::Fixed(_) | Dimension::Percent(_) => false,
            };
            if !wraps {
                continue;
            }
            let extent = content_extent(tree, id, widget, own, bounds, axis);
            let current = content_size(widget, id, axis, measured);
            if extent > current + EPSILON {
                measured.insert((id, axis), extent);
                grown = true;
            }
        }
    }
    grown
}

/// Space the children of `id` need along `axis`, margins to the container
/// included. Children sized from the container are skipped.
fn content_extent(
    tree: &WidgetTree,
    id: WidgetId,
    widget: &Widget,
    own: &Bounds,
    bounds: &IndexMap<WidgetId, Bounds>,
    axis: Axis,
) -> f64 {
    let (start, end) = axis_edges(axis);
    let origin = own.edge(start);
    let mut extent = widget.intrinsic(axis);
    for &child in widget.children() {
        let (Some(record), Some(placed)) = (tree.get(child), bounds.get(&child)) else {
            continue;
        };
        if matches!(record.dimension(axis), Dimension::Percent(_)) || is_stretched(record, axis) {
            continue;
        }
        let margin_to = |edge, container_edge| {
            record
                .anchor(edge)
                .filter(|anchor| anchor.target == id && anchor.edge == container_edge)
                .map_or(0.0, |anchor| anchor.margin)
        };
        let lead = margin_to(start, start);
        let trail = margin_to(end, end);
        let size = placed.edge(end) - placed.edge(start);
        extent = extent
            .max(placed.edge(end) - origin + trail)
            .max(lead + size + trail);
    }
    extent
}
