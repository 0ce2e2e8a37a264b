//! Drag-to-reorder coordinator.
//!
//! The pointer gesture is folded into an explicit state machine: `Idle`
//! until a press on a block turns into a drag, `Dragging` while the
//! pointer moves, back to `Idle` on release or cancel. Index arithmetic
//! lives in free functions so it can be tested without a terminal.

/// Side of the hovered block the dragged block would land on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropTarget {
    pub block_id: String,
    pub placement: Placement,
}

#[derive(Clone, Debug, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging {
        source_id: String,
        snapshot: Vec<String>,
        target: Option<DropTarget>,
    },
}

/// What a pointer release amounts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// No drag was in progress.
    NotDragging,
    /// Drag ended without a usable target (left the page, or dropped on
    /// the dragged block itself).
    Cancelled,
    /// A reorder should be attempted; `snapshot` is the pre-drag order
    /// to restore if persisting the new order fails.
    Move {
        source_id: String,
        target: DropTarget,
        snapshot: Vec<String>,
    },
}

#[derive(Debug, Default)]
pub struct DragReorder {
    state: DragState,
}

impl DragReorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Dragging`, capturing the dragged block and a snapshot of
    /// the current order list for rollback.
    pub fn begin(&mut self, source_id: impl Into<String>, snapshot: Vec<String>) {
        self.state = DragState::Dragging {
            source_id: source_id.into(),
            snapshot,
            target: None,
        };
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn source_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { source_id, .. } => Some(source_id),
            DragState::Idle => None,
        }
    }

    /// Current drop target, used to draw the indicator line.
    pub fn target(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Dragging { target, .. } => target.as_ref(),
            DragState::Idle => None,
        }
    }

    /// Update the hover target. Hovering the dragged block itself (or
    /// nothing) removes the indicator.
    pub fn hover(&mut self, candidate: Option<(&str, Placement)>) {
        let DragState::Dragging {
            source_id, target, ..
        } = &mut self.state
        else {
            return;
        };
        *target = match candidate {
            Some((block_id, placement)) if block_id != source_id => Some(DropTarget {
                block_id: block_id.to_string(),
                placement,
            }),
            _ => None,
        };
    }

    /// Pointer released: leave `Dragging` and report what to do.
    pub fn finish(&mut self) -> DropOutcome {
        match std::mem::take(&mut self.state) {
            DragState::Idle => DropOutcome::NotDragging,
            DragState::Dragging {
                source_id,
                snapshot,
                target,
            } => match target {
                Some(target) if target.block_id != source_id => DropOutcome::Move {
                    source_id,
                    target,
                    snapshot,
                },
                _ => DropOutcome::Cancelled,
            },
        }
    }

    /// Abandon the gesture and clear all transient state.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Before/after decision from the vertical midpoint of the hovered
/// block's extent, in document-line coordinates.
pub fn placement_for(block_top: usize, block_height: usize, pointer_line: usize) -> Placement {
    let offset = pointer_line.saturating_sub(block_top);
    if offset * 2 < block_height.max(1) {
        Placement::Before
    } else {
        Placement::After
    }
}

/// The order list after moving `source_id` next to `target_id`.
///
/// The source is removed first, so the target's index shifts when it sat
/// behind the source: for a target originally after the source, "before"
/// maps to target-1 and "after" to target; for a target originally
/// before it, "before" maps to target and "after" to target+1.
///
/// Returns `None` when either identifier is missing or both are equal.
pub fn reordered(
    order: &[String],
    source_id: &str,
    target_id: &str,
    placement: Placement,
) -> Option<Vec<String>> {
    if source_id == target_id {
        return None;
    }
    let source_index = order.iter().position(|id| id == source_id)?;
    let target_index = order.iter().position(|id| id == target_id)?;

    let mut new_order: Vec<String> = order.to_vec();
    new_order.remove(source_index);

    let new_index = if target_index > source_index {
        match placement {
            Placement::Before => target_index - 1,
            Placement::After => target_index,
        }
    } else {
        match placement {
            Placement::Before => target_index,
            Placement::After => target_index + 1,
        }
    };
    new_order.insert(new_index, source_id.to_string());
    Some(new_order)
}

#[cfg(test)]
#[path = "reorder_tests.rs"]
mod reorder_tests;
