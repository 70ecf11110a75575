use crate::meme::model::{self, TextBox, TextBoxField};

/// Position update emitted while a drag gesture is active.
#[derive(Debug, Clone, PartialEq)]
pub struct DragUpdate {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl DragUpdate {
    pub fn apply(&self, boxes: &[TextBox]) -> Vec<TextBox> {
        model::update(
            boxes,
            &self.id,
            TextBoxField::Position {
                x: self.x,
                y: self.y,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveDrag {
    id: String,
    offset: (f64, f64),
}

/// Tracks at most one press-move-release gesture.
///
/// While a gesture is active the caller routes every pointer event here, not
/// only the ones over the dragged box, so fast drags that leave the box keep
/// tracking. No bounds clamping is applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DragController {
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    /// Start a gesture on `target`. Returns false and keeps the current
    /// gesture when one is already active.
    pub fn press(&mut self, target: &TextBox, pointer: (f64, f64)) -> bool {
        if let Some(active) = &self.active {
            tracing::debug!(
                active = %active.id,
                ignored = %target.id,
                "press ignored while another drag is active"
            );
            return false;
        }

        self.active = Some(ActiveDrag {
            id: target.id.clone(),
            offset: (pointer.0 - target.x, pointer.1 - target.y),
        });
        true
    }

    pub fn pointer_move(&self, pointer: (f64, f64)) -> Option<DragUpdate> {
        let active = self.active.as_ref()?;
        Some(DragUpdate {
            id: active.id.clone(),
            x: pointer.0 - active.offset.0,
            y: pointer.1 - active.offset.1,
        })
    }

    /// End the gesture. Returns whether one was active.
    pub fn release(&mut self) -> bool {
        self.active.take().is_some()
    }

    pub fn offset(&self) -> Option<(f64, f64)> {
        self.active.as_ref().map(|a| a.offset)
    }
}
