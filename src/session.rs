use thiserror::Error;

use crate::overlay::{Offset, Overlay, OverlayId, OverlayKind, StickerSource, TextColor};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("overlay {0} not found")]
    NotFound(OverlayId),
    #[error("rejected gesture for overlay {id}: {reason}")]
    InvalidGesture { id: OverlayId, reason: String },
}

/// Incremental change reported by a transform gesture (pinch, pan, twist).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gesture {
    pub zoom: f32,
    /// Pan in physical pixels.
    pub pan: Offset,
    /// Rotation delta in degrees.
    pub rotation: f32,
}

impl Default for Gesture {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Offset::default(),
            rotation: 0.0,
        }
    }
}

/// Overlays being edited on one base image. Single writer; hand
/// [`EditorSession::snapshot`] to the compositor.
#[derive(Debug)]
pub struct EditorSession {
    overlays: Vec<Overlay>,
    next_id: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            overlays: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add_text(&mut self, content: impl Into<String>, color: TextColor) -> OverlayId {
        self.push(OverlayKind::Text {
            content: content.into(),
            color: Some(color),
        })
    }

    pub fn add_sticker(&mut self, source: StickerSource) -> OverlayId {
        self.push(OverlayKind::Sticker { source })
    }

    fn push(&mut self, kind: OverlayKind) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        self.overlays.push(Overlay::new(id, kind));
        tracing::debug!(%id, "overlay added");
        id
    }

    pub fn remove(&mut self, id: OverlayId) -> Option<Overlay> {
        let idx = self.overlays.iter().position(|overlay| overlay.id == id)?;
        Some(self.overlays.remove(idx))
    }

    pub fn get(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|overlay| overlay.id == id)
    }

    fn get_mut(&mut self, id: OverlayId) -> Result<&mut Overlay, SessionError> {
        self.overlays
            .iter_mut()
            .find(|overlay| overlay.id == id)
            .ok_or(SessionError::NotFound(id))
    }

    /// Overlays in draw order, bottom first.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn replace_kind(&mut self, id: OverlayId, kind: OverlayKind) -> Result<(), SessionError> {
        self.get_mut(id)?.kind = kind;
        Ok(())
    }

    pub fn drag(&mut self, id: OverlayId, pan: Offset, density: f32) -> Result<(), SessionError> {
        self.transform(
            id,
            Gesture {
                pan,
                ..Gesture::default()
            },
            density,
        )
    }

    pub fn transform(
        &mut self,
        id: OverlayId,
        gesture: Gesture,
        density: f32,
    ) -> Result<(), SessionError> {
        let reject = |reason: String| SessionError::InvalidGesture { id, reason };
        if !(gesture.zoom.is_finite() && gesture.zoom > 0.0) {
            return Err(reject(format!("zoom must be positive, got {}", gesture.zoom)));
        }
        if !gesture.pan.is_finite() || !gesture.rotation.is_finite() {
            return Err(reject("pan and rotation must be finite".to_string()));
        }
        if !(density.is_finite() && density > 0.0) {
            return Err(reject(format!("density must be positive, got {}", density)));
        }

        let overlay = self.get_mut(id)?;
        let scale = overlay.scale * gesture.zoom;
        let position = Offset::new(
            overlay.position.x + gesture.pan.x / density,
            overlay.position.y + gesture.pan.y / density,
        );
        if !(scale.is_finite() && scale > 0.0) || !position.is_finite() {
            return Err(reject("gesture would leave overlay out of range".to_string()));
        }
        overlay.scale = scale;
        overlay.position = position;
        overlay.rotation += gesture.rotation;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Overlay> {
        self.overlays.clone()
    }

    /// Drops every overlay. Ids keep counting up.
    pub fn clear(&mut self) {
        self.overlays.clear();
    }
}
