use crate::api::RenderRequest;
use crate::foundation::core::CropRect;
use crate::history::EditHistory;
use crate::params::{NOMINAL, OverlayPlacement, ToneAdjust};
use crate::schema::Overlay;

/// Snapshot of the editable controls.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditState {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub crop: CropRect,
}

impl Default for EditState {
    fn default() -> Self {
        Self {
            scale_x: NOMINAL,
            scale_y: NOMINAL,
            offset_x: 0.0,
            offset_y: 0.0,
            brightness: NOMINAL,
            contrast: NOMINAL,
            crop: CropRect::FULL,
        }
    }
}

impl EditState {
    /// CSS filter that previews the brightness/contrast adjustment.
    pub fn css_filter(&self) -> String {
        format!(
            "brightness({}) contrast({})",
            self.brightness / NOMINAL,
            self.contrast / NOMINAL
        )
    }

    /// CSS transform that previews overlay placement: centred on the top edge, then offset and
    /// scaled.
    pub fn overlay_transform(&self) -> String {
        format!(
            "translate(-50%, 0) translate({}%, {}%) scale({}, {})",
            self.offset_x,
            self.offset_y,
            self.scale_x / NOMINAL,
            self.scale_y / NOMINAL
        )
    }

    pub fn tone(&self) -> ToneAdjust {
        ToneAdjust {
            brightness: self.brightness,
            contrast: self.contrast,
        }
    }

    pub fn placement(&self, overlay: Overlay) -> OverlayPlacement {
        OverlayPlacement {
            overlay,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }

    fn reset_placement(&mut self) {
        let defaults = Self::default();
        self.scale_x = defaults.scale_x;
        self.scale_y = defaults.scale_y;
        self.offset_x = defaults.offset_x;
        self.offset_y = defaults.offset_y;
    }
}

/// Whatever displays the controls. Called synchronously after every state change so the
/// visible controls always match the top of the history.
pub trait EditSurface {
    fn show_state(&mut self, state: &EditState);

    fn show_overlay(&mut self, _overlay: Option<Overlay>) {}
}

/// Edit session: history plus the surface it drives.
pub struct Editor<S> {
    history: EditHistory<EditState>,
    overlay: Option<Overlay>,
    surface: S,
}

impl<S: EditSurface> Editor<S> {
    /// Start from `initial` (recorded as the first history entry) and show it.
    pub fn new(surface: S, initial: EditState) -> Self {
        let mut editor = Self {
            history: EditHistory::new(initial),
            overlay: None,
            surface,
        };
        editor.refresh();
        editor
    }

    pub fn current(&self) -> &EditState {
        self.history.current()
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.overlay
    }

    pub fn history(&self) -> &EditHistory<EditState> {
        &self.history
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Apply one discrete adjustment and record the result.
    pub fn edit(&mut self, change: impl FnOnce(&mut EditState)) {
        let mut next = *self.history.current();
        change(&mut next);
        self.history.record(next);
        self.refresh();
    }

    /// Select an overlay. Placement goes back to 1:1 with no offset, recorded as one entry.
    pub fn select_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
        self.surface.show_overlay(self.overlay);
        self.edit(EditState::reset_placement);
    }

    pub fn clear_overlay(&mut self) {
        self.overlay = None;
        self.surface.show_overlay(None);
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo().is_some();
        if moved {
            self.refresh();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo().is_some();
        if moved {
            self.refresh();
        }
        moved
    }

    /// Write the current state back to the surface. Never records.
    fn refresh(&mut self) {
        self.surface.show_state(self.history.current());
    }

    /// Render request for the current state. Overlay fields are sent only with an overlay.
    pub fn to_request(&self, asset_id: &str, size: &str, bgcolor: &str) -> RenderRequest {
        let state = self.current();
        let mut req = RenderRequest {
            asset_id: Some(asset_id.to_string()),
            size: Some(size.to_string()),
            bgcolor: Some(bgcolor.to_string()),
            crop_x: Some(state.crop.x),
            crop_y: Some(state.crop.y),
            crop_w: Some(state.crop.width),
            crop_h: Some(state.crop.height),
            brightness: Some(state.brightness),
            contrast: Some(state.contrast),
            ..RenderRequest::default()
        };
        if let Some(overlay) = self.overlay {
            req.overlay = Some(overlay.as_str().to_string());
            req.overlay_scale_x = Some(state.scale_x);
            req.overlay_scale_y = Some(state.scale_y);
            req.overlay_offset_x = Some(state.offset_x);
            req.overlay_offset_y = Some(state.offset_y);
        }
        req
    }
}

#[cfg(test)]
#[path = "../../tests/unit/history/editor.rs"]
mod tests;
