//! Trait for render backends. The host drives any backend through prepare + render_frame.

use crate::{ExtractedMeshes, ExtractedView, Light};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

pub trait RenderBackend: Send {
    /// Upload new or changed meshes and forget entities that disappeared.
    fn prepare(&mut self, extracted: &ExtractedMeshes);

    /// Register a light for the rest of the run.
    fn add_light(&mut self, light: Light) -> Result<(), String>;

    /// Render one frame offscreen. Submits work internally.
    fn render_frame(&mut self, view: &ExtractedView) -> Result<(), String>;
}

/// Extension for backends that can present to a window. Host passes raw handles (e.g. from winit);
/// the backend owns the surface and performs get_current_texture + present internally.
pub trait RenderBackendWindow: RenderBackend + Send {
    fn render_frame_to_window(
        &mut self,
        view: &ExtractedView,
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), String>;
}
