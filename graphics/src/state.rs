//! Render state tracked on both sides of the command queue.
//!
//! The application mutates a *logical* [`RenderState`] through the render
//! system's setters. Every render command carries a snapshot of it; the
//! render thread diffs that snapshot against the *device* state and only
//! issues the hooks for fields that changed.

use bitflags::bitflags;
use vesper_core::{Color, Mat4, Rect};

use crate::texture::TextureId;

/// How source pixels combine with the render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Alpha,
    Add,
    Subtract,
    Overwrite,
}

/// How the vertex or system color combines with the texture color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    #[default]
    Multiply,
    /// Texture alpha only, color taken from the vertex.
    AlphaMap,
    /// Interpolate texture color towards the vertex color by the factor.
    Lerp,
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Clamp,
}

/// Primitive topology of a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    TriangleList,
    TriangleStrip,
    TriangleFan,
    LineList,
    LineStrip,
    PointList,
}

/// Coarse primitive class used to select a pipeline permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveClass {
    Triangles,
    Lines,
    Points,
}

impl Primitive {
    pub fn class(self) -> PrimitiveClass {
        match self {
            Self::TriangleList | Self::TriangleStrip | Self::TriangleFan => {
                PrimitiveClass::Triangles
            }
            Self::LineList | Self::LineStrip => PrimitiveClass::Lines,
            Self::PointList => PrimitiveClass::Points,
        }
    }

    /// Number of triangles drawn from `vertices` vertices.
    pub fn triangle_count(self, vertices: usize) -> usize {
        match self {
            Self::TriangleList => vertices / 3,
            Self::TriangleStrip | Self::TriangleFan => vertices.saturating_sub(2),
            _ => 0,
        }
    }

    /// Number of line segments drawn from `vertices` vertices.
    pub fn line_count(self, vertices: usize) -> usize {
        match self {
            Self::LineList => vertices / 2,
            Self::LineStrip => vertices.saturating_sub(1),
            _ => 0,
        }
    }
}

/// Key of a shader/pipeline permutation.
///
/// Backends that compose pipelines per permutation cache them under this key.
/// `use_texture` is only known once the texture binding is resolved, which is
/// why texture binding precedes the blend and color mode hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub use_texture: bool,
    pub use_color: bool,
    pub color_mode: ColorMode,
    pub blend_mode: BlendMode,
    pub primitive_class: PrimitiveClass,
    pub depth_enabled: bool,
}

bitflags! {
    /// Fields that differ between two render states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateChanges: u32 {
        const RENDER_TARGET = 1 << 0;
        const VIEWPORT = 1 << 1;
        const MODELVIEW = 1 << 2;
        const PROJECTION = 1 << 3;
        const DEPTH = 1 << 4;
        const TEXTURE = 1 << 5;
        const BLEND_MODE = 1 << 6;
        const COLOR_MODE = 1 << 7;
    }
}

/// Full set of pipeline parameters.
///
/// Texture and render target are weak references by id; a render state never
/// keeps a texture alive.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub viewport: Rect,
    pub modelview: Mat4,
    pub projection: Mat4,
    pub depth_buffer: bool,
    pub depth_write: bool,
    pub texture: Option<TextureId>,
    pub texture_filter: TextureFilter,
    pub texture_address_mode: AddressMode,
    pub blend_mode: BlendMode,
    pub color_mode: ColorMode,
    pub color_mode_factor: f32,
    /// Constant color for vertices without a color channel.
    pub system_color: Color,
    pub render_target: Option<TextureId>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            viewport: Rect::default(),
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            depth_buffer: false,
            depth_write: false,
            texture: None,
            texture_filter: TextureFilter::default(),
            texture_address_mode: AddressMode::default(),
            blend_mode: BlendMode::default(),
            color_mode: ColorMode::default(),
            color_mode_factor: 1.0,
            system_color: Color::WHITE,
            render_target: None,
        }
    }
}

impl RenderState {
    /// Default state covering a `width` x `height` viewport.
    pub fn with_viewport(width: u32, height: u32) -> Self {
        Self {
            viewport: Rect::from_size(width, height),
            ..Self::default()
        }
    }

    /// Fields of `self` that differ from `device`.
    ///
    /// `system_color` is not a device field; it travels with each draw.
    pub fn diff(&self, device: &RenderState) -> StateChanges {
        let mut changes = StateChanges::empty();
        changes.set(
            StateChanges::RENDER_TARGET,
            self.render_target != device.render_target,
        );
        changes.set(StateChanges::VIEWPORT, self.viewport != device.viewport);
        changes.set(StateChanges::MODELVIEW, self.modelview != device.modelview);
        changes.set(StateChanges::PROJECTION, self.projection != device.projection);
        changes.set(
            StateChanges::DEPTH,
            self.depth_buffer != device.depth_buffer || self.depth_write != device.depth_write,
        );
        changes.set(
            StateChanges::TEXTURE,
            self.texture != device.texture
                || self.texture_filter != device.texture_filter
                || self.texture_address_mode != device.texture_address_mode,
        );
        changes.set(StateChanges::BLEND_MODE, self.blend_mode != device.blend_mode);
        changes.set(
            StateChanges::COLOR_MODE,
            self.color_mode != device.color_mode
                || self.color_mode_factor != device.color_mode_factor,
        );
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_states_have_no_changes() {
        let a = RenderState::with_viewport(640, 480);
        assert!(a.diff(&a.clone()).is_empty());
    }

    #[test]
    fn diff_reports_only_changed_fields() {
        let device = RenderState::default();
        let mut logical = device.clone();
        logical.blend_mode = BlendMode::Add;
        assert_eq!(logical.diff(&device), StateChanges::BLEND_MODE);

        logical.texture_filter = TextureFilter::Nearest;
        logical.system_color = Color::RED;
        assert_eq!(
            logical.diff(&device),
            StateChanges::BLEND_MODE | StateChanges::TEXTURE
        );
    }

    #[test]
    fn primitive_counts() {
        assert_eq!(Primitive::TriangleList.triangle_count(7), 2);
        assert_eq!(Primitive::TriangleStrip.triangle_count(4), 2);
        assert_eq!(Primitive::TriangleFan.triangle_count(1), 0);
        assert_eq!(Primitive::LineStrip.line_count(5), 4);
        assert_eq!(Primitive::PointList.class(), PrimitiveClass::Points);
    }
}
