//! Vertex layouts accepted by render calls.

use bytemuck::{Pod, Zeroable};
use vesper_core::{Color, Vec2, Vec3};

/// Position only; colored by the system color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PlainVertex {
    pub position: [f32; 3],
}

/// Position with a packed `0xRRGGBBAA` color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ColoredVertex {
    pub position: [f32; 3],
    pub color: u32,
}

/// Position with texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Position, packed color and texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ColoredTexturedVertex {
    pub position: [f32; 3],
    pub color: u32,
    pub uv: [f32; 2],
}

impl PlainVertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
        }
    }
}

impl ColoredVertex {
    pub fn new(position: Vec3, color: Color) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_u32(),
        }
    }
}

impl TexturedVertex {
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            uv: uv.to_array(),
        }
    }
}

impl ColoredTexturedVertex {
    pub fn new(position: Vec3, color: Color, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_u32(),
            uv: uv.to_array(),
        }
    }
}

/// Owned vertex data of one render command.
#[derive(Debug, Clone, PartialEq)]
pub enum Vertices {
    Plain(Vec<PlainVertex>),
    Colored(Vec<ColoredVertex>),
    Textured(Vec<TexturedVertex>),
    ColoredTextured(Vec<ColoredTexturedVertex>),
}

impl Vertices {
    pub fn len(&self) -> usize {
        match self {
            Self::Plain(v) => v.len(),
            Self::Colored(v) => v.len(),
            Self::Textured(v) => v.len(),
            Self::ColoredTextured(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_color(&self) -> bool {
        matches!(self, Self::Colored(_) | Self::ColoredTextured(_))
    }

    pub fn has_uv(&self) -> bool {
        matches!(self, Self::Textured(_) | Self::ColoredTextured(_))
    }

    /// Position, optional color and optional uv of vertex `i`.
    pub fn get(&self, i: usize) -> Option<(Vec3, Option<Color>, Option<Vec2>)> {
        match self {
            Self::Plain(v) => v.get(i).map(|v| (Vec3::from(v.position), None, None)),
            Self::Colored(v) => v
                .get(i)
                .map(|v| (Vec3::from(v.position), Some(Color::from_u32(v.color)), None)),
            Self::Textured(v) => v
                .get(i)
                .map(|v| (Vec3::from(v.position), None, Some(Vec2::from(v.uv)))),
            Self::ColoredTextured(v) => v.get(i).map(|v| {
                (
                    Vec3::from(v.position),
                    Some(Color::from_u32(v.color)),
                    Some(Vec2::from(v.uv)),
                )
            }),
        }
    }

    /// Raw bytes, as a device would copy them into a vertex buffer.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Plain(v) => bytemuck::cast_slice(v),
            Self::Colored(v) => bytemuck::cast_slice(v),
            Self::Textured(v) => bytemuck::cast_slice(v),
            Self::ColoredTextured(v) => bytemuck::cast_slice(v),
        }
    }
}

/// A vertex layout that can be submitted to a render call.
pub trait Vertex: Pod {
    fn into_vertices(vertices: Vec<Self>) -> Vertices;
}

impl Vertex for PlainVertex {
    fn into_vertices(vertices: Vec<Self>) -> Vertices {
        Vertices::Plain(vertices)
    }
}

impl Vertex for ColoredVertex {
    fn into_vertices(vertices: Vec<Self>) -> Vertices {
        Vertices::Colored(vertices)
    }
}

impl Vertex for TexturedVertex {
    fn into_vertices(vertices: Vec<Self>) -> Vertices {
        Vertices::Textured(vertices)
    }
}

impl Vertex for ColoredTexturedVertex {
    fn into_vertices(vertices: Vec<Self>) -> Vertices {
        Vertices::ColoredTextured(vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_sizes_are_packed() {
        assert_eq!(std::mem::size_of::<PlainVertex>(), 12);
        assert_eq!(std::mem::size_of::<ColoredVertex>(), 16);
        assert_eq!(std::mem::size_of::<TexturedVertex>(), 20);
        assert_eq!(std::mem::size_of::<ColoredTexturedVertex>(), 24);
    }

    #[test]
    fn vertices_expose_channels() {
        let v = ColoredVertex::into_vertices(vec![ColoredVertex::new(
            Vec3::new(1.0, 2.0, 0.0),
            Color::RED,
        )]);
        assert!(v.has_color() && !v.has_uv());
        assert_eq!(v.as_bytes().len(), 16);
        let (pos, color, uv) = v.get(0).unwrap();
        assert_eq!(pos, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(color, Some(Color::RED));
        assert_eq!(uv, None);
        assert!(v.get(1).is_none());
    }
}
