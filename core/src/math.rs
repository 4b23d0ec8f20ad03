//! Math type aliases and rectangle types.

pub use glam;

use crate::error::CoreError;

/// 2D vector (f32).
pub type Vec2 = glam::Vec2;

/// 3D vector (f32).
pub type Vec3 = glam::Vec3;

/// 4x4 matrix (f32).
pub type Mat4 = glam::Mat4;

/// Integer rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle at the origin covering `w` x `h` pixels.
    pub fn from_size(w: u32, h: u32) -> Self {
        Self::new(0, 0, w.min(i32::MAX as u32) as i32, h.min(i32::MAX as u32) as i32)
    }

    /// Check that the extent is non-negative and does not overflow.
    ///
    /// Used by setup calls that treat a malformed rectangle as a programming error.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.w < 0 || self.h < 0 {
            return Err(CoreError::InvalidRect(format!(
                "negative extent {}x{}",
                self.w, self.h
            )));
        }
        if self.x.checked_add(self.w).is_none() || self.y.checked_add(self.h).is_none() {
            return Err(CoreError::InvalidRect(format!("{self:?} overflows")));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    /// Overlapping region, or `None` when the rectangles do not touch.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Rect::new(x, y, right - x, bottom - y))
    }

    /// Smallest rectangle covering both; empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.w as usize * self.h as usize
        }
    }
}

/// Floating point rectangle used by draw calls and texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RectF {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Full texture coordinate space.
    pub const UNIT: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    pub fn left_top(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn right_bottom(&self) -> Vec2 {
        Vec2::new(self.x + self.w, self.y + self.h)
    }
}

impl From<Rect> for RectF {
    fn from(r: Rect) -> Self {
        Self::new(r.x as f32, r.y as f32, r.w as f32, r.h as f32)
    }
}

/// Orthographic projection mapping `rect` onto clip space, y pointing down.
pub fn ortho_projection(rect: RectF) -> Mat4 {
    Mat4::orthographic_rh(rect.x, rect.x + rect.w, rect.y + rect.h, rect.y, -1.0, 1.0)
}
