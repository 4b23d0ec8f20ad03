//! Per-frame render statistics.

/// Counters collected by the render thread over one frame.
///
/// Published when a frame is flushed with statistics enabled or presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatistics {
    /// Frames published so far, including this one.
    pub frame: u64,
    pub draw_calls: u64,
    pub vertices: u64,
    pub triangles: u64,
    pub lines: u64,
    pub texture_switches: u64,
    /// Render state hooks issued by state synchronization.
    pub state_changes: u64,
    pub texture_uploads: u64,
    /// Uploads of asynchronously decoded textures.
    pub async_uploads: u64,
    pub device_resets: u64,
}
