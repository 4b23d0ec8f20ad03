//! Window configuration.

/// Settings for a [`Window`](crate::Window).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    /// Events the channel holds before producers start dropping them.
    pub event_capacity: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Vesper".to_string(),
            width: 1024,
            height: 768,
            fullscreen: false,
            event_capacity: 1024,
        }
    }
}

impl WindowOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// Set the event channel capacity. Clamped to at least one slot.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let options = WindowOptions::default()
            .with_title("Demo")
            .with_size(640, 480)
            .with_fullscreen(true)
            .with_event_capacity(0);
        assert_eq!(options.title, "Demo");
        assert_eq!((options.width, options.height), (640, 480));
        assert!(options.fullscreen);
        assert_eq!(options.event_capacity, 1);
    }
}
