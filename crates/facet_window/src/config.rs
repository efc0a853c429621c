/// Window settings shared by all backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Window size used when canvas reports zero width or height
    pub fallback_size: (usize, usize),
    /// Initial position of the window, where the platform lets the client choose it
    pub position: (i16, i16),
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Facet".to_string(),
            fallback_size: (800, 600),
            position: (10, 10),
        }
    }
}

impl WindowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_fallback_size(mut self, width: usize, height: usize) -> Self {
        self.fallback_size = (width, height);
        self
    }

    pub fn with_position(mut self, x: i16, y: i16) -> Self {
        self.position = (x, y);
        self
    }

    /// Size of a window for canvas of `width` x `height`. Zero dimensions are taken from the
    /// fallback size one by one.
    pub(crate) fn window_size(&self, width: usize, height: usize) -> (usize, usize) {
        let (fallback_width, fallback_height) = self.fallback_size;
        (
            if width == 0 { fallback_width } else { width },
            if height == 0 { fallback_height } else { height },
        )
    }
}
