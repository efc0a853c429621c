use crate::backend::BackendKind;
use thiserror::Error;

/// Failure to bring a window up
#[derive(Debug, Error)]
pub enum WindowError {
    #[cfg(unix)]
    #[error("X11: {0}")]
    X11(#[from] facet_x11::error::Error),

    #[cfg(windows)]
    #[error("{function} failed: {source}")]
    Win32 {
        function: &'static str,
        #[source]
        source: windows::core::Error,
    },

    #[error("no 32 bits per pixel image format for depth {depth}")]
    UnsupportedPixmapFormat { depth: u8 },

    #[error("{0} backend is not available on this platform")]
    Unavailable(BackendKind),
}

#[cfg(windows)]
impl WindowError {
    pub(crate) fn win32(function: &'static str) -> impl FnOnce(windows::core::Error) -> Self {
        move |source| Self::Win32 { function, source }
    }
}
