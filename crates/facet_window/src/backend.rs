use crate::{canvas::Canvas, config::WindowConfig, error::WindowError};
use std::{fmt, str::FromStr};

pub mod headless;
pub mod wayland;
#[cfg(windows)]
pub mod win32;
#[cfg(unix)]
pub mod x11;

/// Native window that shows pixels of a [`Canvas`].
///
/// A backend starts uninitialized; [`Backend::init`] opens the window. Until then and after the
/// window got closed, [`Backend::poll_events`] returns `true` and [`Backend::present_frame`] does
/// nothing.
///
/// Key and mouse queries keep the semantic of the native platform: X11 and headless backends
/// answer from a table updated only by [`Backend::poll_events`], Win32 asks the OS for the live
/// state of the key.
pub trait Backend {
    /// Open the window, sized to the canvas
    fn init(&mut self, canvas: &dyn Canvas) -> Result<(), WindowError>;

    /// Process all pending window events without blocking. `true` once the window was closed.
    fn poll_events(&mut self) -> bool;

    /// Put pixels of the canvas at the top left corner of the window
    fn present_frame(&mut self, canvas: &dyn Canvas);

    /// `key_code` is platform specific: X11 keycode or Windows virtual-key code
    fn is_key_down(&self, key_code: u16) -> bool;

    /// 0 is left, 1 is right and 2 is middle button
    fn is_mouse_down(&self, button: u8) -> bool;

    /// Window coordinates of the latest button press of any button
    fn last_click_position(&self) -> (f32, f32);

    /// Window coordinates of the pointer as of the latest processed event
    fn mouse_position(&self) -> (f32, f32);

    fn kind(&self) -> BackendKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    X11,
    Wayland,
    Win32,
    Headless,
}

impl BackendKind {
    /// Environment variable that overrides backend detection
    pub const OVERRIDE_ENV: &'static str = "FACET_BACKEND";

    /// Pick a backend for this process from the environment
    pub fn detect() -> Self {
        Self::detect_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::detect`] with environment lookup supplied by the caller
    pub fn detect_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(value) = env(Self::OVERRIDE_ENV) {
            match value.parse::<Self>() {
                Ok(kind) => return kind,
                Err(err) => tracing::warn!(%err, "Ignoring {}", Self::OVERRIDE_ENV),
            }
        }

        if cfg!(windows) {
            Self::Win32
        } else if env("DISPLAY").is_some() {
            Self::X11
        } else if env("WAYLAND_DISPLAY").is_some() {
            Self::Wayland
        } else {
            Self::X11
        }
    }

    /// Uninitialized backend of this kind
    pub fn create(self, config: WindowConfig) -> Result<Box<dyn Backend>, WindowError> {
        let backend: Box<dyn Backend> = match self {
            #[cfg(unix)]
            BackendKind::X11 => Box::new(x11::X11Backend::new(config)),
            #[cfg(windows)]
            BackendKind::Win32 => Box::new(win32::Win32Backend::new(config)),
            BackendKind::Wayland => Box::new(wayland::WaylandStub),
            BackendKind::Headless => Box::new(headless::HeadlessBackend::new(config)),
            #[allow(unreachable_patterns)]
            unavailable => return Err(WindowError::Unavailable(unavailable)),
        };
        tracing::debug!(backend = %self, "Created backend");
        Ok(backend)
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::X11 => "x11",
            BackendKind::Wayland => "wayland",
            BackendKind::Win32 => "win32",
            BackendKind::Headless => "headless",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend '{0}', expected one of x11, wayland, win32, headless")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x11" => Ok(Self::X11),
            "wayland" => Ok(Self::Wayland),
            "win32" | "windows" => Ok(Self::Win32),
            "headless" => Ok(Self::Headless),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}
