use crate::{
    backend::{Backend, BackendKind},
    canvas::Canvas,
    error::WindowError,
};

pub(crate) const DIAGNOSTIC: [&str; 2] = [
    "Wayland in not supported yet.",
    "Please use XWayland for now.",
];

/// Placeholder for Wayland sessions. Initialization tells the user to run under XWayland and
/// terminates the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaylandStub;

impl Backend for WaylandStub {
    fn init(&mut self, _canvas: &dyn Canvas) -> Result<(), WindowError> {
        tracing::error!("Native Wayland backend is not implemented");
        for line in DIAGNOSTIC {
            eprintln!("{}", line);
        }
        std::process::exit(1);
    }

    #[inline]
    fn poll_events(&mut self) -> bool {
        false
    }

    #[inline]
    fn present_frame(&mut self, _canvas: &dyn Canvas) {}

    #[inline]
    fn is_key_down(&self, _key_code: u16) -> bool {
        false
    }

    #[inline]
    fn is_mouse_down(&self, _button: u8) -> bool {
        false
    }

    #[inline]
    fn last_click_position(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    #[inline]
    fn mouse_position(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Wayland
    }
}
