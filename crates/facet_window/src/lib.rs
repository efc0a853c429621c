// CLIPPY CONFIG
#![allow(clippy::new_without_default, clippy::unnecessary_cast)]

pub mod backend;
pub mod canvas;
pub mod config;
pub mod error;
pub mod input;

pub use crate::{
    backend::{
        headless::{Frame, HeadlessBackend, HeadlessEvent},
        Backend, BackendKind,
    },
    canvas::{Canvas, PixelBuffer},
    config::WindowConfig,
    error::WindowError,
    input::MouseButton,
};

pub type Result<T> = core::result::Result<T, WindowError>;

/// Open the window of `backend` sized to `canvas`.
///
/// Failure to open a window is not recoverable: the reason goes to stderr and the process exits
/// with status 1. Callers that want to handle the error use [`Backend::init`] directly.
pub fn init_app(backend: &mut dyn Backend, canvas: &dyn Canvas) {
    if let Err(err) = backend.init(canvas) {
        tracing::error!(backend = %backend.kind(), %err, "Could not open window");
        eprintln!("Could not open {} window: {}", backend.kind(), err);
        std::process::exit(1);
    }
}
