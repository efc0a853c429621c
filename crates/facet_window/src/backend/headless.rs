use crate::{
    backend::{Backend, BackendKind},
    canvas::Canvas,
    config::WindowConfig,
    error::WindowError,
    input::{InputState, MouseButton},
};
use std::collections::VecDeque;

/// Input that a test or an offscreen driver feeds to [`HeadlessBackend`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadlessEvent {
    KeyDown(u16),
    KeyUp(u16),
    ButtonDown { button: MouseButton, x: f32, y: f32 },
    ButtonUp(MouseButton),
    PointerMoved { x: f32, y: f32 },
    CloseRequested,
}

/// Copy of the latest presented canvas, packed without row padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Frame {
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }
}

/// Backend without a window. Presented frames are kept in memory.
#[derive(Debug)]
pub struct HeadlessBackend {
    config: WindowConfig,
    window_size: Option<(usize, usize)>,
    closed: bool,
    input: InputState,
    pending: VecDeque<HeadlessEvent>,
    frame: Option<Frame>,
    presented: usize,
}

impl HeadlessBackend {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            window_size: None,
            closed: false,
            input: InputState::new(),
            pending: VecDeque::new(),
            frame: None,
            presented: 0,
        }
    }

    /// Queue an event for the next [`Backend::poll_events`]
    pub fn inject(&mut self, event: HeadlessEvent) {
        self.pending.push_back(event);
    }

    /// Size chosen at initialization, `None` before that
    pub fn window_size(&self) -> Option<(usize, usize)> {
        self.window_size
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Number of frames that were actually presented
    pub fn present_count(&self) -> usize {
        self.presented
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }
}

impl Backend for HeadlessBackend {
    fn init(&mut self, canvas: &dyn Canvas) -> Result<(), WindowError> {
        let size = self.config.window_size(canvas.width(), canvas.height());
        tracing::debug!(width = size.0, height = size.1, "Headless window created");
        self.window_size = Some(size);
        Ok(())
    }

    fn poll_events(&mut self) -> bool {
        if self.window_size.is_none() || self.closed {
            return true;
        }

        while let Some(event) = self.pending.pop_front() {
            tracing::trace!(?event, "Headless event");
            match event {
                HeadlessEvent::CloseRequested => {
                    self.closed = true;
                    return true;
                }
                HeadlessEvent::KeyDown(key) => self.input.key_down(key as usize),
                HeadlessEvent::KeyUp(key) => self.input.key_up(key as usize),
                HeadlessEvent::ButtonDown { button, x, y } => self.input.button_down(button, x, y),
                HeadlessEvent::ButtonUp(button) => self.input.button_up(button),
                HeadlessEvent::PointerMoved { x, y } => self.input.pointer_moved(x, y),
            }
        }

        false
    }

    fn present_frame(&mut self, canvas: &dyn Canvas) {
        if self.window_size.is_none() || self.closed {
            return;
        }

        let (width, height, stride) = (canvas.width(), canvas.height(), canvas.stride());
        let source = canvas.pixels();
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            let start = y * stride;
            match source.get(start..start + width) {
                Some(row) => pixels.extend_from_slice(row),
                None => break,
            }
        }
        // Canvas shorter than it claims is padded with black
        pixels.resize(width * height, 0);

        self.frame = Some(Frame {
            width,
            height,
            pixels,
        });
        self.presented += 1;
    }

    #[inline]
    fn is_key_down(&self, key_code: u16) -> bool {
        self.input.is_key_down(key_code)
    }

    #[inline]
    fn is_mouse_down(&self, button: u8) -> bool {
        self.input.is_mouse_down(button)
    }

    #[inline]
    fn last_click_position(&self) -> (f32, f32) {
        self.input.last_click_position()
    }

    #[inline]
    fn mouse_position(&self) -> (f32, f32) {
        self.input.mouse_position()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelBuffer;

    struct Padded {
        pixels: Vec<u32>,
    }

    impl Canvas for Padded {
        fn pixels(&self) -> &[u32] {
            &self.pixels
        }

        fn width(&self) -> usize {
            2
        }

        fn height(&self) -> usize {
            2
        }

        fn stride(&self) -> usize {
            3
        }
    }

    #[test]
    fn uninitialized_backend_is_closed() {
        let mut backend = HeadlessBackend::new(WindowConfig::default());
        assert!(backend.poll_events());
        backend.present_frame(&PixelBuffer::new(1, 1));
        assert_eq!(backend.present_count(), 0);
    }

    #[test]
    fn zero_canvas_opens_fallback_window() {
        let mut backend = HeadlessBackend::new(WindowConfig::default());
        backend.init(&PixelBuffer::new(0, 0)).unwrap();
        assert_eq!(backend.window_size(), Some((800, 600)));
    }

    #[test]
    fn zero_dimension_falls_back_alone() {
        let mut backend = HeadlessBackend::new(WindowConfig::default());
        backend.init(&PixelBuffer::new(100, 0)).unwrap();
        assert_eq!(backend.window_size(), Some((100, 600)));

        let mut backend = HeadlessBackend::new(WindowConfig::default());
        backend.init(&PixelBuffer::new(0, 50)).unwrap();
        assert_eq!(backend.window_size(), Some((800, 50)));
    }

    #[test]
    fn present_drops_row_padding() {
        let mut backend = HeadlessBackend::new(WindowConfig::default());
        let canvas = Padded {
            pixels: vec![1, 2, 99, 3, 4],
        };
        backend.init(&canvas).unwrap();
        backend.present_frame(&canvas);

        let frame = backend.frame().unwrap();
        assert_eq!(frame.pixels, vec![1, 2, 3, 4]);
        assert_eq!(frame.pixel(1, 1), Some(4));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn close_stops_processing() {
        let mut backend = HeadlessBackend::new(WindowConfig::default());
        backend.init(&PixelBuffer::new(4, 4)).unwrap();

        backend.inject(HeadlessEvent::KeyDown(38));
        backend.inject(HeadlessEvent::CloseRequested);
        backend.inject(HeadlessEvent::KeyDown(39));

        assert!(backend.poll_events());
        assert!(backend.is_key_down(38));
        assert!(!backend.is_key_down(39));
        assert!(backend.poll_events());
        assert!(!backend.is_key_down(39));
    }
}
