use crate::{
    backend::{Backend, BackendKind},
    canvas::Canvas,
    config::WindowConfig,
    error::WindowError,
    input::{InputState, MouseButton},
};
use facet_x11::{
    atoms::AtomId,
    error::Error,
    events::{EventType, SomeEvent},
    requests::{
        ChangeProperty, CreateGC, CreateWindow, DestroyWindow, FreeGC, ImageFormat, InternAtom,
        MapWindow, PropertyFormat, PropertyMode, PutImage, WindowAttributes,
    },
    Drawable, GContextId, WindowClass, WindowId, WindowVisual, XDisplay,
};

mod staging;

use staging::StagingImage;

const BORDER_WIDTH: u16 = 1;

/// Window on X server, talking the protocol directly over the socket from `$DISPLAY`
pub struct X11Backend {
    config: WindowConfig,
    running: Option<Running>,
    input: InputState,
    closed: bool,
}

/// Everything that exists only after the window was created
struct Running {
    display: XDisplay,
    window: WindowId,
    gc: GContextId,
    wm_delete_window: AtomId,
    depth: u8,
    staging: Option<StagingImage>,
    /// Times `staging` was built, one per canvas size change
    staging_builds: u64,
}

impl X11Backend {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            running: None,
            input: InputState::new(),
            closed: false,
        }
    }

    fn open_window(&self, canvas: &dyn Canvas) -> Result<Running, WindowError> {
        let mut display = XDisplay::open()?;
        let screen = display.screen().clone();

        let depth = screen.root_depth;
        match display.setup().pixmap_format(depth) {
            Some(format) if format.bits_per_pixel == 32 => {}
            _ => return Err(WindowError::UnsupportedPixmapFormat { depth }),
        }

        let (width, height) = self.config.window_size(canvas.width(), canvas.height());
        let (x, y) = self.config.position;
        let window = WindowId::from(display.id_allocator().allocate_id()?);

        display.send_request(&CreateWindow {
            depth: 0,
            wid: window,
            parent: screen.root,
            x,
            y,
            width: width.min(u16::MAX as usize) as u16,
            height: height.min(u16::MAX as usize) as u16,
            border_width: BORDER_WIDTH,
            window_class: WindowClass::InputOutput,
            visual: WindowVisual::CopyFromParent,
            attributes: WindowAttributes {
                background_pixel: Some(screen.white_pixel),
                border_pixel: Some(screen.black_pixel),
                event_mask: Some(
                    EventType::EXPOSURE
                        | EventType::KEY_PRESS
                        | EventType::KEY_RELEASE
                        | EventType::BUTTON_PRESS
                        | EventType::BUTTON_RELEASE
                        | EventType::POINTER_MOTION
                        | EventType::STRUCTURE_NOTIFY,
                ),
            },
        })?;

        display.send_request(&ChangeProperty {
            mode: PropertyMode::Replace,
            window,
            property: AtomId::WM_NAME,
            type_: AtomId::STRING,
            format: PropertyFormat::Format8,
            data: self.config.title.as_bytes().to_vec(),
        })?;

        // Both requests go out before waiting for the first reply
        let wm_protocols = display.send_request(&InternAtom {
            only_if_exists: false,
            name: b"WM_PROTOCOLS".to_vec(),
        })?;
        let wm_delete_window = display.send_request(&InternAtom {
            only_if_exists: false,
            name: b"WM_DELETE_WINDOW".to_vec(),
        })?;
        let wm_protocols = display
            .await_reply(wm_protocols)?
            .atom
            .ok_or(Error::InvalidResponse("InternAtom"))?;
        let wm_delete_window = display
            .await_reply(wm_delete_window)?
            .atom
            .ok_or(Error::InvalidResponse("InternAtom"))?;

        display.send_request(&ChangeProperty {
            mode: PropertyMode::Replace,
            window,
            property: wm_protocols,
            type_: AtomId::ATOM,
            format: PropertyFormat::Format32,
            data: wm_delete_window.id().value().to_le_bytes().to_vec(),
        })?;

        display.send_request(&MapWindow { window })?;

        let gc = GContextId::from(display.id_allocator().allocate_id()?);
        display.send_request(&CreateGC {
            cid: gc,
            drawable: Drawable::Window(window),
            graphics_exposures: false,
        })?;

        display.wait_for_event(
            |event| matches!(event, SomeEvent::MapNotify(map) if map.window == window),
        )?;

        tracing::info!(
            window = window.id().value(),
            width,
            height,
            depth,
            "X11 window mapped"
        );

        Ok(Running {
            display,
            window,
            gc,
            wm_delete_window,
            depth,
            staging: None,
            staging_builds: 0,
        })
    }
}

/// Update input with one event. `true` if the event asks to close the window.
fn apply_event(input: &mut InputState, wm_delete_window: AtomId, event: &SomeEvent) -> bool {
    match event {
        SomeEvent::KeyPress(key) => input.key_down(key.detail as usize),
        SomeEvent::KeyRelease(key) => input.key_up(key.detail as usize),
        SomeEvent::ButtonPress(press) => {
            if let Some(button) = MouseButton::from_x11(press.detail) {
                input.button_down(button, press.event_x as f32, press.event_y as f32);
            }
        }
        SomeEvent::ButtonRelease(release) => {
            if let Some(button) = MouseButton::from_x11(release.detail) {
                input.button_up(button);
            }
        }
        SomeEvent::MotionNotify(motion) => {
            input.pointer_moved(motion.event_x as f32, motion.event_y as f32)
        }
        SomeEvent::ConfigureNotify(configure) => {
            tracing::debug!(
                width = configure.width,
                height = configure.height,
                "Window configured"
            );
        }
        SomeEvent::ClientMessage(message) => {
            if message.format == 32 && message.first_u32() == wm_delete_window.id().value() {
                tracing::debug!("Window manager asked to close the window");
                return true;
            }
        }
        SomeEvent::Expose(_) | SomeEvent::MapNotify(_) | SomeEvent::UnknownEvent(_) => {}
    }

    false
}

impl Backend for X11Backend {
    fn init(&mut self, canvas: &dyn Canvas) -> Result<(), WindowError> {
        let running = self.open_window(canvas)?;
        self.running = Some(running);
        self.closed = false;
        Ok(())
    }

    fn poll_events(&mut self) -> bool {
        if self.closed {
            return true;
        }
        let Some(running) = self.running.as_mut() else {
            return true;
        };

        loop {
            match running.display.next_event() {
                Ok(Some(event)) => {
                    if apply_event(&mut self.input, running.wm_delete_window, &event) {
                        self.closed = true;
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(%err, "Lost connection to X server");
                    self.closed = true;
                    break;
                }
            }
        }

        for error in running.display.errors() {
            tracing::warn!(%error, "X server reported an error");
        }

        self.closed
    }

    fn present_frame(&mut self, canvas: &dyn Canvas) {
        if self.closed {
            return;
        }
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let (width, height) = (canvas.width(), canvas.height());
        if width == 0 || height == 0 {
            return;
        }

        let reusable = running
            .staging
            .as_ref()
            .is_some_and(|staging| staging.matches(width, height));
        if !reusable {
            let staging = StagingImage::new(
                width,
                height,
                running.display.maximum_request_bytes(),
                running.display.setup().image_byte_order,
            );
            running.staging_builds += 1;
            let (image_width, image_height) = staging.size();
            tracing::debug!(
                image_width,
                image_height,
                rows_per_request = staging.rows_per_request(),
                builds = running.staging_builds,
                "Rebuilt staging image"
            );
            running.staging = Some(staging);
        }
        let Some(staging) = running.staging.as_mut() else {
            return;
        };

        let (display, window, gc, depth) = (
            &mut running.display,
            running.window,
            running.gc,
            running.depth,
        );
        let sent = staging
            .attach(canvas.pixels(), canvas.stride())
            .for_each_strip(|strip| {
                display
                    .send_request(&PutImage {
                        format: ImageFormat::ZPixmap,
                        drawable: Drawable::Window(window),
                        gc,
                        width: strip.width,
                        height: strip.height,
                        dst_x: 0,
                        dst_y: strip.dst_y,
                        left_pad: 0,
                        depth,
                        data: strip.data,
                    })
                    .map(drop)
            })
            .and_then(|()| display.flush());

        if let Err(err) = sent {
            tracing::error!(%err, "Could not present frame");
            self.closed = true;
        }
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
        BackendKind::X11
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        let released = running
            .display
            .send_request(&FreeGC { gc: running.gc })
            .and_then(|_| {
                running.display.send_request(&DestroyWindow {
                    window: running.window,
                })
            })
            .and_then(|_| running.display.flush());
        if let Err(err) = released {
            tracing::debug!(%err, "Could not destroy window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelBuffer;
    use facet_x11::events::{ClientMessage, ConfigureNotify, InputEvent};

    const WM_DELETE_WINDOW: u32 = 0x15c;

    fn input_event(detail: u8, x: i16, y: i16) -> InputEvent {
        InputEvent {
            detail,
            sequence_number: 0,
            time: 0,
            root: WindowId::from(0x3c5),
            event: WindowId::from(0x0060_0001),
            child: 0,
            root_x: x + 10,
            root_y: y + 10,
            event_x: x,
            event_y: y,
            state: 0,
            same_screen: true,
        }
    }

    fn client_message(format: u8, atom: u32) -> SomeEvent {
        let mut data = [0u8; 20];
        data[..4].copy_from_slice(&atom.to_le_bytes());
        SomeEvent::ClientMessage(ClientMessage {
            format,
            sequence_number: 0,
            window: WindowId::from(0x0060_0001),
            message_type: AtomId::from(0x14b),
            data,
        })
    }

    fn apply(input: &mut InputState, event: SomeEvent) -> bool {
        apply_event(input, AtomId::from(WM_DELETE_WINDOW), &event)
    }

    #[test]
    fn keys_follow_press_and_release() {
        let mut input = InputState::new();
        assert!(!apply(&mut input, SomeEvent::KeyPress(input_event(38, 0, 0))));
        assert!(input.is_key_down(38));
        assert!(!apply(&mut input, SomeEvent::KeyRelease(input_event(38, 0, 0))));
        assert!(!input.is_key_down(38));
    }

    #[test]
    fn buttons_use_shared_indices() {
        let mut input = InputState::new();
        apply(&mut input, SomeEvent::ButtonPress(input_event(3, 120, 45)));
        assert!(input.is_mouse_down(MouseButton::Right.index()));
        assert!(!input.is_mouse_down(MouseButton::Middle.index()));
        assert_eq!(input.last_click_position(), (120.0, 45.0));
        assert_eq!(input.mouse_position(), (120.0, 45.0));

        // Wheel is not a tracked button
        apply(&mut input, SomeEvent::ButtonPress(input_event(4, 1, 1)));
        assert_eq!(input.last_click_position(), (120.0, 45.0));

        apply(&mut input, SomeEvent::ButtonRelease(input_event(3, 0, 0)));
        assert!(!input.is_mouse_down(MouseButton::Right.index()));
    }

    #[test]
    fn motion_moves_pointer_only() {
        let mut input = InputState::new();
        apply(&mut input, SomeEvent::ButtonPress(input_event(1, 5, 6)));
        apply(&mut input, SomeEvent::MotionNotify(input_event(0, -3, 200)));
        assert_eq!(input.mouse_position(), (-3.0, 200.0));
        assert_eq!(input.last_click_position(), (5.0, 6.0));
    }

    #[test]
    fn delete_window_message_closes() {
        let mut input = InputState::new();
        assert!(!apply(&mut input, client_message(32, 0x99)));
        assert!(!apply(&mut input, client_message(8, WM_DELETE_WINDOW)));
        assert!(apply(&mut input, client_message(32, WM_DELETE_WINDOW)));
    }

    #[test]
    fn configure_is_ignored() {
        let mut input = InputState::new();
        let configure = SomeEvent::ConfigureNotify(ConfigureNotify {
            sequence_number: 0,
            event: WindowId::from(1),
            window: WindowId::from(1),
            above_sibling: 0,
            x: 0,
            y: 0,
            width: 640,
            height: 480,
            border_width: 1,
            override_redirect: false,
        });
        assert!(!apply(&mut input, configure));
        assert_eq!(input.mouse_position(), (0.0, 0.0));
    }

    fn scripted_backend(server_bytes: &[u8]) -> X11Backend {
        let display = XDisplay::scripted(server_bytes).unwrap();
        let mut backend = X11Backend::new(WindowConfig::default());
        backend.running = Some(Running {
            display,
            window: WindowId::from(0x0060_0001),
            gc: GContextId::from(0x0060_0002),
            wm_delete_window: AtomId::from(WM_DELETE_WINDOW),
            depth: 24,
            staging: None,
            staging_builds: 0,
        });
        backend
    }

    fn running(backend: &mut X11Backend) -> &mut Running {
        backend.running.as_mut().unwrap()
    }

    fn key_press_bytes(keycode: u8) -> Vec<u8> {
        let mut raw = vec![2u8, keycode];
        raw.resize(32, 0);
        raw
    }

    fn delete_window_bytes() -> Vec<u8> {
        let mut raw = vec![33u8, 32, 0, 0];
        raw.extend_from_slice(&0x0060_0001u32.to_le_bytes());
        raw.extend_from_slice(&0x14bu32.to_le_bytes());
        raw.extend_from_slice(&WM_DELETE_WINDOW.to_le_bytes());
        raw.resize(32, 0);
        raw
    }

    /// `(width, height, dst_y, data)` of every `PutImage` in a run of requests
    fn put_images(mut requests: &[u8]) -> Vec<(u16, u16, i16, Vec<u8>)> {
        let field = |raw: &[u8], at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let mut images = Vec::new();
        while !requests.is_empty() {
            let (request, rest) = requests.split_at(field(requests, 2) as usize * 4);
            if request[0] == 72 {
                images.push((
                    field(request, 12),
                    field(request, 14),
                    field(request, 18) as i16,
                    request[24..].to_vec(),
                ));
            }
            requests = rest;
        }
        images
    }

    #[test]
    fn open_window_without_events_stays_open() {
        let mut backend = scripted_backend(&[]);
        assert!(!backend.poll_events());
        assert!(!backend.poll_events());
    }

    #[test]
    fn events_reach_input_queries() {
        let mut backend = scripted_backend(&key_press_bytes(38));
        assert!(!backend.is_key_down(38));
        assert!(!backend.poll_events());
        assert!(backend.is_key_down(38));
    }

    #[test]
    fn close_request_latches_and_stops_event_processing() {
        let mut events = key_press_bytes(38);
        events.extend(delete_window_bytes());
        events.extend(key_press_bytes(40));
        let mut backend = scripted_backend(&events);

        assert!(backend.poll_events());
        assert!(backend.is_key_down(38));
        assert!(!backend.is_key_down(40));

        running(&mut backend)
            .display
            .script_incoming(&key_press_bytes(41));
        assert!(backend.poll_events());
        assert!(!backend.is_key_down(40));
        assert!(!backend.is_key_down(41));

        let sent = running(&mut backend).display.sent_bytes().len();
        backend.present_frame(&PixelBuffer::new(4, 4));
        assert_eq!(running(&mut backend).display.sent_bytes().len(), sent);
    }

    #[test]
    fn lost_connection_latches_closed() {
        let mut backend = scripted_backend(&[]);
        running(&mut backend).display.hang_up();
        assert!(backend.poll_events());

        running(&mut backend)
            .display
            .script_incoming(&key_press_bytes(38));
        assert!(backend.poll_events());
        assert!(!backend.is_key_down(38));
    }

    #[test]
    fn staging_image_is_rebuilt_only_on_resize() {
        let mut backend = scripted_backend(&[]);
        let mut canvas = PixelBuffer::new(8, 4);

        backend.present_frame(&canvas);
        backend.present_frame(&canvas);
        assert_eq!(running(&mut backend).staging_builds, 1);

        canvas.resize(16, 2);
        backend.present_frame(&canvas);
        assert_eq!(running(&mut backend).staging_builds, 2);
        backend.present_frame(&canvas);
        assert_eq!(running(&mut backend).staging_builds, 2);

        backend.present_frame(&PixelBuffer::new(0, 3));
        assert_eq!(running(&mut backend).staging_builds, 2);
    }

    #[test]
    fn resized_frame_is_sent_at_new_size() {
        let mut backend = scripted_backend(&[]);
        let start = running(&mut backend).display.sent_bytes().len();

        let mut canvas = PixelBuffer::new(8, 4);
        canvas.fill(0x0011_2233);
        backend.present_frame(&canvas);
        canvas.resize(16, 2);
        canvas.fill(0x00ff_ffff);
        backend.present_frame(&canvas);

        let images = put_images(&running(&mut backend).display.sent_bytes()[start..]);
        assert_eq!(images.len(), 2);

        let (width, height, dst_y, data) = &images[0];
        assert_eq!((*width, *height, *dst_y), (8, 4, 0));
        assert_eq!(data.len(), 8 * 4 * 4);
        assert_eq!(&data[..4], &0x0011_2233u32.to_ne_bytes());

        let (width, height, dst_y, data) = &images[1];
        assert_eq!((*width, *height, *dst_y), (16, 2, 0));
        assert_eq!(data.len(), 16 * 2 * 4);
        assert!(data
            .chunks_exact(4)
            .all(|pixel| pixel == 0x00ff_ffffu32.to_ne_bytes()));
    }

    #[test]
    fn uninitialized_backend_is_closed() {
        let mut backend = X11Backend::new(WindowConfig::default());
        assert!(backend.poll_events());
        backend.present_frame(&PixelBuffer::new(2, 2));
        assert!(!backend.is_key_down(38));
        assert_eq!(backend.kind(), BackendKind::X11);
    }
}
