use facet_window::{
    init_app, Backend, BackendKind, HeadlessBackend, HeadlessEvent, MouseButton, PixelBuffer,
    WindowConfig,
};

fn headless(canvas: &PixelBuffer) -> HeadlessBackend {
    let mut backend = HeadlessBackend::new(WindowConfig::default().with_title("Test"));
    init_app(&mut backend, canvas);
    backend
}

#[test]
fn frames_follow_canvas_size() {
    let mut canvas = PixelBuffer::new(800, 600);
    let mut backend = headless(&canvas);
    assert_eq!(backend.window_size(), Some((800, 600)));
    assert_eq!(backend.title(), "Test");

    assert!(!backend.poll_events());
    backend.present_frame(&canvas);
    let frame = backend.frame().unwrap();
    assert_eq!((frame.width, frame.height), (800, 600));
    assert!(frame.pixels.iter().all(|&pixel| pixel == 0));

    canvas.resize(1024, 768);
    canvas.fill(0x00ff_ffff);
    assert!(!backend.poll_events());
    backend.present_frame(&canvas);

    let frame = backend.frame().unwrap();
    assert_eq!((frame.width, frame.height), (1024, 768));
    assert_eq!(frame.pixel(1023, 767), Some(0x00ff_ffff));
    assert_eq!(backend.present_count(), 2);
}

#[test]
fn close_is_latched() {
    let canvas = PixelBuffer::new(16, 16);
    let mut backend = headless(&canvas);

    backend.inject(HeadlessEvent::CloseRequested);
    assert!(backend.poll_events());
    assert!(backend.poll_events());

    backend.present_frame(&canvas);
    assert_eq!(backend.present_count(), 0);
}

#[test]
fn click_position_is_kept_after_release() {
    let canvas = PixelBuffer::new(320, 240);
    let mut backend = headless(&canvas);

    backend.inject(HeadlessEvent::PointerMoved { x: 5.0, y: 5.0 });
    backend.inject(HeadlessEvent::ButtonDown {
        button: MouseButton::Middle,
        x: 120.0,
        y: 45.0,
    });
    assert!(!backend.poll_events());
    assert!(backend.is_mouse_down(2));
    assert!(!backend.is_mouse_down(0));
    assert_eq!(backend.last_click_position(), (120.0, 45.0));
    assert_eq!(backend.mouse_position(), (120.0, 45.0));

    backend.inject(HeadlessEvent::ButtonUp(MouseButton::Middle));
    backend.inject(HeadlessEvent::PointerMoved { x: 200.0, y: 10.0 });
    assert!(!backend.poll_events());
    assert!(!backend.is_mouse_down(2));
    assert_eq!(backend.last_click_position(), (120.0, 45.0));
    assert_eq!(backend.mouse_position(), (200.0, 10.0));
}

#[test]
fn keys_are_read_from_polled_state() {
    let canvas = PixelBuffer::new(8, 8);
    let mut backend = headless(&canvas);

    backend.inject(HeadlessEvent::KeyDown(38));
    assert!(!backend.is_key_down(38));
    assert!(!backend.poll_events());
    assert!(backend.is_key_down(38));
    assert!(!backend.is_key_down(600));

    backend.inject(HeadlessEvent::KeyUp(38));
    assert!(!backend.poll_events());
    assert!(!backend.is_key_down(38));
}

#[test]
fn created_through_backend_kind() {
    let canvas = PixelBuffer::new(0, 0);
    let mut backend = "headless"
        .parse::<BackendKind>()
        .unwrap()
        .create(WindowConfig::default())
        .unwrap();

    assert!(backend.poll_events());
    init_app(backend.as_mut(), &canvas);
    assert!(!backend.poll_events());
    assert_eq!(backend.mouse_position(), (0.0, 0.0));
    assert_eq!(backend.kind(), BackendKind::Headless);
}
