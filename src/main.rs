use clap::Parser;
use facet_window::{init_app, Backend, BackendKind, Canvas, PixelBuffer, WindowConfig};
use std::{process::ExitCode, thread, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "FACET_LOG";
const FRAME_TIME: Duration = Duration::from_millis(16);

const BACKGROUND: u32 = 0x0018_1820;
const SWEEP: u32 = 0x0030_3048;
const MARKER: u32 = 0x00ff_8800;
const MARKER_PRESSED: u32 = 0x0000_ff88;
const POINTER: u32 = 0x00ff_ffff;
const MARKER_SIZE: usize = 12;
const POINTER_SIZE: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "facet", about = "Paint a pixel buffer into a native window")]
struct Cli {
    /// Window title
    #[arg(long, default_value = "Facet")]
    title: String,

    /// Canvas width, 0 picks the fallback window size
    #[arg(long, default_value_t = 800)]
    width: usize,

    /// Canvas height, 0 picks the fallback window size
    #[arg(long, default_value_t = 600)]
    height: usize,

    /// x11, wayland, win32 or headless. Detected from environment when not given.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Exit after presenting that many frames
    #[arg(long)]
    frames: Option<u64>,
}

/// Vertical band moving across the canvas, a square at the last click and a dot under the pointer
fn draw(canvas: &mut PixelBuffer, backend: &dyn Backend, frame: u64) {
    canvas.fill(BACKGROUND);

    let (width, height) = (canvas.width(), canvas.height());
    if width > 0 {
        let x = (frame as usize * 4) % width;
        canvas.fill_rect(x, 0, MARKER_SIZE, height, SWEEP);
    }

    let (click_x, click_y) = backend.last_click_position();
    let color = if backend.is_mouse_down(0) {
        MARKER_PRESSED
    } else {
        MARKER
    };
    canvas.fill_rect(
        (click_x.max(0.0) as usize).saturating_sub(MARKER_SIZE / 2),
        (click_y.max(0.0) as usize).saturating_sub(MARKER_SIZE / 2),
        MARKER_SIZE,
        MARKER_SIZE,
        color,
    );

    let (pointer_x, pointer_y) = backend.mouse_position();
    canvas.fill_rect(
        pointer_x.max(0.0) as usize,
        pointer_y.max(0.0) as usize,
        POINTER_SIZE,
        POINTER_SIZE,
        POINTER,
    );
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let kind = cli.backend.unwrap_or_else(BackendKind::detect);
    let config = WindowConfig::new().with_title(cli.title);

    let mut backend = match kind.create(config) {
        Ok(backend) => backend,
        Err(err) => {
            error!(%err, "Could not create backend");
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    info!(backend = %kind, "Starting");

    let mut canvas = PixelBuffer::new(cli.width, cli.height);
    init_app(backend.as_mut(), &canvas);

    let mut frame = 0u64;
    while !backend.poll_events() {
        if cli.frames.is_some_and(|frames| frame >= frames) {
            break;
        }

        draw(&mut canvas, backend.as_ref(), frame);
        backend.present_frame(&canvas);
        frame += 1;

        thread::sleep(FRAME_TIME);
    }

    info!(frames = frame, "Done");
    ExitCode::SUCCESS
}
