use crate::{
    backend::{Backend, BackendKind},
    canvas::Canvas,
    config::WindowConfig,
    error::WindowError,
    input::MouseButton,
};
use std::cell::Cell;
use windows::{
    core::{w, PCWSTR},
    Win32::{
        Foundation::{ERROR_CLASS_ALREADY_EXISTS, FALSE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        Graphics::Gdi::{
            GetDC, ReleaseDC, SetDIBitsToDevice, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
            DIB_RGB_COLORS,
        },
        System::LibraryLoader::GetModuleHandleW,
        UI::{
            Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON, VK_MBUTTON, VK_RBUTTON},
            WindowsAndMessaging::{
                AdjustWindowRect, CreateWindowExW, DefWindowProcW, DestroyWindow,
                DispatchMessageW, GetWindowLongPtrW, LoadCursorW, PeekMessageW, PostQuitMessage,
                RegisterClassW, SetWindowLongPtrW, TranslateMessage, CW_USEDEFAULT,
                GWLP_USERDATA, IDC_ARROW, MSG, PM_REMOVE, WINDOW_EX_STYLE, WM_CLOSE, WM_DESTROY,
                WM_LBUTTONDOWN, WM_MBUTTONDOWN, WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN,
                WNDCLASSW, WS_OVERLAPPEDWINDOW, WS_VISIBLE,
            },
        },
    },
};

/// High bit of `GetAsyncKeyState` result, set while the key is held
const KEY_DOWN_BIT: u16 = 0x8000;

/// Shared between the backend and the window procedure
#[derive(Debug, Default)]
struct WindowState {
    closed: Cell<bool>,
    last_click: Cell<(f32, f32)>,
    pointer: Cell<(f32, f32)>,
}

/// Native Win32 window painted with `SetDIBitsToDevice`
pub struct Win32Backend {
    config: WindowConfig,
    hwnd: Option<HWND>,
    // Boxed so the address handed to the window procedure stays put
    state: Box<WindowState>,
}

/// Client coordinates packed in `lParam` of mouse messages, as signed 16-bit values
fn point_from_lparam(lparam: LPARAM) -> (f32, f32) {
    let x = (lparam.0 & 0xffff) as u16 as i16;
    let y = ((lparam.0 >> 16) & 0xffff) as u16 as i16;
    (x as f32, y as f32)
}

fn virtual_key(button: u8) -> Option<i32> {
    let vk = match MouseButton::from_index(button)? {
        MouseButton::Left => VK_LBUTTON,
        MouseButton::Right => VK_RBUTTON,
        MouseButton::Middle => VK_MBUTTON,
    };
    Some(vk.0 as i32)
}

fn is_async_key_down(vk: i32) -> bool {
    let state = unsafe { GetAsyncKeyState(vk) };
    (state as u16 & KEY_DOWN_BIT) != 0
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let state = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const WindowState;
    if state.is_null() {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    }
    let state = unsafe { &*state };

    match msg {
        WM_CLOSE => {
            tracing::debug!("Window close requested");
            state.closed.set(true);
        }
        WM_DESTROY => unsafe { PostQuitMessage(0) },
        WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN => {
            let point = point_from_lparam(lparam);
            state.last_click.set(point);
            state.pointer.set(point);
        }
        WM_MOUSEMOVE => state.pointer.set(point_from_lparam(lparam)),
        _ => return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }

    LRESULT(0)
}

impl Win32Backend {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            hwnd: None,
            state: Box::default(),
        }
    }

    fn create_window(&self, canvas: &dyn Canvas) -> Result<HWND, WindowError> {
        let instance = unsafe { GetModuleHandleW(None) }
            .map_err(WindowError::win32("GetModuleHandleW"))?;

        let class = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: instance.into(),
            lpszClassName: w!("Facet"),
            hCursor: unsafe { LoadCursorW(None, IDC_ARROW) }.unwrap_or_default(),
            ..Default::default()
        };
        if unsafe { RegisterClassW(&class) } == 0 {
            let error = windows::core::Error::from_win32();
            // Class outlives the window, second backend in a process reuses it
            if error.code() != ERROR_CLASS_ALREADY_EXISTS.to_hresult() {
                return Err(WindowError::win32("RegisterClassW")(error));
            }
        }

        let (width, height) = self.config.window_size(canvas.width(), canvas.height());
        let mut rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };
        unsafe { AdjustWindowRect(&mut rect, WS_OVERLAPPEDWINDOW, FALSE) }
            .map_err(WindowError::win32("AdjustWindowRect"))?;

        let title: Vec<u16> = self
            .config
            .title
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(0),
                w!("Facet"),
                PCWSTR(title.as_ptr()),
                WS_OVERLAPPEDWINDOW | WS_VISIBLE,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                rect.right - rect.left,
                rect.bottom - rect.top,
                None,
                None,
                instance,
                None,
            )
        }
        .map_err(WindowError::win32("CreateWindowExW"))?;

        unsafe {
            SetWindowLongPtrW(
                hwnd,
                GWLP_USERDATA,
                &*self.state as *const WindowState as isize,
            );
        }

        tracing::info!(width, height, "Win32 window created");
        Ok(hwnd)
    }
}

impl Backend for Win32Backend {
    fn init(&mut self, canvas: &dyn Canvas) -> Result<(), WindowError> {
        let hwnd = self.create_window(canvas)?;
        self.hwnd = Some(hwnd);
        Ok(())
    }

    fn poll_events(&mut self) -> bool {
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_QUIT {
                self.state.closed.set(true);
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        self.hwnd.is_none() || self.state.closed.get()
    }

    fn present_frame(&mut self, canvas: &dyn Canvas) {
        let Some(hwnd) = self.hwnd else {
            return;
        };

        let (width, height, stride) = (canvas.width(), canvas.height(), canvas.stride());
        let pixels = canvas.pixels();
        if width == 0 || height == 0 {
            return;
        }
        if stride < width || pixels.len() < stride * height {
            tracing::warn!(
                width,
                height,
                stride,
                len = pixels.len(),
                "Canvas is smaller than its size, skipping frame"
            );
            return;
        }

        let info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: stride as i32,
                // Negative height for rows going top to bottom
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        unsafe {
            let hdc = GetDC(hwnd);
            SetDIBitsToDevice(
                hdc,
                0,
                0,
                width as u32,
                height as u32,
                0,
                0,
                0,
                height as u32,
                pixels.as_ptr().cast(),
                &info,
                DIB_RGB_COLORS,
            );
            ReleaseDC(hwnd, hdc);
        }
    }

    #[inline]
    fn is_key_down(&self, key_code: u16) -> bool {
        is_async_key_down(key_code as i32)
    }

    #[inline]
    fn is_mouse_down(&self, button: u8) -> bool {
        virtual_key(button).is_some_and(is_async_key_down)
    }

    #[inline]
    fn last_click_position(&self) -> (f32, f32) {
        self.state.last_click.get()
    }

    #[inline]
    fn mouse_position(&self) -> (f32, f32) {
        self.state.pointer.get()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Win32
    }
}

impl Drop for Win32Backend {
    fn drop(&mut self) {
        let Some(hwnd) = self.hwnd.take() else {
            return;
        };

        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            if let Err(err) = DestroyWindow(hwnd) {
                tracing::debug!(%err, "Could not destroy window");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lparam_coordinates_are_signed() {
        assert_eq!(point_from_lparam(LPARAM(0x0014_000a)), (10.0, 20.0));
        assert_eq!(point_from_lparam(LPARAM(0xfffe_ffffu32 as isize)), (-1.0, -2.0));
    }

    #[test]
    fn mouse_buttons_map_to_virtual_keys() {
        assert_eq!(virtual_key(0), Some(VK_LBUTTON.0 as i32));
        assert_eq!(virtual_key(1), Some(VK_RBUTTON.0 as i32));
        assert_eq!(virtual_key(2), Some(VK_MBUTTON.0 as i32));
        assert_eq!(virtual_key(3), None);
    }

    #[test]
    fn uninitialized_backend_is_closed() {
        let mut backend = Win32Backend::new(WindowConfig::default());
        assert!(backend.poll_events());
        assert_eq!(backend.last_click_position(), (0.0, 0.0));
        assert_eq!(backend.kind(), BackendKind::Win32);
    }
}
