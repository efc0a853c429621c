/// Number of key codes tracked by backends that keep their own key table
pub const KEY_COUNT: usize = 512;

#[derive(Debug, Clone)]
struct BitArray<const SIZE: usize> {
    array: [u8; SIZE],
}

impl<const SIZE: usize> BitArray<SIZE> {
    #[inline]
    fn zeroed() -> Self {
        Self { array: [0; SIZE] }
    }

    #[inline]
    fn set(&mut self, key: usize) {
        self.array[key / 8] |= 1 << (key % 8);
    }

    #[inline]
    fn clear(&mut self, key: usize) {
        self.array[key / 8] &= !(1 << (key % 8));
    }

    #[inline]
    fn get(&self, key: usize) -> bool {
        (self.array[key / 8] & (1 << (key % 8))) != 0
    }
}

type KeyTable = BitArray<{ KEY_COUNT / 8 }>;

/// Mouse button with the same index on every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
}

impl MouseButton {
    #[inline]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            2 => Some(Self::Middle),
            _ => None,
        }
    }

    /// X11 numbers buttons from 1 with middle button in between. Wheel and extra buttons are
    /// not tracked.
    #[inline]
    pub fn from_x11(button: u8) -> Option<Self> {
        match button {
            1 => Some(Self::Left),
            2 => Some(Self::Middle),
            3 => Some(Self::Right),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Input as seen through the events received so far
#[derive(Debug, Clone)]
pub(crate) struct InputState {
    keys: KeyTable,
    buttons: [bool; 3],
    last_click: (f32, f32),
    pointer: (f32, f32),
}

impl InputState {
    pub(crate) fn new() -> Self {
        Self {
            keys: KeyTable::zeroed(),
            buttons: [false; 3],
            last_click: (0.0, 0.0),
            pointer: (0.0, 0.0),
        }
    }

    #[inline]
    pub(crate) fn key_down(&mut self, key_code: usize) {
        if key_code < KEY_COUNT {
            self.keys.set(key_code);
        }
    }

    #[inline]
    pub(crate) fn key_up(&mut self, key_code: usize) {
        if key_code < KEY_COUNT {
            self.keys.clear(key_code);
        }
    }

    #[inline]
    pub(crate) fn button_down(&mut self, button: MouseButton, x: f32, y: f32) {
        self.buttons[button.index() as usize] = true;
        self.last_click = (x, y);
        self.pointer = (x, y);
    }

    #[inline]
    pub(crate) fn button_up(&mut self, button: MouseButton) {
        self.buttons[button.index() as usize] = false;
    }

    #[inline]
    pub(crate) fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer = (x, y);
    }

    #[inline]
    pub(crate) fn is_key_down(&self, key_code: u16) -> bool {
        let key_code = key_code as usize;
        key_code < KEY_COUNT && self.keys.get(key_code)
    }

    #[inline]
    pub(crate) fn is_mouse_down(&self, button: u8) -> bool {
        MouseButton::from_index(button).is_some_and(|button| self.buttons[button.index() as usize])
    }

    #[inline]
    pub(crate) fn last_click_position(&self) -> (f32, f32) {
        self.last_click
    }

    #[inline]
    pub(crate) fn mouse_position(&self) -> (f32, f32) {
        self.pointer
    }
}
