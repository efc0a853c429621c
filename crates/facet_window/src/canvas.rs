use core::cmp;

/// Source of pixels that backends put on screen.
///
/// Pixels are packed `0x00RRGGBB`, row-major, top to bottom. Row `y` starts at
/// `y * stride()` and holds `width()` meaningful pixels.
pub trait Canvas {
    fn pixels(&self) -> &[u32];

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Pixels per row, including any padding after the visible part
    fn stride(&self) -> usize {
        self.width()
    }
}

/// Owned canvas with no row padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Black buffer of given size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    #[inline]
    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Change size keeping pixels of the region both sizes share. New pixels are black.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }

        let mut pixels = vec![0u32; width * height];
        let copy_width = cmp::min(width, self.width);
        for y in 0..cmp::min(height, self.height) {
            let old_offset = y * self.width;
            let new_offset = y * width;
            pixels[new_offset..new_offset + copy_width]
                .copy_from_slice(&self.pixels[old_offset..old_offset + copy_width]);
        }

        self.width = width;
        self.height = height;
        self.pixels = pixels;
    }

    /// `false` if `(x, y)` is outside of the buffer
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.pixels[y * self.width + x] = color;
        true
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }

    /// Fill rectangle clipped to the buffer
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: u32) {
        let x_end = cmp::min(x.saturating_add(width), self.width);
        let y_end = cmp::min(y.saturating_add(height), self.height);
        for row in y..y_end {
            let offset = row * self.width;
            if x < x_end {
                self.pixels[offset + x..offset + x_end].fill(color);
            }
        }
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }
}

impl Canvas for PixelBuffer {
    #[inline]
    fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn height(&self) -> usize {
        self.height
    }
}
