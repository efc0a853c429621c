use facet_x11::{requests::PUT_IMAGE_HEADER_SIZE, ImageByteOrder};

const BYTES_PER_PIXEL: usize = 4;

/// Rows `dst_y..dst_y + height` of the image, ready to go out in one `PutImage` request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Strip<'a> {
    pub dst_y: i16,
    pub width: u16,
    pub height: u16,
    pub data: &'a [u8],
}

/// Layout of `PutImage` requests for canvas of one size. Holds no pixels between frames,
/// only the scratch buffer used when pixels can't be sent as they are.
#[derive(Debug)]
pub(crate) struct StagingImage {
    canvas_width: usize,
    canvas_height: usize,
    width: u16,
    height: u16,
    rows_per_request: usize,
    byte_order: ImageByteOrder,
    scratch: Vec<u8>,
}

impl StagingImage {
    pub(crate) fn new(
        canvas_width: usize,
        canvas_height: usize,
        maximum_request_bytes: usize,
        byte_order: ImageByteOrder,
    ) -> Self {
        let max_data_bytes = maximum_request_bytes.saturating_sub(PUT_IMAGE_HEADER_SIZE);
        // Row that doesn't fit in a single request is cut on the right side
        let width = canvas_width
            .min(u16::MAX as usize)
            .min(max_data_bytes / BYTES_PER_PIXEL);
        let height = canvas_height.min(u16::MAX as usize);
        let row_bytes = width * BYTES_PER_PIXEL;
        let rows_per_request = if row_bytes == 0 {
            0
        } else {
            (max_data_bytes / row_bytes).clamp(1, height.max(1))
        };

        Self {
            canvas_width,
            canvas_height,
            width: width as u16,
            height: height as u16,
            rows_per_request,
            byte_order,
            scratch: Vec::new(),
        }
    }

    /// Whether this image was built for canvas of that size
    #[inline]
    pub(crate) fn matches(&self, canvas_width: usize, canvas_height: usize) -> bool {
        self.canvas_width == canvas_width && self.canvas_height == canvas_height
    }

    #[inline]
    pub(crate) fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    #[inline]
    pub(crate) fn rows_per_request(&self) -> usize {
        self.rows_per_request
    }

    /// Borrow canvas pixels for the duration of one present
    pub(crate) fn attach<'a>(&'a mut self, pixels: &'a [u32], stride: usize) -> AttachedImage<'a> {
        AttachedImage {
            staging: self,
            pixels,
            stride,
        }
    }
}

/// [`StagingImage`] pointing at canvas pixels. Dropping it detaches the pixels.
pub(crate) struct AttachedImage<'a> {
    staging: &'a mut StagingImage,
    pixels: &'a [u32],
    stride: usize,
}

impl<'a> AttachedImage<'a> {
    /// Whether pixels must be repacked before sending
    pub(crate) fn needs_conversion(&self) -> bool {
        self.stride != self.staging.width as usize
            || self.staging.byte_order != ImageByteOrder::native()
    }

    /// Rows fully present in the pixel slice
    fn available_rows(&self) -> usize {
        let width = self.staging.width as usize;
        if self.pixels.len() < width {
            0
        } else if self.stride == 0 {
            usize::MAX
        } else {
            (self.pixels.len() - width) / self.stride + 1
        }
    }

    /// Call `send` with consecutive strips covering every row once, top to bottom
    pub(crate) fn for_each_strip<E>(
        &mut self,
        mut send: impl FnMut(Strip<'_>) -> Result<(), E>,
    ) -> Result<(), E> {
        let width = self.staging.width as usize;
        let rows = self.available_rows().min(self.staging.height as usize);
        let rows_per_request = self.staging.rows_per_request;
        let byte_order = self.staging.byte_order;
        let convert = self.needs_conversion();

        if width == 0 || rows == 0 {
            return Ok(());
        }

        let mut y = 0;
        // Strips must start at a row `dst_y` can address
        while y < rows && y <= i16::MAX as usize {
            let n = rows_per_request.min(rows - y);

            let data: &[u8] = if convert {
                let scratch = &mut self.staging.scratch;
                scratch.clear();
                for row in y..y + n {
                    let start = row * self.stride;
                    for pixel in &self.pixels[start..start + width] {
                        match byte_order {
                            ImageByteOrder::LSBFirst => {
                                scratch.extend_from_slice(&pixel.to_le_bytes())
                            }
                            ImageByteOrder::MSBFirst => {
                                scratch.extend_from_slice(&pixel.to_be_bytes())
                            }
                        }
                    }
                }
                scratch
            } else {
                bytemuck::cast_slice(&self.pixels[y * width..(y + n) * width])
            };

            send(Strip {
                dst_y: y as i16,
                width: width as u16,
                height: n as u16,
                data,
            })?;
            y += n;
        }

        Ok(())
    }
}
