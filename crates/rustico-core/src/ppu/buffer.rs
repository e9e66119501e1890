//! Double-buffered output plane for the PPU's rendered picture.
//!
//! The canonical representation is a palette-index plane (one byte per
//! pixel, `SCREEN_WIDTH x SCREEN_HEIGHT`), paired with an emphasis plane
//! carrying the `$2001` color-emphasis bits active when that pixel was
//! drawn. Packed pixel formats (RGBA, RGB565, ...) are derived from both
//! planes only at presentation time, via [`pack_line`]/[`pack_pixel`].
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH, palette::Color};
use core::{ffi::c_void, fmt};
use std::{
    ptr::NonNull,
    slice,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

pub const SCREEN_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

pub type FrameReadyCallback =
    extern "C" fn(buffer_index: u32, width: u32, height: u32, pitch: u32, user_data: *mut c_void);

pub type SwapchainLockCallback =
    extern "C" fn(buffer_index: u32, pitch_out: *mut u32, user_data: *mut c_void) -> *mut u8;
pub type SwapchainUnlockCallback = extern "C" fn(buffer_index: u32, user_data: *mut c_void);

#[derive(Clone, Copy)]
struct FrameReadyHook {
    cb: FrameReadyCallback,
    user_data: *mut c_void,
}

// SAFETY: the embedder owns `user_data` and is responsible for its validity;
// the hook never dereferences it itself, only forwards it to `cb`.
unsafe impl Send for FrameReadyHook {}

impl fmt::Debug for FrameReadyHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReadyHook")
            .field("cb", &(self.cb as usize))
            .field("user_data", &self.user_data)
            .finish()
    }
}

impl FrameReadyHook {
    #[inline]
    fn call(&self, buffer_index: usize, pitch: usize) {
        debug_assert!(buffer_index < 2);
        (self.cb)(
            buffer_index as u32,
            SCREEN_WIDTH as u32,
            SCREEN_HEIGHT as u32,
            pitch as u32,
            self.user_data,
        );
    }
}

/// How a logical RGB color is packed into the destination byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Rgb555,
    Rgb565,
    Rgb888,
    Rgba8888,
    Bgra8888,
    Argb8888,
}

impl ColorFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorFormat::Rgb555 | ColorFormat::Rgb565 => 2,
            ColorFormat::Rgb888 => 3,
            ColorFormat::Rgba8888 | ColorFormat::Bgra8888 | ColorFormat::Argb8888 => 4,
        }
    }
}

/// Double-buffered picture output: one back plane the PPU draws into while
/// the front plane from the previous frame is read by the embedder.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Index of the plane pair currently being drawn into (0 or 1).
    active_index: usize,
    index_planes: [Box<[u8]>; 2],
    emphasis_planes: [Box<[u8]>; 2],
    storage: FrameBufferStorage,
    color_format: ColorFormat,
    frame_ready_hook: Option<FrameReadyHook>,
    /// Master palette snapshot from the most recent `present`/`rebuild_packed`
    /// call, kept around so `pack_plane` doesn't need it threaded through
    /// every storage variant's lock path.
    palette_colors: [Color; 64],
}

/// Where derived packed pixels end up once a frame finishes.
#[derive(Debug)]
enum FrameBufferStorage {
    Owned([Box<[u8]>; 2]),
    External(Arc<ExternalFrameHandle>),
    /// Writable planes obtained through embedder callbacks, locked only for
    /// the duration of a pack.
    Swapchain(SwapchainFrameBuffer),
}

impl Clone for FrameBufferStorage {
    fn clone(&self) -> Self {
        match self {
            Self::Owned(planes) => Self::Owned([planes[0].clone(), planes[1].clone()]),
            Self::External(handle) => Self::External(Arc::clone(handle)),
            Self::Swapchain(_) => {
                panic!("cloning a swapchain-backed FrameBuffer is not supported")
            }
        }
    }
}

impl Clone for FrameBuffer {
    fn clone(&self) -> Self {
        Self {
            active_index: self.active_index,
            index_planes: [self.index_planes[0].clone(), self.index_planes[1].clone()],
            emphasis_planes: [
                self.emphasis_planes[0].clone(),
                self.emphasis_planes[1].clone(),
            ],
            storage: self.storage.clone(),
            color_format: self.color_format,
            frame_ready_hook: self.frame_ready_hook,
            palette_colors: self.palette_colors,
        }
    }
}

/// Shared external framebuffer planes plus the published front index, used
/// when the embedder owns the packed pixel memory directly.
#[derive(Debug)]
pub struct ExternalFrameHandle {
    planes: [NonNull<u8>; 2],
    len: usize,
    pitch_bytes: usize,
    color_format: ColorFormat,
    front_index: AtomicUsize,
    frame_seq: AtomicUsize,
    reading_plane: AtomicUsize,
}

unsafe impl Send for ExternalFrameHandle {}
unsafe impl Sync for ExternalFrameHandle {}

impl ExternalFrameHandle {
    const NOT_READING: usize = 2;

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline]
    pub fn pitch_bytes(&self) -> usize {
        self.pitch_bytes
    }
    #[inline]
    pub fn color_format(&self) -> ColorFormat {
        self.color_format
    }
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.color_format.bytes_per_pixel()
    }
    #[inline]
    pub fn front_index(&self) -> usize {
        self.front_index.load(Ordering::Acquire)
    }
    #[inline]
    pub fn frame_seq(&self) -> usize {
        self.frame_seq.load(Ordering::Acquire)
    }

    #[inline]
    pub fn front_slice(&self) -> &[u8] {
        let idx = self.front_index();
        unsafe { slice::from_raw_parts(self.planes[idx].as_ptr(), self.len) }
    }

    #[inline]
    pub fn present(&self, index: usize) {
        debug_assert!(index < 2);
        self.front_index.store(index, Ordering::Release);
        self.frame_seq.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn plane_slice(&self, index: usize) -> &[u8] {
        debug_assert!(index < 2);
        unsafe { slice::from_raw_parts(self.planes[index].as_ptr(), self.len) }
    }

    #[inline]
    fn plane_ptr_mut(&self, index: usize) -> *mut u8 {
        debug_assert!(index < 2);
        self.planes[index].as_ptr()
    }

    #[inline]
    pub fn begin_front_copy(&self) -> usize {
        loop {
            let idx = self.front_index();
            self.reading_plane.store(idx, Ordering::Release);
            if self.front_index() == idx {
                return idx;
            }
            self.reading_plane
                .store(Self::NOT_READING, Ordering::Release);
        }
    }

    #[inline]
    pub fn end_front_copy(&self) {
        self.reading_plane
            .store(Self::NOT_READING, Ordering::Release);
    }

    #[inline]
    fn wait_until_not_reading(&self, index: usize) {
        let mut spins = 0u32;
        while self.reading_plane.load(Ordering::Acquire) == index {
            std::hint::spin_loop();
            spins += 1;
            if spins >= 128 {
                spins = 0;
                std::thread::yield_now();
            }
        }
    }
}

#[derive(Clone, Copy)]
struct SwapchainHook {
    lock: SwapchainLockCallback,
    unlock: SwapchainUnlockCallback,
    user_data: *mut c_void,
}

unsafe impl Send for SwapchainHook {}

impl fmt::Debug for SwapchainHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapchainHook")
            .field("lock", &(self.lock as usize))
            .field("unlock", &(self.unlock as usize))
            .field("user_data", &self.user_data)
            .finish()
    }
}

#[derive(Debug)]
struct SwapchainFrameBuffer {
    hook: SwapchainHook,
    ptr: [*mut u8; 2],
    pitch_bytes: [usize; 2],
    locked: [bool; 2],
}

unsafe impl Send for SwapchainFrameBuffer {}

impl SwapchainFrameBuffer {
    fn new(
        lock: SwapchainLockCallback,
        unlock: SwapchainUnlockCallback,
        user_data: *mut c_void,
    ) -> Self {
        Self {
            hook: SwapchainHook {
                lock,
                unlock,
                user_data,
            },
            ptr: [std::ptr::null_mut(); 2],
            pitch_bytes: [0, 0],
            locked: [false, false],
        }
    }

    fn lock(&mut self, index: usize) -> (*mut u8, usize) {
        debug_assert!(index < 2);
        if self.locked[index] {
            return (self.ptr[index], self.pitch_bytes[index]);
        }
        let mut pitch = 0u32;
        let ptr = (self.hook.lock)(index as u32, &mut pitch as *mut u32, self.hook.user_data);
        assert!(!ptr.is_null());
        self.ptr[index] = ptr;
        self.pitch_bytes[index] = pitch as usize;
        self.locked[index] = true;
        (ptr, pitch as usize)
    }

    fn unlock(&mut self, index: usize) {
        debug_assert!(index < 2);
        if !self.locked[index] {
            return;
        }
        (self.hook.unlock)(index as u32, self.hook.user_data);
        self.ptr[index] = std::ptr::null_mut();
        self.pitch_bytes[index] = 0;
        self.locked[index] = false;
    }
}

fn fresh_index_planes() -> [Box<[u8]>; 2] {
    [
        vec![0u8; SCREEN_SIZE].into_boxed_slice(),
        vec![0u8; SCREEN_SIZE].into_boxed_slice(),
    ]
}

impl FrameBuffer {
    /// Creates a `FrameBuffer` owning its own packed-pixel storage.
    pub fn new(color_format: ColorFormat) -> Self {
        let len = SCREEN_WIDTH * SCREEN_HEIGHT * color_format.bytes_per_pixel();
        Self {
            active_index: 0,
            index_planes: fresh_index_planes(),
            emphasis_planes: fresh_index_planes(),
            storage: FrameBufferStorage::Owned([
                vec![0; len].into_boxed_slice(),
                vec![0; len].into_boxed_slice(),
            ]),
            color_format,
            frame_ready_hook: None,
            palette_colors: [Color::default(); 64],
        }
    }

    /// Creates a framebuffer backed by externally provided double buffers.
    pub unsafe fn new_external(
        color_format: ColorFormat,
        pitch_bytes: usize,
        plane0: *mut u8,
        plane1: *mut u8,
    ) -> (Self, Arc<ExternalFrameHandle>) {
        let bpp = color_format.bytes_per_pixel();
        assert!(pitch_bytes >= SCREEN_WIDTH * bpp);
        let len = pitch_bytes * SCREEN_HEIGHT;

        let handle = Arc::new(ExternalFrameHandle {
            planes: [NonNull::new(plane0).unwrap(), NonNull::new(plane1).unwrap()],
            len,
            pitch_bytes,
            color_format,
            front_index: AtomicUsize::new(0),
            frame_seq: AtomicUsize::new(0),
            reading_plane: AtomicUsize::new(ExternalFrameHandle::NOT_READING),
        });

        let fb = Self {
            active_index: 1,
            index_planes: fresh_index_planes(),
            emphasis_planes: fresh_index_planes(),
            storage: FrameBufferStorage::External(Arc::clone(&handle)),
            color_format,
            frame_ready_hook: None,
            palette_colors: [Color::default(); 64],
        };

        (fb, handle)
    }

    /// Creates a framebuffer that obtains writable planes through embedder
    /// lock/unlock callbacks (e.g. a host swapchain).
    pub fn new_swapchain(
        color_format: ColorFormat,
        lock: SwapchainLockCallback,
        unlock: SwapchainUnlockCallback,
        user_data: *mut c_void,
    ) -> Self {
        Self {
            active_index: 1,
            index_planes: fresh_index_planes(),
            emphasis_planes: fresh_index_planes(),
            storage: FrameBufferStorage::Swapchain(SwapchainFrameBuffer::new(
                lock, unlock, user_data,
            )),
            color_format,
            frame_ready_hook: None,
            palette_colors: [Color::default(); 64],
        }
    }

    fn lock_plane_for_pack(&mut self, plane: usize) -> (*mut u8, usize) {
        let format = self.color_format;
        match &mut self.storage {
            FrameBufferStorage::Owned(planes) => (
                planes[plane].as_mut_ptr(),
                SCREEN_WIDTH * format.bytes_per_pixel(),
            ),
            FrameBufferStorage::External(handle) => {
                (handle.plane_ptr_mut(plane), handle.pitch_bytes())
            }
            FrameBufferStorage::Swapchain(s) => s.lock(plane),
        }
    }

    fn pack_plane(&mut self, plane: usize) -> usize {
        let format = self.color_format;
        // Raw pointers rather than slice borrows: `lock_plane_for_pack` takes
        // `&mut self` and the index/emphasis planes never move underneath it.
        let indices_ptr = self.index_planes[plane].as_ptr();
        let emphasis_ptr = self.emphasis_planes[plane].as_ptr();
        let palette = self.palette_colors;
        let (dst_ptr, dst_pitch) = self.lock_plane_for_pack(plane);

        unsafe {
            for y in 0..SCREEN_HEIGHT {
                let row_indices = slice::from_raw_parts(indices_ptr.add(y * SCREEN_WIDTH), SCREEN_WIDTH);
                let row_emphasis =
                    slice::from_raw_parts(emphasis_ptr.add(y * SCREEN_WIDTH), SCREEN_WIDTH);
                let row_dst = dst_ptr.add(y * dst_pitch);
                pack_line(row_indices, row_emphasis, row_dst, format, &palette);
            }
        }
        dst_pitch
    }

    /// Converts the just-finished back plane into packed pixels, publishes
    /// it as the new front plane, and clears the next back plane.
    pub fn present(&mut self, palette: &[Color; 64]) {
        let finished_back = self.active_index;
        self.palette_colors = *palette;
        let dst_pitch = self.pack_plane(finished_back);

        match &mut self.storage {
            FrameBufferStorage::Owned(_) => {
                if let Some(hook) = self.frame_ready_hook {
                    hook.call(finished_back, dst_pitch);
                }
                self.active_index = 1 - self.active_index;
            }
            FrameBufferStorage::External(handle) => {
                handle.present(finished_back);
                if let Some(hook) = self.frame_ready_hook {
                    hook.call(finished_back, dst_pitch);
                }
                self.active_index = 1 - self.active_index;
                handle.wait_until_not_reading(self.active_index);
            }
            FrameBufferStorage::Swapchain(s) => {
                s.unlock(finished_back);
                if let Some(hook) = self.frame_ready_hook {
                    hook.call(finished_back, dst_pitch);
                }
                self.active_index = 1 - self.active_index;
            }
        }

        self.index_planes[self.active_index].fill(0);
        self.emphasis_planes[self.active_index].fill(0);
    }

    /// Rebuilds the current front packed buffer from its index/emphasis
    /// planes, e.g. after a rewind restore where only indices were saved.
    pub fn rebuild_packed(&mut self, palette: &[Color; 64]) {
        let front_idx = 1 - self.active_index;
        self.palette_colors = *palette;
        if let FrameBufferStorage::External(handle) = &self.storage {
            handle.wait_until_not_reading(front_idx);
        }
        self.pack_plane(front_idx);
        if let FrameBufferStorage::Swapchain(s) = &mut self.storage {
            s.unlock(front_idx);
        }
    }

    /// Writes a single back-plane pixel as a palette index plus the
    /// `$2001` emphasis bits (`EMPHASIZE_RED|GREEN|BLUE >> 5`) active when
    /// it was drawn.
    #[inline]
    pub fn write_pixel(&mut self, x: usize, y: usize, index: u8, emphasis: u8) {
        let offset = y * SCREEN_WIDTH + x;
        self.index_planes[self.active_index][offset] = index;
        self.emphasis_planes[self.active_index][offset] = emphasis;
    }

    /// Writes a pixel with no color emphasis active.
    #[inline]
    pub fn write_index(&mut self, x: usize, y: usize, index: u8) {
        self.write_pixel(x, y, index, 0);
    }

    pub fn render(&self) -> &[u8] {
        let front_idx = 1 - self.active_index;
        match &self.storage {
            FrameBufferStorage::Owned(planes) => &planes[front_idx],
            FrameBufferStorage::External(handle) => handle.plane_slice(front_idx),
            FrameBufferStorage::Swapchain(_) => {
                panic!("Direct plane access not supported for Swapchain. Use copy_render_buffer.")
            }
        }
    }

    pub fn render_index(&self) -> &[u8] {
        &self.index_planes[1 - self.active_index]
    }

    pub fn copy_render_index_buffer(&self, dst: &mut [u8]) {
        assert!(
            dst.len() == SCREEN_SIZE,
            "dst must be SCREEN_WIDTH * SCREEN_HEIGHT bytes"
        );
        dst.copy_from_slice(self.render_index());
    }

    /// Copies the current front packed pixel buffer into `dst`, tightly
    /// packed with no per-row padding even when the backing storage has
    /// padded rows.
    pub fn copy_render_buffer(&mut self, dst: &mut [u8]) {
        let front_idx = 1 - self.active_index;
        let bpp = self.color_format.bytes_per_pixel();
        let row_len = SCREEN_WIDTH * bpp;
        let expected = row_len * SCREEN_HEIGHT;
        assert!(
            dst.len() == expected,
            "dst must be SCREEN_WIDTH * SCREEN_HEIGHT * bytes_per_pixel bytes"
        );

        match &mut self.storage {
            FrameBufferStorage::Owned(planes) => {
                dst.copy_from_slice(&planes[front_idx]);
            }
            FrameBufferStorage::External(handle) => {
                let src = handle.plane_slice(front_idx);
                let pitch = handle.pitch_bytes();
                debug_assert!(pitch >= row_len);
                for y in 0..SCREEN_HEIGHT {
                    let src_off = y * pitch;
                    let dst_off = y * row_len;
                    dst[dst_off..dst_off + row_len]
                        .copy_from_slice(&src[src_off..src_off + row_len]);
                }
            }
            FrameBufferStorage::Swapchain(s) => {
                let (ptr, pitch) = s.lock(front_idx);
                debug_assert!(pitch >= row_len);
                let src = unsafe { slice::from_raw_parts(ptr, pitch * SCREEN_HEIGHT) };
                for y in 0..SCREEN_HEIGHT {
                    let src_off = y * pitch;
                    let dst_off = y * row_len;
                    dst[dst_off..dst_off + row_len]
                        .copy_from_slice(&src[src_off..src_off + row_len]);
                }
                s.unlock(front_idx);
            }
        }
    }

    #[inline]
    pub fn index_plane(&self, index: usize) -> &[u8] {
        debug_assert!(index < 2);
        &self.index_planes[index]
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        match &self.storage {
            FrameBufferStorage::External(handle) => handle.pitch_bytes(),
            FrameBufferStorage::Owned(_) => SCREEN_WIDTH * self.color_format.bytes_per_pixel(),
            FrameBufferStorage::Swapchain(s) => {
                if s.locked[self.active_index] {
                    s.pitch_bytes[self.active_index]
                } else {
                    SCREEN_WIDTH * self.color_format.bytes_per_pixel()
                }
            }
        }
    }

    pub fn set_frame_ready_callback(
        &mut self,
        cb: Option<FrameReadyCallback>,
        user_data: *mut c_void,
    ) {
        self.frame_ready_hook = cb.map(|cb| FrameReadyHook { cb, user_data });
    }

    #[inline]
    pub fn active_plane_index(&self) -> usize {
        self.active_index
    }

    /// Mutable view of the back index plane, for code that writes pixels in
    /// bulk rather than through [`write_pixel`].
    pub fn write(&mut self) -> &mut [u8] {
        &mut *self.index_planes[self.active_index]
    }

    pub fn clear(&mut self) {
        for plane in &mut self.index_planes {
            plane.fill(0);
        }
        for plane in &mut self.emphasis_planes {
            plane.fill(0);
        }
        match &mut self.storage {
            FrameBufferStorage::Owned(planes) => {
                for plane in planes {
                    plane.fill(0);
                }
            }
            FrameBufferStorage::External(handle) => {
                for i in 0..2 {
                    handle.wait_until_not_reading(i);
                    unsafe {
                        slice::from_raw_parts_mut(handle.plane_ptr_mut(i), handle.len()).fill(0)
                    };
                }
            }
            FrameBufferStorage::Swapchain(s) => {
                for i in 0..2 {
                    let (ptr, pitch) = s.lock(i);
                    unsafe { slice::from_raw_parts_mut(ptr, pitch * SCREEN_HEIGHT).fill(0) };
                    s.unlock(i);
                }
            }
        }
    }

    #[inline]
    pub fn color_format(&self) -> ColorFormat {
        self.color_format
    }
}

/// Attenuates the channels not named by `emphasis`'s active bits (bit 0 =
/// red, bit 1 = green, bit 2 = blue), approximating the NES 2C02's color
/// emphasis the way most software decoders do: emphasized channels pass
/// through, the rest are dimmed by a fixed factor.
#[inline]
pub fn apply_emphasis(color: Color, _idx: u8, emphasis: u8) -> Color {
    if emphasis == 0 {
        return color;
    }
    const ATTENUATION: u32 = 191; // ~0.75 in Q8, matches common emulator approximations
    let dim = |c: u8| ((c as u32 * ATTENUATION) >> 8) as u8;
    Color {
        r: if emphasis & 0b001 != 0 { color.r } else { dim(color.r) },
        g: if emphasis & 0b010 != 0 { color.g } else { dim(color.g) },
        b: if emphasis & 0b100 != 0 { color.b } else { dim(color.b) },
    }
}

/// Packs a single resolved color into `dst` at the given format.
///
/// # Safety
/// `dst` must have at least `format.bytes_per_pixel()` writable bytes.
#[inline]
pub unsafe fn pack_pixel(color: Color, dst: *mut u8, format: ColorFormat) {
    unsafe {
        match format {
            ColorFormat::Rgb555 => {
                let packed = ((color.r as u16) >> 3) << 10
                    | ((color.g as u16) >> 3) << 5
                    | (color.b as u16) >> 3;
                let bytes = packed.to_le_bytes();
                *dst = bytes[0];
                *dst.add(1) = bytes[1];
            }
            ColorFormat::Rgb565 => {
                let packed = ((color.r as u16) >> 3) << 11
                    | ((color.g as u16) >> 2) << 5
                    | (color.b as u16) >> 3;
                let bytes = packed.to_le_bytes();
                *dst = bytes[0];
                *dst.add(1) = bytes[1];
            }
            ColorFormat::Rgb888 => {
                *dst = color.r;
                *dst.add(1) = color.g;
                *dst.add(2) = color.b;
            }
            ColorFormat::Rgba8888 => {
                *dst = color.r;
                *dst.add(1) = color.g;
                *dst.add(2) = color.b;
                *dst.add(3) = 0xFF;
            }
            ColorFormat::Bgra8888 => {
                *dst = color.b;
                *dst.add(1) = color.g;
                *dst.add(2) = color.r;
                *dst.add(3) = 0xFF;
            }
            ColorFormat::Argb8888 => {
                *dst = 0xFF;
                *dst.add(1) = color.r;
                *dst.add(2) = color.g;
                *dst.add(3) = color.b;
            }
        }
    }
}

/// Packs one scanline of palette indices (plus per-pixel emphasis bits)
/// into `dst`.
///
/// # Safety
/// `dst` must have room for `indices.len() * format.bytes_per_pixel()` bytes.
pub unsafe fn pack_line(
    indices: &[u8],
    emphasis: &[u8],
    dst: *mut u8,
    format: ColorFormat,
    palette: &[Color; 64],
) {
    let bpp = format.bytes_per_pixel();
    for (x, &idx) in indices.iter().enumerate() {
        let base = palette[(idx & 0x3F) as usize];
        let em = emphasis.get(x).copied().unwrap_or(0);
        let color = apply_emphasis(base, idx, em);
        unsafe { pack_pixel(color, dst.add(x * bpp), format) };
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(ColorFormat::Rgba8888)
    }
}
