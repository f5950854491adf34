//! Framebuffer device surface
//!
//! Owns the opened device node and the shared mapping of its pixel
//! memory. Geometry comes from the two standard framebuffer ioctls;
//! everything above this module works on a plain byte slice and a
//! [`Geometry`] snapshot, so the renderer and the clock loop also run
//! against an off-screen surface without any device present.

use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::slice;

use memmap2::{MmapOptions, MmapRaw};
use thiserror::Error;

// Framebuffer ioctl bindings from <linux/fb.h>; the libc crate does not
// ship these.
const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
const FBIOGET_FSCREENINFO: libc::c_ulong = 0x4602;

#[repr(C)]
struct fb_fix_screeninfo {
    id: [libc::c_char; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

#[repr(C)]
struct fb_bitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
struct fb_var_screeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: fb_bitfield,
    green: fb_bitfield,
    blue: fb_bitfield,
    transp: fb_bitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// Errors raised while opening and mapping the framebuffer device.
///
/// All of these are fatal setup failures; the process reports them on
/// stderr and exits with status 1.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("failed to open framebuffer device {path}")]
    DeviceOpen { path: PathBuf, source: io::Error },

    #[error("FBIOGET_FSCREENINFO failed on {path}")]
    FixedInfo { path: PathBuf, source: io::Error },

    #[error("FBIOGET_VSCREENINFO failed on {path}")]
    VariableInfo { path: PathBuf, source: io::Error },

    #[error("{path} reports {bits_per_pixel} bits per pixel; only byte-aligned depths are supported")]
    UnsupportedDepth { path: PathBuf, bits_per_pixel: u32 },

    #[error("{path} maps {mem_len} bytes, less than line_length {line_length} x yres {yres}")]
    ShortMap {
        path: PathBuf,
        mem_len: usize,
        line_length: usize,
        yres: usize,
    },

    #[error("mmap of {len} bytes failed on {path}")]
    Map {
        path: PathBuf,
        len: usize,
        source: io::Error,
    },
}

/// Snapshot of the device mode, taken once at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Visible horizontal resolution in pixels
    pub xres: usize,
    /// Visible vertical resolution in pixels
    pub yres: usize,
    /// Pixel depth; a non-zero multiple of 8
    pub bits_per_pixel: usize,
    /// Bytes per scan line, including any padding past `xres` pixels
    pub line_length: usize,
    /// Total mapped length in bytes
    pub mem_len: usize,
}

impl Geometry {
    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel / 8
    }
}

#[derive(Debug)]
enum Backing {
    /// Shared read+write mapping of the device node. The file handle is
    /// kept alive for the lifetime of the mapping.
    Device { _file: File, map: MmapRaw },
    /// Owned memory standing in for a device, for tests and headless use.
    Offscreen(Vec<u8>),
}

/// One opened framebuffer.
///
/// Exactly one `Surface` exists per process run; the clock loop owns it
/// for its entire life. Dropping it unmaps the memory and closes the
/// device handle, on every exit route.
#[derive(Debug)]
pub struct Surface {
    geometry: Geometry,
    backing: Backing,
}

impl Surface {
    /// Open a framebuffer device, query its geometry and map its memory.
    ///
    /// The device is opened read+write and non-blocking. Both geometry
    /// ioctls must succeed: the variable-info query positions every
    /// later pixel write, so a failure there is fatal rather than merely
    /// logged. On any failure after the open, the handle is closed
    /// before returning.
    pub fn open(path: &Path) -> Result<Self, SurfaceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| SurfaceError::DeviceOpen {
                path: path.to_owned(),
                source,
            })?;

        let fd = file.as_raw_fd();

        let mut fix: fb_fix_screeninfo = unsafe { mem::zeroed() };
        // SAFETY: fd is a valid open descriptor and fix is a zeroed
        // struct of the size FBIOGET_FSCREENINFO writes.
        if unsafe { libc::ioctl(fd, FBIOGET_FSCREENINFO, &mut fix) } == -1 {
            return Err(SurfaceError::FixedInfo {
                path: path.to_owned(),
                source: io::Error::last_os_error(),
            });
        }

        let mut var: fb_var_screeninfo = unsafe { mem::zeroed() };
        // SAFETY: as above, for FBIOGET_VSCREENINFO.
        if unsafe { libc::ioctl(fd, FBIOGET_VSCREENINFO, &mut var) } == -1 {
            return Err(SurfaceError::VariableInfo {
                path: path.to_owned(),
                source: io::Error::last_os_error(),
            });
        }

        if var.bits_per_pixel == 0 || var.bits_per_pixel % 8 != 0 {
            return Err(SurfaceError::UnsupportedDepth {
                path: path.to_owned(),
                bits_per_pixel: var.bits_per_pixel,
            });
        }

        let geometry = Geometry {
            xres: var.xres as usize,
            yres: var.yres as usize,
            bits_per_pixel: var.bits_per_pixel as usize,
            line_length: fix.line_length as usize,
            mem_len: fix.smem_len as usize,
        };

        if geometry.mem_len < geometry.line_length * geometry.yres {
            return Err(SurfaceError::ShortMap {
                path: path.to_owned(),
                mem_len: geometry.mem_len,
                line_length: geometry.line_length,
                yres: geometry.yres,
            });
        }

        log::info!(
            "{}: {}x{} @ {} bpp, stride {} bytes, {} bytes mapped",
            path.display(),
            geometry.xres,
            geometry.yres,
            geometry.bits_per_pixel,
            geometry.line_length,
            geometry.mem_len
        );

        let map = MmapOptions::new()
            .len(geometry.mem_len)
            .map_raw(&file)
            .map_err(|source| SurfaceError::Map {
                path: path.to_owned(),
                len: geometry.mem_len,
                source,
            })?;

        Ok(Surface {
            geometry,
            backing: Backing::Device { _file: file, map },
        })
    }

    /// An in-memory surface with the given geometry, zero-filled.
    /// Lets the renderer and the clock loop run without a device.
    #[allow(dead_code)]
    pub fn offscreen(geometry: Geometry) -> Self {
        Surface {
            geometry,
            backing: Backing::Offscreen(vec![0u8; geometry.mem_len]),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The whole mapped pixel memory as a byte slice.
    ///
    /// This is the only place raw mapped memory is touched; all drawing
    /// goes through the slice.
    pub fn frame_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            // SAFETY: the mapping is valid for map.len() bytes for the
            // lifetime of self, and &mut self guarantees exclusive
            // access. No other component holds a reference to it.
            Backing::Device { map, .. } => unsafe {
                slice::from_raw_parts_mut(map.as_mut_ptr(), map.len())
            },
            Backing::Offscreen(buf) => buf.as_mut_slice(),
        }
    }
}
