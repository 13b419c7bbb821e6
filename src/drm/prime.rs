//! PRIME buffer sharing
//!
//! Dumb buffer allocation on the display device and dma-buf
//! export/import between the display and render devices

use anyhow::{anyhow, Context, Result};
use drm::buffer::{self, Buffer, DrmFourcc};
use drm::control::{dumbbuffer::DumbBuffer, Device as ControlDevice};
use log::{debug, warn};
use std::num::NonZeroU32;
use std::os::unix::io::{AsFd, OwnedFd};

use super::device::Device;

/// Flags for PRIME export: close-on-exec, read/write mappable
pub const PRIME_EXPORT_FLAGS: u32 = (libc::O_CLOEXEC | libc::O_RDWR) as u32;

/// Dumb buffer owned by the display device, destroyed on drop
pub struct SharedDumbBuffer<'a> {
    device: &'a Device,
    layout: BufferLayout,
    // Taken in Drop
    buffer: Option<DumbBuffer>,
}

impl<'a> SharedDumbBuffer<'a> {
    /// Allocate a 32 bpp XRGB8888 dumb buffer
    pub fn create(device: &'a Device, width: u32, height: u32) -> Result<Self> {
        let buffer = device
            .create_dumb_buffer((width, height), DrmFourcc::Xrgb8888, 32)
            .with_context(|| {
                format!(
                    "Dumb Buffer Object Allocation request of {}x{}@32 failed",
                    width, height
                )
            })?;
        debug!(
            "Dumb buffer: handle={:?} pitch={}",
            buffer.handle(),
            buffer.pitch()
        );
        let layout = BufferLayout {
            handle: buffer.handle(),
            size: buffer.size(),
            pitch: buffer.pitch(),
            format: buffer.format(),
        };
        Ok(Self {
            device,
            layout,
            buffer: Some(buffer),
        })
    }

    /// Export as a dma-buf fd
    pub fn export(&self) -> Result<OwnedFd> {
        self.device
            .buffer_to_prime_fd(self.layout.handle, PRIME_EXPORT_FLAGS)
            .context("Could not export buffer")
    }
}

impl Buffer for SharedDumbBuffer<'_> {
    fn size(&self) -> (u32, u32) {
        self.layout.size
    }

    fn format(&self) -> DrmFourcc {
        self.layout.format
    }

    fn pitch(&self) -> u32 {
        self.layout.pitch
    }

    fn handle(&self) -> buffer::Handle {
        self.layout.handle
    }
}

impl Drop for SharedDumbBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(e) = self.device.destroy_dumb_buffer(buffer) {
                warn!("Failed to destroy dumb buffer: {}", e);
            }
        }
    }
}

/// Where a buffer lives on a DRM device: GEM handle, size, pitch and format.
///
/// Does not own the handle; whoever allocated the buffer releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    handle: buffer::Handle,
    size: (u32, u32),
    pitch: u32,
    format: DrmFourcc,
}

impl BufferLayout {
    /// Describe a buffer from its raw GEM handle (e.g. one owned by GBM)
    pub fn from_parts(
        handle: u32,
        size: (u32, u32),
        pitch: u32,
        format: DrmFourcc,
    ) -> Result<Self> {
        let handle = NonZeroU32::new(handle)
            .map(buffer::Handle::from)
            .ok_or_else(|| anyhow!("GEM handle 0 does not name a buffer"))?;
        Ok(Self {
            handle,
            size,
            pitch,
            format,
        })
    }
}

impl Buffer for BufferLayout {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn format(&self) -> DrmFourcc {
        self.format
    }

    fn pitch(&self) -> u32 {
        self.pitch
    }

    fn handle(&self) -> buffer::Handle {
        self.handle
    }
}

/// A dma-buf imported into a DRM device as a GEM handle, closed on drop
pub struct ImportedBuffer<'a> {
    device: &'a Device,
    layout: BufferLayout,
}

impl<'a> ImportedBuffer<'a> {
    /// Import `fd` into `device`; size, pitch and format describe the exporter's layout
    pub fn import<F: AsFd>(
        device: &'a Device,
        fd: &F,
        size: (u32, u32),
        pitch: u32,
        format: DrmFourcc,
    ) -> Result<Self> {
        let handle = device
            .prime_fd_to_buffer(fd.as_fd())
            .context("Could not import buffer")?;
        debug!("Imported dma-buf as {:?}", handle);
        Ok(Self {
            device,
            layout: BufferLayout {
                handle,
                size,
                pitch,
                format,
            },
        })
    }
}

impl Buffer for ImportedBuffer<'_> {
    fn size(&self) -> (u32, u32) {
        self.layout.size
    }

    fn format(&self) -> DrmFourcc {
        self.layout.format
    }

    fn pitch(&self) -> u32 {
        self.layout.pitch
    }

    fn handle(&self) -> buffer::Handle {
        self.layout.handle
    }
}

impl Drop for ImportedBuffer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.close_buffer(self.layout.handle) {
            warn!("Failed to close GEM handle {:?}: {}", self.layout.handle, e);
        }
    }
}
