//! GBM device, surface and buffer objects

use anyhow::{anyhow, Result};
use log::info;
use std::fs::File;
use std::os::unix::io::{AsFd, OwnedFd};

use crate::drm::BufferLayout;

/// Usage for buffers that are both rendered to and scanned out
fn scanout_usage() -> gbm::BufferObjectFlags {
    gbm::BufferObjectFlags::SCANOUT | gbm::BufferObjectFlags::RENDERING
}

/// GBM device
pub struct GbmDevice {
    device: gbm::Device<File>,
}

impl GbmDevice {
    /// Create GBM device from DRM file descriptor
    pub fn new(drm_file: File) -> Result<Self> {
        let device =
            gbm::Device::new(drm_file).map_err(|e| anyhow!("couldn't create gbm device: {:?}", e))?;
        info!("GBM device created");
        Ok(Self { device })
    }

    /// Reference to internal device
    pub fn device(&self) -> &gbm::Device<File> {
        &self.device
    }

    /// XRGB8888 scanout surface
    pub fn create_surface(&self, width: u32, height: u32) -> Result<GbmSurface> {
        let surface = self
            .device
            .create_surface::<()>(width, height, gbm::Format::Xrgb8888, scanout_usage())
            .map_err(|e| anyhow!("failed to create gbm surface: {:?}", e))?;

        info!("GBM surface created: {}x{}", width, height);
        Ok(GbmSurface { surface })
    }

    /// XRGB8888 buffer object usable for rendering and scanout
    pub fn create_bo(&self, width: u32, height: u32) -> Result<gbm::BufferObject<()>> {
        self.device
            .create_buffer_object::<()>(width, height, gbm::Format::Xrgb8888, scanout_usage())
            .map_err(|e| anyhow!("Failed to allocate a GBM buffer object: {:?}", e))
    }

    /// Import a single-plane dma-buf as a buffer object
    pub fn import_dma_buf<F: AsFd>(
        &self,
        fd: &F,
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<gbm::BufferObject<()>> {
        self.device
            .import_buffer_object_from_dma_buf::<()>(
                fd.as_fd(),
                width,
                height,
                stride,
                gbm::Format::Xrgb8888,
                scanout_usage(),
            )
            .map_err(|e| anyhow!("gbm_bo_import failed: {:?}", e))
    }
}

/// Export a buffer object as a dma-buf fd
pub fn export_bo(bo: &gbm::BufferObject<()>) -> Result<OwnedFd> {
    bo.fd()
        .map_err(|e| anyhow!("Failed to export buffer object: {:?}", e))
}

/// GEM handle of a buffer object on its own device
pub fn bo_handle(bo: &gbm::BufferObject<()>) -> Result<u32> {
    let handle = bo
        .handle()
        .map_err(|e| anyhow!("Failed to query buffer object handle: {:?}", e))?;
    Ok(unsafe { handle.s32 } as u32)
}

/// Row pitch of a buffer object in bytes
pub fn bo_stride(bo: &gbm::BufferObject<()>) -> Result<u32> {
    bo.stride()
        .map_err(|e| anyhow!("Failed to query buffer object stride: {:?}", e))
}

/// The buffer object as the card sees it: GEM handle, size, stride, XRGB8888.
///
/// gbm's own `drm::buffer::Buffer` impl targets a different drm release, so
/// framebuffers are added from these raw parts instead.
pub fn bo_layout(bo: &gbm::BufferObject<()>) -> Result<BufferLayout> {
    let width = bo.width().map_err(|e| anyhow!("{:?}", e))?;
    let height = bo.height().map_err(|e| anyhow!("{:?}", e))?;
    BufferLayout::from_parts(
        bo_handle(bo)?,
        (width, height),
        bo_stride(bo)?,
        drm::buffer::DrmFourcc::Xrgb8888,
    )
}

/// GBM surface
pub struct GbmSurface {
    surface: gbm::Surface<()>,
}

impl GbmSurface {
    /// Reference to internal surface
    pub fn surface(&self) -> &gbm::Surface<()> {
        &self.surface
    }

    /// Lock front buffer and get buffer object
    pub fn lock_front_buffer(&self) -> Result<gbm::BufferObject<()>> {
        unsafe {
            self.surface
                .lock_front_buffer()
                .map_err(|e| anyhow!("Failed to lock front buffer: {:?}", e))
        }
    }
}
