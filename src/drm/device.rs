//! DRM device management
//!
//! Opens a DRM node (/dev/dri/card* or /dev/dri/renderD*) and
//! enumerates connectors and encoders

use anyhow::{anyhow, Context, Result};
use drm::control::{connector, crtc, encoder, Device as ControlDevice, ResourceHandles};
use drm::Device as BasicDevice;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

/// DRM device wrapper
pub struct Device {
    file: File,
    path: PathBuf,
    resources: Option<ResourceHandles>,
}

// Trait implementations required by drm crate
impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl BasicDevice for Device {}
impl ControlDevice for Device {}

impl Device {
    /// Open a DRM card node and read its mode-setting resources
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/dri/card0")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut device = Self::open_node(path)?;

        let resources = device
            .resource_handles()
            .context("Failed to get DRM resources")?;

        info!(
            "DRM resources: connectors={}, crtcs={}, encoders={}, framebuffers={}",
            resources.connectors().len(),
            resources.crtcs().len(),
            resources.encoders().len(),
            resources.framebuffers().len()
        );

        device.resources = Some(resources);
        Ok(device)
    }

    /// Open a node without mode-setting resources (render nodes have none)
    pub fn open_render<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_node(path)
    }

    fn open_node<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening DRM device: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .with_context(|| format!("couldn't open {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            resources: None,
        })
    }

    /// Resource handles (card nodes only)
    pub fn resources(&self) -> Result<&ResourceHandles> {
        self.resources
            .as_ref()
            .ok_or_else(|| anyhow!("{} has no mode-setting resources", self.path.display()))
    }

    /// Get connector info
    pub fn get_connector(&self, handle: connector::Handle) -> Result<connector::Info> {
        ControlDevice::get_connector(self, handle, false)
            .with_context(|| format!("Failed to get connector {:?} info", handle))
    }

    /// Get encoder info
    pub fn get_encoder(&self, handle: encoder::Handle) -> Result<encoder::Info> {
        ControlDevice::get_encoder(self, handle)
            .with_context(|| format!("Failed to get encoder {:?} info", handle))
    }

    /// Get CRTC info
    pub fn get_crtc(&self, handle: crtc::Handle) -> Result<crtc::Info> {
        ControlDevice::get_crtc(self, handle)
            .with_context(|| format!("Failed to get CRTC {:?} info", handle))
    }

    /// Get RawFd
    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Duplicate fd and return as File (for GBM device)
    pub fn dup_file(&self) -> Result<File> {
        self.file
            .try_clone()
            .with_context(|| format!("fd dup failed for {}", self.path.display()))
    }

    /// First connector that is connected and reports at least one mode.
    ///
    /// Connectors that fail to query are skipped.
    pub fn find_active_connector(&self) -> Result<connector::Info> {
        for &handle in self.resources()?.connectors() {
            let info = match self.get_connector(handle) {
                Ok(info) => info,
                Err(e) => {
                    debug!("Skipping connector {:?}: {:#}", handle, e);
                    continue;
                }
            };

            if info.state() == connector::State::Connected && !info.modes().is_empty() {
                info!(
                    "Connector: {:?} ({:?}), {} modes",
                    handle,
                    info.interface(),
                    info.modes().len()
                );
                return Ok(info);
            }
        }
        Err(anyhow!("No currently active connector found."))
    }

    /// Encoder currently driving the connector.
    ///
    /// Walks the encoder list in resource order and returns the one whose id
    /// matches the connector's current encoder.
    pub fn find_current_encoder(&self, connector: &connector::Info) -> Result<encoder::Info> {
        let current = connector
            .current_encoder()
            .ok_or_else(|| anyhow!("Connector {:?} has no current encoder", connector.handle()))?;

        for &handle in self.resources()?.encoders() {
            let info = match self.get_encoder(handle) {
                Ok(info) => info,
                Err(_) => continue,
            };
            if info.handle() == current {
                debug!("Encoder: {:?}, CRTC: {:?}", handle, info.crtc());
                return Ok(info);
            }
        }
        Err(anyhow!(
            "Encoder {:?} of connector {:?} not found",
            current,
            connector.handle()
        ))
    }
}
