//! DRM display management
//!
//! Output selection, framebuffer lifetime and CRTC save/restore

use anyhow::{anyhow, Context, Result};
use drm::buffer::Buffer;
use drm::control::{connector, crtc, framebuffer, Device as ControlDevice, Mode};
use log::{debug, error, info, warn};

use super::device::Device;
use super::mode::{select_mode, ModeChoice};

/// Display configuration
pub struct DisplayConfig {
    pub connector_handle: connector::Handle,
    pub crtc_handle: crtc::Handle,
    pub mode: Mode,
    pub width: u32,
    pub height: u32,
}

impl DisplayConfig {
    /// Pick the first active connector, the encoder currently driving it and a mode
    pub fn select(device: &Device, choice: ModeChoice) -> Result<Self> {
        let connector_info = device.find_active_connector()?;
        let connector_handle = connector_info.handle();

        let mode = select_mode(connector_info.modes(), choice).ok_or_else(|| {
            anyhow!(
                "No preferred resolution on the selected connector {} ?",
                u32::from(connector_handle)
            )
        })?;

        let encoder = device.find_current_encoder(&connector_info)?;
        let crtc_handle = encoder
            .crtc()
            .ok_or_else(|| anyhow!("Encoder {:?} is not bound to a CRTC", encoder.handle()))?;
        info!("CRTC: {:?}", crtc_handle);

        let (width, height) = mode.size();
        info!(
            "Display mode: {}x{} @ {}Hz",
            width,
            height,
            mode.vrefresh()
        );

        Ok(Self {
            connector_handle,
            crtc_handle,
            mode,
            width: width as u32,
            height: height as u32,
        })
    }
}

/// DRM framebuffer, removed on drop
pub struct DrmFramebuffer<'a> {
    device: &'a Device,
    fb: framebuffer::Handle,
}

impl<'a> DrmFramebuffer<'a> {
    /// Add a legacy (depth 24, bpp 32) framebuffer for any DRM buffer
    pub fn add<B: Buffer + ?Sized>(device: &'a Device, buffer: &B) -> Result<Self> {
        let (width, height) = buffer.size();
        let fb = device
            .add_framebuffer(buffer, 24, 32)
            .context("failed to create fb")?;

        debug!(
            "Framebuffer created: id={}, {}x{}, stride={}",
            u32::from(fb),
            width,
            height,
            buffer.pitch()
        );

        Ok(Self { device, fb })
    }

    pub fn handle(&self) -> framebuffer::Handle {
        self.fb
    }
}

impl Drop for DrmFramebuffer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_framebuffer(self.fb) {
            warn!("Failed to remove framebuffer {:?}: {}", self.fb, e);
        }
    }
}

/// Scan out `fb` on the configured CRTC
pub fn set_crtc(device: &Device, config: &DisplayConfig, fb: &DrmFramebuffer) -> Result<()> {
    device
        .set_crtc(
            config.crtc_handle,
            Some(fb.handle()),
            (0, 0),
            &[config.connector_handle],
            Some(config.mode),
        )
        .context("failed to set mode")?;
    Ok(())
}

/// Original CRTC configuration, restored explicitly before teardown
pub struct SavedCrtc {
    info: crtc::Info,
    connector: connector::Handle,
}

impl SavedCrtc {
    pub fn save(device: &Device, config: &DisplayConfig) -> Result<Self> {
        let info = device.get_crtc(config.crtc_handle)?;
        Ok(Self {
            info,
            connector: config.connector_handle,
        })
    }

    /// Put back the framebuffer, position and mode that were active before
    pub fn restore(&self, device: &Device) -> Result<()> {
        device
            .set_crtc(
                self.info.handle(),
                self.info.framebuffer(),
                self.info.position(),
                &[self.connector],
                self.info.mode(),
            )
            .context("failed to restore crtc")?;
        debug!("CRTC {:?} restored", self.info.handle());
        Ok(())
    }
}

/// Combine the outcome of a scanout with the attempt to restore the CRTC.
///
/// A failed restore is logged and never masks the scanout's own result.
pub fn finish_scanout<T>(scanout: Result<T>, restored: Result<()>) -> Result<T> {
    if let Err(e) = restored {
        error!("{:#}", e);
    }
    scanout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanout_error_survives_restore() {
        let result: Result<()> = finish_scanout(
            Err(anyhow!("something bad happened")),
            Err(anyhow!("failed to restore crtc")),
        );
        assert_eq!(result.unwrap_err().to_string(), "something bad happened");
    }

    #[test]
    fn test_failed_restore_keeps_scanout_value() {
        let result = finish_scanout(Ok(42), Err(anyhow!("failed to restore crtc")));
        assert_eq!(result.unwrap(), 42);
        assert_eq!(finish_scanout(Ok("held"), Ok(())).unwrap(), "held");
    }
}
