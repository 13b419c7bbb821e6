//! KMS render target
//!
//! Card node + GBM surface + EGL window surface, and the one-shot
//! scanout of the rendered frame with CRTC save/restore

use anyhow::{anyhow, Context, Result};
use drm::buffer::Buffer;
use khronos_egl as egl;
use log::{info, warn};

use crate::config::Config;
use crate::drm::{
    finish_scanout, set_crtc, Device, DisplayConfig, DrmFramebuffer, ModeChoice, SavedCrtc,
};
use crate::gpu::gbm::bo_layout;
use crate::gpu::{EglDisplay, GbmDevice, GbmSurface, XRGB_WINDOW_CONFIG};

/// Everything a KMS probe renders through.
///
/// Field order is teardown order: EGL objects, then GBM, then the card.
pub struct KmsTarget {
    egl: EglDisplay,
    surface: egl::Surface,
    gbm_surface: GbmSurface,
    _gbm: GbmDevice,
    display: DisplayConfig,
    device: Device,
}

/// Open the configured card node
pub fn open_card(cfg: &Config) -> Result<Device> {
    let path = &cfg.devices.card;
    Device::open(path).map_err(|e| {
        warn!("{:#}", e);
        anyhow!("couldn't open {}, skipping", path)
    })
}

impl KmsTarget {
    /// Bring up GBM + EGL on the card and make an ES2 context current on a
    /// window surface the size of the first mode of the first active connector
    pub fn new(cfg: &Config) -> Result<Self> {
        let device = open_card(cfg)?;
        let gbm = GbmDevice::new(device.dup_file()?)?;

        let mut egl = EglDisplay::gbm(gbm.device()).context("eglGetDisplay() failed")?;
        egl.initialize().context("eglInitialize() failed")?;
        println!("EGL_VERSION = {}", egl.version_string()?);

        let display = DisplayConfig::select(&device, ModeChoice::First)?;

        egl.bind_gles()?;
        let config = egl
            .choose_first_config(&XRGB_WINDOW_CONFIG)?
            .ok_or_else(|| anyhow!("failed to choose argb config"))?;
        egl.create_context(config)?;

        let gbm_surface = gbm.create_surface(display.width, display.height)?;
        let surface = egl.create_gbm_window_surface(config, gbm_surface.surface())?;
        egl.make_current(Some(surface))?;

        Ok(Self {
            egl,
            surface,
            gbm_surface,
            _gbm: gbm,
            display,
            device,
        })
    }

    pub fn egl(&self) -> &EglDisplay {
        &self.egl
    }

    pub fn surface(&self) -> egl::Surface {
        self.surface
    }

    pub fn width(&self) -> u32 {
        self.display.width
    }

    pub fn height(&self) -> u32 {
        self.display.height
    }

    /// Scan out the last swapped frame, run `hold`, then put the previous
    /// CRTC configuration back
    pub fn scanout<F>(&self, hold: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let bo = self.gbm_surface.lock_front_buffer()?;
        let layout = bo_layout(&bo)?;
        println!(
            "handle={}, stride={}",
            u32::from(layout.handle()),
            layout.pitch()
        );

        let fb = DrmFramebuffer::add(&self.device, &layout)?;
        let saved = SavedCrtc::save(&self.device, &self.display)?;
        set_crtc(&self.device, &self.display, &fb)?;
        info!("Mode set: {}x{}", self.display.width, self.display.height);

        let held = hold();
        let held = finish_scanout(held, saved.restore(&self.device));

        drop(fb);
        drop(bo);
        held
    }
}
