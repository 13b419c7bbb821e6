//! gbm-bo-test - share one buffer between the display card and the render node
//!
//! The buffer is allocated on one side, passed over as a dma-buf, scanned out
//! by KMS and rendered to by GLES through an EGLImage-backed FBO.
//!
//! Default: dumb buffer on the card, imported into GBM on the render node.
//! `gpu_alloc`: GBM buffer object on the render node, imported into the card.

use anyhow::{anyhow, Result};
use drm::buffer::{Buffer, DrmFourcc};
use log::info;
use std::os::unix::io::AsRawFd;
use std::process::ExitCode;

use glprobe::cli::{self, Abort, Args, Startup};
use glprobe::config::Config;
use glprobe::drm::{
    finish_scanout, set_crtc, Device, DisplayConfig, DrmFramebuffer, ImportedBuffer,
    ModeChoice, ModeLine, SavedCrtc, SharedDumbBuffer,
};
use glprobe::gpu::gbm::{bo_stride, export_bo};
use glprobe::gpu::scene::{init_program, render_quad};
use glprobe::gpu::{
    ColorStorage, EglDisplay, GbmDevice, PixelStats, RenderTarget, XRGB_WINDOW_CONFIG,
};

const USAGE: &str = "    gpu_alloc               Allocate on the render node instead of the card
";

/// The display side's view of the shared buffer
enum ScanoutBuffer<'a> {
    /// Allocated on the card and exported
    Dumb(SharedDumbBuffer<'a>),
    /// Allocated by GBM and imported into the card
    Imported(ImportedBuffer<'a>),
}

impl ScanoutBuffer<'_> {
    fn as_buffer(&self) -> &dyn Buffer {
        match self {
            Self::Dumb(dumb) => dumb as &dyn Buffer,
            Self::Imported(imported) => imported,
        }
    }
}

fn main() -> ExitCode {
    cli::init_logging();
    cli::exit_status(run(Args::from_env()))
}

/// Allocate on the render node, hand it to the card
fn share_from_gpu<'a>(
    card: &'a Device,
    gbm: &GbmDevice,
    width: u32,
    height: u32,
) -> Result<(gbm::BufferObject<()>, ScanoutBuffer<'a>)> {
    let bo = gbm
        .create_bo(width, height)
        .map_err(|e| Abort::new(format!("Could not create bo : {:#}", e), -1))?;
    let fd = export_bo(&bo)?;
    println!("[gpu] Exported buffer FD : {}", fd.as_raw_fd());

    let stride = bo_stride(&bo)?;
    let imported =
        ImportedBuffer::import(card, &fd, (width, height), stride, DrmFourcc::Xrgb8888).map_err(
            |e| {
                Abort::new(
                    format!("Could not import buffer : {:#} - FD : {}", e, fd.as_raw_fd()),
                    -1,
                )
            },
        )?;
    println!("[display] Imported buffer FD : {}", fd.as_raw_fd());

    Ok((bo, ScanoutBuffer::Imported(imported)))
}

/// Allocate a dumb buffer on the card, hand it to the render node
fn share_from_display<'a>(
    card: &'a Device,
    gbm: &GbmDevice,
    width: u32,
    height: u32,
) -> Result<(gbm::BufferObject<()>, ScanoutBuffer<'a>)> {
    let dumb = SharedDumbBuffer::create(card, width, height)
        .map_err(|e| Abort::new(format!("{:#}", e), -1))?;
    println!(
        "Dumb Buffer Object Allocation request of {}x{}@32 succeeded!",
        width, height
    );

    let fd = dumb
        .export()
        .map_err(|e| Abort::new(format!("{:#}", e), -1))?;
    println!("[display] Exported buffer FD : {}", fd.as_raw_fd());

    let bo = gbm.import_dma_buf(&fd, width, height, dumb.pitch()).map_err(|e| {
        Abort::new(
            format!("Could not import buffer : {:#} - FD : {}", e, fd.as_raw_fd()),
            -1,
        )
    })?;
    println!("[gpu] Imported buffer FD : {}", fd.as_raw_fd());

    Ok((bo, ScanoutBuffer::Dumb(dumb)))
}

fn run(args: Args) -> Result<()> {
    let cfg = match cli::startup("gbm-bo-test", "PRIME buffer sharing probe", USAGE, &args)? {
        Startup::Exit => return Ok(()),
        Startup::Run(cfg) => cfg,
    };
    // Before libEGL is loaded
    cfg.driver_debug.apply();
    let gpu_alloc = args.positional("gpu_alloc");

    println!("opening {}", cfg.devices.card);
    let card = Device::open(&cfg.devices.card)?;
    let display = DisplayConfig::select(&card, ModeChoice::Preferred)?;
    println!("{}", ModeLine::from(&display.mode));
    let (width, height) = (display.width, display.height);

    println!("opening {}", cfg.devices.render_node);
    let render = Device::open_render(&cfg.devices.render_node)?;
    let gbm = GbmDevice::new(render.dup_file()?)?;

    let (bo, scanout) = if gpu_alloc {
        share_from_gpu(&card, &gbm, width, height)?
    } else {
        share_from_display(&card, &gbm, width, height)?
    };

    let fb = DrmFramebuffer::add(&card, scanout.as_buffer()).map_err(|e| {
        Abort::new(
            format!("Could not add a framebuffer using drmModeAddFB : {:#}", e),
            -1,
        )
    })?;
    let saved = SavedCrtc::save(&card, &display)?;
    set_crtc(&card, &display, &fb)?;

    let rendered = render_shared(&cfg, &gbm, &bo, width, height);
    finish_scanout(rendered, saved.restore(&card))
}

/// Render into the shared buffer through an EGLImage-backed FBO while it is
/// being scanned out
fn render_shared(
    cfg: &Config,
    gbm: &GbmDevice,
    bo: &gbm::BufferObject<()>,
    width: u32,
    height: u32,
) -> Result<()> {
    let mut egl = EglDisplay::gbm(gbm.device())?;
    egl.initialize()?;
    println!("ver = {}", egl.version_string()?);

    let total = egl.config_count()?;
    let configs = egl.choose_configs(&XRGB_WINDOW_CONFIG)?;
    let config = *configs
        .first()
        .ok_or_else(|| anyhow!("none of {} EGL configs matched", total))?;
    println!("num config {}", configs.len());

    egl.bind_gles()?;
    egl.create_context(config)?;
    egl.make_current(None)?;

    let gl = egl.load_gl();
    let image = egl.create_pixmap_image(bo)?;
    let target = RenderTarget::new(
        &gl,
        width,
        height,
        ColorStorage::EglImage {
            image: image.as_ptr(),
            target_storage: egl.image_target_renderbuffer_storage()?,
        },
    )?;
    if !target.is_complete(&gl) {
        return Err(Abort::new("something bad happened", -1).into());
    }

    let program = init_program(
        &gl,
        &cfg.shaders.path("vert.glsl"),
        &cfg.shaders.path("frag.glsl"),
        [0.0, 0.0, 0.0, 0.0],
        width,
        height,
    )?;
    let pixels = render_quad(&gl, &program, width, height)?;

    let stats = PixelStats::compute(&pixels, width, height);
    info!(
        "Readback: {}/{} pixels covered ({:.1}%), centre pixel {:?}",
        stats.covered,
        stats.total,
        stats.coverage_percent(),
        stats.center
    );

    cli::hold(cfg.hold.gbm());

    program.destroy(&gl);
    target.destroy(&gl);
    egl.destroy_image(image);
    Ok(())
}
