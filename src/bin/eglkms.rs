//! eglkms - draw one triangle through GBM + EGL and scan it out with KMS
//!
//! The mode stays up until Enter is pressed, then the previous CRTC
//! configuration is restored.

use anyhow::Result;
use log::info;
use std::process::ExitCode;

use glprobe::cli::{self, Args, Startup};
use glprobe::gpu::scene::{draw_triangle, init_program, TRIANGLE};
use glprobe::kms::KmsTarget;

const USAGE: &str = "";

fn main() -> ExitCode {
    cli::init_logging();
    cli::exit_status(run(Args::from_env()))
}

fn run(args: Args) -> Result<()> {
    let cfg = match cli::startup("eglkms", "KMS triangle probe", USAGE, &args)? {
        Startup::Exit => return Ok(()),
        Startup::Run(cfg) => cfg,
    };
    // Before libEGL is loaded
    cfg.driver_debug.apply();

    let target = KmsTarget::new(&cfg)?;
    let gl = target.egl().load_gl();

    let program = init_program(
        &gl,
        &cfg.shaders.path("vert.glsl"),
        &cfg.shaders.path("frag.glsl"),
        [0.0, 1.0, 0.0, 0.0],
        target.width(),
        target.height(),
    )?;
    draw_triangle(&gl, &program, &TRIANGLE)?;
    target.egl().swap_buffers(target.surface())?;

    target.scanout(|| {
        info!("Press Enter to restore the previous mode");
        cli::wait_for_enter()
    })?;

    program.destroy(&gl);
    Ok(())
}
