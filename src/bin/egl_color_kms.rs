//! egl-color-kms - colour scatter through GBM + EGL, scanned out with KMS

use anyhow::Result;
use std::process::ExitCode;

use glprobe::cli::{self, Args, Startup};
use glprobe::gpu::ColorScatter;
use glprobe::kms::KmsTarget;

const USAGE: &str = "    --limit <N>             Triangles to draw (default: $LIMIT, then scatter.limit)
";

fn main() -> ExitCode {
    cli::init_logging();
    cli::exit_status(run(Args::from_env()))
}

fn run(args: Args) -> Result<()> {
    let cfg = match cli::startup("egl-color-kms", "KMS colour scatter probe", USAGE, &args)? {
        Startup::Exit => return Ok(()),
        Startup::Run(cfg) => cfg,
    };
    let limit = cli::scatter_limit(&args, &cfg)?;

    let target = KmsTarget::new(&cfg)?;
    let gl = target.egl().load_gl();

    let scatter = ColorScatter::init(
        &gl,
        &cfg.shaders.path("egl-color.vert"),
        &cfg.shaders.path("egl-color.frag"),
        target.width(),
        target.height(),
    )?;
    scatter.render(&gl, target.egl(), target.surface(), limit)?;

    target.scanout(|| {
        cli::hold(cfg.hold.kms());
        Ok(())
    })?;

    scatter.destroy(&gl);
    Ok(())
}
