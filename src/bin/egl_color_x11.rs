//! egl-color-x11 - colour scatter into an X11 window

use anyhow::Result;
use khronos_egl as egl;
use std::process::ExitCode;

use glprobe::cli::{self, Args, Startup};
use glprobe::gpu::ColorScatter;
use glprobe::x11::{egl_on_window, X11Window};

const USAGE: &str = "    --limit <N>             Triangles to draw (default: $LIMIT, then scatter.limit)
";

fn main() -> ExitCode {
    cli::init_logging();
    cli::exit_status(run(Args::from_env()))
}

fn run(args: Args) -> Result<()> {
    let cfg = match cli::startup("egl-color-x11", "X11 colour scatter probe", USAGE, &args)? {
        Startup::Exit => return Ok(()),
        Startup::Run(cfg) => cfg,
    };
    let limit = cli::scatter_limit(&args, &cfg)?;
    let size = cfg.x11.color_size;

    let window = X11Window::open(size, size)?;
    let (egl, surface) = egl_on_window(
        &window,
        egl::WINDOW_BIT | egl::SWAP_BEHAVIOR_PRESERVED_BIT,
    )?;
    let gl = egl.load_gl();

    let scatter = ColorScatter::init(
        &gl,
        &cfg.shaders.path("egl-color.vert"),
        &cfg.shaders.path("egl-color.frag"),
        size as u32,
        size as u32,
    )?;
    scatter.render(&gl, &egl, surface, limit)?;

    cli::hold(cfg.hold.x11());

    scatter.destroy(&gl);
    Ok(())
}
