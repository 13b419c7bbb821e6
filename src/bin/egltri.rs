//! egltri - draw one triangle into an X11 window
//!
//! `--png <PATH>` additionally reads the frame back and writes it as PNG.

use anyhow::Result;
use khronos_egl as egl;
use std::path::Path;
use std::process::ExitCode;

use glprobe::cli::{self, Args, Startup};
use glprobe::gpu::scene::{draw_triangle, init_program, TRIANGLE};
use glprobe::gpu::{flip_rows, read_rgba};
use glprobe::image_out::write_png;
use glprobe::x11::{egl_on_window, X11Window};

const USAGE: &str = "    --png <PATH>            Write the rendered frame to a PNG file
";

fn main() -> ExitCode {
    cli::init_logging();
    cli::exit_status(run(Args::from_env()))
}

fn run(args: Args) -> Result<()> {
    let cfg = match cli::startup("egltri", "X11 triangle probe", USAGE, &args)? {
        Startup::Exit => return Ok(()),
        Startup::Run(cfg) => cfg,
    };
    let (width, height) = (cfg.x11.tri_width, cfg.x11.tri_height);

    let window = X11Window::open(width, height)?;
    let (egl, surface) = egl_on_window(&window, egl::WINDOW_BIT)?;
    let gl = egl.load_gl();

    let program = init_program(
        &gl,
        &cfg.shaders.path("vert.glsl"),
        &cfg.shaders.path("frag.glsl"),
        [0.2, 0.2, 0.4, 0.0],
        width as u32,
        height as u32,
    )?;
    draw_triangle(&gl, &program, &TRIANGLE)?;

    // Read before the swap; the back buffer is undefined afterwards
    if let Some(path) = args.value("--png") {
        let pixels = read_rgba(&gl, width as u32, height as u32);
        let top_down = flip_rows(&pixels, width as u32, height as u32);
        write_png(
            Path::new(path),
            &top_down,
            width as u32,
            height as u32,
            Some("egltri"),
        )?;
    }

    egl.swap_buffers(surface)?;
    cli::hold(cfg.hold.x11());

    program.destroy(&gl);
    Ok(())
}
