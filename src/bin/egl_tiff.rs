//! egl-tiff - render a triangle into an off-screen FBO and dump it to TIFF

use anyhow::{Context, Result};
use glow::HasContext;
use khronos_egl as egl;
use log::warn;
use std::path::Path;
use std::process::ExitCode;

use glprobe::cli::{self, Abort, Args, Startup};
use glprobe::gpu::{
    drain_errors, flip_rows, read_rgba, ColorStorage, EglDisplay, HexCode, RenderTarget,
    TiffScene,
};
use glprobe::image_out::write_tiff;

const USAGE: &str = "    --output <PATH>         TIFF file to write (default: out.tif)
";

const CONFIG_ATTRIBS: [egl::Int; 5] = [
    egl::SURFACE_TYPE,
    egl::WINDOW_BIT,
    egl::COLOR_BUFFER_TYPE,
    egl::RGB_BUFFER,
    egl::NONE,
];

fn main() -> ExitCode {
    cli::init_logging();
    cli::exit_status(run(Args::from_env()))
}

fn print_info(egl: &EglDisplay, gl: &glow::Context) -> Result<()> {
    println!("EGL_VERSION = {}", egl.query(egl::VERSION)?);
    println!("EGL_VENDOR = {}", egl.query(egl::VENDOR)?);
    println!("EGL_EXTENSIONS = {}", egl.query(egl::EXTENSIONS)?);
    println!("EGL_CLIENT_APIS = {}", egl.query(egl::CLIENT_APIS)?);
    unsafe {
        println!("GL_RENDERER   = {}", gl.get_parameter_string(glow::RENDERER));
        println!("GL_VERSION    = {}", gl.get_parameter_string(glow::VERSION));
        println!("GL_VENDOR     = {}", gl.get_parameter_string(glow::VENDOR));
        println!("GL_EXTENSIONS = {}", gl.get_parameter_string(glow::EXTENSIONS));
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let cfg = match cli::startup("egl-tiff", "Off-screen FBO to TIFF probe", USAGE, &args)? {
        Startup::Exit => return Ok(()),
        Startup::Run(cfg) => cfg,
    };
    // Before libEGL is loaded
    cfg.driver_debug.apply();

    let size = cfg.output.tiff_size;
    let output = args
        .value("--output")
        .unwrap_or(&cfg.output.tiff_path)
        .to_string();

    let mut egl = EglDisplay::default_display()?;
    egl.initialize()?;

    println!("calling eglChooseConfig()");
    let config = egl.choose_first_config(&CONFIG_ATTRIBS)?;

    println!("calling eglGetConfigs()");
    println!("configs: {}", egl.config_count()?);
    println!("eglChooseConfig(): {} configs", config.iter().count());

    let config =
        config.ok_or_else(|| Abort::new("Error: eglChooseConfig(): config not found.", -1))?;

    egl.bind_gles()?;

    // No native window here: take a pbuffer when the config allows it,
    // otherwise render surfaceless (everything goes through the FBO anyway)
    let surface = match egl.create_pbuffer_surface(config, size as i32, size as i32) {
        Ok(surface) => Some(surface),
        Err(e) => {
            warn!("{:#}; continuing surfaceless", e);
            None
        }
    };
    egl.create_context(config)?;
    egl.make_current(surface)?;

    let gl = egl.load_gl();
    print_info(&egl, &gl)?;

    let target = RenderTarget::new(&gl, size, size, ColorStorage::Format(glow::RGB565))?;
    let status = target.status(&gl);
    if status != glow::FRAMEBUFFER_COMPLETE {
        println!(
            "Problem with OpenGL framebuffer after specifying color render buffer: \n{}",
            HexCode(status)
        );
    } else {
        println!("FBO creation succedded");
    }

    let scene = TiffScene::init(&egl, &gl).map_err(|e| Abort::new(e.to_string(), 1))?;
    drain_errors(&gl, "scene init")?;

    scene.reshape(&gl, size, size);
    drain_errors(&gl, "reshape")?;

    scene.draw(&gl);
    drain_errors(&gl, "draw")?;

    let pixels = read_rgba(&gl, size, size);
    drain_errors(&gl, "glReadPixels")?;

    write_tiff(Path::new(&output), &flip_rows(&pixels, size, size), size, size)
        .context("TIFF dump failed")?;

    scene.destroy(&gl);
    target.destroy(&gl);
    Ok(())
}
