//! X11 window for the EGL window-surface probes

use anyhow::{anyhow, Context, Result};
use khronos_egl as egl;
use log::{info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, CreateWindowAux, EventMask, Window, WindowClass};
use x11rb::rust_connection::RustConnection;

use crate::gpu::{print_egl_strings, EglDisplay};

/// A mapped top-level window on the default screen, destroyed on drop
pub struct X11Window {
    conn: RustConnection,
    window: Window,
}

impl X11Window {
    /// Connect to `$DISPLAY`, then create and map a `width`x`height` window with
    /// the root window's depth and visual
    pub fn open(width: u16, height: u16) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to open X display")?;
        let screen = &conn.setup().roots[screen_num];

        let window = conn.generate_id().context("Failed to allocate window id")?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            0,
            0,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new().event_mask(EventMask::EXPOSURE),
        )
        .context("Failed to create window")?;
        conn.map_window(window).context("Failed to map window")?;
        conn.flush().context("Failed to flush X connection")?;

        // Round trip so the window exists before EGL (on its own connection) sees it
        conn.get_input_focus()
            .context("X request failed")?
            .reply()
            .context("X round trip failed")?;

        info!("X11 window 0x{:x}: {}x{}", window, width, height);
        Ok(Self { conn, window })
    }

    /// Window id in the form `eglCreateWindowSurface` takes
    pub fn native_window(&self) -> egl::NativeWindowType {
        self.window as usize as egl::NativeWindowType
    }
}

impl Drop for X11Window {
    fn drop(&mut self) {
        if let Err(e) = self.conn.destroy_window(self.window) {
            warn!("Failed to destroy window: {}", e);
        }
        let _ = self.conn.flush();
    }
}

/// Bring up EGL on the default display with a back-buffered window surface on
/// `window` and an ES2 context made current.
///
/// `surface_type` is the EGL_SURFACE_TYPE mask the config must support.
pub fn egl_on_window(
    window: &X11Window,
    surface_type: egl::Int,
) -> Result<(EglDisplay, egl::Surface)> {
    let mut egl = EglDisplay::default_display()?;
    let (major, minor) = egl.initialize()?;
    println!("EGL version {}.{}", major, minor);
    print_egl_strings(&egl)?;

    let config_attribs = [
        egl::SURFACE_TYPE,
        surface_type,
        egl::RED_SIZE,
        8,
        egl::GREEN_SIZE,
        8,
        egl::BLUE_SIZE,
        8,
        egl::DEPTH_SIZE,
        24,
        egl::NONE,
    ];
    let config = egl
        .choose_first_config(&config_attribs)?
        .ok_or_else(|| anyhow!("eglChooseConfig(): no matching config"))?;

    let surface_attribs = [egl::RENDER_BUFFER, egl::BACK_BUFFER, egl::NONE];
    let surface = egl.create_window_surface(
        config,
        window.native_window(),
        Some(&surface_attribs[..]),
    )?;

    let (width, height) = egl.query_surface_size(surface)?;
    println!("Surface size: {}x{}", width, height);

    egl.create_context(config)?;
    egl.make_current(Some(surface))?;
    Ok((egl, surface))
}
