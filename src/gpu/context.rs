//! EGL display management
//!
//! Dynamic libEGL loading, display acquisition (GBM platform or default
//! display), config negotiation, ES2 contexts and surfaces

use anyhow::{anyhow, Context, Result};
use gbm::AsRaw;
use khronos_egl as egl;
use log::{debug, info, warn};
use std::ffi::c_void;
use std::fs::File;

// EGL_PLATFORM_GBM_KHR (EGL extension)
const EGL_PLATFORM_GBM_KHR: egl::Enum = 0x31D7;

/// EGL_NATIVE_PIXMAP_KHR (EGL_KHR_image_pixmap)
pub const EGL_NATIVE_PIXMAP_KHR: egl::Enum = 0x30B0;

/// EGL instance type (dynamic loading)
type EglInstance = egl::Instance<egl::Dynamic<libloading::Library, egl::EGL1_5>>;

/// `glEGLImageTargetRenderbufferStorageOES`
pub type ImageTargetRenderbufferStorageFn =
    unsafe extern "system" fn(target: egl::Enum, image: *mut c_void);

/// `BUFFER_SIZE 32, DEPTH/STENCIL DONT_CARE, ES2, WINDOW`
pub const XRGB_WINDOW_CONFIG: [egl::Int; 11] = [
    egl::BUFFER_SIZE,
    32,
    egl::DEPTH_SIZE,
    egl::DONT_CARE,
    egl::STENCIL_SIZE,
    egl::DONT_CARE,
    egl::RENDERABLE_TYPE,
    egl::OPENGL_ES2_BIT,
    egl::SURFACE_TYPE,
    egl::WINDOW_BIT,
    egl::NONE,
];

/// Context attributes for OpenGL ES 2
const ES2_CONTEXT: [egl::Int; 3] = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];

/// Load libEGL at runtime
fn load_instance() -> Result<EglInstance> {
    let lib = unsafe {
        libloading::Library::new("libEGL.so.1")
            .or_else(|_| libloading::Library::new("libEGL.so"))
            .context("Failed to load EGL library")?
    };

    let instance = unsafe {
        egl::DynamicInstance::<egl::EGL1_5>::load_required_from(lib)
            .context("Failed to create EGL instance")?
    };
    Ok(instance)
}

/// An EGL display plus everything created on it.
///
/// Contexts and surfaces are owned here; drop releases the current
/// binding, destroys them and terminates the display.
pub struct EglDisplay {
    instance: EglInstance,
    display: egl::Display,
    context: Option<egl::Context>,
    surfaces: Vec<egl::Surface>,
    initialized: bool,
}

impl EglDisplay {
    /// Display for a GBM device (EGL_PLATFORM_GBM_KHR)
    pub fn gbm(gbm_device: &gbm::Device<File>) -> Result<Self> {
        let instance = load_instance()?;
        let display = unsafe {
            instance
                .get_platform_display(
                    EGL_PLATFORM_GBM_KHR,
                    gbm_device.as_raw() as *mut c_void,
                    &[egl::ATTRIB_NONE],
                )
                .context("Failed to get EGL display")?
        };
        Ok(Self::wrap(instance, display))
    }

    /// `eglGetDisplay(EGL_DEFAULT_DISPLAY)`; Mesa picks the platform (X11 when
    /// DISPLAY is set)
    pub fn default_display() -> Result<Self> {
        let instance = load_instance()?;
        let display = unsafe { instance.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| anyhow!("Failed to get EGL display"))?;
        Ok(Self::wrap(instance, display))
    }

    fn wrap(instance: EglInstance, display: egl::Display) -> Self {
        Self {
            instance,
            display,
            context: None,
            surfaces: Vec::new(),
            initialized: false,
        }
    }

    /// Initialize EGL, returning (major, minor)
    pub fn initialize(&mut self) -> Result<(i32, i32)> {
        let version = self
            .instance
            .initialize(self.display)
            .context("Failed to initialize EGL")?;
        self.initialized = true;
        debug!("EGL initialized: {}.{}", version.0, version.1);
        Ok(version)
    }

    /// `eglQueryString` as an owned string
    pub fn query(&self, name: egl::Int) -> Result<String> {
        let value = self
            .instance
            .query_string(Some(self.display), name)
            .with_context(|| format!("eglQueryString(0x{:x}) failed", name))?;
        Ok(value.to_string_lossy().into_owned())
    }

    pub fn version_string(&self) -> Result<String> {
        self.query(egl::VERSION)
    }

    /// Bind OpenGL ES API
    pub fn bind_gles(&self) -> Result<()> {
        self.instance
            .bind_api(egl::OPENGL_ES_API)
            .context("Failed to bind OpenGL ES API")
    }

    /// Total number of configs on the display
    pub fn config_count(&self) -> Result<usize> {
        self.instance
            .get_config_count(self.display)
            .context("eglGetConfigs failed")
    }

    /// First config matching `attribs` (NONE-terminated)
    pub fn choose_first_config(&self, attribs: &[egl::Int]) -> Result<Option<egl::Config>> {
        self.instance
            .choose_first_config(self.display, attribs)
            .context("eglChooseConfig failed")
    }

    /// Every config matching `attribs` (NONE-terminated)
    pub fn choose_configs(&self, attribs: &[egl::Int]) -> Result<Vec<egl::Config>> {
        let count = self
            .instance
            .matching_config_count(self.display, attribs)
            .context("eglChooseConfig failed")?;
        let mut configs = Vec::with_capacity(count);
        self.instance
            .choose_config(self.display, attribs, &mut configs)
            .context("eglChooseConfig failed")?;
        Ok(configs)
    }

    /// Create an OpenGL ES 2 context; it becomes the display's context
    pub fn create_context(&mut self, config: egl::Config) -> Result<egl::Context> {
        let context = self
            .instance
            .create_context(self.display, config, None, &ES2_CONTEXT)
            .context("failed to create context")?;
        if let Some(old) = self.context.replace(context) {
            let _ = self.instance.destroy_context(self.display, old);
        }
        info!("EGL context created (ES2)");
        Ok(context)
    }

    /// Window surface over a GBM surface (platform entry point, legacy fallback)
    pub fn create_gbm_window_surface(
        &mut self,
        config: egl::Config,
        gbm_surface: &gbm::Surface<()>,
    ) -> Result<egl::Surface> {
        let surface = unsafe {
            self.instance
                .create_platform_window_surface(
                    self.display,
                    config,
                    gbm_surface.as_raw() as *mut c_void,
                    &[egl::ATTRIB_NONE],
                )
                .or_else(|_| {
                    self.instance.create_window_surface(
                        self.display,
                        config,
                        gbm_surface.as_raw() as egl::NativeWindowType,
                        None,
                    )
                })
                .context("failed to create egl surface")?
        };
        self.surfaces.push(surface);
        Ok(surface)
    }

    /// Window surface over a native window id (X11 window XID)
    pub fn create_window_surface(
        &mut self,
        config: egl::Config,
        window: egl::NativeWindowType,
        attribs: Option<&[egl::Int]>,
    ) -> Result<egl::Surface> {
        let surface = unsafe {
            self.instance
                .create_window_surface(self.display, config, window, attribs)
                .context("eglCreateWindowSurface failed")?
        };
        self.surfaces.push(surface);
        Ok(surface)
    }

    /// Off-screen pbuffer surface
    pub fn create_pbuffer_surface(
        &mut self,
        config: egl::Config,
        width: i32,
        height: i32,
    ) -> Result<egl::Surface> {
        let attribs = [egl::WIDTH, width, egl::HEIGHT, height, egl::NONE];
        let surface = self
            .instance
            .create_pbuffer_surface(self.display, config, &attribs)
            .context("eglCreatePbufferSurface failed")?;
        self.surfaces.push(surface);
        Ok(surface)
    }

    /// Width and height of a surface
    pub fn query_surface_size(&self, surface: egl::Surface) -> Result<(i32, i32)> {
        let width = self
            .instance
            .query_surface(self.display, surface, egl::WIDTH)
            .context("eglQuerySurface(EGL_WIDTH) failed")?;
        let height = self
            .instance
            .query_surface(self.display, surface, egl::HEIGHT)
            .context("eglQuerySurface(EGL_HEIGHT) failed")?;
        Ok((width, height))
    }

    /// Make the display's context current; `None` binds it surfaceless
    pub fn make_current(&self, surface: Option<egl::Surface>) -> Result<()> {
        let context = self
            .context
            .ok_or_else(|| anyhow!("No EGL context to make current"))?;
        self.instance
            .make_current(self.display, surface, surface, Some(context))
            .context("failed to make context current")
    }

    /// Swap buffers
    pub fn swap_buffers(&self, surface: egl::Surface) -> Result<()> {
        self.instance
            .swap_buffers(self.display, surface)
            .context("Failed to swap buffers")
    }

    /// Look up an EGL or GL entry point (null if unknown)
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.instance
            .get_proc_address(name)
            .map(|f| f as *const c_void)
            .unwrap_or(std::ptr::null())
    }

    /// GL function loader bound to this display
    pub fn load_gl(&self) -> glow::Context {
        unsafe { glow::Context::from_loader_function(|name| self.get_proc_address(name)) }
    }

    /// `glEGLImageTargetRenderbufferStorageOES`, if the driver exports it
    pub fn image_target_renderbuffer_storage(&self) -> Result<ImageTargetRenderbufferStorageFn> {
        let ptr = self.get_proc_address("glEGLImageTargetRenderbufferStorageOES");
        if ptr.is_null() {
            return Err(anyhow!("glEGLImageTargetRenderbufferStorageOES not available"));
        }
        Ok(unsafe { std::mem::transmute::<*const c_void, ImageTargetRenderbufferStorageFn>(ptr) })
    }

    /// EGLImage wrapping a GBM buffer object (native pixmap target)
    pub fn create_pixmap_image(&self, bo: &gbm::BufferObject<()>) -> Result<egl::Image> {
        unsafe {
            let no_context = egl::Context::from_ptr(egl::NO_CONTEXT);
            let buffer = egl::ClientBuffer::from_ptr(bo.as_raw() as *mut c_void);
            self.instance
                .create_image(
                    self.display,
                    no_context,
                    EGL_NATIVE_PIXMAP_KHR,
                    buffer,
                    &[egl::ATTRIB_NONE],
                )
                .context("failed to make image from buffer object")
        }
    }

    pub fn destroy_image(&self, image: egl::Image) {
        if let Err(e) = self.instance.destroy_image(self.display, image) {
            warn!("eglDestroyImage failed: {}", e);
        }
    }
}

impl Drop for EglDisplay {
    fn drop(&mut self) {
        let _ = self.instance.make_current(self.display, None, None, None);
        for surface in self.surfaces.drain(..) {
            let _ = self.instance.destroy_surface(self.display, surface);
        }
        if let Some(context) = self.context.take() {
            let _ = self.instance.destroy_context(self.display, context);
        }
        if self.initialized {
            let _ = self.instance.terminate(self.display);
        }
        debug!("EGL display released");
    }
}

/// Print the EGL identification strings the X11 probes report
pub fn print_egl_strings(egl: &EglDisplay) -> Result<()> {
    println!("EGL Version: \"{}\"", egl.query(egl::VERSION)?);
    println!("EGL Vendor: \"{}\"", egl.query(egl::VENDOR)?);
    println!("EGL Extensions: \"{}\"", egl.query(egl::EXTENSIONS)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_config_is_terminated() {
        assert_eq!(XRGB_WINDOW_CONFIG.last(), Some(&egl::NONE));
        // attribute/value pairs before the terminator
        assert_eq!((XRGB_WINDOW_CONFIG.len() - 1) % 2, 0);
    }

    #[test]
    fn test_es2_context_attribs() {
        assert_eq!(ES2_CONTEXT, [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE]);
    }
}
