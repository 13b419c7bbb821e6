//! Framebuffer Object (FBO) render targets
//!
//! A colour renderbuffer (allocated storage or an EGLImage) plus a
//! 16-bit depth renderbuffer, with GL errors drained after every step

use glow::HasContext;
use log::info;
use std::ffi::c_void;

use super::context::ImageTargetRenderbufferStorageFn;
use super::error::{drain_errors, GlCheckFailed};

/// Where the colour renderbuffer gets its storage
pub enum ColorStorage {
    /// `glRenderbufferStorage` with this internal format (e.g. RGB565)
    Format(u32),
    /// `glEGLImageTargetRenderbufferStorageOES` on an existing image
    EglImage {
        image: *mut c_void,
        target_storage: ImageTargetRenderbufferStorageFn,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FboError {
    #[error("Failed to create {0}: {1}")]
    Create(&'static str, String),
    #[error(transparent)]
    Gl(#[from] GlCheckFailed),
}

/// Off-screen render target, left bound to `GL_FRAMEBUFFER` after creation
pub struct RenderTarget {
    framebuffer: glow::Framebuffer,
    color: glow::Renderbuffer,
    depth: glow::Renderbuffer,
}

impl RenderTarget {
    pub fn new(
        gl: &glow::Context,
        width: u32,
        height: u32,
        color_storage: ColorStorage,
    ) -> Result<Self, FboError> {
        unsafe {
            let framebuffer = gl
                .create_framebuffer()
                .map_err(|e| FboError::Create("framebuffer", e))?;
            drain_errors(gl, "glGenFramebuffers")?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            drain_errors(gl, "glBindFramebuffer")?;

            let color = gl
                .create_renderbuffer()
                .map_err(|e| FboError::Create("colour renderbuffer", e))?;
            drain_errors(gl, "glGenRenderbuffers (colour)")?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(color));
            drain_errors(gl, "glBindRenderbuffer (colour)")?;
            match color_storage {
                ColorStorage::Format(format) => {
                    gl.renderbuffer_storage(
                        glow::RENDERBUFFER,
                        format,
                        width as i32,
                        height as i32,
                    );
                }
                ColorStorage::EglImage {
                    image,
                    target_storage,
                } => {
                    target_storage(glow::RENDERBUFFER, image);
                }
            }
            drain_errors(gl, "colour renderbuffer storage")?;
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::RENDERBUFFER,
                Some(color),
            );
            drain_errors(gl, "attach colour renderbuffer")?;

            let depth = gl
                .create_renderbuffer()
                .map_err(|e| FboError::Create("depth renderbuffer", e))?;
            drain_errors(gl, "glGenRenderbuffers (depth)")?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth));
            drain_errors(gl, "glBindRenderbuffer (depth)")?;
            gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                glow::DEPTH_COMPONENT16,
                width as i32,
                height as i32,
            );
            drain_errors(gl, "depth renderbuffer storage")?;
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(depth),
            );
            drain_errors(gl, "attach depth renderbuffer")?;

            info!("FBO created: {}x{}", width, height);

            Ok(Self {
                framebuffer,
                color,
                depth,
            })
        }
    }

    /// `glCheckFramebufferStatus` of the bound framebuffer
    pub fn status(&self, gl: &glow::Context) -> u32 {
        unsafe { gl.check_framebuffer_status(glow::FRAMEBUFFER) }
    }

    pub fn is_complete(&self, gl: &glow::Context) -> bool {
        self.status(gl) == glow::FRAMEBUFFER_COMPLETE
    }

    /// Release GL objects (the context must still be current)
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_renderbuffer(self.depth);
            gl.delete_renderbuffer(self.color);
            gl.delete_framebuffer(self.framebuffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::error::GlError;

    #[test]
    fn test_gl_failure_passes_through() {
        let failed = GlCheckFailed {
            errors: vec![GlError::OutOfMemory],
            step: "depth renderbuffer storage".to_string(),
            file: "src/gpu/fbo.rs",
            line: 1,
        };
        let err = FboError::from(failed.clone());
        assert_eq!(err.to_string(), failed.to_string());
    }

    #[test]
    fn test_create_error_message() {
        let err = FboError::Create("framebuffer", "out of names".to_string());
        assert_eq!(err.to_string(), "Failed to create framebuffer: out of names");
    }
}
