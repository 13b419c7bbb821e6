//! GPU setup and rendering with OpenGL ES 2
//!
//! Handles:
//! - GBM device/surface/buffer object creation
//! - EGL display, config and context negotiation (GBM platform or default display)
//! - Shader loading and GL error checking
//! - Off-screen render targets, probe scenes and readback

pub mod context;
pub mod error;
pub mod fbo;
pub mod gbm;
pub mod readback;
pub mod scene;
pub mod shader;
pub mod transform;

pub use context::{print_egl_strings, EglDisplay, XRGB_WINDOW_CONFIG};
pub use error::{drain_errors, expect_no_error, GlCheckFailed, GlError, HexCode};
pub use fbo::{ColorStorage, RenderTarget};
pub use self::gbm::{GbmDevice, GbmSurface};
pub use readback::{flip_rows, read_rgba, PixelStats};
pub use scene::{ColorScatter, TiffScene};
pub use shader::{Program, ShaderError, ShaderStage};
