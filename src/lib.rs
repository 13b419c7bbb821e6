//! glprobe - EGL / OpenGL ES diagnostic probes
//!
//! Shared plumbing for the probe binaries: DRM/KMS output selection and
//! PRIME sharing, GBM + EGL negotiation, shader and GL error handling,
//! X11 windows and image dumps.

pub mod cli;
pub mod config;
pub mod drm;
pub mod gpu;
pub mod image_out;
pub mod kms;
pub mod x11;
