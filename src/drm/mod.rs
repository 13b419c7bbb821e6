//! DRM/KMS display management

pub mod device;
pub mod display;
pub mod mode;
pub mod prime;

pub use device::Device;
pub use display::{finish_scanout, set_crtc, DisplayConfig, DrmFramebuffer, SavedCrtc};
pub use mode::{ModeChoice, ModeLine};
pub use prime::{BufferLayout, ImportedBuffer, SharedDumbBuffer};
