//! GL error checking
//!
//! Two flavours, matching how the probes use `glGetError`:
//! `expect_no_error` looks at the single pending error after a step,
//! `drain_errors` empties the error queue and names everything it finds.

use glow::HasContext;
use log::error;
use std::fmt;
use std::panic::Location;

/// Upper bound on errors pulled from the queue in one drain (a lost context
/// can keep reporting forever)
const MAX_DRAINED_ERRORS: usize = 32;

/// A `glGetError` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GlError {
    #[error("GL_INVALID_ENUM")]
    InvalidEnum,
    #[error("GL_INVALID_VALUE")]
    InvalidValue,
    #[error("GL_INVALID_OPERATION")]
    InvalidOperation,
    #[error("GL_OUT_OF_MEMORY")]
    OutOfMemory,
    #[error("GL_INVALID_FRAMEBUFFER_OPERATION")]
    InvalidFramebufferOperation,
    #[error("GL error 0x{0:x}")]
    Other(u32),
}

impl GlError {
    /// Map a raw code; `GL_NO_ERROR` maps to `None`
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            glow::NO_ERROR => None,
            glow::INVALID_ENUM => Some(Self::InvalidEnum),
            glow::INVALID_VALUE => Some(Self::InvalidValue),
            glow::INVALID_OPERATION => Some(Self::InvalidOperation),
            glow::OUT_OF_MEMORY => Some(Self::OutOfMemory),
            glow::INVALID_FRAMEBUFFER_OPERATION => Some(Self::InvalidFramebufferOperation),
            other => Some(Self::Other(other)),
        }
    }
}

/// Error raised by a failed check, with the call site that performed it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} after {} ({}:{})", names(.errors), .step, .file, .line)]
pub struct GlCheckFailed {
    pub errors: Vec<GlError>,
    pub step: String,
    pub file: &'static str,
    pub line: u32,
}

fn names(errors: &[GlError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl GlCheckFailed {
    fn at(errors: Vec<GlError>, step: &str, location: &'static Location<'static>) -> Self {
        Self {
            errors,
            step: step.to_string(),
            file: location.file(),
            line: location.line(),
        }
    }
}

/// Fail if the single pending error is not `GL_NO_ERROR`
#[track_caller]
pub fn expect_no_error(gl: &glow::Context, step: &str) -> Result<(), GlCheckFailed> {
    let location = Location::caller();
    let code = unsafe { gl.get_error() };
    match GlError::from_code(code) {
        None => Ok(()),
        Some(err) => Err(GlCheckFailed::at(vec![err], step, location)),
    }
}

/// Pull every pending error, logging each with the caller's location
#[track_caller]
pub fn drain_errors(gl: &glow::Context, step: &str) -> Result<(), GlCheckFailed> {
    let location = Location::caller();
    let errors = collect_errors(|| unsafe { gl.get_error() });
    for err in &errors {
        error!("{} - {}:{}", err, location.file(), location.line());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GlCheckFailed::at(errors, step, location))
    }
}

/// Query codes until `GL_NO_ERROR` (or the drain limit)
fn collect_errors(mut next: impl FnMut() -> u32) -> Vec<GlError> {
    let mut errors = Vec::new();
    while errors.len() < MAX_DRAINED_ERRORS {
        match GlError::from_code(next()) {
            Some(err) => errors.push(err),
            None => break,
        }
    }
    errors
}

/// Raw code formatted the way the probes print it (`%x`)
pub struct HexCode(pub u32);

impl fmt::Display for HexCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(GlError::from_code(glow::NO_ERROR), None);
        assert_eq!(
            GlError::from_code(glow::INVALID_OPERATION),
            Some(GlError::InvalidOperation)
        );
        assert_eq!(GlError::from_code(0x9999), Some(GlError::Other(0x9999)));
    }

    #[test]
    fn test_names() {
        assert_eq!(
            GlError::InvalidFramebufferOperation.to_string(),
            "GL_INVALID_FRAMEBUFFER_OPERATION"
        );
        assert_eq!(GlError::Other(0x506).to_string(), "GL error 0x506");
    }

    #[test]
    fn test_collect_stops_at_no_error() {
        let mut codes = vec![glow::NO_ERROR, glow::OUT_OF_MEMORY, glow::INVALID_ENUM].into_iter();
        // Popped from the back: INVALID_ENUM, OUT_OF_MEMORY, then NO_ERROR
        let mut next = move || codes.next_back().unwrap_or(glow::NO_ERROR);
        assert_eq!(
            collect_errors(&mut next),
            vec![GlError::InvalidEnum, GlError::OutOfMemory]
        );
    }

    #[test]
    fn test_collect_is_bounded() {
        let errors = collect_errors(|| glow::INVALID_VALUE);
        assert_eq!(errors.len(), MAX_DRAINED_ERRORS);
    }

    #[test]
    fn test_check_failed_message() {
        let failed = GlCheckFailed {
            errors: vec![GlError::InvalidEnum, GlError::InvalidValue],
            step: "renderbuffer storage".to_string(),
            file: "src/gpu/fbo.rs",
            line: 42,
        };
        assert_eq!(
            failed.to_string(),
            "GL_INVALID_ENUM, GL_INVALID_VALUE after renderbuffer storage (src/gpu/fbo.rs:42)"
        );
    }

    #[test]
    fn test_hex_code() {
        assert_eq!(HexCode(0x500).to_string(), "500");
        assert_eq!(HexCode(0).to_string(), "0");
    }
}
