//! Shader management
//!
//! GLSL ES 1.00 shader loading, compilation and linking

use glow::HasContext;
use log::{error, info};
use std::path::{Path, PathBuf};

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn gl_type(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("Cannot read shader {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error compiling shader {name}:\n{log}")]
    Compile {
        name: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("Error linking program:\n{log}")]
    Link { log: String },
    #[error("Failed to create {what}: {reason}")]
    Create { what: &'static str, reason: String },
}

/// Read a shader file and compile it
pub fn load_shader(
    gl: &glow::Context,
    stage: ShaderStage,
    path: &Path,
) -> Result<glow::Shader, ShaderError> {
    let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    compile_shader(gl, stage, &path.display().to_string(), &source)
}

/// Compile individual shader; `name` only labels diagnostics
pub fn compile_shader(
    gl: &glow::Context,
    stage: ShaderStage,
    name: &str,
    source: &str,
) -> Result<glow::Shader, ShaderError> {
    unsafe {
        let shader = gl
            .create_shader(stage.gl_type())
            .map_err(|reason| ShaderError::Create {
                what: "shader",
                reason,
            })?;

        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            if !log.trim().is_empty() {
                error!("Error compiling shader {}:\n{}", name, log);
            }
            return Err(ShaderError::Compile {
                name: name.to_string(),
                stage,
                log,
            });
        }

        Ok(shader)
    }
}

/// Linked program
pub struct Program {
    program: glow::Program,
}

impl Program {
    /// Link a vertex/fragment pair. The shader objects are released either way.
    pub fn link(
        gl: &glow::Context,
        vertex: glow::Shader,
        fragment: glow::Shader,
    ) -> Result<Self, ShaderError> {
        unsafe {
            let program = gl.create_program().map_err(|reason| ShaderError::Create {
                what: "program",
                reason,
            })?;

            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);

            // Shader objects no longer needed after linking
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);

            let this = Self { program };
            this.check_link(gl)?;
            Ok(this)
        }
    }

    /// Load both stages from disk and link
    pub fn from_files(
        gl: &glow::Context,
        vertex: &Path,
        fragment: &Path,
    ) -> Result<Self, ShaderError> {
        let vs = load_shader(gl, ShaderStage::Vertex, vertex)?;
        let fs = match load_shader(gl, ShaderStage::Fragment, fragment) {
            Ok(fs) => fs,
            Err(e) => {
                unsafe { gl.delete_shader(vs) };
                return Err(e);
            }
        };
        let program = Self::link(gl, vs, fs)?;
        info!(
            "Program linked ({} + {})",
            vertex.display(),
            fragment.display()
        );
        Ok(program)
    }

    /// Compile inline sources and link
    pub fn from_sources(
        gl: &glow::Context,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, ShaderError> {
        let vs = compile_shader(gl, ShaderStage::Vertex, "<inline vertex>", vertex_src)?;
        let fs = match compile_shader(gl, ShaderStage::Fragment, "<inline fragment>", fragment_src)
        {
            Ok(fs) => fs,
            Err(e) => {
                unsafe { gl.delete_shader(vs) };
                return Err(e);
            }
        };
        Self::link(gl, vs, fs)
    }

    fn check_link(&self, gl: &glow::Context) -> Result<(), ShaderError> {
        unsafe {
            if gl.get_program_link_status(self.program) {
                return Ok(());
            }
            let log = gl.get_program_info_log(self.program);
            gl.delete_program(self.program);
            if !log.trim().is_empty() {
                error!("Error linking program:\n{}", log);
            }
            Err(ShaderError::Link { log })
        }
    }

    /// Bind attribute locations and relink so they take effect
    pub fn bind_attrib_locations(
        &self,
        gl: &glow::Context,
        locations: &[(u32, &str)],
    ) -> Result<(), ShaderError> {
        unsafe {
            for &(index, name) in locations {
                gl.bind_attrib_location(self.program, index, name);
            }
            gl.link_program(self.program);
        }
        self.check_link(gl)
    }

    /// Location of an active attribute
    pub fn attrib(&self, gl: &glow::Context, name: &str) -> Option<u32> {
        unsafe { gl.get_attrib_location(self.program, name) }
    }

    pub fn bind(&self, gl: &glow::Context) {
        unsafe { gl.use_program(Some(self.program)) }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_message() {
        let err = ShaderError::Compile {
            name: "shaders/vert.glsl".to_string(),
            stage: ShaderStage::Vertex,
            log: "0:1(1): error: syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error compiling shader shaders/vert.glsl:\n0:1(1): error: syntax error"
        );
    }

    #[test]
    fn test_read_error_names_path() {
        let err = ShaderError::Read {
            path: PathBuf::from("missing/frag.glsl"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("Cannot read shader missing/frag.glsl"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ShaderStage::Vertex.name(), "vertex");
        assert_eq!(ShaderStage::Fragment.gl_type(), glow::FRAGMENT_SHADER);
    }
}
