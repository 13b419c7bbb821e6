//! Probe scenes
//!
//! The fixed draw sequences the probes issue: a single triangle, the
//! jittered colour scatter, the off-screen TIFF triangle and the
//! shared-buffer quad.

use anyhow::{anyhow, Context, Result};
use glow::HasContext;
use khronos_egl as egl;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

use super::context::EglDisplay;
use super::error::{expect_no_error, HexCode};
use super::readback::read_rgba;
use super::shader::{Program, ShaderError};
use super::transform::{multiply, scale, z_rotation, Mat4};

/// Full-height triangle, three XYZ vertices
pub const TRIANGLE: [f32; 9] = [
    -1.0, -1.0, 0.0, //
    1.0, -1.0, 0.0, //
    0.0, 1.0, 0.0,
];

/// Quad corners, XYZ; only the first three vertices are drawn
pub const QUAD: [f32; 12] = [
    -1.0, -1.0, 0.0, //
    -1.0, 1.0, 0.0, //
    1.0, 1.0, 0.0, //
    1.0, -1.0, 0.0,
];

/// Seed for the colour scatter PRNG; runs are reproducible
pub const SCATTER_SEED: u64 = 0;

/// Array buffer that vertex data is streamed through
pub struct VertexBuffer {
    buffer: glow::Buffer,
}

impl VertexBuffer {
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let buffer = unsafe { gl.create_buffer() }
            .map_err(|e| anyhow!("Failed to create vertex buffer: {}", e))?;
        Ok(Self { buffer })
    }

    /// Upload `data` and point attribute `index` at it (`components` floats per vertex)
    pub fn attach(&self, gl: &glow::Context, index: u32, components: i32, data: &[f32]) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck_cast_slice(data),
                glow::STREAM_DRAW,
            );
            gl.vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, 0, 0);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.delete_buffer(self.buffer);
        }
    }
}

fn bytemuck_cast_slice<T>(slice: &[T]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            slice.as_ptr() as *const u8,
            slice.len() * std::mem::size_of::<T>(),
        )
    }
}

/// Load a shader pair from disk, set the clear colour and viewport, bind the program
pub fn init_program(
    gl: &glow::Context,
    vertex: &Path,
    fragment: &Path,
    clear_color: [f32; 4],
    width: u32,
    height: u32,
) -> Result<Program, ShaderError> {
    let program = Program::from_files(gl, vertex, fragment)?;
    unsafe {
        gl.clear_color(clear_color[0], clear_color[1], clear_color[2], clear_color[3]);
        gl.viewport(0, 0, width as i32, height as i32);
    }
    program.bind(gl);
    Ok(program)
}

fn position_attrib(gl: &glow::Context, program: &Program) -> Result<u32> {
    program
        .attrib(gl, "positionIn")
        .ok_or_else(|| anyhow!("attribute positionIn not found"))
}

/// Draw `vertices` (XYZ) as triangles, checking for GL errors at each stage
pub fn draw_triangle(gl: &glow::Context, program: &Program, vertices: &[f32]) -> Result<()> {
    let position = position_attrib(gl, program)?;
    let vbo = VertexBuffer::new(gl)?;

    let result = (|| -> Result<()> {
        unsafe { gl.enable_vertex_attrib_array(position) };
        vbo.attach(gl, position, 3, vertices);
        expect_no_error(gl, "vertex attribute setup")?;

        unsafe { gl.clear(glow::COLOR_BUFFER_BIT) };
        expect_no_error(gl, "glClear")?;

        unsafe { gl.draw_arrays(glow::TRIANGLES, 0, (vertices.len() / 3) as i32) };
        expect_no_error(gl, "glDrawArrays")?;
        Ok(())
    })();

    vbo.destroy(gl);
    result
}

/// One jittered triangle of the colour scatter: 4 XYZ vertices (3 drawn) and
/// 3 RGBA colours
#[derive(Debug, Clone, PartialEq)]
pub struct JitteredTriangle {
    pub vertices: [f32; 12],
    pub colors: [f32; 12],
}

/// `base + 0.01 * (r % modulus)`
fn jitter(rng: &mut impl Rng, base: f32, modulus: u32) -> f32 {
    base + 0.01 * rng.gen_range(0..modulus) as f32
}

/// Generate the next scatter triangle.
///
/// Vertices sit near (-1,-1) (-1,1) (1,1) (1,-1), each pushed up to 0.99
/// towards +x/+y. Colour `i` has channel `i` at 1 plus noise; red noise is
/// up to 0.99, green and blue noise up to 0.09; alpha is 1.
pub fn jitter_triangle(rng: &mut impl Rng) -> JitteredTriangle {
    let mut vertices = [0.0; 12];
    let corners = [(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)];
    for (i, (x, y)) in corners.iter().enumerate() {
        vertices[i * 3] = jitter(rng, *x, 100);
        vertices[i * 3 + 1] = jitter(rng, *y, 100);
        vertices[i * 3 + 2] = 0.0;
    }

    let mut colors = [0.0; 12];
    for vertex in 0..3 {
        for channel in 0..3 {
            let base = if channel == vertex { 1.0 } else { 0.0 };
            // red always gets the wide jitter
            let modulus = if channel == 0 { 100 } else { 10 };
            colors[vertex * 4 + channel] = jitter(rng, base, modulus);
        }
        colors[vertex * 4 + 3] = 1.0;
    }

    JitteredTriangle { vertices, colors }
}

/// Colour scatter renderer shared by the KMS and X11 colour probes
pub struct ColorScatter {
    program: Program,
    positions: VertexBuffer,
    colors: VertexBuffer,
}

impl ColorScatter {
    /// Load the colour shader pair (`positionIn` / `colorIn`), clear to transparent black
    pub fn init(
        gl: &glow::Context,
        vertex: &Path,
        fragment: &Path,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let program = init_program(gl, vertex, fragment, [0.0, 0.0, 0.0, 0.0], width, height)?;
        Ok(Self {
            program,
            positions: VertexBuffer::new(gl)?,
            colors: VertexBuffer::new(gl)?,
        })
    }

    /// Draw `limit` jittered triangles and present them
    pub fn render(
        &self,
        gl: &glow::Context,
        egl: &EglDisplay,
        surface: egl::Surface,
        limit: u32,
    ) -> Result<()> {
        let position = position_attrib(gl, &self.program)?;
        let color = self
            .program
            .attrib(gl, "colorIn")
            .ok_or_else(|| anyhow!("attribute colorIn not found"))?;

        unsafe {
            gl.enable_vertex_attrib_array(position);
            gl.enable_vertex_attrib_array(color);
        }
        expect_no_error(gl, "enabling vertex attributes")?;

        unsafe { gl.clear(glow::COLOR_BUFFER_BIT) };
        println!("{}", HexCode(unsafe { gl.get_error() }));
        expect_no_error(gl, "glClear")?;

        let mut rng = StdRng::seed_from_u64(SCATTER_SEED);
        debug!("Drawing {} scatter triangles", limit);
        for _ in 0..limit {
            let triangle = jitter_triangle(&mut rng);
            self.positions.attach(gl, position, 3, &triangle.vertices);
            self.colors.attach(gl, color, 4, &triangle.colors);
            unsafe { gl.draw_arrays(glow::TRIANGLES, 0, 3) };
        }
        expect_no_error(gl, "scatter draw")?;

        egl.swap_buffers(surface)
    }

    pub fn destroy(&self, gl: &glow::Context) {
        self.positions.destroy(gl);
        self.colors.destroy(gl);
        self.program.destroy(gl);
    }
}

/// Attribute slots the TIFF scene binds explicitly
pub const TIFF_ATTR_POS: u32 = 0;
pub const TIFF_ATTR_COLOR: u32 = 1;

const TIFF_VERTEX_SHADER: &str = "attribute vec4 pos;
attribute vec4 color;
varying vec4 v_color;
void main() {
   gl_Position = pos;
   v_color = color;
}
";

const TIFF_FRAGMENT_SHADER: &str = "precision mediump float;
varying vec4 v_color;
void main() {
   gl_FragColor = vec4(0.0, 1.0, 0.0, 0.0);
}
";

const TIFF_VERTICES: [f32; 6] = [-0.9, -0.7, 0.6, -0.8, 0.1, 0.6];
const TIFF_COLORS: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];

/// Message the off-screen probe prints for a shader failure
pub fn tiff_shader_failure(err: &ShaderError) -> String {
    match err {
        ShaderError::Compile { stage, .. } => {
            format!("Error: {} shader did not compile!", stage.name())
        }
        ShaderError::Link { log } => format!("Error: linking:\n{}", log),
        other => format!("Error: {}", other),
    }
}

/// Model-view matrix of the TIFF scene: z-rotation then uniform half scale
pub fn tiff_model_view(view_rotx: f32) -> Mat4 {
    multiply(&z_rotation(view_rotx), &scale(0.5, 0.5, 0.5))
}

/// Off-screen triangle rendered into the FBO and dumped to TIFF
pub struct TiffScene {
    program: Program,
    positions: VertexBuffer,
    colors: VertexBuffer,
    view_rotx: f32,
}

impl TiffScene {
    /// Check the GLES entry points, clear to opaque blue, build the inline program
    pub fn init(egl: &EglDisplay, gl: &glow::Context) -> Result<Self> {
        if egl.get_proc_address("glMapBufferOES").is_null() {
            return Err(anyhow!("eglGetProcAddress(\"glMapBufferOES\") returned NULL"));
        }

        unsafe { gl.clear_color(0.0, 0.0, 1.0, 1.0) };

        let program = Program::from_sources(gl, TIFF_VERTEX_SHADER, TIFF_FRAGMENT_SHADER)
            .map_err(|e| anyhow!(tiff_shader_failure(&e)))?;
        program.bind(gl);
        program
            .bind_attrib_locations(gl, &[(TIFF_ATTR_POS, "pos"), (TIFF_ATTR_COLOR, "color")])
            .map_err(|e| anyhow!(tiff_shader_failure(&e)))?;

        Ok(Self {
            program,
            positions: VertexBuffer::new(gl)?,
            colors: VertexBuffer::new(gl)?,
            view_rotx: 0.0,
        })
    }

    pub fn reshape(&self, gl: &glow::Context, width: u32, height: u32) {
        unsafe { gl.viewport(0, 0, width as i32, height as i32) };
    }

    pub fn draw(&self, gl: &glow::Context) {
        let mat = tiff_model_view(self.view_rotx);
        debug!("Model-view matrix: {:?}", mat);

        unsafe {
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
        self.positions.attach(gl, TIFF_ATTR_POS, 2, &TIFF_VERTICES);
        self.colors.attach(gl, TIFF_ATTR_COLOR, 3, &TIFF_COLORS);
        unsafe {
            gl.enable_vertex_attrib_array(TIFF_ATTR_POS);
            gl.enable_vertex_attrib_array(TIFF_ATTR_COLOR);

            gl.draw_arrays(glow::TRIANGLES, 0, 3);

            gl.disable_vertex_attrib_array(TIFF_ATTR_POS);
            gl.disable_vertex_attrib_array(TIFF_ATTR_COLOR);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        self.positions.destroy(gl);
        self.colors.destroy(gl);
        self.program.destroy(gl);
    }
}

/// Draw the first three quad vertices into the bound target and read it back
pub fn render_quad(
    gl: &glow::Context,
    program: &Program,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let position = position_attrib(gl, program)?;
    let vbo = VertexBuffer::new(gl)?;

    let result = (|| -> Result<Vec<u8>> {
        unsafe { gl.enable_vertex_attrib_array(position) };
        vbo.attach(gl, position, 3, &QUAD);
        expect_no_error(gl, "vertex attribute setup")?;

        unsafe { gl.clear(glow::COLOR_BUFFER_BIT) };
        println!("{}", HexCode(unsafe { gl.get_error() }));
        expect_no_error(gl, "glClear")?;

        unsafe { gl.draw_arrays(glow::TRIANGLES, 0, 3) };
        expect_no_error(gl, "glDrawArrays")?;

        let pixels = read_rgba(gl, width, height);
        expect_no_error(gl, "glReadPixels").context("readback failed")?;
        Ok(pixels)
    })();

    vbo.destroy(gl);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::shader::ShaderStage;

    #[test]
    fn test_jitter_is_reproducible() {
        let a = jitter_triangle(&mut StdRng::seed_from_u64(SCATTER_SEED));
        let b = jitter_triangle(&mut StdRng::seed_from_u64(SCATTER_SEED));
        assert_eq!(a, b);
    }

    #[test]
    fn test_jitter_ranges() {
        let mut rng = StdRng::seed_from_u64(SCATTER_SEED);
        for _ in 0..200 {
            let t = jitter_triangle(&mut rng);
            let corners = [(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)];
            for (i, (x, y)) in corners.iter().enumerate() {
                let vx = t.vertices[i * 3];
                let vy = t.vertices[i * 3 + 1];
                assert!(vx >= *x && vx <= x + 0.99 + 1e-5);
                assert!(vy >= *y && vy <= y + 0.99 + 1e-5);
                assert_eq!(t.vertices[i * 3 + 2], 0.0);
            }
            for vertex in 0..3 {
                let dominant = t.colors[vertex * 4 + vertex];
                assert!(dominant >= 1.0);
                assert_eq!(t.colors[vertex * 4 + 3], 1.0);
            }
            // green and blue noise stays below 0.1 off the dominant channel
            assert!(t.colors[2] < 0.1 && t.colors[1] < 0.1);
            assert!(t.colors[6] < 0.1);
            assert!(t.colors[9] < 0.1);
        }
    }

    #[test]
    fn test_tiff_shader_messages() {
        let compile = ShaderError::Compile {
            name: "<inline fragment>".to_string(),
            stage: ShaderStage::Fragment,
            log: String::new(),
        };
        assert_eq!(
            tiff_shader_failure(&compile),
            "Error: fragment shader did not compile!"
        );

        let link = ShaderError::Link {
            log: "varying mismatch".to_string(),
        };
        assert_eq!(tiff_shader_failure(&link), "Error: linking:\nvarying mismatch");
    }

    #[test]
    fn test_tiff_model_view_unrotated() {
        let m = tiff_model_view(0.0);
        assert_eq!(m, scale(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_triangle_vertex_count() {
        assert_eq!(TRIANGLE.len() / 3, 3);
        assert_eq!(QUAD.len() / 3, 4);
    }

    #[test]
    fn test_cast_slice_len() {
        assert_eq!(bytemuck_cast_slice(&TRIANGLE).len(), 36);
    }
}
