//! The graphics calls the compositor needs, as a trait.
//!
//! The browser implements it over WebGL2; tests implement it with a recorder.
//! Every method maps to a handful of GL calls and none of them block.

use std::fmt::Debug;

use crate::error::CompositorError;
use crate::uniforms::{
    Sampler, Uniform, UniformValue, POSITION_ATTRIBUTE, TEXCOORD_ATTRIBUTE,
};

/// Interleaved position/texcoord for two triangles covering clip space.
pub const QUAD_VERTICES: [f32; 24] = [
    -1.0, -1.0, 0.0, 0.0, //
    1.0, -1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 1.0, //
    -1.0, 1.0, 0.0, 1.0, //
    1.0, -1.0, 1.0, 0.0, //
    1.0, 1.0, 1.0, 1.0,
];

pub trait Gpu {
    type Program: Clone + PartialEq + Debug;
    type Texture: Clone + PartialEq + Debug;
    type Framebuffer: Clone + PartialEq + Debug;
    type Buffer: Debug;
    type Location: Clone + Debug;

    /// Compile both stages and link them.
    fn compile_program(&mut self, vertex: &str, fragment: &str)
        -> Result<Self::Program, CompositorError>;
    fn uniform_location(&mut self, program: &Self::Program, name: &str) -> Option<Self::Location>;
    fn attrib_location(&mut self, program: &Self::Program, name: &str) -> Option<u32>;

    /// Upload a static vertex buffer.
    fn create_quad(&mut self, vertices: &[f32]) -> Result<Self::Buffer, CompositorError>;
    /// An RGBA8 texture (linear filtering, clamped) attached to a framebuffer.
    fn create_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<(Self::Texture, Self::Framebuffer), CompositorError>;

    /// Clear to transparent and enable source-alpha blending.
    fn begin_frame(&mut self);
    fn use_program(&mut self, program: &Self::Program);
    /// Bind the quad and point the given attributes at it (stride 16, uv at 8).
    fn bind_quad(&mut self, quad: &Self::Buffer, position: Option<u32>, texcoord: Option<u32>);
    fn set_uniform(&mut self, location: &Self::Location, value: UniformValue);
    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture, location: &Self::Location);
    /// `None` binds the visible surface.
    fn bind_framebuffer(&mut self, framebuffer: Option<&Self::Framebuffer>);
    fn viewport(&mut self, width: u32, height: u32);
    /// Six vertices, two triangles.
    fn draw_quad(&mut self);

    fn delete_program(&mut self, program: Self::Program);
    fn delete_texture(&mut self, texture: Self::Texture);
    fn delete_framebuffer(&mut self, framebuffer: Self::Framebuffer);
    fn delete_buffer(&mut self, buffer: Self::Buffer);
}

/// A linked program with every known location resolved up front.
pub struct CompiledProgram<G: Gpu> {
    pub program: G::Program,
    uniforms: Vec<(Uniform, G::Location)>,
    samplers: Vec<(Sampler, G::Location)>,
    custom: Vec<(String, G::Location)>,
    position: Option<u32>,
    texcoord: Option<u32>,
}

impl<G: Gpu> CompiledProgram<G> {
    /// Compile and resolve locations, including the given extra uniform names.
    pub fn build<'a>(
        gpu: &mut G,
        vertex: &str,
        fragment: &str,
        extra: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, CompositorError> {
        let program = gpu.compile_program(vertex, fragment)?;
        let uniforms = Uniform::ALL
            .iter()
            .filter_map(|u| Some((*u, gpu.uniform_location(&program, u.name())?)))
            .collect();
        let samplers = Sampler::ALL
            .iter()
            .filter_map(|s| Some((*s, gpu.uniform_location(&program, s.name())?)))
            .collect();
        let custom = extra
            .into_iter()
            .filter_map(|name| Some((name.to_string(), gpu.uniform_location(&program, name)?)))
            .collect();
        let position = gpu.attrib_location(&program, POSITION_ATTRIBUTE);
        let texcoord = gpu.attrib_location(&program, TEXCOORD_ATTRIBUTE);
        Ok(Self {
            program,
            uniforms,
            samplers,
            custom,
            position,
            texcoord,
        })
    }

    pub fn uniform(&self, uniform: Uniform) -> Option<&G::Location> {
        self.uniforms
            .iter()
            .find(|(u, _)| *u == uniform)
            .map(|(_, loc)| loc)
    }

    pub fn custom_uniforms(&self) -> &[(String, G::Location)] {
        &self.custom
    }

    pub fn sampler(&self, sampler: Sampler) -> Option<&G::Location> {
        self.samplers
            .iter()
            .find(|(s, _)| *s == sampler)
            .map(|(_, loc)| loc)
    }

    pub fn attributes(&self) -> (Option<u32>, Option<u32>) {
        (self.position, self.texcoord)
    }
}
