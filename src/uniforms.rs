//! Uniforms every effect program may declare, and where their values come from.
//!
//! Programs opt in simply by declaring a uniform; anything a program does not
//! declare is skipped. The table is the single place that maps a uniform name
//! to its per-pass value.

use crate::pointer::PointerState;

pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// A value uploaded to a program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

/// Built-in uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    ModelView,
    Projection,
    TextureMatrix,
    MousePos,
    PreviousMousePos,
    Time,
    Resolution,
    Scale,
}

impl Uniform {
    pub const ALL: [Uniform; 8] = [
        Uniform::ModelView,
        Uniform::Projection,
        Uniform::TextureMatrix,
        Uniform::MousePos,
        Uniform::PreviousMousePos,
        Uniform::Time,
        Uniform::Resolution,
        Uniform::Scale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Uniform::ModelView => "uMVMatrix",
            Uniform::Projection => "uPMatrix",
            Uniform::TextureMatrix => "uTextureMatrix",
            Uniform::MousePos => "uMousePos",
            Uniform::PreviousMousePos => "uPreviousMousePos",
            Uniform::Time => "uTime",
            Uniform::Resolution => "uResolution",
            Uniform::Scale => "uScale",
        }
    }
}

/// Texture inputs, each on a fixed texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampler {
    /// Output of the previous layer or pass.
    Input,
    /// Read side of the ping-pong pair.
    PingPong,
    /// Incoming texture a composite pass blends over.
    Background,
}

impl Sampler {
    pub const ALL: [Sampler; 3] = [Sampler::Input, Sampler::PingPong, Sampler::Background];

    pub fn name(self) -> &'static str {
        match self {
            Sampler::Input => "uTexture",
            Sampler::PingPong => "uPingPongTexture",
            Sampler::Background => "uBgTexture",
        }
    }

    pub fn unit(self) -> u32 {
        match self {
            Sampler::Input => 0,
            Sampler::PingPong => 1,
            Sampler::Background => 2,
        }
    }
}

pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const TEXCOORD_ATTRIBUTE: &str = "aTextureCoord";

/// Everything a uniform value may depend on during one pass.
#[derive(Debug, Clone, Copy)]
pub struct PassInputs {
    pub pointer: PointerState,
    /// Layer time, already scaled or frozen.
    pub time: f32,
    pub resolution: (u32, u32),
    pub scale: Option<f32>,
}

type Producer = fn(&PassInputs) -> Option<UniformValue>;

/// Uniform name to value producer. `None` means "leave unset".
pub const UNIFORM_TABLE: [(Uniform, Producer); 8] = [
    (Uniform::ModelView, |_| Some(UniformValue::Mat4(IDENTITY))),
    (Uniform::Projection, |_| Some(UniformValue::Mat4(IDENTITY))),
    (Uniform::TextureMatrix, |_| Some(UniformValue::Mat4(IDENTITY))),
    (Uniform::MousePos, |p| Some(UniformValue::Vec2(p.pointer.current))),
    (Uniform::PreviousMousePos, |p| {
        Some(UniformValue::Vec2(p.pointer.previous))
    }),
    (Uniform::Time, |p| Some(UniformValue::F32(p.time))),
    (Uniform::Resolution, |p| {
        Some(UniformValue::Vec2([p.resolution.0 as f32, p.resolution.1 as f32]))
    }),
    (Uniform::Scale, |p| p.scale.map(UniformValue::F32)),
];
