//! A `Gpu` that records what the compositor asks of it.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use backdrop_wasm::error::{CompositorError, ShaderStage};
use backdrop_wasm::uniforms::UniformValue;
use backdrop_wasm::{EffectStack, Gpu};
use serde_json::{json, Value};

pub const VERT: &str = "in aVertexPosition; in aTextureCoord; uniform uMVMatrix; uniform uPMatrix;";
pub const BACKGROUND: &str = "uniform uTime; uniform uMousePos; uniform uPreviousMousePos; uniform uResolution;";
pub const FILTER: &str = "uniform uTexture; uniform uTime; uniform uResolution; uniform uScale;";
pub const SIMULATE: &str = "uniform uPingPongTexture; uniform uMousePos; uniform uPreviousMousePos;";
pub const COMPOSITE: &str = "uniform uTexture; uniform uBgTexture;";
pub const BROKEN: &str = "#error does not compile";

/// One offscreen or onscreen draw, with the state bound for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub program: u32,
    pub framebuffer: Option<u32>,
    pub viewport: (u32, u32),
    /// Texture bound on units 0 (input), 1 (ping-pong), 2 (background).
    pub textures: [Option<u32>; 3],
    pub uniforms: Vec<(String, UniformValue)>,
}

impl Draw {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Compile { program: u32, fragment: String },
    CompileFailed,
    CreateTarget { texture: u32, framebuffer: u32, width: u32, height: u32 },
    TargetFailed,
    BeginFrame,
    Viewport(u32, u32),
    Draw(Draw),
    DeleteProgram(u32),
    DeleteTexture(u32),
    DeleteFramebuffer(u32),
    DeleteBuffer(u32),
}

pub type Log = Rc<RefCell<Vec<Call>>>;

pub struct RecordingGpu {
    log: Log,
    next: u32,
    sources: HashMap<u32, String>,
    targets_made: usize,
    /// Target creations with these ordinals fail.
    pub failing_targets: Vec<usize>,
    program: Option<u32>,
    framebuffer: Option<u32>,
    viewport: (u32, u32),
    textures: [Option<u32>; 3],
    uniforms: Vec<(String, UniformValue)>,
}

impl RecordingGpu {
    pub fn new() -> (Self, Log) {
        let log: Log = Rc::default();
        let gpu = Self {
            log: log.clone(),
            next: 1,
            sources: HashMap::new(),
            targets_made: 0,
            failing_targets: Vec::new(),
            program: None,
            framebuffer: None,
            viewport: (0, 0),
            textures: [None; 3],
            uniforms: Vec::new(),
        };
        (gpu, log)
    }

    fn handle(&mut self) -> u32 {
        let h = self.next;
        self.next += 1;
        h
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn declares(&self, program: u32, name: &str) -> bool {
        self.sources
            .get(&program)
            .map(|s| {
                s.split(|c: char| !c.is_alphanumeric() && c != '_')
                    .any(|token| token == name)
            })
            .unwrap_or(false)
    }
}

impl Gpu for RecordingGpu {
    type Program = u32;
    type Texture = u32;
    type Framebuffer = u32;
    type Buffer = u32;
    type Location = (u32, String);

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<u32, CompositorError> {
        if fragment.contains("#error") || vertex.contains("#error") {
            self.record(Call::CompileFailed);
            return Err(CompositorError::ShaderCompile {
                stage: ShaderStage::Fragment,
                log: "#error".to_string(),
            });
        }
        let program = self.handle();
        self.sources.insert(program, format!("{vertex}\n{fragment}"));
        self.record(Call::Compile {
            program,
            fragment: fragment.to_string(),
        });
        Ok(program)
    }

    fn uniform_location(&mut self, program: &u32, name: &str) -> Option<(u32, String)> {
        self.declares(*program, name)
            .then(|| (*program, name.to_string()))
    }

    fn attrib_location(&mut self, program: &u32, name: &str) -> Option<u32> {
        match name {
            "aVertexPosition" if self.declares(*program, name) => Some(0),
            "aTextureCoord" if self.declares(*program, name) => Some(1),
            _ => None,
        }
    }

    fn create_quad(&mut self, vertices: &[f32]) -> Result<u32, CompositorError> {
        assert_eq!(vertices.len(), 24);
        Ok(self.handle())
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<(u32, u32), CompositorError> {
        let ordinal = self.targets_made;
        self.targets_made += 1;
        if self.failing_targets.contains(&ordinal) {
            self.record(Call::TargetFailed);
            return Err(CompositorError::FramebufferIncomplete { status: 0x8cd6 });
        }
        let texture = self.handle();
        let framebuffer = self.handle();
        self.record(Call::CreateTarget {
            texture,
            framebuffer,
            width,
            height,
        });
        Ok((texture, framebuffer))
    }

    fn begin_frame(&mut self) {
        self.framebuffer = None;
        self.record(Call::BeginFrame);
    }

    fn use_program(&mut self, program: &u32) {
        self.program = Some(*program);
        self.textures = [None; 3];
        self.uniforms.clear();
    }

    fn bind_quad(&mut self, _quad: &u32, _position: Option<u32>, _texcoord: Option<u32>) {}

    fn set_uniform(&mut self, location: &(u32, String), value: UniformValue) {
        assert_eq!(Some(location.0), self.program, "uniform set on unbound program");
        self.uniforms.push((location.1.clone(), value));
    }

    fn bind_texture(&mut self, unit: u32, texture: &u32, location: &(u32, String)) {
        assert_eq!(Some(location.0), self.program);
        self.textures[unit as usize] = Some(*texture);
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&u32>) {
        self.framebuffer = framebuffer.copied();
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.record(Call::Viewport(width, height));
    }

    fn draw_quad(&mut self) {
        let draw = Draw {
            program: self.program.expect("draw without a program"),
            framebuffer: self.framebuffer,
            viewport: self.viewport,
            textures: self.textures,
            uniforms: self.uniforms.clone(),
        };
        self.record(Call::Draw(draw));
    }

    fn delete_program(&mut self, program: u32) {
        self.record(Call::DeleteProgram(program));
    }

    fn delete_texture(&mut self, texture: u32) {
        self.record(Call::DeleteTexture(texture));
    }

    fn delete_framebuffer(&mut self, framebuffer: u32) {
        self.record(Call::DeleteFramebuffer(framebuffer));
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.record(Call::DeleteBuffer(buffer));
    }
}

/// Draws recorded so far.
pub fn draws(log: &Log) -> Vec<Draw> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Draw(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

/// Draws recorded after the last `BeginFrame`.
pub fn last_frame(log: &Log) -> Vec<Draw> {
    let calls = log.borrow();
    let start = calls
        .iter()
        .rposition(|c| *c == Call::BeginFrame)
        .map(|i| i + 1)
        .unwrap_or(0);
    calls[start..]
        .iter()
        .filter_map(|c| match c {
            Call::Draw(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

/// `(texture, framebuffer, width, height)` of every target created, in order.
pub fn targets(log: &Log) -> Vec<(u32, u32, u32, u32)> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::CreateTarget {
                texture,
                framebuffer,
                width,
                height,
            } => Some((*texture, *framebuffer, *width, *height)),
            _ => None,
        })
        .collect()
}

/// Program handle compiled for a fragment source, first match.
pub fn program_for(log: &Log, fragment: &str) -> u32 {
    log.borrow()
        .iter()
        .find_map(|c| match c {
            Call::Compile { program, fragment: f } if f == fragment => Some(*program),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no program compiled for {fragment:?}"))
}

pub fn count(log: &Log, pred: impl Fn(&Call) -> bool) -> usize {
    log.borrow().iter().filter(|c| pred(c)).count()
}

pub fn layer(id: &str, fragments: &[&str]) -> Value {
    json!({
        "id": id,
        "type": id,
        "visible": true,
        "usesPingPong": false,
        "animating": true,
        "compiledVertexShaders": [VERT],
        "compiledFragmentShaders": fragments,
    })
}

pub fn background(id: &str) -> Value {
    let mut l = layer(id, &[BACKGROUND]);
    l["data"] = json!({ "isBackground": true });
    l
}

pub fn stack(layers: Vec<Value>) -> EffectStack {
    EffectStack::from_json(&json!({ "history": layers }).to_string()).expect("valid document")
}
