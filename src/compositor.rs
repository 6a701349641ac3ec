//! Multi-pass effect compositor.
//!
//! Turns an [`EffectStack`] into one composited frame per call to
//! [`Compositor::render_frame`]. Layers run in document order; each visible
//! layer after the background consumes the previous layer's output texture
//! and writes a new one into the next free slot of the render pool. The last
//! texture is drawn to the visible surface with the program of the last
//! layer that samples an input.
//!
//! Nothing here returns an error to the host. Failures disable the layer
//! involved and rendering carries on with the rest.

use std::collections::BTreeMap;

use crate::config::{EffectLayer, EffectStack, LayerRole, PingPongPlan};
use crate::gpu::{CompiledProgram, Gpu, QUAD_VERTICES};
use crate::pointer::PointerState;
use crate::pool::{PingPong, TargetPool};
use crate::uniforms::{PassInputs, Sampler, UNIFORM_TABLE};

/// Clock advance per rendered frame, independent of wall time.
pub const TIME_STEP: f32 = 0.016;

/// What a call to [`Compositor::render_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The surface has no area yet; nothing was drawn.
    Skipped,
    /// There was nothing to draw.
    Empty,
    /// `passes` offscreen draws, then the result was drawn to the surface.
    Composited { passes: usize },
    /// No texture was produced; the background was drawn straight to the surface.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dest {
    Screen,
    Pool(usize),
    PingPongWrite,
}

/// Running state of one frame's layer walk.
struct Walk<T> {
    current: Option<T>,
    next: usize,
    passes: usize,
}

pub struct Compositor<G: Gpu> {
    gpu: G,
    stack: EffectStack,
    quad: Option<G::Buffer>,
    /// Keyed by (layer index, pass index).
    programs: BTreeMap<(usize, usize), CompiledProgram<G>>,
    disabled: Vec<bool>,
    pool: TargetPool<G>,
    ping_pong: Option<PingPong<G>>,
    pointer: PointerState,
    time: f32,
    size: (u32, u32),
    released: bool,
}

impl<G: Gpu> Compositor<G> {
    /// Upload the shared quad and compile every background and single-pass
    /// layer. Other layers compile when they first render.
    pub fn new(mut gpu: G, stack: EffectStack) -> Self {
        let quad = match gpu.create_quad(&QUAD_VERTICES) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                log::error!("quad geometry unavailable: {e}");
                None
            }
        };
        let disabled = vec![false; stack.len()];
        let mut compositor = Self {
            gpu,
            stack,
            quad,
            programs: BTreeMap::new(),
            disabled,
            pool: TargetPool::default(),
            ping_pong: None,
            pointer: PointerState::default(),
            time: 0.0,
            size: (0, 0),
            released: false,
        };

        let mut compiled = 0;
        for index in 0..compositor.stack.len() {
            let layer = &compositor.stack.layers()[index];
            if !layer.visible || !layer.compiles_eagerly() {
                continue;
            }
            if compositor.ensure_program(index, 0) {
                compiled += 1;
            }
        }
        log::info!("compiled {compiled} shader programs");
        compositor
    }

    pub fn stack(&self) -> &EffectStack {
        &self.stack
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn has_ping_pong(&self) -> bool {
        self.ping_pong.is_some()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Ids of layers switched off after a shader failure.
    pub fn disabled_layers(&self) -> Vec<&str> {
        self.stack
            .layers()
            .iter()
            .zip(&self.disabled)
            .filter(|(_, off)| **off)
            .map(|(l, _)| l.id.as_str())
            .collect()
    }

    /// Pointer moved to normalized surface coordinates (origin bottom-left).
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer.move_to(x, y);
    }

    /// Pointer moved, in client coordinates over a `(left, top, width, height)` rectangle.
    pub fn pointer_moved_client(&mut self, client: (f64, f64), rect: (f64, f64, f64, f64)) {
        self.pointer.move_client(client, rect);
    }

    /// Render one frame at the surface's current pixel size.
    pub fn render_frame(&mut self, width: u32, height: u32) -> FrameOutcome {
        if self.released {
            return FrameOutcome::Skipped;
        }
        if (width, height) != self.size {
            self.resize(width, height);
        }
        if width == 0 || height == 0 {
            return FrameOutcome::Skipped;
        }

        self.time += TIME_STEP;
        self.gpu.begin_frame();

        let mut walk = Walk {
            current: None,
            next: 0,
            passes: 0,
        };
        for index in 0..self.stack.len() {
            let layer = &self.stack.layers()[index];
            if !layer.visible || self.disabled[index] {
                continue;
            }
            match layer.role.clone() {
                LayerRole::Background => self.run_background(index, &mut walk),
                LayerRole::PingPong(plan) => self.run_ping_pong(index, &plan, &mut walk),
                LayerRole::MultiProgram => {
                    let count = layer.fragment_count();
                    self.run_chain(index, count, &mut walk)
                }
                LayerRole::MultiPass => {
                    let count = layer.passes.len();
                    self.run_chain(index, count, &mut walk)
                }
                LayerRole::Single => self.run_chain(index, 1, &mut walk),
            }
        }

        self.present(walk)
    }

    /// Release every GPU object. Also runs on drop.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for (_, program) in std::mem::take(&mut self.programs) {
            self.gpu.delete_program(program.program);
        }
        self.pool.clear(&mut self.gpu);
        if let Some(ping_pong) = self.ping_pong.take() {
            ping_pong.release(&mut self.gpu);
        }
        if let Some(quad) = self.quad.take() {
            self.gpu.delete_buffer(quad);
        }
        log::info!("compositor released");
    }

    fn pool_capacity(&self) -> usize {
        self.stack
            .layers()
            .iter()
            .zip(&self.disabled)
            .filter(|(l, off)| l.visible && !**off)
            .map(|(l, _)| l.targets_per_frame())
            .sum()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        let capacity = self.pool_capacity();
        self.pool.resize(&mut self.gpu, width, height, capacity);
        if capacity > 0 && width > 0 && height > 0 && self.pool.is_empty() {
            log::warn!("no render targets could be allocated; drawing the background directly");
        }

        if let Some(ping_pong) = self.ping_pong.take() {
            ping_pong.release(&mut self.gpu);
        }
        if width > 0 && height > 0 && self.stack.has_ping_pong() {
            self.ping_pong = PingPong::new(&mut self.gpu, width, height);
        }
        log::info!("surface resized to {width}x{height}");
    }

    /// Compile and cache the program for a pass. A failure disables the layer.
    fn ensure_program(&mut self, index: usize, pass: usize) -> bool {
        if self.disabled[index] {
            return false;
        }
        if self.programs.contains_key(&(index, pass)) {
            return true;
        }
        let layer = &self.stack.layers()[index];
        let (vertex, fragment) = layer.program_sources(pass);
        let extra = layer.custom_uniforms.iter().map(|(name, _)| name.as_str());
        match CompiledProgram::build(&mut self.gpu, vertex, fragment, extra) {
            Ok(program) => {
                log::debug!("compiled '{}' ({}) pass {pass}", layer.id, layer.kind);
                self.programs.insert((index, pass), program);
                true
            }
            Err(e) => {
                log::error!("layer '{}' disabled: {e}", layer.id);
                self.disabled[index] = true;
                false
            }
        }
    }

    /// Draw one pass of a layer. Returns the texture the pass wrote, the input
    /// when drawing to the surface, or `None` when nothing was drawn.
    fn render_pass(
        &mut self,
        index: usize,
        pass: usize,
        input: Option<G::Texture>,
        background: Option<G::Texture>,
        dest: Dest,
    ) -> Option<G::Texture> {
        if !self.ensure_program(index, pass) {
            return None;
        }
        let (framebuffer, output) = match dest {
            Dest::Screen => (None, None),
            Dest::Pool(slot) => {
                let target = self.pool.get(slot)?;
                (Some(&target.framebuffer), Some(target.texture.clone()))
            }
            Dest::PingPongWrite => {
                let target = self.ping_pong.as_ref()?.write();
                (Some(&target.framebuffer), Some(target.texture.clone()))
            }
        };
        let quad = self.quad.as_ref()?;
        let layer = &self.stack.layers()[index];
        let program = self.programs.get(&(index, pass))?;
        let gpu = &mut self.gpu;

        gpu.use_program(&program.program);
        let (position, texcoord) = program.attributes();
        gpu.bind_quad(quad, position, texcoord);

        let inputs = PassInputs {
            pointer: self.pointer,
            time: layer.time_at(self.time),
            resolution: self.size,
            scale: layer.scale,
        };
        for (uniform, produce) in UNIFORM_TABLE.iter() {
            if let (Some(location), Some(value)) = (program.uniform(*uniform), produce(&inputs)) {
                gpu.set_uniform(location, value);
            }
        }
        for (name, location) in program.custom_uniforms() {
            if let Some((_, value)) = layer.custom_uniforms.iter().find(|(n, _)| n == name) {
                gpu.set_uniform(location, *value);
            }
        }

        if let (Some(location), Some(texture)) = (program.sampler(Sampler::Input), &input) {
            gpu.bind_texture(Sampler::Input.unit(), texture, location);
        }
        if let (Some(location), Some(ping_pong)) =
            (program.sampler(Sampler::PingPong), &self.ping_pong)
        {
            gpu.bind_texture(Sampler::PingPong.unit(), &ping_pong.read().texture, location);
        }
        if let (Some(location), Some(texture)) = (
            program.sampler(Sampler::Background),
            background.as_ref().or(input.as_ref()),
        ) {
            gpu.bind_texture(Sampler::Background.unit(), texture, location);
        }

        gpu.bind_framebuffer(framebuffer);
        let (width, height) = self.size;
        if dest == Dest::Screen {
            gpu.viewport(width, height);
        } else {
            let scale = layer.down_sample_for(pass);
            gpu.viewport(scaled(width, scale), scaled(height, scale));
        }
        gpu.draw_quad();
        gpu.viewport(width, height);

        output.or(input)
    }

    fn run_background(&mut self, index: usize, walk: &mut Walk<G::Texture>) {
        if self.pool.get(walk.next).is_none() {
            log::error!("no render target for background '{}'", self.layer(index).id);
            return;
        }
        if let Some(texture) = self.render_pass(index, 0, None, None, Dest::Pool(walk.next)) {
            walk.current = Some(texture);
            walk.next += 1;
            walk.passes += 1;
        }
    }

    /// Run `count` chained passes. The layer's output is only committed if
    /// every pass that had a target drew.
    fn run_chain(&mut self, index: usize, count: usize, walk: &mut Walk<G::Texture>) {
        let mut texture = walk.current.clone();
        let mut next = walk.next;
        let mut passes = 0;
        for pass in 0..count {
            if self.pool.get(next).is_none() {
                log::debug!("layer '{}' pass {pass}: pool exhausted", self.layer(index).id);
                continue;
            }
            match self.render_pass(index, pass, texture.clone(), None, Dest::Pool(next)) {
                Some(output) => {
                    texture = Some(output);
                    next += 1;
                    passes += 1;
                }
                None => return,
            }
        }
        walk.current = texture;
        walk.next = next;
        walk.passes += passes;
    }

    fn run_ping_pong(&mut self, index: usize, plan: &PingPongPlan, walk: &mut Walk<G::Texture>) {
        if self.ping_pong.is_none() {
            return;
        }
        let incoming = walk.current.clone();

        if plan.simulate {
            if self
                .render_pass(index, 0, incoming.clone(), None, Dest::PingPongWrite)
                .is_none()
            {
                return;
            }
            if let Some(ping_pong) = self.ping_pong.as_mut() {
                ping_pong.swap();
            }
            walk.passes += 1;
        }

        let mut texture = self.ping_pong.as_ref().map(|p| p.read().texture.clone());
        let mut next = walk.next;
        for &pass in &plan.filters {
            if self.pool.get(next).is_none() {
                continue;
            }
            match self.render_pass(index, pass, texture.clone(), None, Dest::Pool(next)) {
                Some(output) => {
                    texture = Some(output);
                    next += 1;
                    walk.passes += 1;
                }
                None => return,
            }
        }

        match (plan.composite, incoming) {
            (Some(pass), Some(background)) if self.pool.get(next).is_some() => {
                match self.render_pass(index, pass, texture, Some(background), Dest::Pool(next)) {
                    Some(output) => {
                        walk.current = Some(output);
                        next += 1;
                        walk.passes += 1;
                    }
                    None => return,
                }
            }
            _ => walk.current = texture,
        }
        walk.next = next;
    }

    /// Draw the walk's result to the surface.
    fn present(&mut self, walk: Walk<G::Texture>) -> FrameOutcome {
        let Some(texture) = walk.current else {
            let background = self
                .stack
                .layers()
                .iter()
                .position(|l| l.visible && l.is_background());
            return match background {
                Some(index) if self.render_pass(index, 0, None, None, Dest::Screen).is_some() => {
                    FrameOutcome::Direct
                }
                _ => FrameOutcome::Empty,
            };
        };

        match self.final_program() {
            Some((index, pass)) => {
                self.render_pass(index, pass, Some(texture), None, Dest::Screen);
                FrameOutcome::Composited {
                    passes: walk.passes,
                }
            }
            None => {
                log::debug!("no program can present the composited texture");
                FrameOutcome::Empty
            }
        }
    }

    /// The program that presents the final texture: the highest cached pass
    /// sampling an input in the last live non-background layer that has one,
    /// else the first cached pass of the last live layer.
    fn final_program(&self) -> Option<(usize, usize)> {
        let live = |i: &usize| self.stack.layers()[*i].visible && !self.disabled[*i];
        let passes = |i: usize| self.programs.range((i, 0)..=(i, usize::MAX));

        let sampling = (0..self.stack.len())
            .rev()
            .filter(live)
            .filter(|i| !self.stack.layers()[*i].is_background())
            .find_map(|i| {
                passes(i)
                    .rev()
                    .find(|(_, program)| program.sampler(Sampler::Input).is_some())
                    .map(|(key, _)| *key)
            });
        sampling.or_else(|| {
            (0..self.stack.len())
                .rev()
                .filter(live)
                .find_map(|i| passes(i).next().map(|(key, _)| *key))
        })
    }

    fn layer(&self, index: usize) -> &EffectLayer {
        &self.stack.layers()[index]
    }
}

impl<G: Gpu> Drop for Compositor<G> {
    fn drop(&mut self) {
        self.release();
    }
}

fn scaled(extent: u32, factor: f32) -> u32 {
    ((extent as f32 * factor).floor() as u32).max(1)
}
