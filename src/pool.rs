//! Offscreen render targets.

use crate::gpu::Gpu;

/// A texture and the framebuffer that renders into it.
pub struct Target<G: Gpu> {
    pub texture: G::Texture,
    pub framebuffer: G::Framebuffer,
}

fn release<G: Gpu>(gpu: &mut G, target: Target<G>) {
    gpu.delete_texture(target.texture);
    gpu.delete_framebuffer(target.framebuffer);
}

/// Ordered targets, all sized to the drawing surface.
pub struct TargetPool<G: Gpu> {
    targets: Vec<Target<G>>,
}

impl<G: Gpu> Default for TargetPool<G> {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
        }
    }
}

impl<G: Gpu> TargetPool<G> {
    /// Drop every target and allocate `capacity` new ones at `width`x`height`.
    ///
    /// Targets that fail to allocate are logged and left out, so the pool may
    /// come back shorter than asked.
    pub fn resize(&mut self, gpu: &mut G, width: u32, height: u32, capacity: usize) {
        self.clear(gpu);
        if width == 0 || height == 0 {
            return;
        }
        for slot in 0..capacity {
            match gpu.create_target(width, height) {
                Ok((texture, framebuffer)) => self.targets.push(Target {
                    texture,
                    framebuffer,
                }),
                Err(e) => log::error!("render target {slot} unavailable: {e}"),
            }
        }
        log::debug!(
            "render pool: {}/{} targets at {}x{}",
            self.targets.len(),
            capacity,
            width,
            height
        );
    }

    pub fn get(&self, index: usize) -> Option<&Target<G>> {
        self.targets.get(index)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self, gpu: &mut G) {
        for target in self.targets.drain(..) {
            release(gpu, target);
        }
    }
}

/// Two targets whose read and write roles swap after every simulation step.
pub struct PingPong<G: Gpu> {
    read: Target<G>,
    write: Target<G>,
}

impl<G: Gpu> PingPong<G> {
    pub fn new(gpu: &mut G, width: u32, height: u32) -> Option<Self> {
        let first = match gpu.create_target(width, height) {
            Ok((texture, framebuffer)) => Target {
                texture,
                framebuffer,
            },
            Err(e) => {
                log::error!("ping-pong buffer unavailable: {e}");
                return None;
            }
        };
        match gpu.create_target(width, height) {
            Ok((texture, framebuffer)) => Some(Self {
                read: first,
                write: Target {
                    texture,
                    framebuffer,
                },
            }),
            Err(e) => {
                log::error!("ping-pong buffer unavailable: {e}");
                release(gpu, first);
                None
            }
        }
    }

    pub fn read(&self) -> &Target<G> {
        &self.read
    }

    pub fn write(&self) -> &Target<G> {
        &self.write
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    pub fn release(self, gpu: &mut G) {
        release(gpu, self.read);
        release(gpu, self.write);
    }
}
