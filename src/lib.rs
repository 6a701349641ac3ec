//! Real-time shader background: composites an ordered stack of GLSL effect
//! layers into a full-screen canvas, reacting to pointer movement and time.
//!
//! The compositor and its configuration are plain Rust and run on the host
//! (see the tests); the WebGL2 backend and the frame loop only exist on
//! `wasm32`.

pub mod compositor;
pub mod config;
pub mod error;
pub mod gpu;
pub mod pointer;
pub mod pool;
pub mod uniforms;

pub use compositor::{Compositor, FrameOutcome};
pub use config::EffectStack;
pub use error::{CompositorError, ConfigError};
pub use gpu::Gpu;

/// The effect stack the site ships with.
pub const DEFAULT_STACK: &str = include_str!("../static/effects.json");

// Only compile wasm-specific code when targeting wasm32.

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    mod logger;
    mod render;
    mod webgl;

    pub use render::ShaderBackground;

    #[wasm_bindgen(start)]
    pub fn main() {
        let level = if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        logger::init(level);
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::ShaderBackground;
