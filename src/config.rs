//! Effect-layer documents.
//!
//! A document is the JSON export of an effect stack: `{ "history": [...] }`,
//! one entry per layer in composition order. Each entry is read on its own so
//! a single broken layer only costs that layer.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::uniforms::{Uniform, UniformValue};

#[derive(Debug, Deserialize)]
struct EffectDocument {
    history: Vec<Value>,
}

fn default_true() -> bool {
    true
}

/// One layer exactly as it appears in the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub uses_ping_pong: bool,
    #[serde(default = "default_true")]
    pub animating: bool,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default, alias = "vertexPrograms")]
    pub compiled_vertex_shaders: Vec<String>,
    #[serde(default, alias = "fragmentPrograms")]
    pub compiled_fragment_shaders: Vec<String>,
    #[serde(default)]
    pub data: Option<AuxData>,
}

/// The optional `data` bag of a layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxData {
    #[serde(default)]
    pub down_sample: Option<f32>,
    #[serde(default)]
    pub is_background: bool,
    #[serde(default)]
    pub depth: bool,
    #[serde(default)]
    pub uniforms: Map<String, Value>,
    #[serde(default)]
    pub passes: Vec<PassSpec>,
    #[serde(default)]
    pub texture: Option<TextureRef>,
}

/// One discrete pass of a multi-stage layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSpec {
    #[serde(default = "PassSpec::default_prop")]
    pub prop: String,
    pub value: f32,
    #[serde(default)]
    pub down_sample: Option<f32>,
    #[serde(default)]
    pub include_bg: bool,
}

impl PassSpec {
    fn default_prop() -> String {
        "pass".to_string()
    }

    pub fn new(value: f32) -> Self {
        Self {
            prop: Self::default_prop(),
            value,
            down_sample: None,
            include_bg: false,
        }
    }
}

/// Static image a layer samples from. Carried through, never fetched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextureRef {
    pub src: String,
    pub sampler: String,
}

/// Execution plan of a ping-pong simulation layer, by pass index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PingPongPlan {
    /// Run the simulation step (pass 0) into the write buffer and swap.
    pub simulate: bool,
    /// Filter passes run over the simulation output, in order.
    pub filters: Vec<usize>,
    /// Final pass blending the filtered result over the incoming texture.
    pub composite: Option<usize>,
}

impl PingPongPlan {
    pub fn from_passes(passes: &[PassSpec]) -> Self {
        let default_passes = [PassSpec::new(0.0)];
        let passes = if passes.is_empty() {
            &default_passes[..]
        } else {
            passes
        };

        let simulate = passes[0].value == 0.0;
        let last = passes.len() - 1;
        let composite = (passes[last].include_bg && !(last == 0 && simulate)).then_some(last);
        let filters = passes
            .iter()
            .enumerate()
            .filter(|(i, p)| Some(*i) != composite && (p.value == 1.0 || p.value == 2.0))
            .map(|(i, _)| i)
            .collect();

        Self {
            simulate,
            filters,
            composite,
        }
    }
}

/// How a layer takes part in the frame walk.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerRole {
    /// Originates the pixel stream; renders with no input texture.
    Background,
    /// Double-buffered simulation followed by filter and composite passes.
    PingPong(PingPongPlan),
    /// One pass per fragment program, chained.
    MultiProgram,
    /// One pass per entry of the declared pass list, chained.
    MultiPass,
    /// A single draw consuming the current texture.
    Single,
}

/// A validated layer, ready for the compositor.
#[derive(Debug, Clone)]
pub struct EffectLayer {
    pub id: String,
    pub kind: String,
    pub visible: bool,
    pub animating: bool,
    pub speed: f32,
    pub scale: Option<f32>,
    pub down_sample: f32,
    pub depth: bool,
    pub texture: Option<TextureRef>,
    pub passes: Vec<PassSpec>,
    pub custom_uniforms: Vec<(String, UniformValue)>,
    pub role: LayerRole,
    vertex: Vec<String>,
    fragment: Vec<String>,
}

impl EffectLayer {
    fn from_descriptor(desc: LayerDescriptor) -> Result<Self, ConfigError> {
        let reject = |reason: &str| ConfigError::Layer {
            id: desc.id.clone(),
            reason: reason.to_string(),
        };
        if desc.id.trim().is_empty() {
            return Err(reject("empty id"));
        }
        if desc.compiled_vertex_shaders.is_empty() {
            return Err(reject("no vertex program"));
        }
        if desc.compiled_fragment_shaders.is_empty() {
            return Err(reject("no fragment program"));
        }

        let data = desc.data.unwrap_or_default();
        let role = if data.is_background {
            LayerRole::Background
        } else if desc.uses_ping_pong {
            LayerRole::PingPong(PingPongPlan::from_passes(&data.passes))
        } else if desc.compiled_fragment_shaders.len() > 1 {
            LayerRole::MultiProgram
        } else if data.passes.len() > 1 {
            LayerRole::MultiPass
        } else {
            LayerRole::Single
        };

        let mut custom_uniforms = Vec::new();
        for (name, value) in &data.uniforms {
            if Uniform::ALL.iter().any(|u| u.name() == name) {
                log::debug!("layer '{}': uniform '{}' is built in, ignoring", desc.id, name);
                continue;
            }
            match uniform_value(value) {
                Some(v) => custom_uniforms.push((name.clone(), v)),
                None => log::debug!("layer '{}': unsupported uniform '{}'", desc.id, name),
            }
        }

        Ok(Self {
            id: desc.id,
            kind: desc.kind,
            visible: desc.visible,
            animating: desc.animating,
            speed: desc.speed.unwrap_or(1.0),
            scale: desc.scale,
            down_sample: positive(data.down_sample).unwrap_or(1.0),
            depth: data.depth,
            texture: data.texture,
            passes: data.passes,
            custom_uniforms,
            role,
            vertex: desc.compiled_vertex_shaders,
            fragment: desc.compiled_fragment_shaders,
        })
    }

    /// Vertex and fragment source for a pass; short lists reuse their last entry.
    pub fn program_sources(&self, pass: usize) -> (&str, &str) {
        let v = &self.vertex[pass.min(self.vertex.len() - 1)];
        let f = &self.fragment[pass.min(self.fragment.len() - 1)];
        (v, f)
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment.len()
    }

    /// Render-target scale for a pass; a pass override wins over the layer's.
    pub fn down_sample_for(&self, pass: usize) -> f32 {
        self.passes
            .get(pass)
            .and_then(|p| positive(p.down_sample))
            .unwrap_or(self.down_sample)
    }

    /// Number of pooled buffers this layer writes in one frame.
    pub fn targets_per_frame(&self) -> usize {
        match &self.role {
            LayerRole::Background | LayerRole::Single => 1,
            LayerRole::MultiProgram => self.fragment.len(),
            LayerRole::MultiPass => self.passes.len(),
            LayerRole::PingPong(plan) => plan.filters.len() + usize::from(plan.composite.is_some()),
        }
    }

    /// Background and single-pass layers compile at startup, the rest on first use.
    pub fn compiles_eagerly(&self) -> bool {
        matches!(self.role, LayerRole::Background | LayerRole::Single)
    }

    pub fn is_background(&self) -> bool {
        self.role == LayerRole::Background
    }

    /// Value of `uTime` for this layer given the global clock.
    pub fn time_at(&self, global: f32) -> f32 {
        if self.animating {
            global * self.speed
        } else {
            0.0
        }
    }
}

fn positive(v: Option<f32>) -> Option<f32> {
    v.filter(|v| *v > 0.0)
}

fn uniform_value(value: &Value) -> Option<UniformValue> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| UniformValue::F32(v as f32)),
        Value::Array(items) => {
            let v = items
                .iter()
                .map(|i| i.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()?;
            match v[..] {
                [x, y] => Some(UniformValue::Vec2([x, y])),
                [x, y, z] => Some(UniformValue::Vec3([x, y, z])),
                [x, y, z, w] => Some(UniformValue::Vec4([x, y, z, w])),
                _ => None,
            }
        }
        Value::Object(map) => map.get("value").and_then(uniform_value),
        _ => None,
    }
}

/// The ordered, validated layer list.
#[derive(Debug, Clone, Default)]
pub struct EffectStack {
    layers: Vec<EffectLayer>,
}

impl EffectStack {
    /// Parse a document. Only a broken top level is an error; broken layers
    /// are logged and dropped.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let doc: EffectDocument = serde_json::from_str(text)?;
        let mut descriptors = Vec::with_capacity(doc.history.len());
        for (index, raw) in doc.history.into_iter().enumerate() {
            match serde_json::from_value::<LayerDescriptor>(raw) {
                Ok(d) => descriptors.push(d),
                Err(e) => log::error!("layer #{index} skipped: {e}"),
            }
        }
        Ok(Self::from_descriptors(descriptors))
    }

    pub fn from_descriptors(descriptors: Vec<LayerDescriptor>) -> Self {
        let mut layers: Vec<EffectLayer> = Vec::with_capacity(descriptors.len());
        let mut seen = HashSet::new();
        let mut background: Option<String> = None;
        let mut consumer_before_background = false;

        for desc in descriptors {
            let layer = match EffectLayer::from_descriptor(desc) {
                Ok(l) => l,
                Err(e) => {
                    log::error!("{e}");
                    continue;
                }
            };
            if !seen.insert(layer.id.clone()) {
                log::error!("layer '{}' rejected: duplicate id", layer.id);
                continue;
            }
            if layer.visible {
                if layer.is_background() {
                    if let Some(first) = &background {
                        log::error!(
                            "layer '{}' rejected: '{}' is already the background",
                            layer.id,
                            first
                        );
                        continue;
                    }
                    if consumer_before_background {
                        log::warn!(
                            "background '{}' follows layers that expect an input texture",
                            layer.id
                        );
                    }
                    background = Some(layer.id.clone());
                } else {
                    consumer_before_background = true;
                }
            }
            layers.push(layer);
        }

        log::info!("loaded {} effect layers", layers.len());
        Self { layers }
    }

    pub fn layers(&self) -> &[EffectLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn visible(&self) -> impl Iterator<Item = &EffectLayer> {
        self.layers.iter().filter(|l| l.visible)
    }

    pub fn background(&self) -> Option<&EffectLayer> {
        self.visible().find(|l| l.is_background())
    }

    pub fn has_ping_pong(&self) -> bool {
        self.visible()
            .any(|l| matches!(l.role, LayerRole::PingPong(_)))
    }

    /// Pooled buffers one frame needs when every visible layer runs.
    pub fn targets_per_frame(&self) -> usize {
        self.visible().map(EffectLayer::targets_per_frame).sum()
    }
}
