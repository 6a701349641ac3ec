use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext as GL, WebGlBuffer, WebGlFramebuffer,
    WebGlProgram, WebGlShader, WebGlTexture, WebGlUniformLocation,
};

use crate::error::{CompositorError, ShaderStage};
use crate::gpu::Gpu;
use crate::uniforms::UniformValue;

/// [`Gpu`] over a WebGL2 context.
pub struct WebGl {
    gl: GL,
}

impl WebGl {
    /// Acquire a `webgl2` context with alpha, antialiasing and straight
    /// (non-premultiplied) alpha.
    pub fn from_canvas(canvas: &HtmlCanvasElement) -> Result<Self, CompositorError> {
        let unavailable = |e: JsValue| {
            CompositorError::ContextUnavailable(e.as_string().unwrap_or_else(|| format!("{e:?}")))
        };
        let options = js_sys::Object::new();
        for (key, value) in [("alpha", true), ("antialias", true), ("premultipliedAlpha", false)] {
            js_sys::Reflect::set(&options, &JsValue::from_str(key), &JsValue::from_bool(value))
                .map_err(unavailable)?;
        }
        let gl = canvas
            .get_context_with_context_options("webgl2", &options)
            .map_err(unavailable)?
            .ok_or_else(|| CompositorError::ContextUnavailable("WebGL2 not supported".into()))?
            .dyn_into::<GL>()
            .map_err(|e| unavailable(e.into()))?;
        Ok(Self { gl })
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<WebGlShader, CompositorError> {
        let kind = match stage {
            ShaderStage::Vertex => GL::VERTEX_SHADER,
            ShaderStage::Fragment => GL::FRAGMENT_SHADER,
        };
        let shader = self
            .gl
            .create_shader(kind)
            .ok_or(CompositorError::Allocation("shader"))?;
        self.gl.shader_source(&shader, source);
        self.gl.compile_shader(&shader);
        let ok = self
            .gl
            .get_shader_parameter(&shader, GL::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false);
        if ok {
            Ok(shader)
        } else {
            let log = self.gl.get_shader_info_log(&shader).unwrap_or_default();
            self.gl.delete_shader(Some(&shader));
            Err(CompositorError::ShaderCompile { stage, log })
        }
    }
}

impl Gpu for WebGl {
    type Program = WebGlProgram;
    type Texture = WebGlTexture;
    type Framebuffer = WebGlFramebuffer;
    type Buffer = WebGlBuffer;
    type Location = WebGlUniformLocation;

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<WebGlProgram, CompositorError> {
        let vs = self.compile_shader(ShaderStage::Vertex, vertex)?;
        let fs = match self.compile_shader(ShaderStage::Fragment, fragment) {
            Ok(fs) => fs,
            Err(e) => {
                self.gl.delete_shader(Some(&vs));
                return Err(e);
            }
        };
        let program = self
            .gl
            .create_program()
            .ok_or(CompositorError::Allocation("program"))?;
        self.gl.attach_shader(&program, &vs);
        self.gl.attach_shader(&program, &fs);
        self.gl.link_program(&program);
        // Shaders are only flagged; they live until the program is deleted.
        self.gl.delete_shader(Some(&vs));
        self.gl.delete_shader(Some(&fs));

        let linked = self
            .gl
            .get_program_parameter(&program, GL::LINK_STATUS)
            .as_bool()
            .unwrap_or(false);
        if linked {
            Ok(program)
        } else {
            let log = self.gl.get_program_info_log(&program).unwrap_or_default();
            self.gl.delete_program(Some(&program));
            Err(CompositorError::ProgramLink { log })
        }
    }

    fn uniform_location(&mut self, program: &WebGlProgram, name: &str) -> Option<WebGlUniformLocation> {
        self.gl.get_uniform_location(program, name)
    }

    fn attrib_location(&mut self, program: &WebGlProgram, name: &str) -> Option<u32> {
        let location = self.gl.get_attrib_location(program, name);
        (location >= 0).then_some(location as u32)
    }

    fn create_quad(&mut self, vertices: &[f32]) -> Result<WebGlBuffer, CompositorError> {
        let buffer = self
            .gl
            .create_buffer()
            .ok_or(CompositorError::Allocation("vertex buffer"))?;
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
        let data = js_sys::Float32Array::from(vertices);
        self.gl
            .buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &data, GL::STATIC_DRAW);
        Ok(buffer)
    }

    fn create_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<(WebGlTexture, WebGlFramebuffer), CompositorError> {
        let gl = &self.gl;
        let texture = gl
            .create_texture()
            .ok_or(CompositorError::Allocation("texture"))?;
        gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
        let storage = gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
            GL::TEXTURE_2D,
            0,
            GL::RGBA as i32,
            width as i32,
            height as i32,
            0,
            GL::RGBA,
            GL::UNSIGNED_BYTE,
            None,
        );
        if storage.is_err() {
            gl.delete_texture(Some(&texture));
            return Err(CompositorError::Allocation("texture storage"));
        }
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, GL::LINEAR as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, GL::LINEAR as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, GL::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);

        let Some(framebuffer) = gl.create_framebuffer() else {
            gl.delete_texture(Some(&texture));
            return Err(CompositorError::Allocation("framebuffer"));
        };
        gl.bind_framebuffer(GL::FRAMEBUFFER, Some(&framebuffer));
        gl.framebuffer_texture_2d(
            GL::FRAMEBUFFER,
            GL::COLOR_ATTACHMENT0,
            GL::TEXTURE_2D,
            Some(&texture),
            0,
        );
        let status = gl.check_framebuffer_status(GL::FRAMEBUFFER);
        gl.bind_framebuffer(GL::FRAMEBUFFER, None);
        if status != GL::FRAMEBUFFER_COMPLETE {
            gl.delete_framebuffer(Some(&framebuffer));
            gl.delete_texture(Some(&texture));
            return Err(CompositorError::FramebufferIncomplete { status });
        }
        Ok((texture, framebuffer))
    }

    fn begin_frame(&mut self) {
        self.gl.bind_framebuffer(GL::FRAMEBUFFER, None);
        self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
        self.gl.clear(GL::COLOR_BUFFER_BIT);
        self.gl.enable(GL::BLEND);
        self.gl.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);
    }

    fn use_program(&mut self, program: &WebGlProgram) {
        self.gl.use_program(Some(program));
    }

    fn bind_quad(&mut self, quad: &WebGlBuffer, position: Option<u32>, texcoord: Option<u32>) {
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(quad));
        if let Some(location) = position {
            self.gl.enable_vertex_attrib_array(location);
            self.gl
                .vertex_attrib_pointer_with_i32(location, 2, GL::FLOAT, false, 16, 0);
        }
        if let Some(location) = texcoord {
            self.gl.enable_vertex_attrib_array(location);
            self.gl
                .vertex_attrib_pointer_with_i32(location, 2, GL::FLOAT, false, 16, 8);
        }
    }

    fn set_uniform(&mut self, location: &WebGlUniformLocation, value: UniformValue) {
        let location = Some(location);
        match value {
            UniformValue::F32(v) => self.gl.uniform1f(location, v),
            UniformValue::Vec2([x, y]) => self.gl.uniform2f(location, x, y),
            UniformValue::Vec3([x, y, z]) => self.gl.uniform3f(location, x, y, z),
            UniformValue::Vec4([x, y, z, w]) => self.gl.uniform4f(location, x, y, z, w),
            UniformValue::Mat4(m) => self
                .gl
                .uniform_matrix4fv_with_f32_array(location, false, &m),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &WebGlTexture, location: &WebGlUniformLocation) {
        self.gl.active_texture(GL::TEXTURE0 + unit);
        self.gl.bind_texture(GL::TEXTURE_2D, Some(texture));
        self.gl.uniform1i(Some(location), unit as i32);
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&WebGlFramebuffer>) {
        self.gl.bind_framebuffer(GL::FRAMEBUFFER, framebuffer);
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    fn draw_quad(&mut self) {
        self.gl.draw_arrays(GL::TRIANGLES, 0, 6);
    }

    fn delete_program(&mut self, program: WebGlProgram) {
        self.gl.delete_program(Some(&program));
    }

    fn delete_texture(&mut self, texture: WebGlTexture) {
        self.gl.delete_texture(Some(&texture));
    }

    fn delete_framebuffer(&mut self, framebuffer: WebGlFramebuffer) {
        self.gl.delete_framebuffer(Some(&framebuffer));
    }

    fn delete_buffer(&mut self, buffer: WebGlBuffer) {
        self.gl.delete_buffer(Some(&buffer));
    }
}
