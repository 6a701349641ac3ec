
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
use web_sys::{window, HtmlCanvasElement, MouseEvent};

use super::webgl::WebGl;
use crate::compositor::Compositor;
use crate::config::EffectStack;

// `FrameLoop` holds the animation-frame closure so that it can keep calling
// `request_animation_frame` on itself. Storing it inside an `Option` allows
// the `Closure` to be created first and referenced from within itself.
type FrameLoop = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;
type Shared = Rc<RefCell<Option<Compositor<WebGl>>>>;

/// A compositor running on a canvas.
pub struct Session {
    canvas: HtmlCanvasElement,
    compositor: Shared,
    frame: FrameLoop,
    frame_id: Rc<Cell<Option<i32>>>,
    on_pointer: Option<Closure<dyn FnMut(MouseEvent)>>,
}

/// Attach a compositor for `stack` to `canvas` and start the frame loop.
pub fn start(canvas: HtmlCanvasElement, stack: EffectStack) -> Result<Session, JsValue> {
    let gpu = WebGl::from_canvas(&canvas).map_err(|e| {
        log::error!("{e}");
        JsValue::from_str(&e.to_string())
    })?;
    if stack.is_empty() {
        log::warn!("effect stack is empty; nothing will be drawn");
    }
    let compositor: Shared = Rc::new(RefCell::new(Some(Compositor::new(gpu, stack))));

    let on_pointer = {
        let canvas = canvas.clone();
        let compositor = compositor.clone();
        Closure::wrap(Box::new(move |event: MouseEvent| {
            let rect = canvas.get_bounding_client_rect();
            if let Some(c) = compositor.borrow_mut().as_mut() {
                c.pointer_moved_client(
                    (event.client_x() as f64, event.client_y() as f64),
                    (rect.left(), rect.top(), rect.width(), rect.height()),
                );
            }
        }) as Box<dyn FnMut(MouseEvent)>)
    };
    canvas.add_event_listener_with_callback("mousemove", on_pointer.as_ref().unchecked_ref())?;

    let f: FrameLoop = Rc::new(RefCell::new(None));
    let g = f.clone();
    let frame_id = Rc::new(Cell::new(None));
    {
        let canvas = canvas.clone();
        let compositor = compositor.clone();
        let frame_id = frame_id.clone();
        *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            let (width, height) = fit_canvas(&canvas);
            match compositor.borrow_mut().as_mut() {
                Some(c) => {
                    c.render_frame(width, height);
                }
                None => return,
            }
            // schedule next
            frame_id.set(schedule(&f).ok());
        }) as Box<dyn FnMut()>));
    }
    frame_id.set(Some(schedule(&g)?));

    Ok(Session {
        canvas,
        compositor,
        frame: g,
        frame_id,
        on_pointer: Some(on_pointer),
    })
}

impl Session {
    /// Cancel the frame loop, remove the pointer listener and release every
    /// GPU object. Dropping the session does the same.
    pub fn stop(self) {
        drop(self);
    }

    fn teardown(&mut self) {
        if let (Some(id), Some(w)) = (self.frame_id.take(), window()) {
            if let Err(e) = w.cancel_animation_frame(id) {
                log::warn!("cancel_animation_frame failed: {e:?}");
            }
        }
        // Dropping the closure breaks its self-reference.
        self.frame.borrow_mut().take();
        if let Some(on_pointer) = self.on_pointer.take() {
            if let Err(e) = self
                .canvas
                .remove_event_listener_with_callback("mousemove", on_pointer.as_ref().unchecked_ref())
            {
                log::warn!("failed to remove pointer listener: {e:?}");
            }
        }
        if let Some(c) = self.compositor.borrow_mut().take() {
            c.shutdown();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn schedule(f: &FrameLoop) -> Result<i32, JsValue> {
    let w = window().ok_or("no window")?;
    let slot = f.borrow();
    let closure = slot.as_ref().ok_or("frame loop stopped")?;
    w.request_animation_frame(closure.as_ref().unchecked_ref())
}

/// Match the drawing buffer to the canvas' layout size, falling back to the
/// window size for a dimension the layout reports as zero.
fn fit_canvas(canvas: &HtmlCanvasElement) -> (u32, u32) {
    let window_size = |extent: Option<Result<JsValue, JsValue>>| {
        extent
            .and_then(Result::ok)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as u32
    };
    let mut width = canvas.client_width().max(0) as u32;
    let mut height = canvas.client_height().max(0) as u32;
    if width == 0 {
        width = window_size(window().map(|w| w.inner_width()));
    }
    if height == 0 {
        height = window_size(window().map(|w| w.inner_height()));
    }
    if canvas.width() != width || canvas.height() != height {
        canvas.set_width(width);
        canvas.set_height(height);
    }
    (width, height)
}

/// Shader background bound to a canvas, for use from JavaScript.
#[wasm_bindgen]
pub struct ShaderBackground {
    session: Option<Session>,
}

#[wasm_bindgen]
impl ShaderBackground {
    /// Start rendering the effect document `config` (JSON) on `canvas`.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, config: &str) -> Result<ShaderBackground, JsValue> {
        let stack = EffectStack::from_json(config).map_err(|e| {
            log::error!("{e}");
            JsValue::from_str(&e.to_string())
        })?;
        Ok(Self {
            session: Some(start(canvas, stack)?),
        })
    }

    /// Start rendering the built-in effect stack on `canvas`.
    #[wasm_bindgen(js_name = withDefaultStack)]
    pub fn with_default_stack(canvas: HtmlCanvasElement) -> Result<ShaderBackground, JsValue> {
        Self::new(canvas, crate::DEFAULT_STACK)
    }

    /// Tear down. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.session.is_some()
    }
}
