//! Pointer position as the shaders see it.

/// Normalized pointer position over the drawing surface, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub current: [f32; 2],
    pub previous: [f32; 2],
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            current: [0.5, 0.5],
            previous: [0.5, 0.5],
        }
    }
}

impl PointerState {
    /// Record a move to already-normalized coordinates.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.previous = self.current;
        self.current = [x, y];
    }

    /// Record a move given client coordinates and the surface rectangle
    /// `(left, top, width, height)`. Zero-sized rectangles are ignored.
    pub fn move_client(&mut self, client: (f64, f64), rect: (f64, f64, f64, f64)) {
        let (left, top, width, height) = rect;
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let x = (client.0 - left) / width;
        let y = 1.0 - (client.1 - top) / height;
        self.move_to(x as f32, y as f32);
    }
}
