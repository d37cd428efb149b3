//! Mouse state for picking operations
//!
//! Converts window-space cursor positions (screen coordinates, which differ from
//! framebuffer pixels on HiDPI displays) into the integer pixel the object-ID
//! attachment is read back from.

/// Mouse state for picking operations
#[derive(Debug, Clone)]
pub struct MouseState {
    /// Cursor X in screen coordinates
    pub screen_x: f64,
    /// Cursor Y in screen coordinates
    pub screen_y: f64,
    /// Window width in screen coordinates
    pub window_width: u32,
    /// Window height in screen coordinates
    pub window_height: u32,
    /// Framebuffer width in pixels
    pub framebuffer_width: u32,
    /// Framebuffer height in pixels
    pub framebuffer_height: u32,
    /// Left mouse button pressed this frame
    pub left_click: bool,
}

impl MouseState {
    /// Mouse state for a window whose framebuffer matches its screen size
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            screen_x: 0.0,
            screen_y: 0.0,
            window_width,
            window_height,
            framebuffer_width: window_width,
            framebuffer_height: window_height,
            left_click: false,
        }
    }

    /// Update cursor position from window events
    pub fn update_position(&mut self, x: f64, y: f64) {
        self.screen_x = x;
        self.screen_y = y;
    }

    /// Update window and framebuffer sizes
    pub fn update_sizes(&mut self, window: (u32, u32), framebuffer: (u32, u32)) {
        self.window_width = window.0;
        self.window_height = window.1;
        self.framebuffer_width = framebuffer.0;
        self.framebuffer_height = framebuffer.1;
    }

    /// Set left mouse button state
    pub fn set_left_click(&mut self, clicked: bool) {
        self.left_click = clicked;
    }

    /// Clear click state (call at end of frame)
    pub fn clear_clicks(&mut self) {
        self.left_click = false;
    }

    /// Framebuffer pixel under the cursor, `None` when it lies outside the window
    pub fn pixel(&self) -> Option<(u32, u32)> {
        cursor_to_pixel(
            (self.screen_x, self.screen_y),
            (self.window_width, self.window_height),
            (self.framebuffer_width, self.framebuffer_height),
        )
    }
}

impl Default for MouseState {
    fn default() -> Self {
        Self::new(1600, 900)
    }
}

/// Map a cursor position in screen coordinates to a framebuffer pixel
///
/// The HiDPI scale is the framebuffer/window size ratio per axis.
pub fn cursor_to_pixel(cursor: (f64, f64), window: (u32, u32), framebuffer: (u32, u32)) -> Option<(u32, u32)> {
    let (x, y) = cursor;
    if window.0 == 0 || window.1 == 0 || framebuffer.0 == 0 || framebuffer.1 == 0 {
        return None;
    }
    if !(0.0..f64::from(window.0)).contains(&x) || !(0.0..f64::from(window.1)).contains(&y) {
        return None;
    }

    let scale_x = f64::from(framebuffer.0) / f64::from(window.0);
    let scale_y = f64::from(framebuffer.1) / f64::from(window.1);

    let px = ((x * scale_x).floor() as u32).min(framebuffer.0 - 1);
    let py = ((y * scale_y).floor() as u32).min(framebuffer.1 - 1);
    Some((px, py))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_to_pixel_unscaled() {
        assert_eq!(cursor_to_pixel((0.0, 0.0), (800, 600), (800, 600)), Some((0, 0)));
        assert_eq!(cursor_to_pixel((400.7, 300.2), (800, 600), (800, 600)), Some((400, 300)));
        assert_eq!(cursor_to_pixel((799.9, 599.9), (800, 600), (800, 600)), Some((799, 599)));
    }

    #[test]
    fn test_cursor_to_pixel_hidpi() {
        assert_eq!(cursor_to_pixel((100.0, 50.0), (800, 600), (1600, 1200)), Some((200, 100)));
        assert_eq!(cursor_to_pixel((799.9, 599.9), (800, 600), (1600, 1200)), Some((1599, 1199)));
    }

    #[test]
    fn test_cursor_outside_window_is_rejected() {
        assert_eq!(cursor_to_pixel((-1.0, 10.0), (800, 600), (800, 600)), None);
        assert_eq!(cursor_to_pixel((10.0, 600.0), (800, 600), (800, 600)), None);
        assert_eq!(cursor_to_pixel((800.0, 10.0), (800, 600), (800, 600)), None);
        assert_eq!(cursor_to_pixel((10.0, 10.0), (0, 0), (0, 0)), None);
    }

    #[test]
    fn test_mouse_state_pixel() {
        let mut mouse = MouseState::new(800, 600);
        mouse.update_sizes((800, 600), (1600, 1200));
        mouse.update_position(400.0, 300.0);
        assert_eq!(mouse.pixel(), Some((800, 600)));

        mouse.update_position(900.0, 300.0);
        assert_eq!(mouse.pixel(), None);
    }
}
