//! Window management
//!
//! The benchmark window is a fixed-size surface matching the simulation
//! viewport.

use winit::window::Window;

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Bunnymark".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Create window attributes from config
pub fn window_attributes(config: &WindowConfig) -> winit::window::WindowAttributes {
    Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height))
        .with_resizable(config.resizable)
}
