pub mod canvas;

pub use canvas::__path_handle_canvas_img;
pub use canvas::{handle_canvas_img, CanvasRequest, CanvasResponse, ErrorResponse};
