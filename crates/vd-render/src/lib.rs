pub mod hit;
pub mod paint;

pub use hit::{hit_point, hit_rect};
pub use paint::{Paint, PaintOp, Painter, Recorder, draw_shape, paint_scene, resolve_prop};
