pub mod bounding_box;
pub mod constants;
pub mod frame;
pub mod ui_state;
