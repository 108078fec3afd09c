pub mod render_targets;
pub mod snapshot_writer;
pub mod surface;
