pub mod annotation_loop;
pub mod infrastructure;
pub mod live_session;
pub mod session_logger;
