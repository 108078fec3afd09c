pub mod capture_feed;
pub mod detection_slot;
