pub mod capture_source;
pub mod chunk_encoder;
