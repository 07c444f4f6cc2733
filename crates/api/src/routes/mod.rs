pub mod annotate;
pub mod transcript;
