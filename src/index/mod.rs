//! Distance functions and the quantization codecs built on them.

pub mod distance;
pub mod quantization;
