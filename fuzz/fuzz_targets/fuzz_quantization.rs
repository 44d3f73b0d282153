#![no_main]
use libfuzzer_sys::fuzz_target;
use quantmem::{ProductCodec, ProductConfig};

fuzz_target!(|data: &[u8]| {
    let mut codec = match ProductCodec::new(8, ProductConfig::new(2, 4)) {
        Ok(c) => c,
        Err(_) => return,
    };
    let _ = codec.load_codebook_bytes(data);
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = codec.import_codebook(text);
    }
});
