#![no_main]
use libfuzzer_sys::fuzz_target;
use quantmem::QuantizedVectorStore;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(mut store) = QuantizedVectorStore::import(json) {
        // Anything that imports must be searchable without panicking.
        let query = vec![0.5; store.dimension()];
        let _ = store.search(&query, 3, None);
        let _ = store.stats();
    }
});
