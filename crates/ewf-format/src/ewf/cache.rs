//! The single-chunk read cache
//!
//! Grounded on `original_source/libewf/libewf_chunk_cache.c`: the read path
//! decompresses at most one chunk at a time into a reused buffer, so
//! sequential reads that land inside the same chunk don't pay for a second
//! decompress. The cache invalidates whenever a different chunk is
//! requested or the scratch buffer has to grow to fit a larger raw read.

/// Caches the most recently decompressed chunk
#[derive(Debug, Default)]
pub struct ChunkCache {
    /// Index of the cached chunk, or `None` if the cache is empty/invalid
    cached_index: Option<usize>,
    /// Inflated payload; `valid_len` bytes of `buffer` are meaningful
    buffer: Vec<u8>,
    valid_len: usize,
    /// Grow-only raw scratch buffer used to stage a chunk's on-disk bytes
    /// before decompression
    scratch: Vec<u8>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `chunk_index` already resident?
    pub fn hit(&self, chunk_index: usize) -> bool {
        self.cached_index == Some(chunk_index)
    }

    /// The cached chunk's inflated payload, if `chunk_index` is resident
    pub fn get(&self, chunk_index: usize) -> Option<&[u8]> {
        if self.hit(chunk_index) {
            Some(&self.buffer[..self.valid_len])
        } else {
            None
        }
    }

    /// Install freshly decompressed data as the cache's contents
    pub fn store(&mut self, chunk_index: usize, data: &[u8]) {
        if self.buffer.len() < data.len() {
            self.buffer.resize(data.len(), 0);
        }
        self.buffer[..data.len()].copy_from_slice(data);
        self.valid_len = data.len();
        self.cached_index = Some(chunk_index);
    }

    /// Borrow the scratch buffer as a `&mut Vec<u8>` resized to at least
    /// `min_len`, for staging a chunk's raw on-disk bytes before decoding
    pub fn scratch_mut(&mut self, min_len: usize) -> &mut Vec<u8> {
        if self.scratch.len() < min_len {
            self.scratch.resize(min_len, 0);
        }
        &mut self.scratch
    }

    /// Drop the cached chunk without touching the scratch buffer's capacity
    pub fn invalidate(&mut self) {
        self.cached_index = None;
        self.valid_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let mut cache = ChunkCache::new();
        assert!(!cache.hit(3));
        cache.store(3, b"abcd");
        assert!(cache.hit(3));
        assert_eq!(cache.get(3), Some(&b"abcd"[..]));
        assert!(!cache.hit(4));
    }

    #[test]
    fn store_overwrites_previous_chunk() {
        let mut cache = ChunkCache::new();
        cache.store(1, b"first-chunk-data");
        cache.store(2, b"second");
        assert!(!cache.hit(1));
        assert_eq!(cache.get(2), Some(&b"second"[..]));
    }

    #[test]
    fn scratch_buffer_grows_but_never_shrinks() {
        let mut cache = ChunkCache::new();
        cache.scratch_mut(64).resize(64, 0);
        assert_eq!(cache.scratch_mut(32).len(), 64);
        cache.scratch_mut(128);
        assert!(cache.scratch_mut(0).len() >= 128);
    }

    #[test]
    fn invalidate_clears_hit_state() {
        let mut cache = ChunkCache::new();
        cache.store(5, b"data");
        cache.invalidate();
        assert!(!cache.hit(5));
        assert_eq!(cache.get(5), None);
    }
}
