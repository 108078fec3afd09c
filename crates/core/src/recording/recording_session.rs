/// Encoded chunks for one recording, kept in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSession {
    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty chunks carry no bytes and are skipped.
    pub fn append(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn extend(&mut self, chunks: impl IntoIterator<Item = Vec<u8>>) {
        for chunk in chunks {
            self.append(chunk);
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenates all chunks and releases them.
    pub fn finalize(&mut self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(self.byte_len());
        for chunk in self.chunks.drain(..) {
            blob.extend_from_slice(&chunk);
        }
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_concatenates_in_order() {
        let mut session = RecordingSession::new();
        session.append(b"c1".to_vec());
        session.append(b"c2".to_vec());
        session.append(b"c3".to_vec());
        assert_eq!(session.finalize(), b"c1c2c3");
    }

    #[test]
    fn test_finalize_releases_chunks() {
        let mut session = RecordingSession::new();
        session.extend(vec![vec![1, 2], vec![3]]);
        assert_eq!(session.byte_len(), 3);
        session.finalize();
        assert_eq!(session.chunk_count(), 0);
        assert!(session.finalize().is_empty());
    }

    #[test]
    fn test_empty_chunks_are_skipped() {
        let mut session = RecordingSession::new();
        session.extend(vec![vec![], vec![7], vec![]]);
        assert_eq!(session.chunk_count(), 1);
    }
}
