use crate::error::{Result, VectorStoreError};
use crate::paths::write_atomic;
use crate::types::StoredId;
use std::path::Path;

/// Narrow contract of a nearest-neighbour index over fixed-dimension vectors.
///
/// Ids are assigned by the index and never reused. Dropping the index releases it.
pub trait VectorIndex: Send + Sync + Sized {
    /// Empty index of the given dimension
    fn create(dimension: usize) -> Result<Self>;

    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `count` vectors laid out back to back in `vectors`
    fn add(&mut self, vectors: &[f32], count: usize) -> Result<Vec<StoredId>>;

    /// Up to `k` nearest neighbours of `query`, best first
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(StoredId, f32)>>;

    fn save(&self, path: &Path) -> Result<()>;

    /// Replace the contents with the index stored at `path`
    fn load(&mut self, path: &Path) -> Result<()>;
}

const INDEX_MAGIC: &[u8; 4] = b"FL2I";
const HEADER_LEN: usize = 16;

/// Exact index: squared L2 distance over a flat scan.
///
/// Ids are insertion positions, so results can be joined back to metadata by id.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: usize,
    values: Vec<f32>,
}

impl FlatL2Index {
    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.values.len() * 4);
        out.extend_from_slice(INDEX_MAGIC);
        #[allow(clippy::cast_possible_truncation)]
        let dim = self.dimension as u32;
        out.extend_from_slice(&dim.to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn decode(bytes: &[u8], expected_dimension: usize) -> Result<Vec<f32>> {
        let corrupt = |reason: &str| VectorStoreError::IndexError(format!("corrupt index file: {reason}"));

        if bytes.len() < HEADER_LEN || &bytes[0..4] != INDEX_MAGIC {
            return Err(corrupt("bad header"));
        }
        let dim = u32::from_le_bytes(bytes[4..8].try_into().map_err(|_| corrupt("dimension"))?) as usize;
        if dim != expected_dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: expected_dimension,
                actual: dim,
            });
        }
        let count = u64::from_le_bytes(bytes[8..16].try_into().map_err(|_| corrupt("count"))?);
        let count = usize::try_from(count).map_err(|_| corrupt("count overflow"))?;
        let expected_len = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| corrupt("size overflow"))?;
        if bytes.len() != expected_len {
            return Err(corrupt("truncated payload"));
        }

        Ok(bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect())
    }
}

impl VectorIndex for FlatL2Index {
    fn create(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "index dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            values: Vec::new(),
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.values.len() / self.dimension
    }

    fn add(&mut self, vectors: &[f32], count: usize) -> Result<Vec<StoredId>> {
        let expected = count.checked_mul(self.dimension).ok_or_else(|| {
            VectorStoreError::IndexError(format!("vector count {count} overflows"))
        })?;
        if vectors.len() != expected {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: if count == 0 { vectors.len() } else { vectors.len() / count },
            });
        }

        let start = self.len() as StoredId;
        self.values.extend_from_slice(vectors);
        Ok((0..count as StoredId).map(|i| start + i).collect())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(StoredId, f32)>> {
        self.check_dimension(query.len())?;

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(StoredId, f32)> = self
            .values
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, vector)| {
                let distance: f32 = vector
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (id as StoredId, distance)
            })
            .collect();

        // Ascending distance, ties by insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored)
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.encode())?;
        log::debug!(
            "Saved index to {:?} ({} vectors, dimension {})",
            path,
            self.len(),
            self.dimension
        );
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.values = Self::decode(&bytes, self.dimension)?;
        log::debug!("Loaded index from {:?} ({} vectors)", path, self.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_and_search() {
        let mut index = FlatL2Index::create(3).unwrap();

        let ids = index
            .add(&[1.0, 0.0, 0.0, 0.9, 0.1, 0.0, 0.0, 1.0, 0.0], 3)
            .unwrap();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(index.len(), 3);

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);

        // First result should be id=0 (exact match)
        assert_eq!(results[0].0, 0);
        assert!(results[0].1.abs() < 1e-6);

        // Second should be id=1 (close)
        assert_eq!(results[1].0, 1);
        assert!(results[1].1 < 0.05);
    }

    #[test]
    fn test_ids_keep_increasing() {
        let mut index = FlatL2Index::create(2).unwrap();
        assert_eq!(index.add(&[0.0, 0.0], 1).unwrap(), vec![0]);
        assert_eq!(index.add(&[1.0, 1.0, 2.0, 2.0], 2).unwrap(), vec![1, 2]);
        assert!(index.add(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatL2Index::create(3).unwrap();
        let result = index.add(&[1.0, 0.0], 1); // Wrong dimension
        assert!(result.is_err());
        assert!(index.is_empty());

        index.add(&[1.0, 0.0, 0.0], 1).unwrap();
        let result = index.search(&[1.0, 0.0], 1); // Wrong query dimension
        assert!(result.is_err());
    }

    #[test]
    fn test_k_is_capped_and_zero_is_empty() {
        let mut index = FlatL2Index::create(1).unwrap();
        assert!(index.search(&[0.0], 5).unwrap().is_empty());
        index.add(&[1.0, 2.0], 2).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip_preserves_results() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.bin");

        let mut index = FlatL2Index::create(2).unwrap();
        index.add(&[0.1, 0.2, 0.5, 0.5, 0.9, 0.8], 3).unwrap();
        index.save(&path).unwrap();

        let mut restored = FlatL2Index::create(2).unwrap();
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(
            index.search(&[0.4, 0.4], 3).unwrap(),
            restored.search(&[0.4, 0.4], 3).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_garbage_and_wrong_dimension() {
        let temp = TempDir::new().unwrap();
        let garbage = temp.path().join("garbage.bin");
        std::fs::write(&garbage, b"definitely not an index").unwrap();

        let mut index = FlatL2Index::create(2).unwrap();
        assert!(index.load(&garbage).is_err());

        let other = temp.path().join("dim3.bin");
        let mut three = FlatL2Index::create(3).unwrap();
        three.add(&[1.0, 2.0, 3.0], 1).unwrap();
        three.save(&other).unwrap();
        assert!(matches!(
            index.load(&other),
            Err(VectorStoreError::InvalidDimension { expected: 2, actual: 3 })
        ));
        assert!(index.is_empty());
    }
}
