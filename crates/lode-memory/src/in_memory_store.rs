use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

#[derive(Clone, Serialize, Deserialize)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Default)]
struct Points {
    ordered: Vec<StoredPoint>,
    positions: HashMap<String, usize>,
}

impl Points {
    fn from_ordered(ordered: Vec<StoredPoint>) -> Self {
        let positions = ordered
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Self { ordered, positions }
    }
}

/// Exhaustive cosine-similarity store. Points keep insertion order, which also
/// breaks score ties.
pub struct InMemoryVectorStore {
    points: RwLock<Points>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            points: RwLock::new(Points::default()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(&self, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let mut store = self
                .points
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            for p in points {
                let stored = StoredPoint {
                    id: p.id,
                    vector: p.vector,
                    payload: p.payload,
                };
                if let Some(&pos) = store.positions.get(&stored.id) {
                    store.ordered[pos] = stored;
                } else {
                    let pos = store.ordered.len();
                    store.positions.insert(stored.id.clone(), pos);
                    store.ordered.push(stored);
                }
            }
            Ok(())
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        Box::pin(async move {
            let store = self
                .points
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let mut scored: Vec<ScoredVectorPoint> = store
                .ordered
                .iter()
                .map(|sp| ScoredVectorPoint {
                    id: sp.id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            // Stable sort: equal scores stay in insertion order, NaN ranks last.
            scored.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
            scored.truncate(limit);
            Ok(scored)
        })
    }

    fn len(&self) -> usize {
        self.points.read().map_or(0, |p| p.ordered.len())
    }

    fn serialize(&self) -> Result<Vec<u8>, VectorStoreError> {
        let store = self
            .points
            .read()
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        serde_json::to_vec(&store.ordered).map_err(|e| VectorStoreError::Serialization(e.to_string()))
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, VectorStoreError> {
        let ordered: Vec<StoredPoint> = serde_json::from_slice(bytes)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        Ok(Self {
            points: RwLock::new(Points::from_ordered(ordered)),
        })
    }
}
