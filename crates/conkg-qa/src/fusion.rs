//! Reciprocal rank fusion of graph and vector evidence.
//!
//! `score(key) = w_g / (k + r_g) + w_v / (k + r_v)`, ranks starting at 1, a missing
//! side contributing nothing. Vector hits are keyed by their document id, so a
//! document found by both retrievers collapses into one source.

use std::collections::HashMap;

use conkg_core::entity::Entity;
use conkg_core::qa::{Source, SourceKind};
use conkg_core::vector::ChunkHit;

pub const RRF_K: f64 = 60.0;

#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub graph: f64,
    pub vector: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { graph: 1.0, vector: 1.0 }
    }
}

/// Fuse ranked graph entities with ranked chunk hits into one source list.
pub fn fuse(graph: &[Entity], vector: &[ChunkHit], weights: FusionWeights) -> Vec<Source> {
    let mut by_key: HashMap<String, Source> = HashMap::new();

    for (i, entity) in graph.iter().enumerate() {
        by_key.entry(entity.id.clone()).or_insert_with(|| Source {
            key: entity.id.clone(),
            kind: SourceKind::Graph,
            label: entity.name.clone(),
            score: 0.0,
            graph_rank: Some(i + 1),
            vector_rank: None,
            snippet: None,
        });
    }

    let mut vector_rank = 0;
    for hit in vector {
        let key = &hit.chunk.document_id;
        match by_key.get_mut(key) {
            Some(source) if source.vector_rank.is_some() => {}
            Some(source) => {
                vector_rank += 1;
                source.vector_rank = Some(vector_rank);
                source.kind = SourceKind::Both;
                source.snippet = Some(hit.chunk.text.clone());
            }
            None => {
                vector_rank += 1;
                by_key.insert(
                    key.clone(),
                    Source {
                        key: key.clone(),
                        kind: SourceKind::Vector,
                        label: key.clone(),
                        score: 0.0,
                        graph_rank: None,
                        vector_rank: Some(vector_rank),
                        snippet: Some(hit.chunk.text.clone()),
                    },
                );
            }
        }
    }

    let mut sources: Vec<Source> = by_key
        .into_values()
        .map(|mut s| {
            s.score = s.graph_rank.map_or(0.0, |r| weights.graph / (RRF_K + r as f64))
                + s.vector_rank.map_or(0.0, |r| weights.vector / (RRF_K + r as f64));
            s
        })
        .collect();
    sources.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    sources
}
