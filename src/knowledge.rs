//! Knowledge retrieval — narrow external interface
//!
//! `retrieve(query, options) -> results` behind a single async-trait
//! method, per the one-method-for-providers convention. Concrete
//! retrievers (keyword, vector, hybrid, graph) bind at registration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalOptions {
    pub limit: usize,
    pub filter: Option<String>,
}

#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, options: RetrievalOptions) -> anyhow::Result<Vec<RetrievalResult>>;
}

/// Word-overlap ratio against each chunk's content.
pub struct KeywordRetriever {
    chunks: Vec<Chunk>,
}

impl KeywordRetriever {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    fn overlap_score(query_words: &[String], content: &str) -> f64 {
        if query_words.is_empty() {
            return 0.0;
        }
        let content_lower = content.to_lowercase();
        let hits = query_words.iter().filter(|w| content_lower.contains(w.as_str())).count();
        hits as f64 / query_words.len() as f64
    }
}

#[async_trait]
impl KnowledgeRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, options: RetrievalOptions) -> anyhow::Result<Vec<RetrievalResult>> {
        let words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
        let mut scored: Vec<RetrievalResult> = self
            .chunks
            .iter()
            .map(|c| RetrievalResult { chunk: c.clone(), score: Self::overlap_score(&words, &c.content) })
            .filter(|r| r.score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let limit = if options.limit == 0 { scored.len() } else { options.limit };
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Cosine similarity over an injected embedding function. The embedding
/// provider itself is out of scope; this retriever only needs a closure.
pub struct VectorRetriever {
    chunks: Vec<(Chunk, Vec<f32>)>,
    embed: Box<dyn Fn(&str) -> Vec<f32> + Send + Sync>,
}

impl VectorRetriever {
    pub fn new(chunks: Vec<(Chunk, Vec<f32>)>, embed: Box<dyn Fn(&str) -> Vec<f32> + Send + Sync>) -> Self {
        Self { chunks, embed }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f64 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            (dot / (norm_a * norm_b)) as f64
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for VectorRetriever {
    async fn retrieve(&self, query: &str, options: RetrievalOptions) -> anyhow::Result<Vec<RetrievalResult>> {
        let query_vec = (self.embed)(query);
        let mut scored: Vec<RetrievalResult> = self
            .chunks
            .iter()
            .map(|(c, v)| RetrievalResult { chunk: c.clone(), score: Self::cosine(&query_vec, v) })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let limit = if options.limit == 0 { scored.len() } else { options.limit };
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Reciprocal rank fusion of two ranked lists: `sum(weight / (rank + 1))`.
pub struct HybridRetriever {
    keyword: KeywordRetriever,
    vector: VectorRetriever,
    keyword_weight: f64,
    vector_weight: f64,
}

impl HybridRetriever {
    pub fn new(keyword: KeywordRetriever, vector: VectorRetriever) -> Self {
        Self { keyword, vector, keyword_weight: 0.4, vector_weight: 0.6 }
    }

    pub fn with_weights(mut self, keyword_weight: f64, vector_weight: f64) -> Self {
        self.keyword_weight = keyword_weight;
        self.vector_weight = vector_weight;
        self
    }
}

#[async_trait]
impl KnowledgeRetriever for HybridRetriever {
    async fn retrieve(&self, query: &str, options: RetrievalOptions) -> anyhow::Result<Vec<RetrievalResult>> {
        let keyword_ranked = self.keyword.retrieve(query, RetrievalOptions { limit: 0, filter: None }).await?;
        let vector_ranked = self.vector.retrieve(query, RetrievalOptions { limit: 0, filter: None }).await?;

        let mut fused: std::collections::HashMap<String, (Chunk, f64)> = std::collections::HashMap::new();
        for (rank, r) in keyword_ranked.into_iter().enumerate() {
            let entry = fused.entry(r.chunk.id.clone()).or_insert((r.chunk.clone(), 0.0));
            entry.1 += self.keyword_weight / (rank as f64 + 1.0);
        }
        for (rank, r) in vector_ranked.into_iter().enumerate() {
            let entry = fused.entry(r.chunk.id.clone()).or_insert((r.chunk.clone(), 0.0));
            entry.1 += self.vector_weight / (rank as f64 + 1.0);
        }

        let mut results: Vec<RetrievalResult> =
            fused.into_values().map(|(chunk, score)| RetrievalResult { chunk, score }).collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let limit = if options.limit == 0 { results.len() } else { options.limit };
        results.truncate(limit);
        Ok(results)
    }
}

/// Narrow interface a graph store binds to at registration: one method to
/// walk an entity's edges, one to resolve an entity back to its chunk. Two
/// methods, per the graph-store dynamic-dispatch convention.
pub trait GraphStore: Send + Sync {
    fn neighbors(&self, entity: &str) -> Vec<(String, f64)>;
    fn chunk_for(&self, entity: &str) -> Option<Chunk>;
}

/// Adjacency-map graph store: entities are string keys, edges carry a
/// weight, and each entity may have an associated chunk to surface when it
/// turns up in a traversal.
#[derive(Default)]
pub struct InMemoryGraphStore {
    adjacency: HashMap<String, Vec<(String, f64)>>,
    chunks: HashMap<String, Chunk>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&mut self, entity: impl Into<String>, chunk: Chunk) {
        self.chunks.insert(entity.into(), chunk);
    }

    /// Adds a directed edge; call twice (swap the ends) for an undirected one.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>, weight: f64) {
        self.adjacency.entry(from.into()).or_default().push((to.into(), weight));
    }
}

impl GraphStore for InMemoryGraphStore {
    fn neighbors(&self, entity: &str) -> Vec<(String, f64)> {
        self.adjacency.get(entity).cloned().unwrap_or_default()
    }

    fn chunk_for(&self, entity: &str) -> Option<Chunk> {
        self.chunks.get(entity).cloned()
    }
}

/// Entity→neighbor lookup: treats the query as a seed entity, walks its
/// edges out to `hops` steps, and scores each entity reached by the
/// product of edge weights along the best path to it.
pub struct GraphRetriever {
    store: Arc<dyn GraphStore>,
    hops: usize,
}

impl GraphRetriever {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store, hops: 1 }
    }

    pub fn with_hops(mut self, hops: usize) -> Self {
        self.hops = hops.max(1);
        self
    }
}

#[async_trait]
impl KnowledgeRetriever for GraphRetriever {
    async fn retrieve(&self, query: &str, options: RetrievalOptions) -> anyhow::Result<Vec<RetrievalResult>> {
        let mut best: HashMap<String, f64> = HashMap::new();
        let mut frontier: Vec<(String, f64)> = vec![(query.to_string(), 1.0)];

        for _ in 0..self.hops {
            let mut next = Vec::new();
            for (entity, weight) in &frontier {
                for (neighbor, edge_weight) in self.store.neighbors(entity) {
                    let score = weight * edge_weight;
                    let improved = match best.get(&neighbor) {
                        Some(existing) => score > *existing,
                        None => true,
                    };
                    if improved {
                        best.insert(neighbor.clone(), score);
                    }
                    next.push((neighbor, score));
                }
            }
            frontier = next;
        }

        let mut scored: Vec<RetrievalResult> = best
            .into_iter()
            .filter_map(|(entity, score)| self.store.chunk_for(&entity).map(|chunk| RetrievalResult { chunk, score }))
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let limit = if options.limit == 0 { scored.len() } else { options.limit };
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk { id: id.into(), content: content.into(), metadata: serde_json::Value::Null }
    }

    #[tokio::test]
    async fn graph_retriever_scores_one_hop_neighbors_by_edge_weight() {
        let mut store = InMemoryGraphStore::new();
        store.add_chunk("django", chunk("django", "Django web framework"));
        store.add_chunk("flask", chunk("flask", "Flask web framework"));
        store.add_edge("python", "django", 0.9);
        store.add_edge("python", "flask", 0.5);

        let retriever = GraphRetriever::new(Arc::new(store));
        let results = retriever.retrieve("python", RetrievalOptions::default()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "django");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn graph_retriever_with_no_edges_returns_empty() {
        let store = InMemoryGraphStore::new();
        let retriever = GraphRetriever::new(Arc::new(store));
        let results = retriever.retrieve("nothing", RetrievalOptions::default()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn two_hop_walk_reaches_second_degree_neighbors() {
        let mut store = InMemoryGraphStore::new();
        store.add_chunk("orm", chunk("orm", "ORM layer"));
        store.add_edge("python", "django", 0.9);
        store.add_edge("django", "orm", 0.8);
        store.add_chunk("django", chunk("django", "Django web framework"));

        let retriever = GraphRetriever::new(Arc::new(store)).with_hops(2);
        let results = retriever.retrieve("python", RetrievalOptions::default()).await.unwrap();
        assert!(results.iter().any(|r| r.chunk.id == "orm"));
    }

    #[tokio::test]
    async fn rrf_ranks_matching_documents_first() {
        let chunks = vec![
            chunk("d1", "Python programming language"),
            chunk("d2", "Java enterprise framework"),
            chunk("d3", "Python data science tutorial"),
        ];
        let keyword = KeywordRetriever::new(chunks.clone());
        let vector = VectorRetriever::new(
            chunks.into_iter().map(|c| (c, vec![1.0, 0.0])).collect(),
            Box::new(|_| vec![1.0, 0.0]),
        );
        let hybrid = HybridRetriever::new(keyword, vector);

        let results = hybrid.retrieve("Python programming", RetrievalOptions::default()).await.unwrap();
        let java_rank = results.iter().position(|r| r.chunk.id == "d2").unwrap();
        let python_rank = results.iter().position(|r| r.chunk.id == "d1").unwrap();
        assert!(python_rank < java_rank);
    }
}
