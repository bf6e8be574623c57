//! Pipeline orchestrator
//!
//! Ingestion: document -> chunks -> vectors -> index, skipped when the
//! session already holds the same document.
//! Query: question -> intent -> nearest chunks -> synthesized answer.
//!
//! Query stages are fail-soft. Each failure is logged, recorded on the
//! `Answer`, and replaced by an empty value, so a caller always gets text.

use crate::session::Session;
use docqa_common::config::PipelineConfig;
use docqa_common::context::{IntentExtractor, Synthesizer};
use docqa_common::errors::{Outcome, Result, Stage, StageFailure};
use docqa_common::{metrics, EmbeddingGateway};
use docqa_ingestion::{chunk_document, ChunkingConfig, Document, DocumentIdentity, PageExtractor};
use docqa_search::{Chunk, QueryResult, VectorIndex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// What `load` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// Session already held this document
    Unchanged,
    /// Index was dropped and rebuilt
    Reindexed { chunks: usize },
}

/// Result of one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Synthesized answer, empty when synthesis failed
    pub text: String,
    pub document: DocumentIdentity,
    pub reindexed: bool,
    /// Intent string used for retrieval
    pub intent: String,
    /// Retrieved facts, closest first
    pub facts: Vec<QueryResult>,
    /// Stages that degraded while answering
    pub degraded: Vec<StageFailure>,
}

impl Answer {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Retrieval-augmented QA over the document a session has loaded
pub struct Pipeline {
    extractor: Arc<dyn PageExtractor>,
    embeddings: EmbeddingGateway,
    index: VectorIndex,
    intent: IntentExtractor,
    synthesizer: Synthesizer,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn PageExtractor>,
        embeddings: EmbeddingGateway,
        index: VectorIndex,
        intent: IntentExtractor,
        synthesizer: Synthesizer,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            embeddings,
            index,
            intent,
            synthesizer,
            config,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Make the index reflect `document`.
    ///
    /// The session is cleared before the index is dropped and only records
    /// the document after a complete rebuild, so a failed rebuild is
    /// attempted again on the next load of any document.
    #[instrument(skip_all, fields(session = %session.id(), document = %document.identity))]
    pub async fn load(&self, session: &mut Session, document: &Document) -> Result<LoadStatus> {
        if !session.needs_reload(&document.identity) {
            return Ok(LoadStatus::Unchanged);
        }

        // The old document is gone once the drop runs; a rebuild that fails
        // or is cancelled must not leave it recorded as loaded.
        session.invalidate();

        let start = Instant::now();
        let chunks = self.rebuild(document).await.map_err(|e| {
            error!(error = %e, "Failed to rebuild index");
            e
        })?;

        session.record_load(document.identity.clone(), chunks);
        metrics::record_ingestion(start.elapsed().as_secs_f64(), chunks);
        info!(
            chunks,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document indexed"
        );
        Ok(LoadStatus::Reindexed { chunks })
    }

    /// Drop, chunk, embed, create, upsert
    async fn rebuild(&self, document: &Document) -> Result<usize> {
        self.index.drop().await?;

        let chunking = ChunkingConfig {
            chunk_length: self.config.chunk_length,
        };
        let text_chunks = chunk_document(document, &chunking);
        let texts: Vec<String> = text_chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embeddings.embed(&texts).await?;

        let chunks: Vec<Chunk> = text_chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Chunk {
                id: chunk.id,
                text: chunk.text,
                vector,
            })
            .collect();

        self.index.ensure_schema(chunks.len()).await?;
        self.index.upsert(&chunks).await?;
        Ok(chunks.len())
    }

    /// Answer `question` against `document`, reindexing first if needed
    #[instrument(skip_all, fields(session = %session.id(), document = %document.identity))]
    pub async fn answer(&self, session: &mut Session, document: &Document, question: &str) -> Answer {
        let start = Instant::now();
        let mut degraded = Vec::new();

        let reindexed = match self.load(session, document).await {
            Ok(status) => matches!(status, LoadStatus::Reindexed { .. }),
            Err(e) => {
                metrics::record_degraded(Stage::Ingest);
                degraded.push(StageFailure::new(Stage::Ingest, &e));
                false
            }
        };

        let intent = collect(self.intent.extract(question).await, &mut degraded);
        let query = if intent.is_empty() && self.config.intent_fallback_to_question {
            question
        } else {
            intent.as_str()
        };

        let facts = collect(self.retrieve(query).await, &mut degraded);
        let fact_texts: Vec<String> = facts.iter().map(|f| f.text.clone()).collect();
        let text = collect(
            self.synthesizer.synthesize(&fact_texts, question).await,
            &mut degraded,
        );

        metrics::record_query(start.elapsed().as_secs_f64(), facts.len(), !degraded.is_empty());
        info!(
            reindexed,
            fact_count = facts.len(),
            degraded = degraded.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );

        Answer {
            text,
            document: document.identity.clone(),
            reindexed,
            intent,
            facts,
            degraded,
        }
    }

    /// Extract `path` and answer against it.
    ///
    /// Only an unreadable file is an error; unreadable pages are empty.
    pub async fn answer_file(&self, session: &mut Session, path: &Path, question: &str) -> Result<Answer> {
        let document = self.extractor.extract(path).await?;
        Ok(self.answer(session, &document, question).await)
    }

    /// Embed the query and search; an embedding failure means no facts
    async fn retrieve(&self, query: &str) -> Outcome<Vec<QueryResult>> {
        match self.embeddings.embed_one(query).await {
            Ok(vector) => self.index.search(&vector, self.config.top_k).await,
            Err(e) => Outcome::from_result(Stage::Retrieve, Err(e)),
        }
    }
}

/// Unwrap an outcome, keeping its failure
fn collect<T>(outcome: Outcome<T>, degraded: &mut Vec<StageFailure>) -> T {
    if let Some(failure) = outcome.failure() {
        degraded.push(failure.clone());
    }
    outcome.into_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_common::completion::CompletionModel;
    use docqa_common::embeddings::{Embedder, MockEmbedder};
    use docqa_common::errors::AppError;
    use docqa_ingestion::IngestionError;
    use docqa_search::store::{IndexEntry, IndexSchema, KnnQuery, MemoryVectorStore, VectorStore};
    use docqa_search::IndexSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Store that logs every mutating call before delegating
    struct RecordingStore {
        inner: MemoryVectorStore,
        calls: Mutex<Vec<&'static str>>,
        fail_knn: bool,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryVectorStore::new(),
                calls: Mutex::new(Vec::new()),
                fail_knn: false,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn drop_index(&self, index: &str) -> Result<bool> {
            self.log("drop");
            self.inner.drop_index(index).await
        }

        async fn index_exists(&self, index: &str) -> Result<bool> {
            self.inner.index_exists(index).await
        }

        async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
            self.log("create");
            self.inner.create_index(index, schema).await
        }

        async fn put(&self, schema: &IndexSchema, entries: &[IndexEntry]) -> Result<()> {
            self.log("put");
            self.inner.put(schema, entries).await
        }

        async fn knn(&self, index: &str, query: &KnnQuery) -> Result<Vec<QueryResult>> {
            if self.fail_knn {
                return Err(AppError::IndexService {
                    message: "search module unavailable".to_string(),
                });
            }
            self.inner.knn(index, query).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Counts batch calls on top of the mock embedder
    struct CountingEmbedder {
        inner: MockEmbedder,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    /// Full-length chunks point east, shorter ones north, queries by keyword
    struct ScriptedEmbedder;

    impl ScriptedEmbedder {
        fn vector_for(text: &str) -> Vec<f32> {
            match text {
                "tail" => vec![0.05, 1.0],
                "head" => vec![1.0, 0.05],
                t if t.chars().count() >= 1000 => vec![1.0, 0.0],
                _ => vec![0.0, 1.0],
            }
        }
    }

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(Self::vector_for(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Fails any batch containing `poison`, records single-text queries
    #[derive(Default)]
    struct SelectiveEmbedder {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for SelectiveEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.queries.lock().unwrap().push(text.to_string());
            MockEmbedder::new(8).embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("poison")) {
                return Err(AppError::EmbeddingService {
                    message: "upstream rejected input".to_string(),
                });
            }
            MockEmbedder::new(8).embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            "selective"
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::EmbeddingService {
                message: "rate limited".to_string(),
            })
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::EmbeddingService {
                message: "rate limited".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Answers the intent prompt with a fixed keyword, echoes the rest
    struct KeywordModel(&'static str);

    #[async_trait]
    impl CompletionModel for KeywordModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.starts_with("Extract the main keywords") {
                Ok(format!("  {}  ", self.0))
            } else {
                Ok("answer from facts".to_string())
            }
        }

        fn model_name(&self) -> &str {
            "keyword"
        }
    }

    struct Unavailable;

    #[async_trait]
    impl CompletionModel for Unavailable {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(AppError::CompletionService {
                message: "connection refused".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "unavailable"
        }
    }

    struct StaticExtractor(Document);

    #[async_trait]
    impl PageExtractor for StaticExtractor {
        async fn extract(&self, path: &Path) -> std::result::Result<Document, IngestionError> {
            if path.ends_with("missing.pdf") {
                return Err(IngestionError::FileNotFound(path.display().to_string()));
            }
            Ok(self.0.clone())
        }
    }

    fn pipeline(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        document: Document,
    ) -> Pipeline {
        pipeline_with_config(store, embedder, model, document, PipelineConfig::default())
    }

    fn pipeline_with_config(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        document: Document,
        config: PipelineConfig,
    ) -> Pipeline {
        let dimension = embedder.dimension();
        Pipeline::new(
            Arc::new(StaticExtractor(document)),
            EmbeddingGateway::new(embedder),
            VectorIndex::new(store, IndexSettings::new("embeddings-index", "doc"), dimension),
            IntentExtractor::new(model.clone(), "Korean"),
            Synthesizer::new(model),
            config,
        )
    }

    fn syllabus() -> Document {
        Document::from_pages(
            "syllabus.pdf",
            vec!["Week 1: introduction. Week 8: midterm exam.".to_string()],
        )
    }

    fn two_pages_of_a() -> Document {
        Document::from_pages("a.pdf", vec!["A".repeat(1500), String::new()])
    }

    #[tokio::test]
    async fn test_same_document_loads_once() {
        let store = Arc::new(RecordingStore::new());
        let embedder = Arc::new(CountingEmbedder {
            inner: MockEmbedder::new(8),
            batches: AtomicUsize::new(0),
        });
        let pipeline = pipeline(store.clone(), embedder.clone(), Arc::new(KeywordModel("midterm")), syllabus());
        let mut session = Session::new();

        let first = pipeline.load(&mut session, &syllabus()).await.unwrap();
        let second = pipeline.load(&mut session, &syllabus()).await.unwrap();

        assert_eq!(first, LoadStatus::Reindexed { chunks: 1 });
        assert_eq!(second, LoadStatus::Unchanged);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        assert_eq!(store.calls().iter().filter(|c| **c == "put").count(), 1);
    }

    #[tokio::test]
    async fn test_new_document_drops_before_upsert() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(
            store.clone(),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(KeywordModel("midterm")),
            syllabus(),
        );
        let mut session = Session::new();

        pipeline.load(&mut session, &syllabus()).await.unwrap();
        pipeline.load(&mut session, &two_pages_of_a()).await.unwrap();

        assert_eq!(
            store.calls(),
            vec!["drop", "create", "put", "drop", "create", "put"]
        );
        assert_eq!(session.current_document(), Some(&two_pages_of_a().identity));
    }

    #[tokio::test]
    async fn test_end_to_end_returns_closest_chunk_first() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(
            store.clone(),
            Arc::new(ScriptedEmbedder),
            Arc::new(KeywordModel("tail")),
            two_pages_of_a(),
        );
        let mut session = Session::new();

        let answer = pipeline.answer(&mut session, &two_pages_of_a(), "끝부분은?").await;

        assert!(answer.reindexed);
        assert_eq!(session.chunk_count(), 2);
        assert_eq!(store.len().await, 2);
        assert_eq!(answer.intent, "tail");
        assert_eq!(answer.facts.len(), 2);
        assert_eq!(answer.facts[0].text, "A".repeat(500));
        assert_eq!(answer.facts[1].text.len(), 1000);
        assert_eq!(answer.text, "answer from facts");
        assert!(!answer.is_degraded());

        let again = pipeline.answer(&mut session, &two_pages_of_a(), "끝부분은?").await;
        assert!(!again.reindexed);
    }

    #[tokio::test]
    async fn test_completion_unavailable_still_answers() {
        let pipeline = pipeline(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(Unavailable),
            syllabus(),
        );
        let mut session = Session::new();

        let answer = pipeline.answer(&mut session, &syllabus(), "When is the midterm?").await;

        assert_eq!(answer.text, "");
        assert_eq!(answer.intent, "");
        // Empty intent falls back to the question, so retrieval still works
        assert_eq!(answer.facts.len(), 1);
        let stages: Vec<Stage> = answer.degraded.iter().map(|f| f.stage).collect();
        assert_eq!(stages, vec![Stage::Intent, Stage::Synthesize]);
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_no_facts() {
        let mut store = RecordingStore::new();
        store.fail_knn = true;
        let pipeline = pipeline(
            Arc::new(store),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(KeywordModel("midterm")),
            syllabus(),
        );
        let mut session = Session::new();

        let answer = pipeline.answer(&mut session, &syllabus(), "When is the midterm?").await;

        assert!(answer.facts.is_empty());
        assert_eq!(answer.text, "answer from facts");
        assert_eq!(answer.degraded.len(), 1);
        assert_eq!(answer.degraded[0].stage, Stage::Retrieve);
    }

    #[tokio::test]
    async fn test_failed_rebuild_is_retried() {
        let pipeline = pipeline(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(FailingEmbedder),
            Arc::new(KeywordModel("midterm")),
            syllabus(),
        );
        let mut session = Session::new();

        assert!(pipeline.load(&mut session, &syllabus()).await.is_err());
        assert!(session.current_document().is_none());

        let answer = pipeline.answer(&mut session, &syllabus(), "When is the midterm?").await;
        assert!(!answer.reindexed);
        let stages: Vec<Stage> = answer.degraded.iter().map(|f| f.stage).collect();
        assert_eq!(stages, vec![Stage::Ingest, Stage::Retrieve]);
    }

    #[tokio::test]
    async fn test_answer_file() {
        let pipeline = pipeline(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(KeywordModel("midterm")),
            syllabus(),
        );
        let mut session = Session::new();

        let answer = pipeline
            .answer_file(&mut session, Path::new("/tmp/syllabus.pdf"), "When is the midterm?")
            .await
            .unwrap();
        assert_eq!(answer.document.name(), "syllabus.pdf");

        let missing = pipeline
            .answer_file(&mut session, Path::new("/tmp/missing.pdf"), "?")
            .await;
        assert!(matches!(missing, Err(AppError::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_failed_switch_does_not_strand_previous_document() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(
            store.clone(),
            Arc::new(SelectiveEmbedder::default()),
            Arc::new(KeywordModel("midterm")),
            syllabus(),
        );
        let mut session = Session::new();
        let poisoned = Document::from_pages("poison.pdf", vec!["poison page".to_string()]);

        pipeline.load(&mut session, &syllabus()).await.unwrap();
        assert!(pipeline.load(&mut session, &poisoned).await.is_err());
        assert!(session.current_document().is_none());

        let status = pipeline.load(&mut session, &syllabus()).await.unwrap();
        assert_eq!(status, LoadStatus::Reindexed { chunks: 1 });
        assert_eq!(store.len().await, 1);

        let answer = pipeline.answer(&mut session, &syllabus(), "When is the midterm?").await;
        assert_eq!(answer.facts.len(), 1);
        assert!(!answer.is_degraded());
    }

    #[tokio::test]
    async fn test_empty_intent_without_fallback_embeds_empty_string() {
        let embedder = Arc::new(SelectiveEmbedder::default());
        let config = PipelineConfig {
            intent_fallback_to_question: false,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with_config(
            Arc::new(MemoryVectorStore::new()),
            embedder.clone(),
            Arc::new(Unavailable),
            syllabus(),
            config,
        );
        let mut session = Session::new();

        let answer = pipeline.answer(&mut session, &syllabus(), "When is the midterm?").await;

        assert_eq!(answer.intent, "");
        assert_eq!(*embedder.queries.lock().unwrap(), vec![String::new()]);
        assert_eq!(answer.text, "");
    }

    #[tokio::test]
    async fn test_empty_intent_with_fallback_embeds_question() {
        let embedder = Arc::new(SelectiveEmbedder::default());
        let pipeline = pipeline(
            Arc::new(MemoryVectorStore::new()),
            embedder.clone(),
            Arc::new(Unavailable),
            syllabus(),
        );
        let mut session = Session::new();

        pipeline.answer(&mut session, &syllabus(), "When is the midterm?").await;

        assert_eq!(
            *embedder.queries.lock().unwrap(),
            vec!["When is the midterm?".to_string()]
        );
    }
}
