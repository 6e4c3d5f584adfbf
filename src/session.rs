//! Interactive query session state machine.
//!
//! One session serves many queries over a fixed pipeline configuration:
//!
//! ```text
//! Idle -> AwaitingQuery -> Retrieving -> Assembling -> Generating
//!              ^                                           |
//!              |                                           v
//!              +----------- (answer / recoverable) <-- Streaming
//! ```
//!
//! `Closed` is terminal: the exit token, end of input, or a fatal
//! consistency failure all land there and the session accepts no further
//! turns. Every other failure returns the session to `AwaitingQuery`.

use std::sync::Arc;

use futures_util::StreamExt;

use crate::context::ContextAssembler;
use crate::generation::Generator;
use crate::retriever::Retriever;
use crate::types::RagError;

/// Word that ends the session, matched case-insensitively after trimming.
pub const EXIT_TOKEN: &str = "exit";

/// Where a session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingQuery,
    Retrieving,
    Assembling,
    Generating,
    Streaming,
    Closed,
}

/// Result of feeding one line of input to the session.
#[derive(Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A complete answer, accumulated from the streamed fragments.
    Answered(String),
    /// Input was empty after trimming; nothing ran.
    NoQuery,
    /// The exit token was received; the session is closed.
    Closed,
}

/// Drives retrieve, assemble, generate, and stream for successive queries.
pub struct QuerySession {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: Arc<dyn Generator>,
    top_k: usize,
    phase: SessionPhase,
}

impl QuerySession {
    pub fn new(
        retriever: Retriever,
        assembler: ContextAssembler,
        generator: Arc<dyn Generator>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
            top_k,
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn enter(&mut self, phase: SessionPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "session phase");
        self.phase = phase;
    }

    /// Runs one full turn for a line of user input.
    ///
    /// `forward` is invoked with each answer fragment as it arrives, so a
    /// caller can print tokens while the turn is still running. The complete
    /// answer is also returned in [`TurnOutcome::Answered`].
    ///
    /// A [`RagError::Consistency`] closes the session; any other error
    /// leaves it in `AwaitingQuery`, ready for the next query.
    pub async fn next_turn<F>(
        &mut self,
        input: &str,
        mut forward: F,
    ) -> Result<TurnOutcome, RagError>
    where
        F: FnMut(&str),
    {
        if self.phase == SessionPhase::Closed {
            return Ok(TurnOutcome::Closed);
        }

        let query = input.trim();
        if query.is_empty() {
            self.enter(SessionPhase::AwaitingQuery);
            return Ok(TurnOutcome::NoQuery);
        }
        if query.eq_ignore_ascii_case(EXIT_TOKEN) {
            self.enter(SessionPhase::Closed);
            return Ok(TurnOutcome::Closed);
        }

        self.enter(SessionPhase::Retrieving);
        let evidence = match self.retriever.retrieve(query, self.top_k).await {
            Ok(evidence) => evidence,
            Err(err @ RagError::Consistency { .. }) => {
                self.enter(SessionPhase::Closed);
                return Err(err);
            }
            Err(err) => {
                self.enter(SessionPhase::AwaitingQuery);
                return Err(err);
            }
        };

        self.enter(SessionPhase::Assembling);
        let context = self.assembler.assemble(&evidence);
        let prompt = self.assembler.render(&context, query);

        self.enter(SessionPhase::Generating);
        let mut stream = match self.generator.generate(&prompt).await {
            Ok(stream) => stream,
            Err(err) => {
                self.enter(SessionPhase::AwaitingQuery);
                return Err(err);
            }
        };

        self.enter(SessionPhase::Streaming);
        let mut answer = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(fragment) => {
                    forward(&fragment);
                    answer.push_str(&fragment);
                }
                Err(err) => {
                    // Mid-stream failures are recoverable; the partial
                    // answer is discarded.
                    self.enter(SessionPhase::AwaitingQuery);
                    return Err(err);
                }
            }
        }

        self.enter(SessionPhase::AwaitingQuery);
        Ok(TurnOutcome::Answered(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddings;
    use crate::stores::{MemoryVectorStore, VectorStore};
    use async_trait::async_trait;

    enum MockBehavior {
        /// Yield these fragments, then finish.
        Fragments(Vec<&'static str>),
        /// Fail before producing a stream at all.
        FailToStart,
        /// Yield one fragment, then fail mid-stream.
        FailMidStream,
    }

    struct MockGenerator {
        behavior: MockBehavior,
    }

    #[async_trait]
    impl Generator for MockGenerator {
        async fn generate(&self, _prompt: &str) -> Result<crate::generation::TokenStream, RagError> {
            match &self.behavior {
                MockBehavior::Fragments(fragments) => {
                    let fragments: Vec<String> =
                        fragments.iter().map(|s| s.to_string()).collect();
                    Ok(Box::pin(futures_util::stream::iter(
                        fragments.into_iter().map(Ok),
                    )))
                }
                MockBehavior::FailToStart => {
                    Err(RagError::Generation("model unavailable".into()))
                }
                MockBehavior::FailMidStream => Ok(Box::pin(futures_util::stream::iter(vec![
                    Ok("partial ".to_string()),
                    Err(RagError::Generation("connection dropped".into())),
                ]))),
            }
        }
    }

    fn session(behavior: MockBehavior) -> QuerySession {
        let retriever = Retriever::new(
            Arc::new(MockEmbeddings::default()),
            Arc::new(MemoryVectorStore::new()),
        );
        QuerySession::new(
            retriever,
            ContextAssembler::new(8000),
            Arc::new(MockGenerator { behavior }),
            5,
        )
    }

    #[tokio::test]
    async fn answered_turn_accumulates_forwarded_fragments() {
        let mut session = session(MockBehavior::Fragments(vec!["Hello", ", ", "world"]));
        let mut forwarded = String::new();
        let outcome = session
            .next_turn("what is up?", |fragment| forwarded.push_str(fragment))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Answered("Hello, world".to_string()));
        assert_eq!(forwarded, "Hello, world");
        assert_eq!(session.phase(), SessionPhase::AwaitingQuery);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_query_turn() {
        let mut session = session(MockBehavior::Fragments(vec!["unused"]));
        let outcome = session.next_turn("   ", |_| {}).await.unwrap();
        assert_eq!(outcome, TurnOutcome::NoQuery);
        assert_eq!(session.phase(), SessionPhase::AwaitingQuery);
    }

    #[tokio::test]
    async fn exit_token_closes_regardless_of_case() {
        let mut session = session(MockBehavior::Fragments(vec!["unused"]));
        let outcome = session.next_turn("  EXIT ", |_| {}).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Closed);
        assert_eq!(session.phase(), SessionPhase::Closed);

        // A closed session accepts no further turns.
        let outcome = session.next_turn("another question", |_| {}).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Closed);
    }

    #[tokio::test]
    async fn generation_startup_failure_is_recoverable() {
        let mut session = session(MockBehavior::FailToStart);
        let err = session.next_turn("question", |_| {}).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(session.phase(), SessionPhase::AwaitingQuery);

        // The session still serves the next turn.
        let outcome = session.next_turn("", |_| {}).await.unwrap();
        assert_eq!(outcome, TurnOutcome::NoQuery);
    }

    #[tokio::test]
    async fn mid_stream_failure_discards_the_partial_answer() {
        let mut session = session(MockBehavior::FailMidStream);
        let mut forwarded = String::new();
        let err = session
            .next_turn("question", |fragment| forwarded.push_str(fragment))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(forwarded, "partial ");
        assert_eq!(session.phase(), SessionPhase::AwaitingQuery);
    }

    #[tokio::test]
    async fn consistency_failure_closes_the_session() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert(crate::stores::IndexEntry {
                id: "a_chunk_0".to_string(),
                vector: vec![1.0, 0.0, 0.0],
                payload: crate::stores::EntryPayload {
                    source_id: "a".to_string(),
                    content: "stored with three dimensions".to_string(),
                },
            })
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(MockEmbeddings::default()), store);
        let mut session = QuerySession::new(
            retriever,
            ContextAssembler::new(8000),
            Arc::new(MockGenerator {
                behavior: MockBehavior::Fragments(vec!["unused"]),
            }),
            5,
        );

        let err = session.next_turn("question", |_| {}).await.unwrap_err();
        assert!(matches!(err, RagError::Consistency { .. }));
        assert_eq!(session.phase(), SessionPhase::Closed);
    }
}
