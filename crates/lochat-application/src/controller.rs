//! Conversation controller.
//!
//! Drives one turn at a time through `Idle → AwaitingResponse → Streaming
//! → Idle`. The UI loop pulls progress via [`ConversationController::next_event`];
//! nothing is consumed on a background thread, so the controller owns the
//! only in-progress assistant message at any moment.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use lochat_core::config::AppConfig;
use lochat_core::error::{ChatError, Result};
use lochat_core::session::{SessionContext, TurnPhase};
use lochat_core::transcript::{HistoryRepository, Message, Transcript};
use lochat_infrastructure::extract;
use lochat_interaction::{ChatTurnRequest, ModelClient, StreamEvent};

use crate::markdown;

/// Progress of the current turn, as seen by the UI loop.
#[derive(Debug)]
pub enum TurnProgress {
    /// A fragment arrived; the assistant message grew by this much.
    Fragment(String),
    /// The turn completed; carries the finalized assistant text.
    Completed {
        text: String,
        /// Set when the transcript could not be persisted afterwards.
        persist_error: Option<ChatError>,
    },
    /// The turn failed; the partial content was finalized with the error.
    Failed { partial: String, error: ChatError },
}

/// The fragment stream currently being consumed.
struct InFlight {
    rx: mpsc::Receiver<StreamEvent>,
    partial: String,
}

/// Orchestrates turns: appends user messages, consumes the fragment
/// stream, finalizes assistant messages, and persists the transcript list.
pub struct ConversationController {
    history: Arc<dyn HistoryRepository>,
    client: Arc<dyn ModelClient>,
    context: SessionContext,
    transcripts: Vec<Transcript>,
    in_flight: Option<InFlight>,
    fragment_timeout: Duration,
}

impl ConversationController {
    /// Creates a controller for one session, loading the user's history.
    pub async fn new(
        history: Arc<dyn HistoryRepository>,
        client: Arc<dyn ModelClient>,
        config: &AppConfig,
        user_id: String,
    ) -> Self {
        let transcripts = history.load(&user_id).await;
        let context = SessionContext::new(
            user_id,
            config.default_model.as_str(),
            config.system_prompt.as_str(),
        );

        Self {
            history,
            client,
            context,
            transcripts,
            in_flight: None,
            fragment_timeout: Duration::from_secs(config.fragment_timeout_secs),
        }
    }

    /// Starts a new turn for `input`.
    ///
    /// A stream still in flight from a previous submission is preempted:
    /// its remaining fragments are discarded and never reach the
    /// transcript. The cached file context (if any) attaches to this turn
    /// and is cleared.
    pub async fn begin_turn(&mut self, input: &str) {
        if self.in_flight.take().is_some() {
            tracing::debug!("discarding in-flight stream for a new submission");
            self.context.phase = TurnPhase::Idle;
        }

        let index = match self.context.active {
            Some(index) => index,
            None => {
                self.transcripts.push(Transcript::new(&self.context.model));
                let index = self.transcripts.len() - 1;
                self.context.active = Some(index);
                index
            }
        };

        let file_context = self.context.take_file_context();
        self.transcripts[index].push(Message::user(input, file_context));

        let request = ChatTurnRequest::new(
            self.context.model.as_str(),
            self.context.system_prompt.as_str(),
            self.transcripts[index].messages.clone(),
        );

        let rx = self.client.chat_stream(request).await;
        self.in_flight = Some(InFlight {
            rx,
            partial: String::new(),
        });
        self.context.phase = TurnPhase::AwaitingResponse;
    }

    /// Pulls the next piece of turn progress.
    ///
    /// Returns `None` when no turn is in flight. Each fragment is awaited
    /// with a bounded wait; exceeding it fails the turn with `Timeout`.
    /// Terminal events finalize the assistant message and persist the
    /// transcript before returning.
    pub async fn next_event(&mut self) -> Option<TurnProgress> {
        let in_flight = self.in_flight.as_mut()?;

        match timeout(self.fragment_timeout, in_flight.rx.recv()).await {
            Ok(Some(StreamEvent::Content(fragment))) => {
                self.context.phase = TurnPhase::Streaming;
                in_flight.partial.push_str(&fragment);
                Some(TurnProgress::Fragment(fragment))
            }
            // A closed channel without a terminal event means the producer
            // went away after the last fragment; treat it as completion.
            Ok(Some(StreamEvent::Done)) | Ok(None) => {
                let partial = self.take_partial();
                let (text, persist_error) = self.finalize(partial, None).await;
                Some(TurnProgress::Completed {
                    text,
                    persist_error,
                })
            }
            Ok(Some(StreamEvent::Error(error))) => Some(self.fail_turn(error).await),
            Err(_) => {
                let error = ChatError::Timeout {
                    seconds: self.fragment_timeout.as_secs(),
                };
                Some(self.fail_turn(error).await)
            }
        }
    }

    /// User-initiated stop: keeps whatever content accumulated as the
    /// finalized assistant message and persists it.
    pub async fn stop_generation(&mut self) -> Option<TurnProgress> {
        self.in_flight.as_ref()?;
        let partial = self.take_partial();
        let (text, persist_error) = self.finalize(partial, None).await;
        Some(TurnProgress::Completed {
            text,
            persist_error,
        })
    }

    async fn fail_turn(&mut self, error: ChatError) -> TurnProgress {
        let partial = self.take_partial();
        let (partial, _) = self.finalize(partial, Some(error.clone())).await;
        TurnProgress::Failed { partial, error }
    }

    fn take_partial(&mut self) -> String {
        self.in_flight
            .take()
            .map(|in_flight| in_flight.partial)
            .unwrap_or_default()
    }

    /// Appends the finalized assistant message, stamps the transcript, and
    /// saves the full list. Returns the normalized text and any
    /// persistence error.
    async fn finalize(
        &mut self,
        partial: String,
        error: Option<ChatError>,
    ) -> (String, Option<ChatError>) {
        let text = markdown::normalize_code_blocks(&partial);

        if let Some(index) = self.context.active {
            let mut message = Message::assistant(text.clone());
            if let Some(error) = &error {
                message = message.with_error(error.to_string());
            }
            let model = self.context.model.clone();
            let transcript = &mut self.transcripts[index];
            transcript.push(message);
            transcript.touch(&model);
        }

        self.context.phase = TurnPhase::Idle;

        let persist_error = self.persist().await.err();
        if let Some(error) = &persist_error {
            tracing::error!("Failed to persist history: {}", error);
        }

        (text, persist_error)
    }

    async fn persist(&self) -> Result<()> {
        self.history
            .save(&self.context.user_id, &self.transcripts)
            .await
    }

    // ========================================================================
    // Transcript and session management
    // ========================================================================

    /// Starts a fresh conversation; the next submission creates a new
    /// transcript. Cancels any in-flight stream without finalizing it.
    pub fn new_chat(&mut self) {
        self.in_flight = None;
        self.context.phase = TurnPhase::Idle;
        self.context.active = None;
        self.context.file_context = None;
    }

    /// Makes a saved transcript the active conversation.
    pub fn load_chat(&mut self, index: usize) -> Result<()> {
        if index >= self.transcripts.len() {
            return Err(ChatError::not_found("transcript", index.to_string()));
        }
        self.in_flight = None;
        self.context.phase = TurnPhase::Idle;
        self.context.active = Some(index);
        Ok(())
    }

    /// Deletes a saved transcript and persists the shrunk list.
    pub async fn delete_chat(&mut self, index: usize) -> Result<()> {
        if index >= self.transcripts.len() {
            return Err(ChatError::not_found("transcript", index.to_string()));
        }
        self.transcripts.remove(index);

        match self.context.active {
            Some(active) if active == index => self.context.active = None,
            Some(active) if active > index => self.context.active = Some(active - 1),
            _ => {}
        }

        self.persist().await
    }

    /// Deletes all saved transcripts and persists the empty list.
    pub async fn clear_history(&mut self) -> Result<()> {
        self.transcripts.clear();
        self.context.active = None;
        self.persist().await
    }

    /// Extracts text from the file at `path` and caches it for the next
    /// turn. Returns the number of characters extracted.
    pub fn attach_file(&mut self, path: &Path) -> Result<usize> {
        let text = extract::extract_text(path)?;
        let chars = text.chars().count();
        self.context.file_context = Some(text);
        Ok(chars)
    }

    /// Drops the cached file context without sending it.
    pub fn clear_file_context(&mut self) {
        self.context.file_context = None;
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.context.model = model.into();
    }

    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.context.system_prompt = system_prompt.into();
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    pub fn active_transcript(&self) -> Option<&Transcript> {
        self.context.active.and_then(|i| self.transcripts.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lochat_core::transcript::MessageRole;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Script {
        events: Vec<StreamEvent>,
        hold_open: bool,
    }

    // Mock ModelClient that replays scripted streams
    struct ScriptedClient {
        scripts: Mutex<VecDeque<Script>>,
    }

    impl ScriptedClient {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["llama3".to_string()])
        }

        async fn chat_stream(&self, _request: ChatTurnRequest) -> mpsc::Receiver<StreamEvent> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted stream left");
            let (tx, rx) = mpsc::channel(16);

            tokio::spawn(async move {
                for event in script.events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if script.hold_open {
                    // Keep the producer alive until the receiver is dropped,
                    // simulating a stream that never finishes.
                    tx.closed().await;
                }
            });

            rx
        }
    }

    // Mock HistoryRepository that records every save
    struct RecordingHistory {
        saves: Mutex<Vec<Vec<Transcript>>>,
    }

    impl RecordingHistory {
        fn new() -> Self {
            Self {
                saves: Mutex::new(Vec::new()),
            }
        }

        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }

        fn last_save(&self) -> Vec<Transcript> {
            self.saves.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl HistoryRepository for RecordingHistory {
        async fn load(&self, _user_id: &str) -> Vec<Transcript> {
            Vec::new()
        }

        async fn save(&self, _user_id: &str, transcripts: &[Transcript]) -> Result<()> {
            self.saves.lock().unwrap().push(transcripts.to_vec());
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            fragment_timeout_secs: 5,
            ..AppConfig::default()
        }
    }

    async fn make_controller(
        scripts: Vec<Script>,
        config: AppConfig,
    ) -> (ConversationController, Arc<RecordingHistory>) {
        let history = Arc::new(RecordingHistory::new());
        let client = Arc::new(ScriptedClient::new(scripts));
        let controller = ConversationController::new(
            history.clone(),
            client,
            &config,
            "test-user".to_string(),
        )
        .await;
        (controller, history)
    }

    /// Runs next_event until a terminal progress value arrives.
    async fn drive_to_end(controller: &mut ConversationController) -> TurnProgress {
        loop {
            match controller.next_event().await {
                Some(TurnProgress::Fragment(_)) => continue,
                Some(terminal) => return terminal,
                None => panic!("stream ended without a terminal event"),
            }
        }
    }

    #[tokio::test]
    async fn test_fragments_concatenate_in_order() {
        let script = Script {
            events: vec![
                StreamEvent::Content("Hel".to_string()),
                StreamEvent::Content("lo".to_string()),
                StreamEvent::Content(" world".to_string()),
                StreamEvent::Done,
            ],
            hold_open: false,
        };
        let (mut controller, history) = make_controller(vec![script], test_config()).await;

        controller.begin_turn("greet me").await;
        assert_eq!(controller.context().phase, TurnPhase::AwaitingResponse);

        let terminal = drive_to_end(&mut controller).await;
        match terminal {
            TurnProgress::Completed {
                text,
                persist_error,
            } => {
                assert_eq!(text, "Hello world");
                assert!(persist_error.is_none());
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let transcript = controller.active_transcript().unwrap();
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.messages[1].content, "Hello world");
        assert_eq!(controller.context().phase, TurnPhase::Idle);

        // The finalized transcript was persisted
        assert_eq!(history.save_count(), 1);
        assert_eq!(history.last_save()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_preemption_discards_prior_stream() {
        let scripts = vec![
            Script {
                events: vec![StreamEvent::Content("OLD".to_string())],
                hold_open: true,
            },
            Script {
                events: vec![
                    StreamEvent::Content("new answer".to_string()),
                    StreamEvent::Done,
                ],
                hold_open: false,
            },
        ];
        let (mut controller, _history) = make_controller(scripts, test_config()).await;

        controller.begin_turn("first question").await;
        // Consume one fragment of the first stream, then preempt it
        match controller.next_event().await {
            Some(TurnProgress::Fragment(fragment)) => assert_eq!(fragment, "OLD"),
            other => panic!("expected a fragment, got {:?}", other),
        }

        controller.begin_turn("second question").await;
        let terminal = drive_to_end(&mut controller).await;
        match terminal {
            TurnProgress::Completed { text, .. } => assert_eq!(text, "new answer"),
            other => panic!("expected Completed, got {:?}", other),
        }

        let transcript = controller.active_transcript().unwrap();
        let assistant_messages: Vec<_> = transcript
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .collect();
        // Exactly one finalized assistant message, for the new turn only
        assert_eq!(assistant_messages.len(), 1);
        assert_eq!(assistant_messages[0].content, "new answer");
        assert!(!transcript.messages.iter().any(|m| m.content.contains("OLD")));
    }

    #[tokio::test]
    async fn test_connection_error_marks_message_and_persists() {
        let script = Script {
            events: vec![StreamEvent::Error(ChatError::connection(
                "connection refused",
            ))],
            hold_open: false,
        };
        let (mut controller, history) = make_controller(vec![script], test_config()).await;

        controller.begin_turn("hello?").await;
        let terminal = drive_to_end(&mut controller).await;
        match terminal {
            TurnProgress::Failed { partial, error } => {
                assert!(partial.is_empty());
                assert_eq!(error, ChatError::connection("connection refused"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        // User message present, assistant message marked failed, both saved
        let saved = history.last_save();
        assert_eq!(saved.len(), 1);
        let messages = &saved[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hello?");
        assert!(messages[1].is_failed());
    }

    #[tokio::test]
    async fn test_error_mid_stream_keeps_partial() {
        let script = Script {
            events: vec![
                StreamEvent::Content("half an".to_string()),
                StreamEvent::Error(ChatError::model(Some(500), "server died")),
            ],
            hold_open: false,
        };
        let (mut controller, _history) = make_controller(vec![script], test_config()).await;

        controller.begin_turn("go").await;
        let terminal = drive_to_end(&mut controller).await;
        match terminal {
            TurnProgress::Failed { partial, .. } => assert_eq!(partial, "half an"),
            other => panic!("expected Failed, got {:?}", other),
        }

        let transcript = controller.active_transcript().unwrap();
        assert_eq!(transcript.messages[1].content, "half an");
        assert!(transcript.messages[1].is_failed());
    }

    #[tokio::test]
    async fn test_fragment_timeout_fails_turn() {
        let script = Script {
            events: vec![],
            hold_open: true,
        };
        let config = AppConfig {
            fragment_timeout_secs: 0,
            ..AppConfig::default()
        };
        let (mut controller, _history) = make_controller(vec![script], config).await;

        controller.begin_turn("anyone there?").await;
        let terminal = drive_to_end(&mut controller).await;
        match terminal {
            TurnProgress::Failed { error, .. } => {
                assert!(matches!(error, ChatError::Timeout { .. }));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(controller.context().phase, TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_stop_generation_keeps_partial_without_error() {
        let script = Script {
            events: vec![StreamEvent::Content("so far".to_string())],
            hold_open: true,
        };
        let (mut controller, history) = make_controller(vec![script], test_config()).await;

        controller.begin_turn("tell me everything").await;
        match controller.next_event().await {
            Some(TurnProgress::Fragment(_)) => {}
            other => panic!("expected a fragment, got {:?}", other),
        }

        let stopped = controller.stop_generation().await.unwrap();
        match stopped {
            TurnProgress::Completed { text, .. } => assert_eq!(text, "so far"),
            other => panic!("expected Completed, got {:?}", other),
        }

        let saved = history.last_save();
        assert_eq!(saved[0].messages[1].content, "so far");
        assert!(!saved[0].messages[1].is_failed());
    }

    #[tokio::test]
    async fn test_file_context_attaches_to_one_turn_only() {
        let scripts = vec![
            Script {
                events: vec![StreamEvent::Content("ok".to_string()), StreamEvent::Done],
                hold_open: false,
            },
            Script {
                events: vec![StreamEvent::Content("ok".to_string()), StreamEvent::Done],
                hold_open: false,
            },
        ];
        let (mut controller, _history) = make_controller(scripts, test_config()).await;

        controller.context.file_context = Some("doc body".to_string());

        controller.begin_turn("summarize").await;
        drive_to_end(&mut controller).await;
        controller.begin_turn("and then?").await;
        drive_to_end(&mut controller).await;

        let messages = &controller.active_transcript().unwrap().messages;
        assert_eq!(messages[0].file_context.as_deref(), Some("doc body"));
        assert!(messages[2].file_context.is_none());
    }

    #[tokio::test]
    async fn test_new_chat_starts_second_transcript() {
        let scripts = vec![
            Script {
                events: vec![StreamEvent::Content("one".to_string()), StreamEvent::Done],
                hold_open: false,
            },
            Script {
                events: vec![StreamEvent::Content("two".to_string()), StreamEvent::Done],
                hold_open: false,
            },
        ];
        let (mut controller, _history) = make_controller(scripts, test_config()).await;

        controller.begin_turn("first chat").await;
        drive_to_end(&mut controller).await;

        controller.new_chat();
        controller.begin_turn("second chat").await;
        drive_to_end(&mut controller).await;

        assert_eq!(controller.transcripts().len(), 2);
        assert_eq!(controller.transcripts()[0].title, "first chat");
        assert_eq!(controller.transcripts()[1].title, "second chat");
    }

    #[tokio::test]
    async fn test_delete_chat_adjusts_active_index() {
        let scripts = vec![
            Script {
                events: vec![StreamEvent::Done],
                hold_open: false,
            },
            Script {
                events: vec![StreamEvent::Done],
                hold_open: false,
            },
        ];
        let (mut controller, history) = make_controller(scripts, test_config()).await;

        controller.begin_turn("a").await;
        drive_to_end(&mut controller).await;
        controller.new_chat();
        controller.begin_turn("b").await;
        drive_to_end(&mut controller).await;

        assert_eq!(controller.context().active, Some(1));
        controller.delete_chat(0).await.unwrap();
        assert_eq!(controller.context().active, Some(0));
        assert_eq!(controller.transcripts().len(), 1);
        assert_eq!(history.last_save().len(), 1);

        assert!(controller.delete_chat(5).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_history_persists_empty_list() {
        let script = Script {
            events: vec![StreamEvent::Done],
            hold_open: false,
        };
        let (mut controller, history) = make_controller(vec![script], test_config()).await;

        controller.begin_turn("a").await;
        drive_to_end(&mut controller).await;

        controller.clear_history().await.unwrap();
        assert!(controller.transcripts().is_empty());
        assert!(history.last_save().is_empty());
    }

    #[tokio::test]
    async fn test_attach_unsupported_file_leaves_context_empty() {
        let (mut controller, _history) = make_controller(vec![], test_config()).await;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("blob.xyz");
        std::fs::write(&path, "bytes").unwrap();

        let err = controller.attach_file(&path).unwrap_err();
        assert_eq!(err, ChatError::unsupported_format("xyz"));
        assert!(controller.context().file_context.is_none());
    }

    #[tokio::test]
    async fn test_attach_text_file_caches_content() {
        let (mut controller, _history) = make_controller(vec![], test_config()).await;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "exact content").unwrap();

        let chars = controller.attach_file(&path).unwrap();
        assert_eq!(chars, "exact content".chars().count());
        assert_eq!(
            controller.context().file_context.as_deref(),
            Some("exact content")
        );
    }
}
