//! Request lifecycle
//!
//! A [`Session`] owns everything a chat session mutates: configuration,
//! transcript, history cache and the request state. A submission goes
//! through three phases:
//!
//! - [`Session::begin`] checks the request state, appends the user message and
//!   a typing placeholder, and hands back the outbound request.
//! - the network call ([`ChatClient::send`]), the only point that suspends.
//! - [`Session::complete`] replaces the placeholder with the reply (or the
//!   error) and returns the session to [`RequestState::Idle`].
//!
//! [`Session::submit`] runs all three in sequence. A front end that must keep
//! drawing while the call is in flight can run the network call on a
//! background task and feed the outcome to `complete` itself.

use anyhow::Result;

use crate::actions::QuickAction;
use crate::client::{ChatClient, ChatError, ChatRequest, ChatResponse};
use crate::config::Config;
use crate::history::{ConversationHistory, HistoryEntry};
use crate::storage::KeyValueStore;
use crate::transcript::{Sender, Transcript};

const TOPIC_KEYWORD: &str = "pipeline";
const TOPIC_PUNCTUATION: &[char] = &['.', ',', '!', '?'];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    /// A request is in flight. `placeholder` is the typing indicator's
    /// transcript id and `message` the text that was sent.
    Sending { placeholder: u64, message: String },
}

/// Topic named in `text`: the word following `pipeline`, minus trailing
/// punctuation. Falls back to `default` when the text names none.
pub fn derive_topic(text: &str, default: Option<&str>) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    words
        .iter()
        .position(|word| word.eq_ignore_ascii_case(TOPIC_KEYWORD))
        .and_then(|i| words.get(i + 1))
        .map(|word| word.trim_end_matches(TOPIC_PUNCTUATION).to_string())
        .filter(|word| !word.is_empty())
        .or_else(|| default.map(str::to_string))
}

pub struct Session {
    config: Config,
    transcript: Transcript,
    history: ConversationHistory,
    state: RequestState,
    conversation_id: Option<String>,
    store: Box<dyn KeyValueStore>,
}

impl Session {
    /// Load config and history from `store`. The transcript always starts empty.
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let config = Config::load(store.as_ref());
        let history = ConversationHistory::load(store.as_ref());
        log::info!(
            "Session started against {} ({} past exchanges cached)",
            config.endpoint_base_url,
            history.len()
        );

        Self {
            config,
            transcript: Transcript::new(),
            history,
            state: RequestState::Idle,
            conversation_id: None,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration and persist every field.
    pub fn save_config(&mut self, config: Config) -> Result<()> {
        self.config = config;
        self.config.save(self.store.as_mut())
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.state, RequestState::Sending { .. })
    }

    /// Conversation id from the last successful reply, sent along with the next request.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Start a submission. Returns `None` without touching anything when the
    /// text is blank or another request is still in flight.
    pub fn begin(&mut self, raw_text: &str) -> Option<ChatRequest> {
        let message = raw_text.trim();
        if message.is_empty() {
            return None;
        }
        if self.is_sending() {
            log::debug!("Submission ignored, a request is already in flight");
            return None;
        }

        self.transcript.push(Sender::User, message);

        let topic = derive_topic(message, self.config.topic_name.as_deref());
        let request = ChatRequest {
            message: message.to_string(),
            pipeline_name: topic.unwrap_or_default(),
            hours_back: self.config.lookback_hours,
            conversation_id: self.conversation_id.clone(),
        };
        log::info!(
            "Sending message (topic: {:?}, hours_back: {})",
            request.pipeline_name,
            request.hours_back
        );

        let placeholder = self.transcript.push_typing();
        self.state = RequestState::Sending {
            placeholder,
            message: message.to_string(),
        };

        Some(request)
    }

    pub fn quick_action(&mut self, action: QuickAction) -> Option<ChatRequest> {
        let message = action.message(self.config.topic_name.as_deref());
        self.begin(&message)
    }

    /// Finish the in-flight submission with the outcome of the network call.
    pub fn complete(&mut self, outcome: Result<ChatResponse, ChatError>) {
        let (placeholder, message) = match std::mem::take(&mut self.state) {
            RequestState::Sending { placeholder, message } => (placeholder, message),
            RequestState::Idle => {
                log::warn!("Ignoring a reply with no request in flight");
                return;
            }
        };

        self.transcript.remove_typing(placeholder);

        match outcome {
            Ok(reply) => {
                self.transcript.push(Sender::Agent, reply.response.as_str());

                if let Some(id) = &reply.conversation_id {
                    log::info!("Conversation ID: {}", id);
                    self.conversation_id = Some(id.clone());
                }

                let entry = HistoryEntry::new(message, reply.response, reply.conversation_id);
                if let Err(e) = self.history.record(entry, self.store.as_mut()) {
                    log::warn!("Could not persist conversation history: {}", e);
                }
            }
            Err(err) => {
                log::error!("Chat request failed: {}", err);
                self.transcript.push(Sender::Agent, err.user_message());
            }
        }
    }

    /// Run a whole submission. Returns whether it was accepted.
    pub async fn submit(&mut self, raw_text: &str, client: &ChatClient) -> bool {
        let Some(request) = self.begin(raw_text) else {
            return false;
        };
        let outcome = client.send(&request).await;
        self.complete(outcome);
        true
    }
}
