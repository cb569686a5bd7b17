//! Chat session: the conversation, the input flags and the request cycle.

use tracing::{debug, error, warn};

use crate::gemini::{ContentGenerator, GeminiError, GenerateRequest, Reply};
use crate::state::{Conversation, Message};
use crate::toast::{Severity, Toasts};

pub const UNEXPECTED_FORMAT_NOTICE: &str = "Received an unexpected response format from the AI.";

#[derive(Debug, Default)]
pub struct Session {
    pub conversation: Conversation,
    pub pending_input: String,
    pub awaiting_response: bool,
    pub toasts: Toasts,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a submit right now would dispatch a request
    pub fn can_send(&self) -> bool {
        !self.awaiting_response && !self.pending_input.trim().is_empty()
    }

    /// Record the user's message and build the payload for it.
    ///
    /// Returns `None` (and leaves everything untouched) when the input is
    /// blank or a request is already in flight.
    pub fn begin_send(&mut self) -> Option<GenerateRequest> {
        if !self.can_send() {
            return None;
        }

        let user_message = Message::user(std::mem::take(&mut self.pending_input));

        let mut contents = self.conversation.to_contents();
        contents.push(user_message.to_content());

        self.conversation.append(user_message);
        self.awaiting_response = true;

        debug!(messages = contents.len(), "dispatching conversation");
        Some(GenerateRequest { contents })
    }

    /// Apply the outcome of the request started by [`Session::begin_send`]
    pub fn finish(&mut self, result: Result<Reply, GeminiError>) {
        match result {
            Ok(Reply::Text(text)) => {
                self.conversation.append(Message::model(text));
            }
            Ok(Reply::UnexpectedFormat) => {
                warn!("unexpected API response structure");
                self.toasts.notify(UNEXPECTED_FORMAT_NOTICE, Severity::Error);
            }
            Err(err) => {
                error!(error = %err, "error sending message");
                self.toasts.notify(format!("Error: {}", err), Severity::Error);
                self.conversation
                    .append(Message::error(format!("Error: {}. Please try again.", err)));
            }
        }
        self.awaiting_response = false;
    }

    /// Full send cycle, awaiting the response inline
    pub async fn send<G>(&mut self, generator: &G) -> bool
    where
        G: ContentGenerator + ?Sized,
    {
        let Some(request) = self.begin_send() else {
            return false;
        };
        let result = generator.generate(&request).await;
        self.finish(result);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Replays one canned outcome and records every request it sees
    struct MockGenerator {
        outcome: Mutex<Option<Result<Reply, GeminiError>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl MockGenerator {
        fn new(outcome: Result<Reply, GeminiError>) -> Self {
            Self {
                outcome: Mutex::new(Some(outcome)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentGenerator for MockGenerator {
        async fn generate(&self, request: &GenerateRequest) -> Result<Reply, GeminiError> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcome
                .lock()
                .unwrap()
                .take()
                .expect("mock called more than once")
        }
    }

    fn session_with_input(text: &str) -> Session {
        let mut session = Session::new();
        session.pending_input = text.to_string();
        session
    }

    #[test]
    fn begin_send_appends_user_message_before_dispatch() {
        let mut session = session_with_input("hello");

        let request = session.begin_send().unwrap();

        assert_eq!(session.conversation.messages(), &[Message::user("hello")]);
        assert!(session.pending_input.is_empty());
        assert!(session.awaiting_response);
        assert_eq!(request.contents, session.conversation.to_contents());
    }

    #[test]
    fn blank_input_is_ignored() {
        for input in ["", "   ", "\n\t "] {
            let mut session = session_with_input(input);
            assert!(session.begin_send().is_none());
            assert!(session.conversation.is_empty());
            assert!(!session.awaiting_response);
            assert_eq!(session.pending_input, input);
        }
    }

    #[test]
    fn second_send_while_pending_is_ignored() {
        let mut session = session_with_input("first");
        session.begin_send().unwrap();
        session.pending_input = "second".to_string();

        assert!(session.begin_send().is_none());
        assert_eq!(session.conversation.len(), 1);
        assert_eq!(session.pending_input, "second");
    }

    #[tokio::test]
    async fn successful_reply_appends_model_message() {
        let generator = MockGenerator::new(Ok(Reply::Text("hi".to_string())));
        let mut session = session_with_input("hello");

        assert!(session.send(&generator).await);

        assert_eq!(
            session.conversation.messages(),
            &[Message::user("hello"), Message::model("hi")]
        );
        assert!(!session.awaiting_response);
        assert!(session.toasts.is_empty());
    }

    #[tokio::test]
    async fn error_status_adds_error_message_and_toast() {
        let generator = MockGenerator::new(Err(GeminiError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "rate limited".to_string(),
        }));
        let mut session = session_with_input("hello");

        session.send(&generator).await;

        assert_eq!(session.conversation.len(), 2);
        let last = session.conversation.last().unwrap();
        assert_eq!(last.role, Role::Error);
        assert!(last.text.contains("rate limited"));
        assert!(last.text.ends_with("Please try again."));
        assert_eq!(session.toasts.len(), 1);
        assert_eq!(session.toasts.active()[0].severity, Severity::Error);
        assert!(!session.awaiting_response);
    }

    #[tokio::test]
    async fn unexpected_format_only_notifies() {
        let generator = MockGenerator::new(Ok(Reply::UnexpectedFormat));
        let mut session = session_with_input("hello");

        session.send(&generator).await;

        assert_eq!(session.conversation.messages(), &[Message::user("hello")]);
        assert_eq!(session.toasts.len(), 1);
        assert_eq!(session.toasts.active()[0].message, UNEXPECTED_FORMAT_NOTICE);
        assert!(!session.awaiting_response);
    }

    #[tokio::test]
    async fn payload_mirrors_conversation_at_call_time() {
        let mut session = Session::new();
        session.conversation.append(Message::user("first"));
        session.conversation.append(Message::model("reply"));
        session.conversation.append(Message::error("Error: boom. Please try again."));
        session.pending_input = "again".to_string();

        let generator = MockGenerator::new(Ok(Reply::Text("ok".to_string())));
        session.send(&generator).await;

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        let roles: Vec<Option<Role>> = requests[0].contents.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![Some(Role::User), Some(Role::Model), Some(Role::Error), Some(Role::User)]
        );
        assert_eq!(
            requests[0].contents,
            session.conversation.to_contents()[..4].to_vec()
        );
    }

    #[tokio::test]
    async fn noop_send_makes_no_request() {
        let generator = MockGenerator::new(Ok(Reply::Text("unused".to_string())));
        let mut session = session_with_input("  ");

        assert!(!session.send(&generator).await);
        assert!(generator.requests().is_empty());
    }
}
