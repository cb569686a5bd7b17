use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::gemini::{ContentGenerator, GeminiClient, GeminiError, Reply};
use crate::session::Session;
use crate::toast::Severity;

/// Startup settings resolved from flags, environment and config file
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub session: Session,

    // Input state
    pub cursor: usize, // char index into session.pending_input

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16,      // Inner height of the chat area, set during render
    pub chat_total_lines: u16, // Wrapped line count of the chat, set during render
    pub follow_tail: bool,     // Pin the view to the newest entry on every render
    pub animation_frame: u8,   // 0-2 for ellipsis animation
    pub shift_enter_newline: bool, // Terminal reports Shift on Enter

    // Request state
    pub model: String,
    pub base_url: String,
    pub client: Option<Arc<dyn ContentGenerator>>,
    pub request_task: Option<JoinHandle<Result<Reply, GeminiError>>>,

    // API key prompt
    pub show_api_key_input: bool,
    pub api_key_input: String,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let client = settings.api_key.as_deref().map(|key| {
            Arc::new(GeminiClient::new(&settings.base_url, &settings.model, key))
                as Arc<dyn ContentGenerator>
        });
        let show_api_key_input = client.is_none();

        Self {
            should_quit: false,
            session: Session::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_total_lines: 0,
            follow_tail: true,
            animation_frame: 0,
            shift_enter_newline: false,
            model: settings.model,
            base_url: settings.base_url,
            client,
            request_task: None,
            show_api_key_input,
            api_key_input: String::new(),
        }
    }

    /// Build an app around an existing generator
    pub fn with_client(model: &str, client: Arc<dyn ContentGenerator>) -> Self {
        let mut app = Self::new(Settings {
            model: model.to_string(),
            base_url: String::new(),
            api_key: None,
        });
        app.client = Some(client);
        app.show_api_key_input = false;
        app
    }

    pub fn is_awaiting(&self) -> bool {
        self.session.awaiting_response
    }

    /// Submit the pending input. Blank input or an in-flight request makes
    /// this a no-op.
    pub fn submit(&mut self) {
        let Some(client) = self.client.clone() else {
            self.open_api_key_input();
            return;
        };

        let Some(request) = self.session.begin_send() else {
            return;
        };
        self.cursor = 0;
        self.scroll_to_bottom();

        self.request_task = Some(tokio::spawn(async move {
            client.generate(&request).await
        }));
    }

    /// Collect the request result once its task has completed
    pub async fn poll_request(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.request_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(GeminiError::Task(join_err.to_string())),
            };
            self.session.finish(result);
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame and expire toasts (called by Tick event)
    pub fn tick(&mut self) {
        if self.session.awaiting_response {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.session.toasts.prune(Instant::now());
    }

    fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    /// Record the laid-out chat size; resolves a pending scroll to the bottom
    pub fn set_chat_layout(&mut self, total_lines: u16, height: u16) {
        self.chat_total_lines = total_lines;
        self.chat_height = height;
        self.chat_scroll = if self.follow_tail {
            self.max_scroll()
        } else {
            self.chat_scroll.min(self.max_scroll())
        };
    }

    /// Scroll chat so the newest entry is visible. The exact offset is only
    /// known once the renderer has wrapped the text.
    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        if self.chat_scroll == self.max_scroll() {
            self.follow_tail = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    // Input editing. The input is disabled while a response is pending.

    pub fn insert_char(&mut self, c: char) {
        if self.is_awaiting() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.session.pending_input, self.cursor);
        self.session.pending_input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.is_awaiting() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.session.pending_input, self.cursor);
        self.session.pending_input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if self.is_awaiting() {
            return;
        }
        if self.cursor < self.session.pending_input.chars().count() {
            let byte_pos = char_to_byte_index(&self.session.pending_input, self.cursor);
            self.session.pending_input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.session.pending_input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.session.pending_input.chars().count();
    }

    /// (line, column) of the cursor within the pending input
    pub fn cursor_position(&self) -> (usize, usize) {
        let before: String = self.session.pending_input.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let column = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
        (line, column)
    }

    // API key prompt

    pub fn open_api_key_input(&mut self) {
        self.show_api_key_input = true;
        self.api_key_input.clear();
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
    }

    pub fn api_key_insert_str(&mut self, text: &str) {
        self.api_key_input
            .extend(text.chars().filter(|c| !c.is_whitespace()));
    }

    pub fn api_key_backspace(&mut self) {
        self.api_key_input.pop();
    }

    /// Dismiss the prompt without changing the key
    pub fn cancel_api_key_input(&mut self) {
        self.close_api_key_input();
        if self.client.is_none() {
            self.session
                .toasts
                .notify("No API key set. Press Ctrl+K to add one.", Severity::Info);
        }
    }

    /// Use the typed key for this session and persist it to the config file
    pub fn confirm_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if key.is_empty() {
            return;
        }

        self.client = Some(Arc::new(GeminiClient::new(&self.base_url, &self.model, &key)));

        match Config::save_api_key(&key) {
            Ok(()) => {
                info!("saved API key to config");
                self.session.toasts.notify("API key saved", Severity::Success);
            }
            Err(err) => {
                warn!(error = %err, "failed to save API key");
                self.session
                    .toasts
                    .notify(format!("API key not saved: {}", err), Severity::Error);
            }
        }

        self.close_api_key_input();
    }
}
