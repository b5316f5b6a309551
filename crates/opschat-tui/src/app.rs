use std::time::{Duration, Instant};
use anyhow::Result;
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use opschat_core::{
    ChatClient, ChatError, ChatRequest, ChatResponse, Config, KeyValueStore, QuickAction, Session,
};

/// How long a notice stays on screen
const NOTICE_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Endpoint,
    Topic,
    Lookback,
    DarkMode,
}

impl SettingsField {
    pub fn all() -> [SettingsField; 4] {
        [
            SettingsField::Endpoint,
            SettingsField::Topic,
            SettingsField::Lookback,
            SettingsField::DarkMode,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::Endpoint => "Endpoint URL",
            SettingsField::Topic => "Default pipeline",
            SettingsField::Lookback => "Hours back",
            SettingsField::DarkMode => "Dark mode",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SettingsField::Endpoint => SettingsField::Topic,
            SettingsField::Topic => SettingsField::Lookback,
            SettingsField::Lookback => SettingsField::DarkMode,
            SettingsField::DarkMode => SettingsField::Endpoint,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            SettingsField::Endpoint => SettingsField::DarkMode,
            SettingsField::Topic => SettingsField::Endpoint,
            SettingsField::Lookback => SettingsField::Topic,
            SettingsField::DarkMode => SettingsField::Lookback,
        }
    }
}

/// Editable copy of the configuration shown in the settings panel
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub endpoint: String,
    pub topic: String,
    pub lookback: String,
    pub dark_mode: bool,
    pub field: SettingsField,
}

impl SettingsForm {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint_base_url.clone(),
            topic: config.topic_name.clone().unwrap_or_default(),
            lookback: config.lookback_hours.to_string(),
            dark_mode: config.dark_mode,
            field: SettingsField::Endpoint,
        }
    }

    pub fn to_config(&self) -> Config {
        let topic = self.topic.trim();
        Config {
            endpoint_base_url: self.endpoint.trim().to_string(),
            topic_name: (!topic.is_empty()).then(|| topic.to_string()),
            lookback_hours: Config::lookback_from_input(&self.lookback),
            dark_mode: self.dark_mode,
        }
    }

    /// Text of the focused field, if it is a text field
    pub fn active_text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            SettingsField::Endpoint => Some(&mut self.endpoint),
            SettingsField::Topic => Some(&mut self.topic),
            SettingsField::Lookback => Some(&mut self.lookback),
            SettingsField::DarkMode => None,
        }
    }

    pub fn value(&self, field: SettingsField) -> String {
        match field {
            SettingsField::Endpoint => self.endpoint.clone(),
            SettingsField::Topic => self.topic.clone(),
            SettingsField::Lookback => self.lookback.clone(),
            SettingsField::DarkMode => if self.dark_mode { "[x]" } else { "[ ]" }.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub shown_at: Instant,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: Session,
    pub client: ChatClient,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Transcript view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // In-flight request
    pub request_task: Option<JoinHandle<Result<ChatResponse, ChatError>>>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Overlays
    pub settings: Option<SettingsForm>,
    pub notice: Option<Notice>,
}

impl App {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let session = Session::new(store);
        let client = ChatClient::new(session.config());

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            session,
            client,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            request_task: None,
            animation_frame: 0,

            settings: None,
            notice: None,
        }
    }

    pub fn dark_mode(&self) -> bool {
        self.session.config().dark_mode
    }

    /// Send whatever is in the input box. The input is kept when the session
    /// refuses the submission (blank text or a request still in flight).
    pub fn submit_input(&mut self) {
        if let Some(request) = self.session.begin(&self.input) {
            self.input.clear();
            self.input_cursor = 0;
            self.spawn_request(request);
        }
    }

    pub fn run_quick_action(&mut self, action: QuickAction) {
        if let Some(request) = self.session.quick_action(action) {
            self.spawn_request(request);
        }
    }

    fn spawn_request(&mut self, request: ChatRequest) {
        let client = self.client.clone();
        self.request_task = Some(tokio::spawn(async move { client.send(&request).await }));
        self.scroll_to_bottom();
    }

    /// Hand a finished request back to the session.
    pub async fn poll_request(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.request_task.take() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ChatError::Network(format!("request task failed: {}", e))),
            };
            self.session.complete(outcome);
            self.scroll_to_bottom();
        }
    }

    // Settings panel
    pub fn open_settings(&mut self) {
        self.settings = Some(SettingsForm::from_config(self.session.config()));
    }

    pub fn close_settings(&mut self) {
        self.settings = None;
    }

    /// Persist the settings form and rebuild the client for the new endpoint.
    pub fn save_settings(&mut self) -> Result<()> {
        let Some(form) = &self.settings else {
            return Ok(());
        };
        let config = form.to_config();

        self.session.save_config(config)?;
        self.client = ChatClient::new(self.session.config());
        self.settings = None;
        self.show_notice("Configuration saved!");
        Ok(())
    }

    /// Flip the theme and persist it right away.
    pub fn toggle_dark_mode(&mut self) -> Result<()> {
        let mut config = self.session.config().clone();
        config.dark_mode = !config.dark_mode;
        if let Some(form) = &mut self.settings {
            form.dark_mode = config.dark_mode;
        }
        self.session.save_config(config)
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            shown_at: Instant::now(),
        });
    }

    /// Tick animation frame and expire notices (called by Tick event)
    pub fn tick(&mut self) {
        if self.session.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self
            .notice
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() >= NOTICE_DURATION)
        {
            self.notice = None;
        }
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    // Transcript scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.total_chat_lines().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll so the newest message (or the typing indicator) is visible
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn half_page(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Estimated number of wrapped lines the transcript occupies
    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.session.transcript().messages() {
            total_lines += 1; // Sender line
            if msg.typing {
                total_lines += 1;
            } else {
                for line in msg.markup.to_plain().split('\n') {
                    // Use character count, not byte length, for proper UTF-8 handling
                    total_lines += line.chars().count() / wrap_width + 1;
                }
            }
            total_lines += 1; // Blank line after message
        }

        total_lines.min(u16::MAX as usize) as u16
    }
}
