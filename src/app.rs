use ratatui::layout::Rect;
use crate::coach::{CoachClient, CoachError, CoachReply};
use crate::effects::Celebrations;

/// Animation ticks between typing-dot updates. Ticks arrive every 100ms, so
/// the dots advance every 500ms.
const TYPING_DOT_TICKS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Coach,
    System,
}

/// One transcript bubble. Never mutated after creation; errors become
/// System messages rather than mutating earlier entries.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub avatar: Option<String>,
}

impl ChatMessage {
    pub fn user(text: String) -> Self {
        Self {
            sender: Sender::User,
            text,
            avatar: None,
        }
    }

    pub fn coach(text: String, avatar: Option<String>) -> Self {
        Self {
            sender: Sender::Coach,
            text,
            avatar,
        }
    }

    pub fn system(text: String) -> Self {
        Self {
            sender: Sender::System,
            text,
            avatar: None,
        }
    }
}

/// Explicit request lifecycle: a submit while AwaitingResponse is rejected,
/// so at most one ask is ever in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    AwaitingResponse,
}

/// The transient "🤖 Typing..." placeholder shown while a reply is pending.
/// Lives only for the duration of one request; dropped on every exit path.
#[derive(Debug, Default)]
pub struct TypingIndicator {
    ticks: u32,
    frame: u8,
}

impl TypingIndicator {
    pub fn tick(&mut self) {
        self.ticks += 1;
        if self.ticks % TYPING_DOT_TICKS == 0 {
            self.frame = (self.frame + 1) % 4;
        }
    }

    pub fn label(&self) -> String {
        format!("🤖 Typing{}", ".".repeat(self.frame as usize))
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat transcript
    pub transcript: Vec<ChatMessage>,
    pub input: String,
    pub cursor: usize, // cursor position in input (chars)
    pub scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Request lifecycle
    pub request_state: RequestState,
    pub loading: bool,
    pub typing: Option<TypingIndicator>,
    pub pending: Option<tokio::task::JoinHandle<Result<CoachReply, CoachError>>>,

    // Celebration overlays
    pub celebrations: Celebrations,

    // Chat area for mouse hit-testing and overlays (updated during render)
    pub chat_area: Option<Rect>,

    pub coach: CoachClient,
}

impl App {
    pub fn new(coach: CoachClient, effects_enabled: bool) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            transcript: Vec::new(),
            input: String::new(),
            cursor: 0,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,

            request_state: RequestState::Idle,
            loading: false,
            typing: None,
            pending: None,

            celebrations: Celebrations::new(effects_enabled),

            chat_area: None,

            coach,
        }
    }

    /// Send the current input to the coach. Whitespace-only input is a
    /// silent no-op, as is submitting while a request is already in flight.
    pub fn submit(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() || self.request_state == RequestState::AwaitingResponse {
            return;
        }

        tracing::debug!(chars = text.chars().count(), "submitting message");

        self.transcript.push(ChatMessage::user(text.clone()));
        self.request_state = RequestState::AwaitingResponse;
        self.loading = true;
        self.typing = Some(TypingIndicator::default());

        // Spawn background task to ask the coach
        let coach = self.coach.clone();
        self.pending = Some(tokio::spawn(async move { coach.ask(&text).await }));

        // Input clears immediately, not when the reply lands
        self.input.clear();
        self.cursor = 0;
        self.scroll_to_bottom();
    }

    /// Route the outcome of the pending ask, if it has finished. Called every
    /// loop iteration; the tick cadence bounds pickup latency.
    pub async fn poll_pending(&mut self) {
        let finished = self.pending.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.pending.take() {
            match task.await {
                Ok(Ok(reply)) => self.on_response(reply),
                Ok(Err(err)) => self.on_transport_failure(&err.to_string()),
                Err(err) => self.on_transport_failure(&err.to_string()),
            }
        }
    }

    /// Handle a completed HTTP exchange. An `error` payload becomes a System
    /// bubble and suppresses both animations; otherwise the reply text is
    /// appended and the animation flags fire independently.
    pub fn on_response(&mut self, reply: CoachReply) {
        self.finish_request();

        if let Some(error) = reply.error {
            tracing::warn!(status = reply.status, error = %error, "coach returned an error");
            self.transcript.push(ChatMessage::system(format!(
                "Error: {} (Status: {})",
                error, reply.status
            )));
            self.scroll_to_bottom();
            return;
        }

        tracing::info!(status = reply.status, "coach replied");
        let text = reply.response.unwrap_or_default();
        self.transcript.push(ChatMessage::coach(text, reply.avatar));

        let area = self.chat_area.unwrap_or_default();
        if reply.show_confetti {
            self.celebrations.launch_confetti(area);
        }
        if reply.show_emojis {
            self.celebrations.launch_emojis(area);
        }
        self.scroll_to_bottom();
    }

    /// Handle a request that never produced a usable reply: network failure,
    /// unparseable body, or a panicked task. No retry.
    pub fn on_transport_failure(&mut self, message: &str) {
        self.finish_request();
        tracing::warn!(message, "coach request failed");
        self.transcript
            .push(ChatMessage::system(format!("Something went wrong: {}", message)));
        self.scroll_to_bottom();
    }

    /// Tear down request state. Every path out of AwaitingResponse funnels
    /// through here so no indicator or timer outlives its request.
    fn finish_request(&mut self) {
        self.loading = false;
        self.typing = None;
        self.pending = None;
        self.request_state = RequestState::Idle;
    }

    /// Advance animation state by one tick.
    pub fn tick(&mut self) {
        if let Some(typing) = &mut self.typing {
            typing.tick();
        }
        self.celebrations.tick();
    }

    pub fn quit(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.typing = None;
        self.should_quit = true;
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }

    /// Scroll the transcript so the latest message (and the typing indicator
    /// while loading) is visible.
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.transcript {
            if msg.sender != Sender::System {
                total_lines += 1; // Sender label line
            }
            // Calculate wrapped lines for each line of content
            for line in msg.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.loading {
            total_lines += 3; // "Coach:" + "Thinking..." + typing dots
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let coach = CoachClient::new("http://localhost:8000/api/octocoach/ask/", "csrftoken")
            .unwrap();
        App::new(coach, true)
    }

    fn reply(status: u16, json: &str) -> CoachReply {
        let mut reply: CoachReply = serde_json::from_str(json).unwrap();
        reply.status = status;
        reply
    }

    #[tokio::test]
    async fn test_submit_whitespace_only_is_noop() {
        let mut app = test_app();
        app.input = "   \t  ".to_string();
        app.cursor = 6;

        app.submit();

        assert!(app.transcript.is_empty());
        assert!(app.pending.is_none());
        assert_eq!(app.request_state, RequestState::Idle);
        assert_eq!(app.input, "   \t  ");
        assert!(!app.loading);
        assert!(app.typing.is_none());
    }

    #[tokio::test]
    async fn test_submit_appends_user_message_and_clears_input() {
        let mut app = test_app();
        app.input = "hello".to_string();
        app.cursor = 5;

        app.submit();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::User);
        assert_eq!(app.transcript[0].text, "hello");
        assert_eq!(app.input, "");
        assert_eq!(app.cursor, 0);
        assert_eq!(app.request_state, RequestState::AwaitingResponse);
        assert!(app.loading);
        assert!(app.typing.is_some());
        assert!(app.pending.is_some());
    }

    #[tokio::test]
    async fn test_submit_trims_surrounding_whitespace() {
        let mut app = test_app();
        app.input = "  how am I doing?  ".to_string();

        app.submit();

        assert_eq!(app.transcript[0].text, "how am I doing?");
    }

    #[tokio::test]
    async fn test_reentrant_submit_is_rejected() {
        let mut app = test_app();
        app.input = "first".to_string();
        app.submit();

        app.input = "second".to_string();
        app.submit();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].text, "first");
        // The rejected submit leaves the input untouched
        assert_eq!(app.input, "second");
    }

    #[tokio::test]
    async fn test_response_appends_coach_message() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit();

        app.on_response(reply(200, r#"{"response": "Great job!", "showConfetti": true}"#));

        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript[1].sender, Sender::Coach);
        assert_eq!(app.transcript[1].text, "Great job!");
        assert_eq!(app.request_state, RequestState::Idle);
        assert!(!app.loading);
        assert!(app.typing.is_none());
        assert!(app.celebrations.confetti().is_some());
        assert!(app.celebrations.emojis().is_none());
    }

    #[tokio::test]
    async fn test_response_triggers_are_independent() {
        let mut app = test_app();
        app.on_response(reply(
            200,
            r#"{"response": "Double win!", "showConfetti": true, "showEmojis": true}"#,
        ));

        assert!(app.celebrations.confetti().is_some());
        assert!(app.celebrations.emojis().is_some());
    }

    #[tokio::test]
    async fn test_error_reply_becomes_system_message_without_effects() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit();

        app.on_response(reply(
            400,
            r#"{"error": "bad request", "showConfetti": true, "showEmojis": true}"#,
        ));

        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript[1].sender, Sender::System);
        assert_eq!(app.transcript[1].text, "Error: bad request (Status: 400)");
        assert!(app.transcript.iter().all(|m| m.sender != Sender::Coach));
        // An error suppresses the animations even when the flags are set
        assert!(app.celebrations.is_idle());
        assert_eq!(app.request_state, RequestState::Idle);
    }

    #[tokio::test]
    async fn test_reply_without_text_renders_empty_bubble() {
        let mut app = test_app();
        app.on_response(reply(200, r#"{"showEmojis": true}"#));

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::Coach);
        assert_eq!(app.transcript[0].text, "");
        assert!(app.celebrations.emojis().is_some());
    }

    #[tokio::test]
    async fn test_reply_avatar_reaches_coach_message() {
        let mut app = test_app();
        app.on_response(reply(200, r#"{"response": "hi", "avatar": "🐙"}"#));

        assert_eq!(app.transcript[0].avatar.as_deref(), Some("🐙"));
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_system_message() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit();

        app.on_transport_failure("connection refused");

        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript[1].sender, Sender::System);
        assert_eq!(
            app.transcript[1].text,
            "Something went wrong: connection refused"
        );
        assert!(!app.loading);
        assert!(app.typing.is_none());
        assert!(app.pending.is_none());
        assert_eq!(app.request_state, RequestState::Idle);
    }

    #[tokio::test]
    async fn test_typing_dots_cycle_round_robin() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit();

        let label = |app: &App| app.typing.as_ref().unwrap().label();
        assert_eq!(label(&app), "🤖 Typing");

        for _ in 0..5 {
            app.tick();
        }
        assert_eq!(label(&app), "🤖 Typing.");

        for _ in 0..5 {
            app.tick();
        }
        assert_eq!(label(&app), "🤖 Typing..");

        for _ in 0..5 {
            app.tick();
        }
        assert_eq!(label(&app), "🤖 Typing...");

        for _ in 0..5 {
            app.tick();
        }
        assert_eq!(label(&app), "🤖 Typing");
    }

    #[tokio::test]
    async fn test_typing_indicator_gone_after_resolution() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit();
        for _ in 0..7 {
            app.tick();
        }

        app.on_response(reply(200, r#"{"response": "done"}"#));

        assert!(app.typing.is_none());
        // A fresh request starts the dot cycle over
        app.input = "again".to_string();
        app.submit();
        assert_eq!(app.typing.as_ref().unwrap().label(), "🤖 Typing");
    }

    #[tokio::test]
    async fn test_poll_pending_routes_success() {
        let mut app = test_app();
        app.request_state = RequestState::AwaitingResponse;
        app.loading = true;
        app.typing = Some(TypingIndicator::default());
        app.pending = Some(tokio::spawn(async {
            Ok(CoachReply {
                status: 200,
                response: Some("from the task".to_string()),
                error: None,
                show_confetti: false,
                show_emojis: false,
                avatar: None,
            })
        }));

        for _ in 0..100 {
            app.poll_pending().await;
            if app.pending.is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].text, "from the task");
        assert_eq!(app.request_state, RequestState::Idle);
    }

    #[tokio::test]
    async fn test_poll_pending_routes_malformed_reply_to_transport_path() {
        let mut app = test_app();
        app.request_state = RequestState::AwaitingResponse;
        app.pending = Some(tokio::spawn(async {
            let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
            Err(CoachError::MalformedReply {
                status: 502,
                source,
            })
        }));

        for _ in 0..100 {
            app.poll_pending().await;
            if app.pending.is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].sender, Sender::System);
        assert!(app.transcript[0].text.starts_with("Something went wrong: "));
        assert!(app.transcript[0].text.contains("status 502"));
    }

    #[tokio::test]
    async fn test_quit_aborts_pending_request() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit();

        app.quit();

        assert!(app.should_quit);
        assert!(app.pending.is_none());
        assert!(app.typing.is_none());
    }

    #[tokio::test]
    async fn test_disabled_effects_leave_reply_handling_intact() {
        let coach = CoachClient::new("http://localhost:8000/api/octocoach/ask/", "csrftoken")
            .unwrap();
        let mut app = App::new(coach, false);

        app.on_response(reply(
            200,
            r#"{"response": "Nice!", "showConfetti": true, "showEmojis": true}"#,
        ));

        assert_eq!(app.transcript[0].text, "Nice!");
        assert!(app.celebrations.is_idle());
    }

    #[test]
    fn test_scroll_to_bottom_counts_wrapped_lines() {
        let coach = CoachClient::new("http://localhost:8000/api/octocoach/ask/", "csrftoken")
            .unwrap();
        let mut app = App::new(coach, true);
        app.chat_width = 10;
        app.chat_height = 4;

        // 25 chars wraps to 3 lines at width 10, plus label and blank
        app.transcript.push(ChatMessage::user("a".repeat(25)));
        app.scroll_to_bottom();

        assert_eq!(app.scroll, 1);
    }
}
