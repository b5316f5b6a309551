use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use opschat_core::QuickAction;
use crate::app::{App, InputMode, SettingsField};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(),
    }
    app.poll_request().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Settings popup captures all other input while open
    if app.settings.is_some() {
        return handle_settings(app, key);
    }

    match key.code {
        KeyCode::F(1) => {
            app.run_quick_action(QuickAction::Analyze);
            return Ok(());
        }
        KeyCode::F(2) => {
            app.run_quick_action(QuickAction::Logs);
            return Ok(());
        }
        KeyCode::F(3) => {
            app.run_quick_action(QuickAction::Errors);
            return Ok(());
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.open_settings();
            return Ok(());
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return app.toggle_dark_mode();
        }
        _ => {}
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key)?,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to typing
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(app.half_page()),
        KeyCode::PageUp => app.scroll_up(app.half_page()),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('s') => app.open_settings(),
        KeyCode::Char('t') => app.toggle_dark_mode()?,

        // Quick actions
        KeyCode::Char('1') => app.run_quick_action(QuickAction::Analyze),
        KeyCode::Char('2') => app.run_quick_action(QuickAction::Logs),
        KeyCode::Char('3') => app.run_quick_action(QuickAction::Errors),

        _ => {}
    }
    Ok(())
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.insert_char('\n');
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::PageDown => app.scroll_down(app.half_page()),
        KeyCode::PageUp => app.scroll_up(app.half_page()),
        _ => {}
    }
}

fn handle_settings(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => app.close_settings(),
        KeyCode::Enter => {
            if let Err(e) = app.save_settings() {
                log::error!("Failed to save configuration: {:#}", e);
                app.show_notice(format!("Could not save configuration: {}", e));
            }
        }
        KeyCode::Tab | KeyCode::Down => {
            if let Some(form) = &mut app.settings {
                form.field = form.field.next();
            }
        }
        KeyCode::BackTab | KeyCode::Up => {
            if let Some(form) = &mut app.settings {
                form.field = form.field.prev();
            }
        }
        _ => {
            let Some(form) = &mut app.settings else {
                return Ok(());
            };
            if form.field == SettingsField::DarkMode {
                if key.code == KeyCode::Char(' ') {
                    form.dark_mode = !form.dark_mode;
                }
                return Ok(());
            }
            if let Some(text) = form.active_text_mut() {
                match key.code {
                    KeyCode::Char(c) => text.push(c),
                    KeyCode::Backspace => {
                        text.pop();
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;
    use opschat_core::{KeyValueStore, MemoryStore, Sender};

    fn app() -> App {
        let mut store = MemoryStore::new();
        store.set("apiUrl", "http://127.0.0.1:1".to_string()).unwrap();
        App::new(Box::new(store))
    }

    fn key(code: KeyCode) -> AppEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        let mut event = KeyEvent::new(code, modifiers);
        event.kind = KeyEventKind::Press;
        AppEvent::Key(event)
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_enter_submits_and_second_enter_is_rejected() {
        let mut app = app();
        type_text(&mut app, "hello").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.input.is_empty());
        assert!(app.session.is_sending());

        type_text(&mut app, "again").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        // The spawned request never runs on the test runtime, so the first
        // submission is still in flight and the draft survives
        assert!(app.session.is_sending());
        assert_eq!(app.input, "again");
        let users = app
            .session
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.sender == Sender::User)
            .count();
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn test_shift_enter_inserts_newline() {
        let mut app = app();
        type_text(&mut app, "a").await;
        handle_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::SHIFT))
            .await
            .unwrap();
        type_text(&mut app, "b").await;

        assert_eq!(app.input, "a\nb");
        assert!(!app.session.is_sending());
        assert!(app.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_blank_enter_does_nothing() {
        let mut app = app();
        type_text(&mut app, "   ").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.request_task.is_none());
        assert!(app.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_settings_popup_edits_and_saves() {
        let mut app = app();
        handle_event(&mut app, key_with(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert!(app.settings.is_some());

        // Move to the topic field and type a name
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        type_text(&mut app, "etl").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert!(app.settings.is_none());
        assert_eq!(app.session.config().topic_name.as_deref(), Some("etl"));
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_settings_escape_discards_changes() {
        let mut app = app();
        handle_event(&mut app, key_with(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        handle_event(&mut app, key(KeyCode::BackTab)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char(' '))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();

        assert!(app.settings.is_none());
        assert!(!app.dark_mode());
    }

    #[tokio::test]
    async fn test_normal_mode_keys() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_event(&mut app, key(KeyCode::Char('t'))).await.unwrap();
        assert!(app.dark_mode());

        handle_event(&mut app, key(KeyCode::Char('i'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_function_key_runs_quick_action() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::F(3))).await.unwrap();

        let first = &app.session.transcript().messages()[0];
        assert_eq!(first.text, "Show recent errors");
        assert!(app.session.is_sending());
        assert_eq!(app.session.transcript().len(), 2);
        assert!(app.session.transcript().has_typing());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_settings() {
        let mut app = app();
        app.open_settings();
        handle_event(&mut app, key_with(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_resize_leaves_state_alone() {
        let mut app = app();
        type_text(&mut app, "draft").await;
        handle_event(&mut app, AppEvent::Resize).await.unwrap();
        assert_eq!(app.input, "draft");
        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 4, 4);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(5, 5, rect));
        assert!(!point_in_rect(6, 2, rect));
        assert!(!point_in_rect(1, 3, rect));
    }
}
