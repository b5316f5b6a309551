//! One-shot subcommands that run without the terminal interface.

use std::io::Write;
use anyhow::{anyhow, bail, Result};
use opschat_core::{render, ChatClient, ChatRequest, QuickAction, Session};

/// `opschat ask`: send `message` and print the reply.
pub async fn ask(
    session: &mut Session,
    message: &str,
    html: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let Some(request) = session.begin(message) else {
        bail!("Nothing to send");
    };
    send_once(session, request, html, out, err).await
}

/// `opschat quick`: run a named quick action and print the reply.
pub async fn quick(
    session: &mut Session,
    action: &str,
    html: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let Some(action) = QuickAction::from_str(action) else {
        bail!("Unknown quick action '{}'. Use analyze, logs or errors.", action);
    };
    let Some(request) = session.quick_action(action) else {
        bail!("Nothing to send");
    };
    send_once(session, request, html, out, err).await
}

/// Run one exchange. A failed exchange writes the transcript's error text,
/// remediation included, to `err` and returns the bare error.
async fn send_once(
    session: &mut Session,
    request: ChatRequest,
    html: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let client = ChatClient::new(session.config());
    let outcome = client.send(&request).await;
    let failure = outcome.as_ref().err().map(|e| e.to_string());
    session.complete(outcome);

    let reply = session
        .transcript()
        .last()
        .ok_or_else(|| anyhow!("No reply received"))?;
    if let Some(failure) = failure {
        writeln!(err, "{}", reply.text)?;
        bail!(failure);
    }

    if html {
        writeln!(out, "{}", reply.markup.to_html())?;
    } else {
        writeln!(out, "{}", reply.markup.to_plain())?;
    }
    if let Some(id) = session.conversation_id() {
        log::info!("Conversation id: {}", id);
    }
    Ok(())
}

/// `opschat history`: the newest `limit` exchanges, oldest first.
pub fn write_history(session: &Session, limit: usize, out: &mut impl Write) -> Result<()> {
    let entries = session.history().load_all();
    if entries.is_empty() {
        writeln!(out, "No conversation history yet.")?;
        return Ok(());
    }

    let start = entries.len().saturating_sub(limit);
    for entry in &entries[start..] {
        let local = entry.timestamp.with_timezone(&chrono::Local);
        writeln!(out, "[{}]", local.format("%Y-%m-%d %H:%M"))?;
        writeln!(out, "You: {}", entry.user_message)?;
        writeln!(out, "Agent: {}", render(&entry.agent_response).to_plain())?;
        if let Some(id) = &entry.conversation_id {
            writeln!(out, "(conversation {})", id)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opschat_core::{ConversationHistory, HistoryEntry, KeyValueStore, MemoryStore};

    fn session_for(url: &str) -> Session {
        let mut store = MemoryStore::new();
        store.set("apiUrl", url.to_string()).unwrap();
        Session::new(Box::new(store))
    }

    #[tokio::test]
    async fn test_ask_prints_plain_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(r#"{"response":"1) Summary\n- ok\n- **slow** step","conversation_id":"abc"}"#)
            .create_async()
            .await;

        let mut session = session_for(&server.url());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        ask(&mut session, "Analyze pipeline etl", false, &mut out, &mut err)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(String::from_utf8(out).unwrap(), "1) Summary\n• ok\n• slow step\n");
        assert!(err.is_empty());
        assert_eq!(session.conversation_id(), Some("abc"));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_quick_prints_html_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(r#"{"response":"See `job-7`"}"#)
            .create_async()
            .await;

        let mut session = session_for(&server.url());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        quick(&mut session, "ERRORS", true, &mut out, &mut err).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "See <code>job-7</code>\n");
        assert_eq!(session.transcript().messages()[0].text, "Show recent errors");
    }

    #[tokio::test]
    async fn test_network_failure_prints_remediation_and_fails() {
        let mut session = session_for("http://127.0.0.1:1");
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = ask(&mut session, "hello", false, &mut out, &mut err).await;

        let error = result.unwrap_err().to_string();
        assert!(error.starts_with("Network error"));
        let printed = String::from_utf8(err).unwrap();
        assert!(printed.starts_with("Error: Network error"));
        assert!(printed.contains("Possible solutions:"));
        assert!(out.is_empty());
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn test_api_error_prints_checklist() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut session = session_for(&server.url());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = ask(&mut session, "hello", false, &mut out, &mut err).await;

        assert_eq!(result.unwrap_err().to_string(), "API error (500): boom");
        let printed = String::from_utf8(err).unwrap();
        assert!(printed.contains("Check:"));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_blank_and_unknown_input_are_rejected() {
        let mut session = session_for("http://127.0.0.1:1");
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert!(ask(&mut session, "   ", false, &mut out, &mut err).await.is_err());
        let unknown = quick(&mut session, "deploy", false, &mut out, &mut err).await;
        assert!(unknown.unwrap_err().to_string().contains("Unknown quick action 'deploy'"));
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_history_respects_limit() {
        let mut store = MemoryStore::new();
        let mut history = ConversationHistory::default();
        for (question, id) in [("alpha", None), ("beta", None), ("gamma", Some("c-3"))] {
            let entry = HistoryEntry::new(question, format!("**{}** done", question), id.map(String::from));
            history.record(entry, &mut store).unwrap();
        }
        let session = Session::new(Box::new(store));

        let mut out = Vec::new();
        write_history(&session, 2, &mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();

        assert!(!printed.contains("alpha"));
        assert!(printed.contains("You: beta"));
        assert!(printed.contains("Agent: gamma done"));
        assert!(printed.contains("(conversation c-3)"));
        assert!(printed.find("beta").unwrap() < printed.find("gamma").unwrap());
    }

    #[test]
    fn test_empty_history_message() {
        let session = Session::new(Box::new(MemoryStore::new()));
        let mut out = Vec::new();
        write_history(&session, 10, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No conversation history yet.\n");
    }
}
