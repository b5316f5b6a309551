/// Canned shortcuts that synthesize a message and submit it right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    Analyze,
    Logs,
    Errors,
}

impl QuickAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickAction::Analyze => "analyze",
            QuickAction::Logs => "logs",
            QuickAction::Errors => "errors",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "analyze" => Some(QuickAction::Analyze),
            "logs" => Some(QuickAction::Logs),
            "errors" => Some(QuickAction::Errors),
            _ => None,
        }
    }

    pub fn all() -> Vec<QuickAction> {
        vec![QuickAction::Analyze, QuickAction::Logs, QuickAction::Errors]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            QuickAction::Analyze => "Analyze pipeline",
            QuickAction::Logs => "Check logs",
            QuickAction::Errors => "Recent errors",
        }
    }

    /// The message sent on behalf of the user, mentioning the topic if one is configured.
    pub fn message(&self, topic: Option<&str>) -> String {
        match (self, topic) {
            (QuickAction::Analyze, Some(topic)) => format!("Analyze pipeline {}", topic),
            (QuickAction::Analyze, None) => "Analyze pipeline".to_string(),
            (QuickAction::Logs, Some(topic)) => format!("Check logs for {}", topic),
            (QuickAction::Logs, None) => "Check logs".to_string(),
            (QuickAction::Errors, _) => "Show recent errors".to_string(),
        }
    }
}
