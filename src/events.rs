use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator};

use crate::gateway::GatewayError;
use crate::model::ConversationRecord;

/// Conversation backends the client can talk to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backend {
    #[default]
    Gemini,
    #[strum(serialize = "chatgpt", serialize = "gpt", serialize = "openai")]
    ChatGpt,
}

impl Backend {
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Gemini => "Gemini",
            Backend::ChatGpt => "ChatGPT",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Backend::Gemini => "🧠",
            Backend::ChatGpt => "🤖",
        }
    }

    /// Route segment selecting this backend.
    pub fn route(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::ChatGpt => "chatgpt",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Backend::Gemini => "http://localhost:8085/api/gemini",
            Backend::ChatGpt => "http://localhost:8080/api/chatgpt",
        }
    }

    /// Environment variable overriding the base URL.
    pub fn url_env_var(&self) -> &'static str {
        match self {
            Backend::Gemini => "YENNI_GEMINI_URL",
            Backend::ChatGpt => "YENNI_CHATGPT_URL",
        }
    }

    /// Resolve a route such as `/chatgpt`. Empty or unknown routes land on Gemini.
    pub fn from_route(route: &str) -> Backend {
        let segment = route.trim().trim_matches('/');
        Backend::from_str(segment).unwrap_or_default()
    }

    /// The backend after this one in the sidebar menu, wrapping around.
    pub fn next(&self) -> Backend {
        let all: Vec<Backend> = Backend::iter().collect();
        let index = all.iter().position(|b| b == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }
}

/// Completion of a gateway call, delivered back to the controller that issued it
#[derive(Debug, Clone)]
pub enum GatewayReply {
    /// Reply to a new prompt; `thread` is the thread generation it was sent from
    Asked {
        thread: u64,
        result: Result<String, GatewayError>,
    },

    /// Full history listing; `seq` orders reloads
    Listed {
        seq: u64,
        result: Result<Vec<ConversationRecord>, GatewayError>,
    },

    /// Single conversation lookup
    Found {
        id: i64,
        result: Result<ConversationRecord, GatewayError>,
    },

    /// Logical or physical delete
    Deleted {
        id: i64,
        physical: bool,
        result: Result<(), GatewayError>,
    },

    /// Restore of a logically deleted conversation
    Restored {
        id: i64,
        result: Result<(), GatewayError>,
    },

    /// Question update; carries the text that was sent
    Updated {
        id: i64,
        question: String,
        result: Result<String, GatewayError>,
    },
}

/// TUI-specific events (keyboard, paste, resize)
#[derive(Debug, Clone)]
pub enum TuiEvent {
    Key(crossterm::event::KeyEvent),
    Paste(String),
    Resize(u16, u16),
    /// Nothing arrived before the tick elapsed
    Tick,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_resolution() {
        assert_eq!(Backend::from_route("/gemini"), Backend::Gemini);
        assert_eq!(Backend::from_route("chatgpt"), Backend::ChatGpt);
        assert_eq!(Backend::from_route("/ChatGPT/"), Backend::ChatGpt);
        assert_eq!(Backend::from_route(""), Backend::Gemini);
        assert_eq!(Backend::from_route("/"), Backend::Gemini);
        assert_eq!(Backend::from_route("/nowhere"), Backend::Gemini);
    }

    #[test]
    fn test_next_wraps() {
        assert_eq!(Backend::Gemini.next(), Backend::ChatGpt);
        assert_eq!(Backend::ChatGpt.next(), Backend::Gemini);
    }

    #[test]
    fn test_serde_names_match_routes() {
        for backend in Backend::iter() {
            let encoded = serde_json::to_string(&backend).unwrap();
            assert_eq!(encoded, format!("\"{}\"", backend.route()));
        }
    }
}
