use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: String,
}

/// One entry of the transcript. Identity is its position in the sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(UserMessage { content: content.into() })
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage { content: content.into() })
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User(message) => &message.content,
            Self::Assistant(message) => &message.content,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFlags {
    pub needs_web_fallback: bool,
    pub is_conversational: bool,
    pub is_weather_query: bool,
}

/// State threaded through one turn. Nodes read it and hand back a [`StateDelta`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub flags: RouteFlags,
    pub context: String,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, ..Self::default() }
    }

    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|message| match message {
            Message::User(user) => Some(user.content.as_str()),
            Message::Assistant(_) => None,
        })
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|message| match message {
            Message::Assistant(assistant) => Some(assistant.content.as_str()),
            Message::User(_) => None,
        })
    }

    /// Consumes the state and returns it with `delta` merged in.
    pub fn merge(mut self, delta: StateDelta) -> Self {
        self.messages.extend(delta.messages);
        if let Some(flags) = delta.flags {
            self.flags = flags;
        }
        if let Some(context) = delta.context {
            self.context = context;
        }
        if let Some(window) = delta.history_window {
            let excess = self.messages.len().saturating_sub(window);
            self.messages.drain(..excess);
        }
        self
    }
}

/// What a node is allowed to change. Merge order: append, flags, context, trim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub flags: Option<RouteFlags>,
    pub context: Option<String>,
    pub history_window: Option<usize>,
}

impl StateDelta {
    pub fn reply(content: impl Into<String>) -> Self {
        Self { messages: vec![Message::assistant(content)], ..Self::default() }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self { messages, ..Self::default() }
    }

    pub fn flags(flags: RouteFlags) -> Self {
        Self { flags: Some(flags), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationState, Message, Role, RouteFlags, StateDelta};

    #[test]
    fn latest_user_text_skips_assistant_messages() {
        let state = ConversationState::new(vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::assistant("another"),
        ]);

        assert_eq!(state.latest_user_text(), Some("second"));
        assert_eq!(state.last_assistant_text(), Some("another"));
    }

    #[test]
    fn merge_appends_then_trims_to_window() {
        let state = ConversationState::new((0..5).map(|i| Message::user(format!("m{i}"))).collect());
        let delta = StateDelta {
            messages: vec![Message::assistant("answer")],
            context: Some("3 messages in context".to_owned()),
            history_window: Some(3),
            ..StateDelta::default()
        };

        let merged = state.merge(delta);

        assert_eq!(merged.messages.len(), 3);
        assert_eq!(merged.messages[0].content(), "m3");
        assert_eq!(merged.messages[2].role(), Role::Assistant);
        assert_eq!(merged.context, "3 messages in context");
    }

    #[test]
    fn flags_only_change_when_delta_carries_them() {
        let flags = RouteFlags { is_weather_query: true, ..RouteFlags::default() };
        let state = ConversationState::default().merge(StateDelta::flags(flags));
        let state = state.merge(StateDelta::reply("ok"));

        assert!(state.flags.is_weather_query);
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn message_serializes_with_role_tag() {
        let json = serde_json::to_value(Message::user("hi")).expect("serialize");
        assert_eq!(json, serde_json::json!({ "role": "user", "content": "hi" }));
    }
}
