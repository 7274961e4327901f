//! Agent reply → channel activity conversion.

use crate::channels::Activity;
use crate::directline::AgentActivity;

/// Converts agent replies into channel activities, preserving order. May expand one reply into several.
pub trait ResponseTranslator: Send + Sync {
    fn translate(&self, replies: &[AgentActivity]) -> Vec<Activity>;
}

/// One channel message per agent reply, carrying text, formatting, cards and suggested actions.
/// Addressing is left empty for the sink to fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranslator;

impl DefaultTranslator {
    fn convert(reply: &AgentActivity) -> Activity {
        Activity {
            typ: Activity::MESSAGE.to_string(),
            text: reply.text.clone(),
            text_format: reply.text_format.clone(),
            locale: reply.locale.clone(),
            attachments: reply.attachments.clone(),
            attachment_layout: reply.attachment_layout.clone(),
            suggested_actions: reply.suggested_actions.clone(),
            ..Activity::default()
        }
    }
}

impl ResponseTranslator for DefaultTranslator {
    fn translate(&self, replies: &[AgentActivity]) -> Vec<Activity> {
        replies.iter().map(Self::convert).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directline::AgentAccount;
    use serde_json::json;

    fn agent() -> AgentAccount {
        AgentAccount {
            id: "bot".to_string(),
            name: Some("Contoso".to_string()),
            role: Some("bot".to_string()),
        }
    }

    #[test]
    fn keeps_order_and_text() {
        let replies = vec![
            AgentActivity::message(agent(), "first"),
            AgentActivity::message(agent(), "second"),
        ];
        let out = DefaultTranslator.translate(&replies);
        let texts: Vec<_> = out.iter().map(|a| a.text.as_deref().unwrap_or("")).collect();
        assert_eq!(texts, ["first", "second"]);
        assert!(out.iter().all(|a| a.typ == "message"));
    }

    #[test]
    fn carries_cards_and_suggested_actions() {
        let mut reply = AgentActivity::message(agent(), "pick one");
        reply.text_format = Some("markdown".to_string());
        reply.attachments = vec![json!({ "contentType": "application/vnd.microsoft.card.hero" })];
        reply.attachment_layout = Some("carousel".to_string());
        reply.suggested_actions = Some(json!({ "actions": [{ "type": "imBack", "title": "Yes" }] }));

        let out = DefaultTranslator.translate(&[reply]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text_format.as_deref(), Some("markdown"));
        assert_eq!(out[0].attachments.len(), 1);
        assert_eq!(out[0].attachment_layout.as_deref(), Some("carousel"));
        assert!(out[0].suggested_actions.is_some());
        assert!(out[0].from.is_none());
    }

    #[test]
    fn empty_input_gives_nothing() {
        assert!(DefaultTranslator.translate(&[]).is_empty());
    }
}
