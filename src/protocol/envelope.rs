use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::ProtocolError;

use super::Content;

/// Ontology attached to route proposals.
pub const ROUTE_ASSIGNMENT_ONTOLOGY: &str = "route-assignment";

static CONVERSATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Correlates a reply with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(pub u64);

impl ConversationId {
    /// Allocates a fresh id, unique for the process.
    pub fn next() -> Self {
        ConversationId(CONVERSATION_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conv-{}", self.0)
    }
}

/// Speech act of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Performative {
    Request,
    Inform,
    Refuse,
}

impl Performative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Performative::Request => "REQUEST",
            Performative::Inform => "INFORM",
            Performative::Refuse => "REFUSE",
        }
    }
}

/// A message in flight between two agents.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub performative: Performative,
    pub ontology: Option<&'static str>,
    pub conversation_id: ConversationId,
    /// Directory name of the sending agent. Authoritative over any name in the content.
    pub sender: String,
    pub content: String,
}

impl Envelope {
    /// Encodes `content` and wraps it with the performative and ontology its kind requires.
    pub fn new(
        sender: impl Into<String>,
        conversation_id: ConversationId,
        content: &Content,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            performative: content.performative(),
            ontology: content.ontology(),
            conversation_id,
            sender: sender.into(),
            content: content.encode()?,
        })
    }

    /// Builds a reply in the same conversation.
    pub fn reply(&self, sender: impl Into<String>, content: &Content) -> Result<Self, ProtocolError> {
        Envelope::new(sender, self.conversation_id, content)
    }

    /// Parses the content and checks it travels with the right performative.
    pub fn decode(&self) -> Result<Content, ProtocolError> {
        let content = Content::parse(&self.content)?;
        let expected = content.performative();
        if expected != self.performative {
            return Err(ProtocolError::PerformativeMismatch {
                kind: content.kind(),
                expected: expected.as_str(),
                actual: self.performative.as_str(),
            });
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_checks_performative() {
        let env = Envelope {
            performative: Performative::Request,
            ontology: None,
            conversation_id: ConversationId(1),
            sender: "truck-1".into(),
            content: "ARRIVED_AT_DEPOT".into(),
        };
        let err = env.decode().unwrap_err();
        assert_eq!(err.as_label(), "protocol_performative_mismatch");
    }

    #[test]
    fn reply_keeps_the_conversation() {
        let query = Envelope::new("coordinator", ConversationId(42), &Content::QueryCapability).unwrap();
        assert_eq!(query.performative, Performative::Request);

        let reply = query.reply("truck-1", &Content::ArrivedAtDepot).unwrap();
        assert_eq!(reply.conversation_id, ConversationId(42));
        assert_eq!(reply.sender, "truck-1");
        assert_eq!(reply.performative, Performative::Inform);
    }
}
