//! # Agent message protocol.
//!
//! Coordinator and workers exchange [`Envelope`]s through their mailboxes. The
//! envelope carries the routing metadata (performative, ontology, sender,
//! conversation id) and a textual `content` in the `KEY:value|KEY:value` wire
//! format. Receivers turn the content into a typed [`Content`] with
//! [`Envelope::decode`], which is fail-closed: a missing, duplicated, unknown or
//! malformed field rejects the whole message.
//!
//! ## Exchanges
//! ```text
//! Coordinator                                    Worker
//!     │ REQUEST  QUERY_CAPABILITY                  │
//!     ├───────────────────────────────────────────►│
//!     │ INFORM   CAPACITY:..|MAX_DISTANCE:..|...   │
//!     │◄───────────────────────────────────────────┤
//!     │ REQUEST  ROUTE_ASSIGNMENT:ROUTE:..|...     │  (ontology "route-assignment")
//!     ├───────────────────────────────────────────►│
//!     │ INFORM   ROUTE_ACCEPTED:..   or            │
//!     │ REFUSE   ROUTE_REJECTED:..|REASON:..       │
//!     │◄───────────────────────────────────────────┤
//!     │                 ... route executes ...     │
//!     │ INFORM   ARRIVED_AT_DEPOT                  │
//!     │◄───────────────────────────────────────────┤
//! ```
//!
//! ## Number formatting
//! - coordinates, distances and depot position: two decimals (`12.50`);
//! - capability floats: shortest round-trip form, always with a fractional part (`1000.0`).

mod content;
mod envelope;
mod fields;

pub use content::{
    CapabilityReport, Content, RejectReason, RouteAccepted, RouteProposal, RouteRejected,
};
pub use envelope::{ConversationId, Envelope, Performative, ROUTE_ASSIGNMENT_ONTOLOGY};

/// Whether `name` can travel as an agent name (non-empty, no `|`, `:`, `,` or `;`).
pub fn is_valid_name(name: &str) -> bool {
    fields::check_name("NAME", name).is_ok()
}
