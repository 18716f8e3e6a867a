//! Postgres Fastpath Protocol
//!
//! Docs here mostly quoted from the official postgres documentation.
//!
//! ## Function Call
//!
//! The Function Call sub-protocol allows the client to request a direct call of any function
//! that exists in the database's `pg_proc` system catalog. The client must have execute
//! permission for the function.
//!
//! The client sends a `FunctionCall` message containing the object ID of the function to call,
//! and the argument values. The server then responds with zero or more `NoticeResponse` and
//! `NotificationResponse`, and exactly one `FunctionCallResponse` or `ErrorResponse`, followed
//! by `ReadyForQuery`.
//!
//! ## Protocol 3.0
//!
//! The first byte of a message identifies the message type, and the next four bytes specify
//! the length of the rest of the message (this length count includes itself, but not the
//! message-type byte).
//!
//! ```text
//! ┏━━━━┳━━━━━━━━━━━━━━━━━━━┳━━━━━━┓
//! ┃ Ty ┃       Length      ┃ Body ┃
//! ┣━━━━╋━━━━━━━━━━━━━━━━━━━╋━━━━━━┫
//! ┃ u8 ┃        u32        ┃ [u8] ┃
//! ┣━━━━╋━━━━━━━━━━━━━━━━━━━╋━━━━━━┫
//! ┃ 46 ┃ 00 | 00 | 00 | 18 ┃  ..  ┃
//! ┗━━━━┻━━━━━━━━━━━━━━━━━━━┻━━━━━━┛
//! ```
//!
//! ## Protocol 2.0
//!
//! Messages carry no length, the receiver must parse each message body to find its end.
//! Error and notice messages are a single nul terminated string.
//!
//! <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-FUNCTION-CALL>

mod version;

pub mod frontend;
pub mod backend;

mod error;

/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

pub use version::ProtocolVersion;
pub use backend::{DiagnosticRecord, Notification, TransactionStatus};
pub use error::ProtocolError;
