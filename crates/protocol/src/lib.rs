//! Wire types and constants for the TransfertPro HTTP API.
//!
//! TransfertPro's JSON payloads use PascalCase member names and wrap every
//! array in a `{"$values": [...]}` envelope (an artifact of the server's
//! serializer). The types here mirror that format exactly; higher-level
//! behavior lives in `transfertpro-client`.

pub mod types;

pub use types::{DirectoryNode, FileDescriptor, FileEntry, TokenResponse, Values};

/// Chunk size threshold: 8 MiB.
///
/// Files smaller than this go up in a single transfer call; larger files are
/// split into sequential chunks of exactly this many bytes (the last chunk
/// may be smaller).
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// All-zero UUID the server uses to mean "no share context".
pub const NIL_SHARE_ID: &str = "00000000-0000-0000-0000-000000000000";
