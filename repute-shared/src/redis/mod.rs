/// Redis integration for push notifications
///
/// ```text
/// ┌─────────────┐
/// │   Worker    │ ──XADD MAXLEN ~1000──> notifications:{user_id}
/// └─────────────┘
///                                              │
///                                              │ XREAD (BLOCK)
///                                              ▼
///                                       ┌─────────────┐
///                                       │  API (SSE)  │
///                                       └─────────────┘
/// ```

pub mod client;
pub mod stream_reader;
pub mod stream_writer;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use stream_reader::{LiveTail, StreamReader, StreamReaderConfig, StreamReaderError};
pub use stream_writer::{StreamWriter, StreamWriterConfig, StreamWriterError};
