pub mod metrics;
pub mod persistence;
pub mod providers;
pub mod registry;
pub mod relay;

pub use persistence::{DisabledTranscriptSink, MemoryTranscriptStore, MongoTranscriptStore, TranscriptSink};
pub use registry::SessionRegistry;
pub use relay::{HttpRelayClient, ProviderRelay, Relay, RelayError, RelayReply};
