//! Console log relay: tails the log store and forwards entries to chat
//! destinations, failing over from the live feed to polling.

pub mod channels;
pub mod classifier;
pub mod coordinator;
pub mod cursor;
pub mod entry;
pub mod forwarder;
pub mod pull;
pub mod push;
pub mod sink;
pub mod status;

pub use channels::{
    ChannelLayout, ChannelProvisioner, ChannelResolver, ChannelSet, CommunityId, ProvisionError,
};
pub use classifier::{classify, format_entry, Classification, Destination, ForwardingPolicy};
pub use coordinator::{FailoverCoordinator, ModeEvent, TailingMode};
pub use cursor::Cursor;
pub use entry::{LogEntry, LogLevel, Position};
pub use forwarder::{Forwarder, Outcome};
pub use pull::{PullTailer, TickReport};
pub use push::{PushExit, PushTailer};
pub use sink::{DestinationId, NotificationSink, SinkError};
pub use status::{RelaySnapshot, RelayStats, StatusBoard};
