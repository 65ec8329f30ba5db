pub mod registry;
pub mod relay;
pub mod state;
pub mod stats;

pub use registry::{BroadcastReport, DeliveryError, Frame, SubscriberId, SubscriberRegistry, Subscription};
pub use relay::{RelayService, UpdateAck};
pub use state::{SharedState, Snapshot};
pub use stats::{RelayStats, StatsSnapshot};
