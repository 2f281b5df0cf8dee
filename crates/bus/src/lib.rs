pub mod bus;
pub mod error;
pub mod memory;
pub mod message;
pub mod redis_bus;

pub use bus::Bus;
pub use error::BusError;
pub use memory::MemoryBus;
pub use message::{PendingEntry, StreamEntry, StreamGroupInfo, StreamRead};
pub use redis_bus::RedisBus;
