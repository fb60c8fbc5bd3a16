//! Domain layer: entities, value objects, the risk policy and the ports
//! the application layer is written against.

pub mod account;
pub mod events;
pub mod invoice;
pub mod ports;
pub mod risk;
