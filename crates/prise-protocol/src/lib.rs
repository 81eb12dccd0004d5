//! Wire schema, binary framing codec, RPC correlation, and error kinds
//! shared by `prise-daemon` and `prise-client` (§4.1, §6, §7).

pub mod codec;
pub mod errors;
pub mod message;
pub mod rpc;
pub mod wire_types;
