//! Bridge from typed tool invocations to the upstream `execute_kw` JSON-RPC API.

pub mod bridge;
pub mod envelope;
pub mod error;
pub mod resolver;
pub mod transport;

pub use {
    bridge::{NormalizedResult, ProtocolBridge},
    envelope::{RawCall, UpstreamEnvelope},
    error::{BridgeError, TRANSPORT_ERROR_CODE},
    resolver::{EffectiveCallParameters, ResolveError, explicit_profile, resolve},
    transport::{HttpTransport, UpstreamTransport, interpret_reply},
};
