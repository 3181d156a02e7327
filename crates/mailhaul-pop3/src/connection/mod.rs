//! Connection management: transports, framing, configuration.

mod config;
mod framed;
mod stream;

pub use config::{
    Config, ConfigBuilder, DEFAULT_TIMEOUT, POP3_PORT, POP3S_PORT, Security, TlsPolicy,
    compute_defaults,
};
pub use framed::{FramedStream, MAX_LINE_LENGTH, PayloadReader};
pub use stream::{Pop3Stream, TlsUpgrade, connect_plain, connect_tls};
