//! The 5250 data stream: byte constants, the inbound decoder, and the
//! outbound encoder (§4.3, §4.5).

pub mod codes;
pub mod decoder;
pub mod encoder;
pub mod structured_field;

pub use codes::{Aid, CommandCode, OrderCode};
pub use decoder::{DecodeOutcome, Decoder, ReadRequest};
pub use encoder::Encoder;
