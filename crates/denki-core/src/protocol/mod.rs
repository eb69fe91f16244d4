//! Protocol module - wire constants and message classification.

pub mod constants;
pub mod message;

pub use constants::*;
pub use message::{Message, MessageKind, VendorSignature, classify, format_hex};
