//! Frame codecs
//!
//! One framing per transport. Both reassemble fragmented messages so that
//! callers never observe continuation frames.

pub mod tcp;
pub mod websocket;
