//! # Share Ledger Wire
//!
//! How ledger entities cross a connection between two devices.
//!
//! ## Overview
//!
//! Every message is an [`Envelope`], CBOR-encoded and prefixed with its
//! length as a big-endian `u32`. Frames above [`MAX_MESSAGE_SIZE`] are
//! rejected from the prefix alone, before any payload is buffered.
//! Paired devices may additionally seal frames with a [`SessionCipher`].
//!
//! ## Exchange
//!
//! ```text
//! Receiver                            Sender
//!   |-------- TransferRequest -------->|
//!   |-------- ChainPosition ---------->|
//!   |<------- ProposedRecord ----------|   sender-signed
//!   |-------- ShareRecord ------------>|   countersigned
//! ```
//!
//! The transport itself (BLE, Wi-Fi Direct, TCP) is out of scope; anything
//! implementing tokio's `AsyncRead`/`AsyncWrite` carries frames.

pub mod cipher;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod stream;

pub use cipher::SessionCipher;
pub use codec::{decode_frame, encode_frame, FrameDecoder, LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE};
pub use envelope::{limits, Envelope};
pub use error::{Result, WireError};
pub use stream::{read_frame, write_frame};
