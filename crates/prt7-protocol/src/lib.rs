//! PRT-7 Frame Protocol
//!
//! This crate decodes a hidden message carried as a stream of small text
//! frames. Each frame either contributes one character or turns the decoding
//! rotor.
//!
//! # Protocol Overview
//!
//! - **Lines**: one frame per `\n`-terminated line; `\r` is ignored
//! - **Load frames**: `L,<char>` - decode `<char>` through the rotor and append it
//! - **Map frames**: `M,<int>` - turn the rotor by a signed number of positions
//!
//! The rotor is a Caesar shift over `A`..=`Z`. Letters are case-folded before
//! decoding and everything else passes through unchanged.
//!
//! # Example
//!
//! ```rust
//! use prt7_protocol::{Accumulator, Frame, Rotor};
//!
//! let mut message = Accumulator::new();
//! let mut rotor = Rotor::new();
//!
//! for line in ["M,2", "L,A", "L,B"] {
//!     let frame = Frame::parse(line)?;
//!     frame.apply(&mut message, &mut rotor);
//! }
//!
//! assert_eq!(message.render(), "CD");
//! # Ok::<(), prt7_protocol::FrameError>(())
//! ```

mod accumulator;
mod codec;
mod encoder;
mod error;
mod frame;
mod rotor;

pub use accumulator::*;
pub use codec::*;
pub use encoder::*;
pub use error::*;
pub use frame::*;
pub use rotor::*;
