//! Filter streams: custom backends layered over other streams.

pub mod basen;
pub mod concat;

pub use basen::{Alphabet, BaseNFilter, Decoder, Direction, Encoder, decode_to_vec, encode_to_vec, open_basen};
pub use concat::{ConcatFilter, open_concat};
