mod range;
pub mod time;

pub use range::RangedUri;
pub(crate) use range::parse_byte_range;
