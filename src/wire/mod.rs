// tlz wire format.
//
// - `tag`:  op tags (Literal/Copy/Meta) and copy offsets
// - `meta`: meta records and the stream header

pub mod meta;
pub mod tag;

pub use meta::{MAGIC, Meta, MetaError, VERSION};
pub use tag::{Kind, Tag, TagError};
