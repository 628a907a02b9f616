mod list;
mod utils;

pub use list::{InsertResult, Iter, RawList};
pub use utils::Counter;
