pub use self::{board::*, cell::ItemType, tetromino::*};

pub(crate) mod board;
pub mod cell;
pub(crate) mod tetromino;
