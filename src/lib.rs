pub mod cell;
pub mod dict;
pub mod engine;
pub mod env;
pub mod input;
pub mod number;
pub mod ops;
pub mod prims;
pub mod search;
pub mod stack;
pub mod system;
pub mod throw;
pub mod vm;
pub mod word;
pub mod wordlist;

#[cfg(feature = "stdio")]
pub mod repl;

pub mod prelude {
    pub use crate::cell::{Cell, Wflt, Wint, Wstr, Wsubstr, Wuint};
    pub use crate::engine::{Engine, ParseStep, ParseStepFn};
    pub use crate::system::{Config, VmId, Weft};
    pub use crate::throw::{Throw, Wres, Wres1, OK};
    pub use crate::word::{NativeFn, Xt};
}
