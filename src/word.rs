use crate::cell::Wstr;
use crate::engine::Engine;
use crate::ops::Inst;
use crate::throw::Wres;
use crate::wordlist::WordId;
use std::fmt;

pub type NativeFn = fn(&mut Engine) -> Wres;

#[derive(Clone, Copy)]
pub struct NativePtr(pub NativeFn);

impl PartialEq for NativePtr {
    fn eq(&self, other: &Self) -> bool {
        (self.0 as usize) == (other.0 as usize)
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0 as usize)
    }
}

/// Execution token: what a word is. Instruction tokens, native pointers and
/// threaded-code entries live in separate variants, so the three kinds can
/// never collide in value space.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Xt {
    Inst(Inst),
    Native(NativePtr),
    Code(usize),
}

const IMMEDIATE_BIT: u8 = 1;
const COMPILE_ONLY_BIT: u8 = 1 << 1;
const SMUDGE_BIT: u8 = 1 << 2;
const HIDDEN_BIT: u8 = 1 << 3;

#[derive(Clone, Copy, Default, PartialEq)]
pub struct WordFlags(u8);

impl WordFlags {
    pub fn immediate(&self) -> bool {
        self.0 & IMMEDIATE_BIT != 0
    }

    pub fn set_immediate(self) -> Self {
        WordFlags(self.0 | IMMEDIATE_BIT)
    }

    pub fn compile_only(&self) -> bool {
        self.0 & COMPILE_ONLY_BIT != 0
    }

    pub fn set_compile_only(self) -> Self {
        WordFlags(self.0 | COMPILE_ONLY_BIT)
    }

    pub fn smudged(&self) -> bool {
        self.0 & SMUDGE_BIT != 0
    }

    pub fn set_smudge(self) -> Self {
        WordFlags(self.0 | SMUDGE_BIT)
    }

    pub fn clear_smudge(self) -> Self {
        WordFlags(self.0 & !SMUDGE_BIT)
    }

    pub fn hidden(&self) -> bool {
        self.0 & HIDDEN_BIT != 0
    }

    pub fn set_hidden(self) -> Self {
        WordFlags(self.0 | HIDDEN_BIT)
    }
}

impl fmt::Debug for WordFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (on, tag) in [
            (self.immediate(), "immediate"),
            (self.compile_only(), "compile-only"),
            (self.smudged(), "smudge"),
            (self.hidden(), "hidden"),
        ] {
            if on {
                write!(f, "{}{}", sep, tag)?;
                sep = "|";
            }
        }
        Ok(())
    }
}

/// Dictionary entry header. `link` chains the previous word in the same
/// hash bucket. The marks record the code/data arena lengths taken when the
/// header was appended, which is all forget/abort need to roll back.
#[derive(Clone, Debug)]
pub struct Word {
    pub name: Wstr,
    pub hash: u16,
    pub link: Option<WordId>,
    pub xt: Xt,
    pub flags: WordFlags,
    pub code_mark: usize,
    pub data_mark: usize,
}

impl Word {
    pub fn visible(&self) -> bool {
        !self.flags.smudged() && !self.flags.hidden()
    }
}
