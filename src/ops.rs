use crate::cell::Wint;
use crate::word::NativePtr;

/// Zero-operand instruction tokens: the hot primitives dispatched inline by
/// the inner loop instead of through a native call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Inst {
    Nop,
    // stack
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
    Nip,
    Tuck,
    QDup,
    Depth,
    Pick,
    Roll,
    TwoDup,
    TwoDrop,
    TwoSwap,
    TwoOver,
    // return stack
    ToR,
    RFrom,
    RFetch,
    // loop bookkeeping
    I,
    J,
    K,
    Unloop,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    DivMod,
    OnePlus,
    OneMinus,
    TwoStar,
    TwoSlash,
    Negate,
    Abs,
    Min,
    Max,
    // bitwise
    And,
    Or,
    Xor,
    Invert,
    LShift,
    RShift,
    // comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    ULt,
    UGt,
    ZeroEq,
    ZeroNe,
    ZeroLt,
    ZeroGt,
    // memory
    Fetch,
    Store,
    PlusStore,
}

/// Inline literal band: integers in this range compile to a dedicated
/// single-slot form, everything else goes through the literal pool.
pub const SMALL_INT_MIN: Wint = -16;
pub const SMALL_INT_MAX: Wint = 16;

/// One slot of threaded code. Branch operands are relative slot offsets from
/// the branching instruction itself; `Lit` and `Bind`/`Local` operands index
/// the data space and the current locals frame.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Op {
    Nop,
    Inst(Inst),
    Native(NativePtr),
    Call(usize),
    SmallInt(i8),
    Lit(usize),
    Branch(isize),
    Branch0(isize),
    Do(isize),
    QDo(isize),
    Loop(isize),
    PlusLoop(isize),
    Of(isize),
    Leave,
    Link,
    Bind(u16),
    Local(u16),
    Unlink,
    Does,
    Ret,
}

pub fn jump_offset(origin: usize, dest: usize) -> isize {
    if origin > dest {
        -((origin - dest) as isize)
    } else {
        (dest - origin) as isize
    }
}

pub fn jump_target(origin: usize, rel: isize) -> usize {
    (origin as isize + rel) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_round_trip() {
        assert_eq!(3, jump_offset(2, 5));
        assert_eq!(-4, jump_offset(6, 2));
        assert_eq!(0, jump_offset(7, 7));
        assert_eq!(5, jump_target(2, 3));
        assert_eq!(2, jump_target(6, -4));
    }

    #[test]
    fn test_small_int_band_fits_inline_form() {
        assert!(SMALL_INT_MIN >= i8::MIN as Wint);
        assert!(SMALL_INT_MAX <= i8::MAX as Wint);
    }
}
