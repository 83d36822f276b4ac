use crate::cell::{fmt_uint, Cell, Wint, FALSE, TRUE};
use crate::dict::Dict;
use crate::engine::Engine;
use crate::ops::Inst;
use crate::throw::{Throw, Wres, OK};
use std::convert::TryFrom;

// --- memory words ---

fn core_word_here(en: &mut Engine) -> Wres {
    let a = en.dict.data_here();
    en.vm.ds.push(Cell::Addr(a))
}

fn core_word_allot(en: &mut Engine) -> Wres {
    let n = en.vm.ds.pop()?.to_usize()?;
    en.dict.allot(n)
}

fn core_word_comma(en: &mut Engine) -> Wres {
    let c = en.vm.ds.pop()?;
    en.dict.data_push(c)?;
    OK
}

fn core_word_unused(en: &mut Engine) -> Wres {
    let n = en.dict.unused() as Wint;
    en.vm.ds.push(Cell::Int(n))
}

// --- radix and vm registers ---

fn core_word_base(en: &mut Engine) -> Wres {
    let a = en.vm.base_addr;
    en.vm.ds.push(Cell::Addr(a))
}

fn core_word_state(en: &mut Engine) -> Wres {
    let a = en.vm.state_addr;
    en.vm.ds.push(Cell::Addr(a))
}

fn core_word_pad(en: &mut Engine) -> Wres {
    let a = en.vm.pad_addr;
    en.vm.ds.push(Cell::Addr(a))
}

fn core_word_decimal(en: &mut Engine) -> Wres {
    en.dict.data_set(en.vm.base_addr, Cell::Int(10))
}

fn core_word_hex(en: &mut Engine) -> Wres {
    en.dict.data_set(en.vm.base_addr, Cell::Int(16))
}

// --- output ---

fn core_word_dot(en: &mut Engine) -> Wres {
    let base = en.current_base()?;
    let c = en.vm.ds.pop()?;
    let text = c.to_text(base);
    en.print(&text);
    en.print(" ");
    OK
}

fn core_word_u_dot(en: &mut Engine) -> Wres {
    let base = en.current_base()?;
    let n = en.vm.ds.pop()?.to_uint()?;
    en.print(&fmt_uint(n, base));
    en.print(" ");
    OK
}

fn core_word_dot_s(en: &mut Engine) -> Wres {
    let base = en.current_base()?;
    let mut text = format!("<{}>", en.vm.ds.len());
    for c in en.vm.ds.iter() {
        text.push(' ');
        text.push_str(&c.to_text(base));
    }
    text.push(' ');
    en.print(&text);
    OK
}

pub fn core_word_type(en: &mut Engine) -> Wres {
    let s = en.vm.ds.pop()?.to_str()?;
    en.print(&s);
    OK
}

fn core_word_emit(en: &mut Engine) -> Wres {
    let n = en.vm.ds.pop()?.to_int()?;
    let c = u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or(Throw::RESULT_OUT_OF_RANGE)?;
    en.print(c.encode_utf8(&mut [0u8; 4]));
    OK
}

fn core_word_cr(en: &mut Engine) -> Wres {
    en.print("\n");
    OK
}

fn core_word_space(en: &mut Engine) -> Wres {
    en.print(" ");
    OK
}

fn core_word_spaces(en: &mut Engine) -> Wres {
    let n = en.vm.ds.pop()?.to_usize()?;
    for _ in 0..n {
        en.print(" ");
    }
    OK
}

fn core_word_words(en: &mut Engine) -> Wres {
    let wid = match en.dict.get_order().last() {
        Some(wid) => *wid,
        None => return OK,
    };
    let names = en.dict.list_words(wid);
    let mut line = String::new();
    for name in &names {
        if !line.is_empty() && line.len() + name.len() >= 64 {
            line.push('\n');
            en.print(&line);
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(name);
    }
    line.push('\n');
    en.print(&line);
    OK
}

// --- floats ---

fn flt_binary(en: &mut Engine, f: impl Fn(f64, f64) -> f64) -> Wres {
    let b = en.vm.ds.pop()?.to_flt_coerce()?;
    let a = en.vm.ds.pop()?.to_flt_coerce()?;
    en.vm.ds.push(Cell::Flt(f(a, b)))
}

fn core_word_f_add(en: &mut Engine) -> Wres {
    flt_binary(en, |a, b| a + b)
}

fn core_word_f_sub(en: &mut Engine) -> Wres {
    flt_binary(en, |a, b| a - b)
}

fn core_word_f_mul(en: &mut Engine) -> Wres {
    flt_binary(en, |a, b| a * b)
}

fn core_word_f_div(en: &mut Engine) -> Wres {
    flt_binary(en, |a, b| a / b)
}

fn core_word_f_negate(en: &mut Engine) -> Wres {
    let a = en.vm.ds.pop()?.to_flt_coerce()?;
    en.vm.ds.push(Cell::Flt(-a))
}

fn core_word_s_to_f(en: &mut Engine) -> Wres {
    let n = en.vm.ds.pop()?.to_int()?;
    en.vm.ds.push(Cell::Flt(n as f64))
}

fn core_word_f_to_s(en: &mut Engine) -> Wres {
    let f = en.vm.ds.pop()?.to_flt_coerce()?;
    if !f.is_finite() {
        return Err(Throw::FLOATING_OUT_OF_RANGE);
    }
    en.vm.ds.push(Cell::Int(f as Wint))
}

fn core_word_f_dot(en: &mut Engine) -> Wres {
    let f = en.vm.ds.pop()?.to_flt_coerce()?;
    let text = Cell::Flt(f).to_text(10);
    en.print(&text);
    en.print(" ");
    OK
}

/// Stack, arithmetic, memory and output vocabulary.
pub fn load(dict: &mut Dict) -> Wres {
    dict.def_inst("dup", Inst::Dup)?;
    dict.def_inst("drop", Inst::Drop)?;
    dict.def_inst("swap", Inst::Swap)?;
    dict.def_inst("over", Inst::Over)?;
    dict.def_inst("rot", Inst::Rot)?;
    dict.def_inst("nip", Inst::Nip)?;
    dict.def_inst("tuck", Inst::Tuck)?;
    dict.def_inst("?dup", Inst::QDup)?;
    dict.def_inst("depth", Inst::Depth)?;
    dict.def_inst("pick", Inst::Pick)?;
    dict.def_inst("roll", Inst::Roll)?;
    dict.def_inst("2dup", Inst::TwoDup)?;
    dict.def_inst("2drop", Inst::TwoDrop)?;
    dict.def_inst("2swap", Inst::TwoSwap)?;
    dict.def_inst("2over", Inst::TwoOver)?;
    dict.def_inst(">r", Inst::ToR)?;
    dict.def_inst("r>", Inst::RFrom)?;
    dict.def_inst("r@", Inst::RFetch)?;
    dict.def_inst("+", Inst::Add)?;
    dict.def_inst("-", Inst::Sub)?;
    dict.def_inst("*", Inst::Mul)?;
    dict.def_inst("/", Inst::Div)?;
    dict.def_inst("mod", Inst::Mod)?;
    dict.def_inst("/mod", Inst::DivMod)?;
    dict.def_inst("1+", Inst::OnePlus)?;
    dict.def_inst("1-", Inst::OneMinus)?;
    dict.def_inst("2*", Inst::TwoStar)?;
    dict.def_inst("2/", Inst::TwoSlash)?;
    dict.def_inst("negate", Inst::Negate)?;
    dict.def_inst("abs", Inst::Abs)?;
    dict.def_inst("min", Inst::Min)?;
    dict.def_inst("max", Inst::Max)?;
    dict.def_inst("and", Inst::And)?;
    dict.def_inst("or", Inst::Or)?;
    dict.def_inst("xor", Inst::Xor)?;
    dict.def_inst("invert", Inst::Invert)?;
    dict.def_inst("lshift", Inst::LShift)?;
    dict.def_inst("rshift", Inst::RShift)?;
    dict.def_inst("=", Inst::Eq)?;
    dict.def_inst("<>", Inst::Ne)?;
    dict.def_inst("<", Inst::Lt)?;
    dict.def_inst(">", Inst::Gt)?;
    dict.def_inst("<=", Inst::Le)?;
    dict.def_inst(">=", Inst::Ge)?;
    dict.def_inst("u<", Inst::ULt)?;
    dict.def_inst("u>", Inst::UGt)?;
    dict.def_inst("0=", Inst::ZeroEq)?;
    dict.def_inst("0<>", Inst::ZeroNe)?;
    dict.def_inst("0<", Inst::ZeroLt)?;
    dict.def_inst("0>", Inst::ZeroGt)?;
    dict.def_inst("@", Inst::Fetch)?;
    dict.def_inst("!", Inst::Store)?;
    dict.def_inst("+!", Inst::PlusStore)?;
    dict.def_inst("cells", Inst::Nop)?;
    dict.def_inst("cell+", Inst::OnePlus)?;
    dict.def_inst("chars", Inst::Nop)?;
    dict.def_inst("char+", Inst::OnePlus)?;
    dict.def_inst("align", Inst::Nop)?;
    dict.def_inst("aligned", Inst::Nop)?;
    dict.def_constant("true", TRUE)?;
    dict.def_constant("false", FALSE)?;
    dict.def_constant("bl", Cell::Int(32))?;
    dict.defword("here", core_word_here)?;
    dict.defword("allot", core_word_allot)?;
    dict.defword(",", core_word_comma)?;
    dict.defword("unused", core_word_unused)?;
    dict.defword("base", core_word_base)?;
    dict.defword("state", core_word_state)?;
    dict.defword("pad", core_word_pad)?;
    dict.defword("decimal", core_word_decimal)?;
    dict.defword("hex", core_word_hex)?;
    dict.defword(".", core_word_dot)?;
    dict.defword("u.", core_word_u_dot)?;
    dict.defword(".s", core_word_dot_s)?;
    dict.defword("type", core_word_type)?;
    dict.defword("emit", core_word_emit)?;
    dict.defword("cr", core_word_cr)?;
    dict.defword("space", core_word_space)?;
    dict.defword("spaces", core_word_spaces)?;
    dict.defword("words", core_word_words)?;
    dict.defword("f+", core_word_f_add)?;
    dict.defword("f-", core_word_f_sub)?;
    dict.defword("f*", core_word_f_mul)?;
    dict.defword("f/", core_word_f_div)?;
    dict.defword("fnegate", core_word_f_negate)?;
    dict.defword("s>f", core_word_s_to_f)?;
    dict.defword("f>s", core_word_f_to_s)?;
    dict.defword("f.", core_word_f_dot)?;
    OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Weft;

    fn boot() -> Weft {
        Weft::boot().unwrap()
    }

    fn pop_int(w: &mut Weft) -> Wint {
        w.pop().unwrap().to_int().unwrap()
    }

    #[test]
    fn test_arith() {
        let mut w = boot();
        w.eval("7 3 + 2 *").unwrap();
        assert_eq!(20, pop_int(&mut w));
        w.eval("17 5 /mod").unwrap();
        assert_eq!(3, pop_int(&mut w));
        assert_eq!(2, pop_int(&mut w));
        w.eval("-17 5 /").unwrap();
        assert_eq!(-3, pop_int(&mut w));
        assert_eq!(Err(Throw::DIVISION_BY_ZERO), w.eval("1 0 /"));
        assert_eq!(Err(Throw::DIVISION_BY_ZERO), w.eval("1 0 mod"));
    }

    #[test]
    fn test_wrapping_and_shifts() {
        let mut w = boot();
        w.eval("1 63 lshift 1 63 lshift +").unwrap();
        assert_eq!(0, pop_int(&mut w));
        w.eval("-1 1 rshift").unwrap();
        assert_eq!(i64::MAX, pop_int(&mut w));
        w.eval("-8 2/").unwrap();
        assert_eq!(-4, pop_int(&mut w));
    }

    #[test]
    fn test_compare() {
        let mut w = boot();
        w.eval("3 4 < 4 3 < 5 5 <=").unwrap();
        assert_eq!(-1, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
        assert_eq!(-1, pop_int(&mut w));
        w.eval("-1 1 u<").unwrap();
        assert_eq!(0, pop_int(&mut w));
        w.eval("0 0= -5 0< 5 0>").unwrap();
        assert_eq!(-1, pop_int(&mut w));
        assert_eq!(-1, pop_int(&mut w));
        assert_eq!(-1, pop_int(&mut w));
        w.eval("2 1.5 >").unwrap();
        assert_eq!(-1, pop_int(&mut w));
    }

    #[test]
    fn test_stack_words() {
        let mut w = boot();
        w.eval("1 2 3 rot").unwrap();
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(3, pop_int(&mut w));
        assert_eq!(2, pop_int(&mut w));
        w.eval("1 2 3 1 pick").unwrap();
        assert_eq!(2, pop_int(&mut w));
        w.clear_stack();
        w.eval("5 ?dup 0 ?dup").unwrap();
        assert_eq!(3, w.depth());
        assert_eq!(0, pop_int(&mut w));
        assert_eq!(5, pop_int(&mut w));
        assert_eq!(5, pop_int(&mut w));
        w.eval("1 2 3 4 2swap").unwrap();
        assert_eq!(2, pop_int(&mut w));
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(4, pop_int(&mut w));
        assert_eq!(3, pop_int(&mut w));
    }

    #[test]
    fn test_return_stack_words() {
        let mut w = boot();
        w.eval("5 >r r@ r> +").unwrap();
        assert_eq!(10, pop_int(&mut w));
        assert_eq!(0, w.depth());
    }

    #[test]
    fn test_memory_words() {
        let mut w = boot();
        w.eval("here 3 , here swap -").unwrap();
        assert_eq!(1, pop_int(&mut w));
        w.eval("variable counter 5 counter ! 2 counter +! counter @").unwrap();
        assert_eq!(7, pop_int(&mut w));
        w.eval("2 cells 1 cell+").unwrap();
        assert_eq!(2, pop_int(&mut w));
        assert_eq!(2, pop_int(&mut w));
    }

    #[test]
    fn test_fetch_needs_address() {
        let mut w = boot();
        assert_eq!(Err(Throw::ARGUMENT_TYPE_MISMATCH), w.eval("5 @"));
        assert_eq!(Err(Throw::INVALID_MEMORY_ADDRESS), w.eval("here @"));
    }

    #[test]
    fn test_base_words() {
        let mut w = boot();
        w.eval("16 base ! ff base @ decimal").unwrap();
        assert_eq!(16, pop_int(&mut w));
        assert_eq!(255, pop_int(&mut w));
        w.eval("hex de 1 + decimal").unwrap();
        assert_eq!(0xdf, pop_int(&mut w));
    }

    #[test]
    fn test_dot_respects_base() {
        let mut w = boot();
        w.capture_output(0);
        w.eval("hex ff . decimal 255 .").unwrap();
        assert_eq!("ff 255 ", w.take_output(0));
    }

    #[test]
    fn test_dot_s_and_emit() {
        let mut w = boot();
        w.capture_output(0);
        w.eval("1 2 .s").unwrap();
        assert_eq!("<2> 1 2 ", w.take_output(0));
        w.capture_output(0);
        w.eval("65 emit 66 emit cr").unwrap();
        assert_eq!("AB\n", w.take_output(0));
        // not a code point
        assert_eq!(Err(Throw::RESULT_OUT_OF_RANGE), w.eval("-1 emit"));
        w.clear_stack();
    }

    #[test]
    fn test_type_and_spaces() {
        let mut w = boot();
        w.capture_output(0);
        w.eval("s\" forth\" type 2 spaces").unwrap();
        assert_eq!("forth  ", w.take_output(0));
    }

    #[test]
    fn test_words_lists_core() {
        let mut w = boot();
        w.capture_output(0);
        w.eval("words").unwrap();
        let out = w.take_output(0);
        assert!(out.contains("dup"));
        assert!(out.contains(":"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_floats() {
        let mut w = boot();
        w.eval("1.5 2.5 f+").unwrap();
        assert_eq!(Ok(4.0), w.pop().unwrap().to_flt());
        w.eval("10 s>f 4 s>f f/ 2.7 f>s").unwrap();
        assert_eq!(2, pop_int(&mut w));
        assert_eq!(Ok(2.5), w.pop().unwrap().to_flt());
        w.capture_output(0);
        w.eval("1.5 0.5 f- f.").unwrap();
        assert_eq!("1.0 ", w.take_output(0));
    }

    #[test]
    fn test_mixed_promotion() {
        let mut w = boot();
        w.eval("1 2.5 + 2 *").unwrap();
        assert_eq!(Ok(7.0), w.pop().unwrap().to_flt());
    }

    #[test]
    fn test_constants() {
        let mut w = boot();
        w.eval("true false bl").unwrap();
        assert_eq!(32, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
        assert_eq!(-1, pop_int(&mut w));
    }

    #[test]
    fn test_unused_shrinks_as_dictionary_grows() {
        let mut w = boot();
        w.eval("unused : noop ; unused").unwrap();
        let after = pop_int(&mut w);
        let before = pop_int(&mut w);
        assert!(after < before);
    }
}
