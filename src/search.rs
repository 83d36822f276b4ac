use crate::cell::{Cell, Wint};
use crate::dict::{Dict, CODE_RET, FORTH_WID};
use crate::engine::Engine;
use crate::ops::Op;
use crate::throw::{Throw, Wres, OK};
use crate::word::{WordFlags, Xt};

fn core_word_wordlist(en: &mut Engine) -> Wres {
    let wid = en.dict.new_wordlist()?;
    en.vm.ds.push(Cell::Int(wid as Wint))
}

fn core_word_forth_wordlist(en: &mut Engine) -> Wres {
    en.vm.ds.push(Cell::Int(FORTH_WID as Wint))
}

fn core_word_get_current(en: &mut Engine) -> Wres {
    let wid = en.dict.get_current();
    en.vm.ds.push(Cell::Int(wid as Wint))
}

fn core_word_set_current(en: &mut Engine) -> Wres {
    let wid = en.vm.ds.pop()?.to_usize()?;
    en.dict.set_current(wid)
}

fn core_word_definitions(en: &mut Engine) -> Wres {
    let wid = match en.dict.get_order().last() {
        Some(wid) => *wid,
        None => return Err(Throw::SEARCH_ORDER_UNDERFLOW),
    };
    en.dict.set_current(wid)
}

fn core_word_get_order(en: &mut Engine) -> Wres {
    let order = en.dict.get_order().to_vec();
    for wid in &order {
        en.vm.ds.push(Cell::Int(*wid as Wint))?;
    }
    en.vm.ds.push(Cell::Int(order.len() as Wint))
}

fn core_word_set_order(en: &mut Engine) -> Wres {
    let n = en.vm.ds.pop()?.to_int()?;
    if n < 0 {
        return en.dict.set_order(&[FORTH_WID]);
    }
    let mut wids = Vec::with_capacity(n as usize);
    for _ in 0..n {
        wids.push(en.vm.ds.pop()?.to_usize()?);
    }
    // popped first-searched first; the order list keeps it last
    wids.reverse();
    en.dict.set_order(&wids)
}

// After a forget the op under ip may be gone, the marker's own body
// always is. Land on the permanent Ret instead of reading cut code.
fn retarget_after_cut(en: &mut Engine) {
    if en.vm.ip >= en.dict.code_here() {
        en.vm.ip = CODE_RET;
    }
}

fn core_word_forget(en: &mut Engine) -> Wres {
    let name = match en.vm.input.next_token() {
        Some(t) => t,
        None => return Err(Throw::ZERO_LENGTH_NAME),
    };
    let id = en.dict.lookup(&name).ok_or(Throw::UNDEFINED_WORD)?;
    en.dict.forget_to(id)?;
    retarget_after_cut(en);
    OK
}

fn marker_runtime(en: &mut Engine) -> Wres {
    let id = en.vm.ds.pop()?.to_usize()?;
    en.dict.forget_to(id)?;
    retarget_after_cut(en);
    OK
}

/// Define a word that, when executed, forgets itself and everything
/// after it.
fn core_word_marker(en: &mut Engine) -> Wres {
    let name = match en.vm.input.next_token() {
        Some(t) => t,
        None => return Err(Throw::ZERO_LENGTH_NAME),
    };
    let entry = en.dict.code_here();
    let id = en
        .dict
        .append_word(&name, Xt::Code(entry), WordFlags::default())?;
    let ix = en.dict.data_push(Cell::Int(id as Wint))?;
    en.dict.emit(Op::Lit(ix))?;
    en.dict
        .emit(Op::Native(crate::word::NativePtr(marker_runtime)))?;
    en.dict.emit(Op::Ret)?;
    en.dict.unsmudge()
}

/// Wordlist and search-order vocabulary.
pub fn load(dict: &mut Dict) -> Wres {
    dict.defword("wordlist", core_word_wordlist)?;
    dict.defword("forth-wordlist", core_word_forth_wordlist)?;
    dict.defword("get-current", core_word_get_current)?;
    dict.defword("set-current", core_word_set_current)?;
    dict.defword("definitions", core_word_definitions)?;
    dict.defword("get-order", core_word_get_order)?;
    dict.defword("set-order", core_word_set_order)?;
    dict.defword("forget", core_word_forget)?;
    dict.defword("marker", core_word_marker)?;
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
    fn test_wordlist_isolation() {
        let mut w = boot();
        w.eval("wordlist constant app get-current constant prior").unwrap();
        w.eval("app set-current : hidden 42 ; prior set-current").unwrap();
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("hidden"));
        w.eval("get-order app swap 1+ set-order hidden").unwrap();
        assert_eq!(42, pop_int(&mut w));
    }

    #[test]
    fn test_definitions_targets_top_of_order() {
        let mut w = boot();
        w.eval("wordlist constant app get-order app swap 1+ set-order definitions")
            .unwrap();
        w.eval("get-current app =").unwrap();
        assert_eq!(-1, pop_int(&mut w));
        w.eval(": inside 9 ; inside").unwrap();
        assert_eq!(9, pop_int(&mut w));
        // dropping the wordlist from the order hides its words
        w.eval("forth-wordlist 1 set-order definitions").unwrap();
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("inside"));
    }

    #[test]
    fn test_get_set_order_round_trip() {
        let mut w = boot();
        w.eval("get-order").unwrap();
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
        w.eval("get-order set-order get-order").unwrap();
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
        w.eval("-1 set-order get-order").unwrap();
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
    }

    #[test]
    fn test_order_overflow() {
        let mut w = boot();
        let mut src = String::new();
        for _ in 0..9 {
            src.push_str("wordlist ");
        }
        src.push_str("9 set-order");
        assert_eq!(Err(Throw::SEARCH_ORDER_OVERFLOW), w.eval(&src));
    }

    #[test]
    fn test_invalid_wid_rejected() {
        let mut w = boot();
        assert!(w.eval("99 1 set-order").is_err());
        assert!(w.eval("99 set-current").is_err());
    }

    #[test]
    fn test_marker_rolls_back() {
        let mut w = boot();
        w.eval("marker snap : tmp 1 ; snap").unwrap();
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("tmp"));
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("snap"));
    }

    #[test]
    fn test_forget_cuts_at_word() {
        let mut w = boot();
        w.eval(": a 1 ; : b 2 ; forget a").unwrap();
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("a"));
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("b"));
        assert_eq!(Err(Throw::INVALID_FORGET), w.eval("forget dup"));
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("forget no-such"));
    }

    #[test]
    fn test_forget_then_redefine() {
        let mut w = boot();
        w.eval(": a 1 ; forget a : a 2 ; a").unwrap();
        assert_eq!(2, pop_int(&mut w));
    }
}
