use crate::cell::{bool_cell, Cell, Wint, Wstr, FALSE, TRUE};
use crate::dict::{Dict, LOCALS_MAX, ORDER_MAX};
use crate::engine::Engine;
use crate::throw::{Wres, OK};
use crate::wordlist::names_equal;

/// Host-visible facts about the build, served to `environment?`.
#[derive(Debug, Default)]
pub struct Env {
    entries: Vec<(Wstr, Cell)>,
}

impl Env {
    pub fn new() -> Env {
        let mut env = Env::default();
        env.set("core", TRUE);
        env.set("exception", TRUE);
        env.set("locals", TRUE);
        env.set("search-order", TRUE);
        env.set("floating", TRUE);
        env.set("case-sensitive", FALSE);
        env.set("floored", bool_cell(false));
        env.set("max-n", Cell::Int(Wint::MAX));
        env.set("max-u", Cell::Int(-1));
        env.set("wordlists", Cell::Int(ORDER_MAX as Wint));
        env.set("#locals", Cell::Int(LOCALS_MAX as Wint));
        env
    }

    pub fn set(&mut self, name: &str, value: Cell) {
        if let Some(e) = self.entries.iter_mut().find(|e| names_equal(&e.0, name)) {
            e.1 = value;
        } else {
            self.entries.push((Wstr::from(name), value));
        }
    }

    pub fn query(&self, name: &str) -> Option<Cell> {
        self.entries
            .iter()
            .find(|e| names_equal(&e.0, name))
            .map(|e| e.1.clone())
    }
}

fn core_word_environment_query(en: &mut Engine) -> Wres {
    let name = en.vm.ds.pop()?.to_str()?;
    match en.env.query(&name) {
        Some(v) => {
            en.vm.ds.push(v)?;
            en.vm.ds.push(TRUE)
        }
        None => en.vm.ds.push(FALSE),
    }
}

pub fn load(dict: &mut Dict) -> Wres {
    dict.defword("environment?", core_word_environment_query)?;
    OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Weft;

    #[test]
    fn test_query_table() {
        let env = Env::new();
        assert_eq!(Some(TRUE), env.query("floating"));
        assert_eq!(Some(TRUE), env.query("FLOATING"));
        assert_eq!(Some(Cell::Int(8)), env.query("wordlists"));
        assert_eq!(None, env.query("no-such-fact"));
    }

    #[test]
    fn test_set_replaces() {
        let mut env = Env::new();
        env.set("core", FALSE);
        assert_eq!(Some(FALSE), env.query("core"));
    }

    #[test]
    fn test_environment_query_word() {
        let mut w = Weft::boot().unwrap();
        w.eval("s\" floating\" environment?").unwrap();
        assert_eq!(-1, w.pop().unwrap().to_int().unwrap());
        assert_eq!(-1, w.pop().unwrap().to_int().unwrap());
        w.eval("s\" warp-drive\" environment?").unwrap();
        assert_eq!(0, w.pop().unwrap().to_int().unwrap());
        assert_eq!(0, w.depth());
        w.eval("s\" stack-cells\" environment?").unwrap();
        assert_eq!(-1, w.pop().unwrap().to_int().unwrap());
        assert_eq!(256, w.pop().unwrap().to_int().unwrap());
    }
}
