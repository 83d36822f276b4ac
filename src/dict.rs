use crate::cell::{Cell, Wstr, ZERO};
use crate::ops::{jump_offset, Op, SMALL_INT_MAX, SMALL_INT_MIN};
use crate::throw::{Throw, Wres, Wres1, OK};
use crate::word::{NativeFn, NativePtr, Word, WordFlags, Xt};
use crate::wordlist::{name_hash, names_equal, Wid, WordId, Wordlist, NAME_MAX};

pub const ORDER_MAX: usize = 8;
pub const LOCALS_MAX: usize = 64;

// budget weight of one header, in cells
const HEADER_CELLS: usize = 4;

/// The dictionary: threaded-code arena, data space, word headers and the
/// wordlists that scope them. One per system; every eval borrows it
/// exclusively, which is what serializes compilation.
#[derive(Clone, Debug)]
pub struct Dict {
    code: Vec<Op>,
    data: Vec<Cell>,
    words: Vec<Word>,
    wordlists: Vec<Wordlist>,
    order: Vec<Wid>,
    current: Wid,
    smudge: Option<WordId>,
    smudge_wid: Wid,
    created: Option<WordId>,
    locals: Vec<Wstr>,
    fence: usize,
    budget: usize,
    buckets: usize,
}

pub const FORTH_WID: Wid = 0;

/// Code cell 0 always holds `Ret`. A native that truncates the code arena
/// out from under its own word retargets ip here.
pub const CODE_RET: usize = 0;

impl Dict {
    pub fn new(budget: usize, buckets: usize) -> Dict {
        let forth = Wordlist::new(buckets, None);
        Dict {
            code: vec![Op::Ret],
            data: Vec::new(),
            words: Vec::new(),
            wordlists: vec![forth],
            order: vec![FORTH_WID],
            current: FORTH_WID,
            smudge: None,
            smudge_wid: FORTH_WID,
            created: None,
            locals: Vec::new(),
            fence: 0,
            budget,
            buckets,
        }
    }

    fn used(&self) -> usize {
        self.code.len() + self.data.len() + self.words.len() * HEADER_CELLS
    }

    fn ensure_room(&self, cells: usize) -> Wres {
        if self.used() + cells > self.budget {
            Err(Throw::DICTIONARY_OVERFLOW)
        } else {
            OK
        }
    }

    pub fn unused(&self) -> usize {
        self.budget.saturating_sub(self.used())
    }

    // --- code arena ---

    pub fn code_here(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, op: Op) -> Wres1<usize> {
        self.ensure_room(1)?;
        let at = self.code.len();
        self.code.push(op);
        Ok(at)
    }

    pub fn patch(&mut self, at: usize, op: Op) -> Wres {
        let slot = self.code.get_mut(at).ok_or(Throw::INVALID_MEMORY_ADDRESS)?;
        *slot = op;
        OK
    }

    pub fn op_at(&self, at: usize) -> Wres1<Op> {
        self.code.get(at).copied().ok_or(Throw::INVALID_MEMORY_ADDRESS)
    }

    /// Integers in the small band become a dedicated single-slot form,
    /// everything else allocates a literal-pool cell.
    pub fn emit_literal(&mut self, c: Cell) -> Wres {
        match c {
            Cell::Int(n) if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&n) => {
                self.emit(Op::SmallInt(n as i8))?;
            }
            other => {
                let at = self.data_push(other)?;
                self.emit(Op::Lit(at))?;
            }
        }
        OK
    }

    // --- data space ---

    pub fn data_here(&self) -> usize {
        self.data.len()
    }

    pub fn data_push(&mut self, c: Cell) -> Wres1<usize> {
        self.ensure_room(1)?;
        let at = self.data.len();
        self.data.push(c);
        Ok(at)
    }

    pub fn data_get(&self, at: usize) -> Wres1<Cell> {
        self.data.get(at).cloned().ok_or(Throw::INVALID_MEMORY_ADDRESS)
    }

    pub fn data_set(&mut self, at: usize, c: Cell) -> Wres {
        let slot = self.data.get_mut(at).ok_or(Throw::INVALID_MEMORY_ADDRESS)?;
        *slot = c;
        OK
    }

    pub fn allot(&mut self, cells: usize) -> Wres {
        self.ensure_room(cells)?;
        self.data.resize(self.data.len() + cells, ZERO);
        OK
    }

    // --- word headers ---

    pub fn word(&self, id: WordId) -> Wres1<&Word> {
        self.words.get(id).ok_or(Throw::INVALID_MEMORY_ADDRESS)
    }

    pub fn word_mut(&mut self, id: WordId) -> Wres1<&mut Word> {
        self.words.get_mut(id).ok_or(Throw::INVALID_MEMORY_ADDRESS)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Most recent definition, finished or not.
    pub fn latest(&self) -> Option<WordId> {
        self.smudge.or_else(|| self.words.len().checked_sub(1))
    }

    pub fn smudged_word(&self) -> Option<WordId> {
        self.smudge
    }

    /// Append a header smudged; `unsmudge` links it into the compilation
    /// wordlist once the definition completes. The rollback marks capture
    /// the arena cursors as of this call.
    pub fn append_word(&mut self, name: &str, xt: Xt, flags: WordFlags) -> Wres1<WordId> {
        if name.is_empty() {
            return Err(Throw::ZERO_LENGTH_NAME);
        }
        if name.len() > NAME_MAX {
            return Err(Throw::NAME_TOO_LONG);
        }
        self.ensure_room(HEADER_CELLS + name.len() / 8)?;
        let id = self.words.len();
        self.words.push(Word {
            name: Wstr::from(name),
            hash: name_hash(name),
            link: None,
            xt,
            flags: flags.set_smudge(),
            code_mark: self.code.len(),
            data_mark: self.data.len(),
        });
        self.smudge = Some(id);
        self.smudge_wid = self.current;
        Ok(id)
    }

    /// Anonymous definition: a header with no name, never linked.
    pub fn append_noname(&mut self, xt: Xt) -> Wres1<WordId> {
        self.ensure_room(HEADER_CELLS)?;
        let id = self.words.len();
        self.words.push(Word {
            name: Wstr::default(),
            hash: 0,
            link: None,
            xt,
            flags: WordFlags::default().set_smudge(),
            code_mark: self.code.len(),
            data_mark: self.data.len(),
        });
        self.smudge = Some(id);
        self.smudge_wid = self.current;
        Ok(id)
    }

    pub fn unsmudge(&mut self) -> Wres {
        if let Some(id) = self.smudge.take() {
            let wid = self.smudge_wid;
            let hash = self.words[id].hash;
            if !self.words[id].name.is_empty() {
                let head = self.wordlists[wid].head(hash);
                self.words[id].link = head;
                self.wordlists[wid].set_head(hash, Some(id));
            }
            self.words[id].flags = self.words[id].flags.clear_smudge();
        }
        OK
    }

    /// Drop a definition that never completed, reclaiming its arena space.
    pub fn abort_definition(&mut self) -> Wres {
        if let Some(id) = self.smudge.take() {
            if self.words[id].flags.smudged() {
                self.code.truncate(self.words[id].code_mark);
                self.data.truncate(self.words[id].data_mark);
                self.words.truncate(id);
            }
        }
        self.locals.clear();
        OK
    }

    // --- lookup ---

    /// Search-order lookup, most recently pushed wordlist first, parent
    /// chains included. Smudged words are invisible.
    pub fn lookup(&self, name: &str) -> Option<WordId> {
        let hash = name_hash(name);
        for wid in self.order.iter().rev() {
            if let Some(id) = self.find_in(*wid, name, hash) {
                return Some(id);
            }
        }
        None
    }

    pub fn find_in(&self, wid: Wid, name: &str, hash: u16) -> Option<WordId> {
        let mut wl = self.wordlists.get(wid)?;
        loop {
            let mut next = wl.head(hash);
            while let Some(id) = next {
                let w = &self.words[id];
                if !w.flags.smudged() && w.hash == hash && names_equal(&w.name, name) {
                    return Some(id);
                }
                next = w.link;
            }
            match wl.parent {
                Some(p) => wl = self.wordlists.get(p)?,
                None => return None,
            }
        }
    }

    /// Names in one wordlist, newest first, listings only.
    pub fn list_words(&self, wid: Wid) -> Vec<Wstr> {
        let mut ids: Vec<WordId> = Vec::new();
        if let Some(wl) = self.wordlists.get(wid) {
            for head in wl.heads() {
                let mut next = *head;
                while let Some(id) = next {
                    let w = &self.words[id];
                    if w.visible() {
                        ids.push(id);
                    }
                    next = w.link;
                }
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.iter().map(|id| self.words[*id].name.clone()).collect()
    }

    // --- rollback ---

    pub fn set_fence(&mut self) {
        self.fence = self.words.len();
    }

    /// Unlink every word at or past `id` from every bucket, then truncate
    /// the arenas back to the marks `id` recorded. Boot vocabulary is
    /// fenced off.
    pub fn forget_to(&mut self, id: WordId) -> Wres {
        if id < self.fence {
            return Err(Throw::INVALID_FORGET);
        }
        if id >= self.words.len() {
            return Err(Throw::INVALID_MEMORY_ADDRESS);
        }
        let words = &self.words;
        for wl in self.wordlists.iter_mut() {
            for head in wl.heads_mut() {
                while let Some(h) = *head {
                    if h >= id {
                        *head = words[h].link;
                    } else {
                        break;
                    }
                }
            }
        }
        self.code.truncate(self.words[id].code_mark);
        self.data.truncate(self.words[id].data_mark);
        self.words.truncate(id);
        if self.smudge.map_or(false, |s| s >= id) {
            self.smudge = None;
        }
        if self.created.map_or(false, |c| c >= id) {
            self.created = None;
        }
        OK
    }

    // --- create/does> ---

    pub fn mark_created(&mut self, id: WordId) {
        self.created = Some(id);
    }

    pub fn created_word(&self) -> Option<WordId> {
        self.created
    }

    /// Redirect a created word's stub so that after pushing its body
    /// address it falls through into the does-part.
    pub fn patch_does(&mut self, id: WordId, does_entry: usize) -> Wres {
        let entry = match self.word(id)?.xt {
            Xt::Code(e) => e,
            _ => return Err(Throw::NOT_CREATED),
        };
        match (self.op_at(entry)?, self.op_at(entry + 1)?) {
            (Op::Lit(_), Op::Ret) | (Op::Lit(_), Op::Branch(_)) => {
                self.patch(entry + 1, Op::Branch(jump_offset(entry + 1, does_entry)))
            }
            _ => Err(Throw::NOT_CREATED),
        }
    }

    // --- wordlists and search order ---

    pub fn new_wordlist(&mut self) -> Wres1<Wid> {
        let wid = self.wordlists.len();
        self.wordlists.push(Wordlist::new(self.buckets, None));
        Ok(wid)
    }

    pub fn new_wordlist_with(&mut self, buckets: usize, parent: Option<Wid>) -> Wres1<Wid> {
        let wid = self.wordlists.len();
        self.wordlists.push(Wordlist::new(buckets, parent));
        Ok(wid)
    }

    fn check_wid(&self, wid: Wid) -> Wres {
        if wid < self.wordlists.len() {
            OK
        } else {
            Err(Throw::RESULT_OUT_OF_RANGE)
        }
    }

    pub fn get_order(&self) -> &[Wid] {
        &self.order
    }

    pub fn set_order(&mut self, wids: &[Wid]) -> Wres {
        if wids.len() > ORDER_MAX {
            return Err(Throw::SEARCH_ORDER_OVERFLOW);
        }
        for wid in wids {
            self.check_wid(*wid)?;
        }
        self.order.clear();
        self.order.extend_from_slice(wids);
        OK
    }

    pub fn push_order(&mut self, wid: Wid) -> Wres {
        self.check_wid(wid)?;
        if self.order.len() >= ORDER_MAX {
            return Err(Throw::SEARCH_ORDER_OVERFLOW);
        }
        self.order.push(wid);
        OK
    }

    pub fn pop_order(&mut self) -> Wres1<Wid> {
        self.order.pop().ok_or(Throw::SEARCH_ORDER_UNDERFLOW)
    }

    pub fn get_current(&self) -> Wid {
        self.current
    }

    pub fn set_current(&mut self, wid: Wid) -> Wres {
        self.check_wid(wid)?;
        self.current = wid;
        OK
    }

    // --- locals scratch ---

    pub fn add_local(&mut self, name: &str) -> Wres1<u16> {
        if name.is_empty() {
            return Err(Throw::ZERO_LENGTH_NAME);
        }
        if self.locals.len() >= LOCALS_MAX {
            return Err(Throw::RESULT_OUT_OF_RANGE);
        }
        let slot = self.locals.len() as u16;
        self.locals.push(Wstr::from(name));
        Ok(slot)
    }

    /// Latest-first so a rebound name shadows the earlier slot.
    pub fn find_local(&self, name: &str) -> Option<u16> {
        self.locals
            .iter()
            .rposition(|n| names_equal(n, name))
            .map(|at| at as u16)
    }

    pub fn has_locals(&self) -> bool {
        !self.locals.is_empty()
    }

    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }

    // --- registration helpers ---

    pub fn defword(&mut self, name: &str, f: NativeFn) -> Wres1<WordId> {
        let id = self.append_word(name, Xt::Native(NativePtr(f)), WordFlags::default())?;
        self.unsmudge()?;
        Ok(id)
    }

    pub fn def_immediate(&mut self, name: &str, f: NativeFn) -> Wres1<WordId> {
        let flags = WordFlags::default().set_immediate();
        let id = self.append_word(name, Xt::Native(NativePtr(f)), flags)?;
        self.unsmudge()?;
        Ok(id)
    }

    /// Compiling words: run at compile time, refused while interpreting.
    pub fn def_compiler(&mut self, name: &str, f: NativeFn) -> Wres1<WordId> {
        let flags = WordFlags::default().set_immediate().set_compile_only();
        let id = self.append_word(name, Xt::Native(NativePtr(f)), flags)?;
        self.unsmudge()?;
        Ok(id)
    }

    pub fn def_inst(&mut self, name: &str, inst: crate::ops::Inst) -> Wres1<WordId> {
        let id = self.append_word(name, Xt::Inst(inst), WordFlags::default())?;
        self.unsmudge()?;
        Ok(id)
    }

    pub fn def_inst_compile_only(&mut self, name: &str, inst: crate::ops::Inst) -> Wres1<WordId> {
        let flags = WordFlags::default().set_compile_only();
        let id = self.append_word(name, Xt::Inst(inst), flags)?;
        self.unsmudge()?;
        Ok(id)
    }

    pub fn def_constant(&mut self, name: &str, c: Cell) -> Wres1<WordId> {
        let entry = self.code_here();
        let id = self.append_word(name, Xt::Code(entry), WordFlags::default())?;
        self.emit_literal(c)?;
        self.emit(Op::Ret)?;
        self.unsmudge()?;
        Ok(id)
    }
}
