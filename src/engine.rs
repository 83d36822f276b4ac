use crate::cell::{bool_cell, cell_to_throw, check_base, Cell, Wint, Wstr, Wsubstr, FALSE, TRUE, ZERO};
use crate::dict::Dict;
use crate::env::Env;
use crate::input::{Input, SOURCE_EVAL};
use crate::number::{parse_number, Number};
use crate::ops::{jump_offset, jump_target, Inst, Op};
use crate::throw::{Throw, Wres, Wres1, OK};
use crate::vm::{Vm, VmState};
use crate::word::{NativePtr, WordFlags, Xt};
use crate::wordlist::WordId;

/// A registered parse step: claim the token and act on it, or decline.
pub type ParseStepFn = fn(&mut Engine, &Wsubstr) -> Wres1<bool>;

#[derive(Clone, Copy, Debug)]
pub enum ParseStep {
    Words,
    Numbers,
    Custom(ParseStepFn),
}

pub const PARSE_STEPS_MAX: usize = 8;

// control-flow mark tags, pushed on the data stack during compilation
const TAG_DEF: Wstr = arcstr::literal!("def");
const TAG_IF: Wstr = arcstr::literal!("if");
const TAG_BEGIN: Wstr = arcstr::literal!("begin");
const TAG_WHILE: Wstr = arcstr::literal!("while");
const TAG_DO: Wstr = arcstr::literal!("do");
const TAG_CASE: Wstr = arcstr::literal!("case");
const TAG_OF: Wstr = arcstr::literal!("of");
const TAG_ENDOF: Wstr = arcstr::literal!("endof");
const TAG_FALLTHROUGH: Wstr = arcstr::literal!("fallthrough");

/// Execution context: one VM joined to the shared dictionary for the
/// duration of a run. The exclusive borrow is what keeps two VMs from
/// compiling at once.
pub struct Engine<'a> {
    pub dict: &'a mut Dict,
    pub vm: &'a mut Vm,
    pub env: &'a Env,
    pub steps: &'a [ParseStep],
}

impl<'a> Engine<'a> {
    // --- outer interpreter ---

    /// Consume the VM's input buffer token by token. Exhaustion reports
    /// out-of-text; the caller decides whether that ends the session.
    pub fn interpret_input(&mut self) -> Wres {
        loop {
            let checkpoint = self.vm.input.mark();
            let tok = match self.vm.input.next_token() {
                Some(t) => t,
                None => return Err(Throw::OUT_OF_TEXT),
            };
            self.vm.record_token_context(Wstr::from(tok.as_str()));
            match self.interpret_token(&tok) {
                Ok(()) => {}
                Err(t) if t == Throw::INCOMPLETE_INPUT => {
                    // rescan the same token once more text arrives
                    self.vm.input.rewind(checkpoint);
                    return Err(t);
                }
                Err(t) => return Err(t),
            }
        }
    }

    fn interpret_token(&mut self, tok: &Wsubstr) -> Wres {
        if self.vm.is_compiling() {
            if let Some(slot) = self.dict.find_local(tok) {
                self.dict.emit(Op::Local(slot))?;
                return OK;
            }
        }
        let steps = self.steps;
        for step in steps {
            let hit = match step {
                ParseStep::Words => self.step_word(tok)?,
                ParseStep::Numbers => self.step_number(tok)?,
                ParseStep::Custom(f) => f(self, tok)?,
            };
            if hit {
                return OK;
            }
        }
        Err(Throw::UNDEFINED_WORD)
    }

    fn step_word(&mut self, tok: &Wsubstr) -> Wres1<bool> {
        let id = match self.dict.lookup(tok) {
            Some(id) => id,
            None => return Ok(false),
        };
        let w = self.dict.word(id)?;
        let xt = w.xt;
        let flags = w.flags;
        if self.vm.is_compiling() && !flags.immediate() {
            self.compile_xt(xt)?;
        } else {
            if !self.vm.is_compiling() && flags.compile_only() {
                return Err(Throw::COMPILE_ONLY_WORD);
            }
            self.execute_xt(xt)?;
        }
        Ok(true)
    }

    fn step_number(&mut self, tok: &Wsubstr) -> Wres1<bool> {
        let base = self.current_base()?;
        match parse_number(tok, base) {
            None => Ok(false),
            Some(Number::Single(n)) => {
                self.push_or_compile(Cell::Int(n))?;
                Ok(true)
            }
            Some(Number::Double(lo, hi)) => {
                self.push_or_compile(Cell::Int(lo))?;
                self.push_or_compile(Cell::Int(hi))?;
                Ok(true)
            }
            Some(Number::Float(f)) => {
                self.push_or_compile(Cell::Flt(f))?;
                Ok(true)
            }
        }
    }

    /// Evaluate a nested source string, restoring the outer input after.
    pub fn eval_nested(&mut self, src: &str) -> Wres {
        let saved = std::mem::replace(&mut self.vm.input, Input::new(src, SOURCE_EVAL));
        let r = self.interpret_input();
        self.vm.input = saved;
        match r {
            Err(t) if t == Throw::OUT_OF_TEXT => OK,
            // a nested string cannot receive more text
            Err(t) if t == Throw::INCOMPLETE_INPUT => Err(Throw::UNEXPECTED_END_OF_FILE),
            other => other,
        }
    }

    // --- execution ---

    pub fn execute_xt(&mut self, xt: Xt) -> Wres {
        match xt {
            Xt::Inst(i) => self.exec_inst(i),
            Xt::Native(p) => (p.0)(self),
            Xt::Code(entry) => self.run_code(entry),
        }
    }

    pub fn compile_xt(&mut self, xt: Xt) -> Wres {
        match xt {
            Xt::Inst(i) => self.dict.emit(Op::Inst(i))?,
            Xt::Native(p) => self.dict.emit(Op::Native(p))?,
            Xt::Code(entry) => self.dict.emit(Op::Call(entry))?,
        };
        OK
    }

    pub fn push_or_compile(&mut self, c: Cell) -> Wres {
        if self.vm.is_compiling() {
            self.dict.emit_literal(c)
        } else {
            self.vm.ds.push(c)
        }
    }

    /// Threaded-code inner loop. Iterative dispatch with the return stack
    /// holding resume indices; nesting depth is bounded by its capacity,
    /// not the host call stack.
    fn run_code(&mut self, entry: usize) -> Wres {
        let bottom = self.vm.rs.len();
        let saved_ip = self.vm.ip;
        self.vm.ip = entry;
        let r = self.dispatch(bottom);
        self.vm.ip = saved_ip;
        r
    }

    fn dispatch(&mut self, bottom: usize) -> Wres {
        loop {
            match self.dict.op_at(self.vm.ip)? {
                Op::Nop => self.vm.ip += 1,
                Op::Inst(i) => {
                    self.exec_inst(i)?;
                    self.vm.ip += 1;
                }
                Op::Native(p) => {
                    let at = self.vm.ip;
                    (p.0)(self)?;
                    // forget-family natives retarget ip after truncating code
                    if self.vm.ip == at {
                        self.vm.ip += 1;
                    }
                }
                Op::Call(entry) => {
                    self.vm.rs.push(Cell::Int(self.vm.ip as Wint + 1))?;
                    self.vm.ip = entry;
                }
                Op::SmallInt(n) => {
                    self.vm.ds.push(Cell::Int(n as Wint))?;
                    self.vm.ip += 1;
                }
                Op::Lit(ix) => {
                    let c = self.dict.data_get(ix)?;
                    self.vm.ds.push(c)?;
                    self.vm.ip += 1;
                }
                Op::Branch(rel) => self.vm.ip = jump_target(self.vm.ip, rel),
                Op::Branch0(rel) => {
                    if self.vm.ds.pop()?.flag() {
                        self.vm.ip += 1;
                    } else {
                        self.vm.ip = jump_target(self.vm.ip, rel);
                    }
                }
                Op::Do(rel) => {
                    let start = self.vm.ds.pop()?.to_int()?;
                    let limit = self.vm.ds.pop()?.to_int()?;
                    self.push_loop_frame(rel, limit, start)?;
                    self.vm.ip += 1;
                }
                Op::QDo(rel) => {
                    let start = self.vm.ds.pop()?.to_int()?;
                    let limit = self.vm.ds.pop()?.to_int()?;
                    if start == limit {
                        self.vm.ip = jump_target(self.vm.ip, rel);
                    } else {
                        self.push_loop_frame(rel, limit, start)?;
                        self.vm.ip += 1;
                    }
                }
                Op::Loop(rel) => {
                    let index = self.vm.rs.peek(0)?.to_int()?.wrapping_add(1);
                    let limit = self.vm.rs.peek(1)?.to_int()?;
                    if index == limit {
                        self.vm.rs.drop_n(3)?;
                        self.vm.ip += 1;
                    } else {
                        self.vm.rs.set(0, Cell::Int(index))?;
                        self.vm.ip = jump_target(self.vm.ip, rel);
                    }
                }
                Op::PlusLoop(rel) => {
                    let step = self.vm.ds.pop()?.to_int()?;
                    let old = self.vm.rs.peek(0)?.to_int()?;
                    let limit = self.vm.rs.peek(1)?.to_int()?;
                    let new = old.wrapping_add(step);
                    // done when the index crosses the limit-1/limit edge
                    let crossed = (old.wrapping_sub(limit) ^ new.wrapping_sub(limit)) < 0;
                    if crossed {
                        self.vm.rs.drop_n(3)?;
                        self.vm.ip += 1;
                    } else {
                        self.vm.rs.set(0, Cell::Int(new))?;
                        self.vm.ip = jump_target(self.vm.ip, rel);
                    }
                }
                Op::Of(rel) => {
                    let candidate = self.vm.ds.pop()?;
                    let matched = *self.vm.ds.peek(0)? == candidate;
                    if matched {
                        self.vm.ds.pop()?;
                        self.vm.ip += 1;
                    } else {
                        self.vm.ip = jump_target(self.vm.ip, rel);
                    }
                }
                Op::Leave => {
                    let target = self.vm.rs.peek(2)?.to_int()?;
                    self.vm.rs.drop_n(3)?;
                    self.vm.ip = target as usize;
                }
                Op::Link => {
                    self.vm.rs.link()?;
                    self.vm.ip += 1;
                }
                Op::Bind(_) => {
                    let c = self.vm.ds.pop()?;
                    self.vm.rs.push(c)?;
                    self.vm.ip += 1;
                }
                Op::Local(slot) => {
                    let c = self.vm.rs.local(slot as usize)?;
                    self.vm.ds.push(c)?;
                    self.vm.ip += 1;
                }
                Op::Unlink => {
                    self.vm.rs.unlink()?;
                    self.vm.ip += 1;
                }
                Op::Does => {
                    let id = self.dict.created_word().ok_or(Throw::NOT_CREATED)?;
                    self.dict.patch_does(id, self.vm.ip + 1)?;
                    if self.vm.rs.len() <= bottom {
                        return OK;
                    }
                    let a = self.vm.rs.pop()?.to_int()?;
                    self.vm.ip = a as usize;
                }
                Op::Ret => {
                    if self.vm.rs.len() <= bottom {
                        return OK;
                    }
                    let a = self.vm.rs.pop()?.to_int()?;
                    self.vm.ip = a as usize;
                }
            }
        }
    }

    fn push_loop_frame(&mut self, rel: isize, limit: Wint, start: Wint) -> Wres {
        let leave = jump_target(self.vm.ip, rel) as Wint;
        self.vm.rs.push(Cell::Int(leave))?;
        self.vm.rs.push(Cell::Int(limit))?;
        self.vm.rs.push(Cell::Int(start))
    }

    pub fn exec_inst(&mut self, i: Inst) -> Wres {
        let ds = &mut self.vm.ds;
        match i {
            Inst::Nop => OK,
            Inst::Dup => {
                let c = ds.peek(0)?.clone();
                ds.push(c)
            }
            Inst::Drop => ds.pop().map(|_| ()),
            Inst::Swap => ds.roll(1),
            Inst::Over => {
                let c = ds.peek(1)?.clone();
                ds.push(c)
            }
            Inst::Rot => ds.roll(2),
            Inst::Nip => {
                let t = ds.pop()?;
                ds.pop()?;
                ds.push(t)
            }
            Inst::Tuck => {
                let t = ds.pop()?;
                let u = ds.pop()?;
                ds.push(t.clone())?;
                ds.push(u)?;
                ds.push(t)
            }
            Inst::QDup => {
                let t = ds.peek(0)?.clone();
                if t.flag() {
                    ds.push(t)?;
                }
                OK
            }
            Inst::Depth => {
                let d = ds.len() as Wint;
                ds.push(Cell::Int(d))
            }
            Inst::Pick => {
                let n = ds.pop()?.to_usize()?;
                ds.pick(n)
            }
            Inst::Roll => {
                let n = ds.pop()?.to_int()?;
                ds.roll(n)
            }
            Inst::TwoDup => {
                let b = ds.peek(0)?.clone();
                let a = ds.peek(1)?.clone();
                ds.push(a)?;
                ds.push(b)
            }
            Inst::TwoDrop => ds.drop_n(2),
            Inst::TwoSwap => {
                ds.roll(3)?;
                ds.roll(3)
            }
            Inst::TwoOver => {
                let b = ds.peek(2)?.clone();
                let a = ds.peek(3)?.clone();
                ds.push(a)?;
                ds.push(b)
            }
            Inst::ToR => {
                let c = self.vm.ds.pop()?;
                self.vm.rs.push(c)
            }
            Inst::RFrom => {
                let c = self.vm.rs.pop()?;
                self.vm.ds.push(c)
            }
            Inst::RFetch => {
                let c = self.vm.rs.peek(0)?.clone();
                self.vm.ds.push(c)
            }
            Inst::I => {
                let c = self.vm.rs.peek(0)?.clone();
                self.vm.ds.push(c)
            }
            Inst::J => {
                let c = self.vm.rs.peek(3)?.clone();
                self.vm.ds.push(c)
            }
            Inst::K => {
                let c = self.vm.rs.peek(6)?.clone();
                self.vm.ds.push(c)
            }
            Inst::Unloop => self.vm.rs.drop_n(3),
            Inst::Add => self.binary(num_add),
            Inst::Sub => self.binary(num_sub),
            Inst::Mul => self.binary(num_mul),
            Inst::Div => self.binary(num_div),
            Inst::Mod => self.binary(num_mod),
            Inst::DivMod => {
                let b = self.vm.ds.pop()?;
                let a = self.vm.ds.pop()?;
                let rem = num_mod(a.clone(), b.clone())?;
                let quot = num_div(a, b)?;
                self.vm.ds.push(rem)?;
                self.vm.ds.push(quot)
            }
            Inst::OnePlus => self.unary(|c| num_add(c, Cell::Int(1))),
            Inst::OneMinus => self.unary(|c| num_sub(c, Cell::Int(1))),
            Inst::TwoStar => self.unary(|c| Ok(Cell::Int(c.to_int()?.wrapping_shl(1)))),
            Inst::TwoSlash => self.unary(|c| Ok(Cell::Int(c.to_int()? >> 1))),
            Inst::Negate => self.unary(|c| match c {
                Cell::Int(n) => Ok(Cell::Int(n.wrapping_neg())),
                Cell::Flt(f) => Ok(Cell::Flt(-f)),
                _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
            }),
            Inst::Abs => self.unary(|c| match c {
                Cell::Int(n) => Ok(Cell::Int(n.wrapping_abs())),
                Cell::Flt(f) => Ok(Cell::Flt(f.abs())),
                _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
            }),
            Inst::Min => self.binary(|a, b| Ok(if num_lt(&a, &b)? { a } else { b })),
            Inst::Max => self.binary(|a, b| Ok(if num_lt(&a, &b)? { b } else { a })),
            Inst::And => self.bits(|a, b| a & b),
            Inst::Or => self.bits(|a, b| a | b),
            Inst::Xor => self.bits(|a, b| a ^ b),
            Inst::Invert => self.unary(|c| Ok(Cell::Int(!c.to_int()?))),
            Inst::LShift => self.bits(|a, b| ((a as u64) << (b as u32 & 63)) as Wint),
            Inst::RShift => self.bits(|a, b| ((a as u64) >> (b as u32 & 63)) as Wint),
            Inst::Eq => self.compare(|o| o == std::cmp::Ordering::Equal),
            Inst::Ne => self.compare(|o| o != std::cmp::Ordering::Equal),
            Inst::Lt => self.compare(|o| o == std::cmp::Ordering::Less),
            Inst::Gt => self.compare(|o| o == std::cmp::Ordering::Greater),
            Inst::Le => self.compare(|o| o != std::cmp::Ordering::Greater),
            Inst::Ge => self.compare(|o| o != std::cmp::Ordering::Less),
            Inst::ULt => self.ucompare(|a, b| a < b),
            Inst::UGt => self.ucompare(|a, b| a > b),
            Inst::ZeroEq => {
                let c = self.vm.ds.pop()?;
                self.vm.ds.push(bool_cell(!c.flag()))
            }
            Inst::ZeroNe => {
                let c = self.vm.ds.pop()?;
                self.vm.ds.push(bool_cell(c.flag()))
            }
            Inst::ZeroLt => {
                let neg = num_sign(&self.vm.ds.pop()?)? == std::cmp::Ordering::Less;
                self.vm.ds.push(bool_cell(neg))
            }
            Inst::ZeroGt => {
                let pos = num_sign(&self.vm.ds.pop()?)? == std::cmp::Ordering::Greater;
                self.vm.ds.push(bool_cell(pos))
            }
            Inst::Fetch => {
                let a = self.vm.ds.pop()?.to_addr()?;
                let c = self.dict.data_get(a)?;
                self.vm.ds.push(c)
            }
            Inst::Store => {
                let a = self.vm.ds.pop()?.to_addr()?;
                let c = self.vm.ds.pop()?;
                self.dict.data_set(a, c)
            }
            Inst::PlusStore => {
                let a = self.vm.ds.pop()?.to_addr()?;
                let c = self.vm.ds.pop()?;
                let old = self.dict.data_get(a)?;
                let new = num_add(old, c)?;
                self.dict.data_set(a, new)
            }
        }
    }

    fn binary(&mut self, f: impl Fn(Cell, Cell) -> Wres1<Cell>) -> Wres {
        let b = self.vm.ds.pop()?;
        let a = self.vm.ds.pop()?;
        let c = f(a, b)?;
        self.vm.ds.push(c)
    }

    fn unary(&mut self, f: impl Fn(Cell) -> Wres1<Cell>) -> Wres {
        let a = self.vm.ds.pop()?;
        let c = f(a)?;
        self.vm.ds.push(c)
    }

    fn bits(&mut self, f: impl Fn(Wint, Wint) -> Wint) -> Wres {
        let b = self.vm.ds.pop()?.to_int()?;
        let a = self.vm.ds.pop()?.to_int()?;
        self.vm.ds.push(Cell::Int(f(a, b)))
    }

    fn compare(&mut self, f: impl Fn(std::cmp::Ordering) -> bool) -> Wres {
        let b = self.vm.ds.pop()?;
        let a = self.vm.ds.pop()?;
        let ord = num_cmp(&a, &b)?;
        self.vm.ds.push(bool_cell(f(ord)))
    }

    fn ucompare(&mut self, f: impl Fn(u64, u64) -> bool) -> Wres {
        let b = self.vm.ds.pop()?.to_uint()?;
        let a = self.vm.ds.pop()?.to_uint()?;
        self.vm.ds.push(bool_cell(f(a, b)))
    }

    // --- compile-time helpers ---

    pub fn set_state(&mut self, compiling: bool) -> Wres {
        self.vm.state = if compiling {
            VmState::Compile
        } else {
            VmState::Interpret
        };
        self.dict
            .data_set(self.vm.state_addr, if compiling { TRUE } else { FALSE })
    }

    pub fn current_base(&self) -> Wres1<u32> {
        let b = self.dict.data_get(self.vm.base_addr)?.to_int()?;
        check_base(b)?;
        Ok(b as u32)
    }

    pub fn print(&mut self, text: &str) {
        self.vm.print(text);
    }

    fn parse_name(&mut self) -> Wres1<Wsubstr> {
        self.vm.input.next_token().ok_or(Throw::ZERO_LENGTH_NAME)
    }

    fn find_word(&mut self, name: &str) -> Wres1<WordId> {
        match self.dict.lookup(name) {
            Some(id) => Ok(id),
            None => {
                self.vm.record_token_context(Wstr::from(name));
                Err(Throw::UNDEFINED_WORD)
            }
        }
    }

    fn find_xt(&mut self, name: &str) -> Wres1<Xt> {
        let id = self.find_word(name)?;
        Ok(self.dict.word(id)?.xt)
    }

    fn mark_push(&mut self, tag: &Wstr, loc: usize) -> Wres {
        self.vm.ds.push(Cell::Int(loc as Wint))?;
        self.vm.ds.push(Cell::Str(tag.clone()))
    }

    fn mark_pop(&mut self, tag: &Wstr) -> Wres1<usize> {
        let top = self
            .vm
            .ds
            .pop()
            .map_err(|_| Throw::CONTROL_STRUCTURE_MISMATCH)?;
        match top {
            Cell::Str(s) if s == *tag => {}
            _ => return Err(Throw::CONTROL_STRUCTURE_MISMATCH),
        }
        let loc = self
            .vm
            .ds
            .pop()
            .map_err(|_| Throw::CONTROL_STRUCTURE_MISMATCH)?;
        loc.to_usize().map_err(|_| Throw::CONTROL_STRUCTURE_MISMATCH)
    }

    fn mark_top_is(&self, tag: &Wstr) -> bool {
        match self.vm.ds.peek(0) {
            Ok(Cell::Str(s)) => *s == *tag,
            _ => false,
        }
    }

    fn patch_jump(&mut self, at: usize, rel: isize) -> Wres {
        let new = match self.dict.op_at(at)? {
            Op::Branch(_) => Op::Branch(rel),
            Op::Branch0(_) => Op::Branch0(rel),
            Op::Do(_) => Op::Do(rel),
            Op::QDo(_) => Op::QDo(rel),
            Op::Of(_) => Op::Of(rel),
            _ => return Err(Throw::CONTROL_STRUCTURE_MISMATCH),
        };
        self.dict.patch(at, new)
    }

    fn patch_forward(&mut self, at: usize) -> Wres {
        let here = self.dict.code_here();
        self.patch_jump(at, jump_offset(at, here))
    }
}

// numeric kernels shared by instructions; ints wrap, mixed int/float
// promotes, addresses admit offset arithmetic
fn num_add(a: Cell, b: Cell) -> Wres1<Cell> {
    match (a, b) {
        (Cell::Int(x), Cell::Int(y)) => Ok(Cell::Int(x.wrapping_add(y))),
        (Cell::Flt(x), Cell::Flt(y)) => Ok(Cell::Flt(x + y)),
        (Cell::Int(x), Cell::Flt(y)) => Ok(Cell::Flt(x as f64 + y)),
        (Cell::Flt(x), Cell::Int(y)) => Ok(Cell::Flt(x + y as f64)),
        (Cell::Addr(x), Cell::Int(y)) | (Cell::Int(y), Cell::Addr(x)) => addr_offset(x, y),
        _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
    }
}

fn num_sub(a: Cell, b: Cell) -> Wres1<Cell> {
    match (a, b) {
        (Cell::Int(x), Cell::Int(y)) => Ok(Cell::Int(x.wrapping_sub(y))),
        (Cell::Flt(x), Cell::Flt(y)) => Ok(Cell::Flt(x - y)),
        (Cell::Int(x), Cell::Flt(y)) => Ok(Cell::Flt(x as f64 - y)),
        (Cell::Flt(x), Cell::Int(y)) => Ok(Cell::Flt(x - y as f64)),
        (Cell::Addr(x), Cell::Int(y)) => addr_offset(x, -y),
        (Cell::Addr(x), Cell::Addr(y)) => Ok(Cell::Int(x as Wint - y as Wint)),
        _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
    }
}

fn num_mul(a: Cell, b: Cell) -> Wres1<Cell> {
    match (a, b) {
        (Cell::Int(x), Cell::Int(y)) => Ok(Cell::Int(x.wrapping_mul(y))),
        (Cell::Flt(x), Cell::Flt(y)) => Ok(Cell::Flt(x * y)),
        (Cell::Int(x), Cell::Flt(y)) => Ok(Cell::Flt(x as f64 * y)),
        (Cell::Flt(x), Cell::Int(y)) => Ok(Cell::Flt(x * y as f64)),
        _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
    }
}

fn num_div(a: Cell, b: Cell) -> Wres1<Cell> {
    match (a, b) {
        (Cell::Int(_), Cell::Int(0)) => Err(Throw::DIVISION_BY_ZERO),
        (Cell::Int(x), Cell::Int(y)) => Ok(Cell::Int(x.wrapping_div(y))),
        (Cell::Flt(x), Cell::Flt(y)) => Ok(Cell::Flt(x / y)),
        (Cell::Int(x), Cell::Flt(y)) => Ok(Cell::Flt(x as f64 / y)),
        (Cell::Flt(x), Cell::Int(y)) => Ok(Cell::Flt(x / y as f64)),
        _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
    }
}

fn num_mod(a: Cell, b: Cell) -> Wres1<Cell> {
    match (a, b) {
        (Cell::Int(_), Cell::Int(0)) => Err(Throw::DIVISION_BY_ZERO),
        (Cell::Int(x), Cell::Int(y)) => Ok(Cell::Int(x.wrapping_rem(y))),
        _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
    }
}

fn addr_offset(a: usize, off: Wint) -> Wres1<Cell> {
    let n = a as Wint + off;
    if n < 0 {
        Err(Throw::INVALID_MEMORY_ADDRESS)
    } else {
        Ok(Cell::Addr(n as usize))
    }
}

fn num_cmp(a: &Cell, b: &Cell) -> Wres1<std::cmp::Ordering> {
    let ord = match (a, b) {
        (Cell::Int(x), Cell::Int(y)) => x.cmp(y),
        (Cell::Addr(x), Cell::Addr(y)) => x.cmp(y),
        (Cell::Flt(x), Cell::Flt(y)) => return flt_cmp(*x, *y),
        (Cell::Int(x), Cell::Flt(y)) => return flt_cmp(*x as f64, *y),
        (Cell::Flt(x), Cell::Int(y)) => return flt_cmp(*x, *y as f64),
        (Cell::Str(x), Cell::Str(y)) => x.cmp(y),
        _ => return Err(Throw::ARGUMENT_TYPE_MISMATCH),
    };
    Ok(ord)
}

fn flt_cmp(x: f64, y: f64) -> Wres1<std::cmp::Ordering> {
    x.partial_cmp(&y).ok_or(Throw::FLOATING_OUT_OF_RANGE)
}

fn num_lt(a: &Cell, b: &Cell) -> Wres1<bool> {
    Ok(num_cmp(a, b)? == std::cmp::Ordering::Less)
}

fn num_sign(c: &Cell) -> Wres1<std::cmp::Ordering> {
    num_cmp(c, &ZERO)
}

// --- defining words ---

fn core_word_colon(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let entry = en.dict.code_here();
    let id = en.dict.append_word(&name, Xt::Code(entry), WordFlags::default())?;
    en.mark_push(&TAG_DEF, id)?;
    en.set_state(true)
}

fn core_word_noname(en: &mut Engine) -> Wres {
    let entry = en.dict.code_here();
    let id = en.dict.append_noname(Xt::Code(entry))?;
    en.vm.ds.push(Cell::Xt(Xt::Code(entry)))?;
    en.mark_push(&TAG_DEF, id)?;
    en.set_state(true)
}

fn core_word_semicolon(en: &mut Engine) -> Wres {
    let id = en.mark_pop(&TAG_DEF)?;
    if en.dict.smudged_word() != Some(id) {
        return Err(Throw::CONTROL_STRUCTURE_MISMATCH);
    }
    if en.dict.has_locals() {
        en.dict.emit(Op::Unlink)?;
        en.dict.clear_locals();
    }
    en.dict.emit(Op::Ret)?;
    en.dict.unsmudge()?;
    en.set_state(false)
}

fn core_word_recurse(en: &mut Engine) -> Wres {
    let id = en.dict.smudged_word().ok_or(Throw::INVALID_RECURSION)?;
    match en.dict.word(id)?.xt {
        Xt::Code(entry) => {
            en.dict.emit(Op::Call(entry))?;
            OK
        }
        _ => Err(Throw::INVALID_RECURSION),
    }
}

fn core_word_immediate(en: &mut Engine) -> Wres {
    let id = en.dict.latest().ok_or(Throw::INVALID_NAME_ARGUMENT)?;
    let flags = en.dict.word(id)?.flags.set_immediate();
    en.dict.word_mut(id)?.flags = flags;
    OK
}

fn core_word_compile_only(en: &mut Engine) -> Wres {
    let id = en.dict.latest().ok_or(Throw::INVALID_NAME_ARGUMENT)?;
    let flags = en.dict.word(id)?.flags.set_compile_only();
    en.dict.word_mut(id)?.flags = flags;
    OK
}

fn core_word_exit(en: &mut Engine) -> Wres {
    if en.dict.has_locals() {
        en.dict.emit(Op::Unlink)?;
    }
    en.dict.emit(Op::Ret)?;
    OK
}

// --- control flow ---

fn core_word_if(en: &mut Engine) -> Wres {
    let org = en.dict.emit(Op::Branch0(0))?;
    en.mark_push(&TAG_IF, org)
}

fn core_word_else(en: &mut Engine) -> Wres {
    let if_org = en.mark_pop(&TAG_IF)?;
    let else_org = en.dict.emit(Op::Branch(0))?;
    en.mark_push(&TAG_IF, else_org)?;
    en.patch_forward(if_org)
}

fn core_word_then(en: &mut Engine) -> Wres {
    let org = en.mark_pop(&TAG_IF)?;
    en.patch_forward(org)
}

fn core_word_begin(en: &mut Engine) -> Wres {
    let here = en.dict.code_here();
    en.mark_push(&TAG_BEGIN, here)
}

fn core_word_while(en: &mut Engine) -> Wres {
    let begin_org = en.mark_pop(&TAG_BEGIN)?;
    let w = en.dict.emit(Op::Branch0(0))?;
    en.mark_push(&TAG_WHILE, w)?;
    en.mark_push(&TAG_BEGIN, begin_org)
}

fn core_word_repeat(en: &mut Engine) -> Wres {
    let begin_org = en.mark_pop(&TAG_BEGIN)?;
    let at = en.dict.code_here();
    en.dict.emit(Op::Branch(jump_offset(at, begin_org)))?;
    let w = en.mark_pop(&TAG_WHILE)?;
    en.patch_forward(w)
}

fn core_word_until(en: &mut Engine) -> Wres {
    let begin_org = en.mark_pop(&TAG_BEGIN)?;
    let at = en.dict.code_here();
    en.dict.emit(Op::Branch0(jump_offset(at, begin_org)))?;
    OK
}

fn core_word_again(en: &mut Engine) -> Wres {
    let begin_org = en.mark_pop(&TAG_BEGIN)?;
    let at = en.dict.code_here();
    en.dict.emit(Op::Branch(jump_offset(at, begin_org)))?;
    OK
}

fn core_word_do(en: &mut Engine) -> Wres {
    let org = en.dict.emit(Op::Do(0))?;
    en.mark_push(&TAG_DO, org)
}

fn core_word_question_do(en: &mut Engine) -> Wres {
    let org = en.dict.emit(Op::QDo(0))?;
    en.mark_push(&TAG_DO, org)
}

fn core_word_loop(en: &mut Engine) -> Wres {
    let org = en.mark_pop(&TAG_DO)?;
    let at = en.dict.code_here();
    en.dict.emit(Op::Loop(jump_offset(at, org + 1)))?;
    en.patch_forward(org)
}

fn core_word_plus_loop(en: &mut Engine) -> Wres {
    let org = en.mark_pop(&TAG_DO)?;
    let at = en.dict.code_here();
    en.dict.emit(Op::PlusLoop(jump_offset(at, org + 1)))?;
    en.patch_forward(org)
}

fn core_word_leave(en: &mut Engine) -> Wres {
    en.dict.emit(Op::Leave)?;
    OK
}

fn core_word_case(en: &mut Engine) -> Wres {
    en.mark_push(&TAG_CASE, 0)
}

fn core_word_of(en: &mut Engine) -> Wres {
    let count = en.mark_pop(&TAG_CASE)?;
    let ft = if en.mark_top_is(&TAG_FALLTHROUGH) {
        Some(en.mark_pop(&TAG_FALLTHROUGH)?)
    } else {
        None
    };
    let org = en.dict.emit(Op::Of(0))?;
    if let Some(f) = ft {
        // a preceding clause falls into this body, past the test
        en.patch_forward(f)?;
    }
    en.mark_push(&TAG_CASE, count)?;
    en.mark_push(&TAG_OF, org)
}

fn core_word_endof(en: &mut Engine) -> Wres {
    let of_org = en.mark_pop(&TAG_OF)?;
    let count = en.mark_pop(&TAG_CASE)?;
    let exit_org = en.dict.emit(Op::Branch(0))?;
    en.patch_forward(of_org)?;
    en.mark_push(&TAG_ENDOF, exit_org)?;
    en.mark_push(&TAG_CASE, count + 1)
}

fn core_word_fallthrough(en: &mut Engine) -> Wres {
    let of_org = en.mark_pop(&TAG_OF)?;
    let count = en.mark_pop(&TAG_CASE)?;
    let ft_org = en.dict.emit(Op::Branch(0))?;
    en.patch_forward(of_org)?;
    en.mark_push(&TAG_FALLTHROUGH, ft_org)?;
    en.mark_push(&TAG_CASE, count)
}

fn core_word_endcase(en: &mut Engine) -> Wres {
    let count = en.mark_pop(&TAG_CASE)?;
    en.dict.emit(Op::Inst(Inst::Drop))?;
    if en.mark_top_is(&TAG_FALLTHROUGH) {
        let f = en.mark_pop(&TAG_FALLTHROUGH)?;
        en.patch_forward(f)?;
    }
    for _ in 0..count {
        let e = en.mark_pop(&TAG_ENDOF)?;
        en.patch_forward(e)?;
    }
    OK
}

// --- literals, tick, postpone ---

fn core_word_literal(en: &mut Engine) -> Wres {
    let c = en.vm.ds.pop()?;
    en.dict.emit_literal(c)
}

fn core_word_lbracket(en: &mut Engine) -> Wres {
    en.set_state(false)
}

fn core_word_rbracket(en: &mut Engine) -> Wres {
    en.set_state(true)
}

fn core_word_tick(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let xt = en.find_xt(&name)?;
    en.vm.ds.push(Cell::Xt(xt))
}

fn core_word_bracket_tick(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let xt = en.find_xt(&name)?;
    en.dict.emit_literal(Cell::Xt(xt))
}

fn core_word_execute(en: &mut Engine) -> Wres {
    let xt = en.vm.ds.pop()?.to_xt()?;
    en.execute_xt(xt)
}

fn core_word_postpone(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let id = en.find_word(&name)?;
    let w = en.dict.word(id)?;
    let xt = w.xt;
    let immediate = w.flags.immediate();
    if immediate {
        en.compile_xt(xt)
    } else {
        en.dict.emit_literal(Cell::Xt(xt))?;
        en.dict.emit(Op::Native(NativePtr(core_word_compile_comma)))?;
        OK
    }
}

fn core_word_compile_comma(en: &mut Engine) -> Wres {
    let xt = en.vm.ds.pop()?.to_xt()?;
    en.compile_xt(xt)
}

// --- create / does> ---

fn create_data_word(en: &mut Engine, name: &str) -> Wres1<WordId> {
    let entry = en.dict.code_here();
    let id = en.dict.append_word(name, Xt::Code(entry), WordFlags::default())?;
    let ix = en.dict.data_push(Cell::Addr(en.dict.data_here() + 1))?;
    en.dict.emit(Op::Lit(ix))?;
    en.dict.emit(Op::Ret)?;
    en.dict.unsmudge()?;
    en.dict.mark_created(id);
    Ok(id)
}

fn core_word_create(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    create_data_word(en, &name)?;
    OK
}

fn core_word_variable(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    create_data_word(en, &name)?;
    en.dict.data_push(ZERO)?;
    OK
}

fn core_word_constant(en: &mut Engine) -> Wres {
    let c = en.vm.ds.pop()?;
    let name = en.parse_name()?;
    en.dict.def_constant(&name, c)?;
    OK
}

fn core_word_does(en: &mut Engine) -> Wres {
    if en.dict.has_locals() {
        en.dict.emit(Op::Unlink)?;
        en.dict.clear_locals();
    }
    en.dict.emit(Op::Does)?;
    OK
}

fn core_word_to_body(en: &mut Engine) -> Wres {
    let xt = en.vm.ds.pop()?.to_xt()?;
    let entry = match xt {
        Xt::Code(e) => e,
        _ => return Err(Throw::NOT_CREATED),
    };
    match en.dict.op_at(entry)? {
        Op::Lit(ix) => {
            let c = en.dict.data_get(ix)?;
            if let Cell::Addr(_) = c {
                en.vm.ds.push(c)
            } else {
                Err(Throw::NOT_CREATED)
            }
        }
        _ => Err(Throw::NOT_CREATED),
    }
}

// --- parsing words ---

fn core_word_s_quote(en: &mut Engine) -> Wres {
    let text = en.vm.input.parse_until('"')?;
    en.push_or_compile(Cell::Str(Wstr::from(text.as_str())))
}

fn core_word_dot_quote(en: &mut Engine) -> Wres {
    let text = en.vm.input.parse_until('"')?;
    if en.vm.is_compiling() {
        en.dict.emit_literal(Cell::Str(Wstr::from(text.as_str())))?;
        en.dict
            .emit(Op::Native(NativePtr(crate::prims::core_word_type)))?;
        OK
    } else {
        en.print(text.as_str());
        OK
    }
}

fn core_word_paren(en: &mut Engine) -> Wres {
    en.vm.input.parse_until_or_end(')');
    OK
}

fn core_word_backslash(en: &mut Engine) -> Wres {
    en.vm.input.skip_line();
    OK
}

fn core_word_char(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let c = name.chars().next().ok_or(Throw::ZERO_LENGTH_NAME)?;
    en.vm.ds.push(Cell::Int(c as Wint))
}

fn core_word_bracket_char(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let c = name.chars().next().ok_or(Throw::ZERO_LENGTH_NAME)?;
    en.dict.emit_literal(Cell::Int(c as Wint))
}

fn core_word_local(en: &mut Engine) -> Wres {
    let name = en.parse_name()?;
    let slot = en.dict.add_local(&name)?;
    if slot == 0 {
        en.dict.emit(Op::Link)?;
    }
    en.dict.emit(Op::Bind(slot))?;
    OK
}

// --- aborts and unwind ---

fn core_word_abort(_en: &mut Engine) -> Wres {
    Err(Throw::ABORT)
}

fn abort_quote_runtime(en: &mut Engine) -> Wres {
    let msg = en.vm.ds.pop()?.to_str()?;
    let flag = en.vm.ds.pop()?;
    if flag.flag() {
        en.vm.set_abort_message(msg);
        Err(Throw::ABORT_QUOTE)
    } else {
        OK
    }
}

fn core_word_abort_quote(en: &mut Engine) -> Wres {
    let text = en.vm.input.parse_until('"')?;
    let msg = Cell::Str(Wstr::from(text.as_str()));
    if en.vm.is_compiling() {
        en.dict.emit_literal(msg)?;
        en.dict.emit(Op::Native(NativePtr(abort_quote_runtime)))?;
        OK
    } else {
        en.vm.ds.push(msg)?;
        abort_quote_runtime(en)
    }
}

fn core_word_quit(_en: &mut Engine) -> Wres {
    Err(Throw::QUIT)
}

fn core_word_bye(_en: &mut Engine) -> Wres {
    Err(Throw::USER_EXIT)
}

fn core_word_evaluate(en: &mut Engine) -> Wres {
    let src = en.vm.ds.pop()?.to_str()?;
    en.eval_nested(&src)
}

fn core_word_catch(en: &mut Engine) -> Wres {
    let xt = en.vm.ds.pop()?.to_xt()?;
    let ds_depth = en.vm.ds.len();
    let rs_depth = en.vm.rs.len();
    let state = en.vm.state;
    let input = en.vm.input.clone();
    match en.execute_xt(xt) {
        Ok(()) => en.vm.ds.push(ZERO),
        Err(t) if t.is_signal() => Err(t),
        Err(t) => {
            en.vm.input = input;
            en.vm.ds.restore_depth(ds_depth);
            en.vm.rs.restore_depth(rs_depth);
            en.set_state(state == VmState::Compile)?;
            en.vm.ds.push(Cell::Int(t.0))
        }
    }
}

fn core_word_throw(en: &mut Engine) -> Wres {
    let c = en.vm.ds.pop()?;
    if c == ZERO {
        OK
    } else {
        Err(cell_to_throw(&c)?)
    }
}

/// Compiler and definition vocabulary.
pub fn load(dict: &mut Dict) -> Wres {
    dict.defword(":", core_word_colon)?;
    dict.defword(":noname", core_word_noname)?;
    dict.def_compiler(";", core_word_semicolon)?;
    dict.def_compiler("recurse", core_word_recurse)?;
    dict.defword("immediate", core_word_immediate)?;
    dict.defword("compile-only", core_word_compile_only)?;
    dict.def_compiler("exit", core_word_exit)?;
    dict.def_compiler("if", core_word_if)?;
    dict.def_compiler("else", core_word_else)?;
    dict.def_compiler("then", core_word_then)?;
    dict.def_compiler("begin", core_word_begin)?;
    dict.def_compiler("while", core_word_while)?;
    dict.def_compiler("repeat", core_word_repeat)?;
    dict.def_compiler("until", core_word_until)?;
    dict.def_compiler("again", core_word_again)?;
    dict.def_compiler("do", core_word_do)?;
    dict.def_compiler("?do", core_word_question_do)?;
    dict.def_compiler("loop", core_word_loop)?;
    dict.def_compiler("+loop", core_word_plus_loop)?;
    dict.def_compiler("leave", core_word_leave)?;
    dict.def_inst_compile_only("i", Inst::I)?;
    dict.def_inst_compile_only("j", Inst::J)?;
    dict.def_inst_compile_only("k", Inst::K)?;
    dict.def_inst_compile_only("unloop", Inst::Unloop)?;
    dict.def_compiler("case", core_word_case)?;
    dict.def_compiler("of", core_word_of)?;
    dict.def_compiler("endof", core_word_endof)?;
    dict.def_compiler("fallthrough", core_word_fallthrough)?;
    dict.def_compiler("endcase", core_word_endcase)?;
    dict.def_compiler("literal", core_word_literal)?;
    dict.def_compiler("[", core_word_lbracket)?;
    dict.defword("]", core_word_rbracket)?;
    dict.defword("'", core_word_tick)?;
    dict.def_compiler("[']", core_word_bracket_tick)?;
    dict.defword("execute", core_word_execute)?;
    dict.def_compiler("postpone", core_word_postpone)?;
    dict.defword("compile,", core_word_compile_comma)?;
    dict.defword("create", core_word_create)?;
    dict.def_compiler("does>", core_word_does)?;
    dict.defword("variable", core_word_variable)?;
    dict.defword("constant", core_word_constant)?;
    dict.defword(">body", core_word_to_body)?;
    dict.def_immediate("s\"", core_word_s_quote)?;
    dict.def_immediate(".\"", core_word_dot_quote)?;
    dict.def_immediate("(", core_word_paren)?;
    dict.def_immediate("\\", core_word_backslash)?;
    dict.defword("char", core_word_char)?;
    dict.def_compiler("[char]", core_word_bracket_char)?;
    dict.def_compiler("local", core_word_local)?;
    dict.defword("abort", core_word_abort)?;
    dict.def_immediate("abort\"", core_word_abort_quote)?;
    dict.defword("quit", core_word_quit)?;
    dict.defword("bye", core_word_bye)?;
    dict.defword("evaluate", core_word_evaluate)?;
    dict.defword("catch", core_word_catch)?;
    dict.defword("throw", core_word_throw)?;
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

    fn word_ops(w: &Weft, name: &str) -> Vec<Op> {
        let dict = w.dict();
        let id = dict.lookup(name).unwrap();
        let entry = match dict.word(id).unwrap().xt {
            Xt::Code(e) => e,
            other => panic!("not threaded code: {:?}", other),
        };
        let mut ops = Vec::new();
        let mut at = entry;
        loop {
            let op = dict.op_at(at).unwrap();
            ops.push(op);
            if op == Op::Ret {
                break ops;
            }
            at += 1;
            assert!(at - entry < 64, "runaway body");
        }
    }

    #[test]
    fn test_literal_forms_across_boundary() {
        let mut w = boot();
        w.eval(": a 16 ; : b 17 ; : c -16 ; : d -17 ;").unwrap();
        assert_eq!(vec![Op::SmallInt(16), Op::Ret], word_ops(&w, "a"));
        assert_eq!(vec![Op::SmallInt(-16), Op::Ret], word_ops(&w, "c"));
        assert!(matches!(word_ops(&w, "b")[0], Op::Lit(_)));
        assert!(matches!(word_ops(&w, "d")[0], Op::Lit(_)));
        w.eval("a b c d").unwrap();
        assert_eq!(-17, pop_int(&mut w));
        assert_eq!(-16, pop_int(&mut w));
        assert_eq!(17, pop_int(&mut w));
        assert_eq!(16, pop_int(&mut w));
        assert_eq!(0, w.depth());
    }

    #[test]
    fn test_if_else_then() {
        let mut w = boot();
        w.eval(": ?abs dup 0< if negate then ;").unwrap();
        w.eval("-5 ?abs 7 ?abs").unwrap();
        assert_eq!(7, pop_int(&mut w));
        assert_eq!(5, pop_int(&mut w));
        w.eval(": sign 0< if -1 else 1 then ;").unwrap();
        w.eval("-3 sign 3 sign").unwrap();
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(-1, pop_int(&mut w));
    }

    #[test]
    fn test_unbalanced_if_is_mismatch() {
        let mut w = boot();
        assert_eq!(Err(Throw::CONTROL_STRUCTURE_MISMATCH), w.eval(": bad if ;"));
        // the aborted definition is invisible and the engine usable
        assert_eq!(None, w.dict().lookup("bad"));
        w.eval("1 2 +").unwrap();
        assert_eq!(3, pop_int(&mut w));
    }

    #[test]
    fn test_then_without_if() {
        let mut w = boot();
        assert_eq!(Err(Throw::CONTROL_STRUCTURE_MISMATCH), w.eval(": bad then ;"));
        assert_eq!(Err(Throw::COMPILE_ONLY_WORD), w.eval("then"));
    }

    #[test]
    fn test_begin_until_and_while_repeat() {
        let mut w = boot();
        w.eval(": countdown begin 1- dup 0= until drop ; 5 countdown").unwrap();
        assert_eq!(0, w.depth());
        w.eval(": tri 0 swap begin dup 0> while tuck + swap 1- repeat drop ;")
            .unwrap();
        w.eval("5 tri").unwrap();
        assert_eq!(15, pop_int(&mut w));
    }

    #[test]
    fn test_do_loop_indices() {
        let mut w = boot();
        w.eval(": all 10 0 do i loop ; all").unwrap();
        assert_eq!(10, w.depth());
        assert_eq!(9, pop_int(&mut w));
        for expect in (0..9).rev() {
            assert_eq!(expect, pop_int(&mut w));
        }
    }

    #[test]
    fn test_leave_exits_early() {
        let mut w = boot();
        w.eval(": l 10 0 do i 3 = if leave then i loop ; l").unwrap();
        assert_eq!(3, w.depth());
        assert_eq!(2, pop_int(&mut w));
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
    }

    #[test]
    fn test_question_do_skips_empty_range() {
        let mut w = boot();
        w.eval(": none 0 0 ?do 99 loop ; none").unwrap();
        assert_eq!(0, w.depth());
        w.eval(": some 2 0 ?do 7 loop ; some").unwrap();
        assert_eq!(2, w.depth());
        w.clear_stack();
    }

    #[test]
    fn test_plus_loop_steps() {
        let mut w = boot();
        w.eval(": evens 10 0 do i 2 +loop ; evens").unwrap();
        assert_eq!(5, w.depth());
        assert_eq!(8, pop_int(&mut w));
        w.clear_stack();
        w.eval(": down 0 5 do i -1 +loop ; down").unwrap();
        assert_eq!(6, w.depth());
        assert_eq!(0, pop_int(&mut w));
        assert_eq!(1, pop_int(&mut w));
        w.clear_stack();
    }

    #[test]
    fn test_nested_loops_j() {
        let mut w = boot();
        w.eval(": grid 2 0 do 2 0 do j 10 * i + loop loop ; grid").unwrap();
        assert_eq!(11, pop_int(&mut w));
        assert_eq!(10, pop_int(&mut w));
        assert_eq!(1, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
    }

    #[test]
    fn test_case_selects_clause() {
        let mut w = boot();
        w.eval(": sel case 1 of 100 endof 2 of 200 endof 999 swap endcase ;")
            .unwrap();
        w.eval("1 sel 2 sel 7 sel").unwrap();
        assert_eq!(999, pop_int(&mut w));
        assert_eq!(200, pop_int(&mut w));
        assert_eq!(100, pop_int(&mut w));
        assert_eq!(0, w.depth());
    }

    #[test]
    fn test_case_fallthrough_links_clauses() {
        let mut w = boot();
        w.eval(": ft case 1 of 10 fallthrough 2 of 20 endof endcase ;")
            .unwrap();
        w.eval("2 ft").unwrap();
        assert_eq!(20, pop_int(&mut w));
        assert_eq!(0, w.depth());
        w.eval("1 ft").unwrap();
        assert_eq!(20, pop_int(&mut w));
        assert_eq!(10, pop_int(&mut w));
        w.eval("5 ft").unwrap();
        assert_eq!(0, w.depth());
    }

    #[test]
    fn test_trailing_fallthrough_enters_default() {
        let mut w = boot();
        w.eval(": tf case 1 of 7 fallthrough endcase ;").unwrap();
        w.eval("1 tf").unwrap();
        assert_eq!(7, pop_int(&mut w));
        w.eval("2 tf").unwrap();
        assert_eq!(0, w.depth());
    }

    #[test]
    fn test_catch_throw_round_trip() {
        let mut w = boot();
        w.eval(": boom 1 2 3 99 throw ; : fine 5 ;").unwrap();
        w.eval("10 ' boom catch").unwrap();
        assert_eq!(99, pop_int(&mut w));
        assert_eq!(10, pop_int(&mut w));
        assert_eq!(0, w.depth());
        w.eval("' fine catch").unwrap();
        assert_eq!(0, pop_int(&mut w));
        assert_eq!(5, pop_int(&mut w));
    }

    #[test]
    fn test_throw_zero_is_noop() {
        let mut w = boot();
        w.eval("42 0 throw").unwrap();
        assert_eq!(42, pop_int(&mut w));
    }

    #[test]
    fn test_uncaught_throw_reaches_host() {
        let mut w = boot();
        assert_eq!(Err(Throw::ABORT), w.eval("abort"));
        assert_eq!(Err(Throw(-77)), w.eval("-77 throw"));
    }

    #[test]
    fn test_abort_quote_records_message() {
        let mut w = boot();
        w.eval(": guard abort\" negative size\" ;").unwrap();
        w.eval("0 guard").unwrap();
        assert_eq!(Err(Throw::ABORT_QUOTE), w.eval("-1 guard"));
        let report = w.last_error_report(0).unwrap();
        assert!(report.contains("negative size"));
    }

    #[test]
    fn test_definition_spans_buffers() {
        let mut w = boot();
        w.eval(": add2 2").unwrap();
        assert!(w.compiling(0));
        w.eval("+ ;").unwrap();
        assert!(!w.compiling(0));
        w.eval("5 add2").unwrap();
        assert_eq!(7, pop_int(&mut w));
    }

    #[test]
    fn test_create_does_defines_defining_word() {
        let mut w = boot();
        w.eval(": const create , does> @ ;").unwrap();
        w.eval("42 const answer answer").unwrap();
        assert_eq!(42, pop_int(&mut w));
        w.eval("7 const seven seven answer").unwrap();
        assert_eq!(42, pop_int(&mut w));
        assert_eq!(7, pop_int(&mut w));
    }

    #[test]
    fn test_create_body_addressing() {
        let mut w = boot();
        w.eval("create buf 3 allot 7 buf ! buf @").unwrap();
        assert_eq!(7, pop_int(&mut w));
        w.eval("9 buf 2 + ! buf 2 + @").unwrap();
        assert_eq!(9, pop_int(&mut w));
    }

    #[test]
    fn test_to_body() {
        let mut w = boot();
        w.eval("create cellar 21 , ' cellar >body @").unwrap();
        assert_eq!(21, pop_int(&mut w));
        assert_eq!(Err(Throw::NOT_CREATED), w.eval("' dup >body"));
    }

    #[test]
    fn test_locals_bind_and_read() {
        let mut w = boot();
        w.eval(": dist2 local dy local dx dx dx * dy dy * + ;").unwrap();
        w.eval("3 4 dist2").unwrap();
        assert_eq!(25, pop_int(&mut w));
        // frame unwinds cleanly across calls
        w.eval("1 2 dist2 3 4 dist2 +").unwrap();
        assert_eq!(30, pop_int(&mut w));
    }

    #[test]
    fn test_locals_with_exit() {
        let mut w = boot();
        w.eval(": clamp0 local n n 0< if 0 exit then n ;").unwrap();
        w.eval("-9 clamp0 6 clamp0").unwrap();
        assert_eq!(6, pop_int(&mut w));
        assert_eq!(0, pop_int(&mut w));
        assert_eq!(0, w.depth());
    }

    #[test]
    fn test_tick_and_execute() {
        let mut w = boot();
        w.eval("5 ' dup execute").unwrap();
        assert_eq!(2, w.depth());
        assert_eq!(5, pop_int(&mut w));
        assert_eq!(5, pop_int(&mut w));
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("' no-such-word"));
    }

    #[test]
    fn test_noname_leaves_xt() {
        let mut w = boot();
        w.eval(":noname 6 7 * ; execute").unwrap();
        assert_eq!(42, pop_int(&mut w));
    }

    #[test]
    fn test_recurse() {
        let mut w = boot();
        w.eval(": fact dup 2 < if drop 1 else dup 1- recurse * then ;")
            .unwrap();
        w.eval("5 fact").unwrap();
        assert_eq!(120, pop_int(&mut w));
    }

    #[test]
    fn test_postpone() {
        let mut w = boot();
        w.eval(": my-if postpone if ; immediate").unwrap();
        w.eval(": t 1 my-if 42 then ; t").unwrap();
        assert_eq!(42, pop_int(&mut w));
        // an ordinary word postponed by an immediate definer lands in the
        // body under construction, not in the definer
        w.eval(": 2dup' postpone 2dup ; immediate : u 1 2 2dup' ; u")
            .unwrap();
        assert_eq!(4, w.depth());
        assert_eq!(
            vec![
                Op::SmallInt(1),
                Op::SmallInt(2),
                Op::Inst(Inst::TwoDup),
                Op::Ret
            ],
            word_ops(&w, "u")
        );
        w.clear_stack();
    }

    #[test]
    fn test_bracket_state_switch() {
        let mut w = boot();
        w.eval(": four [ 2 2 + ] literal ; four").unwrap();
        assert_eq!(4, pop_int(&mut w));
        assert_eq!(vec![Op::SmallInt(4), Op::Ret], word_ops(&w, "four"));
    }

    #[test]
    fn test_evaluate_nests_and_restores_input() {
        let mut w = boot();
        w.eval("s\" 3 4 +\" evaluate 10 +").unwrap();
        assert_eq!(17, pop_int(&mut w));
    }

    #[test]
    fn test_char_words() {
        let mut w = boot();
        w.eval("char A").unwrap();
        assert_eq!(65, pop_int(&mut w));
        w.eval(": q [char] * ; q").unwrap();
        assert_eq!(42, pop_int(&mut w));
    }

    #[test]
    fn test_comments() {
        let mut w = boot();
        w.eval("1 ( inline comment ) 2 \\ rest is gone\n3").unwrap();
        assert_eq!(3, w.depth());
        assert_eq!(3, pop_int(&mut w));
        w.clear_stack();
    }

    #[test]
    fn test_compile_only_rejected_interpreting() {
        let mut w = boot();
        assert_eq!(Err(Throw::COMPILE_ONLY_WORD), w.eval("if"));
        assert_eq!(Err(Throw::COMPILE_ONLY_WORD), w.eval("exit"));
        assert_eq!(Err(Throw::COMPILE_ONLY_WORD), w.eval("i"));
    }

    #[test]
    fn test_undefined_word_reports_context() {
        let mut w = boot();
        assert_eq!(Err(Throw::UNDEFINED_WORD), w.eval("1 2 frobnicate"));
        let report = w.last_error_report(0).unwrap();
        assert!(report.contains("undefined word"));
        assert!(report.contains("frobnicate"));
        assert!(report.contains("^^^^^^^^^^"));
    }

    #[test]
    fn test_definition_abort_restores_cursor() {
        let mut w = boot();
        let code0 = w.dict().code_here();
        let data0 = w.dict().data_here();
        let words0 = w.dict().word_count();
        assert!(w.eval(": broken 1 2 frobnicate ;").is_err());
        assert_eq!(code0, w.dict().code_here());
        assert_eq!(data0, w.dict().data_here());
        assert_eq!(words0, w.dict().word_count());
        assert_eq!(None, w.dict().lookup("broken"));
    }

    #[test]
    fn test_quit_preserves_data_stack() {
        let mut w = boot();
        w.eval("1 2").unwrap();
        assert_eq!(Err(Throw::QUIT), w.eval("quit"));
        assert_eq!(2, w.depth());
        w.clear_stack();
    }

    #[test]
    fn test_if_branch_shape() {
        let mut w = boot();
        w.eval(": t 1 if 2 then 3 ;").unwrap();
        assert_eq!(
            vec![
                Op::SmallInt(1),
                Op::Branch0(2),
                Op::SmallInt(2),
                Op::SmallInt(3),
                Op::Ret
            ],
            word_ops(&w, "t")
        );
        w.eval(": e 1 if 2 else 3 then 4 ;").unwrap();
        assert_eq!(
            vec![
                Op::SmallInt(1),
                Op::Branch0(3),
                Op::SmallInt(2),
                Op::Branch(2),
                Op::SmallInt(3),
                Op::SmallInt(4),
                Op::Ret
            ],
            word_ops(&w, "e")
        );
    }

    #[test]
    fn test_loop_shape() {
        let mut w = boot();
        w.eval(": t 3 0 do i loop ;").unwrap();
        assert_eq!(
            vec![
                Op::SmallInt(3),
                Op::SmallInt(0),
                Op::Do(3),
                Op::Inst(Inst::I),
                Op::Loop(-1),
                Op::Ret
            ],
            word_ops(&w, "t")
        );
    }
}
