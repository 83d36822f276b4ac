use std::io::Write;

use crate::cell::Wstr;
use crate::input::Input;
use crate::stack::Stack;
use crate::throw::Throw;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VmState {
    Interpret,
    Compile,
}

pub type OutHook = fn(&str);

/// Where a VM's text output lands. The engine never assumes a terminal;
/// hosts pick stdout, an in-memory buffer, or their own sink.
#[derive(Debug)]
pub enum OutPort {
    Stdout,
    Capture(String),
    Hook(OutHook),
}

/// Source context of the last scanned token, kept for error reports.
#[derive(Clone, Debug, Default)]
pub struct ErrorCtx {
    pub token: Wstr,
    pub line: u32,
    pub col: u32,
    pub line_text: Wstr,
    pub message: Option<Wstr>,
}

/// One interpreter instance. Stacks and registers are per-VM; the
/// dictionary is shared and borrowed alongside the VM for each run.
#[derive(Debug)]
pub struct Vm {
    pub ds: Stack,
    pub rs: Stack,
    pub ip: usize,
    pub state: VmState,
    pub input: Input,
    pub out: OutPort,
    pub base_addr: usize,
    pub state_addr: usize,
    pub pad_addr: usize,
    pub err: Option<ErrorCtx>,
    pub last_throw: Option<Throw>,
}

impl Vm {
    pub fn new(ds_cap: usize, rs_cap: usize, base_addr: usize, state_addr: usize, pad_addr: usize) -> Vm {
        Vm {
            ds: Stack::new(ds_cap, Throw::STACK_OVERFLOW, Throw::STACK_UNDERFLOW),
            rs: Stack::new(
                rs_cap,
                Throw::RETURN_STACK_OVERFLOW,
                Throw::RETURN_STACK_UNDERFLOW,
            ),
            ip: 0,
            state: VmState::Interpret,
            input: Input::empty(),
            out: OutPort::Stdout,
            base_addr,
            state_addr,
            pad_addr,
            err: None,
            last_throw: None,
        }
    }

    pub fn is_compiling(&self) -> bool {
        self.state == VmState::Compile
    }

    /// Clear both stacks and return to interpret state. Input and the
    /// last error context stay for the host to inspect.
    pub fn reset(&mut self) {
        self.ds.clear();
        self.rs.clear();
        self.ip = 0;
        self.state = VmState::Interpret;
    }

    pub fn print(&mut self, text: &str) {
        match &mut self.out {
            OutPort::Stdout => {
                let out = std::io::stdout();
                let mut lock = out.lock();
                let _ = lock.write_all(text.as_bytes());
                let _ = lock.flush();
            }
            OutPort::Capture(buf) => buf.push_str(text),
            OutPort::Hook(f) => f(text),
        }
    }

    pub fn capture_output(&mut self) {
        self.out = OutPort::Capture(String::new());
    }

    pub fn take_output(&mut self) -> String {
        match &mut self.out {
            OutPort::Capture(buf) => std::mem::take(buf),
            _ => String::new(),
        }
    }

    /// Remember the token about to run; if it fails, the report points
    /// here. Overwritten by every token, so it is always the last one.
    pub fn record_token_context(&mut self, token: Wstr) {
        let (line, col) = self.input.token_location();
        self.err = Some(ErrorCtx {
            token,
            line,
            col,
            line_text: Wstr::from(self.input.token_line_text().as_str()),
            message: None,
        });
    }

    pub fn set_abort_message(&mut self, message: Wstr) {
        match &mut self.err {
            Some(ctx) => ctx.message = Some(message),
            None => {
                self.err = Some(ErrorCtx {
                    message: Some(message),
                    ..ErrorCtx::default()
                })
            }
        }
    }

    /// Render the throw code plus a caret under the offending token.
    pub fn error_report(&self, t: Throw) -> String {
        let mut s = String::new();
        match t.description() {
            Some(d) => s.push_str(&format!("error {}: {}\n", t.0, d)),
            None => s.push_str(&format!("error {}\n", t.0)),
        }
        if let Some(ctx) = &self.err {
            if let Some(msg) = &ctx.message {
                s.push_str(msg);
                s.push('\n');
            }
            if !ctx.line_text.is_empty() {
                s.push_str(&format!("at {}:{}\n", ctx.line, ctx.col));
                s.push_str(&ctx.line_text);
                s.push('\n');
                for _ in 1..ctx.col {
                    s.push(' ');
                }
                let width = ctx.token.chars().count().max(1);
                for _ in 0..width {
                    s.push('^');
                }
                s.push('\n');
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::input::SOURCE_HOST;

    #[test]
    fn test_capture_output() {
        let mut vm = Vm::new(4, 4, 0, 1, 2);
        vm.capture_output();
        vm.print("4 5");
        vm.print(" 6");
        assert_eq!("4 5 6", vm.take_output());
        assert_eq!("", vm.take_output());
    }

    #[test]
    fn test_reset() {
        let mut vm = Vm::new(4, 4, 0, 1, 2);
        vm.ds.push(Cell::Int(1)).unwrap();
        vm.rs.push(Cell::Int(2)).unwrap();
        vm.state = VmState::Compile;
        vm.ip = 9;
        vm.reset();
        assert_eq!(0, vm.ds.len());
        assert_eq!(0, vm.rs.len());
        assert_eq!(VmState::Interpret, vm.state);
        assert_eq!(0, vm.ip);
    }

    #[test]
    fn test_error_report_caret() {
        let mut vm = Vm::new(4, 4, 0, 1, 2);
        vm.input = Input::new("1 2 frobnicate +", SOURCE_HOST);
        vm.input.next_token();
        vm.input.next_token();
        let tok = Wstr::from(vm.input.next_token().unwrap().as_str());
        vm.record_token_context(tok);
        let report = vm.error_report(Throw::UNDEFINED_WORD);
        assert_eq!(
            "error -13: undefined word\nat 1:5\n1 2 frobnicate +\n    ^^^^^^^^^^\n",
            report
        );
    }

    #[test]
    fn test_abort_message_in_report() {
        let mut vm = Vm::new(4, 4, 0, 1, 2);
        vm.set_abort_message(Wstr::from("bad input"));
        let report = vm.error_report(Throw::ABORT_QUOTE);
        assert!(report.starts_with("error -2"));
        assert!(report.contains("bad input\n"));
    }
}
