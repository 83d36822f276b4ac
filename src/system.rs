use crate::cell::{Cell, Wint, FALSE};
use crate::dict::Dict;
use crate::engine::{Engine, ParseStep, ParseStepFn, PARSE_STEPS_MAX};
use crate::env::Env;
use crate::input::{Input, SOURCE_HOST};
use crate::throw::{Throw, Wres, Wres1, OK};
use crate::vm::{OutHook, OutPort, Vm, VmState};
use crate::word::NativeFn;
use crate::wordlist::WordId;
use crate::{engine, env, prims, search};

pub type VmId = usize;

const PAD_CELLS: usize = 64;

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub dict_cells: usize,
    pub data_stack: usize,
    pub return_stack: usize,
    pub buckets: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            dict_cells: 65536,
            data_stack: 256,
            return_stack: 256,
            buckets: 241,
        }
    }
}

/// The embeddable interpreter: one dictionary, any number of VMs.
pub struct Weft {
    dict: Dict,
    env: Env,
    vms: Vec<Vm>,
    steps: Vec<ParseStep>,
    config: Config,
}

impl Weft {
    pub fn boot() -> Wres1<Weft> {
        Weft::boot_with(Config::default())
    }

    pub fn boot_with(config: Config) -> Wres1<Weft> {
        let mut dict = Dict::new(config.dict_cells, config.buckets);
        engine::load(&mut dict)?;
        prims::load(&mut dict)?;
        search::load(&mut dict)?;
        env::load(&mut dict)?;
        let mut env = Env::new();
        env.set("stack-cells", Cell::Int(config.data_stack as Wint));
        env.set("return-stack-cells", Cell::Int(config.return_stack as Wint));
        let mut weft = Weft {
            dict,
            env,
            vms: Vec::new(),
            steps: vec![ParseStep::Words, ParseStep::Numbers],
            config,
        };
        weft.spawn_vm()?;
        weft.dict.set_fence();
        Ok(weft)
    }

    /// Add a VM with fresh stacks and its own base/state/pad cells.
    /// VM 0 exists from boot.
    pub fn spawn_vm(&mut self) -> Wres1<VmId> {
        let base_addr = self.dict.data_push(Cell::Int(10))?;
        let state_addr = self.dict.data_push(FALSE)?;
        let pad_addr = self.dict.data_here();
        self.dict.allot(PAD_CELLS)?;
        let vm = Vm::new(
            self.config.data_stack,
            self.config.return_stack,
            base_addr,
            state_addr,
            pad_addr,
        );
        let vid = self.vms.len();
        self.vms.push(vm);
        Ok(vid)
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    fn vm_mut(&mut self, vid: VmId) -> Wres1<&mut Vm> {
        self.vms.get_mut(vid).ok_or(Throw::RESULT_OUT_OF_RANGE)
    }

    fn vm_ref(&self, vid: VmId) -> Wres1<&Vm> {
        self.vms.get(vid).ok_or(Throw::RESULT_OUT_OF_RANGE)
    }

    fn engine(&mut self, vid: VmId) -> Wres1<Engine<'_>> {
        let vm = self.vms.get_mut(vid).ok_or(Throw::RESULT_OUT_OF_RANGE)?;
        Ok(Engine {
            dict: &mut self.dict,
            vm,
            env: &self.env,
            steps: &self.steps,
        })
    }

    pub fn eval(&mut self, src: &str) -> Wres {
        self.eval_vm(0, src)
    }

    /// Interpret a host buffer on the given VM. Compile state may stay
    /// open across buffers; an incomplete parse comes back as an error
    /// the host answers with `eval_continue`.
    pub fn eval_vm(&mut self, vid: VmId, src: &str) -> Wres {
        {
            let vm = self.vm_mut(vid)?;
            vm.input = Input::new(src, SOURCE_HOST);
            vm.last_throw = None;
        }
        self.run_vm(vid)
    }

    /// Append text to the same buffer after an incomplete parse and
    /// resume from the interrupted word.
    pub fn eval_continue(&mut self, vid: VmId, more: &str) -> Wres {
        {
            let vm = self.vm_mut(vid)?;
            vm.input.append_line(more);
            vm.last_throw = None;
        }
        self.run_vm(vid)
    }

    fn run_vm(&mut self, vid: VmId) -> Wres {
        let r = {
            let mut en = self.engine(vid)?;
            en.interpret_input()
        };
        match r {
            Ok(()) => OK,
            Err(t) if t == Throw::OUT_OF_TEXT => OK,
            Err(t) if t == Throw::QUIT => {
                // interactive restart: definitions abort, the data
                // stack survives for inspection
                self.dict.abort_definition()?;
                let state_addr = {
                    let vm = self.vm_mut(vid)?;
                    vm.rs.clear();
                    vm.state = VmState::Interpret;
                    vm.last_throw = Some(t);
                    vm.state_addr
                };
                self.dict.data_set(state_addr, FALSE)?;
                Err(t)
            }
            Err(t) if t.is_signal() => {
                self.vm_mut(vid)?.last_throw = Some(t);
                Err(t)
            }
            Err(t) => {
                self.dict.abort_definition()?;
                let state_addr = {
                    let vm = self.vm_mut(vid)?;
                    vm.reset();
                    vm.last_throw = Some(t);
                    vm.state_addr
                };
                self.dict.data_set(state_addr, FALSE)?;
                Err(t)
            }
        }
    }

    // --- host word and parse-step registration ---

    pub fn register_native(&mut self, name: &str, f: NativeFn) -> Wres1<WordId> {
        self.dict.defword(name, f)
    }

    pub fn register_immediate(&mut self, name: &str, f: NativeFn) -> Wres1<WordId> {
        self.dict.def_immediate(name, f)
    }

    pub fn register_parse_step(&mut self, f: ParseStepFn) -> Wres {
        if self.steps.len() >= PARSE_STEPS_MAX {
            return Err(Throw::RESULT_OUT_OF_RANGE);
        }
        self.steps.push(ParseStep::Custom(f));
        OK
    }

    pub fn set_env(&mut self, name: &str, value: Cell) {
        self.env.set(name, value);
    }

    // --- stack access, VM 0 ---

    pub fn push(&mut self, c: Cell) -> Wres {
        self.push_vm(0, c)
    }

    pub fn pop(&mut self) -> Wres1<Cell> {
        self.pop_vm(0)
    }

    pub fn depth(&self) -> usize {
        self.vms.first().map(|vm| vm.ds.len()).unwrap_or(0)
    }

    pub fn clear_stack(&mut self) {
        if let Some(vm) = self.vms.first_mut() {
            vm.ds.clear();
        }
    }

    pub fn push_vm(&mut self, vid: VmId, c: Cell) -> Wres {
        self.vm_mut(vid)?.ds.push(c)
    }

    pub fn pop_vm(&mut self, vid: VmId) -> Wres1<Cell> {
        self.vm_mut(vid)?.ds.pop()
    }

    pub fn depth_vm(&self, vid: VmId) -> usize {
        self.vms.get(vid).map(|vm| vm.ds.len()).unwrap_or(0)
    }

    // --- output and error reporting ---

    pub fn capture_output(&mut self, vid: VmId) {
        if let Ok(vm) = self.vm_mut(vid) {
            vm.capture_output();
        }
    }

    pub fn take_output(&mut self, vid: VmId) -> String {
        match self.vm_mut(vid) {
            Ok(vm) => vm.take_output(),
            Err(_) => String::new(),
        }
    }

    pub fn set_output_hook(&mut self, vid: VmId, hook: OutHook) -> Wres {
        self.vm_mut(vid)?.out = OutPort::Hook(hook);
        OK
    }

    pub fn compiling(&self, vid: VmId) -> bool {
        self.vms.get(vid).map(|vm| vm.is_compiling()).unwrap_or(false)
    }

    pub fn last_error(&self, vid: VmId) -> Option<Throw> {
        self.vms.get(vid).and_then(|vm| vm.last_throw)
    }

    pub fn last_error_report(&self, vid: VmId) -> Option<String> {
        let vm = self.vm_ref(vid).ok()?;
        vm.last_throw.map(|t| vm.error_report(t))
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// Visible names across the whole search order, first-searched first.
    pub fn word_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for wid in self.dict.get_order().iter().rev() {
            for name in self.dict.list_words(*wid) {
                names.push(name.to_string());
            }
        }
        names
    }
}
