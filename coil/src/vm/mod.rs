//! The VM core: a two-pass interpreter over a materialized COIL record stream.
//!
//! Pass 1 ([`labels::collect_labels`]) runs once at load time. Pass 2 ([`exec`])
//! runs one record per `step`, dispatching on opcode and occasionally redirecting
//! the instruction pointer for jumps, calls and returns — the in-memory analogue of
//! a file-seeking VM's position restores.

mod exec;
pub mod labels;

use log::debug;

use crate::constants::{CALL_STACK_SIZE, HEAP_SIZE, STACK_SIZE, STATIC_MEMORY_SIZE};
use crate::error::{LoadError, RuntimeError};
use crate::heap::Heap;
use crate::record::Record;
use labels::LabelTable;

/// Execution statistics, reported by `coilvm -s` after halt.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub instructions_executed: u64,
    pub max_stack_bytes: usize,
    pub max_call_depth: usize,
    pub heap_allocations: u64,
    pub heap_frees: u64,
}

/// A loaded, runnable COIL program and its machine state.
pub struct Vm {
    static_mem: Vec<u8>,
    heap: Heap,
    stack: Vec<u8>,
    sp: usize,
    call_stack: Vec<usize>,
    call_stack_cap: usize,
    records: Vec<Record>,
    labels: LabelTable,
    ip: usize,
    running: bool,
    exit_code: i64,
    stats: Stats,
}

impl Vm {
    /// Decodes `bytes` as a COIL binary and runs pass 1 over it.
    ///
    /// Uses the default capacities from [`crate::constants`]; see
    /// [`Vm::with_capacities`] to override them.
    pub fn load(bytes: &[u8]) -> Result<Vm, LoadError> {
        Vm::with_capacities(bytes, STATIC_MEMORY_SIZE, HEAP_SIZE, STACK_SIZE, CALL_STACK_SIZE)
    }

    /// Like [`Vm::load`], but with explicit region sizes — used by the `coilvm`
    /// CLI's `-m`/memory-sizing flags and by tests that want a tiny heap.
    pub fn with_capacities(
        bytes: &[u8],
        static_memory_size: usize,
        heap_size: usize,
        stack_size: usize,
        call_stack_size: usize,
    ) -> Result<Vm, LoadError> {
        let records = Record::decode_all(bytes)?;
        let labels = labels::collect_labels(&records)?;
        debug!(
            "loaded {} record(s), {} label(s)",
            records.len(),
            labels.len()
        );

        Ok(Vm {
            static_mem: vec![0u8; static_memory_size],
            heap: Heap::new(heap_size),
            stack: vec![0u8; stack_size],
            sp: 0,
            call_stack: Vec::with_capacity(call_stack_size),
            call_stack_cap: call_stack_size,
            records,
            labels,
            ip: 0,
            running: false,
            exit_code: 0,
            stats: Stats::default(),
        })
    }

    /// Runs pass 2 to completion: executes records one at a time
    /// until `EXIT`, `SYSCALL` 60, end of stream, or a fatal [`RuntimeError`].
    pub fn run(&mut self) -> Result<i64, RuntimeError> {
        self.running = true;
        while self.running && self.ip < self.records.len() {
            let record = self.records[self.ip];
            self.step(record)?;
            self.stats.instructions_executed += 1;
        }
        self.running = false;
        Ok(self.exit_code)
    }

    pub fn exit_code(&self) -> i64 {
        self.exit_code
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn static_memory(&self) -> &[u8] {
        &self.static_mem
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::{pack_two, Opcode};
    use crate::types::MemoryType;

    fn alloc_imm(ty: MemoryType, var: u16, imm: u64) -> Record {
        Record::new(Opcode::AllocImm.value(), ty.code(), var, imm)
    }

    #[test]
    fn eof_without_exit_halts_cleanly_at_code_zero() {
        let records = vec![alloc_imm(MemoryType::Int64, 0, 42)];
        let mut bytes = Vec::new();
        for record in &records {
            record.encode(&mut bytes).unwrap();
        }
        let mut vm = Vm::load(&bytes).unwrap();
        assert_eq!(vm.run().unwrap(), 0);
    }

    #[test]
    fn explicit_exit_sets_the_exit_code() {
        let records = vec![Record::new(Opcode::Exit.value(), 0, 0, 7)];
        let mut bytes = Vec::new();
        for record in &records {
            record.encode(&mut bytes).unwrap();
        }
        let mut vm = Vm::load(&bytes).unwrap();
        assert_eq!(vm.run().unwrap(), 7);
    }

    #[test]
    fn add_two_values_via_two_source_packing() {
        let a_addr = 0u16;
        let b_addr = 8u16;
        let dest = 16u16;
        let records = vec![
            alloc_imm(MemoryType::Int64, a_addr, 2),
            alloc_imm(MemoryType::Int64, b_addr, 3),
            Record::new(
                Opcode::Add.value(),
                MemoryType::Int64.code(),
                dest,
                pack_two(a_addr, b_addr),
            ),
            Record::new(Opcode::Exit.value(), 0, 0, 0),
        ];
        let mut bytes = Vec::new();
        for record in &records {
            record.encode(&mut bytes).unwrap();
        }
        let mut vm = Vm::load(&bytes).unwrap();
        vm.run().unwrap();
        let value = i64::from_le_bytes(
            vm.static_memory()[dest as usize..dest as usize + 8]
                .try_into()
                .unwrap(),
        );
        assert_eq!(value, 5);
    }
}
