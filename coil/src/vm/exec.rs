//! Pass 2: record-by-record execution.

use log::trace;

use super::Vm;
use crate::error::RuntimeError;
use crate::record::{unpack_jcond, unpack_shift, unpack_syscall_args, unpack_two, Condition, Opcode, Record};
use crate::types::MemoryType;

/// Syscall 1 (`write`) only needs to pick stdout or stderr; any other fd writes to
/// stdout the same way a real `write(2)` would to an unopened fd in a freestanding
/// program (there is no broader file descriptor table to consult).
const FD_STDERR: u16 = 2;

impl Vm {
    pub(super) fn step(&mut self, record: Record) -> Result<(), RuntimeError> {
        let opcode = Opcode::from_u16(record.opcode)
            .ok_or(RuntimeError::UnknownOpcode(record.opcode))?;
        trace!("ip={} opcode={:?} imm=0x{:016X}", self.ip, opcode, record.imm);

        match opcode {
            Opcode::AllocImm => {
                self.write_static(record.var, record.ty, record.imm)?;
                self.ip += 1;
            }
            Opcode::AllocMem | Opcode::Move | Opcode::Load | Opcode::Store => {
                // All four reduce to the same "copy type_size(ty) bytes from the
                // imm-addressed slot to the var-addressed slot" shape: LOAD/STORE's
                // assembler-emitted operand layout is identical to ALLOC_MEM/MOVE's
                // (see DESIGN.md), and this flat, indirection-free address space
                // gives them no way to differ at execution time.
                let size = self.type_size(record.ty)?;
                let src = record.imm as u16;
                self.copy_static(src, record.var, size)?;
                self.ip += 1;
            }

            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                let (a, b) = self.read_two_i64(record.imm)?;
                let result = self.apply_math(opcode, a, b)?;
                self.write_i64(record.var, result)?;
                self.ip += 1;
            }
            Opcode::Neg => {
                let a = self.read_i64(record.imm as u16)?;
                self.write_i64(record.var, a.wrapping_neg())?;
                self.ip += 1;
            }

            Opcode::And | Opcode::Or | Opcode::Xor => {
                let (a, b) = self.read_two_i64(record.imm)?;
                let result = match opcode {
                    Opcode::And => a & b,
                    Opcode::Or => a | b,
                    Opcode::Xor => a ^ b,
                    _ => unreachable!(),
                };
                self.write_i64(record.var, result)?;
                self.ip += 1;
            }
            Opcode::Not => {
                let a = self.read_i64(record.imm as u16)?;
                self.write_i64(record.var, !a)?;
                self.ip += 1;
            }
            Opcode::Shl | Opcode::Shr => {
                let (src, shift) = unpack_shift(record.imm);
                let a = self.read_i64(src)?;
                let shift = shift & 63;
                let result = if opcode == Opcode::Shl {
                    a.wrapping_shl(shift)
                } else {
                    a.wrapping_shr(shift)
                };
                self.write_i64(record.var, result)?;
                self.ip += 1;
            }

            Opcode::Jmp => {
                self.ip = self.resolve_label(record.imm as u16)?;
            }
            Opcode::Jeq | Opcode::Jne | Opcode::Jlt | Opcode::Jle | Opcode::Jgt | Opcode::Jge => {
                let condition = Condition::from_opcode(opcode).unwrap();
                let (src1, src2, label_id) = unpack_jcond(record.imm);
                let a = self.read_i64(src1)?;
                let b = self.read_i64(src2)?;
                if condition.eval(a, b) {
                    self.ip = self.resolve_label(label_id)?;
                } else {
                    self.ip += 1;
                }
            }
            Opcode::Call => {
                if self.call_stack.len() >= self.call_stack_cap {
                    return Err(RuntimeError::CallStackOverflow);
                }
                let target = self.resolve_label(record.imm as u16)?;
                self.call_stack.push(self.ip + 1);
                self.stats.max_call_depth = self.stats.max_call_depth.max(self.call_stack.len());
                self.ip = target;
            }
            Opcode::Ret => {
                self.ip = self
                    .call_stack
                    .pop()
                    .ok_or(RuntimeError::CallStackUnderflow)?;
            }

            Opcode::Push => {
                let size = self.type_size(record.ty)?;
                self.push_stack(record.var, size)?;
                self.stats.max_stack_bytes = self.stats.max_stack_bytes.max(self.sp);
                self.ip += 1;
            }
            Opcode::Pop => {
                let size = self.type_size(record.ty)?;
                self.pop_stack(record.var, size)?;
                self.ip += 1;
            }

            Opcode::Syscall => {
                self.do_syscall(record.imm)?;
                self.ip += 1;
            }
            Opcode::Exit => {
                self.exit_code = if record.ty == MemoryType::None.code() {
                    record.imm as i64
                } else {
                    self.read_i64(record.imm as u16)?
                };
                self.running = false;
            }

            Opcode::MemAlloc => {
                let ptr = self.heap.alloc(record.imm as usize)?;
                self.stats.heap_allocations += 1;
                self.write_u64(record.var, ptr as u64)?;
                self.ip += 1;
            }
            Opcode::MemFree => {
                let ptr = self.read_u64(record.var)? as u32;
                self.heap.free(ptr)?;
                self.stats.heap_frees += 1;
                self.ip += 1;
            }
            Opcode::MemRead => {
                let (size, ptr_addr) = mem_fields(record.imm);
                let ptr = self.read_u64(ptr_addr as u16)? as u32;
                let bytes = self
                    .heap
                    .borrow_slice(ptr, size)
                    .ok_or(RuntimeError::StaticOutOfBounds { address: ptr, len: size })?
                    .to_vec();
                self.write_static_bytes(record.var, &bytes)?;
                self.ip += 1;
            }
            Opcode::MemWrite => {
                let (size, ptr_addr) = mem_fields(record.imm);
                let ptr = self.read_u64(ptr_addr as u16)? as u32;
                let bytes = self.read_static_bytes(record.var, size)?.to_vec();
                let dest = self
                    .heap
                    .borrow_slice_mut(ptr, size)
                    .ok_or(RuntimeError::StaticOutOfBounds { address: ptr, len: size })?;
                dest.copy_from_slice(&bytes);
                self.ip += 1;
            }

            Opcode::Label => {
                // Already indexed during pass 1; a no-op during execution.
                self.ip += 1;
            }
            Opcode::SyscallArgs => {
                return Err(RuntimeError::StraySyscallArgs);
            }
        }
        Ok(())
    }

    fn resolve_label(&self, label_id: u16) -> Result<usize, RuntimeError> {
        self.labels
            .get(&label_id)
            .copied()
            .ok_or(RuntimeError::UndefinedLabel(label_id))
    }

    fn type_size(&self, ty: u8) -> Result<usize, RuntimeError> {
        let ty = MemoryType::from_code(ty).unwrap_or(MemoryType::Int64);
        Ok(ty.byte_size().max(1))
    }

    fn apply_math(&self, opcode: Opcode, a: i64, b: i64) -> Result<i64, RuntimeError> {
        Ok(match opcode {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Mul => a.wrapping_mul(b),
            Opcode::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
            Opcode::Mod => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_rem(b)
            }
            _ => unreachable!(),
        })
    }

    fn bounds_check(&self, address: u16, len: usize) -> Result<(), RuntimeError> {
        let end = address as usize + len;
        if end > self.static_mem.len() {
            Err(RuntimeError::StaticOutOfBounds { address: address as u32, len: len as u32 })
        } else {
            Ok(())
        }
    }

    fn write_static(&mut self, address: u16, ty: u8, imm: u64) -> Result<(), RuntimeError> {
        let size = self.type_size(ty)?;
        self.bounds_check(address, size)?;
        let bytes = imm.to_le_bytes();
        let start = address as usize;
        self.static_mem[start..start + size].copy_from_slice(&bytes[..size]);
        Ok(())
    }

    fn write_static_bytes(&mut self, address: u16, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.bounds_check(address, bytes.len())?;
        let start = address as usize;
        self.static_mem[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn read_static_bytes(&self, address: u16, len: u32) -> Result<&[u8], RuntimeError> {
        self.bounds_check(address, len as usize)?;
        let start = address as usize;
        Ok(&self.static_mem[start..start + len as usize])
    }

    fn copy_static(&mut self, src: u16, dest: u16, size: usize) -> Result<(), RuntimeError> {
        self.bounds_check(src, size)?;
        self.bounds_check(dest, size)?;
        let mut buf = [0u8; 8];
        let s = src as usize;
        buf[..size].copy_from_slice(&self.static_mem[s..s + size]);
        let d = dest as usize;
        self.static_mem[d..d + size].copy_from_slice(&buf[..size]);
        Ok(())
    }

    fn read_i64(&self, address: u16) -> Result<i64, RuntimeError> {
        self.bounds_check(address, 8)?;
        let start = address as usize;
        Ok(i64::from_le_bytes(self.static_mem[start..start + 8].try_into().unwrap()))
    }

    fn write_i64(&mut self, address: u16, value: i64) -> Result<(), RuntimeError> {
        self.bounds_check(address, 8)?;
        let start = address as usize;
        self.static_mem[start..start + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn read_u64(&self, address: u16) -> Result<u64, RuntimeError> {
        self.bounds_check(address, 8)?;
        let start = address as usize;
        Ok(u64::from_le_bytes(self.static_mem[start..start + 8].try_into().unwrap()))
    }

    fn write_u64(&mut self, address: u16, value: u64) -> Result<(), RuntimeError> {
        self.bounds_check(address, 8)?;
        let start = address as usize;
        self.static_mem[start..start + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn read_two_i64(&self, imm: u64) -> Result<(i64, i64), RuntimeError> {
        let (src1, src2) = unpack_two(imm);
        Ok((self.read_i64(src1)?, self.read_i64(src2)?))
    }

    fn push_stack(&mut self, address: u16, size: usize) -> Result<(), RuntimeError> {
        self.bounds_check(address, size)?;
        if self.sp + size > self.stack.len() {
            return Err(RuntimeError::StackOverflow);
        }
        let start = address as usize;
        let sp = self.sp;
        self.stack[sp..sp + size].copy_from_slice(&self.static_mem[start..start + size]);
        self.sp += size;
        Ok(())
    }

    fn pop_stack(&mut self, address: u16, size: usize) -> Result<(), RuntimeError> {
        if size > self.sp {
            return Err(RuntimeError::StackUnderflow);
        }
        self.bounds_check(address, size)?;
        self.sp -= size;
        let sp = self.sp;
        let start = address as usize;
        self.static_mem[start..start + size].copy_from_slice(&self.stack[sp..sp + size]);
        Ok(())
    }

    fn do_syscall(&mut self, imm: u64) -> Result<(), RuntimeError> {
        let args = self.fetch_syscall_args();
        match imm as u16 {
            1 => self.syscall_write(args)?,
            60 => {
                self.exit_code = args[0] as i16 as i64;
                self.running = false;
            }
            other => return Err(RuntimeError::UnsupportedSyscall(other)),
        }
        Ok(())
    }

    /// Looks at the record right after the current `SYSCALL`; if it is a
    /// `SYSCALL_ARGS` continuation, consumes it and returns its four lanes,
    /// otherwise leaves the instruction pointer untouched and returns all zeros
    /// Otherwise nothing is consumed and the call is treated as zero-argument.
    fn fetch_syscall_args(&mut self) -> [u16; 4] {
        match self.records.get(self.ip + 1) {
            Some(next) if Opcode::from_u16(next.opcode) == Some(Opcode::SyscallArgs) => {
                let args = unpack_syscall_args(next.imm);
                self.ip += 1;
                args
            }
            _ => [0u16; 4],
        }
    }

    fn syscall_write(&mut self, args: [u16; 4]) -> Result<(), RuntimeError> {
        use std::io::Write;

        let fd = args[0];
        let address = args[1];
        let count = args[2] as usize;
        let bytes = self.read_static_bytes(address, count as u32)?.to_vec();

        let result = if fd == FD_STDERR {
            std::io::stderr().write_all(&bytes)
        } else {
            std::io::stdout().write_all(&bytes)
        };
        // A failed host write (e.g. a closed pipe) does not change program-visible
        // state; the program under execution has no way to observe host I/O errors.
        let _ = result;
        Ok(())
    }
}

/// `MEM_READ`/`MEM_WRITE` pack `size` in the low 32 bits and the static address
/// holding the heap pointer value in the high 32 bits of the immediate.
fn mem_fields(imm: u64) -> (u32, u32) {
    let size = (imm & 0xFFFF_FFFF) as u32;
    let ptr_addr = (imm >> 32) as u32;
    (size, ptr_addr)
}
