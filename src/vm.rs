pub(crate) mod instructions;
pub(crate) mod memory;
mod opcode;
mod registers;
mod utils;

use crate::console::Console;
use crate::error::VmError;
use memory::Memory;
use opcode::Opcode;
use registers::Registers;

use std::convert::TryFrom;

/// The whole of the architectural state: registers, memory (which in turn
/// owns the console), and the running flag. Owned by one value, mutated
/// only by `main_loop` — no hidden singletons.
pub struct Vm {
    regs: Registers,
    mem: Memory,
    running: bool,
}

impl Vm {
    pub fn new(console: Box<dyn Console>) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(console),
            running: false,
        }
    }

    /// Loads a big-endian image from `path` into memory at its own origin.
    pub fn load_image(&mut self, path: &str) -> Result<(), VmError> {
        crate::loader::load_image(path, &mut self.mem)
    }

    /// Runs the fetch-decode-execute loop until HALT fires or an illegal
    /// opcode/trap is hit.
    pub fn run(&mut self) -> Result<(), VmError> {
        self.running = true;
        self.main_loop()
    }

    fn main_loop(&mut self) -> Result<(), VmError> {
        while self.running {
            let pc = self.regs.pc;
            let instr = self.mem.read(pc);
            self.regs.pc = self.regs.pc.wrapping_add(1);

            let (regs, mem) = (&mut self.regs, &mut self.mem);
            // The top nibble of a 16-bit word is always in 0..16, so this
            // can never fail; RTI and RES decode to explicit illegal arms
            // below rather than falling out through a default case.
            let opcode = Opcode::try_from(instr >> 12).unwrap();
            match opcode {
                Opcode::Br => instructions::br(instr, regs),
                Opcode::Add => instructions::add(instr, regs),
                Opcode::Ld => instructions::ld(instr, regs, mem),
                Opcode::St => instructions::st(instr, regs, mem),
                Opcode::Jsr => instructions::jsr(instr, regs),
                Opcode::And => instructions::and(instr, regs),
                Opcode::Ldr => instructions::ldr(instr, regs, mem),
                Opcode::Str => instructions::str(instr, regs, mem),
                Opcode::Rti => {
                    return Err(VmError::IllegalOpcode {
                        opcode: instr >> 12,
                        pc,
                    })
                }
                Opcode::Not => instructions::not(instr, regs),
                Opcode::Ldi => instructions::ldi(instr, regs, mem),
                Opcode::Sti => instructions::sti(instr, regs, mem),
                Opcode::Jmp => instructions::jmp(instr, regs),
                Opcode::Res => {
                    return Err(VmError::IllegalOpcode {
                        opcode: instr >> 12,
                        pc,
                    })
                }
                Opcode::Lea => instructions::lea(instr, regs),
                Opcode::Trap => {
                    if instructions::trap(instr, regs, mem)? {
                        self.running = false;
                    }
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::FakeConsole;

    fn vm_with(input: &[u8]) -> Vm {
        Vm::new(Box::new(FakeConsole::new(input)))
    }

    /// Pokes a word directly into memory before `run`, bypassing the loader.
    fn poke(vm: &mut Vm, addr: u16, word: u16) {
        vm.mem.write(addr, word);
    }

    #[test]
    fn add_immediate_end_to_end() {
        let mut vm = vm_with(&[]);
        vm.regs.write(0, 5);
        poke(&mut vm, 0x3000, 0x1220); // ADD R1, R0, #0
        poke(&mut vm, 0x3001, 0xF025); // TRAP HALT
        vm.run().unwrap();
        assert_eq!(vm.regs.read(1), 5);
        assert_eq!(vm.regs.pc, 0x3002);
    }

    #[test]
    fn br_taken_advances_past_the_offset() {
        let mut vm = vm_with(&[]);
        vm.regs.cond = registers::CondFlag::Zero;
        poke(&mut vm, 0x3000, 0x0403); // BRz #+3
        poke(&mut vm, 0x3004, 0xF025); // TRAP HALT
        vm.run().unwrap();
        assert_eq!(vm.regs.pc, 0x3005);
    }

    #[test]
    fn jsr_then_jmp_r7_acts_as_call_and_return() {
        let mut vm = vm_with(&[]);
        poke(&mut vm, 0x3000, 0x4802); // JSR #+2 -> jumps to 0x3003
        poke(&mut vm, 0x3003, 0xC1C0); // JMP R7 -> back to 0x3001
        poke(&mut vm, 0x3001, 0xF025); // TRAP HALT
        vm.run().unwrap();
        assert_eq!(vm.regs.read(7), 0x3001);
    }

    #[test]
    fn rti_is_an_illegal_opcode() {
        let mut vm = vm_with(&[]);
        poke(&mut vm, 0x3000, 0x8000); // RTI
        let result = vm.run();
        assert!(matches!(
            result,
            Err(VmError::IllegalOpcode { opcode: 0x8, pc: 0x3000 })
        ));
    }

    #[test]
    fn res_is_an_illegal_opcode() {
        let mut vm = vm_with(&[]);
        poke(&mut vm, 0x3000, 0xD000); // RES
        let result = vm.run();
        assert!(matches!(
            result,
            Err(VmError::IllegalOpcode { opcode: 0xD, pc: 0x3000 })
        ));
    }

    #[test]
    fn halt_clears_the_running_flag_and_returns_ok() {
        let mut vm = vm_with(&[]);
        poke(&mut vm, 0x3000, 0xF025); // TRAP HALT
        assert!(vm.run().is_ok());
        assert!(!vm.running);
    }

    #[test]
    fn unknown_trap_vector_is_an_error() {
        let mut vm = vm_with(&[]);
        poke(&mut vm, 0x3000, 0xF0AA); // TRAP #0xAA
        let result = vm.run();
        assert!(matches!(result, Err(VmError::UnknownTrap(0xAA))));
    }
}
