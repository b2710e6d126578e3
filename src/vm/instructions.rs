//! All instructions that are supported and have an implementation
//!
//! Instructions are 16-bit values and have a specific binary encoding. The first four bits of
//! each instruction express the [`Opcode`](super::Opcode).

mod trap;

use super::{utils::bit_ops::sign_extend, Memory, Registers};
use crate::error::VmError;
use trap::TrapCode;

use std::convert::TryFrom;

/// Parses and performs the `BR` (*branch*) instruction
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   0   0   0 │ n │ z │ p │             PCoffset9             │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly formats
///
/// ```asm
/// BR    LABEL
/// BRn   LABEL
/// BRz   LABEL
/// BRp   LABEL
/// BRzp  LABEL
/// BRnp  LABEL
/// BRnz  LABEL
/// BRnzp LABEL
/// ```
pub fn br(instr: u16, regs: &mut Registers) {
    // Condition flags (Negative, Zero, Positive)
    // Not masked because the bitwise AND with `regs.cond` acts like a mask.
    let nzp = instr >> 9;
    if (nzp & (regs.cond as u16)) > 0 {
        let pc_offset = sign_extend(instr & 0x1FF, 9);
        regs.pc = regs.pc.wrapping_add(pc_offset);
    }
}

/// Parses and performs the `ADD` (*addition*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encodings
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   0   0   1 │     DR    │    SR1    │ 0 │ 0   0 │    SR2    │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
///
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   0   0   1 │     DR    │    SR1    │ 1 │        imm5       │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly formats
///
/// ```asm
/// ADD  DR, SR1, SR2
/// ADD  DR, SR1, imm5
/// ```
pub fn add(instr: u16, regs: &mut Registers) {
    let dest_reg = (instr >> 9) & 0x7;
    let src_reg1 = (instr >> 6) & 0x7;
    let mode = (instr >> 5) & 0x1;
    let value;
    match mode {
        // Immediate mode
        0x1 => {
            let imm = sign_extend(instr & 0x1F, 5);
            value = regs.read(src_reg1).wrapping_add(imm);
        }
        // Register mode
        0x0 => {
            let src_reg2 = instr & 0x7;
            value = regs.read(src_reg1).wrapping_add(regs.read(src_reg2));
        }
        _ => unreachable!(),
    }

    regs.write(dest_reg, value as u16);
    regs.update_cond_flags(value);
}

/// Parses and performs the `LD` (*load*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   0   1   0 │     DR    │             PCoffset9             │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// LD   DR, LABEL
/// ```
pub fn ld(instr: u16, regs: &mut Registers, mem: &mut Memory) {
    let dest_reg = (instr >> 9) & 0x7;
    let pc_offset = sign_extend(instr & 0x1FF, 9);
    let value = mem.read(regs.pc.wrapping_add(pc_offset));
    regs.write(dest_reg, value);
    regs.update_cond_flags(value);
}

/// Parses and performs the `ST` (*store*) instruction
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   0   1   1 │     SR    │             PCoffset9             │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// ST   SR, LABEL
/// ```
pub fn st(instr: u16, regs: &Registers, mem: &mut Memory) {
    let src_reg = (instr >> 9) & 0x7;
    let pc_offset = sign_extend(instr & 0x1FF, 9);
    let value = regs.read(src_reg);
    mem.write(regs.pc.wrapping_add(pc_offset), value);
}

/// Parses and performs the `JSR` (*jump to subroutine*) instruction
///
/// # Binary encodings
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   1   0   0 │ 1 │                 PCoffset11                │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
///
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   1   0   0 │ 0 │ 0   0 │   BaseR   │ 0   0   0   0   0   0 │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly formats
///
/// ```asm
/// JSR  LABEL
/// JSRR BaseR
/// ```
pub fn jsr(instr: u16, regs: &mut Registers) {
    regs.write(7, regs.pc);
    let flag = (instr >> 11) & 0x1;
    match flag {
        // JSR
        0x1 => {
            let pc_offset = sign_extend(instr & 0x7FF, 11);
            regs.pc = regs.pc.wrapping_add(pc_offset);
        }
        // JSRR
        0x0 => {
            let base_reg = (instr >> 6) & 0x7;
            regs.pc = regs.read(base_reg);
        }
        _ => unreachable!(),
    }
}

/// Parses and performs the `AND` (*bitwise AND*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encodings
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   1   0   1 │     DR    │    SR1    │ 0 │ 0   0 │    SR2    │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
///
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   1   0   1 │     DR    │    SR1    │ 1 │        imm5       │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly formats
///
/// ```asm
/// AND  DR, SR1, SR2
/// AND  DR, SR1, imm5
/// ```
pub fn and(instr: u16, regs: &mut Registers) {
    let dest_reg = (instr >> 9) & 0x7;
    let src_reg1 = (instr >> 6) & 0x7;
    let mode = (instr >> 5) & 0x1;
    let value;
    match mode {
        // Immediate mode
        0x1 => {
            let imm = sign_extend(instr & 0x1F, 5);
            value = regs.read(src_reg1) & imm;
        }
        // Register mode
        0x0 => {
            let src_reg2 = instr & 0x7;
            value = regs.read(src_reg1) & regs.read(src_reg2);
        }
        _ => unreachable!(),
    }

    regs.write(dest_reg, value);
    regs.update_cond_flags(value);
}

/// Parses and performs the `LDR` (*load base + offset*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   1   1   0 │     DR    │   BaseR   │        offset6        │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// LDR  DR, BaseR, offset6
/// ```
pub fn ldr(instr: u16, regs: &mut Registers, mem: &mut Memory) {
    let dest_reg = (instr >> 9) & 0x7;
    let base_reg = (instr >> 6) & 0x7;
    let offset = sign_extend(instr & 0x3F, 6);
    let value = mem.read(regs.read(base_reg).wrapping_add(offset));
    regs.write(dest_reg, value);
    regs.update_cond_flags(value);
}

/// Parses and performs the `STR` (*store base + offset*) instruction
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 0   1   1   1 │     SR    │   BaseR   │        offset6        │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// STR  SR, BaseR, offset6
/// ```
pub fn str(instr: u16, regs: &Registers, mem: &mut Memory) {
    let src_reg = (instr >> 9) & 0x7;
    let base_reg = (instr >> 6) & 0x7;
    let offset = sign_extend(instr & 0x3F, 6);
    let value = regs.read(src_reg);
    mem.write(regs.read(base_reg).wrapping_add(offset), value);
}

/// Parses and performs the `NOT` (*bitwise complement*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   0   0   1 │     DR    │     SR    │ 1 │ 1   1   1   1   1 │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// NOT  DR, SR
/// ```
pub fn not(instr: u16, regs: &mut Registers) {
    let dest_reg = (instr >> 9) & 0x7;
    let src_reg = (instr >> 6) & 0x7;
    let value = !regs.read(src_reg);
    regs.write(dest_reg, value);
    regs.update_cond_flags(value);
}

/// Parses and performs the `LDI` (*load indirect*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   0   1   0 │     DR    │             PCoffset9             │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// LDI  DR, LABEL
/// ```
pub fn ldi(instr: u16, regs: &mut Registers, mem: &mut Memory) {
    let dest_reg = (instr >> 9) & 0x7;
    let pc_offset = sign_extend(instr & 0x1FF, 9);
    let mem_addr = mem.read(regs.pc.wrapping_add(pc_offset));
    let value = mem.read(mem_addr);
    regs.write(dest_reg, value);
    regs.update_cond_flags(value);
}

/// Parses and performs the `STI` (*store indirect*) instruction
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   0   1   1 │     SR    │             PCoffset9             │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// STI  SR, LABEL
/// ```
pub fn sti(instr: u16, regs: &Registers, mem: &mut Memory) {
    let src_reg = (instr >> 9) & 0x7;
    let pc_offset = sign_extend(instr & 0x1FF, 9);
    let mem_addr = mem.read(regs.pc.wrapping_add(pc_offset));
    mem.write(mem_addr, regs.read(src_reg));
}

/// Parses and performs the `JMP` (*jump*) instruction
///
/// Note that if the instruction's BaseR is R7, this instruction is equivalent to the `RET`
/// (*return from subroutine*) instruction.
///
/// # Binary encodings
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   1   0   0 │ 0   0   0 │   BaseR   │ 0   0   0   0   0   0 │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
///
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   1   0   0 │ 0   0   0 │ 1   1   1 │ 0   0   0   0   0   0 │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly formats
///
/// ```asm
/// JMP  BaseR
/// RET
/// ```
pub fn jmp(instr: u16, regs: &mut Registers) {
    let base_reg = (instr >> 6) & 0x7;
    regs.pc = regs.read(base_reg);
}

/// Parses and performs the `LEA` (*load effective address*) instruction
///
/// **Note**: this instruction updates the `COND` register (NZP flags) based on the value written
/// to `DR`.
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   1   1   0 │     DR    │             PCoffset9             │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// LEA  DR, LABEL
/// ```
pub fn lea(instr: u16, regs: &mut Registers) {
    let dest_reg = (instr >> 9) & 0x7;
    let pc_offset = sign_extend(instr & 0x1FF, 9);
    let value = regs.pc.wrapping_add(pc_offset);
    regs.write(dest_reg, value);
    regs.update_cond_flags(value);
}

/// Parses and performs the `TRAP` (*system call*) instruction; returns whether the vm should halt
///
/// # Binary encoding
///
/// ```plain
/// ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
/// │ 1   1   1   1 │ 0   0   0   0 │           trapvect8           │
/// └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
/// ```
///
/// # Assembly format
///
/// ```asm
/// TRAP trapvector8
/// ```
pub fn trap(instr: u16, regs: &mut Registers, mem: &mut Memory) -> Result<bool, VmError> {
    let trapvector = (instr & 0xFF) as u8;
    let trap_code =
        TrapCode::try_from(trapvector).map_err(|_| VmError::UnknownTrap(trapvector))?;
    match trap_code {
        TrapCode::Getc => trap::getc(regs, mem),
        TrapCode::Out => trap::out(regs, mem),
        TrapCode::Puts => trap::puts(regs, mem),
        TrapCode::In => trap::r#in(regs, mem),
        TrapCode::Putsp => trap::putsp(regs, mem),
        TrapCode::Halt => {
            trap::halt(mem);
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::registers::CondFlag;
    use crate::console::FakeConsole;

    fn registers_at(pc: u16) -> Registers {
        let mut regs = Registers::new();
        regs.pc = pc;
        regs
    }

    fn memory(input: &[u8]) -> Memory {
        Memory::new(Box::new(FakeConsole::new(input)))
    }

    #[test]
    fn add_immediate_sets_dr_and_positive_flag() {
        let mut regs = registers_at(0x3000);
        regs.write(0, 5);
        add(0x1220, &mut regs); // ADD R1, R0, #0
        assert_eq!(regs.read(1), 5);
        assert_eq!(regs.cond as u16, CondFlag::Pos as u16);
    }

    #[test]
    fn add_negative_immediate_wraps_to_zero() {
        let mut regs = registers_at(0x3000);
        regs.write(1, 1);
        add(0x127F, &mut regs); // ADD R1, R1, #-1
        assert_eq!(regs.read(1), 0);
        assert_eq!(regs.cond as u16, CondFlag::Zero as u16);
    }

    #[test]
    fn not_complements_and_sets_negative_flag() {
        let mut regs = registers_at(0x3000);
        regs.write(1, 0);
        not(0x927F, &mut regs); // NOT R1, R1
        assert_eq!(regs.read(1), 0xFFFF);
        assert_eq!(regs.cond as u16, CondFlag::Neg as u16);
    }

    #[test]
    fn br_unconditional_mask_always_jumps() {
        // br() runs after the fetch-time PC increment, so pc here is the
        // already-incremented value.
        let mut regs = registers_at(0x3001);
        regs.cond = CondFlag::Zero;
        br(0x0E03, &mut regs); // BRnzp #+3
        assert_eq!(regs.pc, 0x3004);
    }

    #[test]
    fn br_zero_mask_never_jumps() {
        let mut regs = registers_at(0x3001);
        regs.cond = CondFlag::Zero;
        br(0x0003, &mut regs); // mask 000, offset +3
        assert_eq!(regs.pc, 0x3001);
    }

    #[test]
    fn br_taken_on_matching_flag() {
        let mut regs = registers_at(0x3001);
        regs.cond = CondFlag::Zero;
        br(0x0403, &mut regs); // BRz #+3
        assert_eq!(regs.pc, 0x3004);
    }

    #[test]
    fn jsr_saves_pc_then_jumps_by_offset() {
        let mut regs = registers_at(0x3001);
        jsr(0x4802, &mut regs); // JSR #+2
        assert_eq!(regs.read(7), 0x3001);
        assert_eq!(regs.pc, 0x3003);
    }

    #[test]
    fn jmp_on_r7_acts_as_ret() {
        let mut regs = registers_at(0x3003);
        regs.write(7, 0x3001);
        jmp(0xC1C0, &mut regs); // JMP R7
        assert_eq!(regs.pc, 0x3001);
    }

    #[test]
    fn ldi_dereferences_twice() {
        let mut regs = registers_at(0x3000);
        let mut mem = memory(&[]);
        mem.write(0x3000, 0x3002);
        mem.write(0x3002, 42);
        ldi(0xA000, &mut regs, &mut mem); // LDI R0, #0
        assert_eq!(regs.read(0), 42);
    }

    #[test]
    fn sti_mirrors_ldi() {
        let mut regs = registers_at(0x3000);
        let mut mem = memory(&[]);
        regs.write(0, 99);
        mem.write(0x3000, 0x3002);
        sti(0xB000, &regs, &mut mem); // STI R0, #0
        assert_eq!(mem.read(0x3002), 99);
    }

    #[test]
    fn lea_sets_dr_to_computed_address_without_reading_memory() {
        let mut regs = registers_at(0x3000);
        lea(0xE003, &mut regs); // LEA R0, #3
        assert_eq!(regs.read(0), 0x3003);
    }

    #[test]
    fn trap_halt_requests_halt() {
        let mut regs = registers_at(0x3000);
        let mut mem = memory(&[]);
        let should_halt = trap(0xF025, &mut regs, &mut mem).unwrap();
        assert!(should_halt);
    }

    #[test]
    fn trap_unknown_vector_is_an_error() {
        let mut regs = registers_at(0x3000);
        let mut mem = memory(&[]);
        let result = trap(0xF0AA, &mut regs, &mut mem);
        assert!(matches!(result, Err(VmError::UnknownTrap(0xAA))));
    }
}
