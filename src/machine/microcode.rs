//! The microprogram.
//!
//! Rows 0-1 fetch and decode the instruction at PC. Every opcode then owns
//! a contiguous run of rows, entered through [`entry_row`]. The last row of
//! each run advances PC, counts the instruction and returns to row 0;
//! `halt` stops instead.
//!
//! Stack discipline: TOS is the live top, the stack holds everything below
//! it. A push moves TOS onto the stack, a pop-into-BR followed by
//! `TOS ← BR` brings the next value back up.

use super::alu::AluOp;
use super::signal::{
    AddressSource, ControlWord, IoOp, JumpKind, MemoryOp, MicroStep, Signal, StackOp, TosSource,
};
use crate::program::Opcode;

use super::signal::Signal::{
    AddressRegister, Alu, AluOperands, BufferRegister, DataStack, Halt, InstructionCounter,
    InstructionRegister, Io, Jump, Memory, MicrocodeAddress, ProgramCounter, TopOfStack,
};

const NEXT: Signal = MicrocodeAddress(MicroStep::Next);
const ZERO: Signal = MicrocodeAddress(MicroStep::Zero);
const DISPATCH: Signal = MicrocodeAddress(MicroStep::Opcode);

const PUSH: Signal = DataStack(StackOp::Push);
const POP: Signal = DataStack(StackOp::Pop);

const TOS_ALU: Signal = TopOfStack(TosSource::Alu);
const TOS_BR: Signal = TopOfStack(TosSource::Buffer);
const TOS_IMM: Signal = TopOfStack(TosSource::Immediate);

/// Closing row shared by most opcodes.
const RETIRE: &[Signal] = &[ProgramCounter, InstructionCounter, ZERO];

/// The microcode table, one slice of signals per row.
pub const MICROCODE: &[&[Signal]] = &[
    // 0: fetch
    &[AddressRegister(AddressSource::ProgramCounter), Memory(MemoryOp::Read), NEXT],
    &[InstructionRegister, DISPATCH],
    // 2: sum
    &[AluOperands, Alu(AluOp::Add), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 4: sub
    &[AluOperands, Alu(AluOp::Sub), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 6: mul
    &[AluOperands, Alu(AluOp::Mul), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 8: div
    &[AluOperands, Alu(AluOp::Div), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 10: mod
    &[AluOperands, Alu(AluOp::Mod), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 12: dup
    &[PUSH, NEXT],
    RETIRE,
    // 14: drop
    &[POP, NEXT],
    RETIRE,
    // 16: swap
    &[BufferRegister, NEXT],
    &[PUSH, TOS_BR, NEXT],
    RETIRE,
    // 19: eq
    &[AluOperands, Alu(AluOp::Eq), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 21: more (first operand is the newer value, so `a b more` is `b < a`)
    &[AluOperands, Alu(AluOp::Less), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 23: less
    &[AluOperands, Alu(AluOp::Greater), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
    // 25: push
    &[PUSH, TOS_IMM, NEXT],
    RETIRE,
    // 27: addr_on_top
    &[PUSH, TopOfStack(TosSource::Variable), NEXT],
    RETIRE,
    // 29: save_var
    &[
        AddressRegister(AddressSource::TopOfStack),
        BufferRegister,
        TOS_BR,
        Memory(MemoryOp::LatchTopOfStack),
        NEXT,
    ],
    &[Memory(MemoryOp::Write), BufferRegister, TOS_BR, NEXT],
    RETIRE,
    // 32: var_on_top
    &[AddressRegister(AddressSource::TopOfStack), Memory(MemoryOp::Read), NEXT],
    &[InstructionRegister, TOS_IMM, NEXT],
    RETIRE,
    // 35: jzs
    &[PUSH, TOS_IMM, Jump(JumpKind::IfZero), NEXT],
    &[POP, BufferRegister, TOS_BR, NEXT],
    RETIRE,
    // 38: jmp
    &[PUSH, TOS_IMM, Jump(JumpKind::Always), NEXT],
    &[BufferRegister, TOS_BR, NEXT],
    RETIRE,
    // 41: print
    &[Io(IoOp::Print), NEXT],
    &[BufferRegister, TOS_BR, NEXT],
    RETIRE,
    // 44: read
    &[PUSH, NEXT],
    &[Io(IoOp::Read), ProgramCounter, InstructionCounter, ZERO],
    // 46: emit
    &[Io(IoOp::Emit), NEXT],
    &[BufferRegister, TOS_BR, NEXT],
    RETIRE,
    // 49: halt
    &[InstructionCounter, Halt],
    // 50: not_eq
    &[AluOperands, Alu(AluOp::NotEq), NEXT],
    &[TOS_ALU, ProgramCounter, InstructionCounter, ZERO],
];

/// Entry row per opcode, indexed by discriminant.
const OPCODE_ENTRY: [usize; 22] = [
    2,  // sum
    4,  // sub
    6,  // mul
    8,  // div
    10, // mod
    12, // dup
    14, // drop
    16, // swap
    19, // eq
    21, // more
    23, // less
    25, // push
    27, // addr_on_top
    29, // save_var
    32, // var_on_top
    35, // jzs
    38, // jmp
    41, // print
    44, // read
    46, // emit
    49, // halt
    50, // not_eq
];

/// First microcode row of `opcode`'s microsequence.
#[inline]
pub fn entry_row(opcode: Opcode) -> usize {
    OPCODE_ENTRY[opcode as usize]
}

/// A microcode ROM image: rows of encoded control words.
pub type Rom = Vec<Vec<ControlWord>>;

/// Encode a typed table into a ROM image.
pub fn assemble(table: &[&[Signal]]) -> Rom {
    table
        .iter()
        .map(|row| row.iter().map(|signal| signal.encode()).collect())
        .collect()
}

/// The built-in ROM.
pub fn rom() -> Rom {
    assemble(MICROCODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_length(start: usize) -> usize {
        MICROCODE[start..]
            .iter()
            .position(|row| row.contains(&ZERO) || row.contains(&Halt))
            .map(|offset| offset + 1)
            .unwrap()
    }

    #[test]
    fn test_entries_in_range() {
        for op in Opcode::ALL {
            assert!(entry_row(op) < MICROCODE.len(), "{}", op);
        }
    }

    #[test]
    fn test_fetch_dispatches_on_opcode() {
        assert_eq!(MICROCODE[0].last(), Some(&NEXT));
        assert_eq!(MICROCODE[1].last(), Some(&DISPATCH));
    }

    #[test]
    fn test_every_run_ends_in_zero_or_halt() {
        for op in Opcode::ALL {
            let start = entry_row(op);
            let len = run_length(start);
            let run = &MICROCODE[start..start + len];
            for row in &run[..len - 1] {
                assert_eq!(row.last(), Some(&NEXT), "{}", op);
            }
            let last = run[len - 1];
            if op == Opcode::Halt {
                assert_eq!(last, &[InstructionCounter, Halt][..]);
            } else {
                assert_eq!(last.last(), Some(&ZERO), "{}", op);
                assert!(last.contains(&ProgramCounter), "{}", op);
            }
        }
    }

    #[test]
    fn test_each_instruction_counted_once() {
        let fetch_counts = MICROCODE[..2]
            .iter()
            .flat_map(|row| row.iter())
            .filter(|s| **s == InstructionCounter)
            .count();
        assert_eq!(fetch_counts, 0);

        for op in Opcode::ALL {
            let start = entry_row(op);
            let counts = MICROCODE[start..start + run_length(start)]
                .iter()
                .flat_map(|row| row.iter())
                .filter(|s| **s == InstructionCounter)
                .count();
            assert_eq!(counts, 1, "{}", op);
        }
    }

    #[test]
    fn test_runs_are_contiguous_and_cover_table() {
        let mut entries: Vec<usize> = Opcode::ALL.iter().map(|op| entry_row(*op)).collect();
        entries.sort_unstable();
        let mut expected = 2;
        for start in entries {
            assert_eq!(start, expected);
            expected = start + run_length(start);
        }
        assert_eq!(expected, MICROCODE.len());
    }

    #[test]
    fn test_rom_matches_table() {
        let rom = rom();
        assert_eq!(rom.len(), MICROCODE.len());
        for (row, words) in MICROCODE.iter().zip(&rom) {
            let decoded: Vec<Signal> = words.iter().map(|w| Signal::decode(*w).unwrap()).collect();
            assert_eq!(&decoded[..], *row);
        }
    }
}
