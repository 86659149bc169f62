//! Instruction records consumed by the machine.
//!
//! The compiler emits one record per memory cell. A record normally carries
//! an opcode, but data cells (variables, string bytes) only carry an `arg`.

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::machine::Word;

/// The 22 machine opcodes.
///
/// Declared in microcode ROM order; the discriminant indexes the opcode
/// entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    Sum,
    Sub,
    Mul,
    Div,
    Mod,
    Dup,
    Drop,
    Swap,
    Eq,
    More,
    Less,
    Push,
    AddrOnTop,
    SaveVar,
    VarOnTop,
    Jzs,
    Jmp,
    Print,
    Read,
    Emit,
    Halt,
    NotEq,
}

impl Opcode {
    /// Every opcode, in discriminant order.
    pub const ALL: [Opcode; 22] = [
        Opcode::Sum,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Dup,
        Opcode::Drop,
        Opcode::Swap,
        Opcode::Eq,
        Opcode::More,
        Opcode::Less,
        Opcode::Push,
        Opcode::AddrOnTop,
        Opcode::SaveVar,
        Opcode::VarOnTop,
        Opcode::Jzs,
        Opcode::Jmp,
        Opcode::Print,
        Opcode::Read,
        Opcode::Emit,
        Opcode::Halt,
        Opcode::NotEq,
    ];

    /// Mnemonic as written in instruction files.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Sum => "sum",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::Dup => "dup",
            Opcode::Drop => "drop",
            Opcode::Swap => "swap",
            Opcode::Eq => "eq",
            Opcode::More => "more",
            Opcode::Less => "less",
            Opcode::Push => "push",
            Opcode::AddrOnTop => "addr_on_top",
            Opcode::SaveVar => "save_var",
            Opcode::VarOnTop => "var_on_top",
            Opcode::Jzs => "jzs",
            Opcode::Jmp => "jmp",
            Opcode::Print => "print",
            Opcode::Read => "read",
            Opcode::Emit => "emit",
            Opcode::Halt => "halt",
            Opcode::NotEq => "not_eq",
        }
    }

    /// Whether the opcode reads its immediate argument.
    pub fn takes_argument(self) -> bool {
        matches!(
            self,
            Opcode::Push | Opcode::AddrOnTop | Opcode::Jzs | Opcode::Jmp
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Where an instruction came from in the source text: (line, word, token).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTag(pub u32, pub u32, pub String);

impl SourceTag {
    pub fn line(&self) -> u32 {
        self.0
    }

    pub fn word(&self) -> u32 {
        self.1
    }

    pub fn token(&self) -> &str {
        &self.2
    }
}

/// One instruction-stream record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opcode: Option<Opcode>,
    #[serde(
        default,
        deserialize_with = "deserialize_arg",
        skip_serializing_if = "Option::is_none"
    )]
    pub arg: Option<Word>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<SourceTag>,
}

impl Instruction {
    /// An instruction without an argument.
    pub fn op(opcode: Opcode) -> Self {
        Self {
            opcode: Some(opcode),
            arg: None,
            term: None,
        }
    }

    /// An instruction with an immediate argument.
    pub fn with_arg(opcode: Opcode, arg: Word) -> Self {
        Self {
            opcode: Some(opcode),
            arg: Some(arg),
            term: None,
        }
    }

    /// A bare data cell.
    pub fn data(value: Word) -> Self {
        Self {
            opcode: None,
            arg: Some(value),
            term: None,
        }
    }

    /// Attach a source tag.
    pub fn tagged(mut self, line: u32, word: u32, token: &str) -> Self {
        self.term = Some(SourceTag(line, word, token.to_string()));
        self
    }

    pub fn is_halt(&self) -> bool {
        self.opcode == Some(Opcode::Halt)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.opcode, self.arg) {
            (Some(op), Some(arg)) => write!(f, "{} {}", op, arg),
            (Some(op), None) => write!(f, "{}", op),
            (None, Some(arg)) => write!(f, "data {}", arg),
            (None, None) => f.write_str("data"),
        }
    }
}

/// The compiler writes pushed literals as strings and everything else as
/// numbers, so both are accepted. Either must fit a Word.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArgRepr {
    Number(i64),
    Text(String),
}

fn deserialize_arg<'de, D>(deserializer: D) -> Result<Option<Word>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<ArgRepr>::deserialize(deserializer)?;
    raw.map(|repr| {
        let wide = match repr {
            ArgRepr::Number(n) => n,
            ArgRepr::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                <D::Error as DeError>::custom(format!("argument {:?} is not an integer", text))
            })?,
        };
        Word::try_from(wide).map_err(|_| {
            <D::Error as DeError>::custom(format!("argument {} outside the 32-bit word range", wide))
        })
    })
    .transpose()
}
