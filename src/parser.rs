//! Splitting a token stream into commands joined by control operators.

/// Control operator found after a command.
///
/// The discriminants are index-aligned with [`OPERATORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    /// `|` — feed this command's output into the next command.
    Pipe,
    /// `||` — run the next command only if this one failed.
    Or,
    /// `&&` — run the next command only if this one succeeded.
    And,
    /// `;` — run the next command unconditionally.
    Seq,
    /// Synthetic marker on the last command of a chain.
    Nop,
}

/// Operator symbol table, checked in declared order.
const OPERATORS: [(&str, ControlOp); 4] = [
    ("|", ControlOp::Pipe),
    ("||", ControlOp::Or),
    ("&&", ControlOp::And),
    (";", ControlOp::Seq),
];

/// One command of a chain: its argument vector (first entry is the program
/// or builtin name) and the control operator that followed it in the input.
///
/// The last command of any chain carries [`ControlOp::Nop`]; every other
/// command carries the operator that separated it from its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCommand<'a> {
    pub argv: Vec<&'a str>,
    pub op: ControlOp,
}

fn match_operator(token: &str) -> Option<ControlOp> {
    OPERATORS
        .iter()
        .find(|(symbol, _)| *symbol == token)
        .map(|(_, op)| *op)
}

/// Group tokens into an ordered command chain, cutting at operator tokens.
///
/// A command between two operators may come out with an empty `argv` (input
/// like `; ;`); the execution engine rejects those at run time. The trailing
/// command is omitted entirely when it would be empty, so a line ending in an
/// operator (`ls ;`) parses cleanly.
pub fn split_commands<'a>(tokens: &[&'a str]) -> Vec<ChainCommand<'a>> {
    let mut commands = Vec::new();
    let mut split_start = 0;

    for (i, token) in tokens.iter().enumerate() {
        if let Some(op) = match_operator(token) {
            commands.push(ChainCommand {
                argv: tokens[split_start..i].to_vec(),
                op,
            });
            split_start = i + 1;
        }
    }

    if split_start < tokens.len() {
        commands.push(ChainCommand {
            argv: tokens[split_start..].to_vec(),
            op: ControlOp::Nop,
        });
    }

    commands
}
