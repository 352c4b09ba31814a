//! Function rebasing: rewrite one function into position-only form

use crate::{Instruction, NormalizedFunction, RebaseError};
use crate::index::AddressIndex;
use crate::resolve::CompiledDialect;

/// Normalize a single function.
///
/// Instructions may arrive in any order; they are ranked by address and
/// every branch instruction has its label and self-relative operands
/// rewritten to `INSTR<n>`.
///
/// # Arguments
/// * `instructions` - The function's instructions
/// * `dialect` - Matchers for the disassembler's syntax
///
/// # Returns
/// The normalized function, or `RebaseError::DuplicateAddress` if two
/// instructions share an address
pub fn rebase(
    instructions: &[Instruction],
    dialect: &CompiledDialect,
) -> Result<NormalizedFunction, RebaseError> {
    let index = AddressIndex::build(instructions.iter().map(|insn| insn.address))?;

    let mut ordered: Vec<&Instruction> = instructions.iter().collect();
    ordered.sort_unstable_by_key(|insn| insn.address);

    let mut rewritten = 0;
    let texts = ordered
        .into_iter()
        .map(|insn| {
            let text = dialect.resolve(&insn.text, insn.address, &index);
            if text != insn.text {
                rewritten += 1;
            }
            text
        })
        .collect();

    log::debug!(
        "Rebased {} instructions, {} branch operands rewritten",
        index.len(),
        rewritten
    );

    Ok(NormalizedFunction::from_texts(texts))
}
