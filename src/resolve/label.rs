//! Label-style branch targets (`loc_<hex>`, `locret_<hex>`)

use std::borrow::Cow;
use regex::{Captures, Regex};
use crate::Address;
use crate::index::AddressIndex;

/// Rewrite every label operand of `text` that names an instruction of this function.
///
/// A label at position `p` becomes ` INSTR<p + 1>`, the leading space of the
/// match included. Labels outside the function, labels naming the last
/// instruction, and labels whose address is not valid hexadecimal are left
/// as they are.
///
/// # Arguments
/// * `text` - Instruction text, already known to be a branch
/// * `pattern` - Label matcher with a `target` capture group
/// * `index` - Address index of the enclosing function
pub fn resolve<'t>(text: &'t str, pattern: &Regex, index: &AddressIndex) -> Cow<'t, str> {
    pattern.replace_all(text, |caps: &Captures<'_>| {
        match target_position(&caps["target"], index) {
            Some(position) => {
                log::trace!("label '{}' -> INSTR{}", caps[0].trim_start(), position);
                format!(" INSTR{}", position)
            }
            None => caps[0].to_string(),
        }
    })
}

/// Position referenced by a label, if it resolves inside the function
fn target_position(hex: &str, index: &AddressIndex) -> Option<usize> {
    let target = Address::from_str_radix(hex, 16).ok()?;
    let following = index.position_of(target)? + 1;
    index.contains_position(following).then_some(following)
}
