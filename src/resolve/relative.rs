//! Self-relative branch targets (`$+<hex>`)

use std::borrow::Cow;
use regex::{Captures, Regex};
use crate::Address;
use crate::index::AddressIndex;

/// Rewrite every self-relative operand of `text` whose target is in this function.
///
/// The target is `address + offset`; a target at position `p` becomes
/// `INSTR<p>`. Unlike labels there is no `+1` adjustment.
pub fn resolve<'t>(
    text: &'t str,
    address: Address,
    pattern: &Regex,
    index: &AddressIndex,
) -> Cow<'t, str> {
    pattern.replace_all(text, |caps: &Captures<'_>| {
        match target_position(address, &caps["offset"], index) {
            Some(position) => {
                log::trace!("offset '{}' at 0x{:x} -> INSTR{}", &caps[0], address, position);
                format!("INSTR{}", position)
            }
            None => caps[0].to_string(),
        }
    })
}

fn target_position(address: Address, hex: &str, index: &AddressIndex) -> Option<usize> {
    let offset = Address::from_str_radix(hex, 16).ok()?;
    let target = address.checked_add(offset)?;
    index.position_of(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::CompiledDialect;
    use rstest::rstest;

    fn resolve_with(text: &str, address: Address, addrs: &[Address]) -> String {
        let dialect = CompiledDialect::default();
        let index = AddressIndex::build(addrs.iter().copied()).unwrap();
        resolve(text, address, dialect.relative_pattern(), &index).into_owned()
    }

    #[rstest]
    #[case("jmp $+4", 0x10, "jmp INSTR2")]
    #[case("jmp short $+8", 0x10, "jmp short INSTR3")]
    // Last instruction is a valid target here
    #[case("jz $+4", 0x14, "jz INSTR3")]
    #[case("jmp $+0", 0x14, "jmp INSTR2")]
    // Lands between instructions
    #[case("jmp $+2", 0x10, "jmp $+2")]
    // Beyond the function
    #[case("jmp $+100", 0x10, "jmp $+100")]
    #[case("jmp $+xyz", 0x10, "jmp $+xyz")]
    fn test_single_offset(#[case] text: &str, #[case] address: Address, #[case] expected: &str) {
        assert_eq!(resolve_with(text, address, &[0x10, 0x14, 0x18]), expected);
    }

    #[test]
    fn test_uppercase_offset() {
        assert_eq!(resolve_with("jmp $+A", 0x0, &[0x0, 0xa]), "jmp INSTR2");
    }

    #[test]
    fn test_overflowing_target_is_unresolved() {
        let addrs = [u64::MAX - 1, u64::MAX];
        assert_eq!(resolve_with("jmp $+10", u64::MAX, &addrs), "jmp $+10");
    }

    #[test]
    fn test_multiple_offsets() {
        assert_eq!(
            resolve_with("jmp $+4 ; or $+8 ; never $+40", 0x10, &[0x10, 0x14, 0x18]),
            "jmp INSTR2 ; or INSTR3 ; never $+40"
        );
    }
}
