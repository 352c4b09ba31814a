//! Address-to-position lookup for a single function.

use crate::{Address, RebaseError};

/// Ascending, duplicate-free addresses of one function.
///
/// Positions are 1-based: the lowest address is position 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressIndex {
    addrs: Vec<Address>,
}

impl AddressIndex {
    /// Build the index from addresses in any order.
    ///
    /// # Returns
    /// `RebaseError::DuplicateAddress` if an address occurs twice
    pub fn build<I>(addresses: I) -> Result<Self, RebaseError>
    where
        I: IntoIterator<Item = Address>,
    {
        let mut addrs: Vec<Address> = addresses.into_iter().collect();
        addrs.sort_unstable();

        if let Some(pair) = addrs.windows(2).find(|w| w[0] == w[1]) {
            return Err(RebaseError::DuplicateAddress(pair[0]));
        }

        Ok(Self { addrs })
    }

    /// 1-based position of `address`, or `None` if it lies outside the function
    pub fn position_of(&self, address: Address) -> Option<usize> {
        self.addrs.binary_search(&address).ok().map(|i| i + 1)
    }

    /// True when `position` names an instruction of this function
    pub fn contains_position(&self, position: usize) -> bool {
        (1..=self.addrs.len()).contains(&position)
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Addresses in position order
    pub fn addresses(&self) -> &[Address] {
        &self.addrs
    }
}
