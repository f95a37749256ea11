use core::fmt::{Display, Formatter};

/// The index of a worker within a run, in `[0, P)`.
pub type WorkerIndex = usize;

/// The shared handle by which all workers refer to the same distributed variable.
///
/// Logical ids are minted in registration order, so every worker must issue its registrations in
/// the same order for the ids to line up.
pub type LogicalId = usize;

/// A number of bytes.
pub(crate) type ByteSize = usize;

/// The address of a worker's local memory.
///
/// Addresses are only compared and offset by the runtime; they are turned back into pointers when
/// the owning worker delivers a write into its own memory. [Address::PLACEHOLDER] stands for a
/// registration or de-registration which borrows its address from a peer at the same position.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(usize);

impl Address {
    /// The null address, used to register or de-register on behalf of a peer.
    pub const PLACEHOLDER: Address = Address(0);

    /// The address of the first element of `slice`.
    pub fn of_slice<T>(slice: &[T]) -> Self {
        Self::from(slice.as_ptr())
    }

    pub fn is_placeholder(self) -> bool {
        self == Self::PLACEHOLDER
    }

    /// The address `offset` bytes past this one.
    pub(crate) fn offset(self, offset: ByteSize) -> Self {
        Address(self.0.wrapping_add(offset))
    }

    pub(crate) fn as_ptr(self) -> *const u8 {
        self.0 as *const u8
    }

    pub(crate) fn as_mut_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }
}

impl<T> From<*const T> for Address {
    fn from(pointer: *const T) -> Self {
        Address(pointer as usize)
    }
}

impl<T> From<*mut T> for Address {
    fn from(pointer: *mut T) -> Self {
        Address(pointer as usize)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Address;
    use test_log::test;

    #[test]
    fn test_null_pointer_is_placeholder() {
        let null: *const f64 = core::ptr::null();
        assert!(Address::from(null).is_placeholder());

        let values: [f64; 2] = [1.0, 2.0];
        let address: Address = Address::of_slice(&values);
        assert!(!address.is_placeholder());
        assert_eq!(address.offset(8), Address::from(&values[1] as *const f64));
    }
}
