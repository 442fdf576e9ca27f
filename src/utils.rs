use std::panic::Location;

use crate::error::{HandshakeError, Operation, Result};

/// Narrows `value` to the width of a wire field.
///
/// On overflow the error records the offending value, the operation and the caller location.
#[track_caller]
pub(crate) fn cast_to_wire<T, V>(value: V, field: &'static str, operation: Operation) -> Result<T>
where
    T: TryFrom<V> + Into<u64> + Bounded,
    V: Into<u64> + Copy,
{
    let location = Location::caller();

    T::try_from(value).map_err(|_| {
        let value = value.into();

        error!(
            %operation,
            field,
            value,
            max = T::MAX_VALUE,
            file = location.file(),
            line = location.line(),
            "value does not fit in the wire field"
        );

        HandshakeError::Overflow {
            operation,
            field,
            value,
            max: T::MAX_VALUE,
            location,
        }
    })
}

pub(crate) trait Bounded {
    const MAX_VALUE: u64;
}

impl Bounded for u16 {
    const MAX_VALUE: u64 = u16::MAX as u64;
}

impl Bounded for u32 {
    const MAX_VALUE: u64 = u32::MAX as u64;
}
