//! Status vocabulary of the adaptation layer.
//!
//! Every operation reports one of a small, closed set of outcomes. [`Error`] is the failure half
//! of that set; success is `Ok(..)`. The numeric encodings of the C API are available through
//! [`Error::to_raw`] (status codes) and [`Error::to_flags_raw`] (flag-returning calls, where the
//! top bit marks an error).
//!
//! Native kernel codes are translated per adapter family: the same native code does not mean the
//! same thing to a pend, a flag wait and a delete.

use rtos2_native::ErrorCode;

/// Type alias for Result with [`Error`] as the error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Raw status of a successful call.
pub const STATUS_OK: i32 = 0;

/// Reserved top bit of a flag word. A flag-returning call that fails sets it.
pub const FLAGS_ERROR: u32 = 0x8000_0000;

/// Failure outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// Unspecified failure (`osError`).
    #[error("Unspecified error")]
    Unknown,
    /// A bounded wait expired (`osErrorTimeout`).
    #[error("Timeout")]
    Timeout,
    /// The resource is unavailable or was deleted concurrently (`osErrorResource`).
    #[error("Resource not available")]
    Resource,
    /// A parameter, handle or attribute is invalid (`osErrorParameter`).
    #[error("Invalid parameter")]
    Parameter,
    /// Memory could not be provided (`osErrorNoMemory`).
    #[error("Out of memory")]
    NoMemory,
    /// The call is not allowed from interrupt context (`osErrorISR`).
    #[error("Not allowed in ISR context")]
    Isr,
}

impl Error {
    /// Returns the `osStatus_t` value.
    pub const fn to_raw(self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::Timeout => -2,
            Self::Resource => -3,
            Self::Parameter => -4,
            Self::NoMemory => -5,
            Self::Isr => -6,
        }
    }

    /// Returns the `osFlagsError*` value.
    pub const fn to_flags_raw(self) -> u32 {
        match self {
            Self::Unknown => 0xFFFF_FFFF,
            Self::Timeout => 0xFFFF_FFFE,
            Self::Resource => 0xFFFF_FFFD,
            Self::Parameter => 0xFFFF_FFFC,
            Self::NoMemory => 0xFFFF_FFFB,
            Self::Isr => 0xFFFF_FFFA,
        }
    }
}

/// Encodes a status-returning result as an `osStatus_t`.
pub fn status_raw(result: Result<()>) -> i32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(err) => err.to_raw(),
    }
}

/// Encodes a flag-returning result as a flag word.
pub fn flags_raw(result: Result<u32>) -> u32 {
    match result {
        Ok(flags) => flags,
        Err(err) => err.to_flags_raw(),
    }
}

/// Maps a native code reported by a mutex, semaphore or queue service.
pub(crate) fn from_sync(code: ErrorCode) -> Error {
    match code {
        ErrorCode::Timeout => Error::Timeout,
        ErrorCode::PendAbort
        | ErrorCode::ObjDel
        | ErrorCode::PendWouldBlock
        | ErrorCode::SemOvf
        | ErrorCode::MutexNotOwner
        | ErrorCode::MutexOvf
        | ErrorCode::MutexOwner
        | ErrorCode::QFull
        | ErrorCode::QEmpty => Error::Resource,
        ErrorCode::PendIsr => Error::Isr,
        other => unmapped(other),
    }
}

/// Maps a native code reported by an event flag service.
pub(crate) fn from_flags(code: ErrorCode) -> Error {
    match code {
        ErrorCode::Timeout => Error::Timeout,
        ErrorCode::PendAbort | ErrorCode::ObjDel | ErrorCode::PendWouldBlock => Error::Resource,
        ErrorCode::PendIsr => Error::Isr,
        ErrorCode::ObjPtrNull | ErrorCode::ObjType | ErrorCode::FlagInvalid => Error::Parameter,
        other => unmapped(other),
    }
}

/// Maps a native code reported by a delete service.
pub(crate) fn from_delete(code: ErrorCode) -> Error {
    match code {
        ErrorCode::ObjPtrNull | ErrorCode::ObjType | ErrorCode::OptInvalid => Error::Parameter,
        other => from_sync(other),
    }
}

fn unmapped(code: ErrorCode) -> Error {
    if !code.is_pend_outcome() {
        log::debug!("unmapped native error: {code}");
    }
    Error::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_status_values() {
        assert_eq!(status_raw(Ok(())), 0);
        assert_eq!(status_raw(Err(Error::Unknown)), -1);
        assert_eq!(status_raw(Err(Error::Timeout)), -2);
        assert_eq!(status_raw(Err(Error::Resource)), -3);
        assert_eq!(status_raw(Err(Error::Parameter)), -4);
        assert_eq!(status_raw(Err(Error::NoMemory)), -5);
        assert_eq!(status_raw(Err(Error::Isr)), -6);
    }

    #[test]
    fn flag_errors_set_the_top_bit() {
        for err in [
            Error::Unknown,
            Error::Timeout,
            Error::Resource,
            Error::Parameter,
            Error::NoMemory,
            Error::Isr,
        ] {
            assert_ne!(err.to_flags_raw() & FLAGS_ERROR, 0, "{err:?}");
        }
        assert_eq!(flags_raw(Ok(0x11)), 0x11);
        assert_eq!(flags_raw(Err(Error::Timeout)), 0xFFFF_FFFE);
    }

    #[test]
    fn sync_family() {
        assert_eq!(from_sync(ErrorCode::Timeout), Error::Timeout);
        assert_eq!(from_sync(ErrorCode::PendWouldBlock), Error::Resource);
        assert_eq!(from_sync(ErrorCode::ObjDel), Error::Resource);
        assert_eq!(from_sync(ErrorCode::QFull), Error::Resource);
        assert_eq!(from_sync(ErrorCode::MutexNotOwner), Error::Resource);
        assert_eq!(from_sync(ErrorCode::PendIsr), Error::Isr);
        assert_eq!(from_sync(ErrorCode::ObjPtrNull), Error::Unknown);
        assert_eq!(from_sync(ErrorCode::PrioExist), Error::Unknown);
    }

    #[test]
    fn flags_family() {
        assert_eq!(from_flags(ErrorCode::Timeout), Error::Timeout);
        assert_eq!(from_flags(ErrorCode::PendWouldBlock), Error::Resource);
        assert_eq!(from_flags(ErrorCode::FlagInvalid), Error::Parameter);
        assert_eq!(from_flags(ErrorCode::PendIsr), Error::Isr);
        assert_eq!(from_flags(ErrorCode::QFull), Error::Unknown);
    }

    #[test]
    fn delete_family() {
        assert_eq!(from_delete(ErrorCode::ObjPtrNull), Error::Parameter);
        assert_eq!(from_delete(ErrorCode::ObjType), Error::Parameter);
        assert_eq!(from_delete(ErrorCode::OptInvalid), Error::Parameter);
        assert_eq!(from_delete(ErrorCode::ObjDel), Error::Resource);
        assert_eq!(from_delete(ErrorCode::TmrIsr), Error::Unknown);
    }
}
