use core::alloc::LayoutError;
use core::fmt;

impl From<LayoutError> for AllocError {
    fn from(_: LayoutError) -> Self {
        Self::LayoutError
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    OOM,
    AllocOverflow,
    LayoutError,
    InitFailed,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OOM => write!(f, "backing store cannot grow the heap"),
            Self::AllocOverflow => write!(f, "requested size overflows the heap encoding"),
            Self::LayoutError => write!(f, "invalid backing region layout"),
            Self::InitFailed => write!(f, "heap initialization failed"),
        }
    }
}

impl std::error::Error for AllocError {}
