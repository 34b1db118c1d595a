use std::fmt;

/// Contract violations on the operand stack.
///
/// The VM treats both as fatal. The fallible stack API hands them out so
/// callers can report them before going down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VMError {
    StackOverflow { capacity: usize },
    StackUnderflow { required: usize, depth: usize },
}

impl fmt::Display for VMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VMError::StackOverflow { capacity } => {
                write!(f, "stack overflow: capacity of {capacity} roots exhausted")
            }
            VMError::StackUnderflow { required, depth } => {
                write!(
                    f,
                    "stack underflow: needed {required} roots but only {depth} present"
                )
            }
        }
    }
}

impl std::error::Error for VMError {}
