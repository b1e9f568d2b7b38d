use std::fmt;

#[derive(Debug)]
pub enum Error {
    TypeMismatch {
        expected: String,
        got: String,
    },
    InvalidArgument(String),
    IncompatibleShape(String),
    //
    InvalidShape {
        message: String,
    },
    DimensionOutOfBounds {
        dim: i64,
        ndim: usize,
    },
    IndexOutOfBounds {
        index: i64,
        size: usize,
    },
    // write protection
    ReadOnly,
    BufferLocked {
        locks: usize,
    },
    // graph
    NoGraph,
    ConstantTensor,
    InvalidState(String),
    //
    Io(std::io::Error),
    #[cfg(feature = "serde")]
    SerializationError(String),
    #[cfg(feature = "serde")]
    DeserializationError(String),
    //
    Internal {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Type,
    Shape,
    Write,
    Graph,
    Io,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeMismatch { .. } => ErrorKind::Type,
            Self::InvalidArgument(_)
            | Self::IncompatibleShape(_)
            | Self::InvalidShape { .. }
            | Self::DimensionOutOfBounds { .. }
            | Self::IndexOutOfBounds { .. } => ErrorKind::Shape,
            Self::ReadOnly | Self::BufferLocked { .. } => ErrorKind::Write,
            Self::NoGraph | Self::ConstantTensor | Self::InvalidState(_) => ErrorKind::Graph,
            Self::Io(_) => ErrorKind::Io,
            #[cfg(feature = "serde")]
            Self::SerializationError(_) | Self::DeserializationError(_) => ErrorKind::Io,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_shape_error(&self) -> bool {
        self.kind() == ErrorKind::Shape
    }

    pub fn is_write_error(&self) -> bool {
        self.kind() == ErrorKind::Write
    }

    pub fn is_graph_error(&self) -> bool {
        self.kind() == ErrorKind::Graph
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, got)
            },
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::IncompatibleShape(msg) => write!(f, "Incompatible shape: {}", msg),

            Self::InvalidShape { message } => {
                write!(f, "Invalid shape: {}", message)
            },
            Self::DimensionOutOfBounds { dim, ndim } => {
                write!(
                    f,
                    "Dimension out of bounds: dimension {} is not valid for tensor with {} dimensions",
                    dim, ndim
                )
            },
            Self::IndexOutOfBounds { index, size } => {
                write!(f, "Index out of bounds: index {} is out of bounds for axis with size {}", index, size)
            },
            Self::ReadOnly => write!(f, "Buffer is read-only"),
            Self::BufferLocked { locks } => {
                write!(f, "Buffer is locked by {} pending backward dependencies", locks)
            },
            Self::NoGraph => write!(f, "Tensor has no associated graph"),
            Self::ConstantTensor => write!(f, "Cannot backpropagate from a constant tensor"),
            Self::InvalidState(msg) => write!(f, "Invalid graph state: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            #[cfg(feature = "serde")]
            Self::SerializationError(msg) => {
                write!(f, "Serialization error: {}", msg)
            },
            #[cfg(feature = "serde")]
            Self::DeserializationError(msg) => {
                write!(f, "Deserialization error: {}", msg)
            },
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            },
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
