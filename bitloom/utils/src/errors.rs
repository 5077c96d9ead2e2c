//! Errors generated during elaboration and emission.

/// Convience wrapper to represent success or a meaningful elaboration error.
pub type LoomResult<T> = std::result::Result<T, Error>;

/// Errors generated while elaborating or emitting a circuit.
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error {
    pub fn width_mismatch<S: ToString>(prim: S, expected: u64, found: u64) -> Self {
        Self {
            kind: Box::new(ErrorKind::WidthMismatch(
                prim.to_string(),
                expected,
                found,
            )),
        }
    }
    pub fn out_of_range<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::OutOfRange(msg.to_string())),
        }
    }
    pub fn dangling_var<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::DanglingVar(msg.to_string())),
        }
    }
    pub fn unsupported_prim<S: ToString>(prim: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::UnsupportedPrim(prim.to_string())),
        }
    }
    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::MalformedStructure(msg.to_string())),
        }
    }
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::WriteError(msg.to_string())),
        }
    }
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Standard error type for bitloom errors.
#[derive(Clone)]
enum ErrorKind {
    /// Inputs of a primitive violate its width signature.
    WidthMismatch(String, u64, u64),
    /// A bit index or slice lies outside its operand.
    OutOfRange(String),
    /// A variable handle was used outside its elaboration.
    DanglingVar(String),
    /// The backend cannot emit this primitive.
    UnsupportedPrim(String),
    /// The netlist or an intermediate structure is malformed.
    MalformedStructure(String),
    /// Failed to write the output.
    WriteError(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            WidthMismatch(prim, expected, found) => {
                write!(
                    f,
                    "Width mismatch in `{prim}': expected {expected}, found {found}"
                )
            }
            OutOfRange(msg) => write!(f, "Out of range: {msg}"),
            DanglingVar(msg) => {
                write!(f, "Variable used outside its elaboration: {msg}")
            }
            UnsupportedPrim(prim) => {
                write!(f, "Backend cannot emit primitive `{prim}'")
            }
            MalformedStructure(msg) => {
                write!(f, "Malformed Structure: {msg}")
            }
            WriteError(msg) => {
                write!(f, "{msg}")
            }
        }
    }
}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_mismatch_renders_primitive_and_widths() {
        let err = Error::width_mismatch("Add", 8, 4);
        assert_eq!(
            format!("{:?}", err),
            "Width mismatch in `Add': expected 8, found 4"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(err.message().contains("IO Error"));
    }
}
