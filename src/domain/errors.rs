#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    InvalidCellReference(String),
    UnknownFunction(String),
    UnrecognizedSyntax(String),
    MalformedExpression(String),
    DivisionByZero,
}

impl DomainError {
    /// True for inputs the engine does not recognize as a formula at all.
    ///
    /// These fall back to literal display rather than the `#ERROR`
    /// sentinel: stray characters outside the arithmetic set, bare words,
    /// unknown function names.
    pub fn is_unrecognized(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownFunction(_) | DomainError::UnrecognizedSyntax(_)
        )
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidCellReference(ref_str) => {
                write!(f, "Invalid cell reference: {}", ref_str)
            }
            DomainError::UnknownFunction(name) => {
                write!(f, "Unknown function: {}", name)
            }
            DomainError::UnrecognizedSyntax(what) => {
                write!(f, "Unrecognized syntax: {}", what)
            }
            DomainError::MalformedExpression(msg) => {
                write!(f, "Malformed expression: {}", msg)
            }
            DomainError::DivisionByZero => {
                write!(f, "Division by zero")
            }
        }
    }
}

impl std::error::Error for DomainError {}

pub type DomainResult<T> = Result<T, DomainError>;
