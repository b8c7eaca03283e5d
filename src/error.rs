pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The in-search failure token.
///
/// A `Failure` is not an ordinary error: it carries no payload and is only
/// ever produced while the solver is inside a search, where propagation or a
/// decision detected an inconsistency. It unwinds through every mutator via
/// `?` until the search driver catches it at the nearest choice point and
/// backtracks. User code outside of a search should never observe one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("propagation failure")]
pub struct Failure;

/// The result type threaded through every domain mutator and propagator.
pub type PropagationResult<T = ()> = core::result::Result<T, Failure>;

/// Errors raised while building a model, before any search starts.
///
/// These are recoverable: the model is left untouched and the caller can fix
/// the offending call. Bugs in the engine itself (popping an empty trail,
/// reading the value of an unbound variable) are not errors but panics.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("empty initial domain for variable {name:?} ({min}..={max})")]
    EmptyDomain { name: String, min: i64, max: i64 },
    #[error("variable list and coefficient list differ in length ({vars} vs {coefficients})")]
    MismatchedTerms { vars: usize, coefficients: usize },
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{inner}")]
    Inner { inner: Box<SolverError> },
}

impl From<SolverError> for Error {
    fn from(inner: SolverError) -> Self {
        Error::Inner {
            inner: Box::new(inner),
        }
    }
}
