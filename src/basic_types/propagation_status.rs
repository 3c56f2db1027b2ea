/// The value carried by the fail escape.
///
/// A [`Failure`] is raised when a domain is wiped out, when a constraint detects an
/// inconsistency, or when a monitor requests that the current search stops. It unwinds the
/// current propagation or search-node scope as the error variant of [`PropagationStatus`]; the
/// driver catches it, cleans up the queue, and backtracks. It never carries a payload: the
/// engine deliberately does not explain failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Failure;

/// The result of a propagation step: either the domains were narrowed consistently, or a
/// [`Failure`] must unwind to the innermost search scope.
pub type PropagationStatus = Result<(), Failure>;
