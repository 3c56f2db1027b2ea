mod propagation_status;
mod random;

pub use propagation_status::Failure;
pub use propagation_status::PropagationStatus;
pub use random::Random;
