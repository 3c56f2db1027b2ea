mod arena;

pub use arena::Arena;
pub use arena::Handle;
