/// Codec used for trail blocks that roll out of the working window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrailCompression {
    /// Packed blocks are stored as a plain byte copy.
    #[default]
    None,
    /// Packed blocks are compressed with a general-purpose codec (DEFLATE).
    Generic,
}

/// Amount of demon profiling performed by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProfileLevel {
    #[default]
    None,
    Normal,
}

/// Amount of propagation tracing performed by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceLevel {
    #[default]
    None,
    Normal,
}

/// Constant parameters of a [`crate::Solver`], fixed at construction.
#[derive(Clone, Debug)]
pub struct SolverParameters {
    /// Codec for packed trail blocks.
    pub trail_compression: TrailCompression,
    /// Number of entries kept unpacked in the working window of each trail partition.
    pub trail_block_size: usize,
    /// Advisory split threshold for constraint libraries working on large arrays.
    pub array_split_size: usize,
    /// Whether variable and constraint names are kept.
    pub store_names: bool,
    /// Whether the demon profiler is attached to every search.
    pub profile_level: ProfileLevel,
    /// Whether the propagation trace is attached to every search.
    pub trace_level: TraceLevel,
    /// Whether anonymous variables are named automatically.
    pub name_all_variables: bool,
}

impl SolverParameters {
    pub const DEFAULT_TRAIL_BLOCK_SIZE: usize = 8000;
    pub const DEFAULT_ARRAY_SPLIT_SIZE: usize = 16;
}

impl Default for SolverParameters {
    fn default() -> SolverParameters {
        SolverParameters {
            trail_compression: TrailCompression::default(),
            trail_block_size: SolverParameters::DEFAULT_TRAIL_BLOCK_SIZE,
            array_split_size: SolverParameters::DEFAULT_ARRAY_SPLIT_SIZE,
            store_names: true,
            profile_level: ProfileLevel::default(),
            trace_level: TraceLevel::default(),
            name_all_variables: false,
        }
    }
}
