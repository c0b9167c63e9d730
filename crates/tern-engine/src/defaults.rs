//! Default constants for compiler and runtime configuration.

/// Default number of errors collected before a unit is abandoned (0 = unlimited).
pub const DEFAULT_TOLERANCE: usize = 0;

/// Default number of lock segments for the map-backed class-value strategy.
/// Must be a power of two.
pub const DEFAULT_CLASS_VALUE_SEGMENTS: usize = 16;

/// Environment variable selecting the class-value strategy (`slot` or `map`).
pub const CLASS_VALUE_ENV: &str = "TERN_CLASS_VALUE";

/// Environment variable prefix for compiler options (`TERN_COMPILER_<FIELD>`).
pub const COMPILER_ENV_PREFIX: &str = "TERN_COMPILER_";

/// Name of the universal root type.
pub const ROOT_TYPE: &str = "Object";

/// Method-name prefixes marking mop methods.
pub const MOP_PREFIXES: [&str; 2] = ["this$", "super$"];

/// Marker character of internal duplicate overloads, skipped by the member cache.
pub const DUPLICATE_OVERLOAD_MARKER: char = '+';

// ── Enum completion names ──

/// Backing array of enum constants.
pub const ENUM_VALUES_FIELD: &str = "$VALUES";

/// Controlled construction helper on every enum node.
pub const ENUM_INIT_METHOD: &str = "$INIT";

/// First and last constant markers.
pub const ENUM_MIN_VALUE: &str = "MIN_VALUE";
pub const ENUM_MAX_VALUE: &str = "MAX_VALUE";

/// Hidden constructor parameter names before collision renaming.
pub const ENUM_NAME_PARAM: &str = "__str";
pub const ENUM_ORDINAL_PARAM: &str = "__int";

/// Parameter of the synthesized map-style enum constructor.
pub const ENUM_NAMED_ARGS_PARAM: &str = "__namedArgs";
