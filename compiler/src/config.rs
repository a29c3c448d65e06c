//! Compiler configuration.
//!
//! Carried over from the teacher's `config.rs` builder-pattern shape
//! (`CompilerConfig::new().with_...()`), repointed from FFI/external-builtin
//! extensibility to the knobs SPEC_FULL.md's ambient-stack section calls
//! out: optimization level, the IR optimizer's fixed-point iteration cap,
//! whether checked arithmetic is the ambient default, and the virtual
//! register budget before the scheduler spills to a memory frame.

/// How aggressively the pipeline optimizes. `None` skips `optimizer.rs`
/// entirely (IR is scheduled as built); `Default` and `Aggressive` both run
/// the full six-pass pipeline, `Aggressive` additionally permitting the
/// scheduler to choose a deeper virtual-register budget before spilling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    None,
    #[default]
    Default,
    Aggressive,
}

/// Configuration for one module compilation. Threaded by reference through
/// every pipeline stage from `optimizer` onward.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub optimization_level: OptimizationLevel,

    /// Cap on `optimizer::optimize_module`'s fixed-point loop (spec.md §4.5
    /// "until a fixed point or an iteration cap (default 10)").
    pub optimizer_iteration_cap: u32,

    /// Whether arithmetic outside an explicit `unchecked { ... }` region is
    /// checked by default. Always `true` for this language (spec.md §4.4);
    /// kept as a config field rather than a hardcoded constant so a future
    /// dialect/test harness can flip it without touching `ir_builder.rs`.
    pub checked_arithmetic_default: bool,

    /// Virtual registers reachable by a single `swap` before the scheduler
    /// spills the least-recently-used one to a memory frame (spec.md §4.6:
    /// "up to depth 16 reachable via single swaps, deeper values spilled").
    pub virtual_register_budget: u32,

    /// Hard ceiling on scheduled stack depth; crossing it after spilling is
    /// the "stack too deep" resource error (spec.md §7, §9 Open Question).
    pub max_stack_depth: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            optimization_level: OptimizationLevel::Default,
            optimizer_iteration_cap: 10,
            checked_arithmetic_default: true,
            virtual_register_budget: 16,
            max_stack_depth: 1024,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_optimizer_iteration_cap(mut self, cap: u32) -> Self {
        self.optimizer_iteration_cap = cap;
        self
    }

    pub fn with_virtual_register_budget(mut self, budget: u32) -> Self {
        self.virtual_register_budget = budget;
        self
    }

    /// Whether `optimizer::optimize_module` should run at all for this
    /// configuration.
    pub fn optimizations_enabled(&self) -> bool {
        self.optimization_level != OptimizationLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.optimizer_iteration_cap, 10);
        assert!(config.checked_arithmetic_default);
        assert_eq!(config.virtual_register_budget, 16);
        assert_eq!(config.max_stack_depth, 1024);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = CompilerConfig::new()
            .with_optimization_level(OptimizationLevel::None)
            .with_optimizer_iteration_cap(3)
            .with_virtual_register_budget(8);
        assert!(!config.optimizations_enabled());
        assert_eq!(config.optimizer_iteration_cap, 3);
        assert_eq!(config.virtual_register_budget, 8);
    }
}
