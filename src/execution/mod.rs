// Adapter around the query execution engine
//
// The dispatcher only sees `ExecutionEngine`: given one subscriber's
// operation and a single-event source it yields at most one result.
// `ResolverEngine` is the in-process reference engine.

// Public API - what other modules can use
pub use engine::{
    ExecutionEngine, ExecutionErrorEntry, ExecutionResult, ExecutionStream, SingleEventSource,
};
pub use resolver::{root_field, FilterFn, ResolveFn, ResolverEngine, SubscriptionField};

// Internal modules
mod engine;
mod resolver;
