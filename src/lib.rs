//! # Espalier: an embeddable expression engine
//!
//! Espalier lets a host application build expression trees in code, analyze
//! them against host-provided type information, and compile them into
//! callable artifacts. No source text, no parser: the tree is the program.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Fluent Builder → Semantic Analysis → Middleware Compilation → Artifact
//! ```
//!
//! ### Stage 1: Construction
//!
//! The [`ast`] module provides the fluent builder. Every node carries a
//! unique identity; sharing a node shares its analysis results.
//!
//! ### Stage 2: Semantic Analysis
//!
//! The [`semantic`] module runs three ordered passes over the tree (types,
//! members, scopes) and records facts keyed by node identity into the
//! [`context::Context`]. Analysis never fails; problems surface as
//! diagnostics or as compile errors later.
//!
//! ### Stage 3: Compilation
//!
//! The [`compile`] module lowers the analyzed tree through a middleware
//! chain into a [`compile::CompiledExpr`]. Caller middleware and registered
//! transformers see every node before the built-in translator does.
//!
//! ## Type Information
//!
//! The [`typesystem`] module answers "what is `Int32`" and "what members
//! does `Customer` have": built-in scalars, host types registered through
//! [`typesystem::NativeTypeBuilder`], and JSON-declared records served by
//! [`typesystem::SchemaProvider`], all behind one provider contract.
//!
//! ## Declarative Layers
//!
//! The [`constraint`] module compiles per-property validation rules into
//! artifacts; the [`mutation`] module does the same for schema-declared
//! state transitions. Both are ordinary consumers of the engine.

pub mod ast;
pub mod compile;
pub mod constraint;
pub mod context;
pub mod error;
pub mod mutation;
pub mod semantic;
pub mod typesystem;
pub mod value;

// Re-exports
pub use ast::*;
pub use compile::{CompileError, CompiledExpr, Compiler, RuntimeError};
pub use context::Context;
pub use error::*;
pub use value::Value;
