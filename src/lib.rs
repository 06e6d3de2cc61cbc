//! The mid-section of a Protobuf compiler: this crate consumes parsed ASTs
//! for a set of `.proto` files and produces a fully linked, type-checked
//! entity graph plus wire-format `FileDescriptorProto` /
//! `FileDescriptorSet` bytes with `SourceCodeInfo`.
//!
//! Lexing and parsing live upstream; the [`ast`] module is the contract
//! their output satisfies. Code generation and descriptor consumption live
//! downstream of the emitted bytes.
//!
//! # Example
//!
//! ```
//! use protolink::{ast, descriptor_set_bytes, EmitOptions, Report, Session};
//!
//! struct NoImports;
//!
//! impl protolink::Importer for NoImports {
//!     fn import(
//!         &mut self,
//!         _index: usize,
//!         _canonical_path: &str,
//!         _decl: &ast::ImportDecl,
//!     ) -> Result<protolink::File, protolink::ImportError> {
//!         Err(protolink::ImportError::NotFound)
//!     }
//! }
//!
//! let session = Session::new();
//! let mut report = Report::new();
//! let file = session.lower(
//!     ast::SourceFile {
//!         path: "empty.proto".to_owned(),
//!         ..Default::default()
//!     },
//!     &mut NoImports,
//!     &mut report,
//! );
//! assert!(!report.has_errors());
//! let bytes = descriptor_set_bytes(&[file], &EmitOptions::default());
//! assert!(!bytes.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod ast;
mod comments;
mod emit;
mod error;
mod ir;
#[cfg(test)]
mod testutil;
mod wire;

pub use self::emit::{descriptor_set_bytes, EmitOptions};
pub use self::error::{Diagnostic, DiagnosticKind, Label, Report, Severity};
pub use self::ir::build::{ImportError, Importer};
pub use self::ir::{File, Scalar, Session};
