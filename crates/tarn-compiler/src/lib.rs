//! Tarn compiler backend: managed IL method bodies to Tarn VM bytecode.
//!
//! A pure in-memory transform: the external IL loader hands over a
//! [`SourceModule`](il::SourceModule) of typed instruction streams and
//! metadata, and [`compile`] returns a linked [`Module`] whose methods
//! occupy one contiguous, byte-exact address space. The pipeline:
//! - `il` - the read-only source data model
//! - `translate` - instruction selection, frame/struct emulation, call
//!   classification, per-method branch resolution
//! - `link` - module layout and call-fix patching
//!
//! No file format or I/O is owned here; serialization of the linked
//! module is the surrounding driver's concern.

pub mod error;
pub mod il;
mod link;
pub mod translate;

#[cfg(test)]
pub mod test_utils;


pub use error::{CompileError, LinkError, TranslateError};
pub use tarn_bytecode::{CallConvention, Module};
pub use translate::Translator;

/// Compile a whole source module under the given calling convention.
///
/// Fail-fast: the first fatal condition aborts the module; no partial
/// output is produced.
pub fn compile(src: &il::SourceModule, convention: CallConvention) -> Result<Module, CompileError> {
    let mut translator = Translator::new(src, convention);
    translator.translate_all()?;
    let module = link::link(translator.into_methods(), src, convention)?;
    Ok(module)
}
