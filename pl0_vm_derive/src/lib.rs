//! Derive macros for the pl0_vm crate.
//!
//! Provides:
//! - `#[derive(Error)]` - `Display`, `Error` and `From` boilerplate for error types

mod error;

use proc_macro::TokenStream;

/// Implements `Display` and `Error` for error types.
///
/// Fields marked `#[source]` are returned from `Error::source`, fields marked
/// `#[from]` additionally get a `From` conversion into the error type.
#[proc_macro_derive(Error, attributes(error, source, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
