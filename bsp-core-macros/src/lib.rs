//! Derive helpers for `bsp-core` payload types.
//!
//! The teacher codebase (`neutronium_proc`) derives a process-global topic id for every
//! message type, backed by a `static mut` counter. A BSP registration id is per-`World`,
//! never global, so there is nothing unsafe left to generate here: `Payload` only fills in
//! the `type_name()` boilerplate `World` uses in diagnostics when a collective registration
//! mismatches across processors.

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Derives `bsp_core::Payload` for a struct or enum, so it can be carried by a `Variable`,
/// `Coarray`, or `Queue` without hand-writing the `type_name` boilerplate `World` uses in its
/// collective-mismatch diagnostics.
#[proc_macro_derive(Payload)]
pub fn derive_payload(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let ident = &ast.ident;
    let name = ident.to_string();

    let expanded = quote! {
        impl ::bsp_core::Payload for #ident {
            #[inline]
            fn type_name() -> &'static str {
                #name
            }
        }
    };

    expanded.into()
}
