use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod element_group;
mod segment;

#[proc_macro_derive(Segment, attributes(segment, header, element))]
pub fn derive_segment(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match segment::expand_segment(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(DataElementGroup)]
pub fn derive_data_element_group(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match element_group::expand_data_element_group(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}
