use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Result};

pub(crate) fn expand_data_element_group(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new_spanned(
            input,
            "`DataElementGroup` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new_spanned(
            input,
            "`DataElementGroup` may only be derived on structs with named fields.",
        ))?
    };

    if fields.named.is_empty() {
        Err(Error::new_spanned(
            input,
            "`DataElementGroup` requires at least one field.",
        ))?
    }

    // Members appear on the wire in declaration order.
    let names = fields.named.iter().map(|f| &f.ident).collect::<Vec<_>>();
    let types = fields.named.iter().map(|f| &f.ty).collect::<Vec<_>>();

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::hbci::sans::element::DataElement for #name #ty_generics #where_clause {
            const WIDTH: usize = 0 #(+ <#types as ::hbci::sans::element::DataElement>::WIDTH)*;

            fn decode(
                r: &mut ::hbci::sans::element::GroupReader<'_>,
            ) -> ::core::result::Result<Self, ::hbci::sans::element::DecodeError> {
                ::core::result::Result::Ok(Self {
                    #(#names: <#types as ::hbci::sans::element::DataElement>::decode(r)?,)*
                })
            }

            fn encode(&self, w: &mut ::hbci::sans::element::GroupWriter) {
                #(::hbci::sans::element::DataElement::encode(&self.#names, w);)*
            }
        }
    };

    Ok(expanded.into())
}
