use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Error, Field, Fields, Ident, LitInt, LitStr, Meta, Result, Token, Type,
    parse::{Parse, ParseStream},
};

pub(crate) fn expand_segment(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new_spanned(
            input,
            "`Segment` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new_spanned(
            input,
            "`Segment` may only be derived on structs with named fields.",
        ))?
    };

    let Some(attr) = input.attrs.iter().find(|a| a.path().is_ident("segment")) else {
        Err(Error::new_spanned(
            input,
            "`Segment` requires a `#[segment(\"ID\", version)]` attribute.",
        ))?
    };

    let SegmentAttribute { id, version } = attr.meta.require_list()?.parse_args()?;

    let fields = fields
        .named
        .iter()
        .map(FieldMetadata::parse)
        .collect::<Result<Vec<_>>>()?;

    let mut header = None;

    for field in &fields {
        if let FieldKind::Header = field.kind {
            if header.replace(&field.name).is_some() {
                Err(Error::new_spanned(
                    &field.name,
                    "Only one field may be marked `#[header]`.",
                ))?
            }
        }
    }

    let Some(header) = header else {
        Err(Error::new_spanned(
            input,
            "`Segment` requires a field marked `#[header]`.",
        ))?
    };

    let mut repeated = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| matches!(f.kind, FieldKind::Repeated));

    if let Some((i, field)) = repeated.next() {
        let is_last = fields
            .iter()
            .skip(i + 1)
            .all(|f| !matches!(f.kind, FieldKind::Element | FieldKind::Repeated));

        if !is_last {
            Err(Error::new_spanned(
                &field.name,
                "A `#[element(repeated)]` field must be the last element.",
            ))?
        }
    }

    let decode_fields = fields.iter().map(|field| {
        let FieldMetadata { name, ty, kind } = field;

        match kind {
            FieldKind::Header => quote! { #name: header },
            FieldKind::Element => quote! { #name: r.element::<#ty>()? },
            FieldKind::Repeated => quote! {
                #name: <#ty as ::hbci::sans::element::Repeated>::decode_repeated(r)?
            },
            FieldKind::Skipped => quote! { #name: ::core::default::Default::default() },
        }
    });

    let encode_fields = fields.iter().filter_map(|field| {
        let name = &field.name;

        match field.kind {
            FieldKind::Element => Some(quote! { w.element(&self.#name); }),
            FieldKind::Repeated => Some(quote! {
                ::hbci::sans::element::Repeated::encode_repeated(&self.#name, w);
            }),
            FieldKind::Header | FieldKind::Skipped => None,
        }
    });

    let name = &input.ident;

    let expanded = quote! {
        impl ::hbci::sans::segment::SegmentType for #name {
            const ID: &'static str = #id;
            const VERSION: u16 = #version;

            #[allow(unused_variables)]
            fn decode_elements(
                header: ::hbci::sans::segment::SegmentHeader,
                r: &mut ::hbci::sans::segment::SegmentReader,
            ) -> ::core::result::Result<Self, ::hbci::sans::element::DecodeError> {
                ::core::result::Result::Ok(Self {
                    #(#decode_fields,)*
                })
            }
        }

        impl ::hbci::sans::segment::DecodeSegment for #name {
            const INDEX: &'static [(&'static str, u16)] = &[(#id, #version)];

            fn decode_segment(
                raw: &[u8],
            ) -> ::core::result::Result<Self, ::hbci::sans::element::DecodeError> {
                ::hbci::sans::segment::decode_typed(raw)
            }
        }

        impl ::hbci::sans::segment::Segment for #name {
            fn header(&self) -> &::hbci::sans::segment::SegmentHeader {
                &self.#header
            }

            fn header_mut(&mut self) -> &mut ::hbci::sans::segment::SegmentHeader {
                &mut self.#header
            }

            #[allow(unused_variables)]
            fn encode_elements(&self, w: &mut ::hbci::sans::segment::SegmentWriter) {
                #(#encode_fields)*
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    };

    Ok(expanded.into())
}

#[derive(Debug)]
struct FieldMetadata {
    name: Ident,
    ty: Type,
    kind: FieldKind,
}

#[derive(Debug)]
enum FieldKind {
    Header,
    Element,
    Repeated,
    Skipped,
}

impl FieldMetadata {
    fn parse(field: &Field) -> Result<Self> {
        let Some(name) = field.ident.clone() else {
            Err(Error::new_spanned(field, "Field must be named."))?
        };

        let ty = field.ty.clone();

        let kind = if field.attrs.iter().any(|a| a.path().is_ident("header")) {
            FieldKind::Header
        } else if let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("element")) {
            match &attr.meta {
                Meta::Path(_) => FieldKind::Element,
                Meta::List(list) => {
                    list.parse_args::<ElementAttribute>()?;
                    FieldKind::Repeated
                }
                Meta::NameValue(_) => Err(Error::new_spanned(
                    attr,
                    "Expected `#[element]` or `#[element(repeated)]`.",
                ))?,
            }
        } else {
            FieldKind::Skipped // Fields without an attribute are left at their default.
        };

        Ok(Self { name, ty, kind })
    }
}

#[derive(Debug)]
struct SegmentAttribute {
    id: LitStr,
    version: LitInt,
}

impl Parse for SegmentAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let id = input.parse::<LitStr>()?;
        input.parse::<Token![,]>()?;
        let version = input.parse::<LitInt>()?;

        Ok(Self { id, version })
    }
}

#[derive(Debug)]
struct ElementAttribute;

impl Parse for ElementAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let ident = input.parse::<Ident>()?;

        if ident != "repeated" {
            Err(Error::new_spanned(
                ident,
                "Element modifier must be `repeated`.",
            ))?
        }

        Ok(Self)
    }
}
