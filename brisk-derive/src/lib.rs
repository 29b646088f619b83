//! `#[derive(Shaped)]` — emits a `brisk_core::Shape` descriptor for a
//! struct, honoring `#[json(...)]` attributes:
//!
//! - field level: `rename = "key"`, `omitempty`, `string`, `skip`, `embed`
//! - container level: `marshaler`, `unmarshaler`, `text_marshaler`,
//!   `text_unmarshaler` — wire the corresponding hook trait impl into the
//!   shape's vtable.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

#[proc_macro_derive(Shaped, attributes(json))]
pub fn derive_shaped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerAttrs {
    marshaler: bool,
    unmarshaler: bool,
    text_marshaler: bool,
    text_unmarshaler: bool,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    omitempty: bool,
    string: bool,
    skip: bool,
    embed: bool,
}

fn container_attrs(input: &DeriveInput) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("json") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("marshaler") {
                out.marshaler = true;
            } else if meta.path.is_ident("unmarshaler") {
                out.unmarshaler = true;
            } else if meta.path.is_ident("text_marshaler") {
                out.text_marshaler = true;
            } else if meta.path.is_ident("text_unmarshaler") {
                out.text_unmarshaler = true;
            } else {
                return Err(meta.error("unrecognized container attribute"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("json") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                out.rename = Some(lit.value());
            } else if meta.path.is_ident("omitempty") {
                out.omitempty = true;
            } else if meta.path.is_ident("string") {
                out.string = true;
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("embed") {
                out.embed = true;
            } else {
                return Err(meta.error("unrecognized field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn expand(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().cloned().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Shaped cannot be derived for tuple structs",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Shaped can only be derived for structs",
            ))
        }
    };

    let container = container_attrs(&input)?;

    // Every type parameter must itself be shaped.
    for param in input.generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::brisk_core::Shaped));
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name = &input.ident;
    let name_lit = name.to_string();

    let mut field_tokens = Vec::with_capacity(fields.len());
    for field in &fields {
        let attrs = field_attrs(field)?;
        let ident = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "Shaped requires named fields")
        })?;
        let ident_lit = ident.to_string();
        let ty = &field.ty;

        let rename = match &attrs.rename {
            Some(key) => quote!(::core::option::Option::Some(#key)),
            None => quote!(::core::option::Option::None),
        };

        let mut flags = quote!(::brisk_core::FieldFlags::EMPTY);
        if attrs.omitempty {
            flags = quote!(#flags.union(::brisk_core::FieldFlags::OMITEMPTY));
        }
        if attrs.string {
            flags = quote!(#flags.union(::brisk_core::FieldFlags::STRING));
        }
        if attrs.skip {
            flags = quote!(#flags.union(::brisk_core::FieldFlags::SKIP));
        }
        if attrs.embed {
            flags = quote!(#flags.union(::brisk_core::FieldFlags::EMBED));
        }

        field_tokens.push(quote! {
            ::brisk_core::Field {
                name: #ident_lit,
                rename: #rename,
                shape: ::brisk_core::ShapeRef::Lazy(
                    || <#ty as ::brisk_core::Shaped>::SHAPE,
                ),
                offset: ::core::mem::offset_of!(#name #ty_generics, #ident),
                flags: #flags,
            }
        });
    }

    let marshal_json = hook(container.marshaler, quote!(marshal_json_raw));
    let unmarshal_json = hook(container.unmarshaler, quote!(unmarshal_json_raw));
    let marshal_text = hook(container.text_marshaler, quote!(marshal_text_raw));
    let unmarshal_text = hook(container.text_unmarshaler, quote!(unmarshal_text_raw));

    Ok(quote! {
        const _: () = {
            #[automatically_derived]
            unsafe impl #impl_generics ::brisk_core::Shaped for #name #ty_generics #where_clause {
                const SHAPE: &'static ::brisk_core::Shape = &::brisk_core::Shape {
                    name: #name_lit,
                    size: ::core::mem::size_of::<Self>(),
                    align: ::core::mem::align_of::<Self>(),
                    type_id: ::core::any::TypeId::of::<Self>,
                    kind: ::brisk_core::Kind::Struct(&::brisk_core::StructDef {
                        fields: &[#(#field_tokens,)*],
                    }),
                    vtable: ::brisk_core::VTable {
                        default_in_place: ::brisk_core::default_fields_in_place::<Self>,
                        is_empty: ::brisk_core::empty_never,
                        marshal_json: #marshal_json,
                        unmarshal_json: #unmarshal_json,
                        marshal_text: #marshal_text,
                        unmarshal_text: #unmarshal_text,
                    },
                };
            }
        };
    })
}

fn hook(enabled: bool, adapter: TokenStream2) -> TokenStream2 {
    if enabled {
        quote!(::core::option::Option::Some(::brisk_core::#adapter::<Self>))
    } else {
        quote!(::core::option::Option::None)
    }
}
