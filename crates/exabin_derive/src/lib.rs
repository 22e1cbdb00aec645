//! Derive macros for the `exabin` binary codec.
//!
//! Three derives are provided:
//!
//! - `#[derive(Encode)]` and `#[derive(Decode)]` generate
//!   `build_encoder`/`build_decoder` implementations that compose member
//!   plans in declaration order. For structs they additionally implement
//!   `EncodeNullable`/`DecodeNullable`, giving `Option<Self>` the
//!   presence-flag nullable form through the core crate's blanket impl.
//! - `#[derive(Described)]` exposes the computed layout at run time.
//!
//! Member participation follows the type's marker mode, evaluated at
//! expansion time by `exabin_layout` so the selection policy lives in one
//! place:
//!
//! - no container attribute: public fields only;
//! - `#[pack(serializable)]`: every field unless `#[pack(skip)]`;
//! - `#[pack(contract)]`: only fields tagged `#[pack(member)]`.
//!
//! Fields that do not participate are left at `Default::default()` when
//! decoding. Fieldless enums encode as their `#[repr]` integer (`i32`
//! when unspecified).

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, Attribute, Data, DataEnum, DataStruct, DeriveInput,
    Fields, GenericParam, Generics,
};

use exabin_layout::{select, MarkerMode, Member, MemberAttrs, MemberKind};

// ============================================================================
// Attribute parsing
// ============================================================================

fn marker_mode(attrs: &[Attribute]) -> syn::Result<MarkerMode> {
    let mut mode = MarkerMode::Plain;
    for attr in attrs.iter().filter(|a| a.path().is_ident("pack")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("serializable") {
                mode = MarkerMode::LegacySerializable;
                Ok(())
            } else if meta.path.is_ident("contract") {
                mode = MarkerMode::Contract;
                Ok(())
            } else {
                Err(meta.error("expected `serializable` or `contract`"))
            }
        })?;
    }
    Ok(mode)
}

fn field_flags(attrs: &[Attribute]) -> syn::Result<(bool, bool)> {
    let mut excluded = false;
    let mut marked = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("pack")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                excluded = true;
                Ok(())
            } else if meta.path.is_ident("member") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `member`"))
            }
        })?;
    }
    Ok((excluded, marked))
}

fn enum_repr(attrs: &[Attribute]) -> syn::Result<syn::Ident> {
    const WIDTHS: &[&str] = &["i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64"];
    for attr in attrs.iter().filter(|a| a.path().is_ident("repr")) {
        let mut found = None;
        attr.parse_nested_meta(|meta| {
            // Skip parenthesized arguments of entries like `align(8)`.
            if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                let _ = content.parse::<TokenStream2>()?;
                return Ok(());
            }
            if let Some(ident) = meta.path.get_ident() {
                if WIDTHS.contains(&ident.to_string().as_str()) {
                    found = Some(ident.clone());
                }
            }
            Ok(())
        })?;
        if let Some(ident) = found {
            return Ok(ident);
        }
    }
    Ok(format_ident!("i32"))
}

// ============================================================================
// Struct analysis
// ============================================================================

struct FieldModel {
    /// Accessor in both expression (`value.name`) and struct-literal
    /// position.
    member: syn::Member,
    ty: syn::Type,
    selected: bool,
    layout: Member,
}

struct StructModel {
    mode: MarkerMode,
    tuple: bool,
    unit: bool,
    fields: Vec<FieldModel>,
}

fn analyze_struct(input: &DeriveInput, data: &DataStruct) -> syn::Result<StructModel> {
    let mode = marker_mode(&input.attrs)?;
    let tuple = !matches!(data.fields, Fields::Named(_));
    let unit = matches!(data.fields, Fields::Unit);

    let mut fields = Vec::new();
    let mut layout_members = Vec::new();
    for (index, field) in data.fields.iter().enumerate() {
        let (excluded, marked) = field_flags(&field.attrs)?;
        let name = match &field.ident {
            Some(ident) => ident.to_string(),
            None => index.to_string(),
        };
        let layout = Member::new(
            name,
            MemberAttrs {
                kind: MemberKind::Field,
                is_public: matches!(field.vis, syn::Visibility::Public(_)),
                read_only: false,
                excluded,
                marked,
            },
        );
        let member = match &field.ident {
            Some(ident) => syn::Member::Named(ident.clone()),
            None => syn::Member::Unnamed(syn::Index::from(index)),
        };
        fields.push(FieldModel {
            member,
            ty: field.ty.clone(),
            selected: false,
            layout,
        });
        layout_members.push(fields[fields.len() - 1].layout.clone());
    }

    for index in select(mode, &layout_members) {
        fields[index].selected = true;
    }

    Ok(StructModel { mode, tuple, unit, fields })
}

/// Adds a trait bound for every type parameter, the conventional derive
/// treatment.
fn with_bounds(generics: &Generics, bound: TokenStream2) -> Generics {
    let mut generics = generics.clone();
    for param in &mut generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param.bounds.push(syn::parse_quote!(#bound));
        }
    }
    generics
}

// ============================================================================
// Encode derive
// ============================================================================

/// Derives `exabin::Encode` for a struct or fieldless enum.
#[proc_macro_derive(Encode, attributes(pack))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_encode(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_encode(input: &DeriveInput) -> syn::Result<TokenStream2> {
    match &input.data {
        Data::Struct(data) => {
            let model = analyze_struct(input, data)?;
            Ok(encode_struct(input, &model))
        }
        Data::Enum(data) => encode_enum(input, data),
        Data::Union(_) => Err(syn::Error::new(
            input.span(),
            "unions have no wire representation",
        )),
    }
}

fn encode_struct(input: &DeriveInput, model: &StructModel) -> TokenStream2 {
    let name = &input.ident;
    let bounded = with_bounds(&input.generics, quote!(::exabin::Encode));
    let (impl_generics, ty_generics, where_clause) = bounded.split_for_impl();

    let mut bindings = Vec::new();
    let mut steps = Vec::new();
    for (slot, field) in model.fields.iter().filter(|f| f.selected).enumerate() {
        let var = format_ident!("member_{slot}");
        let ty = &field.ty;
        let member = &field.member;
        bindings.push(quote! {
            let #var = registry.lazy_encoder::<#ty, W>();
        });
        steps.push(quote! {
            #var.run(out, &value.#member)?;
        });
    }

    // Unit structs bind no member plans; keep the generated code
    // warning-free.
    let registry_param = if bindings.is_empty() {
        format_ident!("_registry")
    } else {
        format_ident!("registry")
    };

    quote! {
        #[automatically_derived]
        impl #impl_generics ::exabin::Encode for #name #ty_generics #where_clause {
            fn build_encoder<W: ::std::io::Write + 'static>(
                #registry_param: &::exabin::PlanRegistry,
            ) -> ::exabin::Result<::exabin::EncodePlan<W, Self>> {
                #(#bindings)*
                Ok(::exabin::EncodePlan::new(
                    move |out: &mut ::exabin::WriteBuffer<W>, value: &Self| {
                        #(#steps)*
                        Ok(())
                    },
                ))
            }
        }

        #[automatically_derived]
        impl #impl_generics ::exabin::EncodeNullable for #name #ty_generics #where_clause {
            fn build_option_encoder<W: ::std::io::Write + 'static>(
                registry: &::exabin::PlanRegistry,
            ) -> ::exabin::Result<::exabin::EncodePlan<W, ::std::option::Option<Self>>> {
                let inner = registry.lazy_encoder::<Self, W>();
                Ok(::exabin::EncodePlan::new(
                    move |out: &mut ::exabin::WriteBuffer<W>,
                          value: &::std::option::Option<Self>| match value {
                        ::std::option::Option::Some(present) => {
                            out.write_bool(true)?;
                            inner.run(out, present)
                        }
                        ::std::option::Option::None => out.write_bool(false),
                    },
                ))
            }
        }
    }
}

fn encode_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    require_fieldless(data)?;
    let name = &input.ident;
    let repr = enum_repr(&input.attrs)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Casting `*value` would move out of the reference for enums without
    // `Copy`; matching and re-constructing the unit variant does not.
    let arms = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        quote! {
            #name::#ident => #name::#ident as #repr,
        }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::exabin::Encode for #name #ty_generics #where_clause {
            fn build_encoder<W: ::std::io::Write + 'static>(
                _registry: &::exabin::PlanRegistry,
            ) -> ::exabin::Result<::exabin::EncodePlan<W, Self>> {
                Ok(::exabin::EncodePlan::new(
                    move |out: &mut ::exabin::WriteBuffer<W>, value: &Self| {
                        let raw: #repr = match value {
                            #(#arms)*
                        };
                        out.write_scalar::<#repr>(raw)
                    },
                ))
            }
        }
    })
}

fn require_fieldless(data: &DataEnum) -> syn::Result<()> {
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "only fieldless enums have a wire representation",
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Decode derive
// ============================================================================

/// Derives `exabin::Decode` for a struct or fieldless enum.
#[proc_macro_derive(Decode, attributes(pack))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_decode(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_decode(input: &DeriveInput) -> syn::Result<TokenStream2> {
    match &input.data {
        Data::Struct(data) => {
            let model = analyze_struct(input, data)?;
            Ok(decode_struct(input, &model))
        }
        Data::Enum(data) => decode_enum(input, data),
        Data::Union(_) => Err(syn::Error::new(
            input.span(),
            "unions have no wire representation",
        )),
    }
}

fn decode_struct(input: &DeriveInput, model: &StructModel) -> TokenStream2 {
    let name = &input.ident;
    let bounded = with_bounds(&input.generics, quote!(::exabin::Decode));
    let (impl_generics, ty_generics, where_clause) = bounded.split_for_impl();

    let mut bindings = Vec::new();
    let mut inits = Vec::new();
    let mut slot = 0usize;
    for field in &model.fields {
        if field.selected {
            let var = format_ident!("member_{slot}");
            slot += 1;
            let ty = &field.ty;
            bindings.push(quote! {
                let #var = registry.lazy_decoder::<#ty, R>();
            });
            inits.push((field, quote!(#var.run(src)?)));
        } else {
            // Members outside the marker mode decode to their defaults.
            inits.push((field, quote!(::std::default::Default::default())));
        }
    }

    // Struct literals evaluate their fields in the written order, which is
    // declaration order here, so members come off the wire in wire order.
    let construct = if model.unit {
        quote! { Self }
    } else if model.tuple {
        let exprs = inits.iter().map(|(_, expr)| expr);
        quote! { Self( #(#exprs),* ) }
    } else {
        let entries = inits.iter().map(|(field, expr)| {
            let member = &field.member;
            quote! { #member: #expr }
        });
        quote! { Self { #(#entries),* } }
    };

    let registry_param = if bindings.is_empty() {
        format_ident!("_registry")
    } else {
        format_ident!("registry")
    };

    quote! {
        #[automatically_derived]
        impl #impl_generics ::exabin::Decode for #name #ty_generics #where_clause {
            fn build_decoder<R: ::std::io::Read + 'static>(
                #registry_param: &::exabin::PlanRegistry,
            ) -> ::exabin::Result<::exabin::DecodePlan<R, Self>> {
                #(#bindings)*
                Ok(::exabin::DecodePlan::new(
                    move |src: &mut ::exabin::ReadBuffer<R>| {
                        Ok(#construct)
                    },
                ))
            }
        }

        #[automatically_derived]
        impl #impl_generics ::exabin::DecodeNullable for #name #ty_generics #where_clause {
            fn build_option_decoder<R: ::std::io::Read + 'static>(
                registry: &::exabin::PlanRegistry,
            ) -> ::exabin::Result<::exabin::DecodePlan<R, ::std::option::Option<Self>>> {
                let inner = registry.lazy_decoder::<Self, R>();
                Ok(::exabin::DecodePlan::new(
                    move |src: &mut ::exabin::ReadBuffer<R>| {
                        if src.read_bool()? {
                            Ok(::std::option::Option::Some(inner.run(src)?))
                        } else {
                            Ok(::std::option::Option::None)
                        }
                    },
                ))
            }
        }
    }
}

fn decode_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    require_fieldless(data)?;
    let name = &input.ident;
    let name_str = name.to_string();
    let repr = enum_repr(&input.attrs)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let arms = data.variants.iter().map(|variant| {
        let ident = &variant.ident;
        quote! {
            raw if raw == #name::#ident as #repr => Ok(#name::#ident),
        }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::exabin::Decode for #name #ty_generics #where_clause {
            fn build_decoder<R: ::std::io::Read + 'static>(
                _registry: &::exabin::PlanRegistry,
            ) -> ::exabin::Result<::exabin::DecodePlan<R, Self>> {
                Ok(::exabin::DecodePlan::new(
                    move |src: &mut ::exabin::ReadBuffer<R>| {
                        let raw = src.read_scalar::<#repr>()?;
                        match raw {
                            #(#arms)*
                            _ => Err(::exabin::Error::from(
                                ::exabin::FormatError::UnknownDiscriminant {
                                    type_name: #name_str,
                                    value: raw as i64,
                                },
                            )),
                        }
                    },
                ))
            }
        }
    })
}

// ============================================================================
// Described derive
// ============================================================================

/// Derives `exabin::Described`, exposing the computed layout of a struct.
#[proc_macro_derive(Described, attributes(pack))]
pub fn derive_described(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_described(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_described(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "`Described` applies to structs",
        ));
    };
    let model = analyze_struct(input, data)?;

    let name = &input.ident;
    let name_str = name.to_string();
    let mode = match model.mode {
        MarkerMode::Plain => quote!(Plain),
        MarkerMode::LegacySerializable => quote!(LegacySerializable),
        MarkerMode::Contract => quote!(Contract),
    };

    let members = model.fields.iter().map(|field| {
        let member_name = &field.layout.name;
        let is_public = field.layout.attrs.is_public;
        let excluded = field.layout.attrs.excluded;
        let marked = field.layout.attrs.marked;
        quote! {
            ::exabin::Member {
                name: ::std::string::String::from(#member_name),
                attrs: ::exabin::MemberAttrs {
                    kind: ::exabin::MemberKind::Field,
                    is_public: #is_public,
                    read_only: false,
                    excluded: #excluded,
                    marked: #marked,
                },
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::exabin::Described for #name #ty_generics #where_clause {
            fn describe() -> ::exabin::LevelInfo {
                ::exabin::LevelInfo {
                    type_name: ::std::string::String::from(#name_str),
                    mode: ::exabin::MarkerMode::#mode,
                    members: ::std::vec![#(#members),*],
                }
            }
        }
    })
}
