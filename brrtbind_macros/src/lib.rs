//! Derive macros for `brrtbind`.
//!
//! `#[derive(Describe)]` implements `brrtbind::Describe` for a struct with
//! named fields. `#[derive(Input)]` does the same and also implements
//! `brrtbind::Input`, wiring the validation hooks named by the container
//! attribute.
//!
//! ```rust,ignore
//! #[derive(Deserialize, Input)]
//! #[contract(validate)]
//! struct ListUsers {
//!     #[contract(query = "page", required = "true", oai = "minimum=1")]
//!     page: i64,
//!     #[contract(body)]
//!     filter: Filter,
//! }
//! ```
//!
//! Container options: `inline`, `validate`, `validate_context`.
//! Field options are free-form markers: `key = "value"`, or a bare `key`
//! for an empty value. Field keys follow `#[serde(rename)]` and
//! `#[serde(rename_all)]`; `#[serde(skip)]` fields are left out.
//! `#[serde(default)]` fields, or every field under a container-level
//! `#[serde(default)]`, are not required. A `#[serde(flatten)]` field
//! contributes its fields to the parent; it cannot carry markers.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Result as SynResult};

#[derive(Default)]
struct ContainerOptions {
    inline: bool,
    validate: bool,
    validate_context: bool,
    rename_all: Option<String>,
    default: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Plain,
    Defaulted,
    Flattened,
}

struct FieldSpec {
    key: String,
    ty: syn::Type,
    markers: Vec<(String, String)>,
    kind: FieldKind,
}

/// Consume an optional `= expr`, as in `default` or `default = "path"`.
fn skip_value(meta: &syn::meta::ParseNestedMeta<'_>) -> SynResult<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    }
    Ok(())
}

fn container_options(input: &DeriveInput) -> SynResult<ContainerOptions> {
    let mut options = ContainerOptions::default();
    for attr in &input.attrs {
        if attr.path().is_ident("contract") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("inline") {
                    options.inline = true;
                } else if meta.path.is_ident("validate") {
                    options.validate = true;
                } else if meta.path.is_ident("validate_context") {
                    options.validate_context = true;
                } else {
                    return Err(meta.error("expected `inline`, `validate` or `validate_context`"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    let value: LitStr = meta.value()?.parse()?;
                    options.rename_all = Some(value.value());
                } else if meta.path.is_ident("default") {
                    skip_value(&meta)?;
                    options.default = true;
                } else if meta.input.peek(syn::Token![=]) {
                    let _: syn::Expr = meta.value()?.parse()?;
                } else if meta.input.peek(syn::token::Paren) {
                    skip_group(&meta)?;
                }
                Ok(())
            })?;
        }
    }
    Ok(options)
}

fn skip_group(meta: &syn::meta::ParseNestedMeta<'_>) -> SynResult<()> {
    meta.parse_nested_meta(|inner| {
        if inner.input.peek(syn::Token![=]) {
            let _: syn::Expr = inner.value()?.parse()?;
        }
        Ok(())
    })
}

fn apply_rename_all(rule: &str, field: &str) -> String {
    let words: Vec<&str> = field.split('_').filter(|w| !w.is_empty()).collect();
    let capitalize = |w: &str| {
        let mut chars = w.chars();
        chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default()
    };
    match rule {
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        "PascalCase" => words.iter().map(|w| capitalize(*w)).collect(),
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { (*w).to_string() } else { capitalize(*w) })
            .collect(),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        _ => field.to_string(),
    }
}

fn field_specs(input: &DeriveInput, options: &ContainerOptions) -> SynResult<Vec<FieldSpec>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Describe and Input can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Describe and Input require a struct with named fields",
        ));
    };

    let mut specs = Vec::new();
    for field in &named.named {
        let Some(ident) = &field.ident else { continue };
        let raw = ident.to_string();
        let name = raw.strip_prefix("r#").unwrap_or(&raw).to_string();
        let mut key = match &options.rename_all {
            Some(rule) => apply_rename_all(rule, &name),
            None => name,
        };
        let mut skipped = false;
        let mut defaulted = options.default;
        let mut flattened = false;
        let mut markers = Vec::new();

        for attr in &field.attrs {
            if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        if meta.input.peek(syn::Token![=]) {
                            let value: LitStr = meta.value()?.parse()?;
                            key = value.value();
                        } else {
                            meta.parse_nested_meta(|inner| {
                                let value: LitStr = inner.value()?.parse()?;
                                if inner.path.is_ident("deserialize") {
                                    key = value.value();
                                }
                                Ok(())
                            })?;
                        }
                    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                        skipped = true;
                    } else if meta.path.is_ident("default") {
                        skip_value(&meta)?;
                        defaulted = true;
                    } else if meta.path.is_ident("flatten") {
                        flattened = true;
                    } else if meta.input.peek(syn::Token![=]) {
                        let _: syn::Expr = meta.value()?.parse()?;
                    } else if meta.input.peek(syn::token::Paren) {
                        skip_group(&meta)?;
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("contract") {
                attr.parse_nested_meta(|meta| {
                    let Some(marker) = meta.path.get_ident() else {
                        return Err(meta.error("marker keys are single identifiers"));
                    };
                    let marker = marker.to_string();
                    let value = if meta.input.peek(syn::Token![=]) {
                        let lit: LitStr = meta.value()?.parse()?;
                        lit.value()
                    } else {
                        String::new()
                    };
                    markers.push((marker, value));
                    Ok(())
                })?;
            }
        }

        if skipped {
            continue;
        }
        if flattened && !markers.is_empty() {
            return Err(syn::Error::new_spanned(
                ident,
                "a #[serde(flatten)] field cannot carry contract markers; mark the inner fields",
            ));
        }
        let kind = if flattened {
            FieldKind::Flattened
        } else if defaulted {
            FieldKind::Defaulted
        } else {
            FieldKind::Plain
        };
        specs.push(FieldSpec {
            key,
            ty: field.ty.clone(),
            markers,
            kind,
        });
    }
    Ok(specs)
}

fn describe_impl(input: &DeriveInput, options: &ContainerOptions) -> SynResult<TokenStream2> {
    let specs = field_specs(input, options)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut where_clause = where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));
    where_clause.predicates.push(syn::parse_quote!(Self: 'static));
    for param in input.generics.type_params() {
        let name = &param.ident;
        where_clause
            .predicates
            .push(syn::parse_quote!(#name: ::brrtbind::introspect::Describe + 'static));
    }

    let fields = specs.iter().map(|spec| {
        let key = &spec.key;
        let ty = &spec.ty;
        let markers = spec.markers.iter().map(|(k, v)| quote! { .with(#k, #v) });
        let builder = match spec.kind {
            FieldKind::Flattened => {
                return quote! {
                    .flatten(<#ty as ::brrtbind::introspect::Describe>::shape())
                };
            }
            FieldKind::Defaulted => quote! { default_field },
            FieldKind::Plain => quote! { field },
        };
        quote! {
            .#builder(
                #key,
                <#ty as ::brrtbind::introspect::Describe>::shape(),
                ::brrtbind::introspect::Markers::new() #(#markers)*,
            )
        }
    });
    let inline = options.inline.then(|| quote! { .inline() });

    Ok(quote! {
        impl #impl_generics ::brrtbind::introspect::Describe for #ident #ty_generics #where_clause {
            fn shape() -> ::brrtbind::introspect::Shape {
                ::brrtbind::introspect::Shape::Struct(|| {
                    ::brrtbind::introspect::StructShape::of::<Self>()
                        #inline
                        #(#fields)*
                })
            }
        }
    })
}

fn input_impl(input: &DeriveInput, options: &ContainerOptions) -> TokenStream2 {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let mut where_clause = where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));
    for param in input.generics.type_params() {
        let name = &param.ident;
        where_clause
            .predicates
            .push(syn::parse_quote!(#name: ::brrtbind::introspect::Describe + Send + Sync + 'static));
    }
    if input.generics.type_params().next().is_some() {
        where_clause
            .predicates
            .push(syn::parse_quote!(Self: ::brrtbind::__private::DeserializeOwned));
    }

    let validate = options.validate.then(|| quote! { .with_validate() });
    let validate_context = options
        .validate_context
        .then(|| quote! { .with_validate_context() });

    quote! {
        impl #impl_generics ::brrtbind::Input for #ident #ty_generics #where_clause {
            fn hooks() -> ::brrtbind::validation::Hooks<Self> {
                ::brrtbind::validation::Hooks::none() #validate #validate_context
            }
        }
    }
}

/// Derive `brrtbind::Describe` for a struct with named fields.
#[proc_macro_derive(Describe, attributes(contract))]
pub fn derive_describe(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let expanded = container_options(&input).and_then(|options| {
        if options.validate || options.validate_context {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "`validate` and `validate_context` need #[derive(Input)]",
            ));
        }
        describe_impl(&input, &options)
    });
    match expanded {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive `brrtbind::Describe` and `brrtbind::Input` for a route input struct.
#[proc_macro_derive(Input, attributes(contract))]
pub fn derive_input(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let expanded = container_options(&input).and_then(|options| {
        let describe = describe_impl(&input, &options)?;
        let input_impl = input_impl(&input, &options);
        Ok(quote! {
            #describe
            #input_impl
        })
    });
    match expanded {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
