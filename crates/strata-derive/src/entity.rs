//! Entity derive macro implementation

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::{field_attrs, struct_attrs};
use crate::types::{Kind, infer, option_inner};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let table = struct_attrs(&input)?
        .table
        .unwrap_or_else(|| name.to_string().to_snake_case());

    let mut declarations = Vec::new();
    let mut indexes = Vec::new();
    let mut decoders = Vec::new();
    let mut encoders = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = field_attrs(field)?;
        if attrs.skip {
            decoders.push(quote! {
                #ident: ::core::default::Default::default()
            });
            continue;
        }

        let column = attrs.column.clone().unwrap_or_else(|| ident.to_string());
        let (inner, optional) = match option_inner(&field.ty) {
            Some(inner) => (inner, true),
            None => (&field.ty, false),
        };
        let kind = match attrs.kind.or_else(|| infer(inner)) {
            Some(kind) => kind,
            None => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "cannot infer a column kind for this type; declare one, e.g. #[orm(varchar = 64)] or #[orm(skip)]",
                ));
            }
        };

        // An optional key is one not minted yet, not a nullable column.
        let keyed = attrs.primary || kind == Kind::Serial;
        let mut constraints = Vec::new();
        if attrs.nullable || (optional && !keyed) {
            constraints.push(quote!(.nullable()));
        }
        if attrs.primary {
            constraints.push(quote!(.primary()));
        }
        if attrs.unique {
            constraints.push(quote!(.unique()));
        }
        if attrs.auto_increment {
            constraints.push(quote!(.auto_increment()));
        }
        if let Some(default) = &attrs.default {
            constraints.push(quote!(.default(#default)));
        }
        if attrs.default_current_timestamp {
            constraints.push(quote!(.default_current_timestamp()));
        }
        let declare = kind.declare(&column);
        declarations.push(quote! {
            #declare #(#constraints)*;
        });

        if let Some(unique) = attrs.index {
            indexes.push(quote! {
                builder.add_index(&[#column], #unique, ::core::option::Option::None)?;
            });
        }

        decoders.push(quote! {
            #ident: record.get_as(#column)?
        });
        encoders.push(quote! {
            values.insert(
                ::std::string::String::from(#column),
                ::strata::Value::from(self.#ident),
            );
        });
    }

    Ok(quote! {
        impl #impl_generics ::strata::Schematic for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;

            fn describe(builder: &mut ::strata::SchemaBuilder) -> ::strata::OrmResult<()> {
                #(#declarations)*
                #(#indexes)*
                ::core::result::Result::Ok(())
            }
        }

        impl #impl_generics ::strata::FromRecord for #name #ty_generics #where_clause {
            fn from_record(record: &::strata::Record) -> ::strata::OrmResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#decoders),*
                })
            }
        }

        impl #impl_generics ::strata::IntoValues for #name #ty_generics #where_clause {
            fn into_values(self) -> ::strata::Values {
                let mut values = ::strata::Values::new();
                #(#encoders)*
                values
            }
        }
    })
}
