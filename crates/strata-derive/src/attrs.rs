//! Attribute parsing for the Entity derive macro.
//!
//! Several `#[orm(...)]` attributes on one item accumulate.

use syn::parse::ParseStream;
use syn::{DeriveInput, Result, Token};

use crate::types::Kind;

#[derive(Default)]
pub(crate) struct StructAttrs {
    pub(crate) table: Option<String>,
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub(crate) column: Option<String>,
    pub(crate) kind: Option<Kind>,
    pub(crate) primary: bool,
    pub(crate) unique: bool,
    pub(crate) nullable: bool,
    pub(crate) auto_increment: bool,
    pub(crate) default: Option<syn::Lit>,
    pub(crate) default_current_timestamp: bool,
    /// `Some(unique)` when a single-column index was requested.
    pub(crate) index: Option<bool>,
    pub(crate) skip: bool,
}

impl FieldAttrs {
    fn set_kind(&mut self, ident: &syn::Ident, kind: Kind) -> Result<()> {
        if self.kind.replace(kind).is_some() {
            return Err(syn::Error::new_spanned(
                ident,
                "column kind specified more than once",
            ));
        }
        Ok(())
    }
}

pub(crate) fn struct_attrs(input: &DeriveInput) -> Result<StructAttrs> {
    let mut attrs = StructAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_args_with(|stream: ParseStream| parse_struct(stream, &mut attrs))?;
    }
    Ok(attrs)
}

pub(crate) fn field_attrs(field: &syn::Field) -> Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_args_with(|stream: ParseStream| parse_field(stream, &mut attrs))?;
    }
    Ok(attrs)
}

fn parse_struct(input: ParseStream, attrs: &mut StructAttrs) -> Result<()> {
    loop {
        if input.is_empty() {
            break;
        }

        let ident: syn::Ident = input.parse()?;
        match ident.to_string().as_str() {
            "table" => {
                let _: Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                attrs.table = Some(value.value());
            }
            other => {
                return Err(syn::Error::new_spanned(
                    &ident,
                    format!("unknown orm attribute: {other}"),
                ));
            }
        }

        if input.peek(Token![,]) {
            let _: Token![,] = input.parse()?;
        } else {
            break;
        }
    }
    Ok(())
}

fn parse_field(input: ParseStream, attrs: &mut FieldAttrs) -> Result<()> {
    loop {
        if input.is_empty() {
            break;
        }

        let ident: syn::Ident = input.parse()?;
        let key = ident.to_string();

        if input.peek(syn::token::Paren) {
            let content;
            syn::parenthesized!(content in input);
            match key.as_str() {
                "decimal" => {
                    let precision: syn::LitInt = content.parse()?;
                    let _: Token![,] = content.parse()?;
                    let scale: syn::LitInt = content.parse()?;
                    attrs.set_kind(
                        &ident,
                        Kind::Decimal(precision.base10_parse()?, scale.base10_parse()?),
                    )?;
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        &ident,
                        format!("unknown orm attribute: {other}(...)"),
                    ));
                }
            }
        } else if input.peek(Token![=]) {
            let _: Token![=] = input.parse()?;
            match key.as_str() {
                "column" => {
                    let value: syn::LitStr = input.parse()?;
                    attrs.column = Some(value.value());
                }
                "varchar" => {
                    let size: syn::LitInt = input.parse()?;
                    attrs.set_kind(&ident, Kind::Varchar(size.base10_parse()?))?;
                }
                "char" => {
                    let size: syn::LitInt = input.parse()?;
                    attrs.set_kind(&ident, Kind::Char(size.base10_parse()?))?;
                }
                "default" => attrs.default = Some(input.parse()?),
                other => {
                    return Err(syn::Error::new_spanned(
                        &ident,
                        format!("unknown orm attribute: {other} = ..."),
                    ));
                }
            }
        } else {
            match key.as_str() {
                "serial" => attrs.set_kind(&ident, Kind::Serial)?,
                "foreign" => attrs.set_kind(&ident, Kind::Foreign)?,
                "text" => attrs.set_kind(&ident, Kind::Text)?,
                "blob" => attrs.set_kind(&ident, Kind::Blob)?,
                "date" => attrs.set_kind(&ident, Kind::Date)?,
                "time" => attrs.set_kind(&ident, Kind::Time)?,
                "datetime" => attrs.set_kind(&ident, Kind::DateTime)?,
                "timestamp" => attrs.set_kind(&ident, Kind::Timestamp)?,
                "primary" => attrs.primary = true,
                "unique" => attrs.unique = true,
                "nullable" => attrs.nullable = true,
                "auto_increment" => attrs.auto_increment = true,
                "default_current_timestamp" => attrs.default_current_timestamp = true,
                "index" => attrs.index = Some(false),
                "unique_index" => attrs.index = Some(true),
                "skip" => attrs.skip = true,
                other => {
                    return Err(syn::Error::new_spanned(
                        &ident,
                        format!("unknown orm attribute: {other}"),
                    ));
                }
            }
        }

        if input.peek(Token![,]) {
            let _: Token![,] = input.parse()?;
        } else {
            break;
        }
    }
    Ok(())
}
