//! Column kinds and their inference from field types.

use proc_macro2::TokenStream;
use quote::quote;

/// Column kind of a derived field, mirroring the `SchemaBuilder::add_*` helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Serial,
    Foreign,
    Boolean,
    Integer { size: IntSize, unsigned: bool },
    Decimal(u32, u32),
    Float,
    Double,
    Char(u32),
    Varchar(u32),
    Text,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntSize {
    Tiny,
    Small,
    Normal,
    Big,
}

/// Width of an inferred `String` column.
const DEFAULT_VARCHAR: u32 = 255;

impl Kind {
    /// The `builder.add_*(..)` call declaring `column`.
    pub(crate) fn declare(self, column: &str) -> TokenStream {
        match self {
            Kind::Serial => quote!(builder.add_serial(#column)),
            Kind::Foreign => quote!(builder.add_foreign(#column)),
            Kind::Boolean => quote!(builder.add_boolean(#column)),
            Kind::Integer { size, unsigned } => {
                let size = match size {
                    IntSize::Tiny => quote!(Tiny),
                    IntSize::Small => quote!(Small),
                    IntSize::Normal => quote!(Normal),
                    IntSize::Big => quote!(Big),
                };
                if unsigned {
                    quote!(builder.add_unsigned(#column, ::strata::schema::IntSize::#size))
                } else {
                    quote!(builder.add_integer(#column, ::strata::schema::IntSize::#size))
                }
            }
            Kind::Decimal(precision, scale) => {
                quote!(builder.add_decimal(#column, #precision, #scale))
            }
            Kind::Float => quote!(builder.add_float(#column)),
            Kind::Double => quote!(builder.add_double(#column)),
            Kind::Char(size) => quote!(builder.add_char(#column, #size)),
            Kind::Varchar(size) => quote!(builder.add_varchar(#column, #size)),
            Kind::Text => {
                quote!(builder.add_text(#column, ::strata::schema::SizeClass::Normal))
            }
            Kind::Blob => {
                quote!(builder.add_blob(#column, ::strata::schema::SizeClass::Normal))
            }
            Kind::Date => quote!(builder.add_date(#column)),
            Kind::Time => quote!(builder.add_time(#column)),
            Kind::DateTime => quote!(builder.add_datetime(#column)),
            Kind::Timestamp => quote!(builder.add_timestamp(#column)),
        }
    }
}

/// Extract the inner type T from Option<T>, or return None if not an Option type.
pub(crate) fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let (ident, args) = last_segment(ty)?;
    if ident != "Option" {
        return None;
    }
    single_arg(args)
}

/// Infer the column kind of a (non-optional) field type.
///
/// Only plain types are recognized; anything else needs an explicit kind.
pub(crate) fn infer(ty: &syn::Type) -> Option<Kind> {
    let (ident, args) = last_segment(ty)?;
    let int = |size, unsigned| Some(Kind::Integer { size, unsigned });
    match ident.to_string().as_str() {
        "bool" => Some(Kind::Boolean),
        "i8" => int(IntSize::Tiny, false),
        "i16" => int(IntSize::Small, false),
        "i32" => int(IntSize::Normal, false),
        "i64" => int(IntSize::Big, false),
        "u8" => int(IntSize::Tiny, true),
        "u16" => int(IntSize::Small, true),
        "u32" => int(IntSize::Normal, true),
        "u64" => int(IntSize::Big, true),
        "f32" => Some(Kind::Float),
        "f64" => Some(Kind::Double),
        "String" => Some(Kind::Varchar(DEFAULT_VARCHAR)),
        "NaiveDate" => Some(Kind::Date),
        "NaiveTime" => Some(Kind::Time),
        "NaiveDateTime" | "DateTime" => Some(Kind::DateTime),
        "Vec" => match single_arg(args).and_then(last_segment) {
            Some((inner, _)) if inner == "u8" => Some(Kind::Blob),
            _ => None,
        },
        _ => None,
    }
}

fn last_segment(ty: &syn::Type) -> Option<(&syn::Ident, &syn::PathArguments)> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    Some((&seg.ident, &seg.arguments))
}

fn single_arg(args: &syn::PathArguments) -> Option<&syn::Type> {
    let syn::PathArguments::AngleBracketed(args) = args else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}
