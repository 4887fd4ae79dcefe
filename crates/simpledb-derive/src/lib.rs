//! Derive macro for simpledb models.
//!
//! This crate provides `#[derive(Model)]`, which implements
//! `simpledb::model::Model` from a struct definition and its field
//! annotations.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit,
    LitStr, Meta, PathArguments, Type,
};

/// Derives `simpledb::model::Model` for a struct with named fields.
///
/// # Attributes
///
/// - `#[simpledb(table = "table_name")]` - Specifies the SQL table name
///   (optional, defaults to snake_case of struct name)
///
/// # Field Attributes
///
/// - `#[simpledb("KEY:value,...")]` - The field annotation. Fields without
///   one, or annotated `"-"`, are not part of the schema.
///
/// Fields named `rel_<table>` declare a relation to `<table>` and need a
/// `RELTYPE` in their annotation.
///
/// Every other annotated field is a column; its type must implement
/// `Clone` and `simpledb::executor::ToSqlValue`.
///
/// # Field kinds
///
/// The column type is picked from the Rust type. `Option<T>` and `Box<T>`
/// use the kind of `T`, `Vec<u8>` is binary, chrono and `SystemTime` types
/// are times, and anything unknown falls back to the "other" kind.
#[proc_macro_derive(Model, attributes(simpledb))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_model_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let table_name = get_table_name(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model derive only supports structs",
            ));
        }
    };

    let mut field_defs: Vec<TokenStream2> = Vec::new();
    let mut column_values: Vec<TokenStream2> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.unraw().to_string();
        let kind = format_ident!("{}", field_kind(&field.ty));
        let field_tag = get_field_tag(&field.attrs)?;

        if is_column(&field_name, field_tag.as_ref()) {
            let column = field_name.to_lowercase();
            column_values.push(quote! {
                (
                    ::std::string::String::from(#column),
                    ::simpledb::executor::ToSqlValue::to_sql_value(
                        ::std::clone::Clone::clone(&self.#ident),
                    ),
                )
            });
        }

        let tag = match field_tag {
            Some(tag) => quote! { ::std::option::Option::Some(::std::string::String::from(#tag)) },
            None => quote! { ::std::option::Option::None },
        };

        field_defs.push(quote! {
            ::simpledb::model::FieldDef {
                name: ::std::string::String::from(#field_name),
                kind: ::simpledb::model::FieldKind::#kind,
                tag: #tag,
            }
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::simpledb::model::Model for #struct_name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table_name
            }

            fn fields() -> ::std::vec::Vec<::simpledb::model::FieldDef> {
                ::std::vec![#(#field_defs),*]
            }

            fn column_values(
                &self,
            ) -> ::std::vec::Vec<(::std::string::String, ::simpledb::executor::SqlValue)> {
                ::std::vec![#(#column_values),*]
            }
        }
    })
}

/// Annotated fields are columns unless they are `rel_` relation fields.
fn is_column(field_name: &str, tag: Option<&LitStr>) -> bool {
    let annotated = tag.is_some_and(|tag| !matches!(tag.value().as_str(), "" | "-"));
    let relation = field_name
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("rel_"));
    annotated && !relation
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("simpledb") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            table_name = Some(s.value());
                        }
                    }
                    Ok(())
                } else {
                    Err(meta.error("unsupported simpledb attribute, expected `table`"))
                }
            })?;
            if let Some(name) = table_name {
                return Ok(name);
            }
        }
    }
    // Default to snake_case of struct name
    Ok(to_snake_case(&struct_name.to_string()))
}

fn get_field_tag(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut tag = None;
    for attr in attrs {
        if !attr.path().is_ident("simpledb") {
            continue;
        }
        if !matches!(attr.meta, Meta::List(_)) {
            return Err(syn::Error::new_spanned(
                attr,
                "expected #[simpledb(\"KEY:value,...\")]",
            ));
        }
        if tag.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "duplicate simpledb annotation",
            ));
        }
        tag = Some(attr.parse_args::<LitStr>()?);
    }
    Ok(tag)
}

/// Name of the `FieldKind` variant for a field type.
fn field_kind(ty: &Type) -> &'static str {
    let Type::Path(path) = ty else {
        return "Other";
    };
    let Some(segment) = path.path.segments.last() else {
        return "Other";
    };

    match segment.ident.to_string().as_str() {
        "Option" | "Box" => inner_type(&segment.arguments).map_or("Other", field_kind),
        "Vec" => match inner_type(&segment.arguments) {
            Some(inner) if is_ident(inner, "u8") => "Bytes",
            _ => "Other",
        },
        "String" | "str" => "String",
        "i8" | "u8" => "Int8",
        "i16" | "u16" => "Int16",
        "i32" | "u32" => "Int32",
        "i64" | "u64" => "Int64",
        "isize" | "usize" => "Int",
        "f32" => "Float32",
        "f64" => "Float64",
        "bool" => "Bool",
        "NaiveDateTime" | "DateTime" | "NaiveDate" | "SystemTime" => "Time",
        _ => "Other",
    }
}

fn inner_type(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn is_ident(ty: &Type, name: &str) -> bool {
    matches!(ty, Type::Path(path) if path.path.is_ident(name))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(ty: &str) -> &'static str {
        field_kind(&syn::parse_str::<Type>(ty).unwrap())
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(kind_of("String"), "String");
        assert_eq!(kind_of("i64"), "Int64");
        assert_eq!(kind_of("Option<i16>"), "Int16");
        assert_eq!(kind_of("Vec<u8>"), "Bytes");
        assert_eq!(kind_of("Vec<String>"), "Other");
        assert_eq!(kind_of("chrono::NaiveDateTime"), "Time");
        assert_eq!(kind_of("Option<Box<f64>>"), "Float64");
        assert_eq!(kind_of("serde_json::Value"), "Other");
    }

    #[test]
    fn test_columns_exclude_relations_and_skipped_fields() {
        let tag = |value: &str| LitStr::new(value, proc_macro2::Span::call_site());
        assert!(is_column("name", Some(&tag("LENGTH:64"))));
        assert!(is_column("id", Some(&tag("+"))));
        assert!(!is_column("cache", Some(&tag("-"))));
        assert!(!is_column("draft", None));
        assert!(!is_column("rel_group", Some(&tag("RELTYPE:FK"))));
        assert!(!is_column("REL_group", Some(&tag("RELTYPE:FK"))));
    }

    #[test]
    fn test_field_tag_parsing() {
        let input: DeriveInput = syn::parse_str(
            r#"
            #[simpledb(table = "accounts")]
            struct Account {
                #[simpledb("PRIMARY:true")]
                id: i64,
                note: String,
            }
            "#,
        )
        .unwrap();
        assert_eq!(get_table_name(&input.attrs, &input.ident).unwrap(), "accounts");
        let Data::Struct(data) = &input.data else {
            panic!("expected struct");
        };
        let tags: Vec<Option<String>> = data
            .fields
            .iter()
            .map(|f| get_field_tag(&f.attrs).unwrap().map(|t| t.value()))
            .collect();
        assert_eq!(tags, vec![Some("PRIMARY:true".to_string()), None]);
    }
}
