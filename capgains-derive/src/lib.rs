use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Error, Expr, Fields, Lit, LitStr, Type};

/// Derives `csv_columns()` and `csv_header()` for a serde record struct.
///
/// Column names follow `#[serde(rename = "...")]` when present, a column is
/// required unless its type is `Option<_>`, and the description is taken from
/// the field's doc comment. The generated code refers to a `CsvColumn` type
/// that must be in scope at the derive site.
#[proc_macro_derive(CsvColumns, attributes(serde))]
pub fn derive_csv_columns(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct Column {
    name: String,
    required: bool,
    description: String,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new(
                    Span::call_site(),
                    "CsvColumns requires named fields",
                ))
            }
        },
        _ => return Err(Error::new(Span::call_site(), "CsvColumns only supports structs")),
    };

    let mut columns = Vec::with_capacity(named.len());
    for field in named {
        let fallback = field
            .ident
            .as_ref()
            .map(|i| i.to_string())
            .unwrap_or_default();
        columns.push(Column {
            name: serde_rename(&field.attrs)?.unwrap_or(fallback),
            required: !is_option(&field.ty),
            description: doc_text(&field.attrs),
        });
    }

    let entries = columns.iter().map(|c| {
        let Column {
            name,
            required,
            description,
        } = c;
        quote! {
            CsvColumn { name: #name, required: #required, description: #description }
        }
    });
    let names = columns.iter().map(|c| &c.name);

    Ok(quote! {
        impl #ident {
            pub fn csv_columns() -> &'static [CsvColumn] {
                const COLUMNS: &[CsvColumn] = &[#(#entries),*];
                COLUMNS
            }

            pub fn csv_header() -> &'static [&'static str] {
                const HEADER: &[&str] = &[#(#names),*];
                HEADER
            }
        }
    })
}

fn serde_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                rename = Some(lit.value());
            } else if meta.input.peek(syn::Token![=]) {
                // skip the value of any other `key = value` serde option
                let _: Expr = meta.value()?.parse()?;
            }
            Ok(())
        })?;
    }
    Ok(rename)
}

fn doc_text(attrs: &[Attribute]) -> String {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect();
    lines.join(" ")
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}
