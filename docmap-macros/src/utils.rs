use crate::prelude::*;
use proc_macro_crate::{FoundCrate, crate_name};
use syn::ext::IdentExt;

/// A field written either as an identifier or as a string literal holding a
/// dotted path.
pub struct FieldKey(pub LitStr);

impl Parse for FieldKey {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(LitStr) {
            return Ok(Self(input.parse()?));
        }

        let ident = input.call(Ident::parse_any)?;
        Ok(Self(LitStr::new(&ident.to_string(), ident.span())))
    }
}

/// Splits `Op(args..)` or a bare `Op` into the operator and its arguments.
/// Anything else is a plain value.
pub fn operator_call<'a>(expr: &'a Expr, operators: &[&str]) -> Option<(&'a Ident, Vec<&'a Expr>)> {
    match expr {
        Expr::Call(call) => {
            let Expr::Path(path) = call.func.as_ref() else {
                return None;
            };
            let ident = path.path.get_ident()?;
            operators
                .iter()
                .any(|operator| ident == operator)
                .then(|| (ident, call.args.iter().collect_vec()))
        }
        Expr::Path(path) => {
            let ident = path.path.get_ident()?;
            operators
                .iter()
                .any(|operator| ident == operator)
                .then(|| (ident, Vec::new()))
        }
        _ => None,
    }
}

pub fn krate() -> TokenStream {
    if std::env::var("CARGO_CRATE_NAME").is_ok_and(|name| name == "docmap") {
        return quote! { crate };
    }

    let name = match crate_name("docmap") {
        Ok(FoundCrate::Name(name)) => name,
        Ok(FoundCrate::Itself) | Err(_) => "docmap".to_owned(),
    };
    let ident = Ident::new(&name, Span::call_site());

    quote! { ::#ident }
}
