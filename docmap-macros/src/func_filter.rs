use crate::prelude::*;

const OPERATORS: &[&str] = &[
    "Eq", "Ne", "Gt", "Gte", "Lt", "Lte", "In", "Nin", "All", "Exists", "Size", "Type", "Mod",
    "Regex", "ElemMatch", "Not",
];

struct Input {
    fields: Punctuated<Field, Token![,]>,
}

impl Parse for Input {
    fn parse(input: ParseStream) -> Result<Self> {
        let fields = Punctuated::parse_terminated(input)?;
        Ok(Self { fields })
    }
}

struct Field {
    key: FieldKey,
    value: Expr,
}

impl Parse for Field {
    fn parse(input: ParseStream) -> Result<Self> {
        let key = input.parse()?;
        input.parse::<Token![:]>()?;
        let value = input.parse()?;

        Ok(Self { key, value })
    }
}

pub fn func_filter(input: TokenStream) -> Result<TokenStream> {
    let input = parse2::<Input>(input)?;

    let filters = input
        .fields
        .iter()
        .map(|field| build(&field.key.0, &field.value))
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        ::std::vec![ #( #filters ),* ]
    })
}

fn build(key: &LitStr, value: &Expr) -> Result<TokenStream> {
    let krate = krate();

    let Some((operator, args)) = operator_call(value, OPERATORS) else {
        return Ok(quote! { #krate::Filters::eq(#key, #value) });
    };

    if operator == "Not" {
        let [inner] = args.as_slice() else {
            return Err(Error::new_spanned(value, "`Not` takes one operator"));
        };
        let inner = build(key, inner)?;
        return Ok(quote! { #inner.not() });
    }

    let expected = match operator.to_string().as_str() {
        "Exists" => 0,
        "Mod" => 2,
        _ => 1,
    };
    if args.len() != expected {
        return Err(Error::new_spanned(
            value,
            format!("`{operator}` takes {expected} argument(s)"),
        ));
    }

    let method = match operator.to_string().as_str() {
        "In" => "in_".to_owned(),
        "Type" => "type_".to_owned(),
        "Mod" => "mod_".to_owned(),
        other => other.to_snake_case(),
    };
    let method = Ident::new(&method, operator.span());

    Ok(quote! { #krate::Filters::#method(#key #(, #args)*) })
}
