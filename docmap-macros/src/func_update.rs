use crate::prelude::*;

const OPERATORS: &[&str] = &[
    "Set",
    "SetOnInsert",
    "Unset",
    "Inc",
    "Mul",
    "Min",
    "Max",
    "Rename",
    "CurrentDate",
    "Push",
    "PushEach",
    "AddToSet",
    "AddToSetEach",
    "Pull",
    "PullAll",
    "PopFirst",
    "PopLast",
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

pub fn func_update(input: TokenStream) -> Result<TokenStream> {
    let input = parse2::<Input>(input)?;

    let operators = input
        .fields
        .iter()
        .map(|field| build(&field.key.0, &field.value))
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        ::std::vec![ #( #operators ),* ]
    })
}

fn build(key: &LitStr, value: &Expr) -> Result<TokenStream> {
    let krate = krate();

    let Some((operator, args)) = operator_call(value, OPERATORS) else {
        return Ok(quote! { #krate::Updates::set(#key, #value) });
    };

    let expected = match operator.to_string().as_str() {
        "Unset" | "CurrentDate" | "PopFirst" | "PopLast" => 0,
        _ => 1,
    };
    if args.len() != expected {
        return Err(Error::new_spanned(
            value,
            format!("`{operator}` takes {expected} argument(s)"),
        ));
    }

    let method = Ident::new(&operator.to_string().to_snake_case(), operator.span());

    Ok(quote! { #krate::Updates::#method(#key #(, #args)*) })
}
