#![warn(clippy::pedantic)]

mod func_filter;
mod func_update;
mod prelude;
mod utils;

fn expand<F: FnOnce(proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream>>(
    fun: F,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    fun(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Builds a `Vec<Filter>`.
///
/// ```ignore
/// query.filters(filter! {
///     age: Gt(30),
///     name: "Ann",
///     "address.city": In(["Lisbon", "Porto"]),
/// });
/// ```
#[proc_macro]
pub fn filter(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(func_filter::func_filter, input)
}

/// Builds a `Vec<UpdateOperator>`.
///
/// ```ignore
/// query.update(update! { name: "Grand", stars: Inc(1), notes: Unset }).execute(options).await?;
/// ```
#[proc_macro]
pub fn update(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(func_update::func_update, input)
}
