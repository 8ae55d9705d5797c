pub(crate) use crate::utils::{FieldKey, krate, operator_call};
pub use heck::ToSnakeCase;
pub use itertools::Itertools;
pub use proc_macro2::{Span, TokenStream};
pub use quote::quote;
pub use syn::{
    Error, Expr, Ident, LitStr, Result, Token,
    parse::{Parse, ParseStream},
    parse2,
    punctuated::Punctuated,
};
