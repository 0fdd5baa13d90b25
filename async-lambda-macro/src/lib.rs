//! Procedural macros for the async-lambda handler runtime.
//!
//! This crate provides the `#[lambda_handler]` attribute macro, which turns an
//! `async fn` into a type implementing `AsyncHandler`.
//!
//! # Example
//!
//! ```ignore
//! use async_lambda::prelude::*;
//!
//! #[lambda_handler(name = "orders")]
//! async fn orders(
//!     event: Value,
//!     context: LambdaContext,
//!     db_session: DbSession,
//! ) -> anyhow::Result<Value> {
//!     Ok(serde_json::json!({ "statusCode": 200 }))
//! }
//!
//! // `OrdersHandler` is generated and can be wrapped by the injectors.
//! ```
//!
//! Parameters after `event` and `context` opt the handler into capability
//! injection. Only the reserved names `db_session` and `settings` are
//! accepted; any other extra parameter is a compile error.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, FnArg, ItemFn, Lit, Meta, Pat,
    Token,
};

/// Reserved parameter name for the pooled data-store session.
const DB_SESSION: &str = "db_session";
/// Reserved parameter name for the settings snapshot.
const SETTINGS: &str = "settings";

/// Attributes for the `#[lambda_handler]` macro.
#[derive(Default, Debug)]
struct LambdaHandlerAttrs {
    /// Handler name reported in logs and used by the router.
    name: Option<String>,
}

impl LambdaHandlerAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = LambdaHandlerAttrs::default();

        for meta in metas {
            match meta {
                Meta::NameValue(nv) => {
                    let ident = nv
                        .path
                        .get_ident()
                        .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?
                        .to_string();

                    let lit = match &nv.value {
                        Expr::Lit(ExprLit { lit, .. }) => lit.clone(),
                        _ => return Err(syn::Error::new_spanned(&nv.value, "expected literal")),
                    };

                    match ident.as_str() {
                        "name" => match lit {
                            Lit::Str(lit_str) => attrs.name = Some(lit_str.value()),
                            other => {
                                return Err(syn::Error::new_spanned(
                                    other,
                                    "name must be a string literal",
                                ))
                            }
                        },
                        _ => {
                            return Err(syn::Error::new_spanned(
                                nv.path,
                                format!("unknown attribute: {}", ident),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(syn::Error::new_spanned(meta, "expected name = value"));
                }
            }
        }

        Ok(attrs)
    }
}

/// Turns an `async fn(event, context, ..)` into an `AsyncHandler`.
///
/// The generated type is named after the function in PascalCase with a
/// `Handler` suffix (`fn orders` becomes `OrdersHandler`). The original
/// function is kept as-is so it can still be called directly.
///
/// Applying the attribute to a non-`async` function fails at compile time.
#[proc_macro_attribute]
pub fn lambda_handler(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_lambda_handler(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_lambda_handler(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = LambdaHandlerAttrs::parse_meta_list(args)?;

    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            format!(
                "#[lambda_handler] can only be applied to async functions. {} is not async.",
                input_fn.sig.ident
            ),
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let handler_name = attrs.name.unwrap_or_else(|| fn_name.to_string());
    let struct_name = format_ident!("{}Handler", to_pascal_case(&fn_name.to_string()));

    let inputs: Vec<&FnArg> = input_fn.sig.inputs.iter().collect();
    if inputs.len() < 2 {
        return Err(syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "lambda handlers take at least (event, context)",
        ));
    }

    let mut wants_db_session = false;
    let mut wants_settings = false;
    let mut extractions = Vec::new();
    let mut extra_args = Vec::new();

    for arg in &inputs[2..] {
        let pat_type = match arg {
            FnArg::Typed(pat_type) => pat_type,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "lambda handlers cannot take self",
                ))
            }
        };
        let ident = match pat_type.pat.as_ref() {
            Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "capability parameters must be plain identifiers",
                ))
            }
        };
        let ty = &pat_type.ty;
        let binding = format_ident!("__{}", ident);

        match ident.to_string().as_str() {
            DB_SESSION if !wants_db_session => {
                wants_db_session = true;
                extractions.push(quote! {
                    let #binding: #ty = __deps.db_session()?;
                });
            }
            SETTINGS if !wants_settings => {
                wants_settings = true;
                extractions.push(quote! {
                    let #binding: #ty = __deps.settings()?;
                });
            }
            name => {
                return Err(syn::Error::new_spanned(
                    &pat_type.pat,
                    format!(
                        "unsupported handler parameter `{}`; only `{}` and `{}` can be injected",
                        name, DB_SESSION, SETTINGS
                    ),
                ))
            }
        }
        extra_args.push(binding);
    }

    let expanded = quote! {
        #input_fn

        /// Generated handler type for the annotated function.
        #[derive(Debug, Clone, Copy, Default)]
        #fn_vis struct #struct_name;

        impl #struct_name {
            /// Create a new instance of the handler.
            pub fn new() -> Self {
                Self
            }
        }

        #[::async_lambda::async_trait]
        impl ::async_lambda::AsyncHandler for #struct_name {
            async fn call(
                &self,
                __event: ::async_lambda::Value,
                __context: ::async_lambda::LambdaContext,
                __deps: ::async_lambda::Dependencies,
            ) -> ::core::result::Result<::async_lambda::Value, ::async_lambda::anyhow::Error> {
                let _ = &__deps;
                #(#extractions)*
                #fn_name(__event, __context #(, #extra_args)*)
                    .await
                    .map_err(::core::convert::Into::into)
            }

            fn requirements(&self) -> ::async_lambda::Requirements {
                ::async_lambda::Requirements::new()
                    .with_db_session(#wants_db_session)
                    .with_settings(#wants_settings)
            }

            fn name(&self) -> &str {
                #handler_name
            }
        }
    };

    Ok(expanded)
}

/// Convert a snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
