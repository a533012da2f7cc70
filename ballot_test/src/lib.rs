use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`], tracking
/// a freshly built relay, and `crate::contract::memory::DevChain`, a fresh
/// in-memory election owned by `DevChain::account(0)`.
///
/// Passing `started` as the attribute argument seeds the chain with the
/// candidates "Alice" and "Bob" and starts the election before the test runs.
#[proc_macro_attribute]
pub fn ballot_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the arguments to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Seed and start the election if asked to.
    let maybe_seed = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "started" => quote! {
            {
                use crate::contract::{Connector, VotingContract};

                let owner = chain.connect(crate::contract::memory::DevChain::account(0));
                for name in ["Alice", "Bob"] {
                    owner.add_candidate(name).await.unwrap().wait().await.unwrap();
                }
                owner.start_election().await.unwrap().wait().await.unwrap();
            }
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `started`")
                .into_compile_error()
                .into();
        }
        None => TokenStream2::new(),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::contract::memory::DevChain,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["chain_ballot"],
                    None,
                    None,
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::build())
                    .await
                    .unwrap();
                let chain = crate::contract::memory::DevChain::default();

                #maybe_seed

                (rocket_client, chain)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("ballot-test")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, chain) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_chain = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself
                    let type_ident = &type_path.path.segments.last().unwrap().ident;
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "DevChain" {
                        if has_chain {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `DevChain`",
                            ));
                        }
                        has_chain = true;
                        args.push(quote! { chain });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `chain_ident: DevChain`",
        ));
    }

    Ok(args)
}
